//! Cache Data Types
//!
//! Lookup keys of a snapshot, the explicit hit/miss result type, recompute
//! outcomes and the metrics report.

use super::snapshot::Snapshot;
use crate::ranking::SubjectId;

use serde::Serialize;
use std::sync::Arc;

/// Key of a materialized leaderboard page (1-indexed page number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub page: u64,
    pub page_size: u64,
}

/// Key of a materialized around-me window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowKey {
    pub subject_id: SubjectId,
    pub window: u64,
}

/// Result of a cache lookup.
///
/// `Miss` covers both "not materialized" and "snapshot too old"; in either case
/// the caller is expected to query the `RankedSet` directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheResult<T> {
    Hit(T),
    Miss,
}

impl<T> CacheResult<T> {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheResult::Hit(_))
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, CacheResult::Miss)
    }

    pub fn hit(self) -> Option<T> {
        match self {
            CacheResult::Hit(value) => Some(value),
            CacheResult::Miss => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheResult<U> {
        match self {
            CacheResult::Hit(value) => CacheResult::Hit(f(value)),
            CacheResult::Miss => CacheResult::Miss,
        }
    }
}

impl<T> From<Option<T>> for CacheResult<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => CacheResult::Hit(value),
            None => CacheResult::Miss,
        }
    }
}

/// What a recompute request produced.
#[derive(Debug, Clone)]
pub enum RecomputeOutcome {
    /// This call built and published the snapshot.
    Completed(Arc<Snapshot>),
    /// Another pass was already running. No second pass was started; the
    /// snapshot is the one the in-flight pass published.
    AlreadyInProgress(Arc<Snapshot>),
}

impl RecomputeOutcome {
    pub fn snapshot(&self) -> &Arc<Snapshot> {
        match self {
            RecomputeOutcome::Completed(snapshot) => snapshot,
            RecomputeOutcome::AlreadyInProgress(snapshot) => snapshot,
        }
    }

    pub fn into_snapshot(self) -> Arc<Snapshot> {
        match self {
            RecomputeOutcome::Completed(snapshot) => snapshot,
            RecomputeOutcome::AlreadyInProgress(snapshot) => snapshot,
        }
    }

    pub fn was_in_progress(&self) -> bool {
        matches!(self, RecomputeOutcome::AlreadyInProgress(_))
    }
}

/// Point-in-time report of cache effectiveness.
#[derive(Debug, Clone, Serialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub total_requests: u64,
    /// Percentage of lookups served from the cache, rounded to two decimals.
    pub hit_rate: f64,
    pub computations: u64,
    /// Wall-clock time (ms since epoch) of the published snapshot, if any was built.
    pub last_recompute_at_ms: Option<u64>,
    pub last_recompute_duration_ms: f64,
    pub cached_pages: usize,
    pub cached_windows: usize,
    pub cached_ranks: usize,
    pub total_entries: usize,
    pub generation: u64,
    pub recompute_in_progress: bool,
}
