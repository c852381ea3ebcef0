//! Precomputed Leaderboard Cache
//!
//! Serves hot reads (pages, around-me windows, ranks) from an immutable
//! `Snapshot` published through an `ArcSwap`. Readers take no lock: a lookup is
//! an atomic pointer load plus a hash lookup.
//!
//! ## Refresh Protocol
//! 1. A recompute takes the recompute gate, so at most one pass runs at a time.
//! 2. It builds a complete new snapshot under the `RankedSet` read lock.
//! 3. It publishes with a single `ArcSwap::store`. The previous snapshot stays
//!    valid for readers that already loaded it.

use super::snapshot::Snapshot;
use super::types::{CacheMetrics, CacheResult, RecomputeOutcome};
use crate::config::LeaderboardConfig;
use crate::ranking::{RankedEntry, RankedSet, SubjectId};

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

pub struct PrecomputedCache {
    current: ArcSwap<Snapshot>,
    config: LeaderboardConfig,
    /// Held for the whole duration of a build, and only by builds.
    gate: Mutex<()>,
    in_progress: AtomicBool,
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    computations: AtomicU64,
    last_duration_us: AtomicU64,
}

impl PrecomputedCache {
    pub fn new(config: LeaderboardConfig) -> Self {
        tracing::info!(
            "Precomputed cache initialized (page_sizes={:?}, max_pages={}, windows={:?})",
            config.page_sizes,
            config.max_pages,
            config.around_windows
        );

        Self {
            current: ArcSwap::from_pointee(Snapshot::empty()),
            config,
            gate: Mutex::new(()),
            in_progress: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            computations: AtomicU64::new(0),
            last_duration_us: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &LeaderboardConfig {
        &self.config
    }

    /// The currently published snapshot, regardless of age.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    pub fn get_page(&self, page: u64, page_size: u64) -> CacheResult<Arc<[RankedEntry]>> {
        self.lookup(|snapshot| snapshot.page(page, page_size).cloned())
    }

    pub fn get_around_me(&self, subject_id: SubjectId, window: u64) -> CacheResult<Arc<[RankedEntry]>> {
        self.lookup(|snapshot| snapshot.window(subject_id, window).cloned())
    }

    pub fn get_rank(&self, subject_id: SubjectId) -> CacheResult<u64> {
        self.lookup(|snapshot| snapshot.rank(subject_id))
    }

    fn lookup<T>(&self, find: impl FnOnce(&Snapshot) -> Option<T>) -> CacheResult<T> {
        let snapshot = self.current.load();

        let found = if snapshot.is_fresh(self.config.max_staleness()) {
            find(&**snapshot)
        } else {
            tracing::trace!(
                "Snapshot generation {} is stale ({:?} old)",
                snapshot.generation(),
                snapshot.age()
            );
            None
        };

        match found {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                CacheResult::Hit(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                CacheResult::Miss
            }
        }
    }

    /// Rebuilds and publishes a snapshot, or joins the pass already running.
    ///
    /// Never starts a second concurrent pass: a caller arriving while another
    /// pass runs blocks until it completes and receives its snapshot as
    /// `RecomputeOutcome::AlreadyInProgress`.
    pub fn recompute(&self, set: &RwLock<RankedSet>) -> RecomputeOutcome {
        if let Some(_gate) = self.gate.try_lock() {
            return RecomputeOutcome::Completed(self.rebuild(set));
        }

        tracing::debug!("Recompute already in progress, waiting for the in-flight pass");
        let _gate = self.gate.lock();
        RecomputeOutcome::AlreadyInProgress(self.current.load_full())
    }

    /// Scheduler variant of `recompute`: skips instead of waiting when busy.
    pub fn try_refresh(&self, set: &RwLock<RankedSet>) -> Option<Arc<Snapshot>> {
        let Some(_gate) = self.gate.try_lock() else {
            tracing::debug!("Recompute already in progress, skipping scheduled refresh");
            return None;
        };
        Some(self.rebuild(set))
    }

    fn rebuild(&self, set: &RwLock<RankedSet>) -> Arc<Snapshot> {
        self.in_progress.store(true, Ordering::SeqCst);
        let started = Instant::now();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let snapshot = {
            let set = set.read();
            Arc::new(Snapshot::build(&set, &self.config, generation))
        };
        self.current.store(snapshot.clone());

        let elapsed = started.elapsed();
        self.computations.fetch_add(1, Ordering::Relaxed);
        self.last_duration_us
            .store(elapsed.as_micros() as u64, Ordering::Relaxed);
        self.in_progress.store(false, Ordering::SeqCst);

        tracing::info!(
            "Snapshot generation {} published in {:?}: {} pages, {} windows, {} ranks",
            generation,
            elapsed,
            snapshot.page_count(),
            snapshot.window_count(),
            snapshot.rank_count()
        );

        snapshot
    }

    /// Drops all cached data; every lookup misses until the next recompute.
    ///
    /// Does not take the recompute gate: only rebuilds hold it, so a caller
    /// waiting on the gate always receives a freshly built snapshot. A pass
    /// running concurrently publishes over the empty placeholder.
    pub fn clear(&self) {
        self.current.store(Arc::new(Snapshot::empty()));
        tracing::info!("Precomputed cache cleared");
    }

    pub fn metrics(&self) -> CacheMetrics {
        let snapshot = self.current.load();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total_requests = hits + misses;
        let hit_rate = if total_requests > 0 {
            (hits as f64 / total_requests as f64 * 10_000.0).round() / 100.0
        } else {
            0.0
        };

        CacheMetrics {
            hits,
            misses,
            total_requests,
            hit_rate,
            computations: self.computations.load(Ordering::Relaxed),
            last_recompute_at_ms: (snapshot.generation() > 0).then(|| snapshot.computed_at_ms()),
            last_recompute_duration_ms: self.last_duration_us.load(Ordering::Relaxed) as f64 / 1_000.0,
            cached_pages: snapshot.page_count(),
            cached_windows: snapshot.window_count(),
            cached_ranks: snapshot.rank_count(),
            total_entries: snapshot.total_entries(),
            generation: snapshot.generation(),
            recompute_in_progress: self.in_progress.load(Ordering::SeqCst),
        }
    }
}
