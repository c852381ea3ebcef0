//! Leaderboard Facade
//!
//! Single entry point for the API layer. Reads go to the precomputed cache first
//! and fall back to the authoritative `RankedSet` on a miss; writes are delegated
//! to the `ConsistencyCoordinator`.

use super::coordinator::ConsistencyCoordinator;
use super::scheduler::{RecomputeScheduler, SchedulerHandle};
use super::source::SourceOfRecord;
use super::types::{BootstrapReport, CoordinatorState, RankInfo, RankProjection, ScoreUpdate};
use crate::cache::{CacheMetrics, CacheResult, PrecomputedCache, RecomputeOutcome};
use crate::config::LeaderboardConfig;
use crate::error::{LeaderboardError, Result};
use crate::ranking::{RankEntry, RankKey, RankedEntry, RankedSet, SubjectId};

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Notify;

pub struct Leaderboard {
    config: LeaderboardConfig,
    set: Arc<RwLock<RankedSet>>,
    cache: Arc<PrecomputedCache>,
    coordinator: ConsistencyCoordinator,
    refresh_signal: Arc<Notify>,
}

impl Leaderboard {
    pub fn new(config: LeaderboardConfig) -> Arc<Self> {
        let set = Arc::new(RwLock::new(RankedSet::new()));
        let refresh_signal = Arc::new(Notify::new());

        Arc::new(Self {
            cache: Arc::new(PrecomputedCache::new(config.clone())),
            coordinator: ConsistencyCoordinator::new(set.clone(), refresh_signal.clone()),
            config,
            set,
            refresh_signal,
        })
    }

    pub fn config(&self) -> &LeaderboardConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &ConsistencyCoordinator {
        &self.coordinator
    }

    pub fn cache(&self) -> &Arc<PrecomputedCache> {
        &self.cache
    }

    pub fn state(&self) -> CoordinatorState {
        self.coordinator.state()
    }

    pub fn total_entries(&self) -> usize {
        self.set.read().len()
    }

    // ============================================================
    // WRITE PATH
    // ============================================================

    pub async fn bootstrap(&self, source: &dyn SourceOfRecord) -> Result<BootstrapReport> {
        self.coordinator.bootstrap(source).await
    }

    pub fn register(&self, subject_id: SubjectId, name: impl Into<String>) -> Result<RankedEntry> {
        self.coordinator.register(subject_id, name)
    }

    pub fn on_score_changed(
        &self,
        subject_id: SubjectId,
        new_points: i64,
        new_activity_count: u64,
    ) -> Result<ScoreUpdate> {
        self.coordinator
            .on_score_changed(subject_id, new_points, new_activity_count)
    }

    pub fn remove(&self, subject_id: SubjectId) -> Result<RankEntry> {
        self.coordinator.remove(subject_id)
    }

    // ============================================================
    // READ PATH
    // ============================================================

    /// One page of the leaderboard (1-based). A page past the end is empty.
    pub fn get_page(&self, page: u64, page_size: u64) -> Result<Arc<[RankedEntry]>> {
        if page == 0 || page_size == 0 {
            return Err(LeaderboardError::InvalidPage { page, page_size });
        }

        if let CacheResult::Hit(rows) = self.cache.get_page(page, page_size) {
            return Ok(rows);
        }

        let start = (page - 1).saturating_mul(page_size).saturating_add(1);
        let end = start.saturating_add(page_size - 1);
        tracing::trace!("Page {} (size {}) served from the ranked set", page, page_size);
        Ok(self.set.read().select_range(start, end).into())
    }

    /// Up to `window` neighbours on each side of the subject, plus the subject.
    ///
    /// Served from the snapshot while it is fresh, so writes (including removals)
    /// show up only after the next refresh.
    pub fn get_around_me(&self, subject_id: SubjectId, window: u64) -> Result<Arc<[RankedEntry]>> {
        if let CacheResult::Hit(rows) = self.cache.get_around_me(subject_id, window) {
            return Ok(rows);
        }

        self.set
            .read()
            .around(subject_id, window)
            .map(Arc::from)
            .ok_or(LeaderboardError::NotFound(subject_id))
    }

    pub fn get_around_me_default(&self, subject_id: SubjectId) -> Result<Arc<[RankedEntry]>> {
        self.get_around_me(subject_id, self.config.default_window)
    }

    /// Cache-first like `get_around_me`: a subject removed since the last refresh
    /// keeps its cached rank until then. Use `rank_info` for the live value.
    pub fn get_rank(&self, subject_id: SubjectId) -> Result<u64> {
        if let CacheResult::Hit(rank) = self.cache.get_rank(subject_id) {
            return Ok(rank);
        }

        self.set
            .read()
            .rank_of(subject_id)
            .ok_or(LeaderboardError::NotFound(subject_id))
    }

    /// Rank card computed directly from the tree.
    pub fn rank_info(&self, subject_id: SubjectId) -> Result<RankInfo> {
        let set = self.set.read();
        let entry = set
            .get(subject_id)
            .ok_or(LeaderboardError::NotFound(subject_id))?;
        let current_rank = set
            .rank_of(subject_id)
            .ok_or(LeaderboardError::NotFound(subject_id))?;
        let total = set.len();

        let percentile = ((total as u64 - current_rank + 1) as f64 / total as f64 * 1_000.0).round() / 10.0;
        let points_to_next_rank = match current_rank {
            1 => 0,
            _ => set
                .entry_at(current_rank - 1)
                .map(|above| (above.entry.points - entry.points + 1).max(0))
                .unwrap_or(0),
        };

        Ok(RankInfo {
            subject_id,
            name: entry.name.clone(),
            points: entry.points,
            activity_count: entry.activity_count,
            baseline_rank: entry.baseline_rank,
            current_rank,
            rank_improvement: entry.baseline_rank as i64 - current_rank as i64,
            percentile,
            points_to_next_rank,
            total_entries: total,
        })
    }

    /// Rank the subject would hold after earning `points_earned`, without
    /// touching the tree.
    pub fn project_rank(&self, subject_id: SubjectId, points_earned: i64) -> Result<RankProjection> {
        let set = self.set.read();
        let entry = set
            .get(subject_id)
            .ok_or(LeaderboardError::NotFound(subject_id))?;
        let current_rank = set
            .rank_of(subject_id)
            .ok_or(LeaderboardError::NotFound(subject_id))?;

        let current_key = entry.key();
        let projected_key = RankKey {
            points: entry.points.saturating_add(points_earned),
            ..current_key
        };
        // The subject still sits at its current key; don't count it as ahead of itself.
        let mut ahead = set.position_of(&projected_key) as u64;
        if current_key < projected_key {
            ahead -= 1;
        }
        let projected_rank = ahead + 1;

        Ok(RankProjection {
            subject_id,
            current_rank,
            projected_rank,
            rank_improvement: current_rank as i64 - projected_rank as i64,
            points_earned,
            projected_points: projected_key.points,
        })
    }

    // ============================================================
    // CACHE CONTROL
    // ============================================================

    /// Synchronous rebuild; blocks on the tree lock. Async callers should run it
    /// on the blocking pool.
    pub fn force_recompute(&self) -> RecomputeOutcome {
        self.cache.recompute(&self.set)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_metrics(&self) -> CacheMetrics {
        self.cache.metrics()
    }

    /// Wakes the scheduler for an out-of-band refresh.
    pub fn trigger_refresh(&self) {
        self.refresh_signal.notify_one();
    }

    pub fn start_scheduler(&self) -> SchedulerHandle {
        RecomputeScheduler::new(
            self.cache.clone(),
            self.set.clone(),
            self.refresh_signal.clone(),
            self.config.refresh_interval(),
            self.config.refresh_debounce(),
        )
        .start()
    }
}
