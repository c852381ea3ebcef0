//! Coordinator Data Types
//!
//! Lifecycle states, write results and the derived rank reports returned to the
//! API layer.

use crate::ranking::SubjectId;

use serde::Serialize;
use std::time::Duration;

/// Lifecycle of the engine's ranking data.
///
/// `Uninitialized -> Bootstrapping -> Ready`. A failed first bootstrap falls back
/// to `Uninitialized`; once `Ready`, a resync never leaves `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CoordinatorState {
    Uninitialized,
    Bootstrapping,
    Ready,
}

/// Result of applying a score-change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScoreUpdate {
    /// The event carried the stored values; the tree was not touched.
    Unchanged { rank: u64 },
    Changed { previous_rank: u64, new_rank: u64 },
}

impl ScoreUpdate {
    pub fn rank(&self) -> u64 {
        match self {
            ScoreUpdate::Unchanged { rank } => *rank,
            ScoreUpdate::Changed { new_rank, .. } => *new_rank,
        }
    }

    /// Positive when the subject moved up the leaderboard.
    pub fn rank_delta(&self) -> i64 {
        match self {
            ScoreUpdate::Unchanged { .. } => 0,
            ScoreUpdate::Changed {
                previous_rank,
                new_rank,
            } => *previous_rank as i64 - *new_rank as i64,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BootstrapReport {
    pub loaded_entries: usize,
    pub replaced_entries: usize,
    /// `true` when the engine was already `Ready` (a resync rather than a cold start).
    pub resync: bool,
    pub elapsed: Duration,
}

/// Everything the API layer shows on a subject's rank card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankInfo {
    pub subject_id: SubjectId,
    pub name: String,
    pub points: i64,
    pub activity_count: u64,
    pub baseline_rank: u64,
    pub current_rank: u64,
    pub rank_improvement: i64,
    /// Share of the leaderboard at or below this subject, one decimal.
    pub percentile: f64,
    /// Points needed to overtake the subject directly above; 0 at rank 1.
    pub points_to_next_rank: i64,
    pub total_entries: usize,
}

/// Where a subject would land after earning points, without applying them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankProjection {
    pub subject_id: SubjectId,
    pub current_rank: u64,
    pub projected_rank: u64,
    pub rank_improvement: i64,
    pub points_earned: i64,
    pub projected_points: i64,
}
