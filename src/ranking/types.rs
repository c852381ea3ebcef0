//! Ranking Data Types
//!
//! Defines the canonical entry stored in the `RankedSet`, the composite sort key
//! that gives the leaderboard its strict total order, and the rank-annotated view
//! returned by queries.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Identifier of a ranked subject (a user in the leaderboard).
pub type SubjectId = u64;

/// Composite sort key of an entry.
///
/// Ordering is points descending, then registration sequence ascending, then
/// subject id ascending. The subject id makes the order strict: two distinct
/// subjects never compare equal, even when a bulk import assigned them the same
/// registration sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RankKey {
    pub points: i64,
    pub registration_seq: u64,
    pub subject_id: SubjectId,
}

impl Ord for RankKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .points
            .cmp(&self.points)
            .then_with(|| self.registration_seq.cmp(&other.registration_seq))
            .then_with(|| self.subject_id.cmp(&other.subject_id))
    }
}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The canonical record of a ranked subject.
///
/// Owned exclusively by the `RankedSet`. Everything else (cache snapshots, query
/// results) holds clones. The current rank is intentionally absent: it is always
/// derived from the entry's position in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankEntry {
    pub subject_id: SubjectId,
    pub name: String,
    pub points: i64,
    /// Monotonic registration order. Assigned once, used as the first tiebreak.
    pub registration_seq: u64,
    /// Shares / activity counter. Informational only, never affects ordering.
    pub activity_count: u64,
    /// Rank at the instant the subject was created. Never modified afterwards.
    pub baseline_rank: u64,
}

impl RankEntry {
    pub fn key(&self) -> RankKey {
        RankKey {
            points: self.points,
            registration_seq: self.registration_seq,
            subject_id: self.subject_id,
        }
    }
}

/// An entry paired with the rank it held when the query ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub rank: u64,
    #[serde(flatten)]
    pub entry: RankEntry,
}

impl RankedEntry {
    /// Positive when the subject climbed above its baseline rank.
    pub fn rank_improvement(&self) -> i64 {
        self.entry.baseline_rank as i64 - self.rank as i64
    }
}

/// Result of `RankedSet::insert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The subject was not present before.
    Inserted,
    /// The subject existed and its stored entry changed.
    Updated,
    /// The subject existed with identical values; the tree was not touched.
    Unchanged,
}
