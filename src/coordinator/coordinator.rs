//! Consistency Coordinator
//!
//! Owns the write side of the engine: every mutation of the `RankedSet` goes
//! through here, and every mutation that changes an ordering key signals the
//! cache scheduler.
//!
//! ## Bootstrap Protocol
//! 1. Fetch the full dump from the source of record without holding any lock.
//! 2. Validate it (unique ids, strict rank order, positive baselines).
//! 3. Build the new tree off to the side in linear time.
//! 4. Swap it in under the write lock, so readers see either the old or the new set.
//!
//! A failure at any step leaves the previous tree untouched.

use super::source::{SourceOfRecord, SourceRecord};
use super::types::{BootstrapReport, CoordinatorState, ScoreUpdate};
use crate::error::{LeaderboardError, Result};
use crate::ranking::{RankEntry, RankedEntry, RankedSet, SubjectId};

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::Notify;

pub struct ConsistencyCoordinator {
    set: Arc<RwLock<RankedSet>>,
    state: Mutex<CoordinatorState>,
    /// Serializes bootstrap/resync runs; held across the source fetch.
    bootstrap_gate: tokio::sync::Mutex<()>,
    refresh_signal: Arc<Notify>,
    signals_sent: AtomicU64,
}

impl ConsistencyCoordinator {
    pub fn new(set: Arc<RwLock<RankedSet>>, refresh_signal: Arc<Notify>) -> Self {
        Self {
            set,
            state: Mutex::new(CoordinatorState::Uninitialized),
            bootstrap_gate: tokio::sync::Mutex::new(()),
            refresh_signal,
            signals_sent: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.lock()
    }

    pub fn ranked_set(&self) -> &Arc<RwLock<RankedSet>> {
        &self.set
    }

    /// Number of refresh signals raised so far (coalesced or not).
    pub fn signals_sent(&self) -> u64 {
        self.signals_sent.load(Ordering::Relaxed)
    }

    fn set_state(&self, next: CoordinatorState) {
        let mut state = self.state.lock();
        if *state != next {
            tracing::info!("Coordinator state {:?} -> {:?}", *state, next);
            *state = next;
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state() {
            CoordinatorState::Ready => Ok(()),
            other => Err(LeaderboardError::NotReady(other)),
        }
    }

    /// Fire-and-forget. Pending signals collapse into one stored permit.
    fn signal_refresh(&self) {
        self.signals_sent.fetch_add(1, Ordering::Relaxed);
        self.refresh_signal.notify_one();
    }

    // ============================================================
    // WRITE PATH
    // ============================================================

    /// Adds a new subject at the bottom of its score class.
    ///
    /// The subject starts with zero points, the next registration sequence and a
    /// baseline rank equal to the leaderboard size after insertion.
    pub fn register(&self, subject_id: SubjectId, name: impl Into<String>) -> Result<RankedEntry> {
        self.ensure_ready()?;

        let registered = {
            let mut set = self.set.write();
            if set.contains(subject_id) {
                return Err(LeaderboardError::AlreadyRegistered(subject_id));
            }

            let registration_seq = set
                .max_sequence()
                .checked_add(1)
                .ok_or(LeaderboardError::RegistrationSequenceExhausted)?;
            let entry = RankEntry {
                subject_id,
                name: name.into(),
                points: 0,
                registration_seq,
                activity_count: 0,
                baseline_rank: set.len() as u64 + 1,
            };
            set.insert(entry.clone());
            let rank = set
                .rank_of(subject_id)
                .ok_or(LeaderboardError::NotFound(subject_id))?;
            RankedEntry { rank, entry }
        };

        tracing::debug!(
            "Registered subject {} at rank {} (seq {})",
            subject_id,
            registered.rank,
            registered.entry.registration_seq
        );
        self.signal_refresh();
        Ok(registered)
    }

    /// Applies a score-change event from the write path.
    ///
    /// Idempotent: an event carrying the stored values leaves the tree untouched
    /// and raises no refresh signal.
    pub fn on_score_changed(
        &self,
        subject_id: SubjectId,
        new_points: i64,
        new_activity_count: u64,
    ) -> Result<ScoreUpdate> {
        self.ensure_ready()?;

        let update = {
            let mut set = self.set.write();
            let previous_rank = set
                .rank_of(subject_id)
                .ok_or(LeaderboardError::NotFound(subject_id))?;
            let Some(current) = set.get(subject_id) else {
                return Err(LeaderboardError::NotFound(subject_id));
            };

            if current.points == new_points && current.activity_count == new_activity_count {
                return Ok(ScoreUpdate::Unchanged {
                    rank: previous_rank,
                });
            }

            let mut entry = current.clone();
            entry.points = new_points;
            entry.activity_count = new_activity_count;
            set.insert(entry);

            let new_rank = set
                .rank_of(subject_id)
                .ok_or(LeaderboardError::NotFound(subject_id))?;
            ScoreUpdate::Changed {
                previous_rank,
                new_rank,
            }
        };

        tracing::debug!("Subject {} score -> {}: {:?}", subject_id, new_points, update);
        self.signal_refresh();
        Ok(update)
    }

    /// Removes a subject. Everyone below it moves up one derived rank; stored
    /// baselines are not rewritten.
    pub fn remove(&self, subject_id: SubjectId) -> Result<RankEntry> {
        self.ensure_ready()?;

        let removed = self
            .set
            .write()
            .delete(subject_id)
            .ok_or(LeaderboardError::NotFound(subject_id))?;

        tracing::debug!("Removed subject {}", subject_id);
        self.signal_refresh();
        Ok(removed)
    }

    // ============================================================
    // BOOTSTRAP / RESYNC
    // ============================================================

    /// Loads the full dump from `source` and atomically replaces the tree.
    ///
    /// From `Uninitialized` this moves through `Bootstrapping` to `Ready`; when
    /// already `Ready` it is a resync and the engine keeps serving throughout.
    /// Writes that land while the dump is being fetched are superseded by it.
    pub async fn bootstrap(&self, source: &dyn SourceOfRecord) -> Result<BootstrapReport> {
        let _gate = self.bootstrap_gate.lock().await;
        let resync = self.state() == CoordinatorState::Ready;
        if !resync {
            self.set_state(CoordinatorState::Bootstrapping);
        }
        let mut attempt = BootstrapAttempt {
            coordinator: self,
            resync,
            completed: false,
        };

        tracing::info!("{} from source of record", if resync { "Resyncing" } else { "Bootstrapping" });
        let started = Instant::now();

        let records = match source.load_all_ranked_entries().await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!("Source of record unavailable: {:#}", e);
                return Err(LeaderboardError::BootstrapSourceUnavailable(e));
            }
        };

        let entries = match prepare_entries(records) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("Rejected bootstrap payload: {}", e);
                return Err(e);
            }
        };

        let fresh = RankedSet::from_sorted(entries);
        let loaded_entries = fresh.len();
        let previous = std::mem::replace(&mut *self.set.write(), fresh);
        let replaced_entries = previous.len();
        drop(previous);

        attempt.completed = true;
        self.set_state(CoordinatorState::Ready);
        self.signal_refresh();

        let report = BootstrapReport {
            loaded_entries,
            replaced_entries,
            resync,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            "Loaded {} entries (replaced {}) in {:?}",
            report.loaded_entries,
            report.replaced_entries,
            report.elapsed
        );
        Ok(report)
    }

    fn abort_bootstrap(&self, resync: bool) {
        if !resync {
            self.set_state(CoordinatorState::Uninitialized);
        }
    }
}

/// Rolls the state back when a bootstrap ends without swapping in a new tree,
/// including when the bootstrap future is dropped mid-fetch.
struct BootstrapAttempt<'a> {
    coordinator: &'a ConsistencyCoordinator,
    resync: bool,
    completed: bool,
}

impl Drop for BootstrapAttempt<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.coordinator.abort_bootstrap(self.resync);
        }
    }
}

/// Validates a dump and turns it into tree entries.
///
/// Missing baselines are derived from registration order: the k-th registered
/// subject gets baseline k.
fn prepare_entries(records: Vec<SourceRecord>) -> Result<Vec<RankEntry>> {
    let mut seen = HashSet::with_capacity(records.len());
    for (position, record) in records.iter().enumerate() {
        if !seen.insert(record.subject_id) {
            return Err(LeaderboardError::CorruptedBootstrapPayload(format!(
                "duplicate subject {} at position {}",
                record.subject_id, position
            )));
        }
        if record.baseline_rank == Some(0) {
            return Err(LeaderboardError::CorruptedBootstrapPayload(format!(
                "subject {} has baseline rank 0",
                record.subject_id
            )));
        }
        if position > 0 && records[position - 1].key() >= record.key() {
            return Err(LeaderboardError::CorruptedBootstrapPayload(format!(
                "dump is not in rank order at position {} (subject {})",
                position, record.subject_id
            )));
        }
    }

    let derived: HashMap<SubjectId, u64> = if records.iter().any(|r| r.baseline_rank.is_none()) {
        let mut by_registration: Vec<(u64, SubjectId)> = records
            .iter()
            .map(|r| (r.registration_seq, r.subject_id))
            .collect();
        by_registration.sort_unstable();
        by_registration
            .into_iter()
            .enumerate()
            .map(|(index, (_, subject_id))| (subject_id, index as u64 + 1))
            .collect()
    } else {
        HashMap::new()
    };

    Ok(records
        .into_iter()
        .map(|record| {
            let baseline_rank = record
                .baseline_rank
                .or_else(|| derived.get(&record.subject_id).copied())
                .unwrap_or(1);
            RankEntry {
                subject_id: record.subject_id,
                name: record.name,
                points: record.points,
                registration_seq: record.registration_seq,
                activity_count: record.activity_count,
                baseline_rank,
            }
        })
        .collect())
}
