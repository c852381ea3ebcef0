//! Immutable Snapshot Generation
//!
//! A `Snapshot` is one fully materialized generation of the read cache, built in
//! a single in-order pass over the `RankedSet`. Once built it is never mutated;
//! a refresh replaces it wholesale.

use super::types::{PageKey, WindowKey};
use crate::config::LeaderboardConfig;
use crate::ranking::{RankedEntry, RankedSet, SubjectId};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub struct Snapshot {
    pages: HashMap<PageKey, Arc<[RankedEntry]>>,
    windows: HashMap<WindowKey, Arc<[RankedEntry]>>,
    ranks: HashMap<SubjectId, u64>,
    total_entries: usize,
    /// 0 for the empty placeholder, then increasing with every rebuild.
    generation: u64,
    computed_at: Instant,
    computed_at_ms: u64,
}

impl Snapshot {
    /// Placeholder published before the first build and after `clear`.
    pub fn empty() -> Self {
        Self {
            pages: HashMap::new(),
            windows: HashMap::new(),
            ranks: HashMap::new(),
            total_entries: 0,
            generation: 0,
            computed_at: Instant::now(),
            computed_at_ms: now_ms(),
        }
    }

    pub fn build(set: &RankedSet, config: &LeaderboardConfig, generation: u64) -> Self {
        let rows: Vec<RankedEntry> = set
            .iter()
            .enumerate()
            .map(|(pos, entry)| RankedEntry {
                rank: pos as u64 + 1,
                entry: entry.clone(),
            })
            .collect();
        let total = rows.len() as u64;

        let mut pages = HashMap::new();
        for &page_size in config.page_sizes.iter().filter(|&&size| size > 0) {
            let page_count = total.div_ceil(page_size).min(config.max_pages);
            for page in 1..=page_count {
                let start = (page - 1) * page_size;
                let end = (start + page_size).min(total);
                pages.insert(
                    PageKey { page, page_size },
                    Arc::from(&rows[start as usize..end as usize]),
                );
            }
        }

        let mut windows = HashMap::new();
        for row in rows.iter().take(config.around_me_subjects) {
            for &window in &config.around_windows {
                let start = row.rank.saturating_sub(window).max(1);
                let end = row.rank.saturating_add(window).min(total);
                windows.insert(
                    WindowKey {
                        subject_id: row.entry.subject_id,
                        window,
                    },
                    Arc::from(&rows[(start - 1) as usize..end as usize]),
                );
            }
        }

        let ranks = rows
            .iter()
            .map(|row| (row.entry.subject_id, row.rank))
            .collect();

        Self {
            pages,
            windows,
            ranks,
            total_entries: rows.len(),
            generation,
            computed_at: Instant::now(),
            computed_at_ms: now_ms(),
        }
    }

    pub fn page(&self, page: u64, page_size: u64) -> Option<&Arc<[RankedEntry]>> {
        self.pages.get(&PageKey { page, page_size })
    }

    pub fn window(&self, subject_id: SubjectId, window: u64) -> Option<&Arc<[RankedEntry]>> {
        self.windows.get(&WindowKey { subject_id, window })
    }

    pub fn rank(&self, subject_id: SubjectId) -> Option<u64> {
        self.ranks.get(&subject_id).copied()
    }

    pub fn age(&self) -> Duration {
        self.computed_at.elapsed()
    }

    pub fn is_fresh(&self, max_staleness: Duration) -> bool {
        self.age() < max_staleness
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn total_entries(&self) -> usize {
        self.total_entries
    }

    pub fn computed_at_ms(&self) -> u64 {
        self.computed_at_ms
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    pub fn rank_count(&self) -> usize {
        self.ranks.len()
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("generation", &self.generation)
            .field("total_entries", &self.total_entries)
            .field("pages", &self.pages.len())
            .field("windows", &self.windows.len())
            .field("computed_at_ms", &self.computed_at_ms)
            .finish()
    }
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
