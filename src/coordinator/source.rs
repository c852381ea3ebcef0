//! Source of Record
//!
//! The external store that owns durable leaderboard data. The engine only ever
//! asks it for one thing: a full dump of every rankable subject, already in rank
//! order, used to bootstrap or resync the `RankedSet`.

use crate::ranking::{RankKey, SubjectId};

use anyhow::{Context, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

/// One row of the bootstrap dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub subject_id: SubjectId,
    pub name: String,
    pub points: i64,
    #[serde(default)]
    pub activity_count: u64,
    pub registration_seq: u64,
    /// Stored baseline rank; derived from registration order when absent.
    #[serde(default)]
    pub baseline_rank: Option<u64>,
}

impl SourceRecord {
    pub fn key(&self) -> RankKey {
        RankKey {
            points: self.points,
            registration_seq: self.registration_seq,
            subject_id: self.subject_id,
        }
    }
}

/// Boxed future returned by `SourceOfRecord::load_all_ranked_entries`.
pub type LoadFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<SourceRecord>>> + Send + 'a>>;

pub trait SourceOfRecord: Send + Sync {
    /// Full dump of all rankable subjects in rank order.
    fn load_all_ranked_entries(&self) -> LoadFuture<'_>;
}

/// In-process source of record backed by a concurrent map.
///
/// Useful for embedding the engine next to a store that pushes its rows in, and
/// as the test double for bootstrap flows.
#[derive(Default)]
pub struct MemorySource {
    records: DashMap<SubjectId, SourceRecord>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = SourceRecord>) -> Self {
        let source = Self::new();
        for record in records {
            source.upsert(record);
        }
        source
    }

    pub fn upsert(&self, record: SourceRecord) {
        self.records.insert(record.subject_id, record);
    }

    pub fn remove(&self, subject_id: SubjectId) -> Option<SourceRecord> {
        self.records.remove(&subject_id).map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SourceOfRecord for MemorySource {
    fn load_all_ranked_entries(&self) -> LoadFuture<'_> {
        Box::pin(async move {
            let mut records: Vec<SourceRecord> = self
                .records
                .iter()
                .map(|entry| entry.value().clone())
                .collect();
            records.sort_by_key(|record| record.key());
            Ok(records)
        })
    }
}

/// Reads the dump from a JSON array file.
///
/// The file is taken as-is; an unordered file is rejected by bootstrap validation.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SourceOfRecord for JsonFileSource {
    fn load_all_ranked_entries(&self) -> LoadFuture<'_> {
        Box::pin(async move {
            let raw = tokio::fs::read_to_string(&self.path)
                .await
                .with_context(|| format!("reading dump {}", self.path.display()))?;
            let records: Vec<SourceRecord> = serde_json::from_str(&raw)
                .with_context(|| format!("parsing dump {}", self.path.display()))?;
            tracing::debug!("Loaded {} records from {}", records.len(), self.path.display());
            Ok(records)
        })
    }
}
