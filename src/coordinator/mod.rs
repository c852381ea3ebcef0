//! Consistency Coordinator Module
//!
//! Glues the authoritative `RankedSet`, the precomputed cache and the external
//! source of record into one engine.
//!
//! ## Core Concepts
//! - **Lifecycle**: `Uninitialized -> Bootstrapping -> Ready`. Writes are refused until
//!   the first bootstrap has succeeded.
//! - **Write Path**: Registration, score changes and removals mutate the tree under its
//!   write lock and then signal the scheduler (fire-and-forget, coalescing).
//! - **Read Path**: Cache first; on a miss (stale, evicted or never materialized) the
//!   answer comes from the tree, which is always correct.
//! - **Resync**: A full reload from the source of record that swaps the tree atomically
//!   while the engine keeps serving.
//!
//! ## Submodules
//! - **`coordinator`**: `ConsistencyCoordinator`, the write side and bootstrap protocol.
//! - **`scheduler`**: Background task that refreshes the cache on an interval and on signals.
//! - **`service`**: `Leaderboard`, the facade the API layer talks to.
//! - **`source`**: `SourceOfRecord` trait plus in-memory and JSON-file implementations.
//! - **`types`**: States, write results and rank reports.

pub mod coordinator;
pub mod scheduler;
pub mod service;
pub mod source;
pub mod types;

pub use coordinator::ConsistencyCoordinator;
pub use scheduler::{RecomputeScheduler, SchedulerHandle};
pub use service::Leaderboard;
pub use source::{JsonFileSource, MemorySource, SourceOfRecord, SourceRecord};
pub use types::{BootstrapReport, CoordinatorState, RankInfo, RankProjection, ScoreUpdate};
