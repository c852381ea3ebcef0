//! Precomputed Cache Module
//!
//! Materializes the hot read paths of the leaderboard so that serving them never
//! touches the `RankedSet`.
//!
//! ## Core Concepts
//! - **Snapshot**: An immutable generation holding pages, around-me windows and ranks.
//! - **Copy-on-Write Publish**: New generations are built off to the side and swapped in
//!   with one atomic pointer store; the previous generation stays servable meanwhile.
//! - **Staleness**: A snapshot older than the configured threshold answers every lookup
//!   with `CacheResult::Miss`, pushing callers to the authoritative tree.
//!
//! ## Submodules
//! - **`precomputed`**: The cache itself (`PrecomputedCache`), metrics and the recompute gate.
//! - **`snapshot`**: Building a `Snapshot` from a `RankedSet`.
//! - **`types`**: `CacheResult`, `RecomputeOutcome`, keys and `CacheMetrics`.

pub mod precomputed;
pub mod snapshot;
pub mod types;

pub use precomputed::PrecomputedCache;
pub use snapshot::Snapshot;
pub use types::{CacheMetrics, CacheResult, PageKey, RecomputeOutcome, WindowKey};

#[cfg(test)]
mod tests;
