//! Ranking Module
//!
//! The authoritative in-memory ranking of all subjects.
//!
//! ## Core Concepts
//! - **Strict Total Order**: Points descending, registration sequence ascending, subject id
//!   ascending. No two subjects ever tie.
//! - **Derived Rank**: A subject's rank is never stored. It is `1 + (entries before it)`,
//!   computed from subtree-size counters in O(log n).
//! - **Immutable Identity Fields**: Registration sequence and baseline rank are fixed when
//!   the subject is first inserted and survive every later score change.
//!
//! ## Submodules
//! - **`tree`**: The AVL order-statistics tree (`RankedSet`).
//! - **`types`**: Entries, sort keys and rank-annotated results.

pub mod tree;
pub mod types;

pub use tree::RankedSet;
pub use types::{InsertOutcome, RankEntry, RankKey, RankedEntry, SubjectId};
