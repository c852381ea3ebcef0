//! Ranking & Leaderboard Engine Library
//!
//! This library crate defines the modules that make up the in-memory leaderboard
//! engine. It serves as the foundation for the node binary (`main.rs`) and for any
//! API layer embedding the engine.
//!
//! ## Architecture Modules
//! - **`ranking`**: The authoritative order-statistics tree (`RankedSet`). Strict total
//!   order on (points desc, registration sequence asc, subject id asc) with logarithmic
//!   rank, select and mutation.
//! - **`cache`**: Immutable, periodically rebuilt snapshots of hot pages, around-me
//!   windows and ranks, published with a single atomic swap.
//! - **`coordinator`**: Write path, bootstrap/resync from the source of record, the
//!   background recompute scheduler and the `Leaderboard` facade.
//! - **`config`**: Tunables loaded from defaults, a JSON file and the environment.
//! - **`error`**: The engine's error taxonomy.

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod ranking;
