//! Engine Configuration
//!
//! Tunables for cache contents, staleness and the refresh schedule. Values come
//! from defaults, optionally overlaid by a JSON file and then by `LEADERBOARD_*`
//! environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PAGE_SIZE: u64 = 50;
pub const DEFAULT_MAX_PAGES: u64 = 100;
pub const DEFAULT_AROUND_WINDOWS: [u64; 3] = [3, 5, 10];
pub const DEFAULT_AROUND_ME_SUBJECTS: usize = 1_000;
pub const DEFAULT_WINDOW: u64 = 5;
pub const DEFAULT_MAX_STALENESS_SECS: u64 = 300;
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_REFRESH_DEBOUNCE_MS: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardConfig {
    /// Page sizes materialized in every snapshot.
    pub page_sizes: Vec<u64>,
    /// Highest page number materialized per page size.
    pub max_pages: u64,
    /// Around-me radii materialized per subject.
    pub around_windows: Vec<u64>,
    /// Around-me windows are precomputed for this many top-ranked subjects.
    pub around_me_subjects: usize,
    /// Radius used when a caller does not ask for one.
    pub default_window: u64,
    /// Snapshots older than this are treated as misses.
    pub max_staleness_secs: u64,
    /// Period of the scheduled recompute.
    pub refresh_interval_secs: u64,
    /// Minimum gap between signal-triggered recomputes.
    pub refresh_debounce_ms: u64,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            page_sizes: vec![DEFAULT_PAGE_SIZE],
            max_pages: DEFAULT_MAX_PAGES,
            around_windows: DEFAULT_AROUND_WINDOWS.to_vec(),
            around_me_subjects: DEFAULT_AROUND_ME_SUBJECTS,
            default_window: DEFAULT_WINDOW,
            max_staleness_secs: DEFAULT_MAX_STALENESS_SECS,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            refresh_debounce_ms: DEFAULT_REFRESH_DEBOUNCE_MS,
        }
    }
}

impl LeaderboardConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Overlays `LEADERBOARD_*` environment variables onto this config.
    pub fn apply_env(mut self) -> Result<Self> {
        if let Some(value) = env_var("LEADERBOARD_PAGE_SIZES") {
            self.page_sizes = parse_list(&value, "LEADERBOARD_PAGE_SIZES")?;
        }
        if let Some(value) = env_var("LEADERBOARD_MAX_PAGES") {
            self.max_pages = parse_value(&value, "LEADERBOARD_MAX_PAGES")?;
        }
        if let Some(value) = env_var("LEADERBOARD_AROUND_WINDOWS") {
            self.around_windows = parse_list(&value, "LEADERBOARD_AROUND_WINDOWS")?;
        }
        if let Some(value) = env_var("LEADERBOARD_AROUND_ME_SUBJECTS") {
            self.around_me_subjects = parse_value(&value, "LEADERBOARD_AROUND_ME_SUBJECTS")?;
        }
        if let Some(value) = env_var("LEADERBOARD_DEFAULT_WINDOW") {
            self.default_window = parse_value(&value, "LEADERBOARD_DEFAULT_WINDOW")?;
        }
        if let Some(value) = env_var("LEADERBOARD_MAX_STALENESS_SECS") {
            self.max_staleness_secs = parse_value(&value, "LEADERBOARD_MAX_STALENESS_SECS")?;
        }
        if let Some(value) = env_var("LEADERBOARD_REFRESH_INTERVAL_SECS") {
            self.refresh_interval_secs = parse_value(&value, "LEADERBOARD_REFRESH_INTERVAL_SECS")?;
        }
        if let Some(value) = env_var("LEADERBOARD_REFRESH_DEBOUNCE_MS") {
            self.refresh_debounce_ms = parse_value(&value, "LEADERBOARD_REFRESH_DEBOUNCE_MS")?;
        }
        Ok(self)
    }

    pub fn max_staleness(&self) -> Duration {
        Duration::from_secs(self.max_staleness_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn refresh_debounce(&self) -> Duration {
        Duration::from_millis(self.refresh_debounce_ms)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_value<T>(raw: &str, name: &str) -> Result<T>
where
    T: std::str::FromStr,
    <T as std::str::FromStr>::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid {}={:?}: {}", name, raw, e))
}

fn parse_list<T>(raw: &str, name: &str) -> Result<Vec<T>>
where
    T: std::str::FromStr,
    <T as std::str::FromStr>::Err: std::fmt::Display,
{
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| parse_value(part, name))
        .collect()
}
