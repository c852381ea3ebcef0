use leaderboard_engine::config::LeaderboardConfig;
use leaderboard_engine::coordinator::{JsonFileSource, Leaderboard};
use std::path::PathBuf;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        // .with_max_level(tracing::Level::DEBUG)
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} --source <dump.json> [--config <config.json>]", args[0]);
        eprintln!("Example: {} --source data/leaderboard.json", args[0]);
        eprintln!(
            "Example: {} --source data/leaderboard.json --config leaderboard.json",
            args[0]
        );

        std::process::exit(1);
    }

    let mut source_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match (args[i].as_str(), args.get(i + 1)) {
            ("--source", Some(value)) => {
                source_path = Some(PathBuf::from(value));
                i += 2;
            }
            ("--config", Some(value)) => {
                config_path = Some(PathBuf::from(value));
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let Some(source_path) = source_path else {
        anyhow::bail!("--source is required");
    };

    // 1. Configuration:
    let config = match &config_path {
        Some(path) => LeaderboardConfig::from_json_file(path)?,
        None => LeaderboardConfig::default(),
    }
    .apply_env()?;
    tracing::info!("Configuration: {:?}", config);

    // 2. Engine + bootstrap from the source of record:
    let board = Leaderboard::new(config);
    let source = JsonFileSource::new(&source_path);
    let report = board.bootstrap(&source).await?;
    tracing::info!(
        "Bootstrapped {} entries from {} in {:?}",
        report.loaded_entries,
        source_path.display(),
        report.elapsed
    );

    // 3. Background recompute:
    let scheduler = board.start_scheduler();

    // 4. Spawn stats reporter:
    let stats_board = board.clone();
    let reporter = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));

        loop {
            interval.tick().await;
            let metrics = stats_board.cache_metrics();
            tracing::info!(
                "Leaderboard stats: {} entries, generation {}, hit rate {}% ({} requests)",
                stats_board.total_entries(),
                metrics.generation,
                metrics.hit_rate,
                metrics.total_requests
            );
            tracing::info!(
                "  - cached pages={} windows={} ranks={} last_recompute={:.2}ms",
                metrics.cached_pages,
                metrics.cached_windows,
                metrics.cached_ranks,
                metrics.last_recompute_duration_ms
            );
        }
    });

    tracing::info!("Press Ctrl+C to shutdown");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down");
    reporter.abort();
    scheduler.stop().await;

    Ok(())
}
