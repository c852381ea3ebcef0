//! Recompute Scheduler
//!
//! Background task that keeps the precomputed cache fresh. It wakes on a fixed
//! interval and on refresh signals from the coordinator, and runs the rebuild on
//! the blocking pool so the async runtime never waits on the tree lock.

use crate::cache::PrecomputedCache;
use crate::ranking::RankedSet;

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Interval,
    Signal,
}

pub struct RecomputeScheduler {
    cache: Arc<PrecomputedCache>,
    set: Arc<RwLock<RankedSet>>,
    signal: Arc<Notify>,
    interval: Duration,
    debounce: Duration,
}

/// Running scheduler. Dropping the handle leaves the task running; call `stop`.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!("Recompute scheduler task failed: {}", e);
        }
    }
}

impl RecomputeScheduler {
    pub fn new(
        cache: Arc<PrecomputedCache>,
        set: Arc<RwLock<RankedSet>>,
        signal: Arc<Notify>,
        interval: Duration,
        debounce: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            cache,
            set,
            signal,
            // tokio intervals must have a non-zero period
            interval: interval.max(Duration::from_millis(1)),
            debounce,
        })
    }

    /// Spawns the loop. The first interval tick fires immediately, so the cache
    /// is populated right after start.
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tracing::info!(
            "Recompute scheduler started (interval={:?}, debounce={:?})",
            self.interval,
            self.debounce
        );
        let task = tokio::spawn(async move { self.run(token).await });

        SchedulerHandle { cancel, task }
    }

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_pass: Option<Instant> = None;

        loop {
            let trigger = tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => Trigger::Interval,
                _ = self.signal.notified() => Trigger::Signal,
            };

            if trigger == Trigger::Signal
                && let Some(last) = last_pass
            {
                let since = last.elapsed();
                if since < self.debounce {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.debounce - since) => {}
                    }
                }
            }

            self.refresh(trigger).await;
            last_pass = Some(Instant::now());
        }

        tracing::info!("Recompute scheduler stopped");
    }

    async fn refresh(&self, trigger: Trigger) {
        let cache = self.cache.clone();
        let set = self.set.clone();

        match tokio::task::spawn_blocking(move || cache.try_refresh(&set)).await {
            Ok(Some(snapshot)) => {
                tracing::debug!(
                    "{:?} refresh published generation {}",
                    trigger,
                    snapshot.generation()
                );
            }
            Ok(None) => {}
            Err(e) => tracing::error!("Recompute pass panicked: {}", e),
        }
    }
}
