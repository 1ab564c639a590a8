//! Periodic full syncs on a fixed interval.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use scimsync_engine::{LastSync, ReconciliationEngine, SyncKind, SyncStatusStore};

use crate::runner::run_sync;

/// Snapshot returned by the scheduler status route.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub interval_seconds: u64,
    pub next_run: Option<DateTime<Utc>>,
    pub last_sync: Option<LastSync>,
}

struct Worker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns the background task that triggers scheduled runs. The first run
/// happens one interval after `start`.
pub struct SyncScheduler {
    engine: Arc<ReconciliationEngine>,
    status: SyncStatusStore,
    interval: Duration,
    worker: Mutex<Option<Worker>>,
    next_run: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl SyncScheduler {
    #[must_use]
    pub fn new(
        engine: Arc<ReconciliationEngine>,
        status: SyncStatusStore,
        interval: Duration,
    ) -> Self {
        Self {
            engine,
            status,
            interval,
            worker: Mutex::new(None),
            next_run: Arc::new(RwLock::new(None)),
        }
    }

    /// Spawn the loop. Returns `false` when it is already running.
    pub async fn start(&self) -> bool {
        let mut worker = self.worker.lock().await;
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            return false;
        }

        let (shutdown, signal) = watch::channel(false);
        set_next_run(&self.next_run, after(self.interval));
        let handle = tokio::spawn(run_loop(
            self.engine.clone(),
            self.status.clone(),
            self.interval,
            self.next_run.clone(),
            signal,
        ));
        *worker = Some(Worker { shutdown, handle });

        info!(interval_secs = self.interval.as_secs(), "Sync scheduler started");
        true
    }

    /// Stop the loop, letting an in-flight run finish first. Returns `false`
    /// when it was not running.
    pub async fn stop(&self) -> bool {
        let Some(worker) = self.worker.lock().await.take() else {
            return false;
        };
        // The receiver is gone if the task already exited.
        let _ = worker.shutdown.send(true);
        if let Err(e) = worker.handle.await {
            warn!(error = %e, "Scheduler task ended abnormally");
        }
        set_next_run(&self.next_run, None);

        info!("Sync scheduler stopped");
        true
    }

    pub async fn status(&self) -> SchedulerStatus {
        let running = self
            .worker
            .lock()
            .await
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished());

        let next_run = if running {
            *self.next_run.read().unwrap_or_else(|e| e.into_inner())
        } else {
            None
        };
        let last_sync = self.status.last().await;

        SchedulerStatus {
            running,
            interval_seconds: self.interval.as_secs(),
            next_run,
            last_sync,
        }
    }
}

async fn run_loop(
    engine: Arc<ReconciliationEngine>,
    status: SyncStatusStore,
    period: Duration,
    next_run: Arc<RwLock<Option<DateTime<Utc>>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Run on its own task so a panic is reported instead of
                // killing the loop.
                let run = tokio::spawn({
                    let engine = engine.clone();
                    let status = status.clone();
                    async move { run_sync(&engine, &status, SyncKind::Scheduled).await }
                });
                if let Err(e) = run.await {
                    error!(error = %e, "Scheduled sync aborted");
                    status
                        .record_failure(SyncKind::Scheduled, format!("Scheduled sync aborted: {e}"))
                        .await;
                }
                set_next_run(&next_run, after(period));
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

fn after(period: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(period)
        .ok()
        .and_then(|step| Utc::now().checked_add_signed(step))
}

fn set_next_run(slot: &RwLock<Option<DateTime<Utc>>>, at: Option<DateTime<Utc>>) {
    *slot.write().unwrap_or_else(|e| e.into_inner()) = at;
}

#[cfg(test)]
mod tests {
    use super::*;
    use scimsync_engine::memory::{InMemoryDestination, InMemorySource};
    use scimsync_engine::{EngineConfig, SyncOutcome};

    fn scheduler(interval: Duration) -> SyncScheduler {
        let engine = ReconciliationEngine::new(
            Arc::new(InMemorySource::new()),
            Arc::new(InMemoryDestination::new()),
            EngineConfig::new("corp").with_filter("vcenter_name", "vc01"),
        )
        .unwrap();
        SyncScheduler::new(Arc::new(engine), SyncStatusStore::new(), interval)
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let scheduler = scheduler(Duration::from_secs(3600));

        assert!(!scheduler.status().await.running);
        assert!(scheduler.start().await);
        assert!(!scheduler.start().await);

        let status = scheduler.status().await;
        assert!(status.running);
        assert_eq!(status.interval_seconds, 3600);
        assert!(status.next_run.is_some_and(|at| at > Utc::now()));

        assert!(scheduler.stop().await);
        assert!(!scheduler.stop().await);
        let status = scheduler.status().await;
        assert!(!status.running);
        assert!(status.next_run.is_none());
    }

    #[tokio::test]
    async fn test_first_run_waits_one_interval() {
        let scheduler = scheduler(Duration::from_secs(3600));
        scheduler.start().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(scheduler.status().await.last_sync.is_none());
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_scheduled_run_is_recorded() {
        let scheduler = scheduler(Duration::from_millis(20));
        scheduler.start().await;

        let mut last = None;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            last = scheduler.status().await.last_sync;
            if last.is_some() {
                break;
            }
        }
        scheduler.stop().await;

        let last = last.expect("scheduled run should have been recorded");
        assert_eq!(last.kind, SyncKind::Scheduled);
        assert!(matches!(last.outcome, SyncOutcome::Completed { .. }));
    }
}
