use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use super::manager::{LockManager, LockManagerInner};

/// Handle to the running cleanup task
#[derive(Debug)]
pub(super) struct SweepTask {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl SweepTask {
    pub(super) fn abort(&self) {
        self.handle.abort();
    }

    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl LockManager {
    /// Start the periodic cleanup sweep. Does nothing if it is already running.
    pub async fn start(&self) {
        let mut slot = self.sweep_task.lock().await;
        if slot.as_ref().map(SweepTask::is_running).unwrap_or(false) {
            debug!("Cleanup sweep already running");
            return;
        }

        let period = self.inner.config.cleanup_interval();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_sweep_loop(
            Arc::clone(&self.inner),
            period,
            shutdown_rx,
        ));

        *slot = Some(SweepTask { handle, shutdown });
        info!(
            interval_seconds = period.as_secs(),
            "Started editing lock cleanup sweep"
        );
    }

    /// Signal the sweep to stop and wait for it to finish
    pub async fn stop(&self) {
        let Some(task) = self.sweep_task.lock().await.take() else {
            return;
        };

        let _ = task.shutdown.send(true);
        match task.handle.await {
            Ok(()) => info!("Stopped editing lock cleanup sweep"),
            Err(e) if e.is_cancelled() => debug!("Cleanup sweep was already cancelled"),
            Err(e) => error!(error = %e, "Cleanup sweep task ended abnormally"),
        }
        self.log_stats();
    }

    pub async fn is_running(&self) -> bool {
        self.sweep_task
            .lock()
            .await
            .as_ref()
            .map(SweepTask::is_running)
            .unwrap_or(false)
    }
}

async fn run_sweep_loop(
    inner: Arc<LockManagerInner>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // A panicking pass must not take the loop down with it
                let pass = Arc::clone(&inner);
                match tokio::spawn(async move { pass.sweep().await }).await {
                    Ok(report) if report.is_empty() => {
                        debug!("Cleanup sweep found nothing to remove");
                    }
                    Ok(report) => {
                        info!(
                            expired_sessions = report.expired_sessions,
                            expired_locks = report.expired_locks,
                            purged_sessions = report.purged_sessions,
                            "Cleanup sweep removed stale editing state"
                        );
                    }
                    Err(e) => {
                        error!(error = %e, "Cleanup sweep pass failed, continuing");
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!("Cleanup sweep received shutdown signal");
                    break;
                }
            }
        }
    }
}
