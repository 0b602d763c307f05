//! Recurring background sync.

use crate::error::SyncError;
use crate::orchestrator::SyncOrchestrator;
use crate::remote::RemoteApi;
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// A running auto-sync schedule. Dropping the handle stops it.
///
/// Stopping only cancels the wait for the next tick. A cycle that is already
/// running completes, so a push the remote accepted is always recorded.
#[derive(Debug)]
pub struct AutoSyncHandle {
    task: JoinHandle<()>,
    period: Duration,
    /// Closing the channel is the stop signal
    _stop: watch::Sender<()>,
}

impl AutoSyncHandle {
    /// Spawn a task that runs a full sync every `period`, first after one period.
    ///
    /// The task only holds a weak reference and exits once the orchestrator
    /// is gone. Ticks that arrive while a cycle is running are dropped.
    pub(crate) fn spawn<R: RemoteApi>(
        orchestrator: Weak<SyncOrchestrator<R>>,
        period: Duration,
    ) -> Self {
        let (stop, mut stopped) = watch::channel(());

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = stopped.changed() => break,
                    _ = ticker.tick() => {}
                }

                let Some(orchestrator) = orchestrator.upgrade() else {
                    break;
                };

                match orchestrator.perform_full_sync().await {
                    Ok(report) => {
                        tracing::debug!(success = report.success, "Auto-sync cycle complete")
                    }
                    Err(SyncError::AlreadyInProgress) => {
                        tracing::debug!("Auto-sync tick dropped: cycle already running")
                    }
                    Err(e) => tracing::warn!(error = %e, "Auto-sync cycle did not run"),
                }
            }
            tracing::debug!("Auto-sync schedule ended");
        });

        Self {
            task,
            period,
            _stop: stop,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the schedule. A cycle in flight runs to completion first.
    pub fn cancel(self) {
        drop(self);
    }
}
