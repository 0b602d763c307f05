//! Per-store sync session state.
//!
//! A [`SyncSession`] owns what used to be process-wide: the configuration,
//! the in-progress flag, the last successful sync time and the last report.

use crate::config::SyncConfig;
use crate::orchestrator::SyncReport;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use stocksync_engine::Timestamp;
use tokio::sync::watch;

/// Where a sync cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncPhase {
    #[default]
    Idle,
    Pulling,
    Pushing,
    /// The cycle finished with errors; the phase returns to Idle right after.
    Failed,
}

#[derive(Debug)]
pub struct SyncSession {
    config: Mutex<SyncConfig>,
    in_progress: AtomicBool,
    last_sync_at: Mutex<Option<Timestamp>>,
    last_report: Mutex<Option<SyncReport>>,
    phase: watch::Sender<SyncPhase>,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SyncSession {
    pub fn new(config: SyncConfig) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Idle);
        Self {
            config: Mutex::new(config),
            in_progress: AtomicBool::new(false),
            last_sync_at: Mutex::new(None),
            last_report: Mutex::new(None),
            phase,
        }
    }

    pub fn new_shared(config: SyncConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    pub fn config(&self) -> SyncConfig {
        lock(&self.config).clone()
    }

    pub fn set_config(&self, config: SyncConfig) {
        *lock(&self.config) = config;
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Claim the session for one cycle.
    ///
    /// Returns `None` if another cycle holds it. The claim is released when
    /// the guard drops.
    pub fn try_begin(self: &Arc<Self>) -> Option<CycleGuard> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(CycleGuard {
            session: Arc::clone(self),
        })
    }

    pub fn last_sync_at(&self) -> Option<Timestamp> {
        *lock(&self.last_sync_at)
    }

    pub fn set_last_sync_at(&self, at: Option<Timestamp>) {
        *lock(&self.last_sync_at) = at;
    }

    pub fn last_report(&self) -> Option<SyncReport> {
        lock(&self.last_report).clone()
    }

    pub(crate) fn set_last_report(&self, report: SyncReport) {
        *lock(&self.last_report) = Some(report);
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    pub(crate) fn set_phase(&self, phase: SyncPhase) {
        self.phase.send_replace(phase);
    }

    /// Watch phase changes.
    pub fn subscribe(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }
}

/// Holds the session's in-progress flag for the length of one cycle.
#[derive(Debug)]
pub struct CycleGuard {
    session: Arc<SyncSession>,
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.session.set_phase(SyncPhase::Idle);
        self.session.in_progress.store(false, Ordering::Release);
    }
}
