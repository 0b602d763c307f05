//! # stocksync-client
//!
//! Async sync client for offline-first inventory data.
//!
//! The engine crate keeps records and bookkeeping; this crate moves them to
//! and from a remote API. A [`SyncOrchestrator`] owns one store, one
//! [`RemoteApi`] implementation and one [`SyncSession`], and runs pull-then-push
//! cycles either on demand or on a schedule.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use stocksync_client::{HttpRemote, SyncConfig, SyncOrchestrator};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig::from_env()?;
//! let remote = HttpRemote::new(config.request_timeout())?;
//! let orchestrator = Arc::new(SyncOrchestrator::open("stocksync.json", remote, config).await?);
//!
//! let report = orchestrator.perform_full_sync().await?;
//! println!("synced {} records, {} errors", report.total_synced, report.errors.len());
//!
//! orchestrator.start_auto_sync();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod persist;
pub mod remote;
pub mod schedule;
pub mod session;

pub use config::{Endpoint, SyncConfig};
pub use error::{ConfigError, RemoteFailure, Result, SyncError};
pub use orchestrator::{ConflictItem, SharedStore, SyncOrchestrator, SyncReport, PUSH_BATCH_LIMIT};
pub use remote::{HttpRemote, RemoteApi};
pub use schedule::AutoSyncHandle;
pub use session::{CycleGuard, SyncPhase, SyncSession};
