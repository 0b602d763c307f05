//! Sync orchestration.
//!
//! One cycle pulls every entity type in dependency order, folds the remote
//! records into the store, then pushes pending local records in bounded
//! batches. Per-record failures are collected into the [`SyncReport`]; they
//! never abort the cycle.

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::persist;
use crate::remote::RemoteApi;
use crate::schedule::AutoSyncHandle;
use crate::session::{lock, SyncPhase, SyncSession};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use stocksync_engine::{
    resolve, ConflictPolicy, EntityType, RecordId, RemoteRecord, Store, Timestamp, Upsert,
};
use tracing::{debug, info, warn};

/// Maximum number of records pushed per entity type in one cycle.
pub const PUSH_BATCH_LIMIT: usize = 100;

/// The store shared between the host and the orchestrator.
pub type SharedStore = Arc<Mutex<Store>>;

/// A record where the local version was kept over a differing remote one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictItem {
    pub entity: EntityType,
    pub local_id: RecordId,
    pub remote_id: RecordId,
    pub local_updated_at: Timestamp,
    pub remote_updated_at: Timestamp,
    pub policy: ConflictPolicy,
}

/// Result of one sync cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// True when no per-item error occurred
    pub success: bool,
    /// Records inserted or updated from the remote plus records pushed
    pub total_synced: usize,
    pub errors: Vec<String>,
    pub conflicts: Vec<ConflictItem>,
    /// Also becomes the session's last sync time
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
}

#[derive(Debug, Default)]
struct Tally {
    synced: usize,
    errors: Vec<String>,
    conflicts: Vec<ConflictItem>,
}

impl Tally {
    fn error(&mut self, message: String) {
        warn!("{}", message);
        self.errors.push(message);
    }
}

/// Drives sync cycles for one store against one remote.
pub struct SyncOrchestrator<R: RemoteApi> {
    store: SharedStore,
    remote: Arc<R>,
    session: Arc<SyncSession>,
    snapshot_path: Option<PathBuf>,
    auto_sync: Mutex<Option<AutoSyncHandle>>,
}

impl<R: RemoteApi> SyncOrchestrator<R> {
    pub fn new(store: Store, remote: R, config: SyncConfig) -> Self {
        Self::with_shared(
            Arc::new(Mutex::new(store)),
            Arc::new(remote),
            SyncSession::new_shared(config),
        )
    }

    pub fn with_shared(store: SharedStore, remote: Arc<R>, session: Arc<SyncSession>) -> Self {
        Self {
            store,
            remote,
            session,
            snapshot_path: None,
            auto_sync: Mutex::new(None),
        }
    }

    /// Save a snapshot to `path` after every cycle.
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Restore the store and last sync time from `path` if it exists.
    ///
    /// Snapshots are written back to the same file after every cycle.
    pub async fn open(path: impl Into<PathBuf>, remote: R, config: SyncConfig) -> Result<Self> {
        let path = path.into();
        let config = config.normalized()?;

        let mut store = Store::new();
        let mut last_sync_at = None;
        if let Some(snapshot) = persist::load(&path).await? {
            last_sync_at = snapshot.last_sync_at;
            store.import_state(snapshot)?;
            info!(path = %path.display(), records = store.snapshot_metadata().record_count, "Restored store");
        }

        let orchestrator = Self::new(store, remote, config).with_snapshot_path(path);
        orchestrator.session.set_last_sync_at(last_sync_at);
        Ok(orchestrator)
    }

    pub fn store(&self) -> SharedStore {
        Arc::clone(&self.store)
    }

    pub fn session(&self) -> &Arc<SyncSession> {
        &self.session
    }

    /// Run `f` with exclusive access to the store.
    pub fn with_store<T>(&self, f: impl FnOnce(&mut Store) -> T) -> T {
        f(&mut self.lock_store())
    }

    fn lock_store(&self) -> MutexGuard<'_, Store> {
        lock(&self.store)
    }

    /// Run one full pull-then-push cycle.
    ///
    /// Fails without doing any I/O when the session lacks an endpoint or a
    /// cycle is already running. Every other failure lands in the report.
    pub async fn perform_full_sync(&self) -> Result<SyncReport> {
        let config = self.session.config();
        let endpoint = config.endpoint().ok_or(SyncError::NotConfigured)?;
        let _guard = self
            .session
            .try_begin()
            .ok_or(SyncError::AlreadyInProgress)?;

        let started_at = Utc::now();
        let since = self.session.last_sync_at();
        let policy = config.conflict_resolution;
        let mut tally = Tally::default();
        info!(base_url = %endpoint.base_url, ?since, %policy, "Starting sync cycle");

        self.session.set_phase(SyncPhase::Pulling);
        for entity in EntityType::SYNC_ORDER {
            match self.remote.pull(&endpoint, entity, since).await {
                Ok(records) => {
                    for remote in &records {
                        self.merge_pulled(entity, remote, policy, &mut tally);
                    }
                }
                Err(failure) => tally.error(failure.pull_context(entity)),
            }
        }

        self.session.set_phase(SyncPhase::Pushing);
        for entity in EntityType::SYNC_ORDER {
            let batch = self.lock_store().get_pending(entity, PUSH_BATCH_LIMIT);
            for record in batch {
                let outcome = self.remote.push(&endpoint, entity, &record).await;
                let now = Utc::now();
                let mut store = self.lock_store();
                match outcome {
                    Ok(receipt) => match store.confirm_push(entity, &record.id, &receipt, now) {
                        Ok(()) => {
                            debug!(%entity, id = %record.id, remote_id = %receipt.id, "Record synced");
                            tally.synced += 1;
                        }
                        Err(e) => tally.error(format!("push {entity}/{}: {e}", record.id)),
                    },
                    Err(failure) => {
                        tally.error(failure.push_context(entity, &record.id));
                        if let Err(e) = store.mark_failed(entity, &record.id, failure.to_string(), now) {
                            warn!(%entity, id = %record.id, error = %e, "Could not mark record failed");
                            tally.error(format!("push {entity}/{}: {e}", record.id));
                        }
                    }
                }
            }
        }

        // Remote writes stamped after `started_at` are pulled again next cycle.
        self.session.set_last_sync_at(Some(started_at));

        if let Some(path) = &self.snapshot_path {
            if let Err(e) = self.save_snapshot(path).await {
                tally.error(format!("save snapshot: {e}"));
            }
        }

        let report = SyncReport {
            success: tally.errors.is_empty(),
            total_synced: tally.synced,
            errors: tally.errors,
            conflicts: tally.conflicts,
            started_at,
            finished_at: Utc::now(),
        };
        if !report.success {
            self.session.set_phase(SyncPhase::Failed);
        }
        self.session.set_last_report(report.clone());

        info!(
            synced = report.total_synced,
            errors = report.errors.len(),
            conflicts = report.conflicts.len(),
            "Sync cycle finished"
        );
        Ok(report)
    }

    /// Fold one pulled record into the store.
    fn merge_pulled(
        &self,
        entity: EntityType,
        remote: &RemoteRecord,
        policy: ConflictPolicy,
        tally: &mut Tally,
    ) {
        let now = Utc::now();
        let mut store = self.lock_store();

        let local = match store.upsert_from_remote(entity, remote, now) {
            Ok(Upsert::Inserted(record)) => {
                debug!(%entity, id = %record.id, "Inserted remote record");
                tally.synced += 1;
                return;
            }
            Ok(Upsert::Existing(local)) => local,
            Err(e) => {
                tally.error(format!("pull {entity}/{}: {e}", remote.id));
                return;
            }
        };

        if local.is_current_with(remote) {
            return;
        }

        if local.has_unpushed_changes() {
            // Nothing new remotely; the push below carries the local edit.
            if !local.remote_changed_since_sync(remote) {
                return;
            }
            if !resolve(policy, &local, remote).use_remote {
                debug!(%entity, id = %local.id, %policy, "Kept local version");
                if let Err(e) = store.link_remote(entity, &local.id, remote) {
                    tally.error(format!("pull {entity}/{}: {e}", remote.id));
                }
                tally.conflicts.push(ConflictItem {
                    entity,
                    local_id: local.id.clone(),
                    remote_id: remote.id.clone(),
                    local_updated_at: local.updated_at,
                    remote_updated_at: remote.updated_at,
                    policy,
                });
                return;
            }
        }

        match store.apply_remote(entity, &local.id, remote, now) {
            Ok(record) => {
                debug!(%entity, id = %record.id, version = record.version, "Applied remote record");
                tally.synced += 1;
            }
            Err(e) => tally.error(format!("pull {entity}/{}: {e}", remote.id)),
        }
    }

    /// Write the store and last sync time to `path`.
    pub async fn save_snapshot(&self, path: &Path) -> Result<()> {
        let mut snapshot = self.lock_store().export_state();
        snapshot.last_sync_at = self.session.last_sync_at();
        persist::save(path, &snapshot).await
    }

    /// Make every failed record pending again. Returns how many were reset.
    pub fn retry_failed(&self) -> usize {
        let mut store = self.lock_store();
        EntityType::SYNC_ORDER
            .iter()
            .map(|entity| store.retry_failed(*entity))
            .sum()
    }

    /// Replace the configuration, restarting auto-sync under the new settings.
    pub fn reconfigure(self: &Arc<Self>, config: SyncConfig) -> Result<()> {
        let config = config.normalized()?;
        self.stop_auto_sync();
        self.session.set_config(config);
        self.start_auto_sync();
        Ok(())
    }

    /// Start auto-sync if the configuration enables it and names an endpoint.
    ///
    /// Returns whether a schedule is now running.
    pub fn start_auto_sync(self: &Arc<Self>) -> bool {
        let config = self.session.config();
        if !config.auto_sync_enabled {
            return false;
        }
        if config.endpoint().is_none() {
            warn!("Auto-sync enabled but no endpoint configured");
            return false;
        }

        self.start_auto_sync_every(config.sync_interval());
        true
    }

    /// Run `perform_full_sync` every `period`, replacing any running schedule.
    pub fn start_auto_sync_every(self: &Arc<Self>, period: Duration) {
        let handle = AutoSyncHandle::spawn(Arc::downgrade(self), period);
        info!(period_secs = period.as_secs(), "Auto-sync started");
        *lock(&self.auto_sync) = Some(handle);
    }

    pub fn stop_auto_sync(&self) {
        if let Some(handle) = lock(&self.auto_sync).take() {
            handle.cancel();
            info!("Auto-sync stopped");
        }
    }

    pub fn is_auto_syncing(&self) -> bool {
        lock(&self.auto_sync)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Endpoint;
    use crate::error::RemoteFailure;
    use serde_json::json;
    use stocksync_engine::{PushReceipt, SyncStatus, SyncableRecord};

    /// Remote that serves a fixed pull result and accepts every push.
    #[derive(Default)]
    struct StaticRemote {
        pulled: Mutex<Vec<(EntityType, RemoteRecord)>>,
        reject_pushes: bool,
        /// Deleted from while a push is in flight
        local: Option<SharedStore>,
    }

    impl RemoteApi for StaticRemote {
        async fn push(
            &self,
            _endpoint: &Endpoint,
            entity: EntityType,
            record: &SyncableRecord,
        ) -> std::result::Result<PushReceipt, RemoteFailure> {
            if let Some(local) = &self.local {
                lock(local).delete(entity, &record.id).unwrap();
            }
            if self.reject_pushes {
                return Err(RemoteFailure::Rejected {
                    status: 500,
                    message: "boom".into(),
                });
            }
            Ok(PushReceipt::id_only(
                record
                    .remote_id
                    .clone()
                    .unwrap_or_else(|| format!("srv-{}", record.id)),
            ))
        }

        async fn pull(
            &self,
            _endpoint: &Endpoint,
            entity: EntityType,
            _since: Option<Timestamp>,
        ) -> std::result::Result<Vec<RemoteRecord>, RemoteFailure> {
            Ok(lock(&self.pulled)
                .iter()
                .filter(|(e, _)| *e == entity)
                .map(|(_, r)| r.clone())
                .collect())
        }
    }

    fn configured() -> SyncConfig {
        SyncConfig::new("http://localhost:3000", "key")
    }

    #[tokio::test]
    async fn unconfigured_session_does_nothing() {
        let orchestrator = SyncOrchestrator::new(Store::new(), StaticRemote::default(), SyncConfig::default());

        let result = orchestrator.perform_full_sync().await;
        assert!(matches!(result, Err(SyncError::NotConfigured)));
        assert!(orchestrator.session().last_sync_at().is_none());
    }

    #[tokio::test]
    async fn push_failure_marks_failed_and_reports() {
        let remote = StaticRemote {
            reject_pushes: true,
            ..StaticRemote::default()
        };
        let orchestrator = SyncOrchestrator::new(Store::new(), remote, configured());
        orchestrator.with_store(|store| {
            store
                .add_with_id(EntityType::Categories, "c1", json!({"name": "Tools"}), Utc::now())
                .unwrap();
        });

        let report = orchestrator.perform_full_sync().await.unwrap();

        assert!(!report.success);
        assert_eq!(report.total_synced, 0);
        assert_eq!(report.errors, vec!["push categories/c1: remote rejected (500): boom"]);
        orchestrator.with_store(|store| {
            let record = store.get_by_id(EntityType::Categories, "c1").unwrap();
            assert_eq!(record.sync_status, SyncStatus::Failed);
            assert!(store.get_pending(EntityType::Categories, 10).is_empty());
            assert_eq!(store.sync_log().len(), 1);
        });
        assert_eq!(orchestrator.session().last_sync_at(), Some(report.started_at));
        assert_eq!(orchestrator.session().last_report(), Some(report));
        assert_eq!(orchestrator.session().phase(), SyncPhase::Idle);

        assert_eq!(orchestrator.retry_failed(), 1);
        orchestrator.with_store(|store| {
            assert_eq!(store.pending_count(EntityType::Categories), 1);
        });
    }

    #[tokio::test]
    async fn record_deleted_during_failed_push_is_reported() {
        let store: SharedStore = Arc::new(Mutex::new(Store::new()));
        lock(&store)
            .add_with_id(EntityType::Categories, "c1", json!({"name": "Tools"}), Utc::now())
            .unwrap();
        let remote = StaticRemote {
            reject_pushes: true,
            local: Some(Arc::clone(&store)),
            ..StaticRemote::default()
        };
        let orchestrator = SyncOrchestrator::with_shared(
            store,
            Arc::new(remote),
            SyncSession::new_shared(configured()),
        );

        let report = orchestrator.perform_full_sync().await.unwrap();

        assert_eq!(
            report.errors,
            vec![
                "push categories/c1: remote rejected (500): boom",
                "push categories/c1: record not found: categories/c1",
            ]
        );
        orchestrator.with_store(|store| assert!(store.sync_log().is_empty()));
    }

    #[tokio::test]
    async fn invalid_remote_payload_is_reported() {
        let remote = StaticRemote::default();
        lock(&remote.pulled).push((
            EntityType::InventoryItems,
            RemoteRecord {
                id: "srv-1".into(),
                version: 1,
                updated_at: Utc::now(),
                fields: json!({"name": "Bolt"}).as_object().cloned().unwrap(),
            },
        ));
        let orchestrator = SyncOrchestrator::new(Store::new(), remote, configured());

        let report = orchestrator.perform_full_sync().await.unwrap();

        assert!(!report.success);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("pull inventory/srv-1: "));
        orchestrator.with_store(|store| assert!(store.is_empty()));
    }

    #[tokio::test]
    async fn synced_local_fast_forwards_without_conflict() {
        let t0 = Utc::now() - chrono::Duration::hours(1);
        let remote = StaticRemote::default();
        lock(&remote.pulled).push((
            EntityType::Categories,
            RemoteRecord {
                id: "c1".into(),
                version: 2,
                updated_at: t0 + chrono::Duration::seconds(30),
                fields: json!({"name": "Hand tools"}).as_object().cloned().unwrap(),
            },
        ));

        let mut store = Store::new();
        store
            .add_with_id(EntityType::Categories, "c1", json!({"name": "Tools"}), t0)
            .unwrap();
        store.mark_synced(EntityType::Categories, "c1", "c1", t0).unwrap();

        // ClientWins would keep a pending local edit, but this one is clean.
        let mut config = configured();
        config.conflict_resolution = ConflictPolicy::ClientWins;
        let orchestrator = SyncOrchestrator::new(store, remote, config);

        let report = orchestrator.perform_full_sync().await.unwrap();

        assert!(report.success);
        assert!(report.conflicts.is_empty());
        assert_eq!(report.total_synced, 1);
        orchestrator.with_store(|store| {
            let record = store.get_by_id(EntityType::Categories, "c1").unwrap();
            assert_eq!(record.payload["name"], "Hand tools");
            assert_eq!(record.version, 2);
        });
    }

    #[tokio::test]
    async fn auto_sync_requires_enabled_config() {
        let orchestrator = Arc::new(SyncOrchestrator::new(Store::new(), StaticRemote::default(), configured()));
        assert!(!orchestrator.start_auto_sync());
        assert!(!orchestrator.is_auto_syncing());

        let mut config = configured();
        config.auto_sync_enabled = true;
        orchestrator.reconfigure(config).unwrap();
        assert!(orchestrator.is_auto_syncing());

        orchestrator.stop_auto_sync();
        assert!(!orchestrator.is_auto_syncing());
    }

    #[tokio::test]
    async fn reconfigure_rejects_bad_config() {
        let orchestrator = Arc::new(SyncOrchestrator::new(Store::new(), StaticRemote::default(), configured()));

        let mut config = configured();
        config.sync_interval_minutes = 0;
        let result = orchestrator.reconfigure(config);

        assert!(matches!(result, Err(SyncError::Config(_))));
        assert_eq!(orchestrator.session().config(), configured());
    }
}
