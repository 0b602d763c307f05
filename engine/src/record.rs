//! Record types for storing synced data.

use crate::{EntityType, RecordId, Timestamp, Version};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Synchronization state of a local record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Local changes not yet accepted by the remote
    Pending,
    /// Matches what the remote last accepted or sent
    Synced,
    /// Last push was rejected or could not reach the remote
    Failed,
    /// Parked by the host for manual resolution
    Conflict,
}

/// A locally stored record with sync bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncableRecord {
    /// Local identifier
    pub id: RecordId,
    /// Entity type this record belongs to
    pub entity: EntityType,
    /// Entity-specific fields (JSON object)
    pub payload: Value,
    /// Incremented on every local mutation, never decreases
    pub version: Version,
    pub sync_status: SyncStatus,
    /// Identifier assigned by the remote once it accepted the record
    pub remote_id: Option<RecordId>,
    pub last_synced_at: Option<Timestamp>,
    /// The remote's `updated_at` as of the last sync (remote clock)
    #[serde(default)]
    pub remote_updated_at: Option<Timestamp>,
    pub created_at: Timestamp,
    /// Last mutation time, used as the conflict tie-breaker
    pub updated_at: Timestamp,
}

impl SyncableRecord {
    /// Create a new locally originated record.
    pub fn new_local(
        id: impl Into<RecordId>,
        entity: EntityType,
        payload: Value,
        now: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            entity,
            payload,
            version: 1,
            sync_status: SyncStatus::Pending,
            remote_id: None,
            last_synced_at: None,
            remote_updated_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a record from a remote payload that has no local counterpart.
    ///
    /// The remote identifier doubles as the local one.
    pub fn from_remote(
        entity: EntityType,
        remote: &RemoteRecord,
        payload: Value,
        now: Timestamp,
    ) -> Self {
        Self {
            id: remote.id.clone(),
            entity,
            payload,
            version: remote.version.max(1),
            sync_status: SyncStatus::Synced,
            remote_id: Some(remote.id.clone()),
            last_synced_at: Some(now),
            remote_updated_at: Some(remote.updated_at),
            created_at: remote.updated_at,
            updated_at: remote.updated_at,
        }
    }

    /// Apply a local edit.
    pub fn update_payload(&mut self, payload: Value, now: Timestamp) {
        self.payload = payload;
        self.version = self.version.saturating_add(1);
        self.updated_at = now;
        self.sync_status = SyncStatus::Pending;
    }

    /// Record that the remote accepted this record.
    pub fn mark_synced(&mut self, remote_id: impl Into<RecordId>, now: Timestamp) {
        self.remote_id = Some(remote_id.into());
        self.last_synced_at = Some(now);
        self.sync_status = SyncStatus::Synced;
    }

    /// Record an accepted push, taking over the remote's bookkeeping.
    ///
    /// The remote stamps its own `updated_at` on every write; adopting it
    /// keeps the record current when the same write is pulled back.
    pub fn confirm_push(&mut self, receipt: &PushReceipt, now: Timestamp) {
        if let Some(version) = receipt.version {
            self.version = self.version.max(version);
        }
        if let Some(updated_at) = receipt.updated_at {
            self.updated_at = updated_at;
            self.remote_updated_at = Some(updated_at);
        }
        self.mark_synced(receipt.id.clone(), now);
    }

    /// Whether the record carries changes the remote has not seen.
    pub fn has_unpushed_changes(&self) -> bool {
        self.sync_status != SyncStatus::Synced
    }

    /// Whether the remote copy moved on since the last sync.
    ///
    /// Compared on the remote's own clock; a record that never synced has no
    /// baseline, so any remote copy counts as changed.
    pub fn remote_changed_since_sync(&self, remote: &RemoteRecord) -> bool {
        self.remote_updated_at
            .map_or(true, |seen| remote.updated_at > seen)
    }

    /// Whether a pulled remote record carries nothing this record lacks.
    pub fn is_current_with(&self, remote: &RemoteRecord) -> bool {
        self.sync_status == SyncStatus::Synced
            && remote.version <= self.version
            && remote.updated_at <= self.updated_at
    }

    /// Build the request body sent to the remote for this record.
    ///
    /// Payload fields plus `version`, `updated_at` and `local_id`.
    pub fn to_wire(&self) -> Value {
        let mut body = self.payload.as_object().cloned().unwrap_or_default();
        body.insert("local_id".into(), Value::String(self.id.clone()));
        body.insert("version".into(), Value::from(self.version));
        body.insert(
            "updated_at".into(),
            Value::String(self.updated_at.to_rfc3339()),
        );
        Value::Object(body)
    }
}

fn default_version() -> Version {
    1
}

/// A record as served by the remote API.
///
/// Every payload carries `id`, `version` and `updated_at`; the remaining
/// entity fields are kept in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Remote identifier
    pub id: RecordId,
    #[serde(default = "default_version")]
    pub version: Version,
    pub updated_at: Timestamp,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RemoteRecord {
    /// Entity fields as a JSON object.
    pub fn fields_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// What the remote reports back after accepting a push.
///
/// Only `id` is required; remotes that echo the stored record also hand
/// back the version and timestamp they assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushReceipt {
    pub id: RecordId,
    #[serde(default)]
    pub version: Option<Version>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

impl PushReceipt {
    /// A receipt carrying nothing but the remote identifier.
    pub fn id_only(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            version: None,
            updated_at: None,
        }
    }
}
