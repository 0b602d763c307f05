//! Store - the local record container.
//!
//! The Store holds every synced record, grouped by entity type and kept in
//! insertion order, plus an append-only log of push failures. Local edits go
//! through [`Store::add`] and [`Store::update`], which flip records to
//! `Pending`; the sync orchestrator uses the bookkeeping methods to move them
//! back to `Synced` or `Failed`.

use crate::{
    error::Result, EntityType, Error, PushReceipt, RecordId, RemoteRecord, Schema,
    SyncStatus, SyncableRecord, Timestamp,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Records of one entity type, in insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    records: HashMap<RecordId, SyncableRecord>,
    order: Vec<RecordId>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&SyncableRecord> {
        self.records.get(id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut SyncableRecord> {
        self.records.get_mut(id)
    }

    /// Insert a record, appending it to the order if it is new.
    fn insert(&mut self, record: SyncableRecord) {
        if !self.records.contains_key(&record.id) {
            self.order.push(record.id.clone());
        }
        self.records.insert(record.id.clone(), record);
    }

    fn remove(&mut self, id: &str) -> Option<SyncableRecord> {
        let record = self.records.remove(id)?;
        self.order.retain(|r| r != id);
        Some(record)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// All records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &SyncableRecord> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    /// Find the local record the remote knows under `remote_id`.
    pub fn find_by_remote_id(&self, remote_id: &str) -> Option<&SyncableRecord> {
        self.iter()
            .find(|r| r.remote_id.as_deref() == Some(remote_id))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Diagnostic entry written whenever a record fails to sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogEntry {
    pub entity: EntityType,
    pub local_id: RecordId,
    pub reason: String,
    pub timestamp: Timestamp,
}

/// Outcome of offering a remote record to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Upsert {
    /// No local counterpart existed; the record was stored as `Synced`.
    Inserted(SyncableRecord),
    /// A local counterpart exists and was left untouched.
    Existing(SyncableRecord),
}

/// The main store holding all local state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    /// Schema for validation and merging
    schema: Schema,
    collections: BTreeMap<EntityType, Collection>,
    /// Append-only failure log, diagnostics only
    sync_log: Vec<SyncLogEntry>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create an empty store with the built-in inventory schema.
    pub fn new() -> Self {
        Self::with_schema(Schema::inventory())
    }

    /// Create an empty store with a custom schema.
    pub fn with_schema(schema: Schema) -> Self {
        let collections = schema
            .entities
            .keys()
            .map(|entity| (*entity, Collection::new()))
            .collect();

        Self {
            schema,
            collections,
            sync_log: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    fn collection_mut(&mut self, entity: EntityType) -> Result<&mut Collection> {
        self.collections
            .get_mut(&entity)
            .ok_or_else(|| Error::UnknownEntity(entity.to_string()))
    }

    fn record_mut(&mut self, entity: EntityType, id: &str) -> Result<&mut SyncableRecord> {
        self.collection_mut(entity)?
            .get_mut(id)
            .ok_or_else(|| Error::NotFound {
                entity,
                id: id.to_string(),
            })
    }

    /// Create a record locally under a freshly generated identifier.
    pub fn add(
        &mut self,
        entity: EntityType,
        payload: Value,
        now: Timestamp,
    ) -> Result<&SyncableRecord> {
        let id = uuid::Uuid::new_v4().to_string();
        self.add_with_id(entity, id, payload, now)
    }

    /// Create a record locally under the given identifier.
    pub fn add_with_id(
        &mut self,
        entity: EntityType,
        id: impl Into<RecordId>,
        payload: Value,
        now: Timestamp,
    ) -> Result<&SyncableRecord> {
        let id = id.into();
        self.schema.validate(entity, &payload)?;

        let collection = self.collection_mut(entity)?;
        if collection.contains(&id) {
            return Err(Error::RecordAlreadyExists { entity, id });
        }

        collection.insert(SyncableRecord::new_local(id.clone(), entity, payload, now));
        self.get_by_id(entity, &id).ok_or(Error::NotFound { entity, id })
    }

    /// Replace a record's payload with a local edit.
    ///
    /// Bumps the version and flips the record back to `Pending`, including
    /// records that previously failed to push.
    pub fn update(
        &mut self,
        entity: EntityType,
        id: &str,
        payload: Value,
        now: Timestamp,
    ) -> Result<&SyncableRecord> {
        self.schema.validate(entity, &payload)?;
        let record = self.record_mut(entity, id)?;
        record.update_payload(payload, now);
        Ok(&*record)
    }

    /// Remove a record locally. Deletions are not propagated to the remote.
    pub fn delete(&mut self, entity: EntityType, id: &str) -> Result<SyncableRecord> {
        self.collection_mut(entity)?
            .remove(id)
            .ok_or_else(|| Error::NotFound {
                entity,
                id: id.to_string(),
            })
    }

    pub fn get_by_id(&self, entity: EntityType, id: &str) -> Option<&SyncableRecord> {
        self.collections.get(&entity).and_then(|c| c.get(id))
    }

    /// All records of an entity type in insertion order.
    pub fn list(&self, entity: EntityType) -> Vec<&SyncableRecord> {
        self.collections
            .get(&entity)
            .map(|c| c.iter().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, entity: EntityType) -> usize {
        self.collections.get(&entity).map_or(0, Collection::len)
    }

    pub fn is_empty(&self) -> bool {
        self.collections.values().all(Collection::is_empty)
    }

    /// Up to `limit` pending records in insertion order.
    pub fn get_pending(&self, entity: EntityType, limit: usize) -> Vec<SyncableRecord> {
        self.collections
            .get(&entity)
            .map(|c| {
                c.iter()
                    .filter(|r| r.sync_status == SyncStatus::Pending)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn pending_count(&self, entity: EntityType) -> usize {
        self.collections.get(&entity).map_or(0, |c| {
            c.iter()
                .filter(|r| r.sync_status == SyncStatus::Pending)
                .count()
        })
    }

    /// Record that the remote accepted a record under `remote_id`.
    pub fn mark_synced(
        &mut self,
        entity: EntityType,
        id: &str,
        remote_id: impl Into<RecordId>,
        now: Timestamp,
    ) -> Result<()> {
        self.record_mut(entity, id)?.mark_synced(remote_id, now);
        Ok(())
    }

    /// Record an accepted push, adopting what the remote assigned.
    pub fn confirm_push(
        &mut self,
        entity: EntityType,
        id: &str,
        receipt: &PushReceipt,
        now: Timestamp,
    ) -> Result<()> {
        self.record_mut(entity, id)?.confirm_push(receipt, now);
        Ok(())
    }

    /// Record a failed push and append it to the sync log.
    pub fn mark_failed(
        &mut self,
        entity: EntityType,
        id: &str,
        reason: impl Into<String>,
        now: Timestamp,
    ) -> Result<()> {
        self.record_mut(entity, id)?.sync_status = SyncStatus::Failed;
        self.sync_log.push(SyncLogEntry {
            entity,
            local_id: id.to_string(),
            reason: reason.into(),
            timestamp: now,
        });
        Ok(())
    }

    /// Make a failed or parked record eligible for the next push.
    ///
    /// The version is left alone: the payload did not change.
    pub fn retry(&mut self, entity: EntityType, id: &str) -> Result<()> {
        let record = self.record_mut(entity, id)?;
        if matches!(record.sync_status, SyncStatus::Failed | SyncStatus::Conflict) {
            record.sync_status = SyncStatus::Pending;
        }
        Ok(())
    }

    /// Retry every failed record of an entity type. Returns how many were reset.
    pub fn retry_failed(&mut self, entity: EntityType) -> usize {
        let Some(collection) = self.collections.get_mut(&entity) else {
            return 0;
        };

        let mut count = 0;
        for record in collection.records.values_mut() {
            if record.sync_status == SyncStatus::Failed {
                record.sync_status = SyncStatus::Pending;
                count += 1;
            }
        }
        count
    }

    /// Remember which remote record a local one corresponds to.
    ///
    /// Used when the local side wins a conflict: the status is left alone so
    /// the next push updates the remote copy instead of creating a new one.
    pub fn link_remote(&mut self, entity: EntityType, id: &str, remote: &RemoteRecord) -> Result<()> {
        let record = self.record_mut(entity, id)?;
        if record.remote_id.is_none() {
            record.remote_id = Some(remote.id.clone());
        }
        record.remote_updated_at = Some(remote.updated_at);
        Ok(())
    }

    /// Find the local counterpart of a remote record.
    ///
    /// Matches on `remote_id` first, then on the local identifier.
    pub fn find_remote(&self, entity: EntityType, remote_id: &str) -> Option<&SyncableRecord> {
        let collection = self.collections.get(&entity)?;
        collection
            .find_by_remote_id(remote_id)
            .or_else(|| collection.get(remote_id))
    }

    /// Offer a pulled record to the store.
    ///
    /// Unknown records are inserted as `Synced`. Known records are returned
    /// unmodified so the caller can resolve the collision.
    pub fn upsert_from_remote(
        &mut self,
        entity: EntityType,
        remote: &RemoteRecord,
        now: Timestamp,
    ) -> Result<Upsert> {
        if let Some(existing) = self.find_remote(entity, &remote.id) {
            return Ok(Upsert::Existing(existing.clone()));
        }

        let schema = self
            .schema
            .get(entity)
            .ok_or_else(|| Error::UnknownEntity(entity.to_string()))?;
        let payload = schema.project(&remote.fields);
        schema.validate_payload(&payload)?;

        let record = SyncableRecord::from_remote(entity, remote, payload, now);
        self.collection_mut(entity)?.insert(record.clone());
        Ok(Upsert::Inserted(record))
    }

    /// Overwrite a local record with the remote version that won resolution.
    pub fn apply_remote(
        &mut self,
        entity: EntityType,
        id: &str,
        remote: &RemoteRecord,
        now: Timestamp,
    ) -> Result<&SyncableRecord> {
        let schema = self
            .schema
            .get(entity)
            .ok_or_else(|| Error::UnknownEntity(entity.to_string()))?;
        let current = self.get_by_id(entity, id).ok_or_else(|| Error::NotFound {
            entity,
            id: id.to_string(),
        })?;

        let merged = schema.merge_remote(&current.payload, &remote.fields);
        schema.validate_payload(&merged)?;

        let record = self.record_mut(entity, id)?;
        record.payload = merged;
        record.version = record.version.max(remote.version);
        record.updated_at = remote.updated_at;
        record.remote_updated_at = Some(remote.updated_at);
        record.mark_synced(remote.id.clone(), now);
        Ok(&*record)
    }

    /// Failure log, oldest first.
    pub fn sync_log(&self) -> &[SyncLogEntry] {
        &self.sync_log
    }

    /// Export the current store state as a snapshot.
    pub fn export_state(&self) -> crate::snapshot::StoreSnapshot {
        let mut snapshot = crate::snapshot::StoreSnapshot::new(self.schema.version);

        for collection in self.collections.values() {
            for record in collection.iter() {
                snapshot.add_record(record.clone());
            }
        }
        snapshot.sync_log = self.sync_log.clone();

        snapshot
    }

    /// Import state from a snapshot, replacing the current contents.
    pub fn import_state(&mut self, snapshot: crate::snapshot::StoreSnapshot) -> Result<()> {
        snapshot.validate(&self.schema)?;

        for collection in self.collections.values_mut() {
            *collection = Collection::new();
        }

        for (entity, records) in snapshot.collections {
            let collection = self.collection_mut(entity)?;
            for record in records {
                collection.insert(record);
            }
        }
        self.sync_log = snapshot.sync_log;

        Ok(())
    }

    /// Get snapshot metadata without full export.
    pub fn snapshot_metadata(&self) -> crate::snapshot::SnapshotMetadata {
        crate::snapshot::SnapshotMetadata {
            format_version: crate::snapshot::SNAPSHOT_FORMAT_VERSION,
            schema_version: self.schema.version,
            record_count: self.collections.values().map(Collection::len).sum(),
            pending_count: EntityType::SYNC_ORDER
                .iter()
                .map(|e| self.pending_count(*e))
                .sum(),
            last_sync_at: None,
        }
    }
}
