//! Snapshot types for persisting and restoring store state.
//!
//! Snapshots are the bridge between the in-memory Store and persistent storage.
//! Entity types are kept in a BTreeMap and records in insertion order, so the
//! same store always serializes to the same bytes.

use crate::{
    error::Result, EntityType, Error, Schema, SchemaVersion, SyncLogEntry, SyncableRecord,
    Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A point-in-time snapshot of the store state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub format_version: u32,
    /// Schema version at time of snapshot
    pub schema_version: SchemaVersion,
    /// Records per entity type, in insertion order
    pub collections: BTreeMap<EntityType, Vec<SyncableRecord>>,
    #[serde(default)]
    pub sync_log: Vec<SyncLogEntry>,
    /// Last successful sync time of the session that wrote the snapshot
    #[serde(default)]
    pub last_sync_at: Option<Timestamp>,
}

impl StoreSnapshot {
    /// Create a new empty snapshot.
    pub fn new(schema_version: SchemaVersion) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            schema_version,
            collections: BTreeMap::new(),
            sync_log: Vec::new(),
            last_sync_at: None,
        }
    }

    /// Add a record to the snapshot.
    pub fn add_record(&mut self, record: SyncableRecord) {
        self.collections
            .entry(record.entity)
            .or_default()
            .push(record);
    }

    /// Get a record from the snapshot.
    pub fn get_record(&self, entity: EntityType, id: &str) -> Option<&SyncableRecord> {
        self.collections.get(&entity)?.iter().find(|r| r.id == id)
    }

    /// Count total records across all entity types.
    pub fn record_count(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    /// Validate the snapshot against a schema.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        if self.schema_version != schema.version {
            return Err(Error::SchemaVersionMismatch {
                expected: schema.version,
                actual: self.schema_version,
            });
        }

        for (entity, records) in &self.collections {
            let entity_schema = schema
                .get(*entity)
                .ok_or_else(|| Error::UnknownEntity(entity.to_string()))?;

            for record in records {
                if record.entity != *entity {
                    return Err(Error::InvalidSnapshot(format!(
                        "record {} filed under {} but belongs to {}",
                        record.id, entity, record.entity
                    )));
                }
                entity_schema.validate_payload(&record.payload)?;
            }
        }

        Ok(())
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Serialize to pretty JSON with deterministic ordering.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        Ok(snapshot)
    }
}

/// Metadata about a snapshot (without the full data).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub format_version: u32,
    pub schema_version: SchemaVersion,
    pub record_count: usize,
    /// Records still waiting to be pushed
    pub pending_count: usize,
    pub last_sync_at: Option<Timestamp>,
}

impl From<&StoreSnapshot> for SnapshotMetadata {
    fn from(snapshot: &StoreSnapshot) -> Self {
        Self {
            format_version: snapshot.format_version,
            schema_version: snapshot.schema_version,
            record_count: snapshot.record_count(),
            pending_count: snapshot
                .collections
                .values()
                .flatten()
                .filter(|r| r.sync_status == crate::SyncStatus::Pending)
                .count(),
            last_sync_at: snapshot.last_sync_at,
        }
    }
}
