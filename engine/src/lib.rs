//! # Stocksync Engine
//!
//! The deterministic core of offline-first inventory synchronization.
//!
//! This crate owns the local record store, the per-entity schemas and the
//! conflict resolver. It performs no I/O: every mutation takes the wall-clock
//! time as an argument, so the same inputs always produce the same state.
//! Network access, timers and persistence to disk live in `stocksync-client`.
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! Every synced entity is stored as a [`SyncableRecord`] with:
//! - A local identifier and an optional remote identifier
//! - A JSON payload validated against the entity's [`EntitySchema`]
//! - A version number that never decreases
//! - A [`SyncStatus`] plus `last_synced_at` / `updated_at` bookkeeping
//!
//! ### Entity types
//!
//! Four entity types are synced, always in [`EntityType::SYNC_ORDER`]:
//! categories, inventory items, customers, orders. Referenced entities come
//! before the entities referencing them.
//!
//! ### Conflict resolution
//!
//! [`resolve`] is a pure function of a [`ConflictPolicy`] and the two
//! competing records:
//! - [`ConflictPolicy::ServerWins`] - the remote record always wins
//! - [`ConflictPolicy::ClientWins`] - the local record always wins
//! - [`ConflictPolicy::NewestWins`] - strictly newer `updated_at` wins, ties keep local
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use serde_json::json;
//! use stocksync_engine::{EntityType, Store, SyncStatus};
//!
//! let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
//! let mut store = Store::new();
//!
//! let record = store
//!     .add_with_id(EntityType::Categories, "c1", json!({"name": "Tools"}), now)
//!     .unwrap();
//! assert_eq!(record.sync_status, SyncStatus::Pending);
//!
//! let pending = store.get_pending(EntityType::Categories, 100);
//! assert_eq!(pending.len(), 1);
//!
//! store.mark_synced(EntityType::Categories, "c1", "srv-1", now).unwrap();
//! assert!(store.get_pending(EntityType::Categories, 100).is_empty());
//! ```
//!
//! ## Persistence
//!
//! Use [`Store::export_state`] and [`Store::import_state`] with [`StoreSnapshot`].
//! Snapshots serialize to JSON with deterministic ordering.

pub mod entity;
pub mod error;
pub mod record;
pub mod resolve;
pub mod schema;
pub mod snapshot;
pub mod store;

// Re-export main types at crate root
pub use entity::EntityType;
pub use error::Error;
pub use record::{PushReceipt, RemoteRecord, SyncStatus, SyncableRecord};
pub use resolve::{resolve, ConflictPolicy, Resolution};
pub use schema::{EntitySchema, FieldDef, FieldType, Schema};
pub use snapshot::{SnapshotMetadata, StoreSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use store::{Store, SyncLogEntry, Upsert};

/// Type aliases for clarity
pub type RecordId = String;
pub type Version = u64;
pub type Timestamp = chrono::DateTime<chrono::Utc>;
pub type SchemaVersion = u32;
