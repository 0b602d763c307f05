//! Shared test helpers: an in-memory remote that behaves like the server.
//!
//! Like the server, every accepted write is stamped with the remote's own
//! clock, not the client's `updated_at`.

#![allow(dead_code)]

use chrono::{Duration, Utc};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;
use stocksync_client::{Endpoint, RemoteApi, RemoteFailure, SyncConfig};
use stocksync_engine::{
    EntityType, PushReceipt, RecordId, RemoteRecord, SyncableRecord, Timestamp,
};
use tokio::sync::Notify;

/// A push the fake remote received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushCall {
    pub entity: EntityType,
    pub method: &'static str,
    pub id: RecordId,
}

#[derive(Default)]
pub struct FakeRemote {
    records: Mutex<BTreeMap<EntityType, Vec<RemoteRecord>>>,
    pub pushes: Mutex<Vec<PushCall>>,
    pub pull_calls: AtomicUsize,
    pub unreachable: AtomicBool,
    reject: Mutex<HashSet<RecordId>>,
    next_id: AtomicUsize,
    /// When set, the first pull waits until notified
    gate: Option<Arc<Notify>>,
    gated: AtomicBool,
    /// How long each push takes (tokio time)
    push_delay: Option<StdDuration>,
    /// Written by "another device" while the next push is handled
    concurrent_write: Mutex<Option<(EntityType, RecordId, Value)>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn with_push_delay(delay: StdDuration) -> Self {
        Self {
            push_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Have another device write `id` while the next push is being handled.
    pub fn write_during_next_push(&self, entity: EntityType, id: &str, fields: Value) {
        *self.concurrent_write.lock().unwrap() = Some((entity, id.to_string(), fields));
    }

    /// Seed a record as if another device had pushed it.
    pub fn seed(&self, entity: EntityType, id: &str, version: u64, updated_at: Timestamp, fields: Value) {
        let record = RemoteRecord {
            id: id.to_string(),
            version,
            updated_at,
            fields: fields.as_object().cloned().unwrap_or_default(),
        };
        self.records.lock().unwrap().entry(entity).or_default().push(record);
    }

    pub fn reject(&self, local_id: &str) {
        self.reject.lock().unwrap().insert(local_id.to_string());
    }

    pub fn get(&self, entity: EntityType, id: &str) -> Option<RemoteRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&entity)?
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub fn count(&self, entity: EntityType) -> usize {
        self.records.lock().unwrap().get(&entity).map_or(0, Vec::len)
    }

    pub fn push_calls(&self) -> Vec<PushCall> {
        self.pushes.lock().unwrap().clone()
    }

    fn payload_fields(record: &SyncableRecord) -> Map<String, Value> {
        record.payload.as_object().cloned().unwrap_or_default()
    }
}

impl RemoteApi for FakeRemote {
    async fn push(
        &self,
        _endpoint: &Endpoint,
        entity: EntityType,
        record: &SyncableRecord,
    ) -> Result<PushReceipt, RemoteFailure> {
        if let Some(delay) = self.push_delay {
            tokio::time::sleep(delay).await;
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RemoteFailure::Unreachable("connection refused".into()));
        }
        if self.reject.lock().unwrap().contains(&record.id) {
            return Err(RemoteFailure::Rejected {
                status: 422,
                message: "rejected by test".into(),
            });
        }

        if let Some((entity, id, fields)) = self.concurrent_write.lock().unwrap().take() {
            self.seed(entity, &id, 1, Utc::now(), fields);
        }

        let stamped = Utc::now();
        let mut records = self.records.lock().unwrap();
        let list = records.entry(entity).or_default();

        let (method, stored) = match &record.remote_id {
            Some(remote_id) => {
                let Some(stored) = list.iter_mut().find(|r| &r.id == remote_id) else {
                    return Err(RemoteFailure::Rejected {
                        status: 404,
                        message: format!("{entity}/{remote_id} not found"),
                    });
                };
                stored.version = (stored.version + 1).max(record.version);
                stored.updated_at = stamped;
                stored.fields = Self::payload_fields(record);
                ("PUT", stored.clone())
            }
            None => {
                let id = format!("srv-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
                let stored = RemoteRecord {
                    id,
                    version: record.version,
                    updated_at: stamped,
                    fields: Self::payload_fields(record),
                };
                list.push(stored.clone());
                ("POST", stored)
            }
        };

        self.pushes.lock().unwrap().push(PushCall {
            entity,
            method,
            id: stored.id.clone(),
        });
        Ok(PushReceipt {
            id: stored.id,
            version: Some(stored.version),
            updated_at: Some(stored.updated_at),
        })
    }

    async fn pull(
        &self,
        _endpoint: &Endpoint,
        entity: EntityType,
        since: Option<Timestamp>,
    ) -> Result<Vec<RemoteRecord>, RemoteFailure> {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            if !self.gated.swap(true, Ordering::SeqCst) {
                gate.notified().await;
            }
        }

        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RemoteFailure::Unreachable("connection refused".into()));
        }

        let records = self.records.lock().unwrap();
        let mut matching: Vec<RemoteRecord> = records
            .get(&entity)
            .map(|list| {
                list.iter()
                    .filter(|r| since.map_or(true, |since| r.updated_at >= since))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matching.sort_by_key(|r| r.updated_at);
        Ok(matching)
    }
}

pub fn configured() -> SyncConfig {
    SyncConfig::new("http://sync.test", "test-key")
}

/// A point comfortably in the past, so edits "later" than it still land
/// before the end of any cycle.
pub fn an_hour_ago() -> Timestamp {
    Utc::now() - Duration::hours(1)
}
