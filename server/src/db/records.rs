//! Database operations for the records table.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{PgPool, Row};
use stocksync_engine::EntityType;

/// A stored record row from the database.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub entity: String,
    pub id: String,
    pub version: i64,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredRecord {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredRecord {
            entity: row.try_get("entity")?,
            id: row.try_get("id")?,
            version: row.try_get("version")?,
            payload: row.try_get("payload")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredRecord {
    /// The JSON body served to clients: payload fields plus `id`, `version`
    /// and `updated_at`.
    pub fn to_wire(&self) -> Value {
        let mut body: Map<String, Value> = self.payload.as_object().cloned().unwrap_or_default();
        body.insert("id".into(), Value::String(self.id.clone()));
        body.insert("version".into(), Value::from(self.version));
        body.insert(
            "updated_at".into(),
            Value::String(self.updated_at.to_rfc3339()),
        );
        Value::Object(body)
    }
}

const COLUMNS: &str = "entity, id, version, payload, created_at, updated_at";

/// Records of one entity updated at or after `since`, oldest first.
pub async fn list_records_since(
    pool: &PgPool,
    entity: EntityType,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<StoredRecord>, sqlx::Error> {
    sqlx::query_as::<_, StoredRecord>(&format!(
        r#"
        SELECT {COLUMNS}
        FROM records
        WHERE entity = $1 AND ($2::timestamptz IS NULL OR updated_at >= $2)
        ORDER BY updated_at, id
        "#
    ))
    .bind(entity.path())
    .bind(since)
    .fetch_all(pool)
    .await
}

/// Insert a new record.
pub async fn insert_record(
    pool: &PgPool,
    entity: EntityType,
    id: &str,
    version: i64,
    payload: &Value,
    now: DateTime<Utc>,
) -> Result<StoredRecord, sqlx::Error> {
    sqlx::query_as::<_, StoredRecord>(&format!(
        r#"
        INSERT INTO records (entity, id, version, payload, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(entity.path())
    .bind(id)
    .bind(version)
    .bind(payload)
    .bind(now)
    .fetch_one(pool)
    .await
}

/// Replace a record's payload. Returns `None` if the record does not exist.
///
/// The stored version becomes `max(stored + 1, version)`.
pub async fn update_record(
    pool: &PgPool,
    entity: EntityType,
    id: &str,
    version: i64,
    payload: &Value,
    now: DateTime<Utc>,
) -> Result<Option<StoredRecord>, sqlx::Error> {
    sqlx::query_as::<_, StoredRecord>(&format!(
        r#"
        UPDATE records
        SET version = GREATEST(version + 1, $3),
            payload = $4,
            updated_at = $5
        WHERE entity = $1 AND id = $2
        RETURNING {COLUMNS}
        "#
    ))
    .bind(entity.path())
    .bind(id)
    .bind(version)
    .bind(payload)
    .bind(now)
    .fetch_optional(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn wire_body_carries_bookkeeping() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let stored = StoredRecord {
            entity: "inventory".into(),
            id: "srv-1".into(),
            version: 3,
            payload: json!({"name": "Bolt", "quantity": 5}),
            created_at: at,
            updated_at: at,
        };

        let body = stored.to_wire();

        assert_eq!(body["id"], "srv-1");
        assert_eq!(body["version"], 3);
        assert_eq!(body["updated_at"], "2024-03-01T09:00:00+00:00");
        assert_eq!(body["quantity"], 5);
    }
}
