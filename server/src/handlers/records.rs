//! Record handlers - validate client payloads and persist them.

use crate::db;
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;
use stocksync_engine::{EntityType, Schema};

/// Query parameters for listing records.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Only records updated at or after this RFC 3339 time
    pub since: Option<String>,
}

impl ListQuery {
    pub fn since(&self) -> Result<Option<DateTime<Utc>>> {
        self.since
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| {
                DateTime::parse_from_rfc3339(s)
                    .map(|at| at.with_timezone(&Utc))
                    .map_err(|_| AppError::BadRequest(format!("invalid since timestamp: {s}")))
            })
            .transpose()
    }
}

/// A validated create or update body.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBody {
    /// Entity fields only
    pub payload: Value,
    /// Version the client claims, if any
    pub version: Option<i64>,
}

/// Split a client body into entity fields and the version the client sent.
///
/// `id`, `updated_at` and `local_id` are client bookkeeping and are dropped,
/// as is anything outside the entity schema.
pub fn parse_body(schema: &Schema, entity: EntityType, body: Value) -> Result<RecordBody> {
    let Value::Object(mut fields) = body else {
        return Err(AppError::BadRequest(
            "request body must be a JSON object".to_string(),
        ));
    };

    let version = match fields.remove("version") {
        None | Some(Value::Null) => None,
        Some(value) => Some(value.as_i64().filter(|v| *v >= 1).ok_or_else(|| {
            AppError::BadRequest("version must be a positive integer".to_string())
        })?),
    };

    let entity_schema = schema
        .get(entity)
        .ok_or_else(|| AppError::NotFound(format!("unknown entity: {entity}")))?;
    let payload = entity_schema.project(&fields);
    entity_schema.validate_payload(&payload)?;

    Ok(RecordBody { payload, version })
}

/// Records of `entity` changed since the query's `since`.
pub async fn handle_list(pool: &PgPool, entity: EntityType, query: ListQuery) -> Result<Vec<Value>> {
    let since = query.since()?;
    let records = db::list_records_since(pool, entity, since).await?;

    tracing::debug!(%entity, ?since, count = records.len(), "Served records");
    Ok(records.iter().map(db::StoredRecord::to_wire).collect())
}

/// Store a new record under a fresh identifier.
pub async fn handle_create(pool: &PgPool, entity: EntityType, body: RecordBody) -> Result<Value> {
    let id = uuid::Uuid::new_v4().to_string();
    let version = body.version.unwrap_or(1);

    let stored = db::insert_record(pool, entity, &id, version, &body.payload, Utc::now()).await?;

    tracing::info!(%entity, id = %stored.id, version = stored.version, "Created record");
    Ok(stored.to_wire())
}

/// Replace the payload of an existing record.
pub async fn handle_update(
    pool: &PgPool,
    entity: EntityType,
    id: &str,
    body: RecordBody,
) -> Result<Value> {
    let version = body.version.unwrap_or(1);

    let stored = db::update_record(pool, entity, id, version, &body.payload, Utc::now())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("record not found: {entity}/{id}")))?;

    tracing::info!(%entity, id = %stored.id, version = stored.version, "Updated record");
    Ok(stored.to_wire())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_body_strips_bookkeeping() {
        let body = json!({
            "name": "Bolt",
            "quantity": 5,
            "version": 3,
            "updated_at": "2024-03-01T09:00:00+00:00",
            "local_id": "a1",
            "id": "ignored",
            "colour": "not in schema"
        });

        let parsed = parse_body(&Schema::inventory(), EntityType::InventoryItems, body).unwrap();

        assert_eq!(parsed.version, Some(3));
        assert_eq!(parsed.payload, json!({"name": "Bolt", "quantity": 5}));
    }

    #[test]
    fn parse_body_validates_schema() {
        let missing = parse_body(
            &Schema::inventory(),
            EntityType::Categories,
            json!({"description": "no name"}),
        );
        assert!(matches!(
            missing,
            Err(AppError::Engine(stocksync_engine::Error::MissingRequiredField(_)))
        ));

        let wrong_type = parse_body(
            &Schema::inventory(),
            EntityType::InventoryItems,
            json!({"name": "Bolt", "quantity": "five"}),
        );
        assert!(matches!(wrong_type, Err(AppError::Engine(_))));
    }

    #[test]
    fn parse_body_rejects_bad_version_and_shape() {
        let bad_version = parse_body(
            &Schema::inventory(),
            EntityType::Categories,
            json!({"name": "Tools", "version": "two"}),
        );
        assert!(matches!(bad_version, Err(AppError::BadRequest(_))));

        let not_object = parse_body(&Schema::inventory(), EntityType::Categories, json!([1, 2]));
        assert!(matches!(not_object, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn since_parsing() {
        let query = ListQuery {
            since: Some("2024-03-01T09:00:00+02:00".to_string()),
        };
        assert_eq!(
            query.since().unwrap().unwrap().to_rfc3339(),
            "2024-03-01T07:00:00+00:00"
        );

        assert!(ListQuery::default().since().unwrap().is_none());

        let bad = ListQuery {
            since: Some("yesterday".to_string()),
        };
        assert!(matches!(bad.since(), Err(AppError::BadRequest(_))));
    }
}
