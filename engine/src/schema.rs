//! Schema definition and validation.
//!
//! Every entity type has a fixed set of fields. The schema validates payloads
//! before they enter the store and defines which fields are taken from the
//! remote when a remote version wins a conflict.

use crate::{error::Result, EntityType, Error, SchemaVersion};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Version of the built-in inventory schema.
pub const SCHEMA_VERSION: SchemaVersion = 1;

/// Field types supported in schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    /// RFC 3339 timestamp string
    Timestamp,
    /// Arbitrary nested JSON
    Json,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::String => write!(f, "String"),
            FieldType::Int => write!(f, "Int"),
            FieldType::Float => write!(f, "Float"),
            FieldType::Bool => write!(f, "Bool"),
            FieldType::Timestamp => write!(f, "Timestamp"),
            FieldType::Json => write!(f, "Json"),
        }
    }
}

/// Definition of a field in an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
}

impl FieldDef {
    /// Create a new required field definition.
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
        }
    }

    /// Create a new optional field definition.
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
        }
    }

    /// Validate a JSON value against this field definition.
    pub fn validate(&self, value: Option<&Value>) -> Result<()> {
        match value {
            None | Some(Value::Null) if self.required => {
                Err(Error::MissingRequiredField(self.name.clone()))
            }
            None | Some(Value::Null) => Ok(()),
            Some(v) => self.validate_type(v),
        }
    }

    fn validate_type(&self, value: &Value) -> Result<()> {
        let valid = match self.field_type {
            FieldType::String => value.is_string(),
            FieldType::Int => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_number(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Timestamp => value
                .as_str()
                .is_some_and(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok()),
            FieldType::Json => true,
        };

        if valid {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                field: self.name.clone(),
                expected: self.field_type.to_string(),
                got: json_type_name(value).to_string(),
            })
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "Null",
        Value::Bool(_) => "Bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "Int",
        Value::Number(_) => "Float",
        Value::String(_) => "String",
        Value::Array(_) => "Array",
        Value::Object(_) => "Object",
    }
}

/// Schema for one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySchema {
    pub entity: EntityType,
    pub fields: Vec<FieldDef>,
}

impl EntitySchema {
    pub fn new(entity: EntityType, fields: Vec<FieldDef>) -> Self {
        Self { entity, fields }
    }

    /// Validate a payload against this schema.
    pub fn validate_payload(&self, payload: &Value) -> Result<()> {
        let obj = payload
            .as_object()
            .ok_or_else(|| Error::InvalidPayload("payload must be an object".into()))?;

        for field in &self.fields {
            field.validate(obj.get(&field.name))?;
        }

        Ok(())
    }

    /// Overwrite the schema fields of `local` with those present in `remote`.
    ///
    /// Local fields outside the schema survive; remote fields outside the
    /// schema are dropped. A schema field absent from the remote is removed.
    pub fn merge_remote(&self, local: &Value, remote: &Map<String, Value>) -> Value {
        let mut merged = local.as_object().cloned().unwrap_or_default();
        for field in &self.fields {
            match remote.get(&field.name) {
                Some(value) => {
                    merged.insert(field.name.clone(), value.clone());
                }
                None => {
                    merged.remove(&field.name);
                }
            }
        }
        Value::Object(merged)
    }

    /// Keep only the schema fields of a remote payload.
    pub fn project(&self, remote: &Map<String, Value>) -> Value {
        self.merge_remote(&Value::Object(Map::new()), remote)
    }
}

/// Schema for the entire store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Schema version for snapshot compatibility
    pub version: SchemaVersion,
    pub entities: BTreeMap<EntityType, EntitySchema>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new(version: SchemaVersion) -> Self {
        Self {
            version,
            entities: BTreeMap::new(),
        }
    }

    /// The built-in schema of the inventory app.
    pub fn inventory() -> Self {
        use FieldType::*;

        Self::new(SCHEMA_VERSION)
            .with_entity(EntitySchema::new(
                EntityType::Categories,
                vec![
                    FieldDef::required("name", String),
                    FieldDef::optional("description", String),
                    FieldDef::optional("color", String),
                ],
            ))
            .with_entity(EntitySchema::new(
                EntityType::InventoryItems,
                vec![
                    FieldDef::required("name", String),
                    FieldDef::required("quantity", Int),
                    FieldDef::optional("sku", String),
                    FieldDef::optional("price", Float),
                    FieldDef::optional("category_id", String),
                    FieldDef::optional("location", String),
                    FieldDef::optional("min_stock", Int),
                ],
            ))
            .with_entity(EntitySchema::new(
                EntityType::Customers,
                vec![
                    FieldDef::required("name", String),
                    FieldDef::optional("email", String),
                    FieldDef::optional("phone", String),
                    FieldDef::optional("address", String),
                ],
            ))
            .with_entity(EntitySchema::new(
                EntityType::Orders,
                vec![
                    FieldDef::required("customer_id", String),
                    FieldDef::required("status", String),
                    FieldDef::optional("total", Float),
                    FieldDef::optional("items", Json),
                    FieldDef::optional("notes", String),
                    FieldDef::optional("ordered_at", Timestamp),
                ],
            ))
    }

    /// Add an entity schema.
    pub fn add_entity(&mut self, schema: EntitySchema) -> &mut Self {
        self.entities.insert(schema.entity, schema);
        self
    }

    /// Builder-style method to add an entity schema.
    pub fn with_entity(mut self, schema: EntitySchema) -> Self {
        self.add_entity(schema);
        self
    }

    pub fn get(&self, entity: EntityType) -> Option<&EntitySchema> {
        self.entities.get(&entity)
    }

    /// Validate a payload for the given entity type.
    pub fn validate(&self, entity: EntityType, payload: &Value) -> Result<()> {
        self.get(entity)
            .ok_or_else(|| Error::UnknownEntity(entity.to_string()))?
            .validate_payload(payload)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::inventory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items() -> EntitySchema {
        Schema::inventory()
            .get(EntityType::InventoryItems)
            .cloned()
            .unwrap()
    }

    #[test]
    fn validate_valid_payload() {
        let schema = items();
        assert!(schema
            .validate_payload(&json!({"name": "Bolt", "quantity": 5}))
            .is_ok());
        assert!(schema
            .validate_payload(&json!({"name": "Bolt", "quantity": 5, "price": 2, "sku": null}))
            .is_ok());
    }

    #[test]
    fn validate_missing_required_field() {
        let result = items().validate_payload(&json!({"name": "Bolt"}));
        assert!(matches!(result, Err(Error::MissingRequiredField(f)) if f == "quantity"));
    }

    #[test]
    fn validate_wrong_type() {
        let result = items().validate_payload(&json!({"name": "Bolt", "quantity": "five"}));
        assert!(matches!(result, Err(Error::TypeMismatch { field, .. }) if field == "quantity"));
    }

    #[test]
    fn validate_null_required_field() {
        let result = items().validate_payload(&json!({"name": null, "quantity": 1}));
        assert!(matches!(result, Err(Error::MissingRequiredField(f)) if f == "name"));
    }

    #[test]
    fn validate_non_object() {
        let result = items().validate_payload(&json!([1, 2]));
        assert!(matches!(result, Err(Error::InvalidPayload(_))));
    }

    #[test]
    fn timestamp_fields_require_rfc3339() {
        let orders = Schema::inventory();
        let ok = json!({"customer_id": "c1", "status": "open", "ordered_at": "2024-03-01T09:00:00Z"});
        let bad = json!({"customer_id": "c1", "status": "open", "ordered_at": "yesterday"});

        assert!(orders.validate(EntityType::Orders, &ok).is_ok());
        assert!(matches!(
            orders.validate(EntityType::Orders, &bad),
            Err(Error::TypeMismatch { field, .. }) if field == "ordered_at"
        ));
    }

    #[test]
    fn merge_remote_overwrites_schema_fields_only() {
        let local = json!({"name": "Bolt", "quantity": 5, "sku": "B-1", "shelf_note": "top"});
        let remote = json!({"name": "Bolt", "quantity": 9, "server_only": true});

        let merged = items().merge_remote(&local, remote.as_object().unwrap());

        assert_eq!(merged["quantity"], 9);
        assert_eq!(merged["shelf_note"], "top");
        assert!(merged.get("sku").is_none());
        assert!(merged.get("server_only").is_none());
    }

    #[test]
    fn every_entity_has_a_schema() {
        let schema = Schema::inventory();
        for entity in EntityType::SYNC_ORDER {
            assert!(schema.get(entity).is_some(), "missing schema for {entity}");
        }
    }

    #[test]
    fn json_field_accepts_any() {
        let schema = Schema::inventory();
        for items in [json!("x"), json!(1), json!([{"sku": "B-1", "qty": 2}]), json!({})] {
            let order = json!({"customer_id": "c1", "status": "open", "items": items});
            assert!(schema.validate(EntityType::Orders, &order).is_ok());
        }
    }

    #[test]
    fn field_type_display() {
        assert_eq!(FieldType::String.to_string(), "String");
        assert_eq!(FieldType::Timestamp.to_string(), "Timestamp");
    }

    #[test]
    fn schema_serialization() {
        let schema = Schema::inventory();
        let json = serde_json::to_string(&schema).unwrap();
        let parsed: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(schema, parsed);
    }
}
