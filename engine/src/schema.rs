//! Payload schemas and enqueue-time validation.
//!
//! Payloads are opaque to the synchronizer, but a malformed payload should
//! fail at enqueue time instead of surfacing as a handler error during a
//! sync pass hours later. Each registered (entity, operation) pair carries a
//! field schema; the queue manager validates against it before persisting
//! anything.

use crate::{EntityKind, Error, OperationKind, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Field types supported in payload schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
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

/// Definition of a payload field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: FieldType,
    /// Whether this field is required
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
    pub fn validate(&self, value: Option<&serde_json::Value>) -> Result<()> {
        let value = match value {
            None | Some(serde_json::Value::Null) if self.required => {
                return Err(Error::MissingRequiredField(self.name.clone()));
            }
            None | Some(serde_json::Value::Null) => return Ok(()),
            Some(v) => v,
        };

        let valid = match self.field_type {
            FieldType::String => value.is_string(),
            FieldType::Int => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_number(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Timestamp => value.is_i64() || value.is_u64(),
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

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "Null",
        serde_json::Value::Bool(_) => "Bool",
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => "Int",
        serde_json::Value::Number(_) => "Float",
        serde_json::Value::String(_) => "String",
        serde_json::Value::Array(_) => "Array",
        serde_json::Value::Object(_) => "Object",
    }
}

/// Field schema for one (entity, operation) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadSchema {
    /// Field definitions
    pub fields: Vec<FieldDef>,
}

impl PayloadSchema {
    /// Create a new payload schema.
    pub fn new(fields: Vec<FieldDef>) -> Self {
        Self { fields }
    }

    /// Validate a payload against this schema.
    ///
    /// Fields outside the schema are allowed through; handlers own the full
    /// interpretation of the payload.
    pub fn validate(&self, payload: &serde_json::Value) -> Result<()> {
        let obj = payload
            .as_object()
            .ok_or_else(|| Error::InvalidPayload("payload must be an object".into()))?;

        for field in &self.fields {
            field.validate(obj.get(&field.name))?;
        }

        Ok(())
    }
}

/// The set of payload schemas, keyed by (entity, operation).
///
/// A pair with no schema is an unregistered combination and fails
/// validation outright, so this set doubles as the catalog of supported
/// operations per entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaSet {
    schemas: HashMap<(EntityKind, OperationKind), PayloadSchema>,
}

impl SchemaSet {
    /// Create an empty schema set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style method to add a schema for one (entity, operation) pair.
    pub fn with(
        mut self,
        entity: EntityKind,
        operation: OperationKind,
        schema: PayloadSchema,
    ) -> Self {
        self.schemas.insert((entity, operation), schema);
        self
    }

    /// Get the schema for a pair, if registered.
    pub fn get(&self, entity: EntityKind, operation: OperationKind) -> Option<&PayloadSchema> {
        self.schemas.get(&(entity, operation))
    }

    /// Whether the pair is a supported combination.
    pub fn supports(&self, entity: EntityKind, operation: OperationKind) -> bool {
        self.schemas.contains_key(&(entity, operation))
    }

    /// Validate a payload for a pair; unknown pairs are rejected.
    pub fn validate(
        &self,
        entity: EntityKind,
        operation: OperationKind,
        payload: &serde_json::Value,
    ) -> Result<()> {
        let schema = self
            .get(entity, operation)
            .ok_or_else(|| Error::UnsupportedOperation {
                entity: entity.to_string(),
                operation: operation.to_string(),
            })?;
        schema.validate(payload)
    }

    /// The default CRM catalog: every (entity, operation) pair the
    /// surrounding service layer ships handlers for.
    pub fn crm_default() -> Self {
        use EntityKind::*;
        use FieldType as T;
        use OperationKind::*;

        SchemaSet::new()
            .with(
                Lead,
                Create,
                PayloadSchema::new(vec![
                    FieldDef::required("phone", T::String),
                    FieldDef::required("email", T::String),
                    FieldDef::optional("name", T::String),
                    FieldDef::optional("source", T::String),
                    FieldDef::optional("assigned_to", T::String),
                ]),
            )
            .with(
                Lead,
                Update,
                PayloadSchema::new(vec![
                    FieldDef::required("id", T::String),
                    FieldDef::optional("fields", T::Json),
                ]),
            )
            .with(
                Lead,
                AddRemark,
                PayloadSchema::new(vec![
                    FieldDef::required("id", T::String),
                    FieldDef::required("remark", T::String),
                ]),
            )
            .with(
                Task,
                Create,
                PayloadSchema::new(vec![
                    FieldDef::required("title", T::String),
                    FieldDef::optional("lead_id", T::String),
                    FieldDef::optional("due_at", T::Timestamp),
                    FieldDef::optional("assigned_to", T::String),
                ]),
            )
            .with(
                Task,
                Update,
                PayloadSchema::new(vec![
                    FieldDef::required("id", T::String),
                    FieldDef::optional("fields", T::Json),
                ]),
            )
            .with(
                Task,
                Complete,
                PayloadSchema::new(vec![
                    FieldDef::required("id", T::String),
                    FieldDef::optional("completed_at", T::Timestamp),
                ]),
            )
            .with(
                Target,
                Create,
                PayloadSchema::new(vec![
                    FieldDef::required("name", T::String),
                    FieldDef::optional("amount", T::Float),
                    FieldDef::optional("period", T::String),
                ]),
            )
            .with(
                Target,
                Update,
                PayloadSchema::new(vec![
                    FieldDef::required("id", T::String),
                    FieldDef::optional("fields", T::Json),
                ]),
            )
            .with(
                FollowUp,
                Create,
                PayloadSchema::new(vec![
                    FieldDef::required("lead_id", T::String),
                    FieldDef::required("due_at", T::Timestamp),
                    FieldDef::optional("note", T::String),
                ]),
            )
            .with(
                FollowUp,
                Complete,
                PayloadSchema::new(vec![
                    FieldDef::required("id", T::String),
                    FieldDef::optional("outcome", T::String),
                ]),
            )
            .with(
                VoiceRemark,
                Create,
                PayloadSchema::new(vec![
                    FieldDef::required("lead_id", T::String),
                    FieldDef::required("audio_url", T::String),
                    FieldDef::optional("duration_ms", T::Int),
                ]),
            )
            .with(
                LeadAction,
                Create,
                PayloadSchema::new(vec![
                    FieldDef::required("lead_id", T::String),
                    FieldDef::required("action", T::String),
                    FieldDef::optional("detail", T::Json),
                ]),
            )
    }
}
