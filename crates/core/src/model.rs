//! Content records and model descriptors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Error;

/// Fields every record carries regardless of model, in both spellings.
pub const SYSTEM_FIELDS: &[&str] =
    &["id", "createdAt", "updatedAt", "status", "scheduled", "created_at", "updated_at"];

/// Publication state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Draft,
    Changed,
    Publish,
}

/// A single content item.
///
/// JSON records use camelCase field names, SQLite records use the raw
/// snake_case column names. Relations are never stored on a record; see
/// [`crate::query::ResolvedRecord`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Build a record from a JSON value; only objects are records.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }

    pub fn id(&self) -> Option<&Value> {
        self.0.get("id")
    }

    /// The record id as a comparable string key.
    pub fn id_key(&self) -> Option<String> {
        self.id().and_then(id_key)
    }

    pub fn status(&self) -> Option<Status> {
        self.0.get("status").and_then(|v| Status::deserialize(v).ok())
    }
}

/// Normalize an id value (string or number) into a lookup key.
pub fn id_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Cardinality of a relation field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    OneToOne,
    OneToMany,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::OneToOne => "one-to-one",
            RelationKind::OneToMany => "one-to-many",
        }
    }

    pub fn parse(component: &str) -> Option<Self> {
        match component {
            "one-to-one" => Some(RelationKind::OneToOne),
            "one-to-many" => Some(RelationKind::OneToMany),
            _ => None,
        }
    }
}

/// Target model and cardinality of a relation field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationSpec {
    pub field_id: String,
    pub target_model: String,
    pub kind: RelationKind,
}

/// Extra field settings; only the relation reference is interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOptions {
    /// Target model id of a relation field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// One field of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub field_id: String,
    #[serde(default)]
    pub field_type: String,
    /// Component kind; for relation fields this encodes the cardinality.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
    /// Whether the value varies per locale.
    #[serde(default)]
    pub localized: bool,
    #[serde(default)]
    pub options: FieldOptions,
}

impl FieldDescriptor {
    pub fn is_relation(&self) -> bool {
        self.field_type == "relation"
    }
}

/// Describes a content collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub localization: bool,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl ModelDescriptor {
    pub fn field(&self, field_id: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.field_id == field_id)
    }

    /// Whether `field` holds a per-locale value in this model.
    pub fn is_translatable(&self, field: &str) -> bool {
        if !self.localization || is_system_field(field) {
            return false;
        }
        self.field(field).is_some_and(|f| f.localized && !f.is_relation())
    }

    pub fn relation_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_relation())
    }

    /// Look up a relation field by name.
    ///
    /// # Errors
    ///
    /// Returns `Error::Relation` if the field does not exist, is not a
    /// relation, or its metadata lacks a target model or cardinality.
    pub fn relation(&self, name: &str) -> Result<RelationSpec, Error> {
        let field = self
            .field(name)
            .filter(|f| f.is_relation())
            .ok_or_else(|| Error::Relation(format!("'{name}' is not a relation field of model '{}'", self.model_id)))?;

        let target_model = field.options.reference.clone().ok_or_else(|| {
            Error::Relation(format!("relation '{name}' of model '{}' has no target model", self.model_id))
        })?;

        let component = field.component_id.as_deref().unwrap_or_default();
        let kind = RelationKind::parse(component).ok_or_else(|| {
            Error::Relation(format!(
                "relation '{name}' of model '{}' has unknown cardinality '{component}'",
                self.model_id
            ))
        })?;

        Ok(RelationSpec { field_id: field.field_id.clone(), target_model, kind })
    }
}

pub fn is_system_field(field: &str) -> bool {
    SYSTEM_FIELDS.contains(&field)
}

/// Convert a camelCase field name to its snake_case column name.
pub fn to_snake_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for (i, ch) in field.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Check that a model id or locale is safe to splice into a path or table name.
///
/// # Errors
///
/// Returns `Error::Validation` unless `value` is non-empty and made only of
/// ASCII letters, digits, `_` and `-`.
pub fn validate_identifier(what: &str, value: &str) -> Result<(), Error> {
    let valid = !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid { Ok(()) } else { Err(Error::Validation(format!("invalid {what} '{value}'"))) }
}
