//! Record type declarations loaded from JSON.
//!
//! ```json
//! {
//!   "models": [
//!     {
//!       "name": "User",
//!       "table": "ormtable",
//!       "ordering": ["-name"],
//!       "fields": [
//!         { "name": "name", "type": "text", "required": true },
//!         { "name": "age", "type": "integer", "default": 18 }
//!       ]
//!     },
//!     { "name": "Man", "table": "men", "extends": ["User"], "fields": [] }
//!   ]
//! }
//! ```
//!
//! Loading goes through [`SchemaBuilder`], so a settings file is held to the
//! same checks as record types declared in code.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{OrmError, Result};
use crate::fields::{Field, FieldType};
use crate::schema::{Registry, SchemaBuilder};
use crate::value::SqlValue;

/// A settings file: the record types to register.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Declared record types.
    #[serde(default)]
    pub models: Vec<ModelSettings>,
}

/// One record type declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Record type name; defaults to the table name.
    #[serde(default)]
    pub name: Option<String>,
    /// Table name.
    #[serde(default)]
    pub table: String,
    /// Parent record types by name. At most one is allowed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extends: Vec<String>,
    /// Default ordering, `-` prefix for descending.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ordering: Vec<String>,
    /// Declared fields, in order.
    #[serde(default)]
    pub fields: Vec<FieldSettings>,
}

impl ModelSettings {
    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.table)
    }
}

/// One field declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSettings {
    /// Field (column) name.
    pub name: String,
    /// `integer`, `text`, `timestamp` or `float`.
    #[serde(rename = "type")]
    pub field_type: String,
    /// Whether the field must hold a value when saved.
    #[serde(default)]
    pub required: bool,
    /// Value used when none is supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl FieldSettings {
    fn to_field(&self) -> Result<Field> {
        let field_type = FieldType::parse(&self.field_type).ok_or_else(|| {
            OrmError::validation(
                &self.name,
                format!("unknown field type '{}'", self.field_type),
            )
        })?;
        let mut field = Field::new(field_type);
        if self.required {
            field = field.required();
        }
        if let Some(default) = &self.default {
            let value = json_to_value(&self.name, default)?;
            if !value.is_null() {
                let value = field.coerce(&self.name, value)?;
                field = field.default(value);
            }
        }
        Ok(field)
    }
}

fn json_to_value(field: &str, json: &serde_json::Value) -> Result<SqlValue> {
    use serde_json::Value;

    match json {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(b) => Ok(SqlValue::Int(i64::from(*b))),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Int)
            .or_else(|| n.as_f64().map(SqlValue::Float))
            .ok_or_else(|| OrmError::validation(field, format!("{n} is out of range"))),
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => Err(OrmError::validation(
            field,
            "default must be a scalar",
        )),
    }
}

impl Settings {
    /// Parses settings from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads settings from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading settings");
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Builds every declared record type into a registry.
    ///
    /// Parents may be declared before or after their children. A parent name
    /// that no model declares fails with [`OrmError::UnknownRecordType`].
    pub fn into_registry(self) -> Result<Registry> {
        let mut registry = Registry::new();
        let mut pending = self.models;

        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            for model in pending {
                let parents_ready = model
                    .extends
                    .iter()
                    .all(|parent| registry.get(parent).is_some());
                if parents_ready {
                    registry.register(model_builder(&registry, &model)?)?;
                } else {
                    deferred.push(model);
                }
            }
            if deferred.len() == before {
                let missing = deferred
                    .iter()
                    .flat_map(|m| m.extends.iter())
                    .find(|parent| registry.get(parent).is_none())
                    .cloned()
                    .unwrap_or_default();
                return Err(OrmError::UnknownRecordType(missing));
            }
            pending = deferred;
        }
        Ok(registry)
    }
}

fn model_builder(registry: &Registry, model: &ModelSettings) -> Result<SchemaBuilder> {
    let mut builder = SchemaBuilder::new(model.table.clone()).name(model.name());
    for parent in &model.extends {
        let parent = registry
            .get(parent)
            .ok_or_else(|| OrmError::UnknownRecordType(parent.clone()))?;
        builder = builder.extends(&parent);
    }
    for field in &model.fields {
        builder = builder.field(field.name.clone(), field.to_field()?);
    }
    Ok(builder.ordering(model.ordering.iter().cloned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const USERS: &str = r#"{
        "models": [
            { "name": "Man", "table": "men", "extends": ["User"],
              "fields": [ { "name": "sex", "type": "text" } ] },
            { "name": "User", "table": "ormtable", "ordering": ["-name"],
              "fields": [
                { "name": "name", "type": "text", "required": true },
                { "name": "age", "type": "integer", "default": "18" },
                { "name": "date_added", "type": "timestamp" }
              ] }
        ]
    }"#;

    #[test]
    fn test_into_registry_resolves_parents() {
        let registry = Settings::from_json(USERS).unwrap().into_registry().unwrap();
        assert_eq!(registry.names(), vec!["Man", "User"]);

        let man = registry.get("Man").unwrap();
        let names: Vec<&str> = man.field_names().collect();
        assert_eq!(names, vec!["name", "age", "date_added", "sex"]);

        let user = registry.get("User").unwrap();
        assert_eq!(
            user.field("age").unwrap().default_value(),
            Some(&SqlValue::Int(18))
        );
        assert!(user.field("name").unwrap().is_required());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(USERS.as_bytes()).unwrap();
        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.models.len(), 2);
        assert_eq!(settings.models[0].extends, vec!["User".to_string()]);
    }

    #[test]
    fn test_unknown_parent() {
        let json = r#"{ "models": [ { "table": "t", "extends": ["Ghost"] } ] }"#;
        let err = Settings::from_json(json).unwrap().into_registry().unwrap_err();
        assert!(matches!(err, OrmError::UnknownRecordType(ref name) if name == "Ghost"));
    }

    #[test]
    fn test_two_parents_clash() {
        let json = r#"{ "models": [
            { "table": "a" }, { "table": "b" },
            { "table": "c", "extends": ["a", "b"] }
        ] }"#;
        let err = Settings::from_json(json).unwrap().into_registry().unwrap_err();
        assert!(matches!(err, OrmError::ParentClash { .. }));
    }

    #[test]
    fn test_registration_checks_apply() {
        let missing_table = r#"{ "models": [ { "name": "X", "fields": [] } ] }"#;
        assert!(matches!(
            Settings::from_json(missing_table).unwrap().into_registry(),
            Err(OrmError::MissingTableName)
        ));

        let bad_type = r#"{ "models": [ { "table": "t",
            "fields": [ { "name": "a", "type": "blob" } ] } ] }"#;
        assert!(matches!(
            Settings::from_json(bad_type).unwrap().into_registry(),
            Err(OrmError::Validation { .. })
        ));

        let bad_default = r#"{ "models": [ { "table": "t",
            "fields": [ { "name": "a", "type": "integer", "default": "x" } ] } ] }"#;
        assert!(Settings::from_json(bad_default).unwrap().into_registry().is_err());

        assert!(matches!(
            Settings::from_json("{ not json"),
            Err(OrmError::Settings(_))
        ));
    }
}
