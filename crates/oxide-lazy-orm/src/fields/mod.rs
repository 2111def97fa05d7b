//! Field descriptors for record type definitions.
//!
//! A field descriptor declares a column's scalar type, whether it is
//! required, and an optional default. Coercion rules for each scalar type
//! live in the submodules.

mod char;
mod numeric;
mod temporal;

use std::fmt;

use crate::error::{OrmError, Result};
use crate::value::{SqlValue, ToSqlValue};

pub use temporal::parse_timestamp;

/// Scalar type tag of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// 64-bit signed integer.
    Integer,
    /// UTF-8 text.
    Text,
    /// Timestamp without timezone.
    Timestamp,
    /// 64-bit float.
    Float,
}

impl FieldType {
    /// Returns the SQL column type for this field type.
    #[must_use]
    pub const fn sql_type(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Text => "TEXT",
            Self::Timestamp => "TIMESTAMP",
            Self::Float => "REAL",
        }
    }

    /// Parses a type name as used in settings files.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "integer" | "int" => Some(Self::Integer),
            "text" | "string" => Some(Self::Text),
            "timestamp" | "datetime" | "date" => Some(Self::Timestamp),
            "float" | "real" => Some(Self::Float),
            _ => None,
        }
    }

    /// Converts a non-null value to this type.
    ///
    /// NULL is returned unchanged; requiredness is not this method's concern.
    pub fn convert(self, value: SqlValue) -> std::result::Result<SqlValue, String> {
        if value.is_null() {
            return Ok(value);
        }
        match self {
            Self::Integer => numeric::to_int(value),
            Self::Float => numeric::to_float(value),
            Self::Text => Ok(char::to_text(value)),
            Self::Timestamp => temporal::to_timestamp(value),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integer => "integer",
            Self::Text => "text",
            Self::Timestamp => "timestamp",
            Self::Float => "float",
        };
        f.write_str(name)
    }
}

/// A column declaration: scalar type, requiredness and default.
///
/// # Example
///
/// ```
/// use oxide_lazy_orm::Field;
///
/// let name = Field::text().required();
/// let age = Field::integer().default(18);
/// assert!(name.is_required());
/// assert!(!age.is_required());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    field_type: FieldType,
    required: bool,
    default: Option<SqlValue>,
}

impl Field {
    /// Creates an optional field of the given type with no default.
    #[must_use]
    pub const fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            default: None,
        }
    }

    /// Creates an integer field.
    #[must_use]
    pub const fn integer() -> Self {
        Self::new(FieldType::Integer)
    }

    /// Creates a text field.
    #[must_use]
    pub const fn text() -> Self {
        Self::new(FieldType::Text)
    }

    /// Creates a timestamp field.
    #[must_use]
    pub const fn timestamp() -> Self {
        Self::new(FieldType::Timestamp)
    }

    /// Creates a float field.
    #[must_use]
    pub const fn float() -> Self {
        Self::new(FieldType::Float)
    }

    /// Marks the field as required (NOT NULL).
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the default used when no value is supplied.
    #[must_use]
    pub fn default<V: ToSqlValue>(mut self, value: V) -> Self {
        self.default = Some(value.to_sql_value());
        self
    }

    /// Returns the scalar type.
    #[must_use]
    pub const fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Returns whether the field must hold a value when saved.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the declared default, if any.
    #[must_use]
    pub const fn default_value(&self) -> Option<&SqlValue> {
        self.default.as_ref()
    }

    /// Coerces a value to the declared type, letting NULL through.
    ///
    /// Used when assigning values, so an instance can be built with a missing
    /// required value and rejected later at save time.
    pub fn coerce(&self, name: &str, value: SqlValue) -> Result<SqlValue> {
        self.field_type
            .convert(value)
            .map_err(|message| OrmError::validation(name, message))
    }

    /// Validates a value against the full declaration.
    ///
    /// NULL is accepted only when the field is not required; anything else is
    /// coerced to the declared type or rejected.
    pub fn validate(&self, name: &str, value: SqlValue) -> Result<SqlValue> {
        if value.is_null() && self.required {
            return Err(OrmError::validation(name, "value is required"));
        }
        self.coerce(name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_field_accepts_null() {
        let field = Field::integer();
        assert_eq!(field.validate("age", SqlValue::Null).unwrap(), SqlValue::Null);
    }

    #[test]
    fn test_required_field_rejects_null() {
        let field = Field::text().required();
        let err = field.validate("name", SqlValue::Null).unwrap_err();
        assert!(matches!(err, OrmError::Validation { ref field, .. } if field == "name"));
        // coerce lets NULL through regardless
        assert_eq!(field.coerce("name", SqlValue::Null).unwrap(), SqlValue::Null);
    }

    #[test]
    fn test_coerce_by_type() {
        assert_eq!(
            Field::integer().coerce("age", "21".to_sql_value()).unwrap(),
            SqlValue::Int(21)
        );
        assert_eq!(
            Field::float().coerce("score", 3_i64.to_sql_value()).unwrap(),
            SqlValue::Float(3.0)
        );
        assert_eq!(
            Field::text().coerce("name", 5_i64.to_sql_value()).unwrap(),
            SqlValue::Text("5".into())
        );
        assert!(Field::integer().coerce("age", "abc".to_sql_value()).is_err());
    }

    #[test]
    fn test_default() {
        let field = Field::integer().default(18);
        assert_eq!(field.default_value(), Some(&SqlValue::Int(18)));
        assert_eq!(Field::text().default_value(), None);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(FieldType::parse("Integer"), Some(FieldType::Integer));
        assert_eq!(FieldType::parse("datetime"), Some(FieldType::Timestamp));
        assert_eq!(FieldType::parse("blob"), None);
        assert_eq!(FieldType::Float.sql_type(), "REAL");
    }
}
