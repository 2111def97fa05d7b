//! Lookup conditions.
//!
//! A filter key is either a bare field name (`"age"`, meaning equality) or a
//! field name and a lookup operator joined by [`LOOKUP_SEPARATOR`]
//! (`"age__ge"`). Each `(key, operand)` pair becomes one [`Condition`], which
//! renders to a SQL boolean fragment with `?` placeholders.

use std::fmt;
use std::str::FromStr;

use crate::error::{OrmError, Result};
use crate::fields::FieldType;
use crate::schema::{Schema, ID_COLUMN};
use crate::value::{SqlValue, ToSqlValue};

/// Separates the field name from the lookup operator in a filter key.
pub const LOOKUP_SEPARATOR: &str = "__";

/// A named comparison mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup {
    /// `field = value` (the default when no operator is given).
    Exact,
    /// `field IN (v1, v2, ...)`.
    In,
    /// `field < value`.
    Lt,
    /// `field > value`.
    Gt,
    /// `field <= value`.
    Le,
    /// `field >= value`.
    Ge,
    /// `field LIKE '%value%'`.
    Contains,
    /// `field LIKE 'value%'`.
    StartsWith,
    /// `field LIKE '%value'`.
    EndsWith,
}

impl Lookup {
    /// Returns the operator name as written in a filter key.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::In => "in",
            Self::Lt => "lt",
            Self::Gt => "gt",
            Self::Le => "le",
            Self::Ge => "ge",
            Self::Contains => "contains",
            Self::StartsWith => "startswith",
            Self::EndsWith => "endswith",
        }
    }

    const fn is_pattern(self) -> bool {
        matches!(self, Self::Contains | Self::StartsWith | Self::EndsWith)
    }
}

impl FromStr for Lookup {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "exact" => Ok(Self::Exact),
            "in" => Ok(Self::In),
            "lt" => Ok(Self::Lt),
            "gt" => Ok(Self::Gt),
            "le" => Ok(Self::Le),
            "ge" => Ok(Self::Ge),
            "contains" => Ok(Self::Contains),
            "startswith" => Ok(Self::StartsWith),
            "endswith" => Ok(Self::EndsWith),
            other => Err(format!("unsupported lookup operator '{other}'")),
        }
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The right-hand side of a condition: one value, or a list for `in`.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A single comparison value.
    Value(SqlValue),
    /// A membership list.
    List(Vec<SqlValue>),
}

impl<T: ToSqlValue> From<T> for Operand {
    fn from(value: T) -> Self {
        Self::Value(value.to_sql_value())
    }
}

impl<T: ToSqlValue> From<Vec<T>> for Operand {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(ToSqlValue::to_sql_value).collect())
    }
}

impl<T: ToSqlValue, const N: usize> From<[T; N]> for Operand {
    fn from(values: [T; N]) -> Self {
        Self::List(values.into_iter().map(ToSqlValue::to_sql_value).collect())
    }
}

/// One `(field, lookup, operand)` triple.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    field: String,
    lookup: Lookup,
    operand: Operand,
}

impl Condition {
    /// Splits a compound filter key into field name and lookup.
    ///
    /// Zero or one separator is valid; more than one is an error.
    pub fn split_key(key: &str) -> Result<(&str, Lookup)> {
        let invalid = |reason: String| OrmError::InvalidLookup {
            key: key.to_string(),
            reason,
        };

        let mut parts = key.split(LOOKUP_SEPARATOR);
        let field = parts.next().unwrap_or_default();
        let lookup = parts.next();
        if parts.next().is_some() {
            return Err(invalid(format!(
                "more than one '{LOOKUP_SEPARATOR}' separator"
            )));
        }
        if field.is_empty() {
            return Err(invalid("missing field name".to_string()));
        }
        let lookup = match lookup {
            Some(op) => op.parse::<Lookup>().map_err(invalid)?,
            None => Lookup::Exact,
        };
        Ok((field, lookup))
    }

    /// Parses a compound key without checking it against a record type.
    pub fn parse(key: &str, operand: impl Into<Operand>) -> Result<Self> {
        let (field, lookup) = Self::split_key(key)?;
        Ok(Self {
            field: field.to_string(),
            lookup,
            operand: operand.into(),
        })
    }

    /// Parses a compound key and checks it against `schema`.
    ///
    /// The field must be declared (or be the identity column), and the operand
    /// is coerced to the field's type. Pattern lookups always compare text.
    pub fn resolve(schema: &Schema, key: &str, operand: impl Into<Operand>) -> Result<Self> {
        let Self {
            field,
            lookup,
            operand,
        } = Self::parse(key, operand)?;
        let field_type = schema
            .column_type(&field)
            .ok_or_else(|| OrmError::unknown_field(schema.table_name(), &field))?;
        let target = if lookup.is_pattern() {
            FieldType::Text
        } else {
            field_type
        };
        let coerce = |value: SqlValue| -> Result<SqlValue> {
            target
                .convert(value)
                .map_err(|message| OrmError::validation(&field, message))
        };

        let operand = match (lookup, operand) {
            (Lookup::In, Operand::Value(value)) => Operand::List(vec![coerce(value)?]),
            (Lookup::In, Operand::List(values)) => Operand::List(
                values
                    .into_iter()
                    .map(coerce)
                    .collect::<Result<Vec<_>>>()?,
            ),
            (_, Operand::Value(value)) => Operand::Value(coerce(value)?),
            (lookup, Operand::List(_)) => {
                return Err(OrmError::InvalidLookup {
                    key: key.to_string(),
                    reason: format!("'{lookup}' expects a single value, not a list"),
                });
            }
        };
        Ok(Self {
            field,
            lookup,
            operand,
        })
    }

    /// Returns the field name.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns the lookup operator.
    #[must_use]
    pub const fn lookup(&self) -> Lookup {
        self.lookup
    }

    /// Returns the operand.
    #[must_use]
    pub const fn operand(&self) -> &Operand {
        &self.operand
    }

    /// Renders the SQL fragment, pushing bound values onto `params`.
    pub fn to_sql(&self, params: &mut Vec<SqlValue>) -> String {
        let field = &self.field;
        let values: Vec<SqlValue> = match &self.operand {
            Operand::Value(v) => vec![v.clone()],
            Operand::List(vs) => vs.clone(),
        };

        match self.lookup {
            Lookup::In => {
                if values.is_empty() {
                    return "1 = 0".to_string();
                }
                let placeholders: Vec<&str> = values.iter().map(|_| "?").collect();
                params.extend(values);
                format!("{field} IN ({})", placeholders.join(", "))
            }
            Lookup::Exact if values.first().map_or(true, SqlValue::is_null) => {
                format!("{field} IS NULL")
            }
            Lookup::Exact | Lookup::Lt | Lookup::Gt | Lookup::Le | Lookup::Ge => {
                let op = match self.lookup {
                    Lookup::Lt => "<",
                    Lookup::Gt => ">",
                    Lookup::Le => "<=",
                    Lookup::Ge => ">=",
                    _ => "=",
                };
                params.extend(values.into_iter().take(1));
                format!("{field} {op} ?")
            }
            Lookup::Contains | Lookup::StartsWith | Lookup::EndsWith => {
                let text = values
                    .into_iter()
                    .next()
                    .map(|v| match v {
                        SqlValue::Text(s) => s,
                        other => other.to_string(),
                    })
                    .unwrap_or_default();
                let escaped = escape_like(&text);
                let pattern = match self.lookup {
                    Lookup::Contains => format!("%{escaped}%"),
                    Lookup::StartsWith => format!("{escaped}%"),
                    _ => format!("%{escaped}"),
                };
                params.push(SqlValue::Text(pattern));
                format!("{field} LIKE ? ESCAPE '\\'")
            }
        }
    }
}

/// Escapes LIKE wildcards so the operand matches literally.
fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Returns whether `name` can be used as a column name.
pub(crate) fn is_column_name(name: &str) -> bool {
    name == ID_COLUMN
        || (!name.is_empty()
            && !name.contains(LOOKUP_SEPARATOR)
            && !name.starts_with(|c: char| c.is_ascii_digit())
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
}
