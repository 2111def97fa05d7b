//! Error types for the ORM.

use thiserror::Error;

/// ORM-specific errors.
///
/// Every failure surfaces as its own variant so callers can tell "not found"
/// from "ambiguous" from "constraint violated".
#[derive(Debug, Error)]
pub enum OrmError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error while opening the runtime or reading a settings file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed settings file.
    #[error("settings error: {0}")]
    Settings(#[from] serde_json::Error),

    /// `get()` matched zero rows.
    #[error("{table} matching query does not exist")]
    DoesNotExist {
        /// Table that was queried.
        table: String,
    },

    /// `get()` matched more than one row.
    #[error("get() returned more than one {table} -- it returned {count}")]
    MultipleObjectsReturned {
        /// Table that was queried.
        table: String,
        /// Number of rows returned.
        count: usize,
    },

    /// Delete attempted without an identity, or the statement failed.
    #[error("{table} object can't be deleted: {reason}")]
    Delete {
        /// Table of the instance.
        table: String,
        /// What went wrong.
        reason: String,
        /// Underlying database failure, if any.
        #[source]
        source: Option<Box<OrmError>>,
    },

    /// A required field holds no value at save time.
    #[error("NOT NULL constraint failed: {table}.{field}")]
    Integrity {
        /// Table of the instance.
        table: String,
        /// Offending field.
        field: String,
    },

    /// Ordering refers to a field the record type does not declare.
    #[error("ordering refers to the nonexistent field '{field}' of {table}")]
    OrderByField {
        /// Table of the record type.
        table: String,
        /// Unknown field name.
        field: String,
    },

    /// A record type declares more than one parent.
    #[error("{table} can't inherit more than one record type")]
    ParentClash {
        /// Table of the offending record type.
        table: String,
    },

    /// A record type was registered without a table name.
    #[error("table name is empty")]
    MissingTableName,

    /// No record type is registered under this name.
    #[error("unknown record type '{0}'")]
    UnknownRecordType(String),

    /// A filter or value refers to a field the record type does not declare.
    #[error("{table} has no field '{field}'")]
    UnknownField {
        /// Table of the record type.
        table: String,
        /// Unknown field name.
        field: String,
    },

    /// Malformed compound filter key.
    #[error("invalid lookup '{key}': {reason}")]
    InvalidLookup {
        /// The compound key as given.
        key: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A value could not be coerced to the field's declared type.
    #[error("invalid value for field '{field}': {message}")]
    Validation {
        /// Field being assigned.
        field: String,
        /// Coercion failure.
        message: String,
    },
}

impl OrmError {
    pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn unknown_field(table: &str, field: &str) -> Self {
        Self::UnknownField {
            table: table.to_string(),
            field: field.to_string(),
        }
    }
}

/// Result type alias for ORM operations.
pub type Result<T> = std::result::Result<T, OrmError>;
