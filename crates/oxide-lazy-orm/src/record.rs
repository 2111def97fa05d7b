//! Record instances and their lifecycle (save / delete).

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::connection::Connection;
use crate::error::{OrmError, Result};
use crate::schema::{Schema, ID_COLUMN};
use crate::value::{SqlValue, ToSqlValue};

/// One row of a record type: an optional identity plus one value per field.
///
/// An instance without an identity has not been persisted yet. `save` inserts
/// it and assigns the identity; later `save` calls update the same row.
///
/// # Example
///
/// ```
/// use oxide_lazy_orm::{Field, Record, Schema, SqlValue};
///
/// let user = Schema::builder("users")
///     .field("name", Field::text().required())
///     .field("age", Field::integer())
///     .build()
///     .unwrap();
///
/// let mut alice = Record::new(&user, [("name", "alice")]).unwrap();
/// alice.set("age", "30").unwrap();
/// assert_eq!(alice.get("age"), Some(&SqlValue::Int(30)));
/// assert_eq!(alice.id(), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: Arc<Schema>,
    id: Option<i64>,
    values: Vec<SqlValue>,
}

impl Record {
    /// Builds an unsaved instance from named values.
    ///
    /// Absent fields take their declared default, or NULL. An `id` entry sets
    /// the identity. Unknown names and uncoercible values fail.
    pub fn new<I, K, V>(schema: &Arc<Schema>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: ToSqlValue,
    {
        let defaults = schema
            .fields()
            .map(|(name, field)| match field.default_value() {
                Some(default) => field.coerce(name, default.clone()),
                None => Ok(SqlValue::Null),
            })
            .collect::<Result<Vec<_>>>()?;
        let mut record = Self {
            schema: Arc::clone(schema),
            id: None,
            values: defaults,
        };
        for (name, value) in values {
            record.assign(name.as_ref(), value.to_sql_value())?;
        }
        Ok(record)
    }

    /// Decodes a fetched row, zipping `columns` with the row's values.
    ///
    /// Columns the record type does not declare are ignored; declared fields
    /// missing from the row are NULL.
    pub fn from_row(schema: &Arc<Schema>, columns: &[String], row: Vec<SqlValue>) -> Result<Self> {
        let mut record = Self {
            schema: Arc::clone(schema),
            id: None,
            values: vec![SqlValue::Null; schema.len()],
        };
        for (column, value) in columns.iter().zip(row) {
            if schema.has_column(column) {
                record.assign(column, value)?;
            }
        }
        Ok(record)
    }

    fn assign(&mut self, name: &str, value: SqlValue) -> Result<()> {
        if name == ID_COLUMN {
            self.id = match crate::fields::FieldType::Integer.convert(value) {
                Ok(SqlValue::Int(id)) => Some(id),
                Ok(_) => None,
                Err(message) => return Err(OrmError::validation(ID_COLUMN, message)),
            };
            return Ok(());
        }
        let schema = Arc::clone(&self.schema);
        let (position, field) = schema
            .fields()
            .enumerate()
            .find(|(_, (n, _))| *n == name)
            .map(|(i, (_, field))| (i, field))
            .ok_or_else(|| OrmError::unknown_field(schema.table_name(), name))?;
        self.values[position] = field.coerce(name, value)?;
        Ok(())
    }

    /// Returns the record type.
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns the identity, `None` until the instance is saved.
    #[must_use]
    pub const fn id(&self) -> Option<i64> {
        self.id
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.schema.position(name).map(|i| &self.values[i])
    }

    /// Assigns a field value, coercing it to the declared type.
    pub fn set<V: ToSqlValue>(&mut self, name: &str, value: V) -> Result<()> {
        if name == ID_COLUMN {
            return Err(OrmError::validation(
                ID_COLUMN,
                "the identity is assigned by save()",
            ));
        }
        self.assign(name, value.to_sql_value())
    }

    /// Iterates over `(field name, value)` pairs in declaration order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.schema.field_names().zip(self.values.iter())
    }

    /// Fails with an integrity error if a required field holds no value.
    pub fn check_fields(&self) -> Result<()> {
        for ((name, field), value) in self.schema.fields().zip(&self.values) {
            if field.validate(name, value.clone()).is_err() {
                return Err(OrmError::Integrity {
                    table: self.schema.table_name().to_string(),
                    field: name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Inserts or updates this instance, depending on whether it has an
    /// identity.
    ///
    /// Without an identity, one `INSERT ... RETURNING id` runs and the
    /// returned identity is stored on the instance. With one, an `UPDATE`
    /// rewrites every declared field of that row. Either way the change is
    /// committed before returning.
    pub fn save<C: Connection + ?Sized>(&mut self, conn: &mut C) -> Result<()> {
        self.check_fields()?;
        let table = self.schema.table_name();
        let columns: Vec<&str> = self.schema.field_names().collect();

        match self.id {
            Some(id) => {
                if columns.is_empty() {
                    return Ok(());
                }
                let assignments: Vec<String> =
                    columns.iter().map(|c| format!("{c} = ?")).collect();
                let sql = format!(
                    "UPDATE {table} SET {} WHERE {ID_COLUMN} = ?",
                    assignments.join(", ")
                );
                let mut params = self.values.clone();
                params.push(SqlValue::Int(id));

                debug!(table = %table, id, "Updating record");
                conn.execute(&sql, &params)?;
                conn.commit()?;
            }
            None => {
                let sql = if columns.is_empty() {
                    format!("INSERT INTO {table} DEFAULT VALUES RETURNING {ID_COLUMN}")
                } else {
                    let placeholders: Vec<&str> = columns.iter().map(|_| "?").collect();
                    format!(
                        "INSERT INTO {table} ({}) VALUES ({}) RETURNING {ID_COLUMN}",
                        columns.join(", "),
                        placeholders.join(", ")
                    )
                };

                debug!(table = %table, "Inserting record");
                let row = conn.fetch_one(&sql, &self.values)?;
                conn.commit()?;
                let id = row
                    .and_then(|row| row.into_iter().next())
                    .and_then(|value| value.as_int())
                    .ok_or(OrmError::Database(sqlx::Error::RowNotFound))?;
                self.id = Some(id);
            }
        }
        Ok(())
    }

    /// Deletes the row this instance was loaded from or saved to.
    ///
    /// Fails with a delete error when the instance has no identity or the
    /// statement fails; the cause is attached as the error source.
    pub fn delete<C: Connection + ?Sized>(&self, conn: &mut C) -> Result<()> {
        let table = self.schema.table_name();
        let Some(id) = self.id else {
            return Err(OrmError::Delete {
                table: table.to_string(),
                reason: format!("its {ID_COLUMN} attribute is not set"),
                source: None,
            });
        };

        debug!(table = %table, id, "Deleting record");
        let sql = format!("DELETE FROM {table} WHERE {ID_COLUMN} = ?");
        conn.execute(&sql, &[SqlValue::Int(id)])
            .and_then(|_| conn.commit())
            .map_err(|e| OrmError::Delete {
                table: table.to_string(),
                reason: format!("the statement for {ID_COLUMN} {id} failed"),
                source: Some(Box::new(e)),
            })
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "<{} {id}>", self.schema.name()),
            None => write!(f, "<{} unsaved>", self.schema.name()),
        }
    }
}
