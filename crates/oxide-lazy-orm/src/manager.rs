//! Manager for database access.
//!
//! The Manager is the entry point for a record type: it starts fresh query
//! sets and runs the two immediate operations, `get` and `create`.

use std::sync::Arc;

use tracing::debug;

use crate::connection::Connection;
use crate::error::{OrmError, Result};
use crate::query::Operand;
use crate::queryset::QuerySet;
use crate::record::Record;
use crate::schema::{Schema, ID_COLUMN};
use crate::value::ToSqlValue;

/// A Manager provides database access methods for one record type.
///
/// Managers are lightweight and can be created freely through
/// [`Schema::objects`] or [`Registry::objects`](crate::Registry::objects).
///
/// # Example
///
/// ```ignore
/// // Get all users
/// let users = user.objects().all().into_records(&mut db)?;
///
/// // Get a specific user
/// let alice = user.objects().get(&mut db, [("name", "alice")])?;
///
/// // Create a new user
/// let bob = user.objects().create(&mut db, [("name", "bob")])?;
/// ```
#[derive(Debug, Clone)]
pub struct Manager {
    schema: Arc<Schema>,
}

impl Manager {
    /// Creates a Manager for `schema`.
    #[must_use]
    pub fn new(schema: Arc<Schema>) -> Self {
        Self { schema }
    }

    /// Returns the record type.
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns a QuerySet for all objects, in the default ordering.
    #[must_use]
    pub fn all(&self) -> QuerySet {
        QuerySet::new(Arc::clone(&self.schema))
    }

    /// Returns a QuerySet seeded with the given predicates.
    pub fn filter<I, K, V>(&self, predicates: I) -> Result<QuerySet>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Operand>,
    {
        self.all().filter(predicates)
    }

    /// Fetches the single object matching every predicate.
    ///
    /// Runs immediately. Fails with [`OrmError::DoesNotExist`] when nothing
    /// matches and [`OrmError::MultipleObjectsReturned`] when more than one
    /// row does.
    pub fn get<C, I, K, V>(&self, conn: &mut C, predicates: I) -> Result<Record>
    where
        C: Connection + ?Sized,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Operand>,
    {
        let mut records = self.filter(predicates)?.into_records(conn)?;
        match records.len() {
            0 => Err(OrmError::DoesNotExist {
                table: self.schema.table_name().to_string(),
            }),
            1 => Ok(records.remove(0)),
            count => Err(OrmError::MultipleObjectsReturned {
                table: self.schema.table_name().to_string(),
                count,
            }),
        }
    }

    /// Inserts a new row and returns it as stored.
    ///
    /// Absent fields take their declared defaults. The insert is committed
    /// before returning, and the result is decoded from the row the database
    /// hands back, so database-side values are reflected.
    pub fn create<C, I, K, V>(&self, conn: &mut C, values: I) -> Result<Record>
    where
        C: Connection + ?Sized,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: ToSqlValue,
    {
        let pending = Record::new(&self.schema, values)?;
        pending.check_fields()?;

        let table = self.schema.table_name();
        let mut columns: Vec<&str> = Vec::new();
        let mut params = Vec::new();
        if let Some(id) = pending.id() {
            columns.push(ID_COLUMN);
            params.push(id.to_sql_value());
        }
        for (name, value) in pending.values() {
            columns.push(name);
            params.push(value.clone());
        }

        let sql = if columns.is_empty() {
            format!("INSERT INTO {table} DEFAULT VALUES RETURNING *")
        } else {
            let placeholders: Vec<&str> = columns.iter().map(|_| "?").collect();
            format!(
                "INSERT INTO {table} ({}) VALUES ({}) RETURNING *",
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        debug!(table = %table, "Creating record");
        let rows = conn.fetch_all(&sql, &params)?;
        conn.commit()?;
        rows.into_records(&self.schema)?
            .into_iter()
            .next()
            .ok_or(OrmError::Database(sqlx::Error::RowNotFound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Field;

    fn user() -> Arc<Schema> {
        Schema::builder("ormtable")
            .field("name", Field::text().required())
            .field("age", Field::integer())
            .ordering(["-name"])
            .build()
            .unwrap()
    }

    #[test]
    fn test_all_inherits_default_ordering() {
        let qs = user().objects().all();
        assert_eq!(qs.ordering(), user().ordering());
        assert!(!qs.is_materialized());
    }

    #[test]
    fn test_filter_seeds_predicates() {
        let (sql, params) = user()
            .objects()
            .filter([("name__startswith", "a")])
            .unwrap()
            .build_select();
        assert_eq!(
            sql,
            "SELECT * FROM ormtable WHERE name LIKE ? ESCAPE '\\' ORDER BY name DESC NULLS LAST"
        );
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_filter_rejects_unknown_field() {
        assert!(matches!(
            user().objects().filter([("height", 1)]),
            Err(OrmError::UnknownField { .. })
        ));
    }
}
