//! The connection seam.
//!
//! The ORM never talks to a driver directly. It hands SQL text plus bound
//! parameters to a [`Connection`] and reads back column names and value
//! tuples. [`SqliteDatabase`](crate::SqliteDatabase) is the bundled
//! implementation.

use std::sync::Arc;

use crate::error::Result;
use crate::record::Record;
use crate::schema::Schema;
use crate::value::SqlValue;

/// A blocking statement executor.
///
/// Every call blocks until the database answers. Mutating statements are not
/// durable until [`commit`](Self::commit) is called.
pub trait Connection {
    /// Runs a statement and returns every row it produces.
    fn fetch_all(&mut self, sql: &str, params: &[SqlValue]) -> Result<Rows>;

    /// Runs a statement and returns the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    /// Makes everything executed so far durable.
    fn commit(&mut self) -> Result<()>;

    /// Runs a statement and returns its first row, if any.
    fn fetch_one(&mut self, sql: &str, params: &[SqlValue]) -> Result<Option<Vec<SqlValue>>> {
        Ok(self.fetch_all(sql, params)?.values.into_iter().next())
    }
}

impl<C: Connection + ?Sized> Connection for &mut C {
    fn fetch_all(&mut self, sql: &str, params: &[SqlValue]) -> Result<Rows> {
        (**self).fetch_all(sql, params)
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        (**self).execute(sql, params)
    }

    fn commit(&mut self) -> Result<()> {
        (**self).commit()
    }
}

/// A fetched result set: column names as reported by the driver, then rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
    /// Column names, in result order.
    pub columns: Vec<String>,
    /// One value tuple per row, aligned with `columns`.
    pub values: Vec<Vec<SqlValue>>,
}

impl Rows {
    /// Creates a result set.
    #[must_use]
    pub fn new(columns: Vec<String>, values: Vec<Vec<SqlValue>>) -> Self {
        Self { columns, values }
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns whether there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Decodes every row into a record of `schema`.
    pub fn into_records(self, schema: &Arc<Schema>) -> Result<Vec<Record>> {
        let Self { columns, values } = self;
        values
            .into_iter()
            .map(|row| Record::from_row(schema, &columns, row))
            .collect()
    }
}
