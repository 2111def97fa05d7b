//! SQLite connection handle.
//!
//! [`SqliteDatabase`] owns one `sqlx` connection and a private
//! current-thread runtime, so every call blocks the caller until SQLite
//! answers. Statements run inside an implicitly opened transaction; nothing
//! is durable until [`commit`](Connection::commit).

use std::str::FromStr;

use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqliteRow};
use sqlx::{Column, Connection as _, Row, Sqlite, SqliteConnection, TypeInfo, ValueRef};
use tokio::runtime::Runtime;
use tracing::{debug, trace};

use crate::connection::{Connection, Rows};
use crate::error::Result;
use crate::schema::Schema;
use crate::value::SqlValue;

type Query<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// A single SQLite connection driven synchronously.
///
/// Open it once and pass it by `&mut` to every executing operation.
///
/// ```ignore
/// let mut db = SqliteDatabase::connect("sqlite::memory:")?;
/// db.create_table(&user)?;
/// let alice = user.objects().create(&mut db, [("name", "alice")])?;
/// ```
pub struct SqliteDatabase {
    runtime: Runtime,
    conn: SqliteConnection,
    in_transaction: bool,
}

impl std::fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatabase")
            .field("in_transaction", &self.in_transaction)
            .finish_non_exhaustive()
    }
}

impl SqliteDatabase {
    /// Opens a connection, creating the database file if it is missing.
    ///
    /// Accepts `sqlite::memory:`, `sqlite:path.db` and `sqlite://path.db`.
    pub fn connect(url: &str) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let conn = runtime.block_on(SqliteConnection::connect_with(&options))?;
        debug!(url = %url, "Opened SQLite connection");
        Ok(Self {
            runtime,
            conn,
            in_transaction: false,
        })
    }

    /// Opens a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:")
    }

    /// Returns whether uncommitted statements are pending.
    #[must_use]
    pub const fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Creates the table for `schema` if it does not exist yet, and commits.
    pub fn create_table(&mut self, schema: &Schema) -> Result<()> {
        self.execute(&schema.create_table_sql(), &[])?;
        self.commit()
    }

    /// Discards everything executed since the last commit.
    pub fn rollback(&mut self) -> Result<()> {
        if self.in_transaction {
            self.raw("ROLLBACK")?;
            self.in_transaction = false;
            trace!("Rolled back");
        }
        Ok(())
    }

    /// Closes the connection. Uncommitted statements are discarded.
    pub fn close(self) -> Result<()> {
        let Self { runtime, conn, .. } = self;
        runtime.block_on(conn.close())?;
        debug!("Closed SQLite connection");
        Ok(())
    }

    fn raw(&mut self, sql: &str) -> Result<()> {
        let conn = &mut self.conn;
        self.runtime
            .block_on(async move { sqlx::raw_sql(sql).execute(conn).await })?;
        Ok(())
    }

    fn begin(&mut self) -> Result<()> {
        if !self.in_transaction {
            self.raw("BEGIN")?;
            self.in_transaction = true;
        }
        Ok(())
    }
}

impl Connection for SqliteDatabase {
    fn fetch_all(&mut self, sql: &str, params: &[SqlValue]) -> Result<Rows> {
        self.begin()?;
        debug!(sql = %sql, params = params.len(), "Executing SQL");

        let conn = &mut self.conn;
        let rows = self.runtime.block_on(async move {
            bind_all(sqlx::query(sql), params).fetch_all(conn).await
        })?;

        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let values = rows.iter().map(decode_row).collect::<Result<Vec<_>>>()?;
        Ok(Rows::new(columns, values))
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        self.begin()?;
        debug!(sql = %sql, params = params.len(), "Executing SQL");

        let conn = &mut self.conn;
        let result = self.runtime.block_on(async move {
            bind_all(sqlx::query(sql), params).execute(conn).await
        })?;
        Ok(result.rows_affected())
    }

    fn commit(&mut self) -> Result<()> {
        if self.in_transaction {
            self.raw("COMMIT")?;
            self.in_transaction = false;
            trace!("Committed");
        }
        Ok(())
    }
}

fn bind_all<'q>(mut query: Query<'q>, params: &[SqlValue]) -> Query<'q> {
    for value in params {
        query = bind_param(query, value.clone());
    }
    query
}

/// Binds a SqlValue parameter to a query.
fn bind_param(query: Query<'_>, value: SqlValue) -> Query<'_> {
    match value {
        SqlValue::Null => query.bind(Option::<i64>::None),
        SqlValue::Int(i) => query.bind(i),
        SqlValue::Float(f) => query.bind(f),
        SqlValue::Text(s) => query.bind(s),
        SqlValue::Timestamp(t) => query.bind(t),
    }
}

/// Decodes a row by the storage class of each value.
fn decode_row(row: &SqliteRow) -> Result<Vec<SqlValue>> {
    let mut values = Vec::with_capacity(row.len());
    for index in 0..row.len() {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            values.push(SqlValue::Null);
            continue;
        }
        let storage = raw.type_info().name().to_string();
        let value = match storage.as_str() {
            "INTEGER" | "BOOLEAN" => SqlValue::Int(row.try_get_unchecked::<i64, _>(index)?),
            "REAL" => SqlValue::Float(row.try_get_unchecked::<f64, _>(index)?),
            "BLOB" => {
                let bytes = row.try_get_unchecked::<Vec<u8>, _>(index)?;
                SqlValue::Text(String::from_utf8_lossy(&bytes).into_owned())
            }
            _ => SqlValue::Text(row.try_get_unchecked::<String, _>(index)?),
        };
        values.push(value);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_reports_columns_and_storage_classes() {
        let mut db = SqliteDatabase::in_memory().unwrap();
        let rows = db
            .fetch_all(
                "SELECT 1 AS a, 2.5 AS b, 'x' AS c, NULL AS d, ? AS e",
                &[SqlValue::Text("bound".into())],
            )
            .unwrap();
        assert_eq!(rows.columns, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(
            rows.values,
            vec![vec![
                SqlValue::Int(1),
                SqlValue::Float(2.5),
                SqlValue::Text("x".into()),
                SqlValue::Null,
                SqlValue::Text("bound".into()),
            ]]
        );
    }

    #[test]
    fn test_transaction_lifecycle() {
        let mut db = SqliteDatabase::in_memory().unwrap();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, v INTEGER)", &[])
            .unwrap();
        assert!(db.in_transaction());
        db.commit().unwrap();
        assert!(!db.in_transaction());

        db.execute("INSERT INTO t (v) VALUES (?)", &[SqlValue::Int(1)])
            .unwrap();
        db.rollback().unwrap();
        let rows = db.fetch_all("SELECT v FROM t", &[]).unwrap();
        assert!(rows.is_empty());

        let affected = db
            .execute("INSERT INTO t (v) VALUES (?), (?)", &[SqlValue::Int(1), SqlValue::Int(2)])
            .unwrap();
        assert_eq!(affected, 2);
        db.commit().unwrap();
        db.close().unwrap();
    }
}
