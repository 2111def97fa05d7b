#![allow(dead_code)]

use std::sync::Arc;

use oxide_lazy_orm::{Connection, Field, Record, Rows, Schema, SqlValue, SqliteDatabase};

/// The record type most tests use: `ormtable` ordered by name descending.
pub fn user() -> Arc<Schema> {
    Schema::builder("ormtable")
        .name("User")
        .field("name", Field::text().required())
        .field("description", Field::text())
        .field("age", Field::integer())
        .field("date_added", Field::timestamp())
        .ordering(["-name"])
        .build()
        .unwrap_or_else(|e| panic!("Failed to build schema: {e}"))
}

/// An in-memory database with the `user()` table created.
pub fn db_with_users() -> (Arc<Schema>, RecordingConnection) {
    let schema = user();
    let mut db = SqliteDatabase::in_memory().expect("in-memory database");
    db.create_table(&schema).expect("create table");
    (schema, RecordingConnection::new(db))
}

/// Inserts `(name, age)` rows through the accessor.
pub fn seed(schema: &Arc<Schema>, conn: &mut RecordingConnection, people: &[(&str, i64)]) {
    for (name, age) in people {
        schema
            .objects()
            .create(
                conn,
                [("name", SqlValue::Text((*name).to_string())), ("age", SqlValue::Int(*age))],
            )
            .unwrap_or_else(|e| panic!("Failed to create {name}: {e}"));
    }
    conn.clear();
}

pub fn names(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.get("name").and_then(SqlValue::as_text).unwrap_or("").to_string())
        .collect()
}

/// A connection that logs every statement before forwarding it.
pub struct RecordingConnection {
    inner: SqliteDatabase,
    pub statements: Vec<String>,
}

impl RecordingConnection {
    pub fn new(inner: SqliteDatabase) -> Self {
        Self {
            inner,
            statements: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.statements.clear();
    }

    pub fn count_starting_with(&self, prefix: &str) -> usize {
        self.statements.iter().filter(|s| s.starts_with(prefix)).count()
    }

    pub fn inner(&mut self) -> &mut SqliteDatabase {
        &mut self.inner
    }
}

impl Connection for RecordingConnection {
    fn fetch_all(&mut self, sql: &str, params: &[SqlValue]) -> oxide_lazy_orm::Result<Rows> {
        self.statements.push(sql.to_string());
        self.inner.fetch_all(sql, params)
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> oxide_lazy_orm::Result<u64> {
        self.statements.push(sql.to_string());
        self.inner.execute(sql, params)
    }

    fn commit(&mut self) -> oxide_lazy_orm::Result<()> {
        self.inner.commit()
    }
}
