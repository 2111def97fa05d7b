//! # oxide-lazy-orm
//!
//! A small Django-like ORM over SQLite with lazy, cached query sets.
//!
//! This crate provides:
//! - [`Schema`] and [`Registry`] for declaring record types
//! - [`Manager`] as the per-record-type entry point (`all`, `filter`, `get`,
//!   `create`)
//! - [`QuerySet`] for lazy, chainable queries that execute once and cache
//! - [`Record`] instances with `save` and `delete`
//! - [`SqliteDatabase`], a blocking connection handle
//!
//! ## Quick Start
//!
//! ```ignore
//! use oxide_lazy_orm::{Field, Schema, SqliteDatabase};
//!
//! let user = Schema::builder("ormtable")
//!     .name("User")
//!     .field("name", Field::text().required())
//!     .field("age", Field::integer())
//!     .ordering(["-name"])
//!     .build()?;
//!
//! let mut db = SqliteDatabase::connect("sqlite:app.db")?;
//! db.create_table(&user)?;
//!
//! let alice = user.objects().create(&mut db, [("name", "alice")])?;
//!
//! let mut adults = user
//!     .objects()
//!     .filter([("age__ge", 21)])?
//!     .order_by(["age"])?
//!     .slice(..10);
//! for person in adults.iter(&mut db)? {
//!     println!("{person}");
//! }
//! ```
//!
//! ## Filter keys
//!
//! A filter key is a field name, optionally followed by `__` and a lookup:
//! `exact` (default), `in`, `lt`, `gt`, `le`, `ge`, `contains`,
//! `startswith`, `endswith`. Predicates are ANDed; filtering the same key
//! twice keeps the last value.
//!
//! ## Surprising composition rules
//!
//! - The first `order_by` replaces the default ordering, later calls append.
//! - Slicing twice intersects the windows, so a window never grows.

mod connection;
mod error;
pub mod fields;
mod manager;
pub mod query;
mod queryset;
mod record;
mod schema;
mod settings;
mod sqlite;
mod value;

pub use connection::{Connection, Rows};
pub use error::{OrmError, Result};
pub use fields::{Field, FieldType};
pub use manager::Manager;
pub use query::{Condition, IntoWindow, Lookup, Operand, OrderBy, OrderDirection, Window};
pub use queryset::QuerySet;
pub use record::Record;
pub use schema::{Registry, Schema, SchemaBuilder, ID_COLUMN};
pub use settings::{FieldSettings, ModelSettings, Settings};
pub use sqlite::SqliteDatabase;
pub use value::{SqlValue, ToSqlValue};
