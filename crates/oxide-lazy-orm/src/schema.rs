//! Record type schemas and their registry.
//!
//! A [`Schema`] is the static description of one record type: table name,
//! ordered field map and default ordering. Schemas are built and checked once
//! through [`SchemaBuilder`] and shared behind an `Arc` by every accessor,
//! query set and record instance.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{OrmError, Result};
use crate::fields::{Field, FieldType};
use crate::manager::Manager;
use crate::query::OrderBy;

/// The implicit identity column every record type has.
pub const ID_COLUMN: &str = "id";

/// A registered record type.
///
/// # Example
///
/// ```
/// use oxide_lazy_orm::{Field, Schema};
///
/// let user = Schema::builder("ormtable")
///     .name("User")
///     .field("name", Field::text().required())
///     .field("age", Field::integer())
///     .ordering(["-name"])
///     .build()
///     .unwrap();
///
/// assert_eq!(user.table_name(), "ormtable");
/// assert!(user.has_column("id"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    table: String,
    fields: Vec<(String, Field)>,
    ordering: Vec<OrderBy>,
}

impl Schema {
    /// Starts declaring a record type stored in `table`.
    pub fn builder(table: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(table)
    }

    /// Returns the record type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Returns the declared fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    /// Returns the declared field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Returns the number of declared fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns whether the record type declares no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Looks up a declared field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    /// Returns the position of a declared field.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| n == name)
    }

    /// Returns whether `name` is the identity column or a declared field.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        name == ID_COLUMN || self.position(name).is_some()
    }

    /// Returns the scalar type of a column, the identity column included.
    #[must_use]
    pub fn column_type(&self, name: &str) -> Option<FieldType> {
        if name == ID_COLUMN {
            return Some(FieldType::Integer);
        }
        self.field(name).map(Field::field_type)
    }

    /// Returns the default ordering.
    #[must_use]
    pub fn ordering(&self) -> &[OrderBy] {
        &self.ordering
    }

    /// Returns an accessor bound to this record type.
    #[must_use]
    pub fn objects(self: &Arc<Self>) -> Manager {
        Manager::new(Arc::clone(self))
    }

    /// Renders a `CREATE TABLE IF NOT EXISTS` statement for this record type.
    #[must_use]
    pub fn create_table_sql(&self) -> String {
        let mut columns = vec![format!("{ID_COLUMN} INTEGER PRIMARY KEY AUTOINCREMENT")];
        for (name, field) in &self.fields {
            let mut column = format!("{name} {}", field.field_type().sql_type());
            if field.is_required() {
                column.push_str(" NOT NULL");
            }
            columns.push(column);
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.table,
            columns.join(", ")
        )
    }
}

/// Declares a record type and checks it on [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    name: Option<String>,
    table: String,
    fields: Vec<(String, Field)>,
    ordering: Vec<String>,
    parents: Vec<Arc<Schema>>,
}

impl SchemaBuilder {
    /// Creates a builder for a record type stored in `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            name: None,
            table: table.into(),
            fields: Vec::new(),
            ordering: Vec::new(),
            parents: Vec::new(),
        }
    }

    /// Sets the record type name (defaults to the table name).
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Declares a field. Redeclaring a name replaces the earlier declaration.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = field,
            None => self.fields.push((name, field)),
        }
        self
    }

    /// Sets the default ordering; prefix a field with `-` for descending.
    #[must_use]
    pub fn ordering<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ordering = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Inherits the fields of `parent`.
    ///
    /// Only one parent is allowed; a second call makes `build` fail.
    #[must_use]
    pub fn extends(mut self, parent: &Arc<Schema>) -> Self {
        self.parents.push(Arc::clone(parent));
        self
    }

    /// Checks the declaration and produces the shared schema.
    ///
    /// Fails when the table name is empty, more than one parent is declared,
    /// a name is not a plain identifier, or the default ordering references a
    /// field that does not exist.
    pub fn build(self) -> Result<Arc<Schema>> {
        if self.table.trim().is_empty() {
            return Err(OrmError::MissingTableName);
        }
        if !crate::query::is_column_name(&self.table) {
            return Err(OrmError::validation(
                &self.table,
                "table name is not a plain identifier",
            ));
        }
        if self.parents.len() > 1 {
            return Err(OrmError::ParentClash { table: self.table });
        }

        let mut fields: Vec<(String, Field)> = self
            .parents
            .first()
            .map(|parent| parent.fields.clone())
            .unwrap_or_default();
        for (name, field) in self.fields {
            if name == ID_COLUMN {
                return Err(OrmError::validation(
                    &name,
                    "the identity column is implicit and cannot be declared",
                ));
            }
            if !crate::query::is_column_name(&name) {
                return Err(OrmError::validation(&name, "not a plain identifier"));
            }
            match fields.iter_mut().find(|(n, _)| *n == name) {
                Some(slot) => slot.1 = field,
                None => fields.push((name, field)),
            }
        }

        let mut schema = Schema {
            name: self.name.unwrap_or_else(|| self.table.clone()),
            table: self.table,
            fields,
            ordering: Vec::new(),
        };
        for spec in &self.ordering {
            let order = OrderBy::parse(spec);
            if !schema.has_column(&order.column) {
                return Err(OrmError::OrderByField {
                    table: schema.table,
                    field: order.column,
                });
            }
            schema.ordering.push(order);
        }

        debug!(
            name = %schema.name,
            table = %schema.table,
            fields = schema.fields.len(),
            "Registered record type"
        );
        Ok(Arc::new(schema))
    }
}

/// Maps record type names to their schemas.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    schemas: HashMap<String, Arc<Schema>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds and registers a record type under its name.
    pub fn register(&mut self, builder: SchemaBuilder) -> Result<Arc<Schema>> {
        let schema = builder.build()?;
        if self
            .schemas
            .insert(schema.name().to_string(), Arc::clone(&schema))
            .is_some()
        {
            warn!(name = %schema.name(), "Record type registered twice, replacing");
        }
        Ok(schema)
    }

    /// Looks up a record type by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
        self.schemas.get(name).cloned()
    }

    /// Returns an accessor for the named record type.
    pub fn objects(&self, name: &str) -> Result<Manager> {
        self.get(name)
            .map(|schema| schema.objects())
            .ok_or_else(|| OrmError::UnknownRecordType(name.to_string()))
    }

    /// Returns the registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Iterates over the registered schemas in no particular order.
    pub fn schemas(&self) -> impl Iterator<Item = &Arc<Schema>> {
        self.schemas.values()
    }
}
