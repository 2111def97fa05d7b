//! QuerySet implementation for lazy, chainable database queries.
//!
//! QuerySets are lazy - they don't touch the database until they are
//! iterated, fetched or counted. The first evaluation compiles the
//! accumulated predicates, ordering and row window into one statement, runs
//! it, and caches the decoded records; later reads are served from the cache.
//!
//! Two composition rules are surprising and kept on purpose because callers
//! rely on them:
//!
//! - The first [`order_by`](QuerySet::order_by) call on a query set that
//!   carries the record type's default ordering *replaces* that default;
//!   every later call *appends*.
//! - Re-slicing intersects windows, so a window only ever shrinks:
//!   `[2, 10)` re-sliced with `[0, 5)` is `[2, 5)`, not rows 2..7.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::connection::Connection;
use crate::error::{OrmError, Result};
use crate::query::{Condition, IntoWindow, Operand, OrderBy, Window};
use crate::record::Record;
use crate::schema::Schema;
use crate::value::SqlValue;

/// A lazy, chainable query against one record type.
///
/// Builder methods consume the query set and return a new one, so a query
/// set can be cloned and extended in several directions without aliasing.
///
/// Builder calls made after the query set was evaluated do not discard the
/// cached records; evaluate a fresh query set instead.
///
/// # Example
///
/// ```ignore
/// let mut adults = user
///     .objects()
///     .filter([("age__ge", 21)])?
///     .order_by(["name"])?
///     .slice(0..10);
///
/// for user in adults.iter(&mut db)? {
///     println!("{user}");
/// }
/// let total = adults.count(&mut db)?; // served from the cache
/// ```
#[derive(Debug, Clone)]
pub struct QuerySet {
    schema: Arc<Schema>,
    /// Predicates keyed by their compound filter key, ANDed together.
    conditions: Vec<(String, Condition)>,
    /// Ordering specifications
    order_by: Vec<OrderBy>,
    /// Whether `order_by` still holds the record type's default
    ordering_inherited: bool,
    window: Option<Window>,
    results: Option<Vec<Record>>,
    count: Option<u64>,
}

impl QuerySet {
    /// Creates an unfiltered QuerySet carrying the default ordering.
    #[must_use]
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            order_by: schema.ordering().to_vec(),
            ordering_inherited: true,
            schema,
            conditions: Vec::new(),
            window: None,
            results: None,
            count: None,
        }
    }

    /// Returns the record type this QuerySet reads.
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Merges predicates into the QuerySet.
    ///
    /// Keys are field names optionally followed by `__lookup`. All predicates
    /// are ANDed; a key that is already present gets its value replaced, so
    /// `filter(a).filter(b)` compiles exactly like one call with both.
    pub fn filter<I, K, V>(mut self, predicates: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Operand>,
    {
        for (key, operand) in predicates {
            let key = key.as_ref();
            let condition = Condition::resolve(&self.schema, key, operand)?;
            match self.conditions.iter_mut().find(|(k, _)| k == key) {
                Some(slot) => slot.1 = condition,
                None => self.conditions.push((key.to_string(), condition)),
            }
        }
        Ok(self)
    }

    /// Adds ordering; prefix a field with `-` for descending.
    ///
    /// The first call replaces the record type's default ordering, later
    /// calls append tie-breakers. Fails if a field is not declared.
    pub fn order_by<I, S>(mut self, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut terms = Vec::new();
        for spec in fields {
            let term = OrderBy::parse(spec.as_ref());
            if !self.schema.has_column(&term.column) {
                return Err(OrmError::OrderByField {
                    table: self.schema.table_name().to_string(),
                    field: term.column,
                });
            }
            terms.push(term);
        }

        if self.ordering_inherited {
            self.order_by = terms;
            self.ordering_inherited = false;
        } else {
            self.order_by.extend(terms);
        }
        Ok(self)
    }

    /// Restricts the rows: an offset selects one row, a range selects
    /// `[start, stop)`.
    ///
    /// A range composes with the current window by intersection, so the
    /// window never grows. An offset replaces the window.
    ///
    /// When the QuerySet was already evaluated, the cached records are cut
    /// instead of querying again. They hold exactly the current window, so a
    /// range is intersected first and then shifted onto the cache, while an
    /// offset picks a position within the cached records.
    #[must_use]
    pub fn slice<W: IntoWindow>(mut self, index: W) -> Self {
        let requested = index.into_window();
        let window = match (requested, self.window) {
            (Window::Range { .. }, Some(current)) => current.intersect(requested),
            (Window::Index(k), Some(current)) if self.results.is_some() => {
                current.intersect(Window::Index(current.bounds().0.saturating_add(k)))
            }
            _ => requested,
        };
        if let Some(results) = self.results.take() {
            let offset = self.window.map_or(0, |current| current.bounds().0);
            self.results = Some(window.shifted_back(offset).apply(&results));
        }
        self.window = Some(window);
        self.count = None;
        self
    }

    /// Reverses cached records in place; a no-op before evaluation.
    #[must_use]
    pub fn reverse(mut self) -> Self {
        if let Some(results) = self.results.as_mut() {
            results.reverse();
        }
        self
    }

    /// Returns the current row window.
    #[must_use]
    pub const fn window(&self) -> Option<Window> {
        self.window
    }

    /// Returns the current ordering.
    #[must_use]
    pub fn ordering(&self) -> &[OrderBy] {
        &self.order_by
    }

    /// Returns whether records have been fetched and cached.
    #[must_use]
    pub const fn is_materialized(&self) -> bool {
        self.results.is_some()
    }

    /// Returns the cached records, if evaluated.
    #[must_use]
    pub fn results(&self) -> Option<&[Record]> {
        self.results.as_deref()
    }

    /// Builds the SQL SELECT query and parameters.
    pub fn build_select(&self) -> (String, Vec<SqlValue>) {
        let mut params = Vec::new();
        let mut sql = format!("SELECT * FROM {}", self.schema.table_name());

        // WHERE clause
        let where_clause = self.build_where_clause(&mut params);
        if !where_clause.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause);
        }

        // ORDER BY clause
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let order_parts: Vec<String> = self.order_by.iter().map(OrderBy::to_sql).collect();
            sql.push_str(&order_parts.join(", "));
        }

        // LIMIT/OFFSET clause
        if let Some(window) = self.window.and_then(Window::to_sql) {
            sql.push(' ');
            sql.push_str(&window);
        }

        (sql, params)
    }

    /// Builds the SQL COUNT query and parameters.
    ///
    /// The window is applied inside a subquery so the count matches what
    /// iteration would return.
    pub fn build_count(&self) -> (String, Vec<SqlValue>) {
        let mut params = Vec::new();
        let mut inner = format!("SELECT * FROM {}", self.schema.table_name());

        let where_clause = self.build_where_clause(&mut params);
        if !where_clause.is_empty() {
            inner.push_str(" WHERE ");
            inner.push_str(&where_clause);
        }
        if let Some(window) = self.window.and_then(Window::to_sql) {
            inner.push(' ');
            inner.push_str(&window);
        }

        (format!("SELECT count(*) FROM ({inner}) AS t"), params)
    }

    /// Builds the WHERE clause from the accumulated conditions.
    fn build_where_clause(&self, params: &mut Vec<SqlValue>) -> String {
        let conditions: Vec<String> = self
            .conditions
            .iter()
            .map(|(_, condition)| condition.to_sql(params))
            .collect();
        conditions.join(" AND ")
    }

    /// Evaluates the QuerySet (once) and returns the cached records.
    pub fn fetch<C: Connection + ?Sized>(&mut self, conn: &mut C) -> Result<&[Record]> {
        let results = match self.results.take() {
            Some(results) => {
                trace!(table = %self.schema.table_name(), "QuerySet served from cache");
                results
            }
            None => self.execute(conn)?,
        };
        Ok(self.results.insert(results).as_slice())
    }

    /// Evaluates the QuerySet (once) and iterates over the cached records.
    ///
    /// Iterating again reuses the cache and never re-queries.
    pub fn iter<C: Connection + ?Sized>(
        &mut self,
        conn: &mut C,
    ) -> Result<std::slice::Iter<'_, Record>> {
        Ok(self.fetch(conn)?.iter())
    }

    /// Evaluates the QuerySet (once) and takes ownership of the records.
    pub fn into_records<C: Connection + ?Sized>(mut self, conn: &mut C) -> Result<Vec<Record>> {
        self.fetch(conn)?;
        Ok(self.results.unwrap_or_default())
    }

    /// Returns the number of rows this QuerySet covers.
    ///
    /// A known count is returned as is; evaluated records are counted in
    /// memory; otherwise one COUNT query runs and its result is cached, even if
    /// the table changes afterwards.
    pub fn count<C: Connection + ?Sized>(&mut self, conn: &mut C) -> Result<u64> {
        if let Some(count) = self.count {
            trace!(table = %self.schema.table_name(), count, "Count served from cache");
            return Ok(count);
        }
        if let Some(results) = &self.results {
            let count = results.len() as u64;
            self.count = Some(count);
            return Ok(count);
        }

        let (sql, params) = self.build_count();
        let row = conn.fetch_one(&sql, &params)?;
        let count = row
            .and_then(|row| row.into_iter().next())
            .and_then(|value| value.as_int())
            .and_then(|n| u64::try_from(n).ok())
            .ok_or(OrmError::Database(sqlx::Error::RowNotFound))?;

        debug!(table = %self.schema.table_name(), count, "Counted QuerySet");
        self.count = Some(count);
        Ok(count)
    }

    fn execute<C: Connection + ?Sized>(&self, conn: &mut C) -> Result<Vec<Record>> {
        let (sql, params) = self.build_select();
        let records = conn.fetch_all(&sql, &params)?.into_records(&self.schema)?;
        debug!(
            table = %self.schema.table_name(),
            rows = records.len(),
            "Materialized QuerySet"
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Field;

    fn people() -> Arc<Schema> {
        Schema::builder("people")
            .field("name", Field::text().required())
            .field("age", Field::integer())
            .ordering(["-name"])
            .build()
            .unwrap()
    }

    fn unordered() -> Arc<Schema> {
        Schema::builder("people")
            .field("name", Field::text())
            .field("age", Field::integer())
            .build()
            .unwrap()
    }

    #[test]
    fn test_basic_select() {
        let (sql, params) = QuerySet::new(unordered()).build_select();
        assert_eq!(sql, "SELECT * FROM people");
        assert!(params.is_empty());
    }

    #[test]
    fn test_default_ordering_applies() {
        let (sql, _) = QuerySet::new(people()).build_select();
        assert_eq!(sql, "SELECT * FROM people ORDER BY name DESC NULLS LAST");
    }

    #[test]
    fn test_first_order_by_replaces_then_appends() {
        let qs = QuerySet::new(people()).order_by(["age"]).unwrap();
        assert_eq!(
            qs.build_select().0,
            "SELECT * FROM people ORDER BY age NULLS FIRST"
        );
        let qs = qs.order_by(["id"]).unwrap();
        assert_eq!(
            qs.build_select().0,
            "SELECT * FROM people ORDER BY age NULLS FIRST, id NULLS FIRST"
        );
    }

    #[test]
    fn test_order_by_unknown_field() {
        let err = QuerySet::new(people()).order_by(["-height"]).unwrap_err();
        assert!(matches!(err, OrmError::OrderByField { ref field, .. } if field == "height"));
    }

    #[test]
    fn test_filter_merges_last_writer_wins() {
        let chained = QuerySet::new(unordered())
            .filter([("name", "a"), ("name__contains", "b")])
            .unwrap()
            .filter([("name", "c")])
            .unwrap();
        let single = QuerySet::new(unordered())
            .filter([("name", "c"), ("name__contains", "b")])
            .unwrap();
        assert_eq!(chained.build_select(), single.build_select());
        assert_eq!(
            chained.build_select().0,
            "SELECT * FROM people WHERE name = ? AND name LIKE ? ESCAPE '\\'"
        );
    }

    #[test]
    fn test_filter_lookup_translation() {
        let qs = QuerySet::new(unordered())
            .filter([("age__ge", 21)])
            .unwrap();
        let (sql, params) = qs.build_select();
        assert_eq!(sql, "SELECT * FROM people WHERE age >= ?");
        assert_eq!(params, vec![SqlValue::Int(21)]);
    }

    #[test]
    fn test_filter_too_many_separators() {
        assert!(matches!(
            QuerySet::new(unordered()).filter([("age__ge__lt", 1)]),
            Err(OrmError::InvalidLookup { .. })
        ));
    }

    #[test]
    fn test_slice_sql() {
        let qs = QuerySet::new(unordered()).slice(3);
        assert_eq!(qs.build_select().0, "SELECT * FROM people LIMIT 1 OFFSET 3");
        let qs = QuerySet::new(unordered()).slice(2..10);
        assert_eq!(qs.build_select().0, "SELECT * FROM people LIMIT 8 OFFSET 2");
        let qs = QuerySet::new(unordered()).slice(..4);
        assert_eq!(qs.build_select().0, "SELECT * FROM people LIMIT 4");
    }

    #[test]
    fn test_slices_only_shrink() {
        let qs = QuerySet::new(unordered()).slice(2..10).slice(0..5);
        assert_eq!(
            qs.window(),
            Some(Window::Range {
                start: Some(2),
                stop: Some(5)
            })
        );
    }

    #[test]
    fn test_index_replaces_window() {
        let qs = QuerySet::new(unordered()).slice(2..10).slice(0);
        assert_eq!(qs.window(), Some(Window::Index(0)));
    }

    #[test]
    fn test_index_replaces_window_before_evaluation() {
        let qs = QuerySet::new(unordered()).slice(2..10).slice(1);
        assert_eq!(qs.build_select().0, "SELECT * FROM people LIMIT 1 OFFSET 1");
    }

    #[test]
    fn test_huge_stop_renders_without_limit() {
        let qs = QuerySet::new(unordered()).slice(3..usize::MAX);
        assert_eq!(
            qs.build_select().0,
            "SELECT * FROM people LIMIT -1 OFFSET 3"
        );
    }

    #[test]
    fn test_count_wraps_window() {
        let qs = QuerySet::new(people())
            .filter([("age__lt", 30)])
            .unwrap()
            .slice(1..3);
        let (sql, params) = qs.build_count();
        assert_eq!(
            sql,
            "SELECT count(*) FROM (SELECT * FROM people WHERE age < ? LIMIT 2 OFFSET 1) AS t"
        );
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_reverse_is_noop_before_evaluation() {
        let qs = QuerySet::new(people()).reverse();
        assert!(!qs.is_materialized());
        assert_eq!(
            qs.build_select().0,
            "SELECT * FROM people ORDER BY name DESC NULLS LAST"
        );
    }
}
