//! Ordering terms.

/// Order direction for sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    /// Ascending order, NULLs first.
    Asc,
    /// Descending order, NULLs last.
    Desc,
}

/// An ordering specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Column to order by
    pub column: String,
    /// Order direction
    pub direction: OrderDirection,
}

impl OrderBy {
    /// Creates a new ascending order specification.
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: OrderDirection::Asc,
        }
    }

    /// Creates a new descending order specification.
    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: OrderDirection::Desc,
        }
    }

    /// Parses a Django-style order specification.
    ///
    /// Prefix with `-` for descending order.
    /// Example: `"-created_at"` for descending, `"name"` for ascending.
    pub fn parse(spec: &str) -> Self {
        if let Some(column) = spec.strip_prefix('-') {
            Self::desc(column)
        } else {
            Self::asc(spec)
        }
    }

    /// Returns the SQL representation.
    ///
    /// NULL placement is always explicit so results are reproducible across
    /// backends: ascending puts NULLs first, descending puts them last.
    pub fn to_sql(&self) -> String {
        match self.direction {
            OrderDirection::Asc => format!("{} NULLS FIRST", self.column),
            OrderDirection::Desc => format!("{} DESC NULLS LAST", self.column),
        }
    }
}
