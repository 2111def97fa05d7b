//! Query building blocks: lookup conditions, ordering terms and row windows.

mod condition;
mod ordering;
mod window;

pub use condition::{Condition, Lookup, Operand, LOOKUP_SEPARATOR};
pub use ordering::{OrderBy, OrderDirection};
pub use window::{IntoWindow, Window};

pub(crate) use condition::is_column_name;
