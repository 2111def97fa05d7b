//! Text coercion.

use crate::value::SqlValue;

/// Any scalar renders to text.
pub(super) fn to_text(value: SqlValue) -> SqlValue {
    match value {
        SqlValue::Text(s) => SqlValue::Text(s),
        other => SqlValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_passthrough() {
        assert_eq!(
            to_text(SqlValue::Text("alice".into())),
            SqlValue::Text("alice".into())
        );
    }

    #[test]
    fn test_numbers_render() {
        assert_eq!(to_text(SqlValue::Int(7)), SqlValue::Text("7".into()));
        assert_eq!(to_text(SqlValue::Float(1.5)), SqlValue::Text("1.5".into()));
    }
}
