//! Integer and float coercion.

use crate::value::SqlValue;

// 2^63, the first float above the i64 range.
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

pub(super) fn to_int(value: SqlValue) -> Result<SqlValue, String> {
    match value {
        SqlValue::Int(n) => Ok(SqlValue::Int(n)),
        SqlValue::Float(f) if !f.is_finite() || f.fract() != 0.0 => {
            Err(format!("{f} is not an integral value"))
        }
        SqlValue::Float(f) if f < -I64_LIMIT || f >= I64_LIMIT => {
            Err(format!("{f} is out of integer range"))
        }
        SqlValue::Float(f) => Ok(SqlValue::Int(f as i64)),
        SqlValue::Text(s) => s
            .trim()
            .parse::<i64>()
            .map(SqlValue::Int)
            .map_err(|_| format!("'{s}' is not a valid integer")),
        other => Err(format!("{other} is not a valid integer")),
    }
}

pub(super) fn to_float(value: SqlValue) -> Result<SqlValue, String> {
    match value {
        SqlValue::Float(f) => Ok(SqlValue::Float(f)),
        SqlValue::Int(n) => Ok(SqlValue::Float(n as f64)),
        SqlValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map(SqlValue::Float)
            .map_err(|_| format!("'{s}' is not a valid float")),
        other => Err(format!("{other} is not a valid float")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_from_integral_float() {
        assert_eq!(to_int(SqlValue::Float(4.0)).unwrap(), SqlValue::Int(4));
        assert!(to_int(SqlValue::Float(4.5)).is_err());
        assert!(to_int(SqlValue::Float(f64::NAN)).is_err());
    }

    #[test]
    fn test_int_rejects_out_of_range_float() {
        assert!(to_int(SqlValue::Float(1e20)).is_err());
        assert!(to_int(SqlValue::Float(-1e20)).is_err());
        assert!(to_int(SqlValue::Float(I64_LIMIT)).is_err());
        assert_eq!(
            to_int(SqlValue::Float(-I64_LIMIT)).unwrap(),
            SqlValue::Int(i64::MIN)
        );
        assert_eq!(
            to_int(SqlValue::Float(9_007_199_254_740_992.0)).unwrap(),
            SqlValue::Int(9_007_199_254_740_992)
        );
    }

    #[test]
    fn test_int_from_text() {
        assert_eq!(to_int(SqlValue::Text(" 12 ".into())).unwrap(), SqlValue::Int(12));
        assert!(to_int(SqlValue::Text("twelve".into())).is_err());
    }

    #[test]
    fn test_float_from_text() {
        assert_eq!(
            to_float(SqlValue::Text("1.5".into())).unwrap(),
            SqlValue::Float(1.5)
        );
        assert!(to_float(SqlValue::Text("x".into())).is_err());
    }
}
