//! Coercion of filter values to the type of the column they compare against.

use serde_json::Value;

use crate::error::{SqlPipeError, SqlPipeResult};
use crate::schema::ColumnSchema;
use crate::value::BindValue;

/// Cast a raw filter value for `col`.
///
/// Strings are trimmed and lose one layer of matching quotes. Numeric columns
/// require a number, date columns require a string, everything else is
/// stringified. JSON null stays null.
pub fn cast_value(col: &ColumnSchema, value: &Value) -> SqlPipeResult<BindValue> {
    if value.is_null() {
        return Ok(BindValue::Null);
    }

    let value = match value {
        Value::String(s) => Value::String(strip_quotes(s.trim()).to_string()),
        other => other.clone(),
    };

    if col.is_numeric {
        return to_number(&value).ok_or_else(|| {
            SqlPipeError::InvalidValue(format!(
                "Column \"{}\" expects NUMBER, got \"{}\"",
                col.name,
                stringify(&value)
            ))
        });
    }

    if col.is_date {
        return match value {
            Value::String(s) => Ok(BindValue::Text(s)),
            _ => Err(SqlPipeError::InvalidValue(format!(
                "Column \"{}\" expects DATE string",
                col.name
            ))),
        };
    }

    Ok(BindValue::Text(stringify(&value)))
}

/// Cast a value that must be numeric regardless of any column.
pub fn cast_number(value: &Value, what: &str) -> SqlPipeResult<BindValue> {
    let trimmed = match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other.clone(),
    };
    to_number(&trimmed).ok_or_else(|| {
        SqlPipeError::InvalidValue(format!("{} expects NUMBER, got \"{}\"", what, stringify(value)))
    })
}

fn strip_quotes(s: &str) -> &str {
    let quoted = s.len() >= 2
        && ((s.starts_with('\'') && s.ends_with('\'')) || (s.starts_with('"') && s.ends_with('"')));
    if quoted { &s[1..s.len() - 1] } else { s }
}

fn to_number(value: &Value) -> Option<BindValue> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(BindValue::Int)
            .or_else(|| n.as_f64().map(BindValue::Float)),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Parse text as an integer if possible, otherwise as a finite float.
pub(crate) fn parse_number(s: &str) -> Option<BindValue> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(BindValue::Int(i));
    }
    s.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(BindValue::Float)
}

/// Text form of a JSON value; null becomes the empty string.
pub(crate) fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn col(typ: &str) -> ColumnSchema {
        ColumnSchema::new("C", typ)
    }

    #[test]
    fn test_string_trim_and_unquote() {
        assert_eq!(
            cast_value(&col("VARCHAR"), &json!("  'abc'  ")).unwrap(),
            BindValue::Text("abc".into())
        );
        assert_eq!(
            cast_value(&col("VARCHAR"), &json!("\"x")).unwrap(),
            BindValue::Text("\"x".into())
        );
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(cast_value(&col("INTEGER"), &json!(" '42' ")).unwrap(), BindValue::Int(42));
        assert_eq!(cast_value(&col("DECIMAL"), &json!(1.5)).unwrap(), BindValue::Float(1.5));
        let err = cast_value(&col("INTEGER"), &json!("abc")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value: Column \"C\" expects NUMBER, got \"abc\"");
    }

    #[test]
    fn test_date_requires_string() {
        assert_eq!(
            cast_value(&col("DATE"), &json!("2024-01-31")).unwrap(),
            BindValue::Text("2024-01-31".into())
        );
        assert!(cast_value(&col("DATE"), &json!(20240131)).is_err());
    }

    #[test]
    fn test_other_types_stringify() {
        assert_eq!(cast_value(&col("BLOB"), &json!(7)).unwrap(), BindValue::Text("7".into()));
        assert_eq!(cast_value(&col("INTEGER"), &Value::Null).unwrap(), BindValue::Null);
    }
}
