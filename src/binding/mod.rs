//! Binding & template engine.
//!
//! Resolves `:named`, `IN (?)` and bare `?` placeholders in a free-form SQL
//! template against typed parameters, producing SQL plus ordered bind values.
//!
//! ```
//! use sqlpipe::binding::{bind_template, ParamValue};
//!
//! let bound = bind_template(
//!     "SELECT * FROM t WHERE a = :id OR b = :id",
//!     vec![ParamValue::Scalar(7.into())],
//! )
//! .unwrap();
//! assert_eq!(bound.sql, "SELECT * FROM t WHERE a = ? OR b = ?");
//! assert_eq!(bound.values.len(), 2);
//! ```

pub mod interpolate;
pub mod lexer;
pub mod template;

pub use interpolate::interpolate;
pub use lexer::{count_sql_placeholders, tokenize, Token};
pub use template::{bind_template, build_sql_and_bindings, BoundStatement};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SqlPipeError, SqlPipeResult};
use crate::transpiler::cast::{parse_number, stringify};
use crate::value::BindValue;

/// Declared type of a binding parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Number,
    Boolean,
    Date,
    Null,
    #[serde(alias = "sql-escape")]
    Sql,
}

/// A parameter as supplied by the caller, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingParam {
    #[serde(rename = "type", default)]
    pub kind: ParamType,
    #[serde(default)]
    pub value: Value,
}

impl BindingParam {
    pub fn new(kind: ParamType, value: impl Into<Value>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// A normalized parameter, ready to be matched with a placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Scalar(BindValue),
    Array(Vec<BindValue>),
    /// SQL text spliced verbatim instead of bound.
    RawSql(String),
}

impl From<BindValue> for ParamValue {
    fn from(v: BindValue) -> Self {
        ParamValue::Scalar(v)
    }
}

/// Normalize an (already interpolated) value according to its declared type.
///
/// JSON arrays become [`ParamValue::Array`] with every element normalized by
/// the same type; `sql` parameters can never be arrays.
pub fn normalize(kind: ParamType, value: &Value) -> SqlPipeResult<ParamValue> {
    match (kind, value) {
        (ParamType::Sql, Value::Array(_)) => Err(SqlPipeError::shape(
            "sql parameter cannot be an array",
        )),
        (ParamType::Sql, value) => Ok(ParamValue::RawSql(stringify(value))),
        (_, Value::Array(items)) => items
            .iter()
            .map(|item| normalize_scalar(kind, item))
            .collect::<SqlPipeResult<Vec<_>>>()
            .map(ParamValue::Array),
        (_, value) => normalize_scalar(kind, value).map(ParamValue::Scalar),
    }
}

/// Normalize one scalar.
///
/// `string` never yields null (null becomes `""`); for the other typed
/// parameters a JSON null stays null.
pub fn normalize_scalar(kind: ParamType, value: &Value) -> SqlPipeResult<BindValue> {
    match kind {
        ParamType::String | ParamType::Sql => Ok(BindValue::Text(stringify(value))),
        ParamType::Null => Ok(BindValue::Null),
        _ if value.is_null() => Ok(BindValue::Null),
        ParamType::Number => to_number(value),
        ParamType::Boolean => Ok(BindValue::Bool(to_bool(value))),
        ParamType::Date => to_timestamp(value).map(BindValue::Timestamp),
    }
}

fn to_number(value: &Value) -> SqlPipeResult<BindValue> {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .map(BindValue::Int)
            .or_else(|| n.as_f64().map(BindValue::Float)),
        Value::String(s) => parse_number(s),
        Value::Bool(b) => Some(BindValue::Int(i64::from(*b))),
        _ => None,
    };
    parsed.ok_or_else(|| {
        SqlPipeError::InvalidValue(format!("Expected a number, got {}", value))
    })
}

fn to_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true" || s == "1",
        Value::Number(n) => n.as_i64() == Some(1),
        _ => false,
    }
}

const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

fn to_timestamp(value: &Value) -> SqlPipeResult<NaiveDateTime> {
    let invalid = || SqlPipeError::InvalidValue(format!("Invalid date: {}", value));

    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.naive_utc())
            .ok_or_else(invalid),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(dt.naive_utc());
            }
            for fmt in DATE_TIME_FORMATS {
                if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                    return Ok(dt);
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_param_type_spellings() {
        let p: BindingParam =
            serde_json::from_value(json!({"type": "sql-escape", "value": "NOW()"})).unwrap();
        assert_eq!(p.kind, ParamType::Sql);
        let p: BindingParam = serde_json::from_value(json!({"value": 3})).unwrap();
        assert_eq!(p.kind, ParamType::String);
    }

    #[test]
    fn test_scalar_normalization() {
        let norm = |kind: ParamType, value: Value| normalize_scalar(kind, &value).unwrap();
        assert_eq!(norm(ParamType::String, Value::Null), BindValue::Text(String::new()));
        assert_eq!(norm(ParamType::String, json!(12)), BindValue::Text("12".into()));
        assert_eq!(norm(ParamType::Number, json!(" 12 ")), BindValue::Int(12));
        assert_eq!(norm(ParamType::Number, json!("1.25")), BindValue::Float(1.25));
        assert!(normalize_scalar(ParamType::Number, &json!("twelve")).is_err());
        assert!(normalize_scalar(ParamType::Number, &json!("")).is_err());
        assert_eq!(normalize_scalar(ParamType::Number, &Value::Null).unwrap(), BindValue::Null);
        assert_eq!(normalize_scalar(ParamType::Null, &json!("x")).unwrap(), BindValue::Null);
    }

    #[test]
    fn test_boolean_normalization() {
        for truthy in [json!(true), json!("true"), json!("1"), json!(1)] {
            assert_eq!(
                normalize_scalar(ParamType::Boolean, &truthy).unwrap(),
                BindValue::Bool(true)
            );
        }
        for falsy in [json!(false), json!("yes"), json!(0), json!("TRUE")] {
            assert_eq!(
                normalize_scalar(ParamType::Boolean, &falsy).unwrap(),
                BindValue::Bool(false)
            );
        }
    }

    #[test]
    fn test_date_normalization() {
        let midnight = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(
            normalize_scalar(ParamType::Date, &json!("2024-03-01")).unwrap(),
            BindValue::Timestamp(midnight)
        );
        assert_eq!(
            normalize_scalar(ParamType::Date, &json!("2024-03-01T00:00:00Z")).unwrap(),
            BindValue::Timestamp(midnight)
        );
        assert_eq!(
            normalize_scalar(ParamType::Date, &json!(1_709_251_200_000i64)).unwrap(),
            BindValue::Timestamp(midnight)
        );
        assert!(normalize_scalar(ParamType::Date, &json!("March 1st")).is_err());
    }

    #[test]
    fn test_arrays() {
        assert_eq!(
            normalize(ParamType::Number, &json!(["1", 2])).unwrap(),
            ParamValue::Array(vec![BindValue::Int(1), BindValue::Int(2)])
        );
        assert!(normalize(ParamType::Sql, &json!(["a"])).is_err());
        assert_eq!(
            normalize(ParamType::Sql, &json!("CURRENT DATE")).unwrap(),
            ParamValue::RawSql("CURRENT DATE".into())
        );
    }
}
