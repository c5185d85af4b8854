//! Typed bind values.

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::fmt;

/// Dynamic value type for query bindings.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl BindValue {
    /// Convert to a JSON value for previews and diagnostics.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            BindValue::Null => serde_json::Value::Null,
            BindValue::Bool(b) => serde_json::Value::Bool(*b),
            BindValue::Int(i) => serde_json::Value::Number((*i).into()),
            BindValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            BindValue::Text(s) => serde_json::Value::String(s.clone()),
            BindValue::Timestamp(ts) => serde_json::Value::String(format_timestamp(ts)),
        }
    }
}

pub(crate) fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}

impl Serialize for BindValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for BindValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindValue::Null => write!(f, "NULL"),
            BindValue::Bool(b) => write!(f, "{}", b),
            BindValue::Int(i) => write!(f, "{}", i),
            BindValue::Float(v) => write!(f, "{}", v),
            BindValue::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            BindValue::Timestamp(ts) => write!(f, "'{}'", format_timestamp(ts)),
        }
    }
}

/// Render a bind list the way execution errors report it.
pub fn bindings_to_json(values: &[BindValue]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

impl From<bool> for BindValue {
    fn from(v: bool) -> Self {
        BindValue::Bool(v)
    }
}

impl From<i32> for BindValue {
    fn from(v: i32) -> Self {
        BindValue::Int(v as i64)
    }
}

impl From<i64> for BindValue {
    fn from(v: i64) -> Self {
        BindValue::Int(v)
    }
}

impl From<f64> for BindValue {
    fn from(v: f64) -> Self {
        BindValue::Float(v)
    }
}

impl From<&str> for BindValue {
    fn from(v: &str) -> Self {
        BindValue::Text(v.to_string())
    }
}

impl From<String> for BindValue {
    fn from(v: String) -> Self {
        BindValue::Text(v)
    }
}

impl From<NaiveDateTime> for BindValue {
    fn from(v: NaiveDateTime) -> Self {
        BindValue::Timestamp(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_value_json() {
        let values: Vec<BindValue> = vec![1i64.into(), "a".into(), BindValue::Null, true.into()];
        assert_eq!(bindings_to_json(&values), r#"[1,"a",null,true]"#);
    }

    #[test]
    fn test_display_escapes_quotes() {
        let v: BindValue = "O'Brien".into();
        assert_eq!(v.to_string(), "'O''Brien'");
    }
}
