//! Post-result transforms.
//!
//! A transform replaces a step's raw result before it is published to the
//! context. Script evaluation is delegated to a [`TransformRunner`]; the
//! runner decides what a script is.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::ExecutionContext;
use crate::error::{SqlPipeError, SqlPipeResult};

/// Utilities handed to every transform.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformHelpers {
    /// Index of the step being transformed.
    pub index: usize,
    /// Context key the result will be published under.
    pub output_name: String,
}

impl TransformHelpers {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            output_name: ExecutionContext::output_name(index),
        }
    }

    /// Values of `column` across a row array.
    pub fn pluck(&self, rows: &Value, column: &str) -> SqlPipeResult<Value> {
        let rows = as_rows(rows)?;
        Ok(Value::Array(
            rows.iter()
                .map(|row| row.get(column).cloned().unwrap_or(Value::Null))
                .collect(),
        ))
    }

    /// The first row, or null for an empty result.
    pub fn first(&self, rows: &Value) -> SqlPipeResult<Value> {
        Ok(as_rows(rows)?.first().cloned().unwrap_or(Value::Null))
    }

    pub fn count(&self, rows: &Value) -> SqlPipeResult<Value> {
        Ok(Value::from(as_rows(rows)?.len()))
    }

    /// Index rows by the text of `column`. Later rows win.
    pub fn key_by(&self, rows: &Value, column: &str) -> SqlPipeResult<Value> {
        let mut map = Map::new();
        for row in as_rows(rows)? {
            let key = match row.get(column) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => continue,
                Some(other) => other.to_string(),
            };
            map.insert(key, row.clone());
        }
        Ok(Value::Object(map))
    }
}

fn as_rows(value: &Value) -> SqlPipeResult<&Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| SqlPipeError::Transform("expected an array of rows".to_string()))
}

/// Evaluates transform scripts.
#[async_trait]
pub trait TransformRunner: Send + Sync {
    async fn run(
        &self,
        script: &str,
        raw: Value,
        ctx: &ExecutionContext,
        helpers: &TransformHelpers,
    ) -> SqlPipeResult<Value>;
}

/// Built-in transform scripts.
///
/// | Script          | Result                              |
/// |-----------------|-------------------------------------|
/// | `pluck:<COL>`   | array of `COL` values               |
/// | `first`         | first row or null                   |
/// | `count`         | number of rows                      |
/// | `key_by:<COL>`  | object of rows keyed by `COL`       |
/// | `identity`      | the raw result                      |
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTransforms;

#[async_trait]
impl TransformRunner for BuiltinTransforms {
    async fn run(
        &self,
        script: &str,
        raw: Value,
        _ctx: &ExecutionContext,
        helpers: &TransformHelpers,
    ) -> SqlPipeResult<Value> {
        let script = script.trim();
        let (name, arg) = match script.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(arg.trim())),
            None => (script, None),
        };

        match (name, arg) {
            ("identity", None) => Ok(raw),
            ("first", None) => helpers.first(&raw),
            ("count", None) => helpers.count(&raw),
            ("pluck", Some(col)) if !col.is_empty() => helpers.pluck(&raw, col),
            ("key_by", Some(col)) if !col.is_empty() => helpers.key_by(&raw, col),
            _ => Err(SqlPipeError::Transform(format!(
                "Unknown transform \"{}\"",
                script
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Value {
        json!([{"ID": 1, "NAME": "a"}, {"ID": 2, "NAME": "b"}])
    }

    async fn run(script: &str, raw: Value) -> SqlPipeResult<Value> {
        BuiltinTransforms
            .run(script, raw, &ExecutionContext::new(), &TransformHelpers::new(0))
            .await
    }

    #[tokio::test]
    async fn test_builtin_scripts() {
        assert_eq!(run("pluck:ID", rows()).await.unwrap(), json!([1, 2]));
        assert_eq!(run(" first ", rows()).await.unwrap(), json!({"ID": 1, "NAME": "a"}));
        assert_eq!(run("count", rows()).await.unwrap(), json!(2));
        assert_eq!(run("identity", json!(5)).await.unwrap(), json!(5));
        assert_eq!(
            run("key_by:NAME", rows()).await.unwrap(),
            json!({"a": {"ID": 1, "NAME": "a"}, "b": {"ID": 2, "NAME": "b"}})
        );
    }

    #[tokio::test]
    async fn test_unknown_script() {
        let err = run("return result.map(r => r.ID)", rows()).await.unwrap_err();
        assert!(matches!(err, SqlPipeError::Transform(_)));
        assert!(run("pluck:", rows()).await.is_err());
        assert!(run("first", json!({"rowsAffected": 1})).await.is_err());
    }

    #[test]
    fn test_helpers_name_the_output() {
        assert_eq!(TransformHelpers::new(3).output_name, "output3");
    }
}
