//! Per-run execution context.

use serde_json::{Map, Value};

/// Results of earlier pipeline steps, keyed `output0`, `output1`, ...
///
/// Owned by one run. Grows as steps complete and is dropped with the run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    outputs: Map<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name under which step `index` publishes its result.
    pub fn output_name(index: usize) -> String {
        format!("output{}", index)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.outputs.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name)
    }

    /// Dotted-path lookup: object keys by name, array elements by index.
    ///
    /// `output0.0.ID` is the `ID` field of the first row of step 0.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut parts = path.trim().split('.');
        let mut current = self.outputs.get(parts.next()?.trim())?;
        for part in parts {
            let part = part.trim();
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// A JSON copy of the whole context, for error records.
    pub fn snapshot(&self) -> Value {
        Value::Object(self.outputs.clone())
    }
}

impl From<Map<String, Value>> for ExecutionContext {
    fn from(outputs: Map<String, Value>) -> Self {
        Self { outputs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_paths() {
        let mut ctx = ExecutionContext::new();
        ctx.insert(
            ExecutionContext::output_name(0),
            json!([{"ID": 7, "TAGS": ["a", "b"]}]),
        );
        ctx.insert("meta", json!({"region": "EU"}));

        assert_eq!(ctx.lookup("output0.0.ID"), Some(&json!(7)));
        assert_eq!(ctx.lookup("output0.0.TAGS.1"), Some(&json!("b")));
        assert_eq!(ctx.lookup("meta.region"), Some(&json!("EU")));
        assert_eq!(ctx.lookup("output0.x"), None);
        assert_eq!(ctx.lookup("output9"), None);
        assert_eq!(ctx.lookup("meta.region.deeper"), None);
    }

    #[test]
    fn test_snapshot() {
        let mut ctx = ExecutionContext::new();
        ctx.insert("output0", json!(1));
        assert_eq!(ctx.snapshot(), json!({"output0": 1}));
        assert_eq!(ctx.len(), 1);
    }
}
