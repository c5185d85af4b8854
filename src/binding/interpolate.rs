//! `${path}` references to earlier pipeline results.
//!
//! Arrays travel structurally: a value that is exactly one reference to an
//! array becomes that array, and a bracketed list such as `[${output0.IDS}, 6]`
//! flattens its array references into one array. Anywhere else a reference is
//! substituted as text.

use serde_json::Value;

use crate::error::{SqlPipeError, SqlPipeResult};
use crate::pipeline::ExecutionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece<'a> {
    Literal(&'a str),
    Reference(&'a str),
}

/// Resolve the references in a parameter value. Non-string values pass
/// through untouched.
pub fn interpolate(value: &Value, ctx: &ExecutionContext) -> SqlPipeResult<Value> {
    let Value::String(text) = value else {
        return Ok(value.clone());
    };
    if !split_references(text)
        .iter()
        .any(|p| matches!(p, Piece::Reference(_)))
    {
        return Ok(value.clone());
    }

    let trimmed = text.trim();
    if let Some(Value::Array(items)) = single_reference(trimmed).and_then(|p| ctx.lookup(p)) {
        return Ok(Value::Array(items.clone()));
    }

    if let Some(inner) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        if references_array(inner, ctx) {
            let mut items = Vec::new();
            for entry in inner.split(',').map(str::trim) {
                match single_reference(entry).and_then(|p| ctx.lookup(p)) {
                    Some(Value::Array(values)) => items.extend(values.iter().cloned()),
                    _ => items.push(Value::String(substitute(entry, ctx)?)),
                }
            }
            return Ok(Value::Array(items));
        }
    }

    substitute(text, ctx).map(Value::String)
}

/// Replace every reference with its text form. Missing or null lookups
/// become the empty string.
fn substitute(text: &str, ctx: &ExecutionContext) -> SqlPipeResult<String> {
    let mut out = String::with_capacity(text.len());
    for piece in split_references(text) {
        match piece {
            Piece::Literal(s) => out.push_str(s),
            Piece::Reference(path) => match ctx.lookup(path) {
                None | Some(Value::Null) => {}
                Some(Value::String(s)) => out.push_str(s),
                Some(Value::Array(_)) => {
                    return Err(SqlPipeError::Interpolation(format!(
                        "array reference ${{{}}} cannot be embedded in text",
                        path
                    )));
                }
                Some(other) => out.push_str(&other.to_string()),
            },
        }
    }
    Ok(out)
}

fn references_array(text: &str, ctx: &ExecutionContext) -> bool {
    split_references(text).iter().any(|piece| match piece {
        Piece::Reference(path) => matches!(ctx.lookup(path), Some(Value::Array(_))),
        Piece::Literal(_) => false,
    })
}

/// The path of `text` when it is exactly one reference.
fn single_reference(text: &str) -> Option<&str> {
    match split_references(text).as_slice() {
        [Piece::Reference(path)] => Some(*path),
        _ => None,
    }
}

fn split_references(text: &str) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        if end == 0 {
            // `${}` is literal text
            pieces.push(Piece::Literal(&rest[..start + 3]));
            rest = &rest[start + 3..];
            continue;
        }
        if start > 0 {
            pieces.push(Piece::Literal(&rest[..start]));
        }
        pieces.push(Piece::Reference(&after[..end]));
        rest = &after[end + 1..];
    }
    if !rest.is_empty() {
        pieces.push(Piece::Literal(rest));
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> ExecutionContext {
        let mut ctx = ExecutionContext::new();
        ctx.insert("output0", json!({"IDS": [1, 2], "NAME": "acme", "COUNT": 3, "NOTE": null}));
        ctx
    }

    #[test]
    fn test_plain_values_untouched() {
        assert_eq!(interpolate(&json!(5), &ctx()).unwrap(), json!(5));
        assert_eq!(interpolate(&json!("no refs"), &ctx()).unwrap(), json!("no refs"));
        assert_eq!(interpolate(&json!("${}"), &ctx()).unwrap(), json!("${}"));
    }

    #[test]
    fn test_text_substitution() {
        assert_eq!(
            interpolate(&json!("${output0.NAME}-${output0.COUNT}"), &ctx()).unwrap(),
            json!("acme-3")
        );
        assert_eq!(
            interpolate(&json!("x${output0.NOTE}${output0.MISSING}y"), &ctx()).unwrap(),
            json!("xy")
        );
    }

    #[test]
    fn test_single_array_reference() {
        assert_eq!(
            interpolate(&json!(" ${output0.IDS} "), &ctx()).unwrap(),
            json!([1, 2])
        );
    }

    #[test]
    fn test_bracketed_list_flattens() {
        assert_eq!(
            interpolate(&json!("[${output0.IDS}, 6, ${output0.NAME}]"), &ctx()).unwrap(),
            json!([1, 2, "6", "acme"])
        );
    }

    #[test]
    fn test_array_in_text_is_an_error() {
        let err = interpolate(&json!("ids: ${output0.IDS}"), &ctx()).unwrap_err();
        assert!(matches!(err, SqlPipeError::Interpolation(_)));
    }
}
