//! Template resolution.
//!
//! Parameters are consumed once, in order, by three passes over the tokens of
//! the template: named placeholders first, then `IN (?)` lists, then bare `?`.
//! Bind values come out in the textual order of their placeholders.

use std::collections::HashMap;

use serde::Serialize;

use super::lexer::{count_sql_placeholders, tokenize, Token};
use super::{interpolate, normalize, BindingParam, ParamValue};
use crate::error::{SqlPipeError, SqlPipeResult};
use crate::pipeline::ExecutionContext;
use crate::transpiler::CompiledSql;
use crate::value::BindValue;

/// A resolved template.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoundStatement {
    pub sql: String,
    pub values: Vec<BindValue>,
    /// The statement cannot match anything and need not be executed.
    pub empty: bool,
}

impl BoundStatement {
    /// Placeholders in the resolved SQL.
    pub fn placeholders(&self) -> usize {
        count_sql_placeholders(&self.sql)
    }
}

/// Interpolate, normalize and bind `params` into `template`.
pub fn build_sql_and_bindings(
    template: &str,
    params: &[BindingParam],
    ctx: &ExecutionContext,
) -> SqlPipeResult<BoundStatement> {
    let values = params
        .iter()
        .map(|p| normalize(p.kind, &interpolate(&p.value, ctx)?))
        .collect::<SqlPipeResult<Vec<_>>>()?;
    bind_template(template, values)
}

/// Bind already-normalized parameters into `template`.
pub fn bind_template(template: &str, params: Vec<ParamValue>) -> SqlPipeResult<BoundStatement> {
    let tokens = tokenize(template);
    let mut slots: Vec<Option<CompiledSql>> = vec![None; tokens.len()];
    let mut params = params.into_iter();

    // Named: the first occurrence consumes, repeats reuse.
    let mut named: HashMap<&str, ParamValue> = HashMap::new();
    for (i, token) in tokens.iter().enumerate() {
        let Token::Named(name) = *token else {
            continue;
        };
        if !named.contains_key(name) {
            let value = params.next().ok_or_else(|| {
                SqlPipeError::shape(format!("No parameter left for :{}", name))
            })?;
            named.insert(name, value);
        }
        slots[i] = named.get(name).map(render_named);
    }

    for (i, token) in tokens.iter().enumerate() {
        if !matches!(token, Token::InList(_)) {
            continue;
        }
        match params.next() {
            Some(ParamValue::Array(items)) if items.is_empty() => {
                return Ok(short_circuit(&tokens, slots));
            }
            Some(ParamValue::Array(items)) => {
                let sql = format!("IN ({})", placeholder_list(items.len()));
                slots[i] = Some(CompiledSql::new(sql, items));
            }
            _ => return Err(SqlPipeError::shape("IN (?) requires array parameter")),
        }
    }

    let mut bare = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| matches!(t, Token::Bare))
        .map(|(i, _)| i);
    let mut surplus = Vec::new();
    for param in params {
        match param {
            ParamValue::Scalar(BindValue::Null) => return Ok(short_circuit(&tokens, slots)),
            ParamValue::Scalar(value) => match bare.next() {
                Some(i) => slots[i] = Some(CompiledSql::new("?", vec![value])),
                None => surplus.push(value),
            },
            ParamValue::RawSql(sql) => {
                let i = bare.next().ok_or_else(|| {
                    SqlPipeError::shape("No ? placeholder left for sql parameter")
                })?;
                slots[i] = Some(CompiledSql::text(sql));
            }
            ParamValue::Array(_) => {
                return Err(SqlPipeError::shape(
                    "Array parameter requires IN (?) or a named placeholder",
                ));
            }
        }
    }

    let (sql, mut values) = assemble(&tokens, slots);
    values.extend(surplus);

    let expected = count_sql_placeholders(&sql);
    if expected != values.len() {
        return Err(SqlPipeError::BindingMismatch {
            expected,
            provided: values.len(),
            sql,
        });
    }

    Ok(BoundStatement {
        sql,
        values,
        empty: false,
    })
}

/// Splice resolved slots into the token stream; unresolved tokens keep their
/// source text.
fn assemble(tokens: &[Token<'_>], slots: Vec<Option<CompiledSql>>) -> (String, Vec<BindValue>) {
    let mut sql = String::new();
    let mut values = Vec::new();
    for (token, slot) in tokens.iter().zip(slots) {
        match slot {
            Some(resolved) => {
                sql.push_str(&resolved.sql);
                values.extend(resolved.values);
            }
            None => sql.push_str(&token.source()),
        }
    }
    (sql, values)
}

/// What was resolved before an empty list or null ended binding.
fn short_circuit(tokens: &[Token<'_>], slots: Vec<Option<CompiledSql>>) -> BoundStatement {
    let (sql, values) = assemble(tokens, slots);
    BoundStatement {
        sql,
        values,
        empty: true,
    }
}

fn render_named(value: &ParamValue) -> CompiledSql {
    match value {
        ParamValue::Scalar(BindValue::Null) => CompiledSql::text("NULL"),
        ParamValue::Scalar(v) => CompiledSql::new("?", vec![v.clone()]),
        ParamValue::Array(items) if items.is_empty() => CompiledSql::text("(NULL)"),
        ParamValue::Array(items) => CompiledSql::new(placeholder_list(items.len()), items.clone()),
        ParamValue::RawSql(sql) => CompiledSql::text(sql.clone()),
    }
}

fn placeholder_list(n: usize) -> String {
    vec!["?"; n].join(",")
}
