//! GROUP BY, ORDER BY and row-cap clauses.

use super::select::non_blank;
use super::{ClauseCompiler, Dialect};
use crate::ast::{GroupByItem, OrderByItem};
use crate::error::{SqlPipeError, SqlPipeResult};

impl ClauseCompiler<'_> {
    pub fn compile_group_by(&self, items: &[GroupByItem]) -> SqlPipeResult<String> {
        if items.is_empty() {
            return Ok(String::new());
        }

        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            let part = match item {
                GroupByItem::Column { column } => {
                    let col = self.schema.column_in("GROUP BY ", column)?;
                    self.quote(&col.name)
                }
                GroupByItem::Expression { expression } => non_blank(Some(expression.as_str()))
                    .ok_or_else(|| SqlPipeError::shape("Expression required for GROUP BY"))?
                    .to_string(),
            };
            parts.push(part);
        }

        Ok(format!("GROUP BY {}", parts.join(", ")))
    }

    pub fn compile_order_by(&self, items: &[OrderByItem]) -> SqlPipeResult<String> {
        if items.is_empty() {
            return Ok(String::new());
        }

        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            let part = match item {
                OrderByItem::Column { column, direction } => {
                    let col = self.schema.column_in("ORDER BY ", column)?;
                    format!("{} {}", self.quote(&col.name), direction.as_str())
                }
                OrderByItem::Expression {
                    expression,
                    direction,
                } => {
                    let expression = non_blank(Some(expression.as_str()))
                        .ok_or_else(|| SqlPipeError::shape("Expression required for ORDER BY"))?;
                    match direction {
                        Some(dir) => format!("{} {}", expression, dir.as_str()),
                        None => expression.to_string(),
                    }
                }
            };
            parts.push(part);
        }

        Ok(format!("ORDER BY {}", parts.join(", ")))
    }

    pub fn compile_limit(&self, limit: Option<i64>) -> String {
        limit_clause(limit, self.dialect)
    }
}

pub(crate) fn limit_clause(limit: Option<i64>, dialect: Dialect) -> String {
    match limit {
        Some(n) if n > 0 => dialect.row_cap(n as u64),
        _ => String::new(),
    }
}
