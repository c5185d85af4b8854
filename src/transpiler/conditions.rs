use serde_json::Value;

use super::cast::{cast_value, stringify};
use super::{ClauseCompiler, CompiledSql};
use crate::ast::{Operator, WhereCondition, WhereGroup};
use crate::error::{SqlPipeError, SqlPipeResult};
use crate::schema::ColumnSchema;

/// Column or SQL text that turns a condition into a no-op.
const SENTINEL: &str = "*";

impl ClauseCompiler<'_> {
    /// Compile filter groups into a `WHERE` clause.
    ///
    /// Conditions inside a group are joined by the group's filter type and the
    /// group is parenthesized. Every group after the first emitted one is
    /// attached with its own filter type. Groups whose conditions were all
    /// suppressed leave no trace, connector included.
    pub fn compile_where(&self, groups: &[WhereGroup]) -> SqlPipeResult<CompiledSql> {
        let mut parts: Vec<String> = Vec::new();
        let mut values = Vec::new();

        for group in groups {
            let connector = group.filter_type.as_str();
            let mut seg_parts = Vec::new();
            let mut seg_values = Vec::new();

            for cond in &group.conditions {
                let compiled = self.compile_condition(cond)?;
                if compiled.is_empty() {
                    continue;
                }
                seg_parts.push(compiled.sql);
                seg_values.extend(compiled.values);
            }

            if seg_parts.is_empty() {
                continue;
            }

            let body = format!("({})", seg_parts.join(&format!(" {} ", connector)));
            if parts.is_empty() {
                parts.push(body);
            } else {
                parts.push(format!("{} {}", connector, body));
            }
            values.extend(seg_values);
        }

        if parts.is_empty() {
            return Ok(CompiledSql::empty());
        }
        Ok(CompiledSql::new(format!("WHERE {}", parts.join(" ")), values))
    }

    /// Compile one condition. Sentinel conditions compile to an empty fragment.
    pub fn compile_condition(&self, cond: &WhereCondition) -> SqlPipeResult<CompiledSql> {
        match cond {
            WhereCondition::Column {
                column,
                operator,
                value,
                values,
            } => {
                if column == SENTINEL {
                    return Ok(CompiledSql::empty());
                }
                let col = self.schema.column(column)?;
                self.column_condition(col, *operator, value, values)
            }
            WhereCondition::ColumnIn { column, values }
            | WhereCondition::ColumnNotIn { column, values } => {
                if column == SENTINEL {
                    return Ok(CompiledSql::empty());
                }
                let col = self.schema.column(column)?;
                let negate = matches!(cond, WhereCondition::ColumnNotIn { .. });
                self.in_list(col, values, negate)
            }
            WhereCondition::Between { column, values }
            | WhereCondition::NotBetween { column, values } => {
                if column == SENTINEL {
                    return Ok(CompiledSql::empty());
                }
                let col = self.schema.column(column)?;
                let negate = matches!(cond, WhereCondition::NotBetween { .. });
                self.between(col, values, negate)
            }
            WhereCondition::Exists { sql } | WhereCondition::NotExists { sql } => {
                let sql = sql.trim();
                if sql == SENTINEL {
                    return Ok(CompiledSql::empty());
                }
                let keyword = if matches!(cond, WhereCondition::Exists { .. }) {
                    "EXISTS"
                } else {
                    "NOT EXISTS"
                };
                if sql.is_empty() {
                    return Err(SqlPipeError::shape(format!("{} requires a subquery", keyword)));
                }
                Ok(CompiledSql::text(format!("{} ({})", keyword, sql)))
            }
            WhereCondition::Expression { sql } => {
                let sql = sql.trim();
                if sql == SENTINEL {
                    return Ok(CompiledSql::empty());
                }
                if sql.is_empty() {
                    return Err(SqlPipeError::shape("Expression required for WHERE"));
                }
                Ok(CompiledSql::text(format!("({})", sql)))
            }
        }
    }

    fn column_condition(
        &self,
        col: &ColumnSchema,
        operator: Operator,
        value: &Value,
        values: &[Value],
    ) -> SqlPipeResult<CompiledSql> {
        let name = self.quote(&col.name);

        if let Some(symbol) = operator.comparison() {
            return Ok(CompiledSql::new(
                format!("{} {} ?", name, symbol),
                vec![cast_value(col, value)?],
            ));
        }

        match operator {
            Operator::Like | Operator::NotLike | Operator::Contains => {
                if !col.is_string {
                    return Err(SqlPipeError::shape(format!(
                        "LIKE only allowed on string column \"{}\"",
                        col.name
                    )));
                }
                let keyword = if operator == Operator::NotLike { "NOT LIKE" } else { "LIKE" };
                let pattern = match operator {
                    Operator::Contains => format!("%{}%", stringify(value)),
                    _ => stringify(value),
                };
                Ok(CompiledSql::new(
                    format!("{} {} ?", name, keyword),
                    vec![pattern.into()],
                ))
            }
            Operator::In => self.in_list(col, values, false),
            Operator::NotIn => self.in_list(col, values, true),
            Operator::Between => self.between(col, values, false),
            Operator::NotBetween => self.between(col, values, true),
            Operator::IsNull => Ok(CompiledSql::text(format!("{} IS NULL", name))),
            Operator::IsNotNull => Ok(CompiledSql::text(format!("{} IS NOT NULL", name))),
            _ => Err(SqlPipeError::shape(format!(
                "Unsupported operator \"{}\"",
                operator
            ))),
        }
    }

    fn in_list(
        &self,
        col: &ColumnSchema,
        values: &[Value],
        negate: bool,
    ) -> SqlPipeResult<CompiledSql> {
        let keyword = if negate { "NOT IN" } else { "IN" };
        if values.is_empty() {
            return Err(SqlPipeError::shape(format!("{} requires values", keyword)));
        }
        let bound = values
            .iter()
            .map(|v| cast_value(col, v))
            .collect::<SqlPipeResult<Vec<_>>>()?;
        let placeholders = vec!["?"; bound.len()].join(", ");
        Ok(CompiledSql::new(
            format!("{} {} ({})", self.quote(&col.name), keyword, placeholders),
            bound,
        ))
    }

    fn between(
        &self,
        col: &ColumnSchema,
        values: &[Value],
        negate: bool,
    ) -> SqlPipeResult<CompiledSql> {
        let keyword = if negate { "NOT BETWEEN" } else { "BETWEEN" };
        let [low, high] = values else {
            return Err(SqlPipeError::shape(format!(
                "{} requires exactly 2 values, got {}",
                keyword,
                values.len()
            )));
        };
        Ok(CompiledSql::new(
            format!("{} {} ? AND ?", self.quote(&col.name), keyword),
            vec![cast_value(col, low)?, cast_value(col, high)?],
        ))
    }
}
