use super::cast::cast_number;
use super::select::non_blank;
use super::{ClauseCompiler, CompiledSql};
use crate::ast::{AggregateFn, HavingItem};
use crate::error::{SqlPipeError, SqlPipeResult};

impl ClauseCompiler<'_> {
    /// Compile a `HAVING` clause; entries are joined with `AND`.
    ///
    /// `COUNT(*)` is the only aggregate that skips schema validation.
    /// `COUNT(col)` only checks that the column exists, every other function
    /// needs a numeric column.
    pub fn compile_having(&self, items: &[HavingItem]) -> SqlPipeResult<CompiledSql> {
        if items.is_empty() {
            return Ok(CompiledSql::empty());
        }

        let mut clauses = Vec::with_capacity(items.len());
        let mut values = Vec::new();

        for item in items {
            match item {
                HavingItem::Aggregate {
                    function,
                    field,
                    operator,
                    value,
                } => {
                    let symbol = operator.comparison().ok_or_else(|| {
                        SqlPipeError::shape(format!("Unsupported HAVING operator: {}", operator))
                    })?;
                    let expr = self.having_aggregate(*function, non_blank(field.as_deref()))?;
                    clauses.push(format!("{} {} ?", expr, symbol));
                    values.push(cast_number(value, &format!("HAVING {}", function))?);
                }
                HavingItem::Expression { expression } => {
                    let expression = non_blank(Some(expression.as_str()))
                        .ok_or_else(|| SqlPipeError::shape("HAVING expression is required"))?;
                    clauses.push(expression.to_string());
                }
            }
        }

        Ok(CompiledSql::new(
            format!("HAVING {}", clauses.join(" AND ")),
            values,
        ))
    }

    fn having_aggregate(
        &self,
        function: AggregateFn,
        field: Option<&str>,
    ) -> SqlPipeResult<String> {
        match (function, field) {
            (AggregateFn::Count, None | Some("*")) => Ok("COUNT(*)".to_string()),
            (AggregateFn::Count, Some(f)) => {
                let col = self.schema.column_in("HAVING ", f)?;
                Ok(format!("COUNT({})", self.quote(&col.name)))
            }
            (_, None) => Err(SqlPipeError::shape(format!(
                "HAVING {} requires a column",
                function
            ))),
            (_, Some(f)) => {
                let col = self.schema.column_in("HAVING ", f)?;
                if !col.is_numeric {
                    return Err(SqlPipeError::shape(format!(
                        "HAVING {} requires numeric column",
                        function
                    )));
                }
                let cast = self.dialect.decimal_cast(&self.quote(&col.name));
                Ok(format!("{}({})", function, cast))
            }
        }
    }
}
