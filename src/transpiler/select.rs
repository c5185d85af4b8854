use super::ClauseCompiler;
use crate::ast::{AggregateFn, SelectItem};
use crate::error::{SqlPipeError, SqlPipeResult};

impl ClauseCompiler<'_> {
    /// Compile a SELECT list. An empty list selects `*`.
    pub fn compile_select(&self, items: &[SelectItem]) -> SqlPipeResult<String> {
        if items.is_empty() {
            return Ok("*".to_string());
        }
        let exprs = items
            .iter()
            .map(|item| self.select_expr(item))
            .collect::<SqlPipeResult<Vec<_>>>()?;
        Ok(exprs.join(", "))
    }

    fn select_expr(&self, item: &SelectItem) -> SqlPipeResult<String> {
        match item {
            SelectItem::Column { column, alias } => {
                let col = self.column_ref("", column)?;
                match non_blank(alias.as_deref()) {
                    Some(alias) if col != "*" => Ok(format!("{} AS {}", col, self.quote(alias))),
                    _ => Ok(col),
                }
            }
            SelectItem::Aggregate {
                function,
                field,
                distinct,
                alias,
            } => {
                let field = non_blank(field.as_deref());
                let expr = self.aggregate_arg(*function, field, *distinct)?;
                let alias = match non_blank(alias.as_deref()) {
                    Some(alias) => alias.to_string(),
                    None => format!(
                        "{}_{}",
                        function.as_str().to_lowercase(),
                        field.filter(|f| *f != "*").unwrap_or("all")
                    ),
                };
                Ok(format!("{}({}) AS {}", function, expr, self.quote(&alias)))
            }
            SelectItem::Custom { expression, alias } => {
                let expression = expression.trim();
                if expression.is_empty() {
                    return Err(SqlPipeError::shape("Custom SQL expression is required"));
                }
                match non_blank(alias.as_deref()) {
                    Some(alias) => Ok(format!("{} AS {}", expression, self.quote(alias))),
                    None => Ok(expression.to_string()),
                }
            }
        }
    }

    fn aggregate_arg(
        &self,
        function: AggregateFn,
        field: Option<&str>,
        distinct: bool,
    ) -> SqlPipeResult<String> {
        let distinct = if distinct { "DISTINCT " } else { "" };

        if function == AggregateFn::Count {
            return match field {
                None | Some("*") => Ok("*".to_string()),
                Some(f) => Ok(format!("{}{}", distinct, self.column_ref("aggregate ", f)?)),
            };
        }

        let field = field
            .ok_or_else(|| SqlPipeError::shape(format!("{} requires a field", function)))?;
        let col = self.schema.column_in("aggregate ", field)?;
        if function.requires_numeric() && !col.is_numeric {
            return Err(SqlPipeError::shape(format!(
                "Cannot {} on non-numeric column \"{}\"",
                function, field
            )));
        }

        let quoted = self.quote(&col.name);
        let expr = if function.requires_numeric() {
            self.dialect.decimal_cast(&quoted)
        } else {
            quoted
        };
        Ok(format!("{}{}", distinct, expr))
    }

    /// Quoted reference to a schema column; `*` passes through.
    pub(crate) fn column_ref(&self, clause: &'static str, column: &str) -> SqlPipeResult<String> {
        if column == "*" {
            return Ok("*".to_string());
        }
        let col = self.schema.column_in(clause, column)?;
        Ok(self.quote(&col.name))
    }
}

pub(crate) fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
