//! Clause compiler.
//!
//! Turns the structured models of [`crate::ast`] into SQL fragments validated
//! against a [`TableSchema`]. Every function here is pure: schema in,
//! fragment out, no I/O and no shared state.
//!
//! ```
//! use sqlpipe::ast::*;
//! use sqlpipe::schema::TableSchema;
//! use sqlpipe::transpiler::compile_where;
//!
//! let schema = TableSchema::from_columns([("STATUS", "VARCHAR")]);
//! let groups = vec![WhereGroup::new(
//!     LogicalOp::And,
//!     vec![WhereCondition::column("STATUS", Operator::Equal, "OPEN".into())],
//! )];
//! let clause = compile_where(&groups, &schema).unwrap();
//! assert_eq!(clause.sql, "WHERE (\"STATUS\" = ?)");
//! ```

pub mod cast;
pub mod clauses;
pub mod conditions;
pub mod dialect;
pub mod having;
pub mod select;

#[cfg(test)]
mod tests;

pub use cast::cast_value;
pub use dialect::Dialect;

use crate::ast::*;
use crate::error::{SqlPipeError, SqlPipeResult};
use crate::schema::TableSchema;
use crate::value::BindValue;

/// A SQL fragment plus the bind values for its placeholders, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledSql {
    pub sql: String,
    pub values: Vec<BindValue>,
}

impl CompiledSql {
    pub fn new(sql: impl Into<String>, values: Vec<BindValue>) -> Self {
        Self {
            sql: sql.into(),
            values,
        }
    }

    pub fn text(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Compiles clauses for one table schema in one dialect.
#[derive(Debug, Clone, Copy)]
pub struct ClauseCompiler<'a> {
    schema: &'a TableSchema,
    dialect: Dialect,
}

impl<'a> ClauseCompiler<'a> {
    pub fn new(schema: &'a TableSchema) -> Self {
        Self::with_dialect(schema, Dialect::default())
    }

    pub fn with_dialect(schema: &'a TableSchema, dialect: Dialect) -> Self {
        Self { schema, dialect }
    }

    pub fn schema(&self) -> &TableSchema {
        self.schema
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn quote(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }

    /// Quote a possibly schema-qualified table name.
    pub fn table_ref(&self, table: &str) -> SqlPipeResult<String> {
        let parts: Vec<&str> = table.split('.').map(str::trim).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(SqlPipeError::shape(format!("Invalid table name \"{}\"", table)));
        }
        Ok(parts
            .iter()
            .map(|p| self.quote(p))
            .collect::<Vec<_>>()
            .join("."))
    }

    /// Assemble a full SELECT statement over `table`.
    pub fn compile_query(&self, table: &str, model: &QueryModel) -> SqlPipeResult<CompiledSql> {
        let select = self.compile_select(&model.select)?;
        let from = self.table_ref(table)?;
        let filter = self.compile_where(&model.filters)?;
        let group_by = self.compile_group_by(&model.group_by)?;
        let having = self.compile_having(&model.having)?;
        let order_by = self.compile_order_by(&model.order_by)?;
        let limit = self.compile_limit(model.limit);

        let sql = [
            format!("SELECT {}", select),
            format!("FROM {}", from),
            filter.sql,
            group_by,
            having.sql,
            order_by,
            limit,
        ]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        let mut values = filter.values;
        values.extend(having.values);
        Ok(CompiledSql { sql, values })
    }
}

/// Compile a SELECT list. An empty list selects `*`.
pub fn compile_select(items: &[SelectItem], schema: &TableSchema) -> SqlPipeResult<String> {
    ClauseCompiler::new(schema).compile_select(items)
}

/// Compile filter groups into a `WHERE` clause and its bind values.
pub fn compile_where(groups: &[WhereGroup], schema: &TableSchema) -> SqlPipeResult<CompiledSql> {
    ClauseCompiler::new(schema).compile_where(groups)
}

/// Compile a `GROUP BY` clause.
pub fn compile_group_by(items: &[GroupByItem], schema: &TableSchema) -> SqlPipeResult<String> {
    ClauseCompiler::new(schema).compile_group_by(items)
}

/// Compile a `HAVING` clause and its bind values.
pub fn compile_having(items: &[HavingItem], schema: &TableSchema) -> SqlPipeResult<CompiledSql> {
    ClauseCompiler::new(schema).compile_having(items)
}

/// Compile an `ORDER BY` clause.
pub fn compile_order_by(items: &[OrderByItem], schema: &TableSchema) -> SqlPipeResult<String> {
    ClauseCompiler::new(schema).compile_order_by(items)
}

/// Compile a row cap. Absent or non-positive limits compile to nothing.
pub fn compile_limit(limit: Option<i64>) -> String {
    clauses::limit_clause(limit, Dialect::default())
}

/// Compile a full SELECT over `table` in the given dialect.
pub fn compile_query(
    table: &str,
    model: &QueryModel,
    schema: &TableSchema,
    dialect: Dialect,
) -> SqlPipeResult<CompiledSql> {
    ClauseCompiler::with_dialect(schema, dialect).compile_query(table, model)
}
