//! # sqlpipe: declarative SQL, bound and piped
//!
//! > **Describe the query. Bind the values. Chain the results.**
//!
//! sqlpipe turns structured query models and templated SQL into
//! schema-validated, parameterized statements, and runs ordered lists of them
//! with transactions, previews and result threading.
//!
//! ## Quick Example
//!
//! ```
//! use sqlpipe::prelude::*;
//!
//! let schema = TableSchema::from_columns([("STATUS", "VARCHAR"), ("AMOUNT", "DECIMAL")]);
//! let model = QueryModel::from_json(r#"{
//!     "select": [{"mode": "aggregate", "fn": "SUM", "field": "AMOUNT"}],
//!     "where": [{"conditions": [
//!         {"mode": "column", "column": "STATUS", "operator": "equal", "value": "OPEN"}
//!     ]}]
//! }"#).unwrap();
//!
//! let query = compile_query("ORDERS", &model, &schema, Dialect::Db2).unwrap();
//! assert_eq!(
//!     query.sql,
//!     r#"SELECT SUM(DECIMAL("AMOUNT", 18, 2)) AS "sum_AMOUNT" FROM "ORDERS" WHERE ("STATUS" = ?)"#
//! );
//! ```
//!
//! ## Layers
//!
//! | Module         | Role                                            |
//! |----------------|-------------------------------------------------|
//! | [`transpiler`] | Structured models → SQL fragments + bind values |
//! | [`binding`]    | `:named`, `IN (?)`, `?` template resolution     |
//! | [`pipeline`]   | Sequential execution with shared context        |
//! | [`engine`]     | sqlx-backed statement executor                  |

pub mod ast;
pub mod binding;
pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod schema;
pub mod schema_cache;
pub mod transpiler;
pub mod value;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::binding::{
        bind_template, build_sql_and_bindings, count_sql_placeholders, BindingParam,
        BoundStatement, ParamType, ParamValue,
    };
    pub use crate::config::SqlPipeConfig;
    pub use crate::engine::SqlxExecutor;
    pub use crate::error::*;
    pub use crate::pipeline::{
        run_pipeline, ExecutionContext, PipelineConfig, PipelineRunner, QueryItem, ReturnMode,
        StatementExecutor,
    };
    pub use crate::schema::{ColumnSchema, SchemaDocument, TableSchema};
    pub use crate::schema_cache::{
        CachedSchemaResolver, DocumentSchemaResolver, SchemaCache, SchemaResolver,
    };
    pub use crate::transpiler::{
        compile_group_by, compile_having, compile_limit, compile_order_by, compile_query,
        compile_select, compile_where, ClauseCompiler, CompiledSql, Dialect,
    };
    pub use crate::value::BindValue;
}
