//! Pipeline executor.
//!
//! Runs an ordered list of templated queries against one executor. Each step
//! publishes its (transformed) result as `outputN`, which later steps can
//! reference through `${outputN...}` parameters.
//!
//! ```text
//! INIT ─▶ BEGIN? ─▶ [ PREVIEW | SKIP-EMPTY | EXECUTE ]*
//!      ─▶ COMMIT | ROLLBACK ─▶ AGGREGATE
//! ```

pub mod context;
pub mod executor;
pub mod sanitize;
pub mod transform;

pub use context::ExecutionContext;
pub use executor::StatementExecutor;
pub use sanitize::{is_read_statement, RowCapSanitizer, StatementSanitizer};
pub use transform::{BuiltinTransforms, TransformHelpers, TransformRunner};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::binding::{build_sql_and_bindings, BindingParam, BoundStatement};
use crate::error::{SqlPipeError, SqlPipeResult};
use crate::value::bindings_to_json;

/// Default row cap for reads.
pub const DEFAULT_ROW_LIMIT: u64 = 200;

/// How step outputs are combined into the run's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnMode {
    /// Every output, in order.
    #[default]
    All,
    /// Only the final output.
    Last,
    /// Only the output at this index.
    Specific(usize),
    /// One object merged from all outputs; later keys win.
    Merge,
}

/// Run-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub row_limit: u64,
    /// Resolve every step without executing anything.
    pub preview: bool,
    pub use_transaction: bool,
    /// Return the raw outputs as soon as a step fails.
    pub stop_on_error: bool,
    pub select_only: bool,
    pub return_mode: ReturnMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            row_limit: DEFAULT_ROW_LIMIT,
            preview: false,
            use_transaction: false,
            stop_on_error: false,
            select_only: false,
            return_mode: ReturnMode::default(),
        }
    }
}

/// One step of a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryItem {
    pub sql: String,
    #[serde(default, alias = "bindings")]
    pub parameters: Vec<BindingParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
}

impl QueryItem {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..Default::default()
        }
    }

    pub fn param(mut self, param: BindingParam) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn transform(mut self, script: impl Into<String>) -> Self {
        self.transform = Some(script.into());
        self
    }
}

/// Executes pipelines against one [`StatementExecutor`].
pub struct PipelineRunner<'e, E: StatementExecutor + ?Sized> {
    executor: &'e mut E,
    sanitizer: Box<dyn StatementSanitizer>,
    transforms: Box<dyn TransformRunner>,
    config: PipelineConfig,
}

#[derive(Default)]
struct RunState {
    ctx: ExecutionContext,
    outputs: Vec<Value>,
    in_transaction: bool,
}

impl<'e, E: StatementExecutor + ?Sized> PipelineRunner<'e, E> {
    pub fn new(executor: &'e mut E) -> Self {
        let sanitizer = RowCapSanitizer::new(executor.dialect());
        Self {
            executor,
            sanitizer: Box::new(sanitizer),
            transforms: Box::new(BuiltinTransforms),
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: impl StatementSanitizer + 'static) -> Self {
        self.sanitizer = Box::new(sanitizer);
        self
    }

    pub fn with_transforms(mut self, transforms: impl TransformRunner + 'static) -> Self {
        self.transforms = Box::new(transforms);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run `items` in order and aggregate their outputs.
    ///
    /// A failing step is recorded as `{error, contextSnapshot}` and ends the
    /// loop. Only a failed rollback surfaces as `Err`.
    pub async fn run(&mut self, items: &[QueryItem]) -> SqlPipeResult<Vec<Value>> {
        info!(
            items = items.len(),
            preview = self.config.preview,
            transaction = self.config.use_transaction,
            "Running pipeline"
        );

        let mut state = RunState::default();
        if let Err(err) = self.run_items(items, &mut state).await {
            error!(error = %err, "Pipeline step failed");
            if state.in_transaction {
                warn!("Rolling back transaction");
                self.executor.rollback().await.map_err(|e| {
                    SqlPipeError::Transaction(format!("rollback failed: {}", e))
                })?;
            }
            state.outputs.push(json!({
                "error": err.to_string(),
                "contextSnapshot": state.ctx.snapshot(),
            }));
            if self.config.stop_on_error {
                return Ok(state.outputs);
            }
        }

        if self.config.preview {
            return Ok(state.outputs);
        }
        Ok(aggregate(state.outputs, self.config.return_mode))
    }

    async fn run_items(&mut self, items: &[QueryItem], state: &mut RunState) -> SqlPipeResult<()> {
        let transactional = self.config.use_transaction && !self.config.preview;
        if transactional {
            self.executor.begin().await?;
            state.in_transaction = true;
        }

        for (index, item) in items.iter().enumerate() {
            let name = ExecutionContext::output_name(index);
            let bound = build_sql_and_bindings(&item.sql, &item.parameters, &state.ctx)?;

            if self.config.preview {
                debug!(step = index, sql = %bound.sql, "Preview");
                state.outputs.push(single(&name, preview_record(&bound)));
                continue;
            }

            if bound.empty {
                debug!(step = index, "Empty parameter, skipping execution");
                state.ctx.insert(name.clone(), json!([]));
                state.outputs.push(single(&name, json!([])));
                continue;
            }

            let raw = self.execute(&bound).await?;
            let result = match item.transform.as_deref().map(str::trim) {
                Some(script) if !script.is_empty() => {
                    let helpers = TransformHelpers::new(index);
                    self.transforms
                        .run(script, raw, &state.ctx, &helpers)
                        .await?
                }
                _ => raw,
            };

            state.ctx.insert(name.clone(), result.clone());
            state.outputs.push(single(&name, result));
        }

        if state.in_transaction {
            self.executor.commit().await?;
            state.in_transaction = false;
        }
        Ok(())
    }

    async fn execute(&mut self, bound: &BoundStatement) -> SqlPipeResult<Value> {
        let sql = self
            .sanitizer
            .sanitize(&bound.sql, self.config.row_limit, self.config.select_only)
            .map_err(|e| execution_error(e, bound.sql.clone(), bound))?;
        debug!(sql = %sql, values = bound.values.len(), "Executing");
        let result = self
            .executor
            .execute(&sql, &bound.values, self.config.row_limit)
            .await;
        result.map_err(|e| execution_error(e, sql, bound))
    }
}

fn execution_error(err: SqlPipeError, sql: String, bound: &BoundStatement) -> SqlPipeError {
    SqlPipeError::Execution {
        message: err.to_string(),
        sql,
        bindings: bindings_to_json(&bound.values),
    }
}

/// Run `items` with the default sanitizer and transforms.
pub async fn run_pipeline<E: StatementExecutor + ?Sized>(
    executor: &mut E,
    items: &[QueryItem],
    config: PipelineConfig,
) -> SqlPipeResult<Vec<Value>> {
    PipelineRunner::new(executor)
        .with_config(config)
        .run(items)
        .await
}

fn single(name: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(name.to_string(), value);
    Value::Object(map)
}

fn preview_record(bound: &BoundStatement) -> Value {
    let parameters: Vec<Value> = bound
        .values
        .iter()
        .enumerate()
        .map(|(i, v)| json!({ "index": i + 1, "value": v }))
        .collect();
    json!({
        "sql": bound.sql,
        "placeholders": bound.placeholders(),
        "parameters": parameters,
        "valid": true,
    })
}

/// Combine step outputs according to `mode`.
pub fn aggregate(outputs: Vec<Value>, mode: ReturnMode) -> Vec<Value> {
    match mode {
        ReturnMode::All => outputs,
        ReturnMode::Last => outputs.into_iter().last().into_iter().collect(),
        ReturnMode::Specific(index) => outputs.into_iter().nth(index).into_iter().collect(),
        ReturnMode::Merge => {
            let mut merged = Map::new();
            for output in outputs {
                if let Value::Object(map) = output {
                    merged.extend(map);
                }
            }
            vec![Value::Object(merged)]
        }
    }
}
