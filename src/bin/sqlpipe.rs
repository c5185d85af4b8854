//! sqlpipe CLI: compile, bind and run SQL pipelines
//!
//! # Usage
//!
//! ```bash
//! # Compile a query model against a schema document
//! sqlpipe compile ORDERS --model model.json --schema schema.json
//!
//! # Resolve a template
//! sqlpipe bind "SELECT * FROM t WHERE id IN (?)" --params '[{"type":"number","value":[1,2]}]'
//!
//! # Run a pipeline file
//! sqlpipe run pipeline.toml --database-url postgres://localhost/sales --transaction
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use serde::Deserialize;
use serde_json::Value;
use sqlpipe::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlpipe")]
#[command(version)]
#[command(
    about = "Schema-validated SQL compiler, template binder and query pipeline",
    long_about = None
)]
#[command(after_help = "EXAMPLES:
    sqlpipe compile ORDERS --model model.json --schema schema.json
    sqlpipe count \"SELECT '?' FROM t WHERE a = ?\"
    sqlpipe run pipeline.toml --preview")]
struct Cli {
    /// Config file (defaults to <config dir>/sqlpipe/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Db2,
    Postgres,
    Mysql,
    Sqlite,
}

impl From<DialectArg> for Dialect {
    fn from(d: DialectArg) -> Self {
        match d {
            DialectArg::Db2 => Dialect::Db2,
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Mysql => Dialect::MySql,
            DialectArg::Sqlite => Dialect::Sqlite,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a JSON query model into SQL
    Compile {
        /// Table to select from
        table: String,

        /// Query model JSON file
        #[arg(short, long)]
        model: PathBuf,

        /// Schema document JSON file
        #[arg(short, long)]
        schema: Option<PathBuf>,

        #[arg(short, long, value_enum)]
        dialect: Option<DialectArg>,
    },
    /// Resolve placeholders of a SQL template
    Bind {
        /// The SQL template
        sql: String,

        /// Parameters as a JSON array of {type, value}
        #[arg(short, long, default_value = "[]")]
        params: String,
    },
    /// Count `?` placeholders outside quotes and comments
    Count {
        sql: String,
    },
    /// Run a pipeline file (JSON or TOML)
    Run {
        /// Pipeline file
        file: PathBuf,

        /// Database connection URL
        #[arg(long, env = "SQLPIPE_DATABASE_URL")]
        database_url: Option<String>,

        /// Resolve every step without executing
        #[arg(long)]
        preview: bool,

        /// Run all steps in one transaction
        #[arg(long)]
        transaction: bool,

        /// Return raw outputs on the first error
        #[arg(long)]
        stop_on_error: bool,

        /// Reject anything but reads
        #[arg(long)]
        select_only: bool,

        /// Row cap for reads
        #[arg(long)]
        row_limit: Option<u64>,

        /// all | last | merge | <index>
        #[arg(short, long)]
        return_mode: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Deserialize)]
struct PipelineFile {
    queries: Vec<QueryItem>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "sqlpipe=debug" } else { "sqlpipe=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = SqlPipeConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Compile {
            table,
            model,
            schema,
            dialect,
        } => {
            let dialect = dialect.map(Dialect::from).unwrap_or_else(|| config.dialect());
            compile(&config, &table, &model, schema.as_deref(), dialect).await
        }
        Commands::Bind { sql, params } => bind(&sql, &params),
        Commands::Count { sql } => {
            println!("{}", count_sql_placeholders(&sql).to_string().cyan().bold());
            Ok(())
        }
        Commands::Run {
            file,
            database_url,
            preview,
            transaction,
            stop_on_error,
            select_only,
            row_limit,
            return_mode,
            format,
        } => {
            let mut pipeline = config.pipeline.clone();
            pipeline.preview |= preview;
            pipeline.use_transaction |= transaction;
            pipeline.stop_on_error |= stop_on_error;
            pipeline.select_only |= select_only;
            if let Some(limit) = row_limit {
                pipeline.row_limit = limit;
            }
            if let Some(mode) = return_mode {
                pipeline.return_mode = parse_return_mode(&mode)?;
            }
            let url = database_url.or_else(|| config.database_url.clone());
            run_file(&file, url.as_deref(), pipeline, format, cli.verbose).await
        }
    }
}

async fn compile(
    config: &SqlPipeConfig,
    table: &str,
    model_path: &Path,
    schema_path: Option<&Path>,
    dialect: Dialect,
) -> Result<()> {
    let Some(schema_path) = schema_path.or(config.schema_path.as_deref()) else {
        bail!("No schema document. Use --schema or set schema_path in the config file");
    };
    let document = SchemaDocument::from_json(&read(schema_path)?)
        .with_context(|| format!("Invalid schema document {}", schema_path.display()))?;
    let resolver = CachedSchemaResolver::new(
        DocumentSchemaResolver::new(document),
        "cli",
        config.schema_cache_ttl(),
    );
    let schema = resolver.resolve(table, false).await?;

    let model = QueryModel::from_json(&read(model_path)?)?;
    let compiled = compile_query(table, &model, &schema, dialect)?;

    println!("{}", "Generated SQL:".green().bold());
    println!("{}", compiled.sql.white());
    print_values(&compiled.values);
    Ok(())
}

fn bind(sql: &str, params: &str) -> Result<()> {
    let params: Vec<BindingParam> =
        serde_json::from_str(params).context("--params must be a JSON array of {type, value}")?;
    let bound = build_sql_and_bindings(sql, &params, &ExecutionContext::new())?;

    if bound.empty {
        println!("{}", "⚠ Empty parameter: statement would match nothing".yellow());
        return Ok(());
    }
    println!("{}", "Resolved SQL:".green().bold());
    println!("{}", bound.sql.white());
    print_values(&bound.values);
    Ok(())
}

async fn run_file(
    file: &Path,
    database_url: Option<&str>,
    config: PipelineConfig,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let text = read(file)?;
    let pipeline: PipelineFile = match file.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&text)
            .with_context(|| format!("Invalid pipeline file {}", file.display()))?,
        _ => serde_json::from_str(&text)
            .with_context(|| format!("Invalid pipeline file {}", file.display()))?,
    };

    let outputs = if config.preview {
        run_pipeline(&mut PreviewOnly, &pipeline.queries, config).await?
    } else {
        let Some(url) = database_url else {
            bail!("No database URL. Use --database-url or set SQLPIPE_DATABASE_URL");
        };
        if verbose {
            println!("{} {}", "Connecting to:".dimmed(), url);
        }
        let mut executor = SqlxExecutor::connect(url).await?;
        run_pipeline(&mut executor, &pipeline.queries, config).await?
    };

    format_outputs(&outputs, format);
    Ok(())
}

fn parse_return_mode(mode: &str) -> Result<ReturnMode> {
    match mode.trim().to_lowercase().as_str() {
        "all" => Ok(ReturnMode::All),
        "last" => Ok(ReturnMode::Last),
        "merge" => Ok(ReturnMode::Merge),
        other => other
            .parse::<usize>()
            .map(ReturnMode::Specific)
            .with_context(|| format!("Unknown return mode \"{}\"", mode)),
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_values(values: &[BindValue]) {
    if values.is_empty() {
        return;
    }
    println!();
    println!("{}", "Bindings:".cyan());
    for (i, v) in values.iter().enumerate() {
        println!("  {} = {}", i + 1, v.to_string().yellow());
    }
}

/// Executor for `--preview` runs; previews never reach it.
struct PreviewOnly;

#[async_trait::async_trait]
impl StatementExecutor for PreviewOnly {
    async fn begin(&mut self) -> SqlPipeResult<()> {
        Ok(())
    }

    async fn commit(&mut self) -> SqlPipeResult<()> {
        Ok(())
    }

    async fn rollback(&mut self) -> SqlPipeResult<()> {
        Ok(())
    }

    async fn execute(
        &mut self,
        _sql: &str,
        _values: &[BindValue],
        _row_limit: u64,
    ) -> SqlPipeResult<Value> {
        Err(SqlPipeError::Connection("no database in preview mode".to_string()))
    }
}

fn format_outputs(outputs: &[Value], format: OutputFormat) {
    if outputs.is_empty() {
        println!("{}", "(no results)".dimmed());
        return;
    }

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(outputs).unwrap_or_default());
        return;
    }

    for output in outputs {
        let Value::Object(map) = output else {
            println!("{}", output);
            continue;
        };
        for (name, value) in map {
            if name == "error" {
                println!("{} {}", "✗".red(), val_to_string(value).red());
                continue;
            }
            if name == "contextSnapshot" {
                continue;
            }
            println!("{}", name.cyan().bold());
            match value.as_array() {
                Some(rows) if !rows.is_empty() && rows.iter().all(Value::is_object) => {
                    print_table(rows)
                }
                _ => println!(
                    "{}",
                    serde_json::to_string_pretty(value).unwrap_or_default()
                ),
            }
            println!();
        }
    }
}

fn print_table(rows: &[Value]) {
    let rows: Vec<&serde_json::Map<String, Value>> =
        rows.iter().filter_map(Value::as_object).collect();
    let Some(first) = rows.first() else {
        return;
    };

    let columns: Vec<&String> = first.keys().collect();

    let mut widths: HashMap<&String, usize> = columns.iter().map(|c| (*c, c.len())).collect();
    for row in &rows {
        for (col, val) in row.iter() {
            let len = val_to_string(val).chars().count();
            if let Some(w) = widths.get_mut(col) {
                *w = (*w).max(len);
            }
        }
    }

    let header: Vec<String> = columns
        .iter()
        .map(|c| format!("{:width$}", c, width = widths[*c]))
        .collect();
    println!("{}", header.join(" │ ").white().bold());

    let sep: Vec<String> = columns.iter().map(|c| "─".repeat(widths[*c])).collect();
    println!("{}", sep.join("─┼─").dimmed());

    for row in &rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| {
                let val = row.get(*c).map(val_to_string).unwrap_or_default();
                format!("{:width$}", val, width = widths[*c])
            })
            .collect();
        println!("{}", cells.join(" │ "));
    }

    println!("{} row(s)", rows.len().to_string().cyan());
}

fn val_to_string(val: &Value) -> String {
    match val {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => val.to_string(),
    }
}
