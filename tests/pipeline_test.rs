//! Pipeline runs against a scripted in-memory executor.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use sqlpipe::prelude::*;

/// Answers reads with fixed rows and fails any statement mentioning `broken`.
#[derive(Default)]
struct ScriptedExecutor {
    log: Vec<String>,
    executed: Vec<(String, Vec<BindValue>)>,
    fail_commit: bool,
    fail_rollback: bool,
}

#[async_trait]
impl StatementExecutor for ScriptedExecutor {
    async fn begin(&mut self) -> SqlPipeResult<()> {
        self.log.push("BEGIN".into());
        Ok(())
    }

    async fn commit(&mut self) -> SqlPipeResult<()> {
        self.log.push("COMMIT".into());
        if self.fail_commit {
            return Err(SqlPipeError::Transaction("disk full".into()));
        }
        Ok(())
    }

    async fn rollback(&mut self) -> SqlPipeResult<()> {
        self.log.push("ROLLBACK".into());
        if self.fail_rollback {
            return Err(SqlPipeError::Database("connection reset".into()));
        }
        Ok(())
    }

    async fn execute(
        &mut self,
        sql: &str,
        values: &[BindValue],
        _row_limit: u64,
    ) -> SqlPipeResult<Value> {
        self.log.push("EXECUTE".into());
        self.executed.push((sql.to_string(), values.to_vec()));
        if sql.contains("broken") {
            return Err(SqlPipeError::Database("relation \"broken\" does not exist".into()));
        }
        if sql.starts_with("SELECT") {
            return Ok(json!([{"ID": 1, "NAME": "a"}, {"ID": 2, "NAME": "b"}]));
        }
        Ok(json!({"rowsAffected": 1}))
    }
}

fn three_reads() -> Vec<QueryItem> {
    vec![
        QueryItem::new("SELECT ID FROM t1"),
        QueryItem::new("SELECT ID FROM t2").transform("count"),
        QueryItem::new("SELECT ID FROM t3").transform("first"),
    ]
}

fn config(return_mode: ReturnMode) -> PipelineConfig {
    PipelineConfig {
        return_mode,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_return_modes() {
    let rows = json!([{"ID": 1, "NAME": "a"}, {"ID": 2, "NAME": "b"}]);

    let mut exec = ScriptedExecutor::default();
    let all = run_pipeline(&mut exec, &three_reads(), config(ReturnMode::All))
        .await
        .unwrap();
    assert_eq!(
        all,
        vec![
            json!({"output0": rows}),
            json!({"output1": 2}),
            json!({"output2": {"ID": 1, "NAME": "a"}}),
        ]
    );

    let mut exec = ScriptedExecutor::default();
    let last = run_pipeline(&mut exec, &three_reads(), config(ReturnMode::Last))
        .await
        .unwrap();
    assert_eq!(last, vec![json!({"output2": {"ID": 1, "NAME": "a"}})]);

    let mut exec = ScriptedExecutor::default();
    let specific = run_pipeline(&mut exec, &three_reads(), config(ReturnMode::Specific(1)))
        .await
        .unwrap();
    assert_eq!(specific, vec![json!({"output1": 2})]);

    let mut exec = ScriptedExecutor::default();
    let merged = run_pipeline(&mut exec, &three_reads(), config(ReturnMode::Merge))
        .await
        .unwrap();
    assert_eq!(
        merged,
        vec![json!({"output0": rows, "output1": 2, "output2": {"ID": 1, "NAME": "a"}})]
    );
}

#[tokio::test]
async fn test_reads_are_row_capped() {
    let mut exec = ScriptedExecutor::default();
    let items = vec![
        QueryItem::new("SELECT ID FROM t1;"),
        QueryItem::new("SELECT ID FROM t2 FETCH FIRST 5 ROWS ONLY"),
        QueryItem::new("DELETE FROM t3"),
    ];
    run_pipeline(&mut exec, &items, PipelineConfig::default())
        .await
        .unwrap();

    let sql: Vec<&str> = exec.executed.iter().map(|(s, _)| s.as_str()).collect();
    assert_eq!(
        sql,
        vec![
            "SELECT ID FROM t1 FETCH FIRST 200 ROWS ONLY",
            "SELECT ID FROM t2 FETCH FIRST 5 ROWS ONLY",
            "DELETE FROM t3",
        ]
    );
}

#[tokio::test]
async fn test_failure_rolls_back_and_stops() {
    let mut exec = ScriptedExecutor::default();
    let items = vec![
        QueryItem::new("UPDATE t1 SET a = ?").param(BindingParam::new(ParamType::Number, 1)),
        QueryItem::new("UPDATE broken SET a = 2"),
        QueryItem::new("UPDATE t3 SET a = 3"),
    ];
    let config = PipelineConfig {
        use_transaction: true,
        stop_on_error: true,
        ..Default::default()
    };

    let outputs = run_pipeline(&mut exec, &items, config).await.unwrap();

    assert_eq!(exec.log, vec!["BEGIN", "EXECUTE", "EXECUTE", "ROLLBACK"]);
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0], json!({"output0": {"rowsAffected": 1}}));

    let error = outputs[1]["error"].as_str().unwrap();
    assert!(error.starts_with("SQL Execution Error\n"));
    assert!(error.contains("relation \"broken\" does not exist"));
    assert!(error.contains("SQL: UPDATE broken SET a = 2"));
    assert_eq!(
        outputs[1]["contextSnapshot"],
        json!({"output0": {"rowsAffected": 1}})
    );
}

#[tokio::test]
async fn test_failure_without_stop_still_aggregates() {
    let mut exec = ScriptedExecutor::default();
    let items = vec![
        QueryItem::new("SELECT ID FROM t1").transform("count"),
        QueryItem::new("SELECT ID FROM broken"),
    ];

    let outputs = run_pipeline(&mut exec, &items, config(ReturnMode::Last))
        .await
        .unwrap();

    assert_eq!(outputs.len(), 1);
    assert!(outputs[0]["error"].is_string());
    assert_eq!(outputs[0]["contextSnapshot"], json!({"output0": 2}));
}

#[tokio::test]
async fn test_empty_in_list_skips_execution() {
    let mut exec = ScriptedExecutor::default();
    let items = vec![
        QueryItem::new("SELECT * FROM t WHERE ID IN (?)")
            .param(BindingParam::new(ParamType::Number, json!([]))),
        QueryItem::new("SELECT * FROM t WHERE ID = ?")
            .param(BindingParam::new(ParamType::Number, Value::Null)),
    ];

    let outputs = run_pipeline(&mut exec, &items, PipelineConfig::default())
        .await
        .unwrap();

    assert!(exec.executed.is_empty());
    assert_eq!(outputs, vec![json!({"output0": []}), json!({"output1": []})]);
}

#[tokio::test]
async fn test_outputs_thread_into_later_steps() {
    let mut exec = ScriptedExecutor::default();
    let items = vec![
        QueryItem::new("SELECT ID FROM customers").transform("pluck:ID"),
        QueryItem::new("SELECT * FROM orders WHERE CUSTOMER_ID IN (?) AND NOTE = ?")
            .param(BindingParam::new(ParamType::Number, "${output0}"))
            .param(BindingParam::new(ParamType::String, "after ${output0.1}")),
    ];

    run_pipeline(&mut exec, &items, PipelineConfig::default())
        .await
        .unwrap();

    let (sql, values) = &exec.executed[1];
    assert_eq!(
        sql,
        "SELECT * FROM orders WHERE CUSTOMER_ID IN (?,?) AND NOTE = ? FETCH FIRST 200 ROWS ONLY"
    );
    assert_eq!(
        values,
        &vec![
            BindValue::Int(1),
            BindValue::Int(2),
            BindValue::Text("after 2".into()),
        ]
    );
}

#[tokio::test]
async fn test_preview_never_touches_the_executor() {
    let mut exec = ScriptedExecutor::default();
    let items = vec![
        QueryItem::new("SELECT * FROM t WHERE ID = :id AND REGION IN (?)")
            .param(BindingParam::new(ParamType::Number, 7))
            .param(BindingParam::new(ParamType::String, json!(["EU", "US"]))),
        QueryItem::new("DELETE FROM t"),
    ];
    let config = PipelineConfig {
        preview: true,
        use_transaction: true,
        return_mode: ReturnMode::Last,
        ..Default::default()
    };

    let outputs = run_pipeline(&mut exec, &items, config).await.unwrap();

    assert!(exec.log.is_empty());
    assert_eq!(outputs.len(), 2);
    assert_eq!(
        outputs[0],
        json!({"output0": {
            "sql": "SELECT * FROM t WHERE ID = ? AND REGION IN (?,?)",
            "placeholders": 3,
            "parameters": [
                {"index": 1, "value": 7},
                {"index": 2, "value": "EU"},
                {"index": 3, "value": "US"},
            ],
            "valid": true,
        }})
    );
}

#[tokio::test]
async fn test_select_only_rejects_writes() {
    let mut exec = ScriptedExecutor::default();
    let items = vec![QueryItem::new("DELETE FROM t")];
    let config = PipelineConfig {
        select_only: true,
        ..Default::default()
    };

    let outputs = run_pipeline(&mut exec, &items, config).await.unwrap();

    assert!(exec.executed.is_empty());
    let error = outputs[0]["error"].as_str().unwrap();
    assert!(error.starts_with("SQL Execution Error\n"), "{}", error);
    assert!(error.contains("Only SELECT is allowed."));
    assert!(error.contains("SQL: DELETE FROM t"));
    assert!(error.contains("Bindings: []"));
}

#[tokio::test]
async fn test_binding_mismatch_is_recorded() {
    let mut exec = ScriptedExecutor::default();
    let items = vec![QueryItem::new("SELECT * FROM t WHERE a = ? AND b = ?")
        .param(BindingParam::new(ParamType::Number, 1))];

    let outputs = run_pipeline(&mut exec, &items, PipelineConfig::default())
        .await
        .unwrap();

    assert!(exec.executed.is_empty());
    let error = outputs[0]["error"].as_str().unwrap();
    assert!(error.contains("Expected ?: 2"), "{}", error);
}

#[tokio::test]
async fn test_preview_of_short_circuited_statement() {
    let mut exec = ScriptedExecutor::default();
    let items = vec![QueryItem::new("SELECT * FROM t WHERE a = :a AND id IN (?)")
        .param(BindingParam::new(ParamType::Number, 5))
        .param(BindingParam::new(ParamType::Number, json!([])))];
    let config = PipelineConfig {
        preview: true,
        ..Default::default()
    };

    let outputs = run_pipeline(&mut exec, &items, config).await.unwrap();

    assert!(exec.log.is_empty());
    assert_eq!(
        outputs,
        vec![json!({"output0": {
            "sql": "SELECT * FROM t WHERE a = ? AND id IN (?)",
            "placeholders": 2,
            "parameters": [{"index": 1, "value": 5}],
            "valid": true,
        }})]
    );
}

#[tokio::test]
async fn test_commit_failure_rolls_back() {
    let mut exec = ScriptedExecutor {
        fail_commit: true,
        ..Default::default()
    };
    let items = vec![QueryItem::new("UPDATE t SET a = 1")];
    let config = PipelineConfig {
        use_transaction: true,
        ..Default::default()
    };

    let outputs = run_pipeline(&mut exec, &items, config).await.unwrap();

    assert_eq!(exec.log, vec!["BEGIN", "EXECUTE", "COMMIT", "ROLLBACK"]);
    assert_eq!(
        outputs,
        vec![
            json!({"output0": {"rowsAffected": 1}}),
            json!({
                "error": "Transaction error: disk full",
                "contextSnapshot": {"output0": {"rowsAffected": 1}},
            }),
        ]
    );
}

#[tokio::test]
async fn test_rollback_failure_is_returned() {
    let mut exec = ScriptedExecutor {
        fail_rollback: true,
        ..Default::default()
    };
    let items = vec![
        QueryItem::new("UPDATE t SET a = 1"),
        QueryItem::new("UPDATE broken SET a = 2"),
    ];
    let config = PipelineConfig {
        use_transaction: true,
        stop_on_error: true,
        ..Default::default()
    };

    let err = run_pipeline(&mut exec, &items, config).await.unwrap_err();

    assert_eq!(exec.log, vec!["BEGIN", "EXECUTE", "EXECUTE", "ROLLBACK"]);
    assert!(matches!(err, SqlPipeError::Transaction(_)));
    assert!(err.to_string().contains("rollback failed"), "{}", err);
}

#[tokio::test]
async fn test_rollback_not_attempted_without_transaction() {
    let mut exec = ScriptedExecutor {
        fail_rollback: true,
        ..Default::default()
    };
    let items = vec![QueryItem::new("UPDATE broken SET a = 2")];

    let outputs = run_pipeline(&mut exec, &items, PipelineConfig::default())
        .await
        .unwrap();

    assert_eq!(exec.log, vec!["EXECUTE"]);
    assert!(outputs[0]["error"].is_string());
}
