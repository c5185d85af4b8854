use async_trait::async_trait;
use serde_json::Value;

use crate::error::SqlPipeResult;
use crate::transpiler::Dialect;
use crate::value::BindValue;

/// Round-trips statements to a backing store.
///
/// One executor serves one pipeline run; `begin` opens a transaction that
/// every later `execute` joins until `commit` or `rollback`.
#[async_trait]
pub trait StatementExecutor: Send {
    /// SQL dialect of the backing store.
    fn dialect(&self) -> Dialect {
        Dialect::default()
    }

    async fn begin(&mut self) -> SqlPipeResult<()>;

    async fn commit(&mut self) -> SqlPipeResult<()>;

    /// Roll back the open transaction. Without one this is a no-op.
    async fn rollback(&mut self) -> SqlPipeResult<()>;

    /// Execute one statement. Reads return an array of row objects, other
    /// statements return `{"rowsAffected": n}`.
    async fn execute(
        &mut self,
        sql: &str,
        values: &[BindValue],
        row_limit: u64,
    ) -> SqlPipeResult<Value>;
}
