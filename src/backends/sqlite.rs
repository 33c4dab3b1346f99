//! Raw SQLite backend
//!
//! A single rusqlite connection behind an async-aware mutex. Blocking driver
//! work is offloaded to the blocking thread pool and guarded by an operation
//! timeout, so a wedged statement cannot stall the runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::warn;

use super::codec;
use crate::core::conn::{
    BeginTx, CloseSql, ExecSql, PingSql, Prepared, PrepareSql, QueryRowSql, QuerySql, TxOptions,
};
use crate::core::error::{Result, SqlError};
use crate::core::exec::ExecResult;
use crate::core::rows::RowCursor;
use crate::core::tx::TxControl;
use crate::core::value::{NamedRow, SqlValue};

/// Default timeout for database operations (30 seconds)
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

type SharedConnection = Arc<Mutex<Option<Connection>>>;

/// Run a closure against the shared connection on the blocking pool
async fn run_on<T, F>(connection: SharedConnection, f: F) -> Result<T>
where
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let mut task = tokio::task::spawn_blocking(move || -> Result<T> {
        let guard = connection.blocking_lock();
        let conn = guard
            .as_ref()
            .ok_or_else(|| SqlError::connection("not connected to database"))?;
        f(conn)
    });

    // Abort the task on timeout so it cannot leak.
    tokio::select! {
        result = &mut task => {
            result.map_err(|e| SqlError::other(format!("task join error: {e}")))?
        }
        _ = tokio::time::sleep(DEFAULT_OPERATION_TIMEOUT) => {
            task.abort();
            Err(SqlError::timeout(DEFAULT_OPERATION_TIMEOUT.as_millis() as u64))
        }
    }
}

async fn exec_on(
    connection: &SharedConnection,
    sql: &str,
    params: &[SqlValue],
) -> Result<Box<dyn ExecResult>> {
    let sql = sql.to_string();
    let params = params.to_vec();
    run_on(Arc::clone(connection), move |conn| {
        let outcome = codec::run_exec(conn, &sql, &params)?;
        Ok(Box::new(outcome) as Box<dyn ExecResult>)
    })
    .await
}

async fn query_on(
    connection: &SharedConnection,
    sql: &str,
    params: &[SqlValue],
) -> Result<Box<dyn RowCursor>> {
    let sql = sql.to_string();
    let params = params.to_vec();
    run_on(Arc::clone(connection), move |conn| {
        let cursor = codec::run_query(conn, &sql, &params)?;
        Ok(Box::new(cursor) as Box<dyn RowCursor>)
    })
    .await
}

async fn query_row_on(
    connection: &SharedConnection,
    sql: &str,
    params: &[SqlValue],
) -> Result<Option<NamedRow>> {
    let sql = sql.to_string();
    let params = params.to_vec();
    run_on(Arc::clone(connection), move |conn| {
        Ok(codec::run_query_row(conn, &sql, &params)?)
    })
    .await
}

async fn prepare_on(connection: &SharedConnection, sql: &str) -> Result<Prepared> {
    let text = sql.to_string();
    run_on(Arc::clone(connection), move |conn| {
        conn.prepare_cached(&text)?;
        Ok(())
    })
    .await?;
    Ok(Prepared::new(sql))
}

/// Raw SQLite connection
pub struct SqliteConn {
    connection: SharedConnection,
    in_transaction: Arc<Mutex<bool>>,
}

impl SqliteConn {
    /// Create a new, unconnected instance
    pub fn new() -> Self {
        Self {
            connection: Arc::new(Mutex::new(None)),
            in_transaction: Arc::new(Mutex::new(false)),
        }
    }

    /// Open the database at the given path (`:memory:` for in-memory)
    pub async fn connect(&self, connection_string: &str) -> Result<()> {
        // Drop any existing connection and stale transaction state first.
        {
            let mut connection = self.connection.lock().await;
            *connection = None;
        }
        {
            let mut in_transaction = self.in_transaction.lock().await;
            *in_transaction = false;
        }

        let connection_string = connection_string.to_string();
        let connection = Arc::clone(&self.connection);

        let mut task = tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = Connection::open(&connection_string)?;
            conn.execute("PRAGMA foreign_keys = ON", [])?;

            let mut guard = connection.blocking_lock();
            *guard = Some(conn);
            Ok(())
        });

        tokio::select! {
            result = &mut task => {
                result.map_err(|e| SqlError::other(format!("task join error: {e}")))??
            }
            _ = tokio::time::sleep(DEFAULT_OPERATION_TIMEOUT) => {
                task.abort();
                return Err(SqlError::timeout(DEFAULT_OPERATION_TIMEOUT.as_millis() as u64));
            }
        }

        Ok(())
    }

    /// Check whether a connection is currently open
    pub fn is_connected(&self) -> bool {
        self.connection
            .try_lock()
            .map(|conn| conn.is_some())
            .unwrap_or(false)
    }
}

impl Default for SqliteConn {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecSql for SqliteConn {
    async fn exec(&self, sql: &str, params: &[SqlValue]) -> Result<Box<dyn ExecResult>> {
        exec_on(&self.connection, sql, params).await
    }
}

#[async_trait]
impl QuerySql for SqliteConn {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Box<dyn RowCursor>> {
        query_on(&self.connection, sql, params).await
    }
}

#[async_trait]
impl QueryRowSql for SqliteConn {
    async fn query_row(&self, sql: &str, params: &[SqlValue]) -> Result<Option<NamedRow>> {
        query_row_on(&self.connection, sql, params).await
    }
}

#[async_trait]
impl PrepareSql for SqliteConn {
    async fn prepare(&self, sql: &str) -> Result<Prepared> {
        prepare_on(&self.connection, sql).await
    }
}

#[async_trait]
impl PingSql for SqliteConn {
    async fn ping(&self) -> Result<()> {
        run_on(Arc::clone(&self.connection), |conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl CloseSql for SqliteConn {
    async fn close(&self) -> Result<()> {
        {
            let mut in_transaction = self.in_transaction.lock().await;
            *in_transaction = false;
        }
        let mut connection = self.connection.lock().await;
        *connection = None;
        Ok(())
    }
}

#[async_trait]
impl BeginTx for SqliteConn {
    type Tx = SqliteTx;

    async fn begin_tx(&self, opts: TxOptions) -> Result<SqliteTx> {
        let connection = Arc::clone(&self.connection);
        let in_transaction = Arc::clone(&self.in_transaction);
        let begin = codec::begin_sql(opts);

        let mut task = tokio::task::spawn_blocking(move || -> Result<()> {
            // Both locks taken together so the flag stays consistent with
            // the statement that set it.
            let mut flag = in_transaction.blocking_lock();
            let guard = connection.blocking_lock();
            let conn = guard
                .as_ref()
                .ok_or_else(|| SqlError::connection("not connected to database"))?;

            if *flag {
                return Err(SqlError::transaction("already in a transaction"));
            }

            conn.execute(begin, [])?;
            *flag = true;
            Ok(())
        });

        tokio::select! {
            result = &mut task => {
                result.map_err(|e| SqlError::other(format!("task join error: {e}")))??
            }
            _ = tokio::time::sleep(DEFAULT_OPERATION_TIMEOUT) => {
                task.abort();
                return Err(SqlError::timeout(DEFAULT_OPERATION_TIMEOUT.as_millis() as u64));
            }
        }

        Ok(SqliteTx {
            connection: Arc::clone(&self.connection),
            in_transaction: Arc::clone(&self.in_transaction),
            done: AtomicBool::new(false),
        })
    }
}

impl Drop for SqliteConn {
    fn drop(&mut self) {
        // Best-effort rollback of a transaction left open; Drop cannot be
        // async.
        if let Ok(in_trans) = self.in_transaction.try_lock() {
            if *in_trans {
                if let Ok(connection) = self.connection.try_lock() {
                    if let Some(conn) = connection.as_ref() {
                        let _ = conn.execute("ROLLBACK", []);
                    }
                }
            }
        }
    }
}

/// Active transaction on a raw SQLite connection
///
/// Issues statements against the same underlying connection that opened it.
/// The handle is finalized exactly once, through [`TxControl`]; dropping it
/// unfinalized rolls the transaction back as a safety net.
#[derive(Debug)]
pub struct SqliteTx {
    connection: SharedConnection,
    in_transaction: Arc<Mutex<bool>>,
    done: AtomicBool,
}

impl SqliteTx {
    async fn finalize(self, stmt: &'static str) -> Result<()> {
        self.done.store(true, Ordering::SeqCst);

        let connection = Arc::clone(&self.connection);
        let in_transaction = Arc::clone(&self.in_transaction);

        // The statement and flag update run under both locks, mirroring
        // begin_tx.
        let mut task = tokio::task::spawn_blocking(move || -> Result<()> {
            let mut flag = in_transaction.blocking_lock();
            let guard = connection.blocking_lock();
            let conn = guard
                .as_ref()
                .ok_or_else(|| SqlError::connection("not connected to database"))?;

            if !*flag {
                return Err(SqlError::transaction("not in a transaction"));
            }

            conn.execute(stmt, [])?;
            *flag = false;
            Ok(())
        });

        tokio::select! {
            result = &mut task => {
                result.map_err(|e| SqlError::other(format!("task join error: {e}")))?
            }
            _ = tokio::time::sleep(DEFAULT_OPERATION_TIMEOUT) => {
                task.abort();
                Err(SqlError::timeout(DEFAULT_OPERATION_TIMEOUT.as_millis() as u64))
            }
        }
    }
}

#[async_trait]
impl TxControl for SqliteTx {
    async fn commit(self) -> Result<()> {
        self.finalize("COMMIT").await
    }

    async fn rollback(self) -> Result<()> {
        self.finalize("ROLLBACK").await
    }
}

#[async_trait]
impl ExecSql for SqliteTx {
    async fn exec(&self, sql: &str, params: &[SqlValue]) -> Result<Box<dyn ExecResult>> {
        exec_on(&self.connection, sql, params).await
    }
}

#[async_trait]
impl QuerySql for SqliteTx {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Box<dyn RowCursor>> {
        query_on(&self.connection, sql, params).await
    }
}

#[async_trait]
impl QueryRowSql for SqliteTx {
    async fn query_row(&self, sql: &str, params: &[SqlValue]) -> Result<Option<NamedRow>> {
        query_row_on(&self.connection, sql, params).await
    }
}

#[async_trait]
impl PrepareSql for SqliteTx {
    async fn prepare(&self, sql: &str) -> Result<Prepared> {
        prepare_on(&self.connection, sql).await
    }
}

impl Drop for SqliteTx {
    fn drop(&mut self) {
        if self.done.load(Ordering::SeqCst) {
            return;
        }
        warn!("transaction dropped without commit or rollback, rolling back");
        if let (Ok(mut flag), Ok(connection)) = (
            self.in_transaction.try_lock(),
            self.connection.try_lock(),
        ) {
            if *flag {
                if let Some(conn) = connection.as_ref() {
                    let _ = conn.execute("ROLLBACK", []);
                }
                *flag = false;
            }
        }
    }
}
