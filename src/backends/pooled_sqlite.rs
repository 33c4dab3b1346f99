//! Pooled SQLite backend
//!
//! Wraps deadpool-sqlite. Statements run on whichever pool member is free;
//! transactions pin one member for their whole lifetime so every statement
//! in the unit of work sees the same connection.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_sqlite::{Config, Object, Pool, Runtime};
use rusqlite::Connection;
use tracing::{error, warn};

use super::codec;
use crate::core::conn::{
    BeginTx, CloseSql, ExecSql, PingSql, Prepared, PrepareSql, QueryRowSql, QuerySql, TxOptions,
};
use crate::core::error::{Result, SqlError};
use crate::core::exec::ExecResult;
use crate::core::rows::RowCursor;
use crate::core::tx::TxControl;
use crate::core::value::{NamedRow, SqlValue};

/// Pool tuning knobs
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections held by the pool
    pub max_size: usize,
    /// How long to wait for a free connection
    pub acquire_timeout: Duration,
    /// How long a single statement may run
    pub operation_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            acquire_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(30),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

/// Point-in-time pool statistics
#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    pub max_size: usize,
    pub size: usize,
    pub available: usize,
    pub in_use: usize,
}

/// Run a closure on a pooled connection, bounded by the operation timeout
async fn interact_on<T, F>(conn: &Object, timeout: Duration, f: F) -> Result<T>
where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::time::timeout(timeout, conn.interact(f))
        .await
        .map_err(|_| SqlError::timeout(timeout.as_millis() as u64))?
        .map_err(|e| SqlError::other(format!("interact error: {e}")))?
}

async fn exec_on(
    conn: &Object,
    timeout: Duration,
    sql: &str,
    params: &[SqlValue],
) -> Result<Box<dyn ExecResult>> {
    let sql = sql.to_string();
    let params = params.to_vec();
    interact_on(conn, timeout, move |conn| {
        let outcome = codec::run_exec(conn, &sql, &params)?;
        Ok(Box::new(outcome) as Box<dyn ExecResult>)
    })
    .await
}

async fn query_on(
    conn: &Object,
    timeout: Duration,
    sql: &str,
    params: &[SqlValue],
) -> Result<Box<dyn RowCursor>> {
    let sql = sql.to_string();
    let params = params.to_vec();
    interact_on(conn, timeout, move |conn| {
        let cursor = codec::run_query(conn, &sql, &params)?;
        Ok(Box::new(cursor) as Box<dyn RowCursor>)
    })
    .await
}

async fn query_row_on(
    conn: &Object,
    timeout: Duration,
    sql: &str,
    params: &[SqlValue],
) -> Result<Option<NamedRow>> {
    let sql = sql.to_string();
    let params = params.to_vec();
    interact_on(conn, timeout, move |conn| {
        Ok(codec::run_query_row(conn, &sql, &params)?)
    })
    .await
}

async fn prepare_on(conn: &Object, timeout: Duration, sql: &str) -> Result<Prepared> {
    let text = sql.to_string();
    interact_on(conn, timeout, move |conn| {
        conn.prepare_cached(&text)?;
        Ok(())
    })
    .await?;
    Ok(Prepared::new(sql))
}

/// SQLite access through a connection pool
pub struct PooledSqlite {
    pool: Pool,
    acquire_timeout: Duration,
    operation_timeout: Duration,
}

impl PooledSqlite {
    /// Open a pool for the given path with default settings
    pub async fn connect(connection_string: &str) -> Result<Self> {
        Self::with_config(connection_string, PoolConfig::default()).await
    }

    /// Open a pool for the given path
    pub async fn with_config(connection_string: &str, config: PoolConfig) -> Result<Self> {
        let pool = Config::new(connection_string)
            .create_pool(Runtime::Tokio1)
            .map_err(|e| SqlError::connection(format!("pool create: {e}")))?;
        pool.resize(config.max_size);

        let db = Self {
            pool,
            acquire_timeout: config.acquire_timeout,
            operation_timeout: config.operation_timeout,
        };

        // Validate the pool early and set connection pragmas.
        let conn = db.acquire().await?;
        interact_on(&conn, db.operation_timeout, |conn| {
            conn.execute("PRAGMA foreign_keys = ON", [])?;
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
            Ok(())
        })
        .await?;

        Ok(db)
    }

    async fn acquire(&self) -> Result<Object> {
        tokio::time::timeout(self.acquire_timeout, self.pool.get())
            .await
            .map_err(|_| SqlError::timeout(self.acquire_timeout.as_millis() as u64))?
            .map_err(|e| SqlError::connection(format!("pool get: {e}")))
    }

    /// Snapshot of the pool's current state
    pub fn stats(&self) -> PoolStats {
        let status = self.pool.status();
        PoolStats {
            max_size: status.max_size,
            size: status.size,
            available: status.available,
            in_use: status.size.saturating_sub(status.available),
        }
    }
}

#[async_trait]
impl ExecSql for PooledSqlite {
    async fn exec(&self, sql: &str, params: &[SqlValue]) -> Result<Box<dyn ExecResult>> {
        let conn = self.acquire().await?;
        exec_on(&conn, self.operation_timeout, sql, params).await
    }
}

#[async_trait]
impl QuerySql for PooledSqlite {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Box<dyn RowCursor>> {
        let conn = self.acquire().await?;
        query_on(&conn, self.operation_timeout, sql, params).await
    }
}

#[async_trait]
impl QueryRowSql for PooledSqlite {
    async fn query_row(&self, sql: &str, params: &[SqlValue]) -> Result<Option<NamedRow>> {
        let conn = self.acquire().await?;
        query_row_on(&conn, self.operation_timeout, sql, params).await
    }
}

#[async_trait]
impl PrepareSql for PooledSqlite {
    async fn prepare(&self, sql: &str) -> Result<Prepared> {
        let conn = self.acquire().await?;
        prepare_on(&conn, self.operation_timeout, sql).await
    }
}

#[async_trait]
impl PingSql for PooledSqlite {
    async fn ping(&self) -> Result<()> {
        let conn = self.acquire().await?;
        interact_on(&conn, self.operation_timeout, |conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl CloseSql for PooledSqlite {
    async fn close(&self) -> Result<()> {
        self.pool.close();
        Ok(())
    }
}

#[async_trait]
impl BeginTx for PooledSqlite {
    type Tx = PooledSqliteTx;

    async fn begin_tx(&self, opts: TxOptions) -> Result<PooledSqliteTx> {
        let conn = self.acquire().await?;
        let begin = codec::begin_sql(opts);

        interact_on(&conn, self.operation_timeout, move |conn| {
            conn.execute(begin, [])?;
            Ok(())
        })
        .await?;

        Ok(PooledSqliteTx {
            connection: Some(conn),
            operation_timeout: self.operation_timeout,
        })
    }
}

/// Transaction pinned to one pooled connection
///
/// Holds its pool member for the duration of the transaction; finalizing
/// releases it back to the pool.
pub struct PooledSqliteTx {
    connection: Option<Object>,
    operation_timeout: Duration,
}

impl PooledSqliteTx {
    fn connection(&self) -> Result<&Object> {
        self.connection
            .as_ref()
            .ok_or(SqlError::InvalidTransaction)
    }

    async fn finalize(mut self, stmt: &'static str) -> Result<()> {
        let conn = self
            .connection
            .take()
            .ok_or(SqlError::InvalidTransaction)?;
        interact_on(&conn, self.operation_timeout, move |conn| {
            conn.execute(stmt, [])?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl TxControl for PooledSqliteTx {
    async fn commit(self) -> Result<()> {
        self.finalize("COMMIT").await
    }

    async fn rollback(self) -> Result<()> {
        self.finalize("ROLLBACK").await
    }
}

#[async_trait]
impl ExecSql for PooledSqliteTx {
    async fn exec(&self, sql: &str, params: &[SqlValue]) -> Result<Box<dyn ExecResult>> {
        exec_on(self.connection()?, self.operation_timeout, sql, params).await
    }
}

#[async_trait]
impl QuerySql for PooledSqliteTx {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Box<dyn RowCursor>> {
        query_on(self.connection()?, self.operation_timeout, sql, params).await
    }
}

#[async_trait]
impl QueryRowSql for PooledSqliteTx {
    async fn query_row(&self, sql: &str, params: &[SqlValue]) -> Result<Option<NamedRow>> {
        query_row_on(self.connection()?, self.operation_timeout, sql, params).await
    }
}

#[async_trait]
impl PrepareSql for PooledSqliteTx {
    async fn prepare(&self, sql: &str) -> Result<Prepared> {
        prepare_on(self.connection()?, self.operation_timeout, sql).await
    }
}

impl Drop for PooledSqliteTx {
    fn drop(&mut self) {
        if let Some(conn) = self.connection.take() {
            warn!("pooled transaction dropped without commit or rollback, rolling back");
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        let _ = conn.interact(|conn| conn.execute("ROLLBACK", [])).await;
                    });
                }
                Err(_) => {
                    // Without a runtime there is no way to roll back, and
                    // returning the member would hand its open transaction
                    // to the next user. Detach it so closing the connection
                    // discards the transaction instead.
                    error!(
                        "pooled transaction dropped outside a runtime, discarding pool member"
                    );
                    drop(Object::take(conn));
                }
            }
        }
    }
}
