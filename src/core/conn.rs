//! Capability interfaces for connection-like objects
//!
//! Each trait names exactly one operation a connection-like object may
//! support. A raw connection, a pooled connection, and an active transaction
//! all satisfy the same statement capabilities and are interchangeable to
//! callers; only connections additionally open transactions, answer pings,
//! and close. Conformance is structural: a type satisfies a composite trait
//! if and only if it implements the parts, checked at compile time.

use async_trait::async_trait;

use super::error::Result;
use super::exec::ExecResult;
use super::rows::RowCursor;
use super::tx::TxControl;
use super::value::{NamedRow, SqlValue};

/// Transaction isolation level requested at open time
///
/// Drivers map unsupported levels to the nearest stronger one they offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IsolationLevel {
    /// Driver default
    #[default]
    Default,
    /// Read committed
    ReadCommitted,
    /// Repeatable read
    RepeatableRead,
    /// Serializable
    Serializable,
}

/// Options for opening a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxOptions {
    /// Requested isolation level
    pub isolation: IsolationLevel,
    /// Whether the transaction is read-only
    pub read_only: bool,
}

impl TxOptions {
    /// Create options with driver defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the isolation level
    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    /// Mark the transaction read-only
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

/// A statement validated (and typically cached) by the driver
///
/// The token carries the statement text; passing it back to `exec` or
/// `query` hits the driver's prepared-statement cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepared {
    sql: String,
}

impl Prepared {
    /// Wrap an already-validated statement
    pub fn new<S: Into<String>>(sql: S) -> Self {
        Self { sql: sql.into() }
    }

    /// The statement text
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// Capability: open a transaction
#[async_trait]
pub trait BeginTx: Send + Sync {
    /// The transaction handle this object produces
    type Tx: TxControl + ExecSql + PrepareSql + QuerySql + QueryRowSql;

    /// Begin a transaction with the given options
    async fn begin_tx(&self, opts: TxOptions) -> Result<Self::Tx>;
}

/// Capability: execute a non-row-returning statement
#[async_trait]
pub trait ExecSql: Send + Sync {
    /// Execute a statement with parameters, returning the execution outcome
    ///
    /// The outcome is usually wrapped immediately:
    ///
    /// ```ignore
    /// let mut affected = 0i64;
    /// ExecScan::from(conn.exec("DELETE FROM users WHERE id = ?", &[id.into()]).await)
    ///     .scan(Some(&mut affected), None)?;
    /// ```
    async fn exec(&self, sql: &str, params: &[SqlValue]) -> Result<Box<dyn ExecResult>>;
}

/// Capability: verify liveness
#[async_trait]
pub trait PingSql: Send + Sync {
    /// Check that the underlying connection is alive
    async fn ping(&self) -> Result<()>;
}

/// Capability: prepare a statement
#[async_trait]
pub trait PrepareSql: Send + Sync {
    /// Validate a statement against the driver and return its token
    async fn prepare(&self, sql: &str) -> Result<Prepared>;
}

/// Capability: issue a query returning a multi-row cursor
#[async_trait]
pub trait QuerySql: Send + Sync {
    /// Run a query and return its forward-only cursor
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Box<dyn RowCursor>>;
}

/// Capability: issue a query returning at most one row
#[async_trait]
pub trait QueryRowSql: Send + Sync {
    /// Run a query expected to match at most one row; `Ok(None)` when none did
    async fn query_row(&self, sql: &str, params: &[SqlValue]) -> Result<Option<NamedRow>>;
}

/// Capability: release the underlying resource
#[async_trait]
pub trait CloseSql: Send + Sync {
    /// Close the connection-like object
    async fn close(&self) -> Result<()>;
}

/// The statement capabilities shared by connections and transactions
pub trait SqlTxConn: ExecSql + PrepareSql + QuerySql + QueryRowSql {}

impl<T: ExecSql + PrepareSql + QuerySql + QueryRowSql + ?Sized> SqlTxConn for T {}

/// The full capability set of a connection (raw or pooled)
pub trait SqlConn: SqlTxConn + BeginTx + PingSql + CloseSql {}

impl<T: SqlTxConn + BeginTx + PingSql + CloseSql + ?Sized> SqlConn for T {}
