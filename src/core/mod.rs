//! Core data-access types and traits
//!
//! This module provides the driver-agnostic building blocks: capability
//! interfaces for connection-like objects, the execution and row-set
//! scanning wrappers, the transaction finalizer, and the value and error
//! types they share.

pub mod conn;
pub mod error;
pub mod exec;
pub mod rows;
pub mod tx;
pub mod value;

// Re-export commonly used types
pub use conn::{
    BeginTx, CloseSql, ExecSql, IsolationLevel, PingSql, Prepared, PrepareSql, QueryRowSql,
    QuerySql, SqlConn, SqlTxConn, TxOptions,
};
pub use error::{Result, SqlError};
pub use exec::{ExecResult, ExecScan};
pub use rows::{BufferedCursor, RowCursor, RowScan, ScanFlow, SqlRow};
pub use tx::{end_tx, TxControl};
pub use value::{FromSqlValue, NamedRow, SqlDest, SqlValue};
