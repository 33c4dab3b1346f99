//! # sqlbridge
//!
//! Driver-agnostic SQL data access built from three pieces:
//!
//! - **Capability traits** ([`ExecSql`], [`QuerySql`], [`QueryRowSql`],
//!   [`PrepareSql`], [`BeginTx`], [`PingSql`], [`CloseSql`]) that raw
//!   connections, pooled connections, and open transactions all satisfy,
//!   so calling code can be written once against whichever capability
//!   set it needs.
//! - **Scanning wrappers** ([`ExecScan`], [`RowScan`]) that turn a driver
//!   outcome into populated destinations with one uniform error surface.
//! - **A transaction finalizer** ([`end_tx`]) that maps a unit of work's
//!   outcome onto commit or rollback and always reports the most useful
//!   error.
//!
//! ## Quick start
//!
//! ```no_run
//! use sqlbridge::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let db = SqliteConn::new();
//!     db.connect(":memory:").await?;
//!
//!     ExecScan::from(db.exec("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", &[]).await)
//!         .scan(None, None)?;
//!
//!     let mut id = 0i64;
//!     ExecScan::from(db.exec("INSERT INTO users (name) VALUES (?)", &["alice".into()]).await)
//!         .scan(None, Some(&mut id))?;
//!
//!     let mut names = Vec::new();
//!     RowScan::from(db.query("SELECT name FROM users", &[]).await).scan(|_, row| {
//!         let mut name = String::new();
//!         row.read(&mut [&mut name as SqlDest])?;
//!         names.push(name);
//!         Ok(ScanFlow::Taken)
//!     })?;
//!
//!     let tx = db.begin_tx(TxOptions::default()).await?;
//!     let outcome = ExecScan::from(
//!         tx.exec("UPDATE users SET name = ? WHERE id = ?", &["bob".into(), id.into()]).await,
//!     )
//!     .scan(None, None);
//!     end_tx(Some(tx), outcome).await?;
//!
//!     db.close().await
//! }
//! ```

pub mod core;

#[cfg(feature = "sqlite")]
pub mod backends;

pub use crate::core::conn::{
    BeginTx, CloseSql, ExecSql, IsolationLevel, PingSql, Prepared, PrepareSql, QueryRowSql,
    QuerySql, SqlConn, SqlTxConn, TxOptions,
};
pub use crate::core::error::{Result, SqlError};
pub use crate::core::exec::{ExecResult, ExecScan};
pub use crate::core::rows::{BufferedCursor, RowCursor, RowScan, ScanFlow, SqlRow};
pub use crate::core::tx::{end_tx, TxControl};
pub use crate::core::value::{FromSqlValue, NamedRow, SqlDest, SqlValue};

#[cfg(feature = "sqlite")]
pub use crate::backends::{PoolConfig, PoolStats, PooledSqlite, PooledSqliteTx, SqliteConn, SqliteTx};

/// Common imports for working with the crate
pub mod prelude {
    pub use crate::core::conn::{
        BeginTx, CloseSql, ExecSql, IsolationLevel, PingSql, Prepared, PrepareSql, QueryRowSql,
        QuerySql, SqlConn, SqlTxConn, TxOptions,
    };
    pub use crate::core::error::{Result, SqlError};
    pub use crate::core::exec::{ExecResult, ExecScan};
    pub use crate::core::rows::{RowCursor, RowScan, ScanFlow, SqlRow};
    pub use crate::core::tx::{end_tx, TxControl};
    pub use crate::core::value::{FromSqlValue, NamedRow, SqlDest, SqlValue};

    #[cfg(feature = "sqlite")]
    pub use crate::backends::{PoolConfig, PooledSqlite, SqliteConn};
}
