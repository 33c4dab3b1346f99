//! Concrete driver backends
//!
//! This module proves the capability contracts against a real driver: a raw
//! SQLite connection, a pooled SQLite connection, and the transaction
//! handles both produce all satisfy the statement capabilities and are
//! interchangeable to scanning code.

#[cfg(feature = "sqlite")]
pub mod pooled_sqlite;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use pooled_sqlite::{PoolConfig, PoolStats, PooledSqlite, PooledSqliteTx};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteConn, SqliteTx};

#[cfg(feature = "sqlite")]
pub(crate) mod codec {
    //! Conversions between driver values and [`SqlValue`], shared by the
    //! raw and pooled backends.

    use rusqlite::{params_from_iter, Connection, Row, ToSql};

    use crate::core::conn::{IsolationLevel, TxOptions};
    use crate::core::error::{Result, SqlError};
    use crate::core::exec::ExecResult;
    use crate::core::rows::BufferedCursor;
    use crate::core::value::{NamedRow, SqlValue};

    /// Execution outcome of a SQLite statement
    #[derive(Debug)]
    pub struct SqliteExecOutcome {
        rows_affected: i64,
        last_insert_id: i64,
    }

    impl ExecResult for SqliteExecOutcome {
        fn rows_affected(&self) -> Result<i64> {
            Ok(self.rows_affected)
        }

        fn last_insert_id(&self) -> Result<i64> {
            // A rowid of zero means no insert ever ran on this connection.
            if self.last_insert_id == 0 {
                return Err(SqlError::unsupported("statement produced no insert id"));
            }
            Ok(self.last_insert_id)
        }
    }

    /// Convert a [`SqlValue`] to a driver parameter
    pub fn value_to_param(value: &SqlValue) -> Box<dyn ToSql> {
        match value {
            SqlValue::Null => Box::new(None::<i64>),
            SqlValue::Bool(v) => Box::new(*v),
            SqlValue::Long(v) => Box::new(*v),
            SqlValue::Double(v) => Box::new(*v),
            SqlValue::Text(v) => Box::new(v.clone()),
            SqlValue::Bytes(v) => Box::new(v.clone()),
        }
    }

    /// Decode one driver row into owned values, in column order
    pub fn decode_row(row: &Row<'_>) -> rusqlite::Result<Vec<SqlValue>> {
        let column_count = row.as_ref().column_count();
        let mut values = Vec::with_capacity(column_count);

        for i in 0..column_count {
            let value = match row.get_ref(i)? {
                rusqlite::types::ValueRef::Null => SqlValue::Null,
                rusqlite::types::ValueRef::Integer(v) => SqlValue::Long(v),
                rusqlite::types::ValueRef::Real(v) => SqlValue::Double(v),
                rusqlite::types::ValueRef::Text(v) => {
                    SqlValue::Text(String::from_utf8_lossy(v).to_string())
                }
                rusqlite::types::ValueRef::Blob(v) => SqlValue::Bytes(v.to_vec()),
            };
            values.push(value);
        }

        Ok(values)
    }

    /// Decode one driver row keyed by column name
    pub fn decode_named_row(row: &Row<'_>) -> rusqlite::Result<NamedRow> {
        let column_count = row.as_ref().column_count();
        let mut named = NamedRow::with_capacity(column_count);
        let values = decode_row(row)?;

        for (i, value) in values.into_iter().enumerate() {
            let name = row.as_ref().column_name(i)?.to_string();
            named.insert(name, value);
        }

        Ok(named)
    }

    /// Execute a non-row-returning statement through the prepared cache
    pub fn run_exec(
        conn: &Connection,
        sql: &str,
        params: &[SqlValue],
    ) -> rusqlite::Result<SqliteExecOutcome> {
        let params: Vec<Box<dyn ToSql>> = params.iter().map(value_to_param).collect();
        let mut stmt = conn.prepare_cached(sql)?;
        let affected = stmt.execute(params_from_iter(params))?;

        Ok(SqliteExecOutcome {
            rows_affected: affected as i64,
            last_insert_id: conn.last_insert_rowid(),
        })
    }

    /// Run a query, materializing its full result set into a cursor
    pub fn run_query(
        conn: &Connection,
        sql: &str,
        params: &[SqlValue],
    ) -> rusqlite::Result<BufferedCursor> {
        let params: Vec<Box<dyn ToSql>> = params.iter().map(value_to_param).collect();
        let mut stmt = conn.prepare_cached(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

        let mut out = Vec::new();
        let mut rows = stmt.query(params_from_iter(params))?;
        while let Some(row) = rows.next()? {
            out.push(decode_row(row)?);
        }

        Ok(BufferedCursor::new(columns, out))
    }

    /// Run a query expected to match at most one row
    pub fn run_query_row(
        conn: &Connection,
        sql: &str,
        params: &[SqlValue],
    ) -> rusqlite::Result<Option<NamedRow>> {
        let params: Vec<Box<dyn ToSql>> = params.iter().map(value_to_param).collect();
        let mut stmt = conn.prepare_cached(sql)?;

        let mut rows = stmt.query(params_from_iter(params))?;
        match rows.next()? {
            Some(row) => Ok(Some(decode_named_row(row)?)),
            None => Ok(None),
        }
    }

    /// Opening statement for a transaction with the given options
    ///
    /// SQLite transactions are always serializable; the isolation request
    /// only picks the lock acquisition strategy, and `read_only` is
    /// advisory.
    pub fn begin_sql(opts: TxOptions) -> &'static str {
        match opts.isolation {
            IsolationLevel::Default => "BEGIN DEFERRED",
            IsolationLevel::Serializable => "BEGIN EXCLUSIVE",
            _ => "BEGIN IMMEDIATE",
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_begin_sql_mapping() {
            assert_eq!(begin_sql(TxOptions::default()), "BEGIN DEFERRED");
            assert_eq!(
                begin_sql(TxOptions::new().with_isolation(IsolationLevel::Serializable)),
                "BEGIN EXCLUSIVE"
            );
            assert_eq!(
                begin_sql(TxOptions::new().with_isolation(IsolationLevel::ReadCommitted)),
                "BEGIN IMMEDIATE"
            );
        }

        #[test]
        fn test_exec_outcome_zero_rowid_is_unsupported() {
            let outcome = SqliteExecOutcome {
                rows_affected: 3,
                last_insert_id: 0,
            };
            assert_eq!(outcome.rows_affected().unwrap(), 3);
            assert!(matches!(
                outcome.last_insert_id(),
                Err(SqlError::Unsupported(_))
            ));
        }
    }
}
