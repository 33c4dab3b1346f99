//! Execution outcome scanning
//!
//! [`ExecScan`] adapts the raw outcome of an `exec`-style call, the pairing
//! of an optional result handle and an optional error, into a single `scan`
//! that extracts rows-affected and last-insert-id with defined failure
//! semantics. The outcome is consumed exactly once.

use tracing::{error, warn};

use super::error::{Result, SqlError};

/// Driver-agnostic view of a statement-execution outcome
pub trait ExecResult: Send + std::fmt::Debug {
    /// Number of rows affected by the statement
    fn rows_affected(&self) -> Result<i64>;

    /// Identifier generated by the statement, where the driver supports it
    fn last_insert_id(&self) -> Result<i64>;
}

/// Wrapper over an execution outcome, consumed once via [`ExecScan::scan`]
pub struct ExecScan {
    result: Option<Box<dyn ExecResult>>,
    err: Option<SqlError>,
}

impl ExecScan {
    /// Wrap a raw (result handle, error) pairing
    ///
    /// An absent handle with no error is a valid input and scans as
    /// [`SqlError::DataNotFound`].
    pub fn new(result: Option<Box<dyn ExecResult>>, err: Option<SqlError>) -> Self {
        Self { result, err }
    }

    /// Extract execution statistics from the wrapped outcome
    ///
    /// Either out-slot may be `None` if the caller does not want that value.
    /// An exec that affected zero rows scans as [`SqlError::DataNotFound`];
    /// the targeted row did not exist, which is not success. The
    /// last-insert-id lookup is best-effort: a failure there is logged and
    /// the slot left untouched, but the call still succeeds.
    pub fn scan(
        self,
        rows_affected: Option<&mut i64>,
        last_insert_id: Option<&mut i64>,
    ) -> Result<()> {
        if let Some(err) = self.err {
            error!(error = %err, "exec scan: wrapped error");
            return Err(err);
        }

        let result = match self.result {
            Some(result) => result,
            None => {
                error!("exec scan: result handle is absent");
                return Err(SqlError::DataNotFound);
            }
        };

        if let Some(out) = rows_affected {
            let n = match result.rows_affected() {
                Ok(n) => n,
                Err(err) => {
                    error!(error = %err, "exec scan: rows affected read failed");
                    return Err(err);
                }
            };
            if n < 1 {
                error!("exec scan: zero rows affected");
                return Err(SqlError::DataNotFound);
            }
            *out = n;
        }

        if let Some(out) = last_insert_id {
            match result.last_insert_id() {
                Ok(id) => *out = id,
                // Non-fatal: many statement shapes and drivers cannot
                // produce this value.
                Err(err) => warn!(error = %err, "exec scan: last insert id unavailable"),
            }
        }

        Ok(())
    }
}

impl From<Result<Box<dyn ExecResult>>> for ExecScan {
    fn from(outcome: Result<Box<dyn ExecResult>>) -> Self {
        match outcome {
            Ok(result) => Self::new(Some(result), None),
            Err(err) => Self::new(None, Some(err)),
        }
    }
}
