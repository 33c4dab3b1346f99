//! Transaction finalization
//!
//! [`end_tx`] resolves an active transaction exactly once, committing or
//! rolling back based on the outcome of the unit of work performed under it,
//! and folds the finalization's own failure into the caller's error path.

use async_trait::async_trait;
use tracing::error;

use super::error::{Result, SqlError};

/// Terminal operations of an active transaction
///
/// Both operations consume the handle, so a transaction cannot be finalized
/// twice and a finalized handle cannot issue further statements through a
/// stale reference to it.
#[async_trait]
pub trait TxControl: Send {
    /// Make the transaction's effects durable
    async fn commit(self) -> Result<()>;

    /// Discard the transaction's effects
    async fn rollback(self) -> Result<()>;
}

/// Resolve a transaction against the outcome of its unit of work
///
/// Intended as the single scoped cleanup of a transactional block:
///
/// ```ignore
/// let tx = conn.begin_tx(TxOptions::default()).await.ok();
/// let outcome = do_work(tx.as_ref().unwrap()).await;
/// let value = end_tx(tx, outcome).await?;
/// ```
///
/// Rules, in order:
/// - no handle: [`SqlError::InvalidTransaction`], regardless of the
///   outcome, since finalizing without a transaction is a programming
///   error;
/// - failed outcome: rollback is attempted, its own failure is logged but
///   never masks the original error, which is returned verbatim;
/// - clean outcome: commit; a commit failure becomes the final error,
///   otherwise the carried value is returned.
pub async fn end_tx<T, R>(tx: Option<T>, outcome: Result<R>) -> Result<R>
where
    T: TxControl,
{
    let tx = match tx {
        Some(tx) => tx,
        None => {
            error!("end tx: no transaction handle");
            return Err(SqlError::InvalidTransaction);
        }
    };

    match outcome {
        Err(err) => {
            match tx.rollback().await {
                Ok(()) => error!(error = %err, "end tx: rolled back"),
                Err(rollback_err) => {
                    error!(error = %err, rollback_error = %rollback_err, "end tx: rollback failed")
                }
            }
            Err(err)
        }
        Ok(value) => {
            if let Err(err) = tx.commit().await {
                error!(error = %err, "end tx: commit failed");
                return Err(err);
            }
            Ok(value)
        }
    }
}
