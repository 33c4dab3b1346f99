//! Error types for the data-access core
//!
//! Every failure this layer can report is a variant of [`SqlError`]. The four
//! sentinel kinds (`DataNotFound`, `NoColumnReturned`, `InvalidArguments`,
//! `InvalidTransaction`) are part of the scanning and finalization contracts;
//! driver errors pass through verbatim so callers can still match on the
//! underlying condition.

/// Result type alias for data-access operations
pub type Result<T> = std::result::Result<T, SqlError>;

/// Error types for data-access operations
#[derive(Debug, thiserror::Error)]
pub enum SqlError {
    /// A row or result was expected but absent, or an exec affected zero rows
    #[error("data not found")]
    DataNotFound,

    /// A query produced a cursor with zero columns
    #[error("no columns returned")]
    NoColumnReturned,

    /// Destination count did not match the column count for a scanned row
    #[error("invalid arguments for scan: [{columns}] columns on [{destinations}] destinations")]
    InvalidArguments { columns: usize, destinations: usize },

    /// Transaction finalization was attempted without a valid handle
    #[error("invalid transaction")]
    InvalidTransaction,

    /// A column value could not be converted into its destination
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// The cursor was already consumed or released
    #[error("cursor is closed")]
    CursorClosed,

    /// Connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// Transaction error
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Operation timeout
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Unsupported operation
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// SQLite driver error, passed through verbatim
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl SqlError {
    /// Create an invalid-arguments error carrying both lengths
    pub fn invalid_arguments(columns: usize, destinations: usize) -> Self {
        SqlError::InvalidArguments {
            columns,
            destinations,
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(expected: &'static str, actual: &'static str) -> Self {
        SqlError::TypeMismatch { expected, actual }
    }

    /// Create a new connection error
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        SqlError::Connection(msg.into())
    }

    /// Create a new transaction error
    pub fn transaction<S: Into<String>>(msg: S) -> Self {
        SqlError::Transaction(msg.into())
    }

    /// Create an operation timeout error
    pub fn timeout(timeout_ms: u64) -> Self {
        SqlError::Timeout { timeout_ms }
    }

    /// Create a new unsupported operation error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        SqlError::Unsupported(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        SqlError::Other(msg.into())
    }

    /// Whether this error is the not-found sentinel
    pub fn is_not_found(&self) -> bool {
        matches!(self, SqlError::DataNotFound)
    }
}
