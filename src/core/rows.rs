//! Row-set scanning
//!
//! [`RowScan`] adapts the raw outcome of a query, the pairing of an optional
//! row cursor and an optional error, into a single `scan` that streams rows
//! to a caller-supplied callback. The callback is invoked with a zero-based
//! logical row index and a per-row handle; it binds destinations through the
//! handle and steers iteration with a [`ScanFlow`] sentinel. The cursor is
//! released on every exit path.

use std::collections::VecDeque;

use tracing::{error, warn};

use super::error::{Result, SqlError};
use super::value::{SqlDest, SqlValue};

/// A forward-only, exclusively-owned iterator over a query's rows
///
/// The cursor is owned by the [`RowScan`] that consumes it and must not be
/// shared; once released it stays unusable and surfaces
/// [`SqlError::CursorClosed`] rather than panicking.
pub trait RowCursor: Send {
    /// Column names of the result set, in order
    fn columns(&self) -> Result<Vec<String>>;

    /// Advance to the next row; `Ok(false)` on clean exhaustion
    fn advance(&mut self) -> Result<bool>;

    /// Decode the current row's columns into the destinations, one per column
    fn read_current(&mut self, dests: &mut [SqlDest<'_>]) -> Result<()>;

    /// Terminal error recorded by the driver, if any
    ///
    /// Checked by the scanner before the first row and before each
    /// subsequent one, so a cursor that failed mid-stream stops iteration
    /// instead of being advanced past its error.
    fn take_error(&mut self) -> Option<SqlError>;

    /// Release the cursor; idempotent
    fn close(&mut self) -> Result<()>;
}

/// Decision returned by the row callback for each row under consideration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanFlow {
    /// End iteration; the current row's values are left unread
    Stop,
    /// Pass over the current row without binding; the logical index does
    /// not advance
    Skip,
    /// The row was bound; advance the logical index
    Taken,
}

/// Per-row handle passed to the scan callback
///
/// The logical index the callback receives counts `Taken` rows only, so a
/// callback that skips rows tracks physical position on its own if it needs
/// it.
pub struct SqlRow<'c> {
    cursor: &'c mut dyn RowCursor,
    columns: usize,
}

impl SqlRow<'_> {
    /// Number of columns in the result set
    pub fn column_count(&self) -> usize {
        self.columns
    }

    /// Bind the current row's values into the destinations
    ///
    /// The destination count must equal the column count; a mismatch is an
    /// [`SqlError::InvalidArguments`] carrying both lengths, reported before
    /// any value is bound.
    pub fn read(&mut self, dests: &mut [SqlDest<'_>]) -> Result<()> {
        if dests.len() != self.columns {
            let err = SqlError::invalid_arguments(self.columns, dests.len());
            error!(error = %err, "row scan: destination count mismatch");
            return Err(err);
        }
        self.cursor.read_current(dests)
    }
}

/// Wrapper over a query outcome, consumed once via [`RowScan::scan`]
pub struct RowScan {
    cursor: Option<Box<dyn RowCursor>>,
    err: Option<SqlError>,
}

impl RowScan {
    /// Wrap a raw (cursor, error) pairing
    ///
    /// An absent cursor with no error scans as [`SqlError::DataNotFound`].
    pub fn new(cursor: Option<Box<dyn RowCursor>>, err: Option<SqlError>) -> Self {
        Self { cursor, err }
    }

    /// Stream rows to the callback
    ///
    /// For each physical row the callback receives the logical row index
    /// and a [`SqlRow`] handle. Returning [`ScanFlow::Stop`] ends iteration
    /// cleanly without touching the current row; [`ScanFlow::Skip`] leaves
    /// the row unbound and keeps the logical index unchanged;
    /// [`ScanFlow::Taken`] acknowledges a bound row. Errors raised inside
    /// the callback (including [`SqlRow::read`] failures) abort the scan.
    ///
    /// The cursor is released before this method returns, on success and on
    /// every error path.
    pub fn scan<F>(self, mut next_row: F) -> Result<()>
    where
        F: FnMut(usize, &mut SqlRow<'_>) -> Result<ScanFlow>,
    {
        if let Some(err) = self.err {
            error!(error = %err, "row scan: wrapped error");
            return Err(err);
        }

        let mut cursor = match self.cursor {
            Some(cursor) => cursor,
            None => {
                error!("row scan: cursor is absent");
                return Err(SqlError::DataNotFound);
            }
        };

        let result = consume(cursor.as_mut(), &mut next_row);
        if let Err(err) = cursor.close() {
            warn!(error = %err, "row scan: cursor close failed");
        }
        result
    }
}

impl From<Result<Box<dyn RowCursor>>> for RowScan {
    fn from(outcome: Result<Box<dyn RowCursor>>) -> Self {
        match outcome {
            Ok(cursor) => Self::new(Some(cursor), None),
            Err(err) => Self::new(None, Some(err)),
        }
    }
}

fn consume<F>(cursor: &mut dyn RowCursor, next_row: &mut F) -> Result<()>
where
    F: FnMut(usize, &mut SqlRow<'_>) -> Result<ScanFlow>,
{
    // Fail fast on a cursor already in an error state, before consuming.
    if let Some(err) = cursor.take_error() {
        error!(error = %err, "row scan: cursor in error state");
        return Err(err);
    }

    let columns = match cursor.columns() {
        Ok(columns) => columns,
        Err(err) => {
            error!(error = %err, "row scan: columns unavailable");
            return Err(err);
        }
    };
    if columns.is_empty() {
        // A statement producing no columns is a configuration error, not an
        // empty result.
        error!("row scan: no columns returned");
        return Err(SqlError::NoColumnReturned);
    }
    let column_count = columns.len();

    let mut idx = 0usize;
    loop {
        if let Some(err) = cursor.take_error() {
            error!(error = %err, "row scan: cursor error while iterating");
            return Err(err);
        }

        match cursor.advance() {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => {
                error!(error = %err, "row scan: advance failed");
                return Err(err);
            }
        }

        let mut row = SqlRow {
            cursor: &mut *cursor,
            columns: column_count,
        };
        match next_row(idx, &mut row) {
            Ok(ScanFlow::Stop) => return Ok(()),
            Ok(ScanFlow::Skip) => continue,
            Ok(ScanFlow::Taken) => idx += 1,
            Err(err) => {
                error!(error = %err, "row scan: row callback failed");
                return Err(err);
            }
        }
    }

    // Exhaustion is only clean if the cursor holds no terminal error.
    if let Some(err) = cursor.take_error() {
        error!(error = %err, "row scan: cursor error at exhaustion");
        return Err(err);
    }

    Ok(())
}

/// A fully-materialized cursor
///
/// Backends that cannot stream rows across an async boundary collect them
/// into a `BufferedCursor` and hand it to the scanner; it behaves like any
/// forward-only cursor, including carrying a terminal error recorded while
/// the rows were being produced.
pub struct BufferedCursor {
    columns: Vec<String>,
    rows: VecDeque<Vec<SqlValue>>,
    current: Option<Vec<SqlValue>>,
    pending: Option<SqlError>,
    closed: bool,
}

impl BufferedCursor {
    /// Cursor over a complete result set
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            columns,
            rows: rows.into(),
            current: None,
            pending: None,
            closed: false,
        }
    }

    /// Cursor whose production failed after yielding some rows
    ///
    /// The buffered rows remain readable; the error surfaces once they are
    /// drained.
    pub fn interrupted(columns: Vec<String>, rows: Vec<Vec<SqlValue>>, err: SqlError) -> Self {
        Self {
            pending: Some(err),
            ..Self::new(columns, rows)
        }
    }

    /// Cursor whose production failed before yielding anything
    pub fn failed(err: SqlError) -> Self {
        Self::interrupted(Vec::new(), Vec::new(), err)
    }
}

impl RowCursor for BufferedCursor {
    fn columns(&self) -> Result<Vec<String>> {
        if self.closed {
            return Err(SqlError::CursorClosed);
        }
        Ok(self.columns.clone())
    }

    fn advance(&mut self) -> Result<bool> {
        if self.closed {
            return Err(SqlError::CursorClosed);
        }
        self.current = self.rows.pop_front();
        Ok(self.current.is_some())
    }

    fn read_current(&mut self, dests: &mut [SqlDest<'_>]) -> Result<()> {
        if self.closed {
            return Err(SqlError::CursorClosed);
        }
        let values = self
            .current
            .take()
            .ok_or_else(|| SqlError::other("cursor: no current row to read"))?;
        if dests.len() != values.len() {
            return Err(SqlError::invalid_arguments(values.len(), dests.len()));
        }
        for (dest, value) in dests.iter_mut().zip(values) {
            dest.accept(value)?;
        }
        Ok(())
    }

    fn take_error(&mut self) -> Option<SqlError> {
        if self.closed {
            return None;
        }
        // A mid-stream failure surfaces once every buffered row has been
        // handed out, whether or not the last one was read.
        if self.rows.is_empty() {
            self.pending.take()
        } else {
            None
        }
    }

    fn close(&mut self) -> Result<()> {
        self.rows.clear();
        self.current = None;
        self.pending = None;
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Cursor wrapper recording how often rows are read and whether the
    /// cursor was released.
    struct ProbeCursor {
        inner: BufferedCursor,
        reads: Arc<AtomicUsize>,
        closed: Arc<AtomicBool>,
    }

    impl ProbeCursor {
        fn new(inner: BufferedCursor) -> (Self, Arc<AtomicUsize>, Arc<AtomicBool>) {
            let reads = Arc::new(AtomicUsize::new(0));
            let closed = Arc::new(AtomicBool::new(false));
            (
                Self {
                    inner,
                    reads: Arc::clone(&reads),
                    closed: Arc::clone(&closed),
                },
                reads,
                closed,
            )
        }
    }

    impl RowCursor for ProbeCursor {
        fn columns(&self) -> Result<Vec<String>> {
            self.inner.columns()
        }

        fn advance(&mut self) -> Result<bool> {
            self.inner.advance()
        }

        fn read_current(&mut self, dests: &mut [SqlDest<'_>]) -> Result<()> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read_current(dests)
        }

        fn take_error(&mut self) -> Option<SqlError> {
            self.inner.take_error()
        }

        fn close(&mut self) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            self.inner.close()
        }
    }

    fn two_column_rows(n: i64) -> BufferedCursor {
        let rows = (0..n)
            .map(|i| vec![SqlValue::Long(i), SqlValue::Text(format!("user{i}"))])
            .collect();
        BufferedCursor::new(vec!["id".into(), "name".into()], rows)
    }

    #[test]
    fn test_wrapped_error_passthrough() {
        let scan = RowScan::new(
            Some(Box::new(two_column_rows(1))),
            Some(SqlError::connection("down")),
        );
        let err = scan.scan(|_, _| Ok(ScanFlow::Taken)).unwrap_err();
        assert!(matches!(err, SqlError::Connection(_)));
    }

    #[test]
    fn test_absent_cursor_is_not_found() {
        let err = RowScan::new(None, None)
            .scan(|_, _| Ok(ScanFlow::Taken))
            .unwrap_err();
        assert!(matches!(err, SqlError::DataNotFound));
    }

    #[test]
    fn test_failed_cursor_surfaces_before_rows() {
        let cursor = BufferedCursor::failed(SqlError::other("boom"));
        let mut called = false;
        let err = RowScan::new(Some(Box::new(cursor)), None)
            .scan(|_, _| {
                called = true;
                Ok(ScanFlow::Taken)
            })
            .unwrap_err();
        assert!(matches!(err, SqlError::Other(_)));
        assert!(!called);
    }

    #[test]
    fn test_zero_columns_is_rejected() {
        let cursor = BufferedCursor::new(Vec::new(), Vec::new());
        let mut called = false;
        let err = RowScan::new(Some(Box::new(cursor)), None)
            .scan(|_, _| {
                called = true;
                Ok(ScanFlow::Taken)
            })
            .unwrap_err();
        assert!(matches!(err, SqlError::NoColumnReturned));
        assert!(!called);
    }

    #[test]
    fn test_stop_sentinel_leaves_remaining_rows_unread() {
        let (cursor, reads, closed) = ProbeCursor::new(two_column_rows(3));
        let mut ids = Vec::new();
        let mut names = Vec::new();

        RowScan::new(Some(Box::new(cursor)), None)
            .scan(|i, row| {
                if i == 2 {
                    return Ok(ScanFlow::Stop);
                }
                let (mut id, mut name) = (0i64, String::new());
                row.read(&mut [&mut id as SqlDest, &mut name])?;
                ids.push(id);
                names.push(name);
                Ok(ScanFlow::Taken)
            })
            .unwrap();

        assert_eq!(ids, vec![0, 1]);
        assert_eq!(names, vec!["user0", "user1"]);
        assert_eq!(reads.load(Ordering::SeqCst), 2);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_destination_count_mismatch() {
        let rows = vec![vec![
            SqlValue::Long(1),
            SqlValue::Text("a".into()),
            SqlValue::Long(2),
        ]];
        let cursor = BufferedCursor::new(vec!["a".into(), "b".into(), "c".into()], rows);
        let (cursor, reads, closed) = ProbeCursor::new(cursor);

        let err = RowScan::new(Some(Box::new(cursor)), None)
            .scan(|_, row| {
                let (mut x, mut y) = (0i64, 0i64);
                row.read(&mut [&mut x as SqlDest, &mut y])?;
                Ok(ScanFlow::Taken)
            })
            .unwrap_err();

        assert!(matches!(
            err,
            SqlError::InvalidArguments {
                columns: 3,
                destinations: 2
            }
        ));
        let msg = err.to_string();
        assert!(msg.contains("[3] columns"));
        assert!(msg.contains("[2] destinations"));
        // The mismatch is caught before any value is bound.
        assert_eq!(reads.load(Ordering::SeqCst), 0);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_skip_does_not_advance_logical_index() {
        let (cursor, reads, _) = ProbeCursor::new(two_column_rows(4));
        let mut physical = 0usize;
        let mut seen_indices = Vec::new();
        let mut ids = Vec::new();

        RowScan::new(Some(Box::new(cursor)), None)
            .scan(|i, row| {
                seen_indices.push(i);
                let skip = physical == 1;
                physical += 1;
                if skip {
                    return Ok(ScanFlow::Skip);
                }
                let (mut id, mut name) = (0i64, String::new());
                row.read(&mut [&mut id as SqlDest, &mut name])?;
                ids.push(id);
                Ok(ScanFlow::Taken)
            })
            .unwrap();

        // Physical row 1 was skipped, so logical index 1 is reused for
        // physical row 2.
        assert_eq!(seen_indices, vec![0, 1, 1, 2]);
        assert_eq!(ids, vec![0, 2, 3]);
        assert_eq!(reads.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_binding_failure_aborts_scan() {
        let rows = vec![
            vec![SqlValue::Bytes(vec![1, 2, 3])],
            vec![SqlValue::Long(2)],
        ];
        let cursor = BufferedCursor::new(vec!["n".into()], rows);
        let (cursor, reads, closed) = ProbeCursor::new(cursor);

        let err = RowScan::new(Some(Box::new(cursor)), None)
            .scan(|_, row| {
                let mut n = 0i64;
                row.read(&mut [&mut n as SqlDest])?;
                Ok(ScanFlow::Taken)
            })
            .unwrap_err();

        assert!(matches!(err, SqlError::TypeMismatch { .. }));
        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_interrupted_cursor_yields_buffered_rows_then_error() {
        let rows = vec![vec![SqlValue::Long(0)], vec![SqlValue::Long(1)]];
        let cursor =
            BufferedCursor::interrupted(vec!["n".into()], rows, SqlError::other("stream lost"));
        let mut seen = Vec::new();

        let err = RowScan::new(Some(Box::new(cursor)), None)
            .scan(|_, row| {
                let mut n = 0i64;
                row.read(&mut [&mut n as SqlDest])?;
                seen.push(n);
                Ok(ScanFlow::Taken)
            })
            .unwrap_err();

        assert!(matches!(err, SqlError::Other(_)));
        assert_eq!(seen, vec![0, 1]);
    }

    #[test]
    fn test_skip_on_last_row_still_surfaces_pending_error() {
        let rows = vec![vec![SqlValue::Long(7)]];
        let cursor = BufferedCursor::interrupted(
            vec!["n".into()],
            rows,
            SqlError::connection("lost mid-stream"),
        );

        // The final row leaves the buffer even though the callback never
        // reads it; the terminal error must still come out.
        let err = RowScan::new(Some(Box::new(cursor)), None)
            .scan(|_, _| Ok(ScanFlow::Skip))
            .unwrap_err();
        assert!(matches!(err, SqlError::Connection(_)));
    }

    /// Cursor that reports its terminal error only after exhaustion.
    struct LateErrorCursor {
        rows_left: usize,
        exhausted: bool,
        err: Option<SqlError>,
    }

    impl RowCursor for LateErrorCursor {
        fn columns(&self) -> Result<Vec<String>> {
            Ok(vec!["n".into()])
        }

        fn advance(&mut self) -> Result<bool> {
            if self.rows_left == 0 {
                self.exhausted = true;
                return Ok(false);
            }
            self.rows_left -= 1;
            Ok(true)
        }

        fn read_current(&mut self, dests: &mut [SqlDest<'_>]) -> Result<()> {
            dests[0].accept(SqlValue::Long(1))
        }

        fn take_error(&mut self) -> Option<SqlError> {
            if self.exhausted {
                self.err.take()
            } else {
                None
            }
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_error_reported_at_exhaustion_is_not_lost() {
        let cursor = LateErrorCursor {
            rows_left: 2,
            exhausted: false,
            err: Some(SqlError::other("truncated result")),
        };
        let mut seen = 0usize;

        let err = RowScan::new(Some(Box::new(cursor)), None)
            .scan(|_, row| {
                let mut n = 0i64;
                row.read(&mut [&mut n as SqlDest])?;
                seen += 1;
                Ok(ScanFlow::Taken)
            })
            .unwrap_err();

        assert!(matches!(err, SqlError::Other(_)));
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_clean_exhaustion() {
        let (cursor, _, closed) = ProbeCursor::new(two_column_rows(2));
        let mut rows = Vec::new();

        RowScan::new(Some(Box::new(cursor)), None)
            .scan(|i, row| {
                let (mut id, mut name) = (0i64, String::new());
                row.read(&mut [&mut id as SqlDest, &mut name])?;
                rows.push((i, id, name));
                Ok(ScanFlow::Taken)
            })
            .unwrap();

        assert_eq!(
            rows,
            vec![(0, 0, "user0".to_string()), (1, 1, "user1".to_string())]
        );
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_closed_cursor_surfaces_closed_error() {
        let mut cursor = two_column_rows(2);
        cursor.close().unwrap();

        assert!(matches!(cursor.advance(), Err(SqlError::CursorClosed)));
        assert!(matches!(cursor.columns(), Err(SqlError::CursorClosed)));
        // Closing again is a no-op.
        cursor.close().unwrap();
    }

    #[test]
    fn test_from_result_outcome() {
        let outcome: Result<Box<dyn RowCursor>> = Err(SqlError::DataNotFound);
        let err = RowScan::from(outcome)
            .scan(|_, _| Ok(ScanFlow::Taken))
            .unwrap_err();
        assert!(matches!(err, SqlError::DataNotFound));
    }
}
