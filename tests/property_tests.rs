//! Property-based tests for value conversions and the scan protocol.

use proptest::prelude::*;

use sqlbridge::{BufferedCursor, RowScan, ScanFlow, SqlDest, SqlError, SqlValue};

fn long_cursor(n: usize) -> BufferedCursor {
    let rows = (0..n as i64).map(|i| vec![SqlValue::Long(i)]).collect();
    BufferedCursor::new(vec!["n".to_string()], rows)
}

proptest! {
    #[test]
    fn prop_long_conversion_roundtrip(n in any::<i64>()) {
        let value = SqlValue::from(n);
        prop_assert_eq!(value.as_long(), Some(n));
        prop_assert!(!value.is_null());
    }

    #[test]
    fn prop_text_conversion_roundtrip(s in ".*") {
        let value = SqlValue::from(s.clone());
        prop_assert_eq!(value.as_str(), Some(s.as_str()));
    }

    #[test]
    fn prop_double_conversion_roundtrip(f in any::<f64>().prop_filter("finite", |f| f.is_finite())) {
        let value = SqlValue::from(f);
        prop_assert_eq!(value.as_double(), Some(f));
    }

    #[test]
    fn prop_bytes_conversion_roundtrip(b in proptest::collection::vec(any::<u8>(), 0..64)) {
        let value = SqlValue::from(b.clone());
        prop_assert_eq!(value.as_bytes(), Some(b.as_slice()));
    }

    #[test]
    fn prop_optional_none_is_null(n in proptest::option::of(any::<i64>())) {
        let value = SqlValue::from(n);
        prop_assert_eq!(value.is_null(), n.is_none());
        prop_assert_eq!(value.as_long(), n);
    }

    /// Stopping at logical index `k` over `n` rows binds exactly `min(k, n)`
    /// rows.
    #[test]
    fn prop_stop_at_k_takes_min_k_n(n in 0usize..50, k in 0usize..50) {
        let mut taken = Vec::new();
        RowScan::new(Some(Box::new(long_cursor(n))), None)
            .scan(|i, row| {
                if i == k {
                    return Ok(ScanFlow::Stop);
                }
                let mut value = 0i64;
                row.read(&mut [&mut value as SqlDest])?;
                taken.push(value);
                Ok(ScanFlow::Taken)
            })
            .unwrap();

        let expected: Vec<i64> = (0..n.min(k) as i64).collect();
        prop_assert_eq!(taken, expected);
    }

    /// Skipped rows never consume a logical index: the indices the callback
    /// observes are exactly the count of previously taken rows.
    #[test]
    fn prop_skip_mask_preserves_index_discipline(
        mask in proptest::collection::vec(any::<bool>(), 0..40),
    ) {
        let n = mask.len();
        let mask_for_scan = mask.clone();
        let mut physical = 0usize;
        let mut observed = Vec::new();

        RowScan::new(Some(Box::new(long_cursor(n))), None)
            .scan(|i, row| {
                observed.push(i);
                let keep = mask_for_scan[physical];
                physical += 1;
                if !keep {
                    return Ok(ScanFlow::Skip);
                }
                let mut value = 0i64;
                row.read(&mut [&mut value as SqlDest])?;
                Ok(ScanFlow::Taken)
            })
            .unwrap();

        let mut expected = Vec::with_capacity(n);
        let mut idx = 0usize;
        for keep in &mask {
            expected.push(idx);
            if *keep {
                idx += 1;
            }
        }
        prop_assert_eq!(observed, expected);
    }

    /// Any destination count different from the column count fails with
    /// `InvalidArguments` reporting both lengths.
    #[test]
    fn prop_destination_mismatch_reports_lengths(
        columns in 1usize..6,
        destinations in 0usize..6,
    ) {
        prop_assume!(columns != destinations);

        let names: Vec<String> = (0..columns).map(|i| format!("c{i}")).collect();
        let row: Vec<SqlValue> = (0..columns as i64).map(SqlValue::Long).collect();
        let cursor = BufferedCursor::new(names, vec![row]);

        let err = RowScan::new(Some(Box::new(cursor)), None)
            .scan(|_, row| {
                let mut sinks: Vec<i64> = vec![0; destinations];
                let mut dests: Vec<SqlDest<'_>> =
                    sinks.iter_mut().map(|s| s as SqlDest).collect();
                row.read(&mut dests)?;
                Ok(ScanFlow::Taken)
            })
            .unwrap_err();

        match err {
            SqlError::InvalidArguments {
                columns: c,
                destinations: d,
            } => {
                prop_assert_eq!(c, columns);
                prop_assert_eq!(d, destinations);
            }
            other => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    /// A full scan over `n` single-column rows always binds all `n` values in
    /// order.
    #[test]
    fn prop_full_scan_binds_all_rows(n in 0usize..100) {
        let mut taken = Vec::new();
        RowScan::new(Some(Box::new(long_cursor(n))), None)
            .scan(|_, row| {
                let mut value = 0i64;
                row.read(&mut [&mut value as SqlDest])?;
                taken.push(value);
                Ok(ScanFlow::Taken)
            })
            .unwrap();

        let expected: Vec<i64> = (0..n as i64).collect();
        prop_assert_eq!(taken, expected);
    }
}
