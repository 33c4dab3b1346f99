use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use sqlbridge::{
    BufferedCursor, ExecResult, ExecScan, Result, RowScan, ScanFlow, SqlDest, SqlValue,
};

struct StaticResult {
    rows_affected: i64,
    last_insert_id: i64,
}

impl ExecResult for StaticResult {
    fn rows_affected(&self) -> Result<i64> {
        Ok(self.rows_affected)
    }

    fn last_insert_id(&self) -> Result<i64> {
        Ok(self.last_insert_id)
    }
}

fn value_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("value");

    group.bench_function("from_i64", |b| {
        b.iter(|| SqlValue::from(black_box(42i64)))
    });

    group.bench_function("from_str", |b| {
        b.iter(|| SqlValue::from(black_box("hello world")))
    });

    group.bench_function("as_long", |b| {
        let value = SqlValue::Long(42);
        b.iter(|| black_box(&value).as_long())
    });

    group.finish();
}

fn exec_scan_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("exec_scan");

    group.bench_function("both_outputs", |b| {
        b.iter(|| {
            let result: Box<dyn ExecResult> = Box::new(StaticResult {
                rows_affected: 3,
                last_insert_id: 17,
            });
            let (mut affected, mut id) = (0i64, 0i64);
            ExecScan::from(Ok(result))
                .scan(Some(&mut affected), Some(&mut id))
                .unwrap();
            black_box((affected, id))
        })
    });

    group.bench_function("no_outputs", |b| {
        b.iter(|| {
            let result: Box<dyn ExecResult> = Box::new(StaticResult {
                rows_affected: 1,
                last_insert_id: 1,
            });
            ExecScan::from(Ok(result)).scan(None, None).unwrap()
        })
    });

    group.finish();
}

fn cursor_of(rows: usize) -> BufferedCursor {
    let data = (0..rows as i64)
        .map(|i| vec![SqlValue::Long(i), SqlValue::Text(format!("user{i}"))])
        .collect();
    BufferedCursor::new(vec!["id".to_string(), "name".to_string()], data)
}

fn row_scan_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("row_scan");

    for rows in [10usize, 100, 1000] {
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::new("scan_all", rows), &rows, |b, &rows| {
            b.iter(|| {
                let mut total = 0i64;
                RowScan::new(Some(Box::new(cursor_of(rows))), None)
                    .scan(|_, row| {
                        let (mut id, mut name) = (0i64, String::new());
                        row.read(&mut [&mut id as SqlDest, &mut name])?;
                        total += id;
                        black_box(&name);
                        Ok(ScanFlow::Taken)
                    })
                    .unwrap();
                black_box(total)
            })
        });
    }

    group.bench_function("stop_after_first", |b| {
        b.iter(|| {
            let mut first = 0i64;
            RowScan::new(Some(Box::new(cursor_of(1000))), None)
                .scan(|i, row| {
                    if i == 1 {
                        return Ok(ScanFlow::Stop);
                    }
                    let (mut id, mut name) = (0i64, String::new());
                    row.read(&mut [&mut id as SqlDest, &mut name])?;
                    first = id;
                    Ok(ScanFlow::Taken)
                })
                .unwrap();
            black_box(first)
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    value_benchmarks,
    exec_scan_benchmarks,
    row_scan_benchmarks
);
criterion_main!(benches);
