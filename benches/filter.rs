use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use logql_core::block::{BlockSearch, BloomFilter, ColumnHeader, ColumnValues, StreamId, ValueType};
use logql_core::bitmap::RowBitmap;
use logql_core::filter::{Filter, PhraseFilter, PrefixFilter};
use std::borrow::Cow;

struct StringBlock {
    header: ColumnHeader,
    values: Vec<String>,
}

impl StringBlock {
    fn new(field: &str, values: Vec<String>) -> Self {
        Self {
            header: ColumnHeader::new(field, ValueType::String),
            values,
        }
    }
}

impl BlockSearch for StringBlock {
    fn row_count(&self) -> u32 {
        self.values.len() as u32
    }
    fn stream_id(&self) -> StreamId {
        0
    }
    fn get_const_column_value(&self, _field: &str) -> Option<&str> {
        None
    }
    fn get_column_header(&self, field: &str) -> Option<&ColumnHeader> {
        (field == self.header.field_name).then_some(&self.header)
    }
    fn get_values_for_column(&self, _header: &ColumnHeader) -> ColumnValues<'_> {
        ColumnValues::String(Cow::Borrowed(&self.values))
    }
    fn get_bloom_filter_for_column(&self, _header: &ColumnHeader) -> Option<&dyn BloomFilter> {
        None
    }
    fn part_path(&self) -> &str {
        "bench"
    }
}

fn lorem_rows(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| format!("2024-01-01T00:00:{:02}Z level=info msg=request completed in {}ms", i % 60, i))
        .collect()
}

fn bench_phrase(c: &mut Criterion) {
    let mut group = c.benchmark_group("phrase_filter");
    for &n in &[1_000usize, 10_000, 100_000] {
        let block = StringBlock::new("msg", lorem_rows(n));
        let filter = PhraseFilter::new("msg", "completed");
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let mut bm = RowBitmap::all_ones(n);
                filter.apply(black_box(&block), &mut bm);
                black_box(bm.count_set());
            });
        });
    }
    group.finish();
}

fn bench_prefix(c: &mut Criterion) {
    let mut group = c.benchmark_group("prefix_filter");
    for &n in &[1_000usize, 10_000, 100_000] {
        let block = StringBlock::new("msg", lorem_rows(n));
        let filter = PrefixFilter::new("msg", "2024-01-01T00:00:0");
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let mut bm = RowBitmap::all_ones(n);
                filter.apply(black_box(&block), &mut bm);
                black_box(bm.count_set());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_phrase, bench_prefix);
criterion_main!(benches);
