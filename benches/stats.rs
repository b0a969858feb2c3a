use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use logql_core::stats::{parse_func, ByField, MapStatsBlock, OutputRow, PipeOutput, StatsExecutor, StatsFunc};

struct Discard;
impl PipeOutput for Discard {
    fn write_block(&mut self, _worker_id: usize, rows: Vec<OutputRow>) {
        black_box(rows);
    }
}

fn block_with_levels(n: usize) -> MapStatsBlock {
    let levels = ["info", "warn", "error", "debug"];
    let values: Vec<String> = (0..n).map(|i| levels[i % levels.len()].to_string()).collect();
    let durations: Vec<String> = (0..n).map(|i| (i % 500).to_string()).collect();
    MapStatsBlock::new(n)
        .with_dense("level", values)
        .with_dense("duration", durations)
}

fn bench_count_by_level(c: &mut Criterion) {
    let mut group = c.benchmark_group("stats_count_by_level");
    for &n in &[1_000usize, 10_000, 100_000] {
        let block = block_with_levels(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let funcs: Vec<Box<dyn StatsFunc>> = vec![parse_func("count", &[], "count").unwrap()];
                let exec = StatsExecutor::new(vec![ByField::new("level")], funcs, 1, 1 << 30);
                exec.write_block(0, black_box(&block));
                let mut out = Discard;
                exec.flush(&mut out).unwrap();
            });
        });
    }
    group.finish();
}

fn bench_sum_and_avg_by_level(c: &mut Criterion) {
    let mut group = c.benchmark_group("stats_sum_avg_by_level");
    for &n in &[1_000usize, 10_000, 100_000] {
        let block = block_with_levels(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let funcs: Vec<Box<dyn StatsFunc>> = vec![
                    parse_func("sum", &["duration".to_string()], "total").unwrap(),
                    parse_func("avg", &["duration".to_string()], "mean").unwrap(),
                ];
                let exec = StatsExecutor::new(vec![ByField::new("level")], funcs, 1, 1 << 30);
                exec.write_block(0, black_box(&block));
                let mut out = Discard;
                exec.flush(&mut out).unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_count_by_level, bench_sum_and_avg_by_level);
criterion_main!(benches);
