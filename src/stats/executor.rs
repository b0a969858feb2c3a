//! Sharded, budgeted, cancellable stats pipe executor (spec.md §4.D, §5,
//! §7.2).
//!
//! One [`Shard`] per worker; each worker only ever touches its own shard
//! while rows are streaming in (`write_block`), so the per-shard lock is
//! uncontended in the common case and exists only to let the executor be
//! `Sync` across worker threads. Shards are cache-line padded so neighbouring
//! workers' hot counters don't false-share.

use crate::stats::budget::{Cancellation, MemoryBudget};
use crate::stats::by_field::ByField;
use crate::stats::func::{StatsFunc, StatsProcessor};
use crate::stats::key::{decode_group_key, encode_group_key};
use crate::stats::source::{StatsBlock, StatsColumn};
use crossbeam_utils::CachePadded;
use hashbrown::HashMap;
use parking_lot::Mutex;

/// Output row emitted at flush time: by-field values followed by each
/// function's finalized result, in declaration order.
pub type OutputRow = Vec<String>;

/// Where the executor hands finished result rows. Mirrors the pull/push
/// seam the filter pipe uses for matched blocks (spec.md §5).
pub trait PipeOutput {
    fn write_block(&mut self, worker_id: usize, rows: Vec<OutputRow>);
}

const MAX_OUTPUT_BLOCK_ROWS: usize = 1000;

struct ShardInner {
    groups: HashMap<Vec<u8>, Vec<Box<dyn StatsProcessor>>>,
    local_budget: i64,
}

impl ShardInner {
    fn new() -> Self {
        Self {
            groups: HashMap::new(),
            local_budget: 0,
        }
    }
}

type ShardSlot = CachePadded<Mutex<ShardInner>>;

#[cfg(target_arch = "x86_64")]
const _: () = {
    // crossbeam_utils pads to the platform cache-line size (128 bytes on
    // x86_64/aarch64); assert the slot is at least one full line so
    // adjacent shards never share a line.
    static_assertions::const_assert!(std::mem::size_of::<ShardSlot>() >= 128);
};

pub struct StatsExecutor {
    by_fields: Vec<ByField>,
    funcs: Vec<Box<dyn StatsFunc>>,
    shards: Vec<ShardSlot>,
    budget: MemoryBudget,
    cancel: Cancellation,
}

impl StatsExecutor {
    pub fn new(
        by_fields: Vec<ByField>,
        funcs: Vec<Box<dyn StatsFunc>>,
        worker_count: usize,
        process_memory_limit_bytes: u64,
    ) -> Self {
        assert!(worker_count > 0, "stats pipe needs at least one worker");
        Self {
            by_fields,
            funcs,
            shards: (0..worker_count)
                .map(|_| CachePadded::new(Mutex::new(ShardInner::new())))
                .collect(),
            budget: MemoryBudget::new(process_memory_limit_bytes),
            cancel: Cancellation::new(),
        }
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancel
    }

    /// All fields any active function reads, for the upstream projection.
    pub fn needed_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self.by_fields.iter().map(|b| b.name.clone()).collect();
        for f in &self.funcs {
            fields.extend(f.needed_fields().iter().cloned());
        }
        fields.sort();
        fields.dedup();
        fields
    }

    fn new_group_processors(&self) -> Vec<Box<dyn StatsProcessor>> {
        self.funcs.iter().map(|f| f.new_processor()).collect()
    }

    fn charge(&self, shard: &mut ShardInner, delta: i64) {
        shard.local_budget -= delta;
        if shard.local_budget < 0 {
            self.budget.steal_chunk(&self.cancel);
            shard.local_budget += crate::stats::budget::CHUNK_BYTES;
        }
    }

    /// Feeds one post-filter block into `worker_id`'s shard. Dropped
    /// (no-op) once the budget has been exceeded — the upstream filter pipe
    /// is expected to stop calling once it observes `cancellation()`, but a
    /// dropped block here is still harmless rather than a panic.
    pub fn write_block(&self, worker_id: usize, block: &dyn StatsBlock) {
        if self.cancel.is_cancelled() {
            return;
        }
        let mut shard = self.shards[worker_id].lock();
        match self.by_fields.len() {
            0 => self.process_no_by_fields(&mut shard, block),
            1 => self.process_one_by_field(&mut shard, block),
            _ => self.process_many_by_fields(&mut shard, block),
        }
    }

    fn process_no_by_fields(&self, shard: &mut ShardInner, block: &dyn StatsBlock) {
        let key = Vec::new();
        let procs = shard
            .groups
            .entry(key)
            .or_insert_with(|| self.new_group_processors());
        for p in procs.iter_mut() {
            let delta = p.update_stats_for_all_rows(block);
            if delta != 0 {
                self.charge(shard, delta);
            }
        }
    }

    fn process_one_by_field(&self, shard: &mut ShardInner, block: &dyn StatsBlock) {
        let field = &self.by_fields[0];
        let col = field_column(field, block, 0);
        match col {
            StatsColumn::Const(v) => {
                let key = encode_group_key([v.as_ref()]);
                self.apply_whole_block(shard, block, key);
            }
            StatsColumn::Dense(values) => {
                if all_equal(&values) {
                    let key = encode_group_key([values[0].as_str()]);
                    self.apply_whole_block(shard, block, key);
                } else {
                    self.walk_rows(shard, block, block.row_count(), |row| {
                        encode_group_key([values[row].as_str()])
                    });
                }
            }
        }
    }

    fn process_many_by_fields(&self, shard: &mut ShardInner, block: &dyn StatsBlock) {
        let columns: Vec<StatsColumn<'_>> = self
            .by_fields
            .iter()
            .enumerate()
            .map(|(i, f)| field_column(f, block, i))
            .collect();

        if columns.iter().all(|c| matches!(c, StatsColumn::Const(_))) {
            let values: Vec<&str> = columns
                .iter()
                .map(|c| match c {
                    StatsColumn::Const(v) => v.as_ref(),
                    StatsColumn::Dense(_) => unreachable!(),
                })
                .collect();
            let key = encode_group_key(values);
            self.apply_whole_block(shard, block, key);
            return;
        }

        let row_count = block.row_count();
        self.walk_rows(shard, block, row_count, |row| {
            let values: Vec<&str> = columns
                .iter()
                .map(|c| match c {
                    StatsColumn::Const(v) => v.as_ref(),
                    StatsColumn::Dense(vs) => vs[row].as_str(),
                })
                .collect();
            encode_group_key(values)
        });
    }

    fn apply_whole_block(&self, shard: &mut ShardInner, block: &dyn StatsBlock, key: Vec<u8>) {
        let procs = shard
            .groups
            .entry(key)
            .or_insert_with(|| self.new_group_processors());
        for p in procs.iter_mut() {
            let delta = p.update_stats_for_all_rows(block);
            if delta != 0 {
                self.charge(shard, delta);
            }
        }
    }

    /// Change-detected row walk: only re-resolves the group's processor list
    /// from the hash map when the key differs from the previous row.
    fn walk_rows(
        &self,
        shard: &mut ShardInner,
        block: &dyn StatsBlock,
        row_count: usize,
        key_for_row: impl Fn(usize) -> Vec<u8>,
    ) {
        let mut deltas: Vec<i64> = Vec::new();
        let mut row = 0;
        while row < row_count {
            let key = key_for_row(row);
            let run_start = row;
            row += 1;
            while row < row_count && key_for_row(row) == key {
                row += 1;
            }
            let procs = shard
                .groups
                .entry(key)
                .or_insert_with(|| self.new_group_processors());
            for r in run_start..row {
                for p in procs.iter_mut() {
                    deltas.push(p.update_stats_for_row(block, r));
                }
            }
        }
        for d in deltas {
            if d != 0 {
                self.charge(shard, d);
            }
        }
    }

    /// Folds all shards into shard 0 and emits result rows in blocks of at
    /// most [`MAX_OUTPUT_BLOCK_ROWS`], polling cancellation between groups
    /// and between emitted blocks. Returns [`StatsError::BudgetExceeded`] if
    /// the memory budget was ever exhausted during this pipe's lifetime —
    /// output already written via `out` up to that point stands, per
    /// spec.md §5 ("cancellation causes flush to return cleanly with no
    /// further side effects").
    pub fn flush(&self, out: &mut dyn PipeOutput) -> crate::error::StatsResult<()> {
        if self.by_fields.is_empty() {
            let mut shard0 = self.shards[0].lock();
            shard0
                .groups
                .entry(Vec::new())
                .or_insert_with(|| self.new_group_processors());
        }

        for i in 1..self.shards.len() {
            if self.cancel.is_cancelled() {
                break;
            }
            let mut src = self.shards[i].lock();
            let mut dst = self.shards[0].lock();
            for (key, mut procs) in src.groups.drain() {
                match dst.groups.entry(key) {
                    hashbrown::hash_map::Entry::Vacant(e) => {
                        e.insert(procs);
                    }
                    hashbrown::hash_map::Entry::Occupied(mut e) => {
                        let existing = e.get_mut();
                        for (dst_p, src_p) in existing.iter_mut().zip(procs.iter_mut()) {
                            dst_p.merge_state(src_p.as_ref());
                        }
                    }
                }
            }
        }

        let shard0 = self.shards[0].lock();
        let field_names: Vec<&str> = self.by_fields.iter().map(|b| b.name.as_str()).collect();
        let mut rows: Vec<OutputRow> = Vec::with_capacity(MAX_OUTPUT_BLOCK_ROWS);
        for (key, procs) in shard0.groups.iter() {
            if self.cancel.is_cancelled() {
                break;
            }
            let mut row = decode_group_key(key);
            debug_assert_eq!(row.len(), field_names.len());
            for p in procs {
                row.push(p.finalize_stats());
            }
            rows.push(row);
            if rows.len() == MAX_OUTPUT_BLOCK_ROWS {
                out.write_block(0, std::mem::take(&mut rows));
            }
        }
        if !rows.is_empty() {
            out.write_block(0, rows);
        }

        if self.budget.exceeded() {
            return Err(crate::error::StatsError::BudgetExceeded {
                budget_mib: self.budget.initial_mib(),
            });
        }
        Ok(())
    }

    pub fn budget_exceeded(&self) -> bool {
        self.budget.exceeded()
    }

    pub fn budget_mib(&self) -> u64 {
        self.budget.initial_mib()
    }
}

fn field_column<'a>(field: &ByField, block: &'a dyn StatsBlock, _idx: usize) -> StatsColumn<'a> {
    match block.column(&field.name) {
        StatsColumn::Const(v) => {
            let bucketed = field.bucket(&v).into_owned();
            StatsColumn::Const(std::borrow::Cow::Owned(bucketed))
        }
        StatsColumn::Dense(values) => {
            let bucketed: Vec<String> = values.iter().map(|v| field.bucket(v).into_owned()).collect();
            StatsColumn::Dense(std::borrow::Cow::Owned(bucketed))
        }
    }
}

fn all_equal(values: &[String]) -> bool {
    match values.first() {
        None => true,
        Some(first) => values.iter().all(|v| v == first),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::func::{parse_func, CountFunc};
    use crate::stats::source::MapStatsBlock;

    struct CollectOutput(Vec<OutputRow>);

    impl PipeOutput for CollectOutput {
        fn write_block(&mut self, _worker_id: usize, rows: Vec<OutputRow>) {
            self.0.extend(rows);
        }
    }

    #[test]
    fn count_with_no_by_fields_emits_one_row() {
        let exec = StatsExecutor::new(vec![], vec![Box::new(CountFunc::new("count"))], 1, 1 << 30);
        exec.write_block(0, &MapStatsBlock::new(3));
        exec.write_block(0, &MapStatsBlock::new(2));
        let mut out = CollectOutput(Vec::new());
        exec.flush(&mut out).unwrap();
        assert_eq!(out.0, vec![vec!["5".to_string()]]);
    }

    #[test]
    fn count_with_zero_rows_still_emits_one_row() {
        let exec = StatsExecutor::new(vec![], vec![Box::new(CountFunc::new("count"))], 1, 1 << 30);
        let mut out = CollectOutput(Vec::new());
        exec.flush(&mut out).unwrap();
        assert_eq!(out.0, vec![vec!["0".to_string()]]);
    }

    #[test]
    fn groups_by_one_field() {
        let by = vec![ByField::new("level")];
        let funcs: Vec<Box<dyn StatsFunc>> = vec![Box::new(CountFunc::new("count"))];
        let exec = StatsExecutor::new(by, funcs, 1, 1 << 30);
        let block = MapStatsBlock::new(4).with_dense(
            "level",
            vec!["info".into(), "info".into(), "warn".into(), "info".into()],
        );
        exec.write_block(0, &block);
        let mut out = CollectOutput(Vec::new());
        exec.flush(&mut out).unwrap();
        out.0.sort();
        assert_eq!(
            out.0,
            vec![vec!["info".to_string(), "3".to_string()], vec!["warn".to_string(), "1".to_string()]]
        );
    }

    #[test]
    fn const_column_uses_single_group_without_row_walk() {
        let by = vec![ByField::new("level")];
        let funcs: Vec<Box<dyn StatsFunc>> = vec![Box::new(CountFunc::new("count"))];
        let exec = StatsExecutor::new(by, funcs, 1, 1 << 30);
        let block = MapStatsBlock::new(100).with_const("level", "info");
        exec.write_block(0, &block);
        let mut out = CollectOutput(Vec::new());
        exec.flush(&mut out).unwrap();
        assert_eq!(out.0, vec![vec!["info".to_string(), "100".to_string()]]);
    }

    #[test]
    fn merges_across_shards() {
        let by = vec![ByField::new("level")];
        let funcs: Vec<Box<dyn StatsFunc>> = vec![Box::new(CountFunc::new("count"))];
        let exec = StatsExecutor::new(by, funcs, 2, 1 << 30);
        exec.write_block(0, &MapStatsBlock::new(2).with_const("level", "info"));
        exec.write_block(1, &MapStatsBlock::new(3).with_const("level", "info"));
        let mut out = CollectOutput(Vec::new());
        exec.flush(&mut out).unwrap();
        assert_eq!(out.0, vec![vec!["info".to_string(), "5".to_string()]]);
    }

    #[test]
    fn sum_and_avg_by_two_fields() {
        let by = vec![ByField::new("app"), ByField::new("level")];
        let funcs = vec![
            parse_func("sum", &["dur".to_string()], "total").unwrap(),
            parse_func("avg", &["dur".to_string()], "mean").unwrap(),
        ];
        let exec = StatsExecutor::new(by, funcs, 1, 1 << 30);
        let block = MapStatsBlock::new(3)
            .with_dense("app", vec!["a".into(), "a".into(), "b".into()])
            .with_dense("level", vec!["info".into(), "info".into(), "info".into()])
            .with_dense("dur", vec!["10".into(), "20".into(), "5".into()]);
        exec.write_block(0, &block);
        let mut out = CollectOutput(Vec::new());
        exec.flush(&mut out).unwrap();
        out.0.sort();
        assert_eq!(
            out.0,
            vec![
                vec!["a".to_string(), "info".to_string(), "30".to_string(), "15".to_string()],
                vec!["b".to_string(), "info".to_string(), "5".to_string(), "5".to_string()],
            ]
        );
    }

    #[test]
    fn budget_exhaustion_cancels_pipe() {
        let by = vec![ByField::new("id")];
        let funcs: Vec<Box<dyn StatsFunc>> =
            vec![parse_func("uniq", &["id".to_string()], "distinct").unwrap()];
        // tiny budget so a handful of unique ids blows through it
        let exec = StatsExecutor::new(by, funcs, 1, 8);
        for i in 0..10_000u64 {
            let block = MapStatsBlock::new(1).with_const("id", i.to_string());
            exec.write_block(0, &block);
            if exec.cancellation().is_cancelled() {
                break;
            }
        }
        assert!(exec.budget_exceeded());
        assert!(exec.cancellation().is_cancelled());
    }
}
