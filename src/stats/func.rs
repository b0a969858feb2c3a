//! The `StatsFunc` catalogue and `StatsProcessor` contract (spec.md §4.D).
//!
//! `StatsFunc` is the immutable, shared-across-groups description of one
//! aggregate (which fields it needs, how to build fresh per-group state);
//! `StatsProcessor` is the mutable per-group state that actually folds rows
//! in. Merging across shards goes through `merge_state`, which downcasts —
//! the usual way to merge heterogeneous trait objects in Rust without a
//! closed enum.

use crate::error::{QueryError, QueryResult};
use crate::stats::source::StatsBlock;
use std::any::Any;
use std::fmt::Debug;

/// Per-group aggregation state for one `StatsFunc`. `update_*` return the
/// signed byte delta the call added to this processor's own heap footprint,
/// for [`crate::stats::budget::MemoryBudget`] accounting — fixed-size
/// processors (`count`, `sum`, `min`, `max`, `avg`) always return 0; `uniq`
/// is the one whose state genuinely grows.
pub trait StatsProcessor: Debug + Send {
    fn update_stats_for_all_rows(&mut self, block: &dyn StatsBlock) -> i64;
    fn update_stats_for_row(&mut self, block: &dyn StatsBlock, row: usize) -> i64;
    fn merge_state(&mut self, other: &dyn StatsProcessor);
    fn finalize_stats(&self) -> String;
    fn as_any(&self) -> &dyn Any;
}

pub trait StatsFunc: Debug + Send + Sync {
    fn result_name(&self) -> &str;
    fn needed_fields(&self) -> &[String];
    fn new_processor(&self) -> Box<dyn StatsProcessor>;
}

fn parse_cell(s: &str) -> f64 {
    s.parse::<f64>().unwrap_or(0.0)
}

// ---- count() ---------------------------------------------------------

#[derive(Debug)]
pub struct CountFunc {
    name: String,
}

impl CountFunc {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl StatsFunc for CountFunc {
    fn result_name(&self) -> &str {
        &self.name
    }
    fn needed_fields(&self) -> &[String] {
        &[]
    }
    fn new_processor(&self) -> Box<dyn StatsProcessor> {
        Box::new(CountProcessor(0))
    }
}

#[derive(Debug, Default)]
struct CountProcessor(u64);

impl StatsProcessor for CountProcessor {
    fn update_stats_for_all_rows(&mut self, block: &dyn StatsBlock) -> i64 {
        self.0 += block.row_count() as u64;
        0
    }
    fn update_stats_for_row(&mut self, _block: &dyn StatsBlock, _row: usize) -> i64 {
        self.0 += 1;
        0
    }
    fn merge_state(&mut self, other: &dyn StatsProcessor) {
        self.0 += other.as_any().downcast_ref::<CountProcessor>().unwrap().0;
    }
    fn finalize_stats(&self) -> String {
        self.0.to_string()
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ---- sum(field) / min(field) / max(field) / avg(field) --------------

#[derive(Debug)]
pub struct SumFunc {
    name: String,
    fields: [String; 1],
}

impl SumFunc {
    pub fn new(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: [field.into()],
        }
    }
}

impl StatsFunc for SumFunc {
    fn result_name(&self) -> &str {
        &self.name
    }
    fn needed_fields(&self) -> &[String] {
        &self.fields
    }
    fn new_processor(&self) -> Box<dyn StatsProcessor> {
        Box::new(SumProcessor { field: self.fields[0].clone(), sum: 0.0 })
    }
}

#[derive(Debug)]
struct SumProcessor {
    field: String,
    sum: f64,
}

impl StatsProcessor for SumProcessor {
    fn update_stats_for_all_rows(&mut self, block: &dyn StatsBlock) -> i64 {
        let col = block.column(&self.field);
        for i in 0..block.row_count() {
            self.sum += parse_cell(col.get(i));
        }
        0
    }
    fn update_stats_for_row(&mut self, block: &dyn StatsBlock, row: usize) -> i64 {
        self.sum += parse_cell(block.column(&self.field).get(row));
        0
    }
    fn merge_state(&mut self, other: &dyn StatsProcessor) {
        self.sum += other.as_any().downcast_ref::<SumProcessor>().unwrap().sum;
    }
    fn finalize_stats(&self) -> String {
        crate::column::decode::to_float_string(self.sum)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct MaxFunc {
    name: String,
    fields: [String; 1],
}

impl MaxFunc {
    pub fn new(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: [field.into()],
        }
    }
}

impl StatsFunc for MaxFunc {
    fn result_name(&self) -> &str {
        &self.name
    }
    fn needed_fields(&self) -> &[String] {
        &self.fields
    }
    fn new_processor(&self) -> Box<dyn StatsProcessor> {
        Box::new(MaxProcessor { field: self.fields[0].clone(), max: None })
    }
}

#[derive(Debug)]
struct MaxProcessor {
    field: String,
    max: Option<f64>,
}

impl StatsProcessor for MaxProcessor {
    fn update_stats_for_all_rows(&mut self, block: &dyn StatsBlock) -> i64 {
        let col = block.column(&self.field);
        for i in 0..block.row_count() {
            self.fold(parse_cell(col.get(i)));
        }
        0
    }
    fn update_stats_for_row(&mut self, block: &dyn StatsBlock, row: usize) -> i64 {
        self.fold(parse_cell(block.column(&self.field).get(row)));
        0
    }
    fn merge_state(&mut self, other: &dyn StatsProcessor) {
        if let Some(v) = other.as_any().downcast_ref::<MaxProcessor>().unwrap().max {
            self.fold(v);
        }
    }
    fn finalize_stats(&self) -> String {
        self.max.map(crate::column::decode::to_float_string).unwrap_or_default()
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl MaxProcessor {
    fn fold(&mut self, v: f64) {
        self.max = Some(self.max.map_or(v, |cur| cur.max(v)));
    }
}

#[derive(Debug)]
pub struct MinFunc {
    name: String,
    fields: [String; 1],
}

impl MinFunc {
    pub fn new(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: [field.into()],
        }
    }
}

impl StatsFunc for MinFunc {
    fn result_name(&self) -> &str {
        &self.name
    }
    fn needed_fields(&self) -> &[String] {
        &self.fields
    }
    fn new_processor(&self) -> Box<dyn StatsProcessor> {
        Box::new(MinProcessor { field: self.fields[0].clone(), min: None })
    }
}

#[derive(Debug)]
struct MinProcessor {
    field: String,
    min: Option<f64>,
}

impl StatsProcessor for MinProcessor {
    fn update_stats_for_all_rows(&mut self, block: &dyn StatsBlock) -> i64 {
        let col = block.column(&self.field);
        for i in 0..block.row_count() {
            self.fold(parse_cell(col.get(i)));
        }
        0
    }
    fn update_stats_for_row(&mut self, block: &dyn StatsBlock, row: usize) -> i64 {
        self.fold(parse_cell(block.column(&self.field).get(row)));
        0
    }
    fn merge_state(&mut self, other: &dyn StatsProcessor) {
        if let Some(v) = other.as_any().downcast_ref::<MinProcessor>().unwrap().min {
            self.fold(v);
        }
    }
    fn finalize_stats(&self) -> String {
        self.min.map(crate::column::decode::to_float_string).unwrap_or_default()
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl MinProcessor {
    fn fold(&mut self, v: f64) {
        self.min = Some(self.min.map_or(v, |cur| cur.min(v)));
    }
}

#[derive(Debug)]
pub struct AvgFunc {
    name: String,
    fields: [String; 1],
}

impl AvgFunc {
    pub fn new(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: [field.into()],
        }
    }
}

impl StatsFunc for AvgFunc {
    fn result_name(&self) -> &str {
        &self.name
    }
    fn needed_fields(&self) -> &[String] {
        &self.fields
    }
    fn new_processor(&self) -> Box<dyn StatsProcessor> {
        Box::new(AvgProcessor { field: self.fields[0].clone(), sum: 0.0, count: 0 })
    }
}

#[derive(Debug)]
struct AvgProcessor {
    field: String,
    sum: f64,
    count: u64,
}

impl StatsProcessor for AvgProcessor {
    fn update_stats_for_all_rows(&mut self, block: &dyn StatsBlock) -> i64 {
        let col = block.column(&self.field);
        for i in 0..block.row_count() {
            self.sum += parse_cell(col.get(i));
        }
        self.count += block.row_count() as u64;
        0
    }
    fn update_stats_for_row(&mut self, block: &dyn StatsBlock, row: usize) -> i64 {
        self.sum += parse_cell(block.column(&self.field).get(row));
        self.count += 1;
        0
    }
    fn merge_state(&mut self, other: &dyn StatsProcessor) {
        let o = other.as_any().downcast_ref::<AvgProcessor>().unwrap();
        self.sum += o.sum;
        self.count += o.count;
    }
    fn finalize_stats(&self) -> String {
        if self.count == 0 {
            "0".to_string()
        } else {
            crate::column::decode::to_float_string(self.sum / self.count as f64)
        }
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ---- uniq(field [, field ...]) ----------------------------------------

#[derive(Debug)]
pub struct UniqFunc {
    name: String,
    fields: Vec<String>,
}

impl UniqFunc {
    pub fn new(name: impl Into<String>, fields: Vec<String>) -> Self {
        Self { name: name.into(), fields }
    }
}

impl StatsFunc for UniqFunc {
    fn result_name(&self) -> &str {
        &self.name
    }
    fn needed_fields(&self) -> &[String] {
        &self.fields
    }
    fn new_processor(&self) -> Box<dyn StatsProcessor> {
        Box::new(UniqProcessor { fields: self.fields.clone(), seen: hashbrown::HashSet::new() })
    }
}

#[derive(Debug)]
struct UniqProcessor {
    fields: Vec<String>,
    seen: hashbrown::HashSet<Vec<u8>>,
}

impl UniqProcessor {
    fn key_for_row(&self, block: &dyn StatsBlock, row: usize) -> Vec<u8> {
        let cols: Vec<_> = self.fields.iter().map(|f| block.column(f)).collect();
        let values: Vec<&str> = cols.iter().map(|c| c.get(row)).collect();
        crate::stats::key::encode_group_key(values)
    }

    fn insert(&mut self, key: Vec<u8>) -> i64 {
        let len = key.len() as i64;
        if self.seen.insert(key) {
            len + std::mem::size_of::<Vec<u8>>() as i64
        } else {
            0
        }
    }
}

impl StatsProcessor for UniqProcessor {
    fn update_stats_for_all_rows(&mut self, block: &dyn StatsBlock) -> i64 {
        let mut delta = 0;
        for row in 0..block.row_count() {
            let key = self.key_for_row(block, row);
            delta += self.insert(key);
        }
        delta
    }
    fn update_stats_for_row(&mut self, block: &dyn StatsBlock, row: usize) -> i64 {
        let key = self.key_for_row(block, row);
        self.insert(key)
    }
    fn merge_state(&mut self, other: &dyn StatsProcessor) {
        let o = other.as_any().downcast_ref::<UniqProcessor>().unwrap();
        for key in &o.seen {
            self.seen.insert(key.clone());
        }
    }
    fn finalize_stats(&self) -> String {
        self.seen.len().to_string()
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Parses one `name(args...) as result` aggregate spec from the catalogue of
/// six functions spec.md §4.D names. `args` are already split on commas.
pub fn parse_func(kind: &str, args: &[String], result_name: &str) -> QueryResult<Box<dyn StatsFunc>> {
    match (kind, args) {
        ("count", []) => Ok(Box::new(CountFunc::new(result_name))),
        ("sum", [field]) => Ok(Box::new(SumFunc::new(result_name, field.clone()))),
        ("max", [field]) => Ok(Box::new(MaxFunc::new(result_name, field.clone()))),
        ("min", [field]) => Ok(Box::new(MinFunc::new(result_name, field.clone()))),
        ("avg", [field]) => Ok(Box::new(AvgFunc::new(result_name, field.clone()))),
        ("uniq", fields) if !fields.is_empty() => {
            Ok(Box::new(UniqFunc::new(result_name, fields.to_vec())))
        }
        (other, _) => Err(QueryError::UnknownStatsFunc { name: other.to_string() }),
    }
}
