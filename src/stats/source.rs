//! The narrow surface the stats pipe needs from a post-filter row stream
//! (spec.md §4.D: "operates on the rows surviving the filter pipe, already
//! rendered to their canonical string form").
//!
//! This is deliberately not [`crate::block::BlockSearch`]: by the time rows
//! reach the stats pipe, the filter pipe has already applied the bitmap and
//! rendered every needed column, so the stats pipe only ever deals in dense
//! or constant string columns, never raw encodings or row bitmaps.

use std::borrow::Cow;

/// One column's values across the live rows of a [`StatsBlock`].
#[derive(Debug, Clone)]
pub enum StatsColumn<'a> {
    /// Every live row has this value — the common case for e.g. `level` in
    /// a block written by a single process.
    Const(Cow<'a, str>),
    Dense(Cow<'a, [String]>),
}

impl<'a> StatsColumn<'a> {
    pub fn get(&self, row: usize) -> &str {
        match self {
            StatsColumn::Const(v) => v,
            StatsColumn::Dense(v) => &v[row],
        }
    }
}

/// A batch of rows already narrowed by the filter pipe, exposing only the
/// fields the active `StatsFunc`s asked for via `needed_fields`.
pub trait StatsBlock {
    fn row_count(&self) -> usize;
    /// Rendered values for `field`. Panics if `field` wasn't among the
    /// fields this block was constructed with — a caller bug, not a runtime
    /// condition (spec.md §7: internal contract violation, not a query
    /// error).
    fn column(&self, field: &str) -> StatsColumn<'_>;
}

/// In-memory [`StatsBlock`] used by the executor's own tests and available
/// to callers who materialise rows before handing them to the pipe.
#[derive(Debug, Clone, Default)]
pub struct MapStatsBlock {
    pub row_count: usize,
    pub columns: hashbrown::HashMap<String, StatsColumn<'static>>,
}

impl MapStatsBlock {
    pub fn new(row_count: usize) -> Self {
        Self {
            row_count,
            columns: hashbrown::HashMap::new(),
        }
    }

    pub fn with_const(mut self, field: &str, value: impl Into<String>) -> Self {
        self.columns
            .insert(field.to_string(), StatsColumn::Const(Cow::Owned(value.into())));
        self
    }

    pub fn with_dense(mut self, field: &str, values: Vec<String>) -> Self {
        assert_eq!(values.len(), self.row_count);
        self.columns
            .insert(field.to_string(), StatsColumn::Dense(Cow::Owned(values)));
        self
    }
}

impl StatsBlock for MapStatsBlock {
    fn row_count(&self) -> usize {
        self.row_count
    }

    fn column(&self, field: &str) -> StatsColumn<'_> {
        match self.columns.get(field) {
            Some(StatsColumn::Const(v)) => StatsColumn::Const(Cow::Borrowed(v)),
            Some(StatsColumn::Dense(v)) => StatsColumn::Dense(Cow::Borrowed(v)),
            None => panic!("stats block has no column {field:?}"),
        }
    }
}
