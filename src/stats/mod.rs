//! Sharded streaming `stats` pipe (spec.md §4.D).
//!
//! Consumes rows the filter pipe has already narrowed and rendered, groups
//! them by zero or more `by` fields (optionally bucketed), and folds them
//! through a small catalogue of aggregate functions, sharded one-per-worker
//! for lock-free ingestion and merged at flush time.

pub mod budget;
pub mod by_field;
pub mod executor;
pub mod func;
pub mod key;
pub mod source;

pub use budget::{Cancellation, MemoryBudget};
pub use by_field::ByField;
pub use executor::{OutputRow, PipeOutput, StatsExecutor};
pub use func::{parse_func, StatsFunc, StatsProcessor};
pub use source::{MapStatsBlock, StatsBlock, StatsColumn};
