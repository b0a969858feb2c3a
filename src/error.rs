//! Error taxonomy for the query core.
//!
//! Three tiers, matching the engine's failure model:
//!
//! * [`QueryError`] — bad user input (unknown stats function, bad bucket
//!   spec). Returned synchronously, no partial results. An unparsable
//!   numeric needle against a typed column is not an error: the filter core
//!   just clears the bitmap for that predicate (spec.md §4.C).
//! * [`StatsError`] — the stats pipe's memory budget was exceeded. Returned
//!   from `flush` after cancelling upstream.
//! * Fatal invariant breaks (unknown `ValueType`, mis-sized cell, corrupt
//!   group-key) are not represented here: they `panic!` at the call site,
//!   since they indicate corrupt storage and are not recoverable.

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum QueryError {
    #[snafu(display("cannot parse bucket size/offset {value:?}: {reason}"))]
    InvalidBucket { value: String, reason: String },

    #[snafu(display("unknown stats function {name:?}"))]
    UnknownStatsFunc { name: String },
}

pub type QueryResult<T> = std::result::Result<T, QueryError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StatsError {
    #[snafu(display("cannot calculate [stats], exceeds {budget_mib} MiB"))]
    BudgetExceeded { budget_mib: u64 },
}

pub type StatsResult<T> = std::result::Result<T, StatsError>;

/// Raised (as a panic) when a block violates an encoding invariant the
/// evaluator depends on. These indicate corrupt storage, not bad queries.
#[track_caller]
pub(crate) fn fatal_invariant(part_path: &str, field: &str, msg: impl AsRef<str>) -> ! {
    tracing::error!(part_path, field, msg = msg.as_ref(), "fatal invariant break");
    panic!(
        "corrupt block in part {:?}, column {:?}: {}",
        part_path,
        field,
        msg.as_ref()
    );
}
