//! Configuration knobs recognised by the core (spec.md §6).
//!
//! `ignore_fields`/`time_field`/`msg_field` are consumed at the ingestion
//! boundary, which is out of scope for this crate; they're carried here only
//! so a single `Config` value can be threaded from the edge of the system
//! down to the filter/stats core without the caller needing two config
//! types.

use hashbrown::HashSet;

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Field names treated as stream labels; affects `_stream` filter
    /// semantics (see [`crate::filter::StreamFilter`]).
    pub stream_fields: HashSet<String>,
    /// Field names dropped before storage. Not acted on by this crate.
    pub ignore_fields: HashSet<String>,
    /// Incoming field that carries the row timestamp. Not acted on by this
    /// crate.
    pub time_field: String,
    /// Incoming field aliased to `_msg`. Not acted on by this crate.
    pub msg_field: String,
    /// Upper bound on process memory the `stats` pipe's budget is carved
    /// from (`0.3 * process_memory_limit_bytes`, spec.md §4.D).
    pub process_memory_limit_bytes: u64,
    /// Number of stats-pipe shards (one per ingestion worker).
    pub worker_count: usize,
}

impl Config {
    pub fn new(stream_fields: HashSet<String>) -> Self {
        Self {
            stream_fields,
            ignore_fields: HashSet::new(),
            time_field: "_time".to_string(),
            msg_field: "_msg".to_string(),
            process_memory_limit_bytes: 1 << 30,
            worker_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}
