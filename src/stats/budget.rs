//! Global memory budget and cooperative cancellation for the stats pipe
//! (spec.md §4.D "Memory budget & cancellation", §7.2).
//!
//! The budget is a single process-wide signed counter seeded at `0.3 *
//! process_memory_limit`. Shards never touch it directly on every update;
//! each shard keeps a local allotment and only reaches for the global
//! counter in 1 MiB chunks, so the atomic is contended at most once per MiB
//! of growth per shard rather than once per row.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

pub const CHUNK_BYTES: i64 = 1 << 20;

/// A `stopCh`-style cooperative cancellation token. Closing the channel (by
/// dropping the sender) is the cancellation signal; every receiver sees it
/// on its next poll via a disconnected `try_recv`.
pub struct Cancellation {
    tx: parking_lot::Mutex<Option<Sender<()>>>,
    rx: Receiver<()>,
}

impl Cancellation {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            tx: parking_lot::Mutex::new(Some(tx)),
            rx,
        }
    }

    /// Idempotent: closing an already-closed channel is a no-op.
    pub fn cancel(&self) {
        self.tx.lock().take();
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.rx.try_recv(),
            Err(crossbeam_channel::TryRecvError::Disconnected)
        )
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide memory budget shared by all shards of one `stats` pipe
/// execution.
pub struct MemoryBudget {
    remaining: AtomicI64,
    exceeded: AtomicBool,
    initial_mib: u64,
}

impl MemoryBudget {
    pub fn new(process_memory_limit_bytes: u64) -> Self {
        let budget_bytes = (process_memory_limit_bytes as f64 * 0.3) as i64;
        Self {
            remaining: AtomicI64::new(budget_bytes),
            exceeded: AtomicBool::new(false),
            initial_mib: (budget_bytes.max(0) as u64) / CHUNK_BYTES as u64,
        }
    }

    /// Steals one more `CHUNK_BYTES` chunk from the global counter. The
    /// counter is free to go negative — that's the over-budget signal, not a
    /// bug. The first transition across zero fires `cancel` exactly once.
    pub fn steal_chunk(&self, cancel: &Cancellation) {
        let prev = self.remaining.fetch_sub(CHUNK_BYTES, Ordering::SeqCst);
        if prev - CHUNK_BYTES < 0 && prev >= 0 && !self.exceeded.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                initial_mib = self.initial_mib,
                "stats memory budget exhausted; cancelling query"
            );
            cancel.cancel();
        }
    }

    pub fn exceeded(&self) -> bool {
        self.exceeded.load(Ordering::SeqCst)
    }

    pub fn initial_mib(&self) -> u64 {
        self.initial_mib
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancels_on_first_negative_crossing() {
        let budget = MemoryBudget::new(CHUNK_BYTES as u64 * 3); // 0.3 * limit == ~3 chunks after scaling... use a direct remaining setup instead
        let cancel = Cancellation::new();
        // Force remaining near zero directly to make the test deterministic.
        budget.remaining.store(CHUNK_BYTES / 2, Ordering::SeqCst);
        assert!(!cancel.is_cancelled());
        budget.steal_chunk(&cancel);
        assert!(budget.exceeded());
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn does_not_cancel_while_comfortably_positive() {
        let budget = MemoryBudget::new(10 * CHUNK_BYTES as u64 * 10);
        let cancel = Cancellation::new();
        budget.steal_chunk(&cancel);
        assert!(!budget.exceeded());
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn cancel_is_idempotent() {
        let cancel = Cancellation::new();
        cancel.cancel();
        cancel.cancel();
        assert!(cancel.is_cancelled());
    }
}
