//! `StreamFilter` (spec.md §4.C): narrows a block by its `streamID`,
//! resolving the `{stream-label-matchers}` to a concrete set of stream ids
//! lazily, at most once, and memoised — the resolution function itself is
//! supplied by the external index collaborator (spec.md §6).

use crate::bitmap::RowBitmap;
use crate::block::{BlockSearch, StreamId};
use hashbrown::HashSet;
use std::sync::OnceLock;

/// A label matcher against stream-labelled fields, e.g. `{app="nginx",
/// env=~"prod.*"}`. The concrete matcher grammar is part of the LogsQL
/// surface (out of scope); this crate only needs an opaque value it can
/// hand to a [`StreamResolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMatchers {
    pub raw: String,
}

impl StreamMatchers {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

/// Resolves stream label matchers to the concrete set of stream ids they
/// select. Supplied by the external index collaborator (spec.md §4.C/§6).
pub trait StreamResolver: Send + Sync {
    fn resolve(&self, matchers: &StreamMatchers) -> HashSet<StreamId>;
}

pub struct StreamFilter {
    matchers: StreamMatchers,
    resolver: Box<dyn StreamResolver>,
    resolved: OnceLock<HashSet<StreamId>>,
}

impl std::fmt::Debug for StreamFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamFilter")
            .field("matchers", &self.matchers)
            .field("resolved", &self.resolved.get().is_some())
            .finish()
    }
}

impl StreamFilter {
    pub fn new(matchers: StreamMatchers, resolver: Box<dyn StreamResolver>) -> Self {
        Self {
            matchers,
            resolver,
            resolved: OnceLock::new(),
        }
    }

    fn stream_ids(&self) -> &HashSet<StreamId> {
        self.resolved
            .get_or_init(|| self.resolver.resolve(&self.matchers))
    }
}

impl crate::filter::Filter for StreamFilter {
    fn apply(&self, block: &dyn BlockSearch, bitmap: &mut RowBitmap) {
        if bitmap.is_zero() {
            return;
        }
        if !self.stream_ids().contains(&block.stream_id()) {
            bitmap.reset_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter as _;
    use crate::test_support::StringBlock;

    struct FixedResolver(HashSet<StreamId>);
    impl StreamResolver for FixedResolver {
        fn resolve(&self, _matchers: &StreamMatchers) -> HashSet<StreamId> {
            self.0.clone()
        }
    }

    #[test]
    fn clears_when_stream_not_in_resolved_set() {
        let block = StringBlock::new("f", vec!["a", "b"]).with_stream_id(7);
        let resolver = FixedResolver([1, 2, 3].into_iter().collect());
        let filter = StreamFilter::new(StreamMatchers::new("{app=\"x\"}"), Box::new(resolver));
        let mut bm = RowBitmap::all_ones(2);
        filter.apply(&block, &mut bm);
        assert!(bm.is_zero());
    }

    #[test]
    fn keeps_when_stream_in_resolved_set() {
        let block = StringBlock::new("f", vec!["a", "b"]).with_stream_id(2);
        let resolver = FixedResolver([1, 2, 3].into_iter().collect());
        let filter = StreamFilter::new(StreamMatchers::new("{app=\"x\"}"), Box::new(resolver));
        let mut bm = RowBitmap::all_ones(2);
        filter.apply(&block, &mut bm);
        assert_eq!(bm.count_set(), 2);
    }

    #[test]
    fn resolution_is_memoised() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        struct CountingResolver(Arc<AtomicUsize>);
        impl StreamResolver for CountingResolver {
            fn resolve(&self, _matchers: &StreamMatchers) -> HashSet<StreamId> {
                self.0.fetch_add(1, Ordering::SeqCst);
                [1].into_iter().collect()
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let filter = StreamFilter::new(
            StreamMatchers::new("{app=\"x\"}"),
            Box::new(CountingResolver(calls.clone())),
        );
        let block = StringBlock::new("f", vec!["a"]).with_stream_id(1);
        for _ in 0..5 {
            let mut bm = RowBitmap::all_ones(1);
            filter.apply(&block, &mut bm);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
