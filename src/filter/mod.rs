//! Filter evaluator (spec.md §4.C) — the filter tree's `apply` contract,
//! per-encoding dispatch for text filters, and the composite/stream filter
//! kinds.
//!
//! Common contract for every [`Filter`] impl: `apply` narrows the bitmap
//! in-place, never widens it (I1/P1). Every filter first tests the
//! const-column fast path (P2): if the block advertises a const value for
//! the field, evaluate the predicate on it once and clear all bits iff it
//! fails.

mod composite;
mod stream;
mod text;

pub use composite::{AndFilter, NotFilter, OrFilter};
pub use stream::{StreamFilter, StreamMatchers, StreamResolver};
pub use text::{AnyCasePhraseFilter, PhraseFilter, PrefixFilter, TextMatch};

use crate::bitmap::RowBitmap;
use crate::block::BlockSearch;

/// A node in the filter tree. Every filter only ever clears bits in
/// `bitmap`; it never sets one (I1).
pub trait Filter: Send + Sync {
    fn apply(&self, block: &dyn BlockSearch, bitmap: &mut RowBitmap);
}

impl<T: Filter + ?Sized> Filter for Box<T> {
    fn apply(&self, block: &dyn BlockSearch, bitmap: &mut RowBitmap) {
        (**self).apply(block, bitmap)
    }
}

/// A fully type-erased filter tree node, used when the tree is built
/// dynamically (e.g. from a parsed query).
pub enum FilterNode {
    Stream(StreamFilter),
    Prefix(PrefixFilter),
    Phrase(PhraseFilter),
    AnyCasePhrase(AnyCasePhraseFilter),
    And(AndFilter),
    Or(OrFilter),
    Not(NotFilter),
}

impl Filter for FilterNode {
    fn apply(&self, block: &dyn BlockSearch, bitmap: &mut RowBitmap) {
        match self {
            Self::Stream(f) => f.apply(block, bitmap),
            Self::Prefix(f) => f.apply(block, bitmap),
            Self::Phrase(f) => f.apply(block, bitmap),
            Self::AnyCasePhrase(f) => f.apply(block, bitmap),
            Self::And(f) => f.apply(block, bitmap),
            Self::Or(f) => f.apply(block, bitmap),
            Self::Not(f) => f.apply(block, bitmap),
        }
    }
}
