//! Conjunction/disjunction/negation composites (spec.md §3: "composites not
//! detailed here but follow 'apply each child, combine bitmaps with
//! AND/OR/NOT'").

use super::Filter;
use crate::bitmap::RowBitmap;
use crate::block::BlockSearch;

/// Applies each child in turn against the same (shrinking) bitmap. Because
/// every filter only clears bits, running children sequentially over one
/// shared bitmap is equivalent to intersecting each child's independent
/// result, and is cheaper.
pub struct AndFilter(Vec<Box<dyn Filter>>);

impl AndFilter {
    pub fn new(children: Vec<Box<dyn Filter>>) -> Self {
        Self(children)
    }
}

impl Filter for AndFilter {
    fn apply(&self, block: &dyn BlockSearch, bitmap: &mut RowBitmap) {
        for child in &self.0 {
            if bitmap.is_zero() {
                return;
            }
            child.apply(block, bitmap);
        }
    }
}

/// Evaluates each child against its own copy of the incoming bitmap and
/// unions the results. A child filter can only shrink a bitmap, never grow
/// it, so evaluating children against the shared (already-narrowed) bitmap
/// would be wrong for `Or` — each child needs the pre-`Or` bitmap.
pub struct OrFilter(Vec<Box<dyn Filter>>);

impl OrFilter {
    pub fn new(children: Vec<Box<dyn Filter>>) -> Self {
        Self(children)
    }
}

impl Filter for OrFilter {
    fn apply(&self, block: &dyn BlockSearch, bitmap: &mut RowBitmap) {
        if bitmap.is_zero() || self.0.is_empty() {
            return;
        }
        let incoming = bitmap.clone();
        let mut result = RowBitmap::all_zeros(bitmap.len());
        for child in &self.0 {
            let mut scratch = incoming.clone();
            child.apply(block, &mut scratch);
            result.union(&scratch);
            if result.count_set() == incoming.count_set() {
                break; // already a superset of what And-ing further could add
            }
        }
        *bitmap = result;
    }
}

/// Evaluates the child against an all-ones bitmap of the block and
/// subtracts the result from the incoming bitmap.
pub struct NotFilter(Box<dyn Filter>);

impl NotFilter {
    pub fn new(child: Box<dyn Filter>) -> Self {
        Self(child)
    }
}

impl Filter for NotFilter {
    fn apply(&self, block: &dyn BlockSearch, bitmap: &mut RowBitmap) {
        if bitmap.is_zero() {
            return;
        }
        let mut child_bm = RowBitmap::all_ones(bitmap.len());
        self.0.apply(block, &mut child_bm);
        bitmap.subtract(&child_bm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{PhraseFilter, PrefixFilter};
    use crate::test_support::StringBlock;

    #[test]
    fn and_intersects() {
        let block = StringBlock::new("msg", vec!["foo bar", "foo baz", "qux bar"]);
        let mut bm = RowBitmap::all_ones(3);
        AndFilter::new(vec![
            Box::new(PhraseFilter::new("msg", "foo")),
            Box::new(PhraseFilter::new("msg", "bar")),
        ])
        .apply(&block, &mut bm);
        assert!(bm.is_set_bit(0));
        assert!(!bm.is_set_bit(1));
        assert!(!bm.is_set_bit(2));
    }

    #[test]
    fn or_unions() {
        let block = StringBlock::new("msg", vec!["foo", "bar", "qux"]);
        let mut bm = RowBitmap::all_ones(3);
        OrFilter::new(vec![
            Box::new(PrefixFilter::new("msg", "foo")),
            Box::new(PrefixFilter::new("msg", "bar")),
        ])
        .apply(&block, &mut bm);
        assert!(bm.is_set_bit(0));
        assert!(bm.is_set_bit(1));
        assert!(!bm.is_set_bit(2));
    }

    #[test]
    fn not_inverts() {
        let block = StringBlock::new("msg", vec!["foo", "bar"]);
        let mut bm = RowBitmap::all_ones(2);
        NotFilter::new(Box::new(PrefixFilter::new("msg", "foo"))).apply(&block, &mut bm);
        assert!(!bm.is_set_bit(0));
        assert!(bm.is_set_bit(1));
    }

    // P1: monotone bitmap for composites too.
    #[test]
    fn composites_never_widen() {
        let block = StringBlock::new("msg", vec!["foo", "bar", "qux"]);
        let mut bm = RowBitmap::all_ones(3);
        bm.reset_bits([2]);
        let before = bm.count_set();
        OrFilter::new(vec![
            Box::new(PrefixFilter::new("msg", "foo")),
            Box::new(PrefixFilter::new("msg", "q")),
        ])
        .apply(&block, &mut bm);
        assert!(bm.count_set() <= before);
    }
}
