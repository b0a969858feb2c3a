//! Per-block row survival bitmap.
//!
//! Backed by a Roaring bitmap (the teacher's `read_buffer` crate pulls in
//! `croaring` for exactly this kind of row-id set). A block's bitmap starts
//! all-ones and is only ever narrowed by filters (invariant I1): once a bit
//! is reset it is never re-set by a later filter within the same block.

use croaring::Bitmap;

/// A fixed-length bitmap of `N` bits over one block's rows.
#[derive(Clone)]
pub struct RowBitmap {
    bits: Bitmap,
    len: u32,
}

impl std::fmt::Debug for RowBitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowBitmap")
            .field("len", &self.len)
            .field("set", &self.bits.cardinality())
            .finish()
    }
}

impl RowBitmap {
    /// A bitmap of `len` rows with every bit set (the initial state for a
    /// freshly read block).
    pub fn all_ones(len: u32) -> Self {
        let mut bits = Bitmap::new();
        if len > 0 {
            bits.add_range(0..len);
        }
        Self { bits, len }
    }

    /// A bitmap of `len` rows with every bit clear.
    pub fn all_zeros(len: u32) -> Self {
        Self {
            bits: Bitmap::new(),
            len,
        }
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sets the given row ids. Only used when building a fresh bitmap
    /// (e.g. `Or` combining two filter results) — filters narrowing a
    /// shared bitmap must only call [`Self::reset_bits`].
    pub fn set_bits<I: IntoIterator<Item = u32>>(&mut self, ids: I) {
        for id in ids {
            debug_assert!(id < self.len);
            self.bits.add(id);
        }
    }

    /// Clears the given row ids.
    pub fn reset_bits<I: IntoIterator<Item = u32>>(&mut self, ids: I) {
        for id in ids {
            self.bits.remove(id);
        }
    }

    /// Clears every bit.
    pub fn reset_all(&mut self) {
        self.bits.clear();
    }

    pub fn is_zero(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn is_set_bit(&self, i: u32) -> bool {
        self.bits.contains(i)
    }

    pub fn count_set(&self) -> u64 {
        self.bits.cardinality()
    }

    /// Visits every set bit in ascending order; `f` returns whether to keep
    /// going. Mirrors spec.md's `forEachSetBit(f) -> continue?`.
    pub fn for_each_set_bit(&self, mut f: impl FnMut(u32) -> bool) {
        for id in self.bits.iter() {
            if !f(id) {
                break;
            }
        }
    }

    /// Union of two bitmaps of equal length. Used by `Filter::Or`, where
    /// each child filter narrows its own copy of the incoming bitmap and the
    /// results are combined.
    pub fn union(&mut self, other: &Self) {
        assert_eq!(self.len, other.len, "bitmap length mismatch in union");
        self.bits |= &other.bits;
    }

    /// In-place intersection (`Filter::And`'s combinator, though in practice
    /// `And` is implemented by running filters in sequence over the shared
    /// bitmap, which is equivalent and cheaper).
    pub fn intersect(&mut self, other: &Self) {
        assert_eq!(self.len, other.len, "bitmap length mismatch in intersect");
        self.bits &= &other.bits;
    }

    /// `self := self - other` (used by `Filter::Not`).
    pub fn subtract(&mut self, other: &Self) {
        assert_eq!(self.len, other.len, "bitmap length mismatch in subtract");
        self.bits -= &other.bits;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_ones_sets_every_bit() {
        let bm = RowBitmap::all_ones(4);
        assert_eq!(bm.count_set(), 4);
        for i in 0..4 {
            assert!(bm.is_set_bit(i));
        }
    }

    #[test]
    fn reset_bits_only_clears() {
        let mut bm = RowBitmap::all_ones(4);
        bm.reset_bits([1, 3]);
        assert!(bm.is_set_bit(0));
        assert!(!bm.is_set_bit(1));
        assert!(bm.is_set_bit(2));
        assert!(!bm.is_set_bit(3));
    }

    #[test]
    fn for_each_set_bit_stops_early() {
        let bm = RowBitmap::all_ones(10);
        let mut seen = Vec::new();
        bm.for_each_set_bit(|i| {
            seen.push(i);
            i < 2
        });
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn is_zero() {
        let mut bm = RowBitmap::all_ones(3);
        assert!(!bm.is_zero());
        bm.reset_all();
        assert!(bm.is_zero());
    }

    #[test]
    fn union_and_subtract() {
        let mut a = RowBitmap::all_zeros(4);
        a.set_bits([0, 1]);
        let mut b = RowBitmap::all_zeros(4);
        b.set_bits([1, 2]);
        a.union(&b);
        assert_eq!(a.count_set(), 3);

        let mut all = RowBitmap::all_ones(4);
        all.subtract(&a);
        assert!(all.is_set_bit(3));
        assert!(!all.is_set_bit(0));
    }
}
