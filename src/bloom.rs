//! Bloom filter contract and a simple reference implementation.
//!
//! spec.md §6 specifies only the `containsAll` contract consumed from the
//! block store; a concrete bloom filter is otherwise out of scope (it lives
//! in the physical block store). [`SimpleBloomFilter`] is a minimal
//! in-crate implementation used by tests and available to callers that
//! don't have their own.

use crate::block::BloomFilter;

/// `matchBloomFilterAllTokens` (spec.md §4.C): true iff every token is
/// present in the column's bloom filter. An empty token list returns true —
/// no information, so the filter cannot reject (P3: the filter may
/// over-accept but never under-accept).
pub fn match_bloom_filter_all_tokens(filter: Option<&dyn BloomFilter>, tokens: &[&str]) -> bool {
    if tokens.is_empty() {
        return true;
    }
    match filter {
        Some(f) => f.contains_all(tokens),
        // No filter available: cannot reject based on absence of information.
        None => true,
    }
}

/// A small fixed-size bloom filter over FNV-1a-hashed tokens, with `k`
/// independent hash probes derived by splitting one 64-bit hash into two
/// halves and combining them (the classic "double hashing" trick), avoiding
/// the cost of `k` independent hash functions.
#[derive(Debug, Clone)]
pub struct SimpleBloomFilter {
    bits: Vec<u64>,
    num_bits: u64,
    k: u32,
}

impl SimpleBloomFilter {
    pub fn new(num_bits: u64, k: u32) -> Self {
        let words = (num_bits as usize).div_ceil(64).max(1);
        Self {
            bits: vec![0u64; words],
            num_bits: num_bits.max(1),
            k: k.max(1),
        }
    }

    /// Sized for `expected_items` at a ~1% false-positive rate, with 7 hash
    /// probes (the conventional choice for that error rate).
    pub fn for_expected_items(expected_items: usize) -> Self {
        let bits = ((expected_items.max(1) as f64) * 9.6).ceil() as u64;
        Self::new(bits, 7)
    }

    pub fn insert(&mut self, token: &str) {
        for h in self.probes(token) {
            self.bits[(h / 64) as usize] |= 1 << (h % 64);
        }
    }

    pub fn insert_all<'a>(&mut self, tokens: impl IntoIterator<Item = &'a str>) {
        for t in tokens {
            self.insert(t);
        }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.probes(token)
            .all(|h| self.bits[(h / 64) as usize] & (1 << (h % 64)) != 0)
    }

    fn probes(&self, token: &str) -> impl Iterator<Item = u64> + '_ {
        let hash = fnv1a64(token.as_bytes());
        let h1 = hash;
        let h2 = hash.rotate_left(32) | 1; // ensure odd step for full coverage
        (0..self.k).map(move |i| h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.num_bits)
    }
}

impl BloomFilter for SimpleBloomFilter {
    fn contains_all(&self, tokens: &[&str]) -> bool {
        tokens.iter().all(|t| self.contains(t))
    }
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_inserted_tokens() {
        let mut bf = SimpleBloomFilter::for_expected_items(16);
        bf.insert_all(["disk", "full", "error"]);
        assert!(bf.contains_all(&["disk", "full"]));
        assert!(!bf.contains_all(&["disk", "missing-token-xyz"]));
    }

    // P3 (soundness half): never reject a token that was inserted.
    #[test]
    fn never_false_negative() {
        let mut bf = SimpleBloomFilter::for_expected_items(100);
        let tokens: Vec<String> = (0..100).map(|i| format!("tok{i}")).collect();
        bf.insert_all(tokens.iter().map(String::as_str));
        for t in &tokens {
            assert!(bf.contains(t));
        }
    }

    #[test]
    fn empty_tokens_never_rejects() {
        let bf = SimpleBloomFilter::for_expected_items(10);
        assert!(match_bloom_filter_all_tokens(Some(&bf), &[]));
        assert!(match_bloom_filter_all_tokens(None, &["anything"]));
    }
}
