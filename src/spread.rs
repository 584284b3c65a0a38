//! Supplemental hash spreading for segment selection.
//!
//! Segment indices are taken from the *high* bits of a key's hash, and the
//! segment table is always a power of two. A weak `Hash` implementation that
//! clusters in either the low or high bits would therefore pile keys onto a
//! handful of segments. `spread` defends against that by running every hash
//! through a fixed Wang/Jenkins-variant bit mix with full avalanche before
//! any indexing happens.
//!
//! Both functions are deterministic and pure; neither is part of the public
//! API.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

/// Folds a key's 64-bit `FxHasher` output down to the 32 bits the spreading
/// mix operates on.
///
/// `FxHasher` is seedless, so the result is stable across runs and builds on
/// the same target, which the segment-index introspection tests rely on.
#[inline]
pub(crate) fn hash_of<K: Hash + ?Sized>(key: &K) -> u32 {
    let mut hasher = FxHasher::default();
    key.hash(&mut hasher);
    let h = hasher.finish();
    (h ^ (h >> 32)) as u32
}

/// Spreads bits of `h` to regularize both segment and bucket locations.
///
/// Variant of the single-word Wang/Jenkins hash. The step order is fixed;
/// all arithmetic wraps.
#[inline]
pub(crate) fn spread(mut h: u32) -> u32 {
    h = h.wrapping_add((h << 15) ^ 0xffff_cd7d);
    h ^= h >> 10;
    h = h.wrapping_add(h << 3);
    h ^= h >> 6;
    h = h.wrapping_add((h << 2).wrapping_add(h << 14));
    h ^ (h >> 16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spread_is_deterministic() {
        for h in [0u32, 1, 16, u32::MAX, 0xdead_beef] {
            assert_eq!(spread(h), spread(h));
        }
    }

    #[test]
    fn spread_moves_zero() {
        // First mix step adds the odd constant, so zero never maps to zero.
        assert_ne!(spread(0), 0);
    }

    #[test]
    fn spread_scatters_sequential_inputs_across_high_bits() {
        // Sequential integers differ only in their low bits; after spreading,
        // the top four bits (the segment-index bits for a 16-segment map)
        // must not all agree.
        let mut seen = std::collections::HashSet::new();
        for h in 0u32..1024 {
            seen.insert(spread(h) >> 28);
        }
        assert!(seen.len() > 4, "high bits barely moved: {seen:?}");
    }

    #[test]
    fn hash_of_is_deterministic() {
        assert_eq!(hash_of(&42u64), hash_of(&42u64));
        assert_eq!(hash_of("key"), hash_of("key"));
    }

    #[test]
    fn hash_of_differs_for_nearby_keys() {
        let hashes: std::collections::HashSet<u32> =
            (0u64..64).map(|k| hash_of(&k)).collect();
        assert_eq!(hashes.len(), 64);
    }
}
