//! Hash functions used by the bundled dictionary types.

/// Seed used by [`gen_hash`] and [`gen_case_hash`] unless a type overrides it.
pub const DEFAULT_HASH_SEED: u32 = 5381;

/// Thomas Wang's 32 bit integer mix.
///
/// Spreads nearby integers across the full range, which matters because
/// bucket indices are taken from the low bits of the hash.
#[inline]
pub fn int_hash(mut key: u32) -> u32 {
    key = key.wrapping_add(!(key << 15));
    key ^= key >> 10;
    key = key.wrapping_add(key << 3);
    key ^= key >> 6;
    key = key.wrapping_add(!(key << 11));
    key ^= key >> 16;
    key
}

/// Identity hash for integer keys that are already well distributed.
#[inline]
pub fn identity_hash(key: u32) -> u32 {
    key
}

/// Bernstein's djb2 (`hash * 33 + byte`) starting from `seed`.
pub fn gen_hash(buf: &[u8], seed: u32) -> u32 {
    buf.iter().fold(seed, |h, &b| {
        (h << 5).wrapping_add(h).wrapping_add(u32::from(b))
    })
}

/// ASCII case-insensitive variant of [`gen_hash`].
pub fn gen_case_hash(buf: &[u8], seed: u32) -> u32 {
    buf.iter().fold(seed, |h, &b| {
        (h << 5)
            .wrapping_add(h)
            .wrapping_add(u32::from(b.to_ascii_lowercase()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn djb2_matches_reference_values() {
        assert_eq!(gen_hash(b"", DEFAULT_HASH_SEED), 5381);
        // 5381 * 33 + 'a'
        assert_eq!(gen_hash(b"a", DEFAULT_HASH_SEED), 177_670);
        assert_eq!(gen_hash(b"ab", DEFAULT_HASH_SEED), 177_670 * 33 + 98);
    }

    #[test]
    fn case_hash_folds_ascii_only() {
        assert_eq!(
            gen_case_hash(b"HeLLo", DEFAULT_HASH_SEED),
            gen_case_hash(b"hello", DEFAULT_HASH_SEED)
        );
        assert_eq!(
            gen_case_hash(b"hello", DEFAULT_HASH_SEED),
            gen_hash(b"hello", DEFAULT_HASH_SEED)
        );
        assert_ne!(
            gen_hash(b"HeLLo", DEFAULT_HASH_SEED),
            gen_hash(b"hello", DEFAULT_HASH_SEED)
        );
    }

    #[test]
    fn seed_changes_hash() {
        assert_ne!(gen_hash(b"key", 1), gen_hash(b"key", 2));
    }

    #[test]
    fn int_hash_spreads_low_bits() {
        let low: std::collections::BTreeSet<u32> = (0..64u32).map(|k| int_hash(k) & 63).collect();
        // Sequential keys should land in many distinct low-bit buckets.
        assert!(low.len() > 32, "only {} distinct buckets", low.len());
        assert_eq!(int_hash(0), 1_177_991_625);
        assert_eq!(int_hash(1), 1_656_419_744);
        assert_eq!(identity_hash(42), 42);
    }
}
