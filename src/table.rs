//! Bucket arrays and chained entries.
//!
//! Entries live in one generational arena owned by the dictionary; a table
//! only stores chain heads, and each entry stores the link to its successor.
//! Moving an entry from one chain (or table) to another is a relink of arena
//! keys, so migration never allocates and never copies keys or values.

use slotmap::{DefaultKey, SlotMap};

pub(crate) type Link = Option<DefaultKey>;

#[derive(Debug)]
pub(crate) struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    /// Computed once at insert; rehashing never calls back into the type.
    pub(crate) hash: u64,
    pub(crate) next: Link,
}

pub(crate) type Entries<K, V> = SlotMap<DefaultKey, Entry<K, V>>;

#[derive(Debug)]
pub(crate) struct Table {
    pub(crate) buckets: Vec<Link>,
    pub(crate) mask: usize,
    pub(crate) len: usize,
}

impl Table {
    pub(crate) const fn empty() -> Self {
        Self {
            buckets: Vec::new(),
            mask: 0,
            len: 0,
        }
    }

    /// `capacity` must be a power of two.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        Self {
            buckets: vec![None; capacity],
            mask: capacity - 1,
            len: 0,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub(crate) fn is_allocated(&self) -> bool {
        !self.buckets.is_empty()
    }

    #[inline]
    pub(crate) fn bucket_of(&self, hash: u64) -> usize {
        (hash as usize) & self.mask
    }

    /// Push `k` at the head of its bucket's chain.
    pub(crate) fn push_front<K, V>(&mut self, entries: &mut Entries<K, V>, k: DefaultKey) {
        let bucket = self.bucket_of(entries[k].hash);
        entries[k].next = self.buckets[bucket];
        self.buckets[bucket] = Some(k);
        self.len += 1;
    }

    /// Unlink `target` from its chain, returning whether it was found.
    pub(crate) fn unlink<K, V>(&mut self, entries: &mut Entries<K, V>, target: DefaultKey) -> bool {
        if !self.is_allocated() {
            return false;
        }
        let bucket = self.bucket_of(entries[target].hash);
        let mut prev: Link = None;
        let mut cur = self.buckets[bucket];
        while let Some(k) = cur {
            let next = entries[k].next;
            if k == target {
                match prev {
                    None => self.buckets[bucket] = next,
                    Some(p) => entries[p].next = next,
                }
                entries[k].next = None;
                self.len -= 1;
                return true;
            }
            prev = Some(k);
            cur = next;
        }
        false
    }

    pub(crate) fn chain_len<K, V>(&self, entries: &Entries<K, V>, bucket: usize) -> usize {
        let mut n = 0;
        let mut cur = self.buckets[bucket];
        while let Some(k) = cur {
            n += 1;
            cur = entries[k].next;
        }
        n
    }
}

/// Smallest power of two that is at least `max(size, min)`, saturating at the
/// largest representable power of two.
pub(crate) fn next_power(size: usize, min: usize) -> usize {
    size.max(min)
        .checked_next_power_of_two()
        .unwrap_or(1 << (usize::BITS - 1))
}
