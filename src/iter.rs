//! Iteration over a [`Dict`].
//!
//! - [`Iter`] borrows the dictionary, so it cannot observe any modification
//!   and needs no bookkeeping. It walks the active table, then the incoming
//!   one while a migration is in progress.
//! - [`IterMut`] visits values mutably in arena order.
//! - [`SafeIter`] is a detached cursor. Between steps the caller may insert,
//!   delete or look up through the dictionary. While it is live the
//!   dictionary suspends opportunistic rehashing, so no entry moves under
//!   the cursor and every entry present for the whole walk is yielded
//!   exactly once.

use crate::dict::{Dict, Handle};
use crate::dict_type::DictType;
use crate::table::{Entries, Entry, Link, Table};
use crate::tokens::IterToken;
use slotmap::DefaultKey;

/// Borrowing iterator in bucket order.
pub struct Iter<'a, T: DictType> {
    tables: &'a [Table; 2],
    entries: &'a Entries<T::Key, T::Value>,
    rehashing: bool,
    table: usize,
    next_bucket: usize,
    next: Link,
    remaining: usize,
}

impl<'a, T: DictType> Iter<'a, T> {
    pub(crate) fn new(dict: &'a Dict<T>) -> Self {
        Self {
            tables: &dict.tables,
            entries: &dict.entries,
            rehashing: dict.is_rehashing(),
            table: 0,
            next_bucket: 0,
            next: None,
            remaining: dict.len(),
        }
    }
}

impl<'a, T: DictType> Iterator for Iter<'a, T> {
    type Item = (Handle, &'a T::Key, &'a T::Value);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(k) = self.next {
                let entries = self.entries;
                let e = &entries[k];
                self.next = e.next;
                self.remaining -= 1;
                return Some((Handle::new(k), &e.key, &e.value));
            }
            let table = &self.tables[self.table];
            if self.next_bucket >= table.capacity() {
                if self.table == 0 && self.rehashing {
                    self.table = 1;
                    self.next_bucket = 0;
                    continue;
                }
                return None;
            }
            self.next = table.buckets[self.next_bucket];
            self.next_bucket += 1;
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T: DictType> ExactSizeIterator for Iter<'_, T> {}

/// Mutable iterator in arena order.
pub struct IterMut<'a, T: DictType> {
    it: slotmap::basic::IterMut<'a, DefaultKey, Entry<T::Key, T::Value>>,
}

impl<'a, T: DictType> IterMut<'a, T> {
    pub(crate) fn new(dict: &'a mut Dict<T>) -> Self {
        Self {
            it: dict.entries.iter_mut(),
        }
    }
}

impl<'a, T: DictType> Iterator for IterMut<'a, T> {
    type Item = (Handle, &'a T::Key, &'a mut T::Value);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it
            .next()
            .map(|(k, e)| (Handle::new(k), &e.key, &mut e.value))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

/// Cursor that tolerates modification of the dictionary between steps.
///
/// The first call to [`next`](Self::next) registers the iterator with the
/// dictionary; [`release`](Self::release) must be called on the same
/// dictionary afterward. Dropping a registered iterator panics, and so does
/// stepping or releasing it against a dictionary other than the one that
/// created it.
///
/// Deleting the entry last yielded, its successors or any other entry
/// before the next step is allowed. Entries inserted during the walk may or
/// may not be yielded.
#[derive(Debug)]
pub struct SafeIter {
    owner: u64,
    table: usize,
    next_bucket: usize,
    current: Link,
    lookahead: Link,
    /// Entries of the current chain already handed out.
    yielded: Vec<DefaultKey>,
    token: Option<IterToken>,
    done: bool,
}

impl SafeIter {
    pub(crate) fn new(owner: u64) -> Self {
        Self {
            owner,
            table: 0,
            next_bucket: 0,
            current: None,
            lookahead: None,
            yielded: Vec::new(),
            token: None,
            done: false,
        }
    }

    /// Whether the first step has happened and the iterator holds a
    /// registration.
    pub fn is_registered(&self) -> bool {
        self.token.is_some()
    }

    pub fn next<T: DictType>(&mut self, dict: &Dict<T>) -> Option<Handle> {
        assert_eq!(
            self.owner,
            dict.iterators.id(),
            "safe iterator stepped on another dictionary"
        );
        if self.done {
            return None;
        }
        let mut cursor = if self.token.is_none() {
            self.token = Some(dict.iterators.acquire());
            None
        } else {
            match self.current.and_then(|k| dict.entries.get(k)) {
                Some(e) => e.next,
                None => match self.lookahead {
                    // Successor deleted too: rescan the chain, skipping
                    // entries it already yielded. Chains only grow at the head.
                    Some(k) if !dict.entries.contains_key(k) => self.chain_head(dict),
                    lookahead => lookahead,
                },
            }
        };
        loop {
            if let Some((k, entry)) = cursor.and_then(|k| dict.entries.get(k).map(|e| (k, e))) {
                if self.yielded.contains(&k) {
                    cursor = entry.next;
                    continue;
                }
                self.current = Some(k);
                self.lookahead = entry.next;
                self.yielded.push(k);
                return Some(Handle::new(k));
            }
            self.yielded.clear();
            let table = &dict.tables[self.table];
            if self.next_bucket >= table.capacity() {
                if self.table == 0 && dict.is_rehashing() {
                    self.table = 1;
                    self.next_bucket = 0;
                    cursor = None;
                    continue;
                }
                self.done = true;
                self.current = None;
                self.lookahead = None;
                return None;
            }
            cursor = table.buckets[self.next_bucket];
            self.next_bucket += 1;
        }
    }

    /// Head of the chain the cursor is in, if that bucket still exists.
    fn chain_head<T: DictType>(&self, dict: &Dict<T>) -> Link {
        let bucket = self.next_bucket.checked_sub(1)?;
        dict.tables[self.table].buckets.get(bucket).copied().flatten()
    }

    /// Unregister from `dict`, which must be the dictionary that created
    /// this iterator. A no-op for an iterator that never advanced.
    pub fn release<T: DictType>(mut self, dict: &Dict<T>) {
        assert_eq!(
            self.owner,
            dict.iterators.id(),
            "safe iterator released into another dictionary"
        );
        if let Some(t) = self.token.take() {
            dict.iterators.release(t);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::dict::Dict;
    use crate::dict_type::IntType;
    use std::collections::BTreeSet;

    fn filled(n: u32) -> Dict<IntType<u32>> {
        let mut d = Dict::new(IntType::new());
        for i in 0..n {
            d.add(i, i).unwrap();
        }
        d
    }

    /// Invariant: the borrowing iterator yields every entry once, in both
    /// tables, and reports an exact length.
    #[test]
    fn iter_covers_both_tables() {
        let mut d = filled(40);
        while d.rehash_step(100) {}
        d.expand(256).unwrap();
        d.rehash_step(3);
        assert!(d.is_rehashing());

        let it = d.iter();
        assert_eq!(it.len(), 40);
        let seen: BTreeSet<u32> = it
            .map(|(_, k, v)| {
                assert_eq!(k, v);
                *k
            })
            .collect();
        assert_eq!(seen, (0..40).collect());
    }

    #[test]
    fn iter_mut_updates_values() {
        let mut d = filled(10);
        for (_, k, v) in d.iter_mut() {
            *v = k * 100;
        }
        for i in 0..10 {
            assert_eq!(d.get(&i), Some(&(i * 100)));
        }
    }

    /// Invariant: deleting the entry just yielded does not derail the walk.
    #[test]
    fn safe_iter_survives_deleting_current() {
        let mut d = filled(64);
        let mut it = d.safe_iter();
        let mut seen = BTreeSet::new();
        while let Some(h) = it.next(&d) {
            let k = *h.key(&d).unwrap();
            assert!(seen.insert(k));
            if k % 2 == 0 {
                d.delete(&k).unwrap();
            }
        }
        it.release(&d);
        assert_eq!(seen.len(), 64);
        assert_eq!(d.len(), 32);
        d.assert_invariants();
    }

    /// Invariant: an iterator that never advanced holds no registration.
    #[test]
    fn unstarted_iterator_needs_no_release() {
        let d = filled(4);
        let it = d.safe_iter();
        assert!(!it.is_registered());
        drop(it);
        assert_eq!(d.live_iterators(), 0);
    }

    /// Invariant: an exhausted iterator keeps reporting exhaustion and stays
    /// registered until released.
    #[test]
    fn exhausted_iterator_stays_done() {
        let d = filled(3);
        let mut it = d.safe_iter();
        let mut n = 0;
        while it.next(&d).is_some() {
            n += 1;
        }
        assert_eq!(n, 3);
        assert!(it.next(&d).is_none());
        assert_eq!(d.live_iterators(), 1);
        it.release(&d);
        assert_eq!(d.live_iterators(), 0);
    }

    #[test]
    fn dropping_registered_iterator_panics() {
        let d = filled(3);
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut it = d.safe_iter();
            let _ = it.next(&d);
            drop(it);
        }));
        assert!(res.is_err());
    }

    /// Invariant: a cursor left live across `clear` sees an empty dictionary.
    #[test]
    fn clear_under_live_iterator() {
        let mut d = filled(8);
        let mut it = d.safe_iter();
        assert!(it.next(&d).is_some());
        d.clear();
        assert!(it.next(&d).is_none());
        it.release(&d);
    }
}
