//! Dict: chained hash table with incremental rehashing.

use crate::config::DictConfig;
use crate::dict_type::DictType;
use crate::error::DictError;
use crate::iter::{Iter, IterMut, SafeIter};
use crate::reentrancy::CallbackGuard;
use crate::stats::DictStats;
use crate::table::{next_power, Entries, Entry, Link, Table};
use crate::tokens::IteratorCount;
use log::{debug, trace};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use slotmap::{DefaultKey, SlotMap};
use std::time::{Duration, Instant};

/// Stable reference to an entry, valid until that entry is removed.
///
/// Handles are generational: a handle to a removed entry never resolves,
/// even when its arena slot is reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(DefaultKey);

impl Handle {
    pub(crate) fn new(k: DefaultKey) -> Self {
        Handle(k)
    }

    pub(crate) fn raw(&self) -> DefaultKey {
        self.0
    }

    pub fn key<'a, T: DictType>(&self, dict: &'a Dict<T>) -> Option<&'a T::Key> {
        dict.entries.get(self.0).map(|e| &e.key)
    }

    pub fn value<'a, T: DictType>(&self, dict: &'a Dict<T>) -> Option<&'a T::Value> {
        dict.entries.get(self.0).map(|e| &e.value)
    }

    pub fn value_mut<'a, T: DictType>(&self, dict: &'a mut Dict<T>) -> Option<&'a mut T::Value> {
        dict.entries.get_mut(self.0).map(|e| &mut e.value)
    }
}

enum Slot {
    Vacant { table: usize },
    Occupied(DefaultKey),
}

/// Dictionary with two tables: `tables[0]` is active, `tables[1]` receives
/// entries while a migration is in progress.
///
/// Lookups, inserts, deletes and sampling each migrate one bucket before
/// doing their own work, unless a [`SafeIter`] is live. Hosts can drive
/// the rest of a migration with [`rehash_step`](Self::rehash_step) or
/// [`rehash_for`](Self::rehash_for).
pub struct Dict<T: DictType> {
    pub(crate) ty: T,
    pub(crate) tables: [Table; 2],
    pub(crate) entries: Entries<T::Key, T::Value>,
    /// Next bucket of `tables[0]` to migrate; `None` while idle.
    pub(crate) rehash_idx: Option<usize>,
    pub(crate) iterators: IteratorCount,
    config: DictConfig,
    rng: SmallRng,
    guard: CallbackGuard,
}

/// Reserved position for a key that is not yet in the dictionary.
///
/// Returned by [`Dict::add_raw`]. Nothing is stored until
/// [`insert`](Self::insert) runs; dropping the vacant entry stores nothing.
pub struct VacantEntry<'a, T: DictType> {
    dict: &'a mut Dict<T>,
    key: T::Key,
    hash: u64,
    table: usize,
}

impl<'a, T: DictType> VacantEntry<'a, T> {
    pub fn key(&self) -> &T::Key {
        &self.key
    }

    /// Give the key back without inserting.
    pub fn into_key(self) -> T::Key {
        self.key
    }

    pub fn insert(self, value: T::Value) -> Handle {
        let VacantEntry {
            dict,
            key,
            hash,
            table,
        } = self;
        dict.insert_vacant(table, key, hash, value)
    }
}

impl<T: DictType> Dict<T> {
    pub fn new(ty: T) -> Self {
        Self::with_config(ty, DictConfig::default())
    }

    pub fn with_config(ty: T, config: DictConfig) -> Self {
        let config = config.normalized();
        let rng = match config.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Self {
            ty,
            tables: [Table::empty(), Table::empty()],
            entries: SlotMap::with_key(),
            rehash_idx: None,
            iterators: IteratorCount::new(),
            config,
            rng,
            guard: CallbackGuard::new(),
        }
    }

    /// Create a dictionary whose active table already holds `capacity`
    /// entries without growing.
    pub fn with_capacity(ty: T, capacity: usize) -> Self {
        let mut d = Self::new(ty);
        if capacity > 0 {
            d.install_table(next_power(capacity, d.config.initial_size));
        }
        d
    }

    pub fn type_descriptor(&self) -> &T {
        &self.ty
    }

    pub fn config(&self) -> &DictConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.tables[0].len + self.tables[1].len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bucket count of the active table.
    pub fn capacity(&self) -> usize {
        self.tables[0].capacity()
    }

    /// Bucket count of the table being migrated into; 0 while idle.
    pub fn incoming_capacity(&self) -> usize {
        self.tables[1].capacity()
    }

    #[inline]
    pub fn is_rehashing(&self) -> bool {
        self.rehash_idx.is_some()
    }

    pub fn rehash_cursor(&self) -> Option<usize> {
        self.rehash_idx
    }

    /// Number of safe iterators that have advanced and not been released.
    pub fn live_iterators(&self) -> u32 {
        self.iterators.live()
    }

    fn hash_key(&self, key: &T::Key) -> u64 {
        let _g = self.guard.enter();
        self.ty.hash(key)
    }

    /// Probe the active table, then the incoming one while migrating.
    fn lookup(&self, key: &T::Key, hash: u64) -> Link {
        let _g = self.guard.enter();
        for table in &self.tables {
            if !table.is_allocated() {
                break;
            }
            let mut cur = table.buckets[table.bucket_of(hash)];
            while let Some(k) = cur {
                let e = &self.entries[k];
                if e.hash == hash && self.ty.key_eq(&e.key, key) {
                    return Some(k);
                }
                cur = e.next;
            }
            if !self.is_rehashing() {
                break;
            }
        }
        None
    }

    // ---- sizing ----

    /// Allocate a table large enough for `size` entries.
    ///
    /// The first table becomes active directly; later ones start a
    /// migration.
    pub fn expand(&mut self, size: usize) -> Result<(), DictError> {
        if self.is_rehashing() {
            return Err(DictError::AlreadyRehashing);
        }
        let len = self.tables[0].len;
        if len > size {
            return Err(DictError::InvalidSize {
                requested: size,
                len,
            });
        }
        self.install_table(next_power(size, self.config.initial_size));
        Ok(())
    }

    /// Migrate to the smallest table that holds the current entries,
    /// reclaiming buckets after mass deletion.
    pub fn shrink_to_fit(&mut self) -> Result<(), DictError> {
        if !self.config.policy.can_resize() {
            return Err(DictError::ResizeDisabled);
        }
        if self.is_rehashing() {
            return Err(DictError::AlreadyRehashing);
        }
        let minimal = self.tables[0].len.max(self.config.initial_size);
        self.expand(minimal)
    }

    fn install_table(&mut self, capacity: usize) {
        let table = Table::with_capacity(capacity);
        if !self.tables[0].is_allocated() {
            trace!("allocating initial table of {} buckets", capacity);
            self.tables[0] = table;
        } else {
            debug!(
                "starting rehash: {} -> {} buckets, {} entries",
                self.tables[0].capacity(),
                capacity,
                self.tables[0].len
            );
            self.tables[1] = table;
            self.rehash_idx = Some(0);
        }
    }

    fn expand_if_needed(&mut self) {
        if self.is_rehashing() {
            return;
        }
        if !self.tables[0].is_allocated() {
            self.install_table(self.config.initial_size);
            return;
        }
        let (used, size) = (self.tables[0].len, self.tables[0].capacity());
        if used < size {
            return;
        }
        let policy = &self.config.policy;
        let allowed = policy.can_resize();
        if allowed || used / size > policy.force_resize_ratio() {
            if !allowed {
                debug!(
                    "forcing growth while resizing is disabled: {} entries in {} buckets",
                    used, size
                );
            }
            let target = used.max(size).saturating_mul(2);
            self.install_table(next_power(target, self.config.initial_size));
        }
    }

    // ---- rehashing ----

    /// Migrate up to `n` non-empty buckets. Returns true while entries remain
    /// in the old table.
    pub fn rehash_step(&mut self, n: usize) -> bool {
        let Some(mut idx) = self.rehash_idx else {
            return false;
        };
        let [active, incoming] = &mut self.tables;
        for _ in 0..n {
            if active.len == 0 {
                break;
            }
            // active.len > 0 keeps idx inside the table.
            while active.buckets[idx].is_none() {
                idx += 1;
            }
            let mut cur = active.buckets[idx].take();
            while let Some(k) = cur {
                cur = self.entries[k].next;
                incoming.push_front(&mut self.entries, k);
                active.len -= 1;
            }
            idx += 1;
        }
        self.rehash_idx = Some(idx);
        if self.tables[0].len == 0 {
            self.finish_rehash();
            return false;
        }
        true
    }

    fn finish_rehash(&mut self) {
        self.tables[0] = core::mem::replace(&mut self.tables[1], Table::empty());
        self.rehash_idx = None;
        debug!(
            "rehash complete: {} buckets, {} entries",
            self.tables[0].capacity(),
            self.tables[0].len
        );
    }

    /// Rehash in batches until done or until `budget` has elapsed. Returns
    /// the number of buckets scheduled, in whole batches.
    pub fn rehash_for(&mut self, budget: Duration) -> usize {
        let start = Instant::now();
        let batch = self.config.rehash_batch;
        let mut rehashed = 0;
        while self.rehash_step(batch) {
            rehashed += batch;
            if start.elapsed() > budget {
                break;
            }
        }
        trace!("timed rehash: {} buckets in {:?}", rehashed, start.elapsed());
        rehashed
    }

    #[inline]
    fn rehash_opportunistic(&mut self) {
        if self.iterators.is_idle() {
            self.rehash_step(1);
        }
    }

    // ---- lookup ----

    pub fn find(&mut self, key: &T::Key) -> Option<Handle> {
        if !self.tables[0].is_allocated() {
            return None;
        }
        self.rehash_opportunistic();
        let hash = self.hash_key(key);
        self.lookup(key, hash).map(Handle::new)
    }

    pub fn fetch_value(&mut self, key: &T::Key) -> Option<&T::Value> {
        let h = self.find(key)?;
        self.entries.get(h.raw()).map(|e| &e.value)
    }

    pub fn fetch_value_mut(&mut self, key: &T::Key) -> Option<&mut T::Value> {
        let h = self.find(key)?;
        self.entries.get_mut(h.raw()).map(|e| &mut e.value)
    }

    /// Read-only lookup; makes no rehash progress.
    pub fn get(&self, key: &T::Key) -> Option<&T::Value> {
        if !self.tables[0].is_allocated() {
            return None;
        }
        let hash = self.hash_key(key);
        self.lookup(key, hash).map(|k| &self.entries[k].value)
    }

    pub fn contains_key(&self, key: &T::Key) -> bool {
        self.get(key).is_some()
    }

    // ---- insertion ----

    fn locate(&mut self, key: &T::Key, hash: u64) -> Slot {
        self.expand_if_needed();
        match self.lookup(key, hash) {
            Some(k) => Slot::Occupied(k),
            None => Slot::Vacant {
                table: usize::from(self.is_rehashing()),
            },
        }
    }

    fn insert_vacant(&mut self, table: usize, key: T::Key, hash: u64, value: T::Value) -> Handle {
        let key = self.ty.dup_key(key);
        let value = self.ty.dup_value(value);
        let k = self.entries.insert(Entry {
            key,
            value,
            hash,
            next: None,
        });
        self.tables[table].push_front(&mut self.entries, k);
        Handle::new(k)
    }

    /// First half of an insert: reserve the key's position, failing with
    /// `DuplicateKey` when it is already present.
    pub fn add_raw(&mut self, key: T::Key) -> Result<VacantEntry<'_, T>, DictError> {
        self.rehash_opportunistic();
        let hash = self.hash_key(&key);
        match self.locate(&key, hash) {
            Slot::Occupied(_) => Err(DictError::DuplicateKey),
            Slot::Vacant { table } => Ok(VacantEntry {
                dict: self,
                key,
                hash,
                table,
            }),
        }
    }

    pub fn add(&mut self, key: T::Key, value: T::Value) -> Result<Handle, DictError> {
        Ok(self.add_raw(key)?.insert(value))
    }

    /// Insert or overwrite. Returns true when the key was new.
    ///
    /// On overwrite the old value is destroyed after the new one is in
    /// place.
    pub fn replace(&mut self, key: T::Key, value: T::Value) -> bool {
        self.rehash_opportunistic();
        let hash = self.hash_key(&key);
        match self.locate(&key, hash) {
            Slot::Vacant { table } => {
                self.insert_vacant(table, key, hash, value);
                true
            }
            Slot::Occupied(k) => {
                let value = self.ty.dup_value(value);
                let old = core::mem::replace(&mut self.entries[k].value, value);
                self.ty.destroy_value(old);
                false
            }
        }
    }

    /// Handle of the existing entry for `key`, or of a new one holding
    /// `make()`. `make` only runs when the key is absent.
    pub fn find_or_add_with<F>(&mut self, key: T::Key, make: F) -> Handle
    where
        F: FnOnce() -> T::Value,
    {
        self.rehash_opportunistic();
        let hash = self.hash_key(&key);
        match self.locate(&key, hash) {
            Slot::Occupied(k) => Handle::new(k),
            Slot::Vacant { table } => self.insert_vacant(table, key, hash, make()),
        }
    }

    // ---- removal ----

    /// Remove `key`, handing its key and value back instead of destroying
    /// them.
    pub fn unlink(&mut self, key: &T::Key) -> Result<(T::Key, T::Value), DictError> {
        if !self.tables[0].is_allocated() {
            return Err(DictError::InvalidState("no table allocated"));
        }
        self.rehash_opportunistic();
        let hash = self.hash_key(key);
        let k = self.lookup(key, hash).ok_or(DictError::KeyNotFound)?;
        Ok(self.detach(k))
    }

    /// Remove `key` and run the type's destroy hooks on its contents.
    pub fn delete(&mut self, key: &T::Key) -> Result<(), DictError> {
        let (k, v) = self.unlink(key)?;
        self.ty.destroy_key(k);
        self.ty.destroy_value(v);
        Ok(())
    }

    /// Remove the entry behind `handle`. Does not advance rehashing.
    pub fn remove(&mut self, handle: Handle) -> Option<(T::Key, T::Value)> {
        if !self.entries.contains_key(handle.raw()) {
            return None;
        }
        Some(self.detach(handle.raw()))
    }

    fn detach(&mut self, k: DefaultKey) -> (T::Key, T::Value) {
        let [active, incoming] = &mut self.tables;
        let unlinked = active.unlink(&mut self.entries, k) || incoming.unlink(&mut self.entries, k);
        debug_assert!(unlinked, "live entry missing from both tables");
        let e = self
            .entries
            .remove(k)
            .expect("entry must exist while it is being detached");
        (e.key, e.value)
    }

    /// Destroy every entry and release both tables.
    ///
    /// Live safe iterators stay valid and observe an empty dictionary.
    pub fn clear(&mut self) {
        let n = self.entries.len();
        for (_, e) in self.entries.drain() {
            self.ty.destroy_key(e.key);
            self.ty.destroy_value(e.value);
        }
        self.tables = [Table::empty(), Table::empty()];
        self.rehash_idx = None;
        if n > 0 {
            trace!("cleared {} entries", n);
        }
    }

    // ---- sampling ----

    /// Pick a random entry: a random non-empty bucket across both tables,
    /// then a random position in its chain.
    ///
    /// Entries in long chains are less likely to be picked than entries
    /// alone in their bucket.
    pub fn random_entry(&mut self) -> Option<Handle> {
        if self.is_empty() {
            return None;
        }
        self.rehash_opportunistic();
        let head = if self.is_rehashing() {
            let c0 = self.tables[0].capacity();
            let total = c0 + self.tables[1].capacity();
            loop {
                let i = self.rng.gen_range(0..total);
                let link = if i < c0 {
                    self.tables[0].buckets[i]
                } else {
                    self.tables[1].buckets[i - c0]
                };
                if let Some(k) = link {
                    break k;
                }
            }
        } else {
            let mask = self.tables[0].mask;
            loop {
                let i = self.rng.gen::<usize>() & mask;
                if let Some(k) = self.tables[0].buckets[i] {
                    break k;
                }
            }
        };

        let mut chain_len = 0usize;
        let mut cur = Some(head);
        while let Some(k) = cur {
            chain_len += 1;
            cur = self.entries[k].next;
        }
        let mut pick = head;
        for _ in 0..self.rng.gen_range(0..chain_len) {
            pick = self.entries[pick]
                .next
                .expect("position is within the chain");
        }
        Some(Handle::new(pick))
    }

    // ---- iteration ----

    /// Borrowing iterator over both tables in bucket order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Mutable values in arena order.
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        IterMut::new(self)
    }

    /// Detached cursor that allows the dictionary to be modified between
    /// steps. Must be returned with [`SafeIter::release`].
    pub fn safe_iter(&self) -> SafeIter {
        SafeIter::new(self.iterators.id())
    }

    /// Visit every entry with a safe iterator, passing the dictionary back
    /// to `f` so it can delete or insert along the way.
    pub fn safe_for_each<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Self, Handle),
    {
        let mut it = self.safe_iter();
        while let Some(h) = it.next(self) {
            f(self, h);
        }
        it.release(self);
    }

    pub fn stats(&self) -> DictStats {
        DictStats::collect(&self.tables, &self.entries, self.is_rehashing())
    }

    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        for t in &self.tables {
            assert!(t.capacity() == 0 || t.capacity().is_power_of_two());
            assert_eq!(t.mask, t.capacity().saturating_sub(1));
        }
        assert_eq!(self.rehash_idx.is_some(), self.tables[1].is_allocated());

        let mut total = 0;
        for t in &self.tables {
            let mut n = 0;
            for (b, head) in t.buckets.iter().enumerate() {
                let mut cur = *head;
                while let Some(k) = cur {
                    let e = &self.entries[k];
                    assert_eq!(t.bucket_of(e.hash), b, "entry chained in the wrong bucket");
                    n += 1;
                    cur = e.next;
                }
            }
            assert_eq!(n, t.len);
            total += n;
        }
        assert_eq!(total, self.entries.len());

        if let Some(idx) = self.rehash_idx {
            let moved = idx.min(self.tables[0].capacity());
            assert!(self.tables[0].buckets[..moved].iter().all(Option::is_none));
        }
    }
}

impl<T: DictType> Drop for Dict<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T> Default for Dict<T>
where
    T: DictType + Default,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}
