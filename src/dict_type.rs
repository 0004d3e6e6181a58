//! Type descriptors: the capability set a [`Dict`](crate::Dict) needs from its
//! keys and values.
//!
//! `hash` and `key_eq` are required. Duplication and destruction hooks are
//! optional and default to moving the value through unchanged or dropping
//! it. The descriptor value itself is the context handed to every hook and
//! is never mutated by the dictionary.

use crate::hash::{gen_case_hash, gen_hash, identity_hash, int_hash, DEFAULT_HASH_SEED};
use core::hash::{BuildHasher, Hash};
use core::marker::PhantomData;
use hashbrown::hash_map::DefaultHashBuilder;

pub trait DictType {
    type Key;
    type Value;

    /// Must be deterministic for the lifetime of the dictionary.
    fn hash(&self, key: &Self::Key) -> u64;

    fn key_eq(&self, a: &Self::Key, b: &Self::Key) -> bool;

    /// Applied to a key when ownership moves into a new entry.
    fn dup_key(&self, key: Self::Key) -> Self::Key {
        key
    }

    /// Applied to a value when it is stored, including replacements.
    fn dup_value(&self, value: Self::Value) -> Self::Value {
        value
    }

    /// Runs when the dictionary disposes of a key it owns.
    fn destroy_key(&self, key: Self::Key) {
        drop(key);
    }

    /// Runs when the dictionary disposes of a value it owns.
    fn destroy_value(&self, value: Self::Value) {
        drop(value);
    }
}

/// Descriptor for any `K: Hash + Eq`, hashed through a `BuildHasher`.
pub struct DefaultType<K, V, S = DefaultHashBuilder> {
    hasher: S,
    _pd: PhantomData<fn() -> (K, V)>,
}

impl<K, V> DefaultType<K, V>
where
    K: Hash + Eq,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V> Default for DefaultType<K, V>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> DefaultType<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            _pd: PhantomData,
        }
    }
}

impl<K, V, S> DictType for DefaultType<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    type Key = K;
    type Value = V;

    #[inline]
    fn hash(&self, key: &K) -> u64 {
        self.hasher.hash_one(key)
    }

    #[inline]
    fn key_eq(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

/// String keys hashed with seeded djb2, optionally ignoring ASCII case.
pub struct StringType<V> {
    seed: u32,
    case_insensitive: bool,
    _pd: PhantomData<fn() -> V>,
}

impl<V> StringType<V> {
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_HASH_SEED)
    }

    pub fn with_seed(seed: u32) -> Self {
        Self {
            seed,
            case_insensitive: false,
            _pd: PhantomData,
        }
    }

    /// Keys that differ only in ASCII case are treated as the same key.
    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }
}

impl<V> Default for StringType<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> DictType for StringType<V> {
    type Key = String;
    type Value = V;

    fn hash(&self, key: &String) -> u64 {
        let h = if self.case_insensitive {
            gen_case_hash(key.as_bytes(), self.seed)
        } else {
            gen_hash(key.as_bytes(), self.seed)
        };
        u64::from(h)
    }

    fn key_eq(&self, a: &String, b: &String) -> bool {
        if self.case_insensitive {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    }

    // Stored keys never grow again; drop spare capacity.
    fn dup_key(&self, mut key: String) -> String {
        key.shrink_to_fit();
        key
    }
}

/// `u32` keys, mixed with Wang's integer hash or used as-is.
pub struct IntType<V> {
    identity: bool,
    _pd: PhantomData<fn() -> V>,
}

impl<V> IntType<V> {
    pub fn new() -> Self {
        Self {
            identity: false,
            _pd: PhantomData,
        }
    }

    pub fn identity() -> Self {
        Self {
            identity: true,
            _pd: PhantomData,
        }
    }
}

impl<V> Default for IntType<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> DictType for IntType<V> {
    type Key = u32;
    type Value = V;

    #[inline]
    fn hash(&self, key: &u32) -> u64 {
        let h = if self.identity {
            identity_hash(*key)
        } else {
            int_hash(*key)
        };
        u64::from(h)
    }

    #[inline]
    fn key_eq(&self, a: &u32, b: &u32) -> bool {
        a == b
    }
}
