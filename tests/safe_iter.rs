// Safe iterator test suite.
//
// Invariants exercised:
// - Registration: an iterator counts as live from its first step until
//   release; only then does opportunistic migration resume.
// - Coverage: every entry present for the whole walk is yielded exactly
//   once, even when the walk spans both tables of a migration.
// - Tolerance: deleting the yielded entry, or other entries, between steps
//   never derails the walk.
mod common;

use rehash_dict::{Dict, DictType, IntType};
use std::collections::BTreeSet;

/// Every key lands in the same chain.
struct OneChain;

impl DictType for OneChain {
    type Key = u32;
    type Value = ();

    fn hash(&self, _key: &u32) -> u64 {
        0
    }

    fn key_eq(&self, a: &u32, b: &u32) -> bool {
        a == b
    }
}

fn migrating(n: u32) -> Dict<IntType<u32>> {
    let mut d = Dict::new(IntType::new());
    for i in 0..n {
        d.add(i, i).unwrap();
    }
    while d.rehash_step(100) {}
    d.expand(n as usize * 8).unwrap();
    d.rehash_step(n as usize / 4);
    assert!(d.is_rehashing());
    d
}

// Test: delete-while-iterating across a migration.
// Assumes: the walk starts with entries in both tables.
// Verifies: deleting each yielded key empties the dictionary, the cursor
// does not move meanwhile, and migration resumes after release.
#[test]
fn delete_each_yielded_key_mid_migration() {
    common::initialize_logger();
    let mut d = migrating(500);
    let cursor = d.rehash_cursor();

    let mut it = d.safe_iter();
    let mut seen = BTreeSet::new();
    while let Some(h) = it.next(&d) {
        let k = *h.key(&d).unwrap();
        assert!(seen.insert(k), "key {k} yielded twice");
        d.delete(&k).unwrap();
        assert_eq!(d.rehash_cursor(), cursor);
    }
    assert_eq!(d.live_iterators(), 1);
    it.release(&d);

    assert_eq!(seen.len(), 500);
    assert!(d.is_empty());
    assert_eq!(d.live_iterators(), 0);
    // Active is empty, so the next step completes the migration.
    assert!(!d.rehash_step(1));
    assert!(!d.is_rehashing());
}

// Test: deleting entries other than the yielded one.
// Verifies: entries deleted ahead of the cursor are never yielded;
// surviving entries are yielded once.
#[test]
fn delete_ahead_of_cursor() {
    let mut d = migrating(200);
    let mut it = d.safe_iter();
    let mut seen = BTreeSet::new();
    let mut deleted = BTreeSet::new();
    while let Some(h) = it.next(&d) {
        let k = *h.key(&d).unwrap();
        assert!(!deleted.contains(&k), "deleted key {k} was yielded");
        assert!(seen.insert(k));
        let partner = 199 - k;
        if partner != k && !seen.contains(&partner) && d.delete(&partner).is_ok() {
            deleted.insert(partner);
        }
    }
    it.release(&d);
    assert_eq!(seen.len() + deleted.len(), 200);
    assert_eq!(d.len(), seen.len());
}

// Test: inserting during a walk.
// Verifies: pre-existing keys are yielded exactly once; new keys are
// findable afterward whether or not the walk saw them.
#[test]
fn insert_during_walk() {
    let mut d = migrating(100);
    let mut it = d.safe_iter();
    let mut seen = BTreeSet::new();
    let mut next_key = 1_000;
    while let Some(h) = it.next(&d) {
        let k = *h.key(&d).unwrap();
        assert!(seen.insert(k));
        if k < 100 {
            d.add(next_key, next_key).unwrap();
            next_key += 1;
        }
    }
    it.release(&d);
    assert!((0..100).all(|k| seen.contains(&k)));
    assert_eq!(d.len(), 200);
    for k in 1_000..1_100 {
        assert_eq!(d.get(&k), Some(&k));
    }
}

// Test: several live iterators.
// Verifies: the count tracks each registration and migration stays
// suspended until the last release.
#[test]
fn nested_iterators_count_independently() {
    let mut d = migrating(64);
    let mut outer = d.safe_iter();
    let mut inner = d.safe_iter();
    assert!(outer.next(&d).is_some());
    assert!(inner.next(&d).is_some());
    assert_eq!(d.live_iterators(), 2);

    let cursor = d.rehash_cursor();
    outer.release(&d);
    assert!(d.find(&1).is_some());
    assert_eq!(d.rehash_cursor(), cursor, "one iterator is still live");

    inner.release(&d);
    assert!(d.find(&1).is_some());
    assert_ne!(d.rehash_cursor(), cursor);
}

// Test: closure-based walk.
// Verifies: `safe_for_each` hands the dictionary back to the callback and
// releases its registration at the end.
#[test]
fn safe_for_each_filters_in_place() {
    let mut d = migrating(300);
    d.safe_for_each(|d, h| {
        if h.value(d).is_some_and(|v| v % 3 == 0) {
            d.remove(h).unwrap();
        }
    });
    assert_eq!(d.len(), 200);
    assert_eq!(d.live_iterators(), 0);
    assert!(d.iter().all(|(_, _, v)| v % 3 != 0));
}

// Test: deleting the yielded entry together with its successor.
// Assumes: keys 0, 1, 2 share one chain, ordered 2 -> 1 -> 0.
// Verifies: the walk resumes at key 0 instead of abandoning the chain.
#[test]
fn delete_yielded_and_successor_in_one_chain() {
    let mut d = Dict::new(OneChain);
    for k in 0..3 {
        d.add(k, ()).unwrap();
    }
    let mut it = d.safe_iter();
    let first = it.next(&d).unwrap();
    assert_eq!(first.key(&d), Some(&2));
    d.delete(&2).unwrap();
    d.delete(&1).unwrap();
    let next = it.next(&d).map(|h| *h.key(&d).unwrap());
    assert_eq!(next, Some(0));
    assert!(it.next(&d).is_none());
    it.release(&d);
}

// Test: heavy deletion inside a single long chain.
// Verifies: every key is either yielded once or deleted before being
// yielded, whatever neighbours disappear between steps.
#[test]
fn chain_survives_deleting_neighbours() {
    let mut d = Dict::new(OneChain);
    for k in 0..64 {
        d.add(k, ()).unwrap();
    }
    let mut it = d.safe_iter();
    let mut seen = BTreeSet::new();
    let mut deleted = BTreeSet::new();
    while let Some(h) = it.next(&d) {
        let k = *h.key(&d).unwrap();
        assert!(!deleted.contains(&k), "deleted key {k} was yielded");
        assert!(seen.insert(k), "key {k} yielded twice");
        d.delete(&k).unwrap();
        for other in [k.wrapping_sub(1), k + 1, k.wrapping_sub(2)] {
            if other < 64 && !seen.contains(&other) && d.delete(&other).is_ok() {
                deleted.insert(other);
            }
        }
    }
    it.release(&d);
    assert_eq!(seen.len() + deleted.len(), 64);
    assert!(d.is_empty());
}

// Test: a cursor handed to the wrong dictionary.
// Verifies: releasing into a dictionary that did not create the cursor
// panics rather than unbalancing both registration counts.
#[test]
#[should_panic(expected = "another dictionary")]
fn cursor_is_bound_to_its_dictionary() {
    let mut a = Dict::new(IntType::new());
    let mut b = Dict::new(IntType::new());
    a.add(1, 1).unwrap();
    b.add(2, 2).unwrap();
    let mut it = a.safe_iter();
    assert!(it.next(&a).is_some());
    it.release(&b);
}
