#![cfg(test)]

// Property tests for Dict kept inside the crate so they can check the
// structural invariants after every operation.

use crate::config::{DictConfig, ResizePolicy};
use crate::dict::{Dict, Handle};
use crate::dict_type::{DictType, StringType};
use crate::error::DictError;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum Op {
    Add(usize, i32),
    Replace(usize, i32),
    FindOrAdd(usize, i32),
    Delete(usize),
    Unlink(usize),
    RemoveHandle(usize),
    Find(usize),
    Mutate(usize, i32),
    RehashStep(usize),
    Expand(usize),
    Shrink,
    TogglePolicy,
    Random,
    Iterate,
    SafeWalkDelete(bool),
    Clear,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=12).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Add(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Replace(i, v)),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::FindOrAdd(i, v)),
            2 => idx.clone().prop_map(Op::Delete),
            1 => idx.clone().prop_map(Op::Unlink),
            1 => idx.clone().prop_map(Op::RemoveHandle),
            2 => idx.clone().prop_map(Op::Find),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| Op::Mutate(i, d)),
            1 => (1usize..8).prop_map(Op::RehashStep),
            1 => (0usize..48).prop_map(Op::Expand),
            1 => Just(Op::Shrink),
            1 => Just(Op::TogglePolicy),
            1 => Just(Op::Random),
            1 => Just(Op::Iterate),
            1 => any::<bool>().prop_map(Op::SafeWalkDelete),
            1 => Just(Op::Clear),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Every key hashes to bucket 0.
struct Colliding;

impl DictType for Colliding {
    type Key = String;
    type Value = i32;

    fn hash(&self, _key: &String) -> u64 {
        0
    }

    fn key_eq(&self, a: &String, b: &String) -> bool {
        a == b
    }
}

// State-machine equivalence against std::collections::HashMap. After every
// operation:
// - chains, per-table counts and the rehash cursor are consistent;
// - `len` matches the model and stale handles never resolve;
// - every pool key is found exactly when the model holds it.
fn run_state_machine<T>(ty: T, pool: &[String], ops: Vec<Op>) -> Result<(), TestCaseError>
where
    T: DictType<Key = String, Value = i32>,
{
    let policy = ResizePolicy::new();
    let mut sut = Dict::with_config(
        ty,
        DictConfig::default()
            .with_policy(policy.clone())
            .with_rng_seed(7),
    );
    let mut model: HashMap<String, i32> = HashMap::new();
    let mut live: HashMap<String, Handle> = HashMap::new();
    let mut stale: Vec<Handle> = Vec::new();

    for op in ops {
        match op {
            Op::Add(i, v) => {
                let k = pool[i].clone();
                let already = model.contains_key(&k);
                match sut.add(k.clone(), v) {
                    Ok(h) => {
                        prop_assert!(!already, "add must fail on duplicate");
                        live.insert(k.clone(), h);
                        model.insert(k, v);
                    }
                    Err(e) => {
                        prop_assert_eq!(e, DictError::DuplicateKey);
                        prop_assert!(already, "duplicate error only when key exists");
                    }
                }
            }
            Op::Replace(i, v) => {
                let k = pool[i].clone();
                let fresh = sut.replace(k.clone(), v);
                prop_assert_eq!(fresh, !model.contains_key(&k));
                if fresh {
                    let h = sut.find(&k).expect("replaced key is present");
                    live.insert(k.clone(), h);
                }
                model.insert(k, v);
            }
            Op::FindOrAdd(i, v) => {
                let k = pool[i].clone();
                let h = sut.find_or_add_with(k.clone(), || v);
                let mv = *model.entry(k.clone()).or_insert(v);
                prop_assert_eq!(h.value(&sut), Some(&mv));
                let lh = *live.entry(k).or_insert(h);
                prop_assert_eq!(lh, h);
            }
            Op::Delete(i) => {
                let k = &pool[i];
                let r = sut.delete(k);
                if model.remove(k).is_some() {
                    prop_assert_eq!(r, Ok(()));
                    stale.push(live.remove(k).expect("tracked live handle"));
                } else {
                    prop_assert!(r.is_err());
                }
            }
            Op::Unlink(i) => {
                let k = &pool[i];
                match sut.unlink(k) {
                    Ok((kk, vv)) => {
                        prop_assert_eq!(&kk, k);
                        prop_assert_eq!(Some(vv), model.remove(k));
                        stale.push(live.remove(k).expect("tracked live handle"));
                    }
                    Err(_) => prop_assert!(!model.contains_key(k)),
                }
            }
            Op::RemoveHandle(i) => {
                let k = &pool[i];
                if let Some(h) = live.remove(k) {
                    let (kk, vv) = sut.remove(h).expect("live handle removes");
                    prop_assert_eq!(&kk, k);
                    prop_assert_eq!(Some(vv), model.remove(k));
                    stale.push(h);
                }
            }
            Op::Find(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.find(k), live.get(k).copied());
                prop_assert_eq!(sut.get(k), model.get(k));
            }
            Op::Mutate(i, d) => {
                let k = &pool[i];
                match sut.fetch_value_mut(k) {
                    Some(v) => {
                        *v = v.wrapping_add(d);
                        let mv = model.get_mut(k).expect("model holds found key");
                        *mv = mv.wrapping_add(d);
                    }
                    None => prop_assert!(!model.contains_key(k)),
                }
            }
            Op::RehashStep(n) => {
                let more = sut.rehash_step(n);
                prop_assert_eq!(more, sut.is_rehashing());
            }
            Op::Expand(n) => {
                let was = sut.is_rehashing();
                let len = sut.len();
                match sut.expand(n) {
                    Ok(()) => prop_assert!(!was && n >= len),
                    Err(DictError::AlreadyRehashing) => prop_assert!(was),
                    Err(DictError::InvalidSize { .. }) => prop_assert!(n < len),
                    Err(e) => prop_assert!(false, "unexpected error: {}", e),
                }
            }
            Op::Shrink => {
                let was = sut.is_rehashing();
                match sut.shrink_to_fit() {
                    Ok(()) => prop_assert!(policy.can_resize() && !was),
                    Err(DictError::ResizeDisabled) => prop_assert!(!policy.can_resize()),
                    Err(DictError::AlreadyRehashing) => prop_assert!(was),
                    Err(e) => prop_assert!(false, "unexpected error: {}", e),
                }
            }
            Op::TogglePolicy => {
                if policy.can_resize() {
                    policy.disable();
                } else {
                    policy.enable();
                }
            }
            Op::Random => {
                let h = sut.random_entry();
                prop_assert_eq!(h.is_some(), !model.is_empty());
                if let Some(h) = h {
                    let k = h.key(&sut).expect("sampled handle resolves");
                    prop_assert_eq!(live.get(k), Some(&h));
                }
            }
            Op::Iterate => {
                let s: BTreeMap<String, i32> = sut.iter().map(|(_, k, v)| (k.clone(), *v)).collect();
                let m: BTreeMap<String, i32> = model.iter().map(|(k, v)| (k.clone(), *v)).collect();
                prop_assert_eq!(s, m);
                prop_assert_eq!(sut.iter().len(), model.len());
            }
            Op::SafeWalkDelete(even) => {
                let before = model.len();
                let mut seen = BTreeSet::new();
                let mut repeated = false;
                let mut it = sut.safe_iter();
                while let Some(h) = it.next(&sut) {
                    let k = h.key(&sut).expect("yielded handle resolves").clone();
                    let v = *h.value(&sut).expect("yielded handle resolves");
                    repeated |= !seen.insert(k.clone());
                    if (v % 2 == 0) == even && sut.delete(&k).is_ok() {
                        model.remove(&k);
                        if let Some(h) = live.remove(&k) {
                            stale.push(h);
                        }
                    }
                }
                it.release(&sut);
                prop_assert!(!repeated, "safe walk yielded a key twice");
                prop_assert_eq!(seen.len(), before);
                prop_assert_eq!(sut.live_iterators(), 0);
            }
            Op::Clear => {
                sut.clear();
                model.clear();
                stale.extend(live.drain().map(|(_, h)| h));
            }
        }

        sut.assert_invariants();
        for h in &stale {
            prop_assert!(h.value(&sut).is_none());
        }
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        for k in pool {
            prop_assert_eq!(sut.get(k), model.get(k));
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_state_machine(StringType::new(), &pool, ops)?;
    }

    // Same invariants under worst-case collisions: one chain holds every key.
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_state_machine(Colliding, &pool, ops)?;
    }
}
