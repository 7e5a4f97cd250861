#![cfg(test)]

// Property tests for HashTable, kept inside the crate so the structural
// checker and the collision hasher do not need to be exported.

use crate::cursor::Cursors;
use crate::error::Error;
use crate::hash_table::{HashConfig, HashTable, Position};
use crate::policy::{Duplicates, Keep};
use hashbrown::hash_map::DefaultHashBuilder;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hasher};

#[derive(Clone, Debug)]
enum Op {
    Add(u8),
    RemoveValue(u8),
    RemoveAll(u8),
    // Index into the current iteration order, taken modulo len.
    RemoveAt(usize),
    Count(u8),
    Purge(u8),
    Intersect(Vec<u8>),
    Resize(usize),
    Clear,
    Iterate,
}

// Small value domain so duplicates and collisions are frequent.
fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let v = 0u8..24;
    let op = prop_oneof![
        6 => v.clone().prop_map(Op::Add),
        2 => v.clone().prop_map(Op::RemoveValue),
        1 => v.clone().prop_map(Op::RemoveAll),
        2 => any::<usize>().prop_map(Op::RemoveAt),
        2 => v.clone().prop_map(Op::Count),
        1 => (2u8..5).prop_map(Op::Purge),
        1 => proptest::collection::vec(v, 0..16).prop_map(Op::Intersect),
        1 => (0usize..200).prop_map(Op::Resize),
        1 => Just(Op::Clear),
        1 => Just(Op::Iterate),
    ];
    proptest::collection::vec(op, 1..80)
}

// Collision variant: every element lands in bucket 0.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

fn model_len(model: &HashMap<u8, usize>) -> usize {
    model.values().sum()
}

fn bump(model: &mut HashMap<u8, usize>, v: u8, by: isize) {
    let n = model.entry(v).or_insert(0);
    *n = (*n as isize + by) as usize;
    if *n == 0 {
        model.remove(&v);
    }
}

// State-machine equivalence against a counting model. After every op the
// table must pass `check()`, agree on len, and every position taken from a
// removed element must stop resolving.
fn run<S: BuildHasher>(
    mut sut: HashTable<u8, S, Keep>,
    ops: Vec<Op>,
) -> Result<(), TestCaseError> {
    let allow = sut.config().duplicates.allowed();
    let mut model: HashMap<u8, usize> = HashMap::new();
    let mut stale: Vec<Position> = Vec::new();

    for op in ops {
        match op {
            Op::Add(v) => {
                let present = model.contains_key(&v);
                let added = sut.add(v);
                prop_assert_eq!(added, allow || !present);
                if added {
                    bump(&mut model, v, 1);
                }
            }
            Op::RemoveValue(v) => {
                let at = sut.find(&v);
                let got = sut.remove_value(&v);
                prop_assert_eq!(got, model.contains_key(&v).then_some(v));
                if got.is_some() {
                    bump(&mut model, v, -1);
                    stale.push(at);
                }
            }
            Op::RemoveAll(v) => {
                let expected = model.remove(&v).unwrap_or(0);
                prop_assert_eq!(sut.remove_all(&v), expected);
            }
            Op::RemoveAt(i) => {
                if sut.is_empty() {
                    prop_assert_eq!(sut.remove(sut.begin()), Err(Error::EndPosition));
                } else {
                    let mut at = sut.begin();
                    for _ in 0..i % sut.len() {
                        at = sut.advance(at);
                    }
                    let expected_next = sut.advance(at);
                    let (v, next) = sut.take(at).map_err(|e| TestCaseError::fail(e.to_string()))?;
                    prop_assert_eq!(next, expected_next);
                    prop_assert_eq!(sut.remove(at), Err(Error::StalePosition));
                    bump(&mut model, v, -1);
                    stale.push(at);
                }
            }
            Op::Count(v) => {
                prop_assert_eq!(sut.count_all(&v), model.get(&v).copied().unwrap_or(0));
                prop_assert_eq!(sut.contains(&v), model.contains_key(&v));
                // find + find_next enumerate exactly the run.
                let mut at = sut.find(&v);
                let mut n = 0;
                while !at.is_end() {
                    prop_assert_eq!(sut.get(at), Some(&v));
                    n += 1;
                    at = sut.find_next(at);
                }
                prop_assert_eq!(n, model.get(&v).copied().unwrap_or(0));
            }
            Op::Purge(m) => {
                let expected: usize = model
                    .iter()
                    .filter(|(v, _)| **v % m == 0)
                    .map(|(_, n)| n)
                    .sum();
                let mut visited = 0;
                let removed = sut.purge(|v| {
                    visited += 1;
                    *v % m == 0
                });
                prop_assert_eq!(removed, expected);
                prop_assert_eq!(visited, model_len(&model));
                model.retain(|v, _| *v % m != 0);
            }
            Op::Intersect(subset) => {
                let mut wanted: HashMap<u8, usize> = HashMap::new();
                for v in &subset {
                    *wanted.entry(*v).or_insert(0) += 1;
                }
                let before = model_len(&model);
                model = model
                    .iter()
                    .filter_map(|(v, n)| {
                        let keep = (*n).min(wanted.get(v).copied().unwrap_or(0));
                        (keep > 0).then_some((*v, keep))
                    })
                    .collect();
                prop_assert_eq!(sut.intersect(subset.iter()), before - model_len(&model));
            }
            Op::Resize(n) => {
                let cap = sut.capacity();
                sut.resize(n);
                prop_assert_eq!(sut.capacity(), cap.max(n));
            }
            Op::Clear => {
                sut.clear();
                model.clear();
                stale.clear();
                prop_assert_eq!(sut.begin(), sut.end());
            }
            Op::Iterate => {
                let mut seen: HashMap<u8, usize> = HashMap::new();
                for v in sut.iter() {
                    *seen.entry(*v).or_insert(0) += 1;
                }
                prop_assert_eq!(&seen, &model);
                let mut back = 0;
                let mut at = sut.retreat(sut.end());
                while !at.is_end() {
                    back += 1;
                    at = sut.retreat(at);
                }
                prop_assert_eq!(back, sut.len());
            }
        }

        if let Err(v) = sut.check() {
            return Err(TestCaseError::fail(v.to_string()));
        }
        prop_assert_eq!(sut.len(), model_len(&model));
        for &at in &stale {
            prop_assert!(sut.get(at).is_none());
        }
    }
    Ok(())
}

fn config(duplicates: Duplicates) -> HashConfig {
    HashConfig::default()
        .with_starting_capacity(3)
        .with_duplicates(duplicates)
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn prop_state_machine_set(ops in arb_ops()) {
        let sut = HashTable::from_parts(config(Duplicates::Reject), DefaultHashBuilder::default(), Keep).unwrap();
        run(sut, ops)?;
    }

    #[test]
    fn prop_state_machine_multiset(ops in arb_ops()) {
        let sut = HashTable::from_parts(config(Duplicates::Allow), DefaultHashBuilder::default(), Keep).unwrap();
        run(sut, ops)?;
    }

    // Worst-case collisions: one chain holds everything, stressing run
    // contiguity and equality probing.
    #[test]
    fn prop_state_machine_with_collisions(ops in arb_ops(), allow in any::<bool>()) {
        let dups = if allow { Duplicates::Allow } else { Duplicates::Reject };
        let sut = HashTable::from_parts(config(dups), ConstBuildHasher, Keep).unwrap();
        run(sut, ops)?;
    }

    // Growth keeps the load factor for any valid configuration.
    #[test]
    fn prop_load_factor_bound(
        n in 0usize..400,
        start in 0usize..40,
        lf in 0.1f32..4.0,
    ) {
        let cfg = HashConfig::default()
            .with_starting_capacity(start)
            .with_load_factor(lf);
        let mut sut: HashTable<usize> = HashTable::with_config(cfg).unwrap();
        for v in 0..n {
            sut.add(v);
            prop_assert!(sut.len() as f32 / sut.capacity() as f32 <= lf);
        }
        prop_assert_eq!(sut.len(), n);
        if let Err(v) = sut.check() {
            return Err(TestCaseError::fail(v.to_string()));
        }
    }
}
