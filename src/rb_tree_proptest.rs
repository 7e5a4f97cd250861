#![cfg(test)]

// Property tests for RbTree. Elements are (key, seq) pairs ordered by key
// only, so the model can also pin down where equal elements end up.

use crate::cursor::Cursors;
use crate::error::Error;
use crate::policy::{Duplicates, Keep};
use crate::rb_tree::{Cursor, RbTree, TreeConfig};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::cmp::Ordering;
use std::collections::BTreeMap;

type Elem = (u8, u32);

fn by_key(a: &Elem, b: &Elem) -> Ordering {
    a.0.cmp(&b.0)
}

#[derive(Clone, Debug)]
enum Op {
    Add(u8),
    RemoveValue(u8),
    RemoveAll(u8),
    RemoveAt(usize),
    Find(u8),
    Purge(u8),
    Intersect(Vec<u8>),
    Clear,
    Walk,
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let k = 0u8..32;
    let op = prop_oneof![
        6 => k.clone().prop_map(Op::Add),
        2 => k.clone().prop_map(Op::RemoveValue),
        1 => k.clone().prop_map(Op::RemoveAll),
        2 => any::<usize>().prop_map(Op::RemoveAt),
        2 => k.clone().prop_map(Op::Find),
        1 => (2u8..5).prop_map(Op::Purge),
        1 => proptest::collection::vec(k, 0..20).prop_map(Op::Intersect),
        1 => Just(Op::Clear),
        1 => Just(Op::Walk),
    ];
    proptest::collection::vec(op, 1..100)
}

// Model: key -> sequence numbers in iteration order.
fn flatten(model: &BTreeMap<u8, Vec<u32>>) -> Vec<Elem> {
    model
        .iter()
        .flat_map(|(k, seqs)| seqs.iter().map(move |s| (*k, *s)))
        .collect()
}

fn run(duplicates: Duplicates, ops: Vec<Op>) -> Result<(), TestCaseError> {
    let config = TreeConfig::default().with_duplicates(duplicates);
    let mut sut: RbTree<Elem, _, Keep> = RbTree::from_parts(config, by_key, Keep);
    let allow = duplicates.allowed();
    let mut model: BTreeMap<u8, Vec<u32>> = BTreeMap::new();
    let mut stale: Vec<Cursor> = Vec::new();
    let mut seq = 0u32;

    for op in ops {
        match op {
            Op::Add(k) => {
                seq += 1;
                let present = model.contains_key(&k);
                let added = sut.add((k, seq));
                prop_assert_eq!(added, allow || !present);
                if added {
                    // Ties descend right: newest equal element goes last.
                    model.entry(k).or_default().push(seq);
                }
            }
            Op::RemoveValue(k) => {
                let at = sut.find(&(k, 0));
                let got = sut.remove_value(&(k, 0));
                let expected = model.get_mut(&k).map(|seqs| (k, seqs.remove(0)));
                prop_assert_eq!(got, expected);
                if model.get(&k).is_some_and(|s| s.is_empty()) {
                    model.remove(&k);
                }
                if got.is_some() {
                    stale.push(at);
                }
            }
            Op::RemoveAll(k) => {
                let expected = model.remove(&k).map_or(0, |s| s.len());
                prop_assert_eq!(sut.remove_all(&(k, 0)), expected);
                prop_assert!(!sut.contains(&(k, 0)));
            }
            Op::RemoveAt(i) => {
                if sut.is_empty() {
                    prop_assert_eq!(sut.remove(sut.begin()), Err(Error::EndPosition));
                } else {
                    let i = i % sut.len();
                    let mut at = sut.begin();
                    for _ in 0..i {
                        at = sut.advance(at);
                    }
                    let expected_next = sut.advance(at);
                    let (v, next) = sut.take(at).map_err(|e| TestCaseError::fail(e.to_string()))?;
                    prop_assert_eq!(v, flatten(&model)[i]);
                    prop_assert_eq!(next, expected_next);
                    prop_assert_eq!(sut.remove(at), Err(Error::StalePosition));
                    if let Some(seqs) = model.get_mut(&v.0) {
                        seqs.retain(|s| *s != v.1);
                        if seqs.is_empty() {
                            model.remove(&v.0);
                        }
                    }
                    stale.push(at);
                }
            }
            Op::Find(k) => {
                let at = sut.find(&(k, 0));
                prop_assert_eq!(sut.get(at).copied(), model.get(&k).map(|s| (k, s[0])));
                prop_assert_eq!(sut.count_all(&(k, 0)), model.get(&k).map_or(0, |s| s.len()));
                let by = sut.find_by(|v| k.cmp(&v.0));
                prop_assert_eq!(by, at);
            }
            Op::Purge(m) => {
                let expected = flatten(&model).iter().filter(|v| v.0 % m == 0).count();
                let mut visited = Vec::new();
                let removed = sut.purge(|v| {
                    visited.push(*v);
                    v.0 % m == 0
                });
                prop_assert_eq!(visited, flatten(&model));
                prop_assert_eq!(removed, expected);
                model.retain(|k, _| *k % m != 0);
            }
            Op::Intersect(keys) => {
                let probes: Vec<Elem> = keys.iter().map(|k| (*k, 0)).collect();
                let before = sut.len();
                let mut wanted: BTreeMap<u8, usize> = BTreeMap::new();
                for k in &keys {
                    *wanted.entry(*k).or_insert(0) += 1;
                }
                for (k, seqs) in model.iter_mut() {
                    seqs.truncate(wanted.get(k).copied().unwrap_or(0));
                }
                model.retain(|_, seqs| !seqs.is_empty());
                let removed = sut.intersect(probes.iter());
                prop_assert_eq!(removed, before - flatten(&model).len());
            }
            Op::Clear => {
                sut.clear();
                model.clear();
                prop_assert_eq!(sut.begin(), sut.end());
            }
            Op::Walk => {
                let mut back: Vec<Elem> = Vec::new();
                let mut at = sut.retreat(sut.end());
                while !at.is_end() {
                    back.push(*sut.get(at).ok_or_else(|| TestCaseError::fail("dangling cursor"))?);
                    at = sut.retreat(at);
                }
                back.reverse();
                prop_assert_eq!(back, flatten(&model));
                prop_assert_eq!(sut.first().copied(), flatten(&model).first().copied());
                prop_assert_eq!(sut.last().copied(), flatten(&model).last().copied());
            }
        }

        if let Err(v) = sut.check() {
            return Err(TestCaseError::fail(v.to_string()));
        }
        prop_assert_eq!(sut.iter().copied().collect::<Vec<_>>(), flatten(&model));
        for &at in &stale {
            prop_assert!(sut.get(at).is_none());
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn prop_state_machine_set(ops in arb_ops()) {
        run(Duplicates::Reject, ops)?;
    }

    #[test]
    fn prop_state_machine_multiset(ops in arb_ops()) {
        run(Duplicates::Allow, ops)?;
    }

    // Black height stays logarithmic for any insertion order.
    #[test]
    fn prop_height_bound(values in proptest::collection::vec(any::<u16>(), 0..500)) {
        let tree: RbTree<u16> = values.iter().copied().collect();
        let height = tree
            .check()
            .map_err(|v| TestCaseError::fail(v.to_string()))?;
        let bound = 2 * (usize::BITS - (tree.len() + 1).leading_zeros()) as usize + 1;
        prop_assert!(height <= bound, "black height {} over {}", height, bound);
    }
}
