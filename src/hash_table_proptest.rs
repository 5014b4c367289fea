#![cfg(test)]

// State-machine property tests for HashTable, kept inside the crate so every
// step can run the structural invariant checker.

use crate::config::TableConfig;
use crate::strategy::{NaturalEq, NaturalOrder};
use crate::{Cursor, HashTable};
use core::hash::{BuildHasher, Hasher};
use hashbrown::hash_map::DefaultHashBuilder;
use proptest::prelude::*;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
enum Op {
    InsertMulti(u16),
    InsertUnique(u16),
    EraseMulti(u16),
    EraseUnique(u16),
    EraseFound(u16),
    EraseRange(usize, usize),
    Count(u16),
    EqualRange(u16),
    Rehash(usize),
    Reserve(usize),
    Iterate,
    Clear,
}

fn arb_op() -> impl Strategy<Value = Op> {
    // A narrow value range keeps duplicates and collisions frequent.
    let v = 0u16..48;
    prop_oneof![
        4 => v.clone().prop_map(Op::InsertMulti),
        4 => v.clone().prop_map(Op::InsertUnique),
        1 => v.clone().prop_map(Op::EraseMulti),
        2 => v.clone().prop_map(Op::EraseUnique),
        2 => v.clone().prop_map(Op::EraseFound),
        1 => (0usize..20, 0usize..6).prop_map(|(skip, n)| Op::EraseRange(skip, n)),
        2 => v.clone().prop_map(Op::Count),
        2 => v.prop_map(Op::EqualRange),
        1 => (0usize..300).prop_map(Op::Rehash),
        1 => (0usize..300).prop_map(Op::Reserve),
        1 => Just(Op::Iterate),
        1 => Just(Op::Clear),
    ]
}

// Small thresholds make conversions happen within a short run.
fn arb_config() -> impl Strategy<Value = TableConfig> {
    (
        0usize..9,
        prop::sample::select(vec![0.5f32, 1.0, 3.0]),
        2usize..10,
        any::<bool>(),
        any::<bool>(),
    )
        .prop_flat_map(|(buckets, mlf, treeify, shrink, cache)| {
            (0..treeify).prop_map(move |untreeify| {
                TableConfig::builder()
                    .bucket_count(buckets)
                    .max_load_factor(mlf)
                    .treeify_threshold(treeify)
                    .untreeify_threshold(untreeify)
                    .untreeify_on_erase(shrink)
                    .cache_hash(cache)
                    .build()
                    .expect("generated config is valid")
            })
        })
}

/// Remove one occurrence of `v` from the model; false when there was none.
fn model_take(model: &mut BTreeMap<u16, usize>, v: u16) -> bool {
    match model.get_mut(&v) {
        Some(n) if *n > 1 => {
            *n -= 1;
            true
        }
        Some(_) => {
            model.remove(&v);
            true
        }
        None => false,
    }
}

fn run<S>(config: TableConfig, hasher: S, ops: Vec<Op>) -> Result<(), TestCaseError>
where
    S: BuildHasher + Clone,
{
    let mut sut = HashTable::with_strategies(config, hasher, NaturalOrder, NaturalEq);
    let mut model: BTreeMap<u16, usize> = BTreeMap::new();
    let mut stale: Vec<Cursor> = Vec::new();

    for op in ops {
        match op {
            Op::InsertMulti(v) => {
                let pos = sut.insert_multi(v);
                prop_assert_eq!(sut.get(pos), Some(&v));
                *model.entry(v).or_default() += 1;
            }
            Op::InsertUnique(v) => {
                let before = sut.bucket_count();
                let (pos, inserted) = sut.insert_unique(v);
                prop_assert_eq!(sut.get(pos), Some(&v));
                prop_assert_eq!(inserted, !model.contains_key(&v));
                if inserted {
                    *model.entry(v).or_default() += 1;
                } else {
                    prop_assert_eq!(sut.bucket_count(), before, "rejected insert rehashed");
                }
            }
            Op::EraseMulti(v) => {
                let n = sut.erase_multi(&v);
                prop_assert_eq!(n, model.remove(&v).unwrap_or(0));
                prop_assert!(sut.find(&v).is_end());
            }
            Op::EraseUnique(v) => {
                let n = sut.erase_unique(&v);
                prop_assert_eq!(n, usize::from(model_take(&mut model, v)));
            }
            Op::EraseFound(v) => {
                let pos = sut.find(&v);
                let got = sut.erase(pos);
                prop_assert_eq!(got, model_take(&mut model, v).then_some(v));
                if !pos.is_end() {
                    stale.push(pos);
                }
            }
            Op::EraseRange(skip, n) => {
                let mut first = sut.begin();
                for _ in 0..skip {
                    first = sut.next(first);
                }
                let mut last = first;
                let mut doomed = Vec::new();
                for _ in 0..n {
                    if let Some(&x) = sut.get(last) {
                        doomed.push(x);
                    }
                    last = sut.next(last);
                }
                prop_assert_eq!(sut.erase_range(first, last), doomed.len());
                for x in doomed {
                    prop_assert!(model_take(&mut model, x));
                }
            }
            Op::Count(v) => {
                let expect = model.get(&v).copied().unwrap_or(0);
                prop_assert_eq!(sut.count_multi(&v), expect);
                prop_assert_eq!(sut.count_unique(&v), usize::from(expect > 0));
                prop_assert_eq!(sut.contains(&v), expect > 0);
            }
            Op::EqualRange(v) => {
                let (mut pos, last) = sut.equal_range_multi(&v);
                let mut n = 0;
                while pos != last {
                    prop_assert_eq!(sut.get(pos), Some(&v));
                    n += 1;
                    pos = sut.next(pos);
                }
                prop_assert_eq!(n, model.get(&v).copied().unwrap_or(0));
            }
            Op::Rehash(n) => {
                let before = sut.bucket_count();
                sut.rehash(n);
                prop_assert_eq!(sut.bucket_count(), before.max(n.max(1).next_power_of_two()));
            }
            Op::Reserve(n) => {
                let before = sut.bucket_count();
                sut.reserve(n);
                if n <= before {
                    prop_assert_eq!(sut.bucket_count(), before);
                }
            }
            Op::Iterate => {
                let mut counts: BTreeMap<u16, usize> = BTreeMap::new();
                for &x in &sut {
                    *counts.entry(x).or_default() += 1;
                }
                prop_assert_eq!(&counts, &model);
                let copy = sut.clone();
                prop_assert_eq!(
                    copy.iter().collect::<Vec<_>>(),
                    sut.iter().collect::<Vec<_>>()
                );
                copy.check_invariants().map_err(TestCaseError::fail)?;
                prop_assert!(copy.get(sut.begin()).is_none(), "clone honored a foreign cursor");
            }
            Op::Clear => {
                sut.clear();
                model.clear();
            }
        }

        // Post-conditions after each op
        sut.check_invariants().map_err(TestCaseError::fail)?;
        prop_assert_eq!(sut.len(), model.values().sum::<usize>());
        prop_assert_eq!(sut.iter().len(), sut.len());
        let limit = sut.bucket_count() as f64 * f64::from(sut.max_load_factor());
        prop_assert!(sut.len() as f64 <= limit, "load factor over the limit");
        for &pos in &stale {
            prop_assert!(sut.get(pos).is_none(), "erased cursor still resolves");
        }
    }
    Ok(())
}

// Hashes a value to itself, so neighbours land in neighbouring buckets and
// small tables collide often.
#[derive(Clone, Default)]
struct IdentityBuildHasher;
struct IdentityHasher(u64);
impl BuildHasher for IdentityBuildHasher {
    type Hasher = IdentityHasher;
    fn build_hasher(&self) -> Self::Hasher {
        IdentityHasher(0)
    }
}
impl Hasher for IdentityHasher {
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes.iter().rev() {
            self.0 = (self.0 << 8) | u64::from(b);
        }
    }
    fn write_u16(&mut self, n: u16) {
        self.0 = u64::from(n);
    }
    fn finish(&self) -> u64 {
        self.0
    }
}

// Collision variant using a constant hasher: every value shares bucket 0.
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

// Property: state-machine equivalence against a multiset model.
// Invariants checked after every op:
// - bucket count is a power of two and every value sits in `hash & mask`;
// - chains stay below the treeify threshold with equal values contiguous;
// - tree buckets satisfy the red-black rules and iterate in order;
// - len equals reachable nodes equals allocated nodes;
// - load factor stays within the limit;
// - erased cursors never resolve again.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(
        config in arb_config(),
        ops in proptest::collection::vec(arb_op(), 1..80),
    ) {
        run(config, DefaultHashBuilder::default(), ops)?;
    }

    #[test]
    fn prop_state_machine_identity_hash(
        config in arb_config(),
        ops in proptest::collection::vec(arb_op(), 1..80),
    ) {
        run(config, IdentityBuildHasher, ops)?;
    }

    #[test]
    fn prop_state_machine_with_collisions(
        config in arb_config(),
        ops in proptest::collection::vec(arb_op(), 1..80),
    ) {
        run(config, ConstBuildHasher, ops)?;
    }
}
