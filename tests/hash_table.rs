// HashTable integration test suite.
//
// Each test documents what behavior is being verified and which
// invariants are assumed or asserted. The core invariants exercised:
// - Placement: every value lives in bucket `hash & (bucket_count - 1)`.
// - Size: len() equals the number of values reachable by iteration.
// - Representation: a bucket holding TREEIFY_THRESHOLD colliding values is
//   a tree and yields them in comparator order; erasing below
//   UNTREEIFY_THRESHOLD turns it back into a chain.
// - Policy: unique operations never store duplicates; multi operations
//   keep every copy.
// - Capacity: bucket count is a power of two that only grows, and
//   reserve(n) with n <= bucket_count() does nothing.
// - Cursors: erase and rehash retire exactly the cursors they document.
use hybrid_hashtable::config::{TREEIFY_THRESHOLD, UNTREEIFY_THRESHOLD};
use hybrid_hashtable::{BucketKind, HashTable, NaturalEq, NaturalOrder, TableConfig, TableError};
use std::cmp::Ordering;
use std::hash::{BuildHasher, Hasher};

#[derive(Clone, Copy, Default)]
struct Identity;
struct IdentityHasher(u64);
impl BuildHasher for Identity {
    type Hasher = IdentityHasher;
    fn build_hasher(&self) -> IdentityHasher {
        IdentityHasher(0)
    }
}
impl Hasher for IdentityHasher {
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes.iter().rev() {
            self.0 = (self.0 << 8) | u64::from(b);
        }
    }
    fn write_i32(&mut self, n: i32) {
        self.0 = u64::from(n as u32);
    }
    fn write_u64(&mut self, n: u64) {
        self.0 = n;
    }
    fn finish(&self) -> u64 {
        self.0
    }
}

#[derive(Clone, Copy, Default)]
struct Constant;
struct ConstantHasher;
impl BuildHasher for Constant {
    type Hasher = ConstantHasher;
    fn build_hasher(&self) -> ConstantHasher {
        ConstantHasher
    }
}
impl Hasher for ConstantHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

fn config(buckets: usize, mlf: f32) -> TableConfig {
    TableConfig::builder()
        .bucket_count(buckets)
        .max_load_factor(mlf)
        .build()
        .expect("valid config")
}

// Test: identity hash over a small table.
// Assumes: growth doubles the bucket array when len would exceed it.
// Verifies: 0..16 into 4 buckets ends with >= 16 buckets, len 16, and
// iteration yields 0..16 in order, once each.
#[test]
fn identity_hash_sixteen_values() {
    let mut t = HashTable::with_strategies(config(4, 1.0), Identity, NaturalOrder, NaturalEq);
    for v in 0..16i32 {
        t.insert_multi(v);
    }
    assert!(t.bucket_count() >= 16);
    assert_eq!(t.len(), 16);
    let seen: Vec<i32> = t.iter().copied().collect();
    assert_eq!(seen, (0..16).collect::<Vec<_>>());
    for v in 0..16 {
        assert_eq!(t.bucket(&v), v as usize);
    }
}

// Test: constant hash with growth suppressed.
// Assumes: max_load_factor 1000 keeps a single bucket.
// Verifies: 8 distinct values force bucket 0 to Tree and all stay findable.
#[test]
fn constant_hash_forces_tree() {
    let mut t = HashTable::with_strategies(config(1, 1000.0), Constant, NaturalOrder, NaturalEq);
    let values = ["h", "c", "f", "a", "g", "b", "e", "d"];
    for v in values {
        t.insert_multi(v);
    }
    assert_eq!(t.bucket_count(), 1);
    assert_eq!(t.bucket_kind(0), BucketKind::Tree);
    for v in values {
        assert_eq!(t.get(t.find(&v)), Some(&v));
    }
}

// Test: treeify correctness under a real bucket index collision.
// Assumes: identity hash; multiples of 64 share bucket 0 of a 64-bucket table.
// Verifies: the bucket becomes a tree exactly at TREEIFY_THRESHOLD and
// iterates in comparator order.
#[test]
fn colliding_values_treeify_at_threshold() {
    let mut t = HashTable::with_strategies(config(64, 8.0), Identity, NaturalOrder, NaturalEq);
    let colliding: Vec<u64> = (0..TREEIFY_THRESHOLD as u64).rev().map(|i| i * 64).collect();
    for (i, &v) in colliding.iter().enumerate() {
        assert_eq!(t.bucket_kind(0), if i == 0 { BucketKind::Empty } else { BucketKind::Chain });
        t.insert_unique(v);
    }
    assert_eq!(t.bucket_count(), 64);
    assert_eq!(t.bucket_kind(0), BucketKind::Tree);
    assert_eq!(t.bucket_size(0), TREEIFY_THRESHOLD);
    let in_bucket: Vec<u64> = t.bucket_values(0).copied().collect();
    let mut sorted = colliding.clone();
    sorted.sort_unstable();
    assert_eq!(in_bucket, sorted);
}

// Test: the comparator, not Ord, orders tree buckets.
// Verifies: a reversed comparator yields descending bucket iteration.
#[test]
fn tree_bucket_follows_custom_comparator() {
    let rev = |a: &i32, b: &i32| b.cmp(a);
    let eq = |a: &i32, b: &i32| a == b;
    let mut t = HashTable::with_strategies(config(1, 1000.0), Constant, rev, eq);
    for v in 0..10 {
        t.insert_multi(v);
    }
    assert_eq!(t.bucket_kind(0), BucketKind::Tree);
    let got: Vec<i32> = t.bucket_values(0).copied().collect();
    assert_eq!(got, (0..10).rev().collect::<Vec<_>>());
    assert_eq!(t.comparator()(&1, &2), Ordering::Greater);
}

// Test: round trip through insert_unique, find and erase.
// Verifies: find after insert sees an equal value; find after erase is end.
#[test]
fn insert_find_erase_round_trip() {
    let mut t: HashTable<String> = HashTable::new();
    for word in ["alpha", "beta", "gamma"] {
        let (pos, inserted) = t.insert_unique(word.to_string());
        assert!(inserted);
        assert_eq!(t.get(pos).map(String::as_str), Some(word));
    }
    let key = "beta".to_string();
    let pos = t.find(&key);
    assert_eq!(t.get(pos), Some(&key));
    assert_eq!(t.erase(pos), Some(key.clone()));
    assert!(t.find(&key).is_end());
    assert_eq!(t.find(&key), t.end());
    assert_eq!(t.len(), 2);
}

// Test: unique and multi policies side by side.
// Verifies: unique rejects with a cursor at the stored copy; multi keeps
// every copy; counts and ranges agree.
#[test]
fn unique_and_multi_policies() {
    let mut t: HashTable<&str> = HashTable::new();
    t.insert_multi("x");
    t.insert_multi("x");
    let (pos, inserted) = t.insert_unique("x");
    assert!(!inserted);
    assert_eq!(t.get(pos), Some(&"x"));
    assert_eq!(t.count_multi(&"x"), 2);
    assert_eq!(t.count_unique(&"x"), 1);

    let (first, last) = t.equal_range_multi(&"x");
    assert_eq!(t.next(t.next(first)), last);
    let (first, last) = t.equal_range_unique(&"x");
    assert_eq!(t.next(first), last);

    assert_eq!(t.erase_unique(&"x"), 1);
    assert_eq!(t.count_multi(&"x"), 1);
    assert_eq!(t.erase_multi(&"x"), 1);
    assert_eq!(t.erase_multi(&"x"), 0);
    assert!(t.is_empty());
}

// Test: rehash preserves contents and never shrinks.
// Verifies: rehash(2 * bucket_count) keeps len and every value findable;
// a smaller request is ignored.
#[test]
fn rehash_preserves_contents() {
    let mut t: HashTable<u32> = (0..500).chain(0..100).collect();
    let before = t.bucket_count();
    assert!(before.is_power_of_two());
    t.rehash(before * 2);
    assert_eq!(t.bucket_count(), before * 2);
    assert_eq!(t.len(), 600);
    for v in 0..500 {
        assert_eq!(t.count_multi(&v), if v < 100 { 2 } else { 1 });
    }
    t.rehash(before);
    assert_eq!(t.bucket_count(), before * 2);
}

// Test: reserve is idempotent below the current bucket count.
// Verifies: no rehash happens, observed through a cursor staying live.
#[test]
fn reserve_is_noop_when_small() {
    let mut t: HashTable<u8> = HashTable::new();
    let pos = t.insert_multi(1);
    let n = t.bucket_count();
    for request in [0, 1, n / 2, n] {
        t.reserve(request);
        assert_eq!(t.bucket_count(), n);
        assert_eq!(t.get(pos), Some(&1));
    }
    t.reserve(n + 1);
    assert_eq!(t.bucket_count(), n * 2);
    assert_eq!(t.get(pos), None, "rehash retires cursors");
    assert_eq!(t.try_reserve(3), Ok(()));
}

// Test: erasing a tree bucket down past the untreeify threshold.
// Verifies: the bucket becomes a chain again with its values intact.
#[test]
fn erase_shrinks_tree_back_to_chain() {
    let mut t = HashTable::with_strategies(config(1, 1000.0), Constant, NaturalOrder, NaturalEq);
    for v in 0..TREEIFY_THRESHOLD as u32 {
        t.insert_multi(v);
    }
    assert_eq!(t.bucket_kind(0), BucketKind::Tree);
    let mut v = TREEIFY_THRESHOLD as u32;
    while t.len() >= UNTREEIFY_THRESHOLD {
        v -= 1;
        assert_eq!(t.erase_unique(&v), 1);
    }
    assert_eq!(t.bucket_kind(0), BucketKind::Chain);
    assert_eq!(t.len(), UNTREEIFY_THRESHOLD - 1);
    for v in 0..t.len() as u32 {
        assert!(t.contains(&v));
    }
}

// Test: cursor walk equals the iterator.
// Verifies: begin/next visit the same sequence as iter() and end after len steps.
#[test]
fn cursor_walk_matches_iter() {
    let t: HashTable<i64> = (-50..50).collect();
    let mut walked = Vec::new();
    let mut pos = t.begin();
    while pos != t.end() {
        walked.push(*t.get(pos).unwrap());
        pos = t.next(pos);
    }
    let iterated: Vec<i64> = t.iter().copied().collect();
    assert_eq!(walked, iterated);
    assert_eq!(walked.len(), 100);
    assert_eq!((&t).into_iter().len(), 100);
}

// Test: erase_range over a prefix and over everything.
#[test]
fn erase_range_counts_removed_values() {
    let mut t: HashTable<u16> = (0..40).collect();
    let mut last = t.begin();
    for _ in 0..10 {
        last = t.next(last);
    }
    assert_eq!(t.erase_range(t.begin(), last), 10);
    assert_eq!(t.len(), 30);
    assert_eq!(t.erase_range(t.begin(), t.end()), 30);
    assert!(t.is_empty());
}

// Test: clones are independent deep copies.
#[test]
fn clone_is_independent() {
    let mut a: HashTable<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    let b = a.clone();
    a.clear();
    assert!(a.is_empty());
    assert_eq!(b.len(), 3);
    assert!(b.contains(&"b".to_string()));
}

// Test: cursors are bound to the table that issued them.
// Assumes: a clone holds equal values but has its own identity.
// Verifies: a cursor from the source resolves to nothing in the clone or in
// an unrelated table, and erasing with it leaves the clone untouched.
#[test]
fn cursor_from_another_table_is_rejected() {
    let a: HashTable<u32> = (0..32).collect();
    let mut b = a.clone();
    for v in 0..32 {
        let pos = a.find(&v);
        assert_eq!(a.get(pos), Some(&v));
        assert_eq!(b.get(pos), None);
        assert_eq!(b.next(pos), b.end());
        assert_ne!(pos, b.find(&v));
    }
    assert_eq!(b.erase(a.find(&3)), None);
    assert_eq!(b.erase_range(a.begin(), a.end()), 0);
    assert_eq!(b.len(), 32);
    let unrelated: HashTable<u32> = (0..32).collect();
    assert_eq!(unrelated.get(a.find(&3)), None);
    assert_eq!(b.erase(b.find(&3)), Some(3));
    assert_eq!(a.len(), 32);
}

// Test: swap moves cursors along with the values they point at.
#[test]
fn swap_carries_cursors_with_values() {
    let mut a: HashTable<u8> = (0..4).collect();
    let mut b: HashTable<u8> = (10..12).collect();
    let pos = a.find(&2);
    a.swap(&mut b);
    assert_eq!(a.get(pos), None);
    assert_eq!(b.get(pos), Some(&2));
    assert_eq!((a.len(), b.len()), (2, 4));
}

// Test: configuration validation is reported through TableError.
// Verifies: every config the builder accepts survives its first insert.
#[test]
fn invalid_configs_are_rejected() {
    assert_eq!(
        TableConfig::builder().max_load_factor(-2.0).build(),
        Err(TableError::InvalidLoadFactor(-2.0))
    );
    assert!(matches!(
        TableConfig::builder().treeify_threshold(5).untreeify_threshold(7).build(),
        Err(TableError::InvalidThreshold { treeify: 5, untreeify: 7 })
    ));
    // One value would need more buckets than any table can hold.
    assert_eq!(
        TableConfig::builder().max_load_factor(1e-30).build(),
        Err(TableError::InvalidLoadFactor(1e-30))
    );
    let mut t: HashTable<u8> = HashTable::new();
    assert!(t.set_max_load_factor(0.0).is_err());
    assert!(t.set_max_load_factor(1e-30).is_err());
    assert!(matches!(
        t.try_rehash(usize::MAX),
        Err(TableError::CapacityOverflow { .. })
    ));
    let mut sparse: HashTable<u8> = HashTable::with_config(config(16, 1.0 / 1024.0));
    sparse.insert_multi(1);
    assert_eq!(sparse.bucket_count(), 1024);
}
