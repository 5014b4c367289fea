//! Table configuration.
//!
//! A [`TableConfig`] is only obtainable through [`TableConfig::default`] or
//! a validated [`TableConfigBuilder::build`], so a table never holds an
//! inconsistent policy.
//!
//! ```
//! use hybrid_hashtable::{HashTable, TableConfig};
//!
//! let cfg = TableConfig::builder()
//!     .bucket_count(4)
//!     .max_load_factor(0.75)
//!     .cache_hash(true)
//!     .build()
//!     .unwrap();
//! let mut t: HashTable<u32> = HashTable::with_config(cfg);
//! t.insert_multi(7);
//! assert_eq!(t.bucket_count(), 4);
//! ```

use crate::bucket::Bucket;
use crate::error::TableError;

/// Chain length at which a bucket is converted to a red-black tree.
pub const TREEIFY_THRESHOLD: usize = 8;

/// A tree bucket that shrinks below this many nodes is converted back to a
/// chain (when `untreeify_on_erase` is enabled).
pub const UNTREEIFY_THRESHOLD: usize = 6;

pub const DEFAULT_BUCKET_COUNT: usize = 16;

pub const DEFAULT_MAX_LOAD_FACTOR: f32 = 1.0;

/// Largest bucket count a table can reach: the biggest power of two whose
/// bucket array stays within `isize::MAX` bytes.
pub const MAX_BUCKETS: usize = {
    let n = isize::MAX as usize / core::mem::size_of::<Bucket>();
    1 << (usize::BITS - 1 - n.leading_zeros())
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TableConfig {
    bucket_count: usize,
    max_load_factor: f32,
    treeify_threshold: usize,
    untreeify_threshold: usize,
    untreeify_on_erase: bool,
    cache_hash: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            bucket_count: DEFAULT_BUCKET_COUNT,
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
            treeify_threshold: TREEIFY_THRESHOLD,
            untreeify_threshold: UNTREEIFY_THRESHOLD,
            untreeify_on_erase: true,
            cache_hash: false,
        }
    }
}

impl TableConfig {
    pub fn builder() -> TableConfigBuilder {
        TableConfigBuilder {
            config: TableConfig::default(),
            requested_buckets: DEFAULT_BUCKET_COUNT,
        }
    }

    /// Initial number of buckets, always a power of two.
    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    pub fn max_load_factor(&self) -> f32 {
        self.max_load_factor
    }

    pub fn treeify_threshold(&self) -> usize {
        self.treeify_threshold
    }

    pub fn untreeify_threshold(&self) -> usize {
        self.untreeify_threshold
    }

    pub fn untreeify_on_erase(&self) -> bool {
        self.untreeify_on_erase
    }

    /// Whether nodes remember their hash so rehashing never calls the
    /// hasher. Requires the hash of a value to be stable for its lifetime
    /// in the table; this is not checked.
    pub fn cache_hash(&self) -> bool {
        self.cache_hash
    }

    pub(crate) fn set_max_load_factor(&mut self, mlf: f32) -> Result<(), TableError> {
        check_load_factor(mlf)?;
        self.max_load_factor = mlf;
        Ok(())
    }
}

// A single value must fit in the largest bucket array, or the first insert
// would have nowhere to grow to.
fn check_load_factor(mlf: f32) -> Result<(), TableError> {
    if mlf.is_finite() && mlf > 0.0 && f64::from(mlf).recip() <= MAX_BUCKETS as f64 {
        Ok(())
    } else {
        Err(TableError::InvalidLoadFactor(mlf))
    }
}

#[derive(Clone, Debug)]
pub struct TableConfigBuilder {
    config: TableConfig,
    requested_buckets: usize,
}

impl TableConfigBuilder {
    /// Bucket count hint; rounded up to a power of two, at least 1.
    pub fn bucket_count(mut self, n: usize) -> Self {
        self.requested_buckets = n;
        self
    }

    pub fn max_load_factor(mut self, mlf: f32) -> Self {
        self.config.max_load_factor = mlf;
        self
    }

    pub fn treeify_threshold(mut self, n: usize) -> Self {
        self.config.treeify_threshold = n;
        self
    }

    pub fn untreeify_threshold(mut self, n: usize) -> Self {
        self.config.untreeify_threshold = n;
        self
    }

    pub fn untreeify_on_erase(mut self, on: bool) -> Self {
        self.config.untreeify_on_erase = on;
        self
    }

    pub fn cache_hash(mut self, on: bool) -> Self {
        self.config.cache_hash = on;
        self
    }

    pub fn build(self) -> Result<TableConfig, TableError> {
        let mut config = self.config;
        config.bucket_count = self
            .requested_buckets
            .max(1)
            .checked_next_power_of_two()
            .filter(|&n| n <= MAX_BUCKETS)
            .ok_or(TableError::CapacityOverflow {
                requested: self.requested_buckets,
            })?;
        check_load_factor(config.max_load_factor)?;
        if config.treeify_threshold < 2 || config.untreeify_threshold >= config.treeify_threshold {
            return Err(TableError::InvalidThreshold {
                treeify: config.treeify_threshold,
                untreeify: config.untreeify_threshold,
            });
        }
        Ok(config)
    }
}
