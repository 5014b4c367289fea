//! Errors reported by the fallible table APIs.
//!
//! Duplicate keys and absent keys are not errors: unique insertion reports
//! them through its `bool`, lookups through the end cursor or a zero count.

use std::collections::TryReserveError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    /// The requested bucket count has no power of two representable in `usize`.
    #[error("capacity overflow: {requested} buckets cannot be rounded up to a power of two")]
    CapacityOverflow { requested: usize },

    /// The bucket array could not be allocated. The table is unchanged.
    #[error("bucket array allocation failed: {0}")]
    Alloc(#[from] TryReserveError),

    /// Not finite, not positive, or so small that one value would need
    /// more than [`MAX_BUCKETS`](crate::config::MAX_BUCKETS) buckets.
    #[error("invalid max load factor {0}: must be finite, positive and admit one value per table")]
    InvalidLoadFactor(f32),

    #[error(
        "invalid bucket thresholds: treeify is {treeify}, untreeify is {untreeify}; \
         treeify must be at least 2 and untreeify below it"
    )]
    InvalidThreshold { treeify: usize, untreeify: usize },
}
