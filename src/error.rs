//! Errors reported while building a skip list.
//!
//! Only construction can fail. Once the per-level arrays are in hand, every
//! join, split, update and query runs to completion; misuse of those
//! (non-unique join endpoints, range queries across lists) is a caller
//! contract violation and is not checked outside debug assertions.

use levels::PoolError;

/// Error returned by skip list constructors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A per-level array could not be allocated.
    #[error(transparent)]
    Pool(#[from] PoolError),
    /// The configuration was rejected before any allocation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// Element ids are `u32` with `u32::MAX` reserved as the null link.
    #[error("{0} elements requested, at most {max} supported", max = u32::MAX - 1)]
    TooManyElements(usize),
}
