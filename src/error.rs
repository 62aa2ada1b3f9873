//! Crate-wide error taxonomy.

use thiserror::Error;

use crate::access::store::PersistenceError;

pub type MapResult<T> = Result<T, MapError>;

/// Failures surfaced by map operations.
///
/// A missing region is not an error: the access layer substitutes an
/// empty-marker-filled buffer, so reads of never-written coordinates
/// come back as `Ok(None)`.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("coordinate ({x}, {y}) outside extent {width}x{height}")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("format mismatch: {0}")]
    FormatMismatch(String),

    #[error("value {value} outside the {bits}-bit format domain")]
    ValueOutOfRange { value: u64, bits: u32 },

    #[error("incomplete mapping: {0}")]
    IncompleteMapping(String),

    #[error("overlap detected: {0}")]
    OverlapDetected(String),

    #[error("partition mismatch: {0}")]
    PartitionMismatch(String),

    #[error("extent may only grow: current {current:?}, requested {requested:?}")]
    ShrinkNotSupported {
        current: crate::coord::Extent,
        requested: crate::coord::Extent,
    },

    #[error("persistence failure: {0}")]
    Persistence(#[from] PersistenceError),
}
