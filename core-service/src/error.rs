//! Error handling
//!
//! Crate-level taxonomy surfaced to callers of `MarineService`.
//! Detector failures never appear here: they demote the detector instead.

use crate::logic::acquisition::AcquisitionError;
use crate::logic::store::StoreError;

pub type MarineResult<T> = Result<T, MarineError>;

#[derive(Debug, thiserror::Error)]
pub enum MarineError {
    /// Bytes could not be decoded as an image
    #[error("invalid image: {0}")]
    InvalidImage(#[from] image::ImageError),

    /// Every acquisition candidate was exhausted
    #[error("fetch failure: {0}")]
    FetchFailure(#[from] AcquisitionError),

    /// The prediction document could not be written
    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] StoreError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("batch of {len} items exceeds the limit of {max}")]
    BatchTooLarge { len: usize, max: usize },

    #[error("batch is empty")]
    EmptyBatch,

    #[error("unknown label: {0}")]
    InvalidLabel(String),
}
