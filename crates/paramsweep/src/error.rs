use crate::model::IndexTuple;

/// Errors raised while configuring, expanding, or iterating a sweep.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    /// Invalid ranges, context, or worker configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Parameters within one level resolved to differing counts
    #[error(
        "parameter ranges for `{parameter}` at level {level} are not consistent in count: expected {expected}, got {found}"
    )]
    InconsistentRange {
        level: usize,
        parameter: String,
        expected: usize,
        found: usize,
    },

    /// The resolver produced NaN for a concrete index
    #[error("bad number for parameter `{parameter}` at indices {index:?}")]
    InvalidValue {
        parameter: String,
        index: IndexTuple,
    },

    /// A supplied grid does not fit the ranges being expanded
    #[error("cached grid does not fit level {level}: expected extent {expected}, found {found}")]
    GridMismatch {
        level: usize,
        expected: usize,
        found: usize,
    },

    /// A grid cell was decoded before it was computed
    #[error("parameter `{parameter}` has no value at indices {index:?}")]
    Uncomputed {
        parameter: String,
        index: IndexTuple,
    },

    #[error("range resolution failed: {0}")]
    Resolve(String),

    #[error("mask evaluation failed: {0}")]
    Mask(String),

    #[error("function evaluation failed: {0}")]
    Function(String),

    #[error("dispatch failed: {0}")]
    Dispatch(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for SweepError {
    fn from(err: serde_json::Error) -> Self {
        SweepError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SweepError>;
