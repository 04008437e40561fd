use thiserror::Error;

/// Errors raised while validating a [`crate::Params`] pair before a sketch can be built.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ParamsError {
    #[error("precision must be between 4 and 18, got {0}")]
    PrecisionOutOfRange(u8),
    #[error("sparse precision must be between 1 and 58, got {0}")]
    SparsePrecisionOutOfRange(u8),
    #[error("sparse precision ({sparse_precision}) must be greater than precision ({precision})")]
    SparsePrecisionNotGreaterThanPrecision { precision: u8, sparse_precision: u8 },
}

/// Errors raised by [`crate::Sketch`] operations.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum HllError {
    #[error("{0}")]
    UnsupportedParameters(#[from] ParamsError),
    #[error("cannot merge sketches with different seeds ({left:#x} != {right:#x})")]
    IncompatibleSeeds { left: u64, right: u64 },
    #[error("operation is only valid on a dense sketch")]
    WrongRepresentation,
}
