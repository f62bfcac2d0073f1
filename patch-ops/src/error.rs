use thiserror::Error;

/// The error type for patch operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatchError {
    /// A buffer length does not match the declared patch shape.
    #[error("Shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch {
        /// Number of values implied by the shape.
        expected: usize,
        /// Number of values actually provided.
        actual: usize,
    },

    /// A patch side length of zero was requested.
    #[error("Patch size must be greater than 0")]
    ZeroPatchSize,

    /// The patch does not fit into the source image.
    #[error("Patch of size {patch_size} does not fit into a {width}x{height} image")]
    PatchLargerThanImage {
        patch_size: usize,
        width: usize,
        height: usize,
    },

    /// An index is past the end of the tensor.
    #[error("Index {index} out of bounds for {len} patches")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A probability outside `[0, 1]`.
    #[error("Invalid probability: {value} (must be within [0, 1])")]
    InvalidProbability { value: f64 },

    /// A batch size of zero.
    #[error("Invalid batch size {batch_size} for {len} samples")]
    InvalidBatchSize { batch_size: usize, len: usize },

    /// An unrecognised corruption mode name.
    #[error("Unknown corruption type: {name}")]
    UnknownCorruption { name: String },
}

/// A specialized `Result` type for patch operations.
pub type PatchResult<T> = Result<T, PatchError>;
