use std::path::PathBuf;

use patch_ops::PatchError;
use thiserror::Error;

/// The error type for denoising autoencoder operations.
///
/// Covers configuration problems, dataset loading, checkpointing and the
/// output files written during training and inference.
#[derive(Error, Debug)]
pub enum DaeError {
    /// Logically inconsistent configuration values.
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Why the configuration was rejected.
        reason: String,
    },

    /// The configuration file could not be read or parsed.
    #[error("Failed to load configuration from {path}: {reason}")]
    ConfigLoad { path: PathBuf, reason: String },

    /// A patch transform failed.
    #[error(transparent)]
    Patch(#[from] PatchError),

    /// An input image directory does not exist.
    #[error("Image directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// The upstream segmentation outputs required for test-time denoising
    /// are absent.
    #[error("No CNN predictions to run the denoising autoencoder on: {path}")]
    MissingPredictions { path: PathBuf },

    /// Fewer images than requested were found.
    #[error("Expected {expected} images in {path}, found {found}")]
    NotEnoughImages {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    /// Images in one directory do not share the same dimensions.
    #[error("Image {path} is {actual:?}, expected {expected:?}")]
    InconsistentImageSize {
        path: PathBuf,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// Error when opening, decoding or encoding an image fails.
    #[error("Image error at {path}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Error when walking a directory fails.
    #[error("Failed to read directory: {path}")]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// Filesystem error while writing run artifacts.
    #[error("I/O error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error when encoding a summary record fails.
    #[error("Failed to encode summary record")]
    Summary(#[from] serde_json::Error),

    /// Model output could not be read back from the device.
    #[error("Failed to read tensor data: {reason}")]
    TensorData { reason: String },

    /// Error when saving or loading model weights fails.
    #[error("Checkpoint error at {path}: {reason}")]
    Checkpoint { path: PathBuf, reason: String },

    /// Error when the compute thread pool cannot be configured.
    #[error("Failed to configure thread pool: {reason}")]
    ThreadPool { reason: String },
}

/// A specialized `Result` type for denoising autoencoder operations.
pub type DaeResult<T> = Result<T, DaeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_data_error_is_not_a_configuration_error() {
        let err = DaeError::TensorData {
            reason: "dtype mismatch".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to read tensor data: dtype mismatch");
        assert!(!matches!(err, DaeError::InvalidConfiguration { .. }));
    }
}
