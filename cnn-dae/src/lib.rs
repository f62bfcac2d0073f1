//! Convolutional denoising autoencoder for road segmentation masks.
//!
//! Ground-truth masks are cut into patches, corrupted with salt-and-pepper
//! noise, and used to train a small strided-convolution autoencoder that maps
//! noisy patches back to clean ones. The trained model is then applied to the
//! raw outputs of an upstream segmentation network.

pub mod backend;
pub mod config;
pub mod dataset;
pub mod error;
pub mod inference;
pub mod model;
pub mod pipeline;
pub mod run;
pub mod runtime;
pub mod summary;
pub mod training;
pub mod visualize;

pub use config::TrainingConfig;
pub use error::{DaeError, DaeResult};
pub use model::{DenoiseOutput, DenoisingAutoencoder, DenoisingAutoencoderConfig};
pub use pipeline::PipelineReport;
pub use run::RunContext;
#[doc(inline)]
pub use patch_ops;
