//! Pure data transforms for training convolutional denoising autoencoders
//!
//! This crate holds the parts of the training pipeline that do not touch a
//! deep-learning framework: square patch tensors, salt-and-pepper corruption
//! and the epoch batching strategy. Everything here is deterministic given a
//! seeded RNG.

mod batching;
mod corruption;
mod error;
mod patches;

pub use batching::{BatchSchedule, Batches, GlobalStep};
pub use corruption::{corrupt, corruption_mask, salt_and_pepper, Corruption};
pub use error::{PatchError, PatchResult};
pub use patches::{extract_patches, reassemble, PatchTensor};
