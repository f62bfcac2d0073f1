//! Denoising of upstream segmentation outputs and of the validation set.

use std::path::PathBuf;

use burn::prelude::*;
use patch_ops::{reassemble, PatchTensor};

use crate::{
    config::TrainingConfig,
    dataset::{load_patches, ImagePatches},
    error::{DaeError, DaeResult},
    model::DenoisingAutoencoder,
    run::RunContext,
    training::{batch_tensor, TrainingData},
    visualize::{save_gray, ComparisonGrid},
};

/// Runs `patches` through the model in chunks of `batch_size`.
pub fn predict<B: Backend>(
    model: &DenoisingAutoencoder<B>,
    patches: &PatchTensor,
    batch_size: usize,
    device: &B::Device,
) -> DaeResult<PatchTensor> {
    let indices: Vec<usize> = (0..patches.len()).collect();
    let mut values = Vec::with_capacity(patches.as_slice().len());
    for chunk in indices.chunks(batch_size.max(1)) {
        let output = model.forward_flat(batch_tensor::<B>(patches, chunk, device)?);
        values.extend(tensor_values(output)?);
    }
    Ok(PatchTensor::new(values, patches.len(), patches.side())?)
}

/// Copies a tensor back to the host as `f32` values.
pub fn tensor_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> DaeResult<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| DaeError::TensorData {
            reason: format!("{e:?}"),
        })
}

/// Denoised test images written to disk.
#[derive(Debug, Clone)]
pub struct TestPredictions {
    /// Reconstructed images as row-major `[0, 1]` values, one per test image.
    pub images: Vec<Vec<f32>>,
    pub width: usize,
    pub height: usize,
    pub files: Vec<PathBuf>,
    pub plot: Option<PathBuf>,
}

/// Denoises the upstream predictions in `prediction_test_dir`.
///
/// The patches of each test image are fed through the model as one batch,
/// reassembled, and saved as `cnn_ae_test_<i>.png` in `output_dir`.
///
/// # Errors
///
/// Returns [`DaeError::MissingPredictions`] if the prediction directory does
/// not exist, and propagates loading and writing failures.
pub fn run_on_test_set<B: Backend>(
    model: &DenoisingAutoencoder<B>,
    config: &TrainingConfig,
    run: &RunContext,
    device: &B::Device,
) -> DaeResult<TestPredictions> {
    let prediction_dir = &config.prediction_test_dir;
    if !prediction_dir.is_dir() {
        return Err(DaeError::MissingPredictions {
            path: prediction_dir.clone(),
        });
    }

    tracing::info!(dir = %prediction_dir.display(), "loading test set");
    let test = load_patches(prediction_dir, config.test_size, config.model.patch_size)?;
    if test.width != config.test_image_size || test.height != config.test_image_size {
        tracing::warn!(
            width = test.width,
            height = test.height,
            expected = config.test_image_size,
            "test images differ from the configured size"
        );
    }

    let mut images = Vec::with_capacity(test.images);
    for i in 0..test.images {
        let patches = test.patches.slice(test.image_range(i))?;
        let prediction = predict(model, &patches, patches.len(), device)?;
        images.push(reassemble(&prediction, test.width, test.height)?);
    }

    let mut files = Vec::with_capacity(images.len());
    for (i, image) in images.iter().enumerate() {
        let path = config.output_dir.join(format!("cnn_ae_test_{}.png", i + 1));
        tracing::debug!(image = i + 1, path = %path.display(), "saving test image");
        save_gray(image, test.width, test.height, &path)?;
        files.push(path);
    }
    tracing::info!(
        images = files.len(),
        dir = %config.output_dir.display(),
        "finished saving cnn autoencoder outputs"
    );

    let plot = if config.examples_to_show > 0 {
        let path = config.plot_directory.join(run.plot_name("prediction"));
        prediction_plot(&test, &images, config.examples_to_show)?.save(&path)?;
        Some(path)
    } else {
        None
    };

    Ok(TestPredictions {
        width: test.width,
        height: test.height,
        images,
        files,
        plot,
    })
}

fn prediction_plot(
    test: &ImagePatches,
    predictions: &[Vec<f32>],
    examples: usize,
) -> DaeResult<ComparisonGrid> {
    let examples = examples.min(predictions.len());
    let inputs = (0..examples)
        .map(|i| -> DaeResult<Vec<f32>> {
            let patches = test.patches.slice(test.image_range(i))?;
            Ok(reassemble(&patches, test.width, test.height)?)
        })
        .collect::<DaeResult<Vec<_>>>()?;

    let mut grid = ComparisonGrid::new(test.width, test.height);
    grid.push_row(inputs.iter().map(Vec::as_slice))?;
    grid.push_row(predictions[..examples].iter().map(Vec::as_slice))?;
    Ok(grid)
}

/// Plots corrupted, clean and reconstructed versions of the first
/// validation images and saves the figure to the plot directory.
pub fn visualise_validation<B: Backend>(
    model: &DenoisingAutoencoder<B>,
    data: &TrainingData,
    image_size: (usize, usize),
    config: &TrainingConfig,
    run: &RunContext,
    device: &B::Device,
) -> DaeResult<PathBuf> {
    let (width, height) = image_size;
    let side = config.model.patch_size;
    let per_image = (width / side) * (height / side);
    let examples = config
        .examples_to_show
        .min(data.validation_inputs.len() / per_image.max(1));

    let shown = data.validation_inputs.slice(0..examples * per_image)?;
    let reconstructed = predict(model, &shown, config.batch_size, device)?;
    let targets = data.validation_targets.slice(0..examples * per_image)?;

    let mut grid = ComparisonGrid::new(width, height);
    for source in [&shown, &targets, &reconstructed] {
        let row = (0..examples)
            .map(|i| -> DaeResult<Vec<f32>> {
                let patches = source.slice(i * per_image..(i + 1) * per_image)?;
                Ok(reassemble(&patches, width, height)?)
            })
            .collect::<DaeResult<Vec<_>>>()?;
        grid.push_row(row.iter().map(Vec::as_slice))?;
    }

    let path = config.plot_directory.join(run.plot_name("eval"));
    grid.save(&path)?;
    Ok(path)
}
