//! The two-phase run: train on corrupted ground truth, then optionally
//! denoise the upstream test predictions.

use std::path::PathBuf;

use burn::{module::AutodiffModule, tensor::backend::AutodiffBackend};
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    config::TrainingConfig,
    dataset::load_patches,
    error::DaeResult,
    inference::{run_on_test_set, visualise_validation, TestPredictions},
    run::RunContext,
    training::{train, TrainingData},
};

/// What a completed run produced.
#[derive(Debug)]
pub struct PipelineReport {
    pub steps: u64,
    pub checkpoint: PathBuf,
    pub train_log_dir: PathBuf,
    pub validation_log_dir: PathBuf,
    pub evaluation_plot: Option<PathBuf>,
    pub test_predictions: Option<TestPredictions>,
}

/// Runs training and the optional visualisation and test phases.
///
/// # Errors
///
/// Any failure aborts the run; there is no retry and no partial recovery.
pub fn run<B: AutodiffBackend>(
    config: &TrainingConfig,
    run: &RunContext,
    device: &B::Device,
) -> DaeResult<PipelineReport> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    tracing::info!(dir = %config.groundtruth_dir.display(), "loading ground truth data");
    let ground_truth = load_patches(
        &config.groundtruth_dir,
        config.train_size,
        config.model.patch_size,
    )?;
    if ground_truth.width != config.train_image_size
        || ground_truth.height != config.train_image_size
    {
        tracing::warn!(
            width = ground_truth.width,
            height = ground_truth.height,
            expected = config.train_image_size,
            "ground truth images differ from the configured size"
        );
    }
    let image_size = (ground_truth.width, ground_truth.height);
    let patches_per_image = ground_truth.patches_per_image();

    let data = TrainingData::prepare(ground_truth.patches, patches_per_image, config, &mut rng)?;
    let trained = train::<B, _>(config, run, &data, &mut rng, device)?;
    let model = trained.model.valid();

    let evaluation_plot = if config.visualise_training {
        tracing::info!("visualising encoder results and true images from the validation set");
        Some(visualise_validation(
            &model, &data, image_size, config, run, device,
        )?)
    } else {
        None
    };

    tracing::debug!("releasing training data");
    drop(data);

    let test_predictions = if config.run_on_test_set {
        tracing::info!("running the denoising autoencoder on the test predictions");
        Some(run_on_test_set(&model, config, run, device)?)
    } else {
        None
    };

    Ok(PipelineReport {
        steps: trained.steps,
        checkpoint: trained.checkpoint,
        train_log_dir: trained.train_log_dir,
        validation_log_dir: trained.validation_log_dir,
        evaluation_plot,
        test_predictions,
    })
}
