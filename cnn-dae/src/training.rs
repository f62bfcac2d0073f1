//! Training loop for the denoising autoencoder.
//!
//! Every epoch draws a fresh permutation of the training patches and runs
//! `floor(n / batch_size)` Adam steps over wrapped windows of it. The loss of
//! every step is logged at the global step, the validation loss once per
//! epoch, and the final weights are written to a tagged, timestamped
//! checkpoint.

use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use patch_ops::{corrupt, BatchSchedule, GlobalStep, PatchTensor};
use rand::Rng;

use crate::{
    config::TrainingConfig,
    error::{DaeError, DaeResult},
    model::DenoisingAutoencoder,
    run::RunContext,
    summary::SummaryWriter,
};

/// Corrupted inputs and clean targets for training and validation.
#[derive(Debug, Clone)]
pub struct TrainingData {
    pub inputs: PatchTensor,
    pub targets: PatchTensor,
    pub validation_inputs: PatchTensor,
    pub validation_targets: PatchTensor,
}

impl TrainingData {
    /// Splits ground-truth patches into validation and training sets and
    /// corrupts the inputs of both.
    ///
    /// The patches of the first `val_size` images become the validation set.
    /// The uncorrupted ground truth is consumed.
    pub fn prepare<R: Rng>(
        ground_truth: PatchTensor,
        patches_per_image: usize,
        config: &TrainingConfig,
        rng: &mut R,
    ) -> DaeResult<Self> {
        let (validation_targets, targets) =
            ground_truth.split_at(config.val_size * patches_per_image)?;

        let inputs = corrupt(&targets, config.corruption, config.corruption_kind, rng)?;
        let validation_inputs = corrupt(
            &validation_targets,
            config.corruption,
            config.corruption_kind,
            rng,
        )?;

        tracing::info!(
            train = ?inputs.shape(),
            targets = ?targets.shape(),
            validation = ?validation_inputs.shape(),
            "prepared training data"
        );

        Ok(Self {
            inputs,
            targets,
            validation_inputs,
            validation_targets,
        })
    }
}

/// Result of a completed training run.
#[derive(Debug)]
pub struct TrainedModel<B: AutodiffBackend> {
    pub model: DenoisingAutoencoder<B>,
    /// Number of optimisation steps taken.
    pub steps: u64,
    /// Checkpoint file written after the last epoch.
    pub checkpoint: PathBuf,
    pub train_log_dir: PathBuf,
    pub validation_log_dir: PathBuf,
}

/// Builds a `[indices.len(), S * S]` tensor from the selected patches.
pub fn batch_tensor<B: Backend>(
    patches: &PatchTensor,
    indices: &[usize],
    device: &B::Device,
) -> DaeResult<Tensor<B, 2>> {
    let data = TensorData::new(patches.gather(indices)?, [indices.len(), patches.patch_dim()])
        .convert::<B::FloatElem>();
    Ok(Tensor::from_data(data, device))
}

/// Mean squared error of `model` over a whole patch set, evaluated in chunks
/// of `batch_size`. Returns `None` for an empty set.
pub fn evaluate<B: Backend>(
    model: &DenoisingAutoencoder<B>,
    inputs: &PatchTensor,
    targets: &PatchTensor,
    batch_size: usize,
    device: &B::Device,
) -> DaeResult<Option<f64>> {
    if inputs.is_empty() {
        return Ok(None);
    }
    let indices: Vec<usize> = (0..inputs.len()).collect();
    let mut weighted = 0.0;
    for chunk in indices.chunks(batch_size.max(1)) {
        let output = model.forward_step(
            batch_tensor::<B>(inputs, chunk, device)?,
            batch_tensor::<B>(targets, chunk, device)?,
        );
        weighted += output.loss.into_scalar().elem::<f64>() * chunk.len() as f64;
    }
    Ok(Some(weighted / inputs.len() as f64))
}

/// Trains a fresh model on `data`.
///
/// # Errors
///
/// Returns an error if the model configuration is invalid, a summary cannot
/// be written, or the final checkpoint cannot be saved.
pub fn train<B: AutodiffBackend, R: Rng>(
    config: &TrainingConfig,
    run: &RunContext,
    data: &TrainingData,
    rng: &mut R,
    device: &B::Device,
) -> DaeResult<TrainedModel<B>> {
    B::seed(config.seed);

    tracing::info!(
        n_filters = ?config.model.n_filters,
        filter_sizes = ?config.model.filter_sizes,
        learning_rate = config.learning_rate,
        "initializing CNN denoising autoencoder"
    );
    let mut model = config.model.init::<B>(device)?;
    let mut optim = AdamConfig::new().init();

    let train_log_dir = run.train_log_dir(&config.log_directory);
    let validation_log_dir = run.validation_log_dir(&config.log_directory);
    let mut train_writer = SummaryWriter::create(&train_log_dir)?;
    let mut validation_writer = SummaryWriter::create(&validation_log_dir)?;

    let schedule = BatchSchedule::new(data.inputs.len(), config.batch_size)?;
    if schedule.steps_per_epoch() == 0 {
        tracing::warn!(
            samples = schedule.len(),
            batch_size = schedule.batch_size(),
            "batch size exceeds the training set, no optimisation steps will run"
        );
    }
    let mut global_step = GlobalStep::new();
    let start = Instant::now();

    tracing::info!(
        samples = schedule.len(),
        steps_per_epoch = schedule.steps_per_epoch(),
        epochs = config.num_epochs,
        "starting training"
    );
    for epoch in 0..config.num_epochs {
        tracing::info!(
            epoch,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "training epoch"
        );

        let permutation = schedule.permutation(rng);
        let mut epoch_loss = 0.0;
        for indices in schedule.batches(&permutation) {
            let inputs = batch_tensor::<B>(&data.inputs, indices, device)?;
            let targets = batch_tensor::<B>(&data.targets, indices, device)?;

            let output = model.forward_step(inputs, targets);
            let loss = output.loss.clone().into_scalar().elem::<f64>();
            let grads = GradientsParams::from_grads(output.loss.backward(), &model);
            model = optim.step(config.learning_rate, model, grads);

            train_writer.add_scalar("loss", loss, global_step.advance())?;
            epoch_loss += loss;
        }

        let validation_loss = evaluate(
            &model.valid(),
            &data.validation_inputs,
            &data.validation_targets,
            config.batch_size,
            device,
        )?;
        // aligned with the last `loss` event of the epoch
        let last_step = global_step.value() - 1;
        if let Some(value) = validation_loss {
            validation_writer.add_scalar("validation_loss", value, last_step)?;
        }

        let steps = schedule.steps_per_epoch().max(1) as f64;
        tracing::info!(
            epoch,
            train_loss = epoch_loss / steps,
            validation_loss = ?validation_loss,
            "epoch finished"
        );
    }
    train_writer.flush()?;
    validation_writer.flush()?;

    let checkpoint = run.checkpoint_path(&config.log_directory, config.num_epochs);
    save_checkpoint(&model, &checkpoint)?;
    tracing::info!(
        epochs = config.num_epochs,
        checkpoint = %checkpoint.display(),
        "done with training"
    );

    Ok(TrainedModel {
        model,
        steps: global_step.value() - 1,
        checkpoint,
        train_log_dir,
        validation_log_dir,
    })
}

/// Writes the model weights to `path`, which should carry the `.mpk`
/// extension; any other extension is replaced by the recorder.
pub fn save_checkpoint<B: Backend>(model: &DenoisingAutoencoder<B>, path: &Path) -> DaeResult<()> {
    model
        .clone()
        .save_file(path, &NamedMpkFileRecorder::<FullPrecisionSettings>::new())
        .map_err(|e| DaeError::Checkpoint {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Restores a model saved with [`save_checkpoint`].
pub fn load_checkpoint<B: Backend>(
    config: &TrainingConfig,
    path: &Path,
    device: &B::Device,
) -> DaeResult<DenoisingAutoencoder<B>> {
    config
        .model
        .init::<B>(device)?
        .load_file(
            path,
            &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
            device,
        )
        .map_err(|e| DaeError::Checkpoint {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::DenoisingAutoencoderConfig, summary::read_events};
    use burn::backend::{ndarray::NdArray, Autodiff};
    use rand::{rngs::StdRng, SeedableRng};

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<TestBackend>;

    fn tiny_config(log_directory: &Path) -> TrainingConfig {
        TrainingConfig::new()
            .with_model(
                DenoisingAutoencoderConfig::new()
                    .with_patch_size(4)
                    .with_n_filters(vec![1, 2])
                    .with_filter_sizes(vec![3]),
            )
            .with_num_epochs(2)
            .with_batch_size(3)
            .with_train_size(3)
            .with_val_size(1)
            .with_log_directory(log_directory.to_path_buf())
    }

    fn striped_patches(count: usize) -> PatchTensor {
        let data = (0..count * 16)
            .map(|i| if (i / 4) % 2 == 0 { 1.0 } else { 0.0 })
            .collect();
        PatchTensor::new(data, count, 4).unwrap()
    }

    #[test]
    fn test_prepare_splits_by_image() {
        let config = TrainingConfig::new().with_val_size(2).with_corruption(0.0);
        let mut rng = StdRng::seed_from_u64(0);
        let data = TrainingData::prepare(striped_patches(10), 3, &config, &mut rng).unwrap();

        assert_eq!(data.validation_targets.len(), 6);
        assert_eq!(data.targets.len(), 4);
        assert_eq!(data.inputs, data.targets);
        assert_eq!(data.validation_inputs.shape(), data.validation_targets.shape());
    }

    #[test]
    fn test_batch_tensor_shape() {
        let device = Default::default();
        let patches = striped_patches(5);
        let tensor = batch_tensor::<TestBackend>(&patches, &[4, 0], &device).unwrap();
        assert_eq!(tensor.dims(), [2, 16]);
    }

    #[test]
    fn test_train_logs_every_step_and_saves_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let config = tiny_config(dir.path());
        let run = RunContext::new(Some("test".to_string()));
        let mut rng = StdRng::seed_from_u64(config.seed);
        let data = TrainingData::prepare(striped_patches(11), 3, &config, &mut rng).unwrap();
        let device = Default::default();

        let trained =
            train::<TestAutodiffBackend, _>(&config, &run, &data, &mut rng, &device).unwrap();

        // 8 training patches, batch size 3: two steps per epoch
        assert_eq!(trained.steps, 4);
        let events = read_events(&trained.train_log_dir).unwrap();
        let steps: Vec<u64> = events.iter().map(|e| e.step).collect();
        assert_eq!(steps, vec![1, 2, 3, 4]);

        let validation = read_events(&trained.validation_log_dir).unwrap();
        let validation_steps: Vec<u64> = validation.iter().map(|e| e.step).collect();
        assert_eq!(validation_steps, vec![2, 4]);
        assert!(validation.iter().all(|e| e.tag == "validation_loss"));

        assert!(trained.checkpoint.exists());
        let restored =
            load_checkpoint::<TestBackend>(&config, &trained.checkpoint, &device).unwrap();
        assert_eq!(restored.patch_size(), 4);
    }

    #[test]
    fn test_evaluate_empty_set() {
        let device = Default::default();
        let model = DenoisingAutoencoderConfig::new()
            .with_patch_size(4)
            .with_n_filters(vec![1, 2])
            .with_filter_sizes(vec![3])
            .init::<TestBackend>(&device)
            .unwrap();
        let empty = PatchTensor::new(Vec::new(), 0, 4).unwrap();
        assert_eq!(evaluate(&model, &empty, &empty, 4, &device).unwrap(), None);
    }
}
