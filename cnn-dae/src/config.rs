use std::{
    fs,
    path::{Path, PathBuf},
};

use burn::prelude::*;
use patch_ops::Corruption;
use serde_json::Value;

use crate::{
    error::{DaeError, DaeResult},
    model::DenoisingAutoencoderConfig,
};

/// Configuration of a denoising autoencoder run.
///
/// Covers the model, the corruption applied to its inputs, the training
/// schedule, the dataset layout and where run artifacts are written. Loaded
/// from JSON with [`TrainingConfig::from_file`]; every field has a default.
#[derive(Config, Debug)]
pub struct TrainingConfig {
    /// Model architecture.
    #[config(default = "DenoisingAutoencoderConfig::new()")]
    pub model: DenoisingAutoencoderConfig,

    /// Corruption probability `nu` applied to every input pixel.
    #[config(default = 0.05)]
    pub corruption: f64,

    #[config(default = "Corruption::SaltAndPepper")]
    pub corruption_kind: Corruption,

    #[config(default = 20)]
    pub num_epochs: usize,

    #[config(default = 128)]
    pub batch_size: usize,

    #[config(default = 0.005)]
    pub learning_rate: f64,

    /// Number of ground-truth images to load, validation images included.
    #[config(default = 100)]
    pub train_size: usize,

    /// Number of leading ground-truth images held out for validation.
    #[config(default = 10)]
    pub val_size: usize,

    /// Side length of the ground-truth images.
    #[config(default = 400)]
    pub train_image_size: usize,

    #[config(default = 50)]
    pub test_size: usize,

    /// Side length of the upstream prediction images.
    #[config(default = 608)]
    pub test_image_size: usize,

    /// Number of images shown in the comparison plots.
    #[config(default = 4)]
    pub examples_to_show: usize,

    #[config(default = true)]
    pub visualise_training: bool,

    #[config(default = true)]
    pub run_on_test_set: bool,

    /// Random seed for corruption, permutations and weight initialisation.
    #[config(default = 123)]
    pub seed: u64,

    #[config(default = "PathBuf::from(\"logs\")")]
    pub log_directory: PathBuf,

    #[config(default = "PathBuf::from(\"../data/training/groundtruth\")")]
    pub groundtruth_dir: PathBuf,

    /// Outputs of the upstream segmentation network to be denoised.
    #[config(default = "PathBuf::from(\"../results/CNN_Output/test/high_res_raw\")")]
    pub prediction_test_dir: PathBuf,

    #[config(default = "PathBuf::from(\"../results/CNN_Autoencoder_Output/raw\")")]
    pub output_dir: PathBuf,

    #[config(default = "PathBuf::from(\".\")")]
    pub plot_directory: PathBuf,
}

impl TrainingConfig {
    /// Loads a configuration from a JSON file.
    ///
    /// The file may set any subset of fields, nested model fields included;
    /// everything it leaves out keeps its default value.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> DaeResult<Self> {
        let path = path.as_ref();
        let load_error = |reason: String| DaeError::ConfigLoad {
            path: path.to_path_buf(),
            reason,
        };

        let contents = fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let overrides: Value =
            serde_json::from_str(&contents).map_err(|e| load_error(e.to_string()))?;
        if !overrides.is_object() {
            return Err(load_error("expected a JSON object".to_string()));
        }

        let mut merged =
            serde_json::to_value(Self::new()).map_err(|e| load_error(e.to_string()))?;
        merge_json(&mut merged, overrides);
        serde_json::from_value(merged).map_err(|e| load_error(e.to_string()))
    }

    /// Checks the configuration for logically inconsistent values.
    pub fn validate(&self) -> DaeResult<()> {
        self.model.validate()?;

        let invalid = |reason: String| Err(DaeError::InvalidConfiguration { reason });
        let patch_size = self.model.patch_size;

        if !(0.0..=1.0).contains(&self.corruption) {
            return invalid(format!(
                "Corruption probability must be within [0, 1], got {}",
                self.corruption
            ));
        }
        if self.num_epochs == 0 {
            return invalid("Number of epochs must be greater than 0".to_string());
        }
        if self.batch_size == 0 {
            return invalid("Batch size must be greater than 0".to_string());
        }
        if self.learning_rate <= 0.0 {
            return invalid("Learning rate must be positive".to_string());
        }
        if self.val_size >= self.train_size {
            return invalid(format!(
                "Validation size ({}) must be smaller than train size ({})",
                self.val_size, self.train_size
            ));
        }
        for (name, size) in [
            ("train_image_size", self.train_image_size),
            ("test_image_size", self.test_image_size),
        ] {
            if size < patch_size || size % patch_size != 0 {
                return invalid(format!(
                    "{name} ({size}) must be a positive multiple of patch size ({patch_size})"
                ));
            }
        }
        if self.visualise_training && self.examples_to_show > self.val_size {
            return invalid(format!(
                "examples_to_show ({}) exceeds the number of validation images ({})",
                self.examples_to_show, self.val_size
            ));
        }
        if self.run_on_test_set && self.examples_to_show > self.test_size {
            return invalid(format!(
                "examples_to_show ({}) exceeds the number of test images ({})",
                self.examples_to_show, self.test_size
            ));
        }
        Ok(())
    }
}

/// Recursively overlays `overrides` onto `base`; objects merge key by key,
/// any other value replaces the base value.
fn merge_json(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, value) => *base = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration_is_valid() {
        assert!(TrainingConfig::new().validate().is_ok());
    }

    #[test]
    fn test_invalid_corruption_probability() {
        let config = TrainingConfig::new().with_corruption(1.2);
        match config.validate() {
            Err(DaeError::InvalidConfiguration { reason }) => {
                assert!(reason.contains("Corruption probability"));
            }
            other => panic!("Expected InvalidConfiguration error, got {other:?}"),
        }
    }

    #[test]
    fn test_validation_split_must_leave_training_images() {
        let config = TrainingConfig::new().with_train_size(10).with_val_size(10);
        match config.validate() {
            Err(DaeError::InvalidConfiguration { reason }) => {
                assert!(reason.contains("Validation size"));
            }
            other => panic!("Expected InvalidConfiguration error, got {other:?}"),
        }
    }

    #[test]
    fn test_image_size_must_be_multiple_of_patch_size() {
        let config = TrainingConfig::new().with_test_image_size(600);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_examples_to_show_bounded_by_validation_images() {
        let config = TrainingConfig::new()
            .with_val_size(2)
            .with_examples_to_show(3);
        assert!(config.validate().is_err());
        assert!(config.with_visualise_training(false).with_run_on_test_set(false).validate().is_ok());
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = TrainingConfig::new().with_num_epochs(3).with_seed(7);
        config.save(&path).unwrap();

        let loaded = TrainingConfig::from_file(&path).unwrap();
        assert_eq!(loaded.num_epochs, 3);
        assert_eq!(loaded.seed, 7);
        assert_eq!(loaded.corruption_kind, Corruption::SaltAndPepper);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"num_epochs": 3, "model": {"patch_size": 8}}"#).unwrap();

        let loaded = TrainingConfig::from_file(&path).unwrap();
        let defaults = TrainingConfig::new();
        assert_eq!(loaded.num_epochs, 3);
        assert_eq!(loaded.model.patch_size, 8);
        assert_eq!(loaded.model.n_filters, defaults.model.n_filters);
        assert_eq!(loaded.batch_size, defaults.batch_size);
        assert_eq!(loaded.groundtruth_dir, defaults.groundtruth_dir);
    }

    #[test]
    fn test_non_object_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            TrainingConfig::from_file(&path),
            Err(DaeError::ConfigLoad { .. })
        ));
    }

    #[test]
    fn test_unknown_corruption_kind_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"corruption_kind": "gaussian"}"#).unwrap();
        assert!(matches!(
            TrainingConfig::from_file(&path),
            Err(DaeError::ConfigLoad { .. })
        ));
    }
}
