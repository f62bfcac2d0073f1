//! # Convolutional Denoising Autoencoder
//!
//! Flattened `S x S` patches are reshaped to `[B, 1, S, S]`, encoded by a
//! stack of stride-2 convolutions and decoded by the mirrored stack of
//! stride-2 transposed convolutions back to the input resolution.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        loss::{MseLoss, Reduction},
        PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::{leaky_relu, sigmoid},
};

use crate::error::{DaeError, DaeResult};

/// Configuration for the [`DenoisingAutoencoder`] module.
#[derive(Config, Debug)]
pub struct DenoisingAutoencoderConfig {
    /// Side length of the square input patches.
    #[config(default = 16)]
    pub patch_size: usize,
    /// Channel counts of the encoder, starting with the single input channel.
    #[config(default = "vec![1, 16, 32, 64]")]
    pub n_filters: Vec<usize>,
    /// Kernel size of each encoder layer; extra entries are ignored.
    #[config(default = "vec![7, 5, 3, 3]")]
    pub filter_sizes: Vec<usize>,
    /// Slope of the leaky ReLU for negative inputs.
    #[config(default = 0.2)]
    pub negative_slope: f64,
}

impl DenoisingAutoencoderConfig {
    /// Number of encoder (and decoder) layers.
    pub fn num_layers(&self) -> usize {
        self.n_filters.len().saturating_sub(1)
    }

    /// Length of one flattened input patch.
    pub const fn input_dim(&self) -> usize {
        self.patch_size * self.patch_size
    }

    pub fn validate(&self) -> DaeResult<()> {
        let invalid = |reason: String| Err(DaeError::InvalidConfiguration { reason });
        let layers = self.num_layers();

        if layers == 0 {
            return invalid("At least two entries are required in n_filters".to_string());
        }
        if self.n_filters[0] != 1 {
            return invalid(format!(
                "The first entry of n_filters must be 1 (single-channel input), got {}",
                self.n_filters[0]
            ));
        }
        if self.n_filters.contains(&0) {
            return invalid("Channel counts in n_filters must be positive".to_string());
        }
        if self.filter_sizes.len() < layers {
            return invalid(format!(
                "Expected at least {layers} filter sizes, got {}",
                self.filter_sizes.len()
            ));
        }
        if let Some(size) = self.filter_sizes[..layers].iter().find(|k| *k % 2 == 0) {
            return invalid(format!("Filter sizes must be odd, got {size}"));
        }
        let factor = 1usize << layers;
        if self.patch_size == 0 || self.patch_size % factor != 0 {
            return invalid(format!(
                "Patch size ({}) must be a positive multiple of {factor} for {layers} layers",
                self.patch_size
            ));
        }
        Ok(())
    }

    /// Initializes a new `DenoisingAutoencoder` module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> DaeResult<DenoisingAutoencoder<B>> {
        self.validate()?;
        let layers = self.num_layers();

        let encoder = (0..layers)
            .map(|i| {
                let k = self.filter_sizes[i];
                let p = (k - 1) / 2;
                Conv2dConfig::new([self.n_filters[i], self.n_filters[i + 1]], [k, k])
                    .with_stride([2, 2])
                    .with_padding(PaddingConfig2d::Explicit(p, p))
                    .init(device)
            })
            .collect();

        let decoder = (0..layers)
            .rev()
            .map(|i| {
                let k = self.filter_sizes[i];
                let p = (k - 1) / 2;
                ConvTranspose2dConfig::new([self.n_filters[i + 1], self.n_filters[i]], [k, k])
                    .with_stride([2, 2])
                    .with_padding([p, p])
                    .with_padding_out([1, 1])
                    .init(device)
            })
            .collect();

        Ok(DenoisingAutoencoder {
            encoder,
            decoder,
            patch_size: self.patch_size,
            negative_slope: self.negative_slope,
        })
    }
}

/// Output of one denoising step.
#[derive(Debug, Clone)]
pub struct DenoiseOutput<B: Backend> {
    /// Mean squared reconstruction error.
    pub loss: Tensor<B, 1>,
    /// Reconstructions with shape `[B, S * S]`.
    pub output: Tensor<B, 2>,
    /// Clean targets with shape `[B, S * S]`.
    pub targets: Tensor<B, 2>,
}

/// Convolutional denoising autoencoder over single-channel patches.
#[derive(Module, Debug)]
pub struct DenoisingAutoencoder<B: Backend> {
    encoder: Vec<Conv2d<B>>,
    decoder: Vec<ConvTranspose2d<B>>,
    patch_size: usize,
    negative_slope: f64,
}

impl<B: Backend> DenoisingAutoencoder<B> {
    pub const fn patch_size(&self) -> usize {
        self.patch_size
    }

    /// Reconstructs flattened patches `[B, S * S]` as `[B, 1, S, S]`.
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 4> {
        let [batch, _] = x.dims();
        let mut x = x.reshape([batch, 1, self.patch_size, self.patch_size]);

        for conv in &self.encoder {
            x = leaky_relu(conv.forward(x), self.negative_slope);
        }

        let last = self.decoder.len().saturating_sub(1);
        for (i, deconv) in self.decoder.iter().enumerate() {
            x = deconv.forward(x);
            if i < last {
                x = leaky_relu(x, self.negative_slope);
            }
        }

        sigmoid(x)
    }

    /// Reconstructs flattened patches `[B, S * S]` as `[B, S * S]`.
    pub fn forward_flat(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch, dim] = x.dims();
        self.forward(x).reshape([batch, dim])
    }

    /// Runs the model on corrupted `inputs` and scores it against `targets`.
    pub fn forward_step(&self, inputs: Tensor<B, 2>, targets: Tensor<B, 2>) -> DenoiseOutput<B> {
        let output = self.forward_flat(inputs);
        let loss = MseLoss::new().forward(output.clone(), targets.clone(), Reduction::Mean);

        DenoiseOutput {
            loss,
            output,
            targets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_forward_restores_patch_shape() {
        let device = Default::default();
        let model = DenoisingAutoencoderConfig::new()
            .init::<TestBackend>(&device)
            .unwrap();

        let x = Tensor::<TestBackend, 2>::random([3, 256], Distribution::Uniform(0.0, 1.0), &device);
        assert_eq!(model.forward(x.clone()).dims(), [3, 1, 16, 16]);
        assert_eq!(model.forward_flat(x).dims(), [3, 256]);
    }

    #[test]
    fn test_output_is_within_unit_interval() {
        let device = Default::default();
        let model = DenoisingAutoencoderConfig::new()
            .with_patch_size(8)
            .with_n_filters(vec![1, 4, 8])
            .init::<TestBackend>(&device)
            .unwrap();

        let x = Tensor::<TestBackend, 2>::random([2, 64], Distribution::Uniform(0.0, 1.0), &device);
        let values = model.forward_flat(x).into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_forward_step_loss_is_scalar() {
        let device = Default::default();
        let model = DenoisingAutoencoderConfig::new()
            .init::<TestBackend>(&device)
            .unwrap();

        let inputs = Tensor::<TestBackend, 2>::zeros([4, 256], &device);
        let targets = Tensor::<TestBackend, 2>::ones([4, 256], &device);
        let output = model.forward_step(inputs, targets);
        assert_eq!(output.loss.dims(), [1]);
        assert_eq!(output.output.dims(), [4, 256]);
    }

    #[test]
    fn test_first_filter_must_be_single_channel() {
        let config = DenoisingAutoencoderConfig::new().with_n_filters(vec![3, 16]);
        match config.validate() {
            Err(DaeError::InvalidConfiguration { reason }) => {
                assert!(reason.contains("single-channel"));
            }
            other => panic!("Expected InvalidConfiguration error, got {other:?}"),
        }
    }

    #[test]
    fn test_even_filter_size_rejected() {
        let config = DenoisingAutoencoderConfig::new().with_filter_sizes(vec![7, 4, 3]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_patch_size_must_survive_downsampling() {
        let config = DenoisingAutoencoderConfig::new().with_patch_size(12);
        assert!(config.validate().is_err());
    }
}
