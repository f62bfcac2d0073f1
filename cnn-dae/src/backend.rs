//! Compute backend for the denoising autoencoder.
//!
//! One backend is compiled in, picked by cargo feature: `cuda` wins over
//! `wgpu`, and the CPU `ndarray` backend is the fallback. The CPU backend runs
//! its kernels on the global rayon pool sized by `--num_cores`.

use burn::backend::Autodiff;
use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "cuda")] {
        use burn::backend::cuda::{Cuda, CudaDevice};

        pub type SelectedBackend = Cuda;
        pub type SelectedDevice = CudaDevice;

        /// First CUDA device.
        pub fn create_device() -> SelectedDevice {
            CudaDevice::default()
        }

        /// Label logged at the start of a run.
        pub const fn get_backend_name() -> &'static str {
            "CUDA (NVIDIA GPU)"
        }
    } else if #[cfg(feature = "wgpu")] {
        use burn::backend::wgpu::{Wgpu, WgpuDevice};

        pub type SelectedBackend = Wgpu;
        pub type SelectedDevice = WgpuDevice;

        /// Default adapter chosen by wgpu.
        pub fn create_device() -> SelectedDevice {
            WgpuDevice::default()
        }

        /// Label logged at the start of a run.
        pub const fn get_backend_name() -> &'static str {
            "WGPU (GPU)"
        }
    } else {
        use burn::backend::ndarray::{NdArray, NdArrayDevice};

        pub type SelectedBackend = NdArray;
        pub type SelectedDevice = NdArrayDevice;

        /// The CPU device.
        pub fn create_device() -> SelectedDevice {
            NdArrayDevice::default()
        }

        /// Label logged at the start of a run.
        pub const fn get_backend_name() -> &'static str {
            "NdArray (CPU)"
        }
    }
}

/// Backend the autoencoder is trained on; inference runs on its inner
/// backend after `AutodiffModule::valid`.
pub type TrainBackend = Autodiff<SelectedBackend>;

#[cfg(all(test, not(any(feature = "cuda", feature = "wgpu"))))]
mod tests {
    use super::*;
    use burn::tensor::Tensor;

    #[test]
    fn test_default_features_select_cpu() {
        assert_eq!(get_backend_name(), "NdArray (CPU)");
        let tensor = Tensor::<TrainBackend, 2>::ones([2, 3], &create_device());
        assert_eq!(tensor.dims(), [2, 3]);
    }
}
