//! Backend selection for the demos, driven by cargo features.
//!
//! `cuda` wins over `wgpu`, which wins over the default `ndarray`.

use burn::backend::Autodiff;
use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "cuda")] {
        use burn::backend::cuda::{Cuda, CudaDevice};

        pub type SelectedBackend = Cuda;
        pub type SelectedDevice = CudaDevice;

        /// Human-readable backend name for logs.
        pub const BACKEND_NAME: &str = "CUDA (NVIDIA GPU)";
    } else if #[cfg(feature = "wgpu")] {
        use burn::backend::wgpu::{Wgpu, WgpuDevice};

        pub type SelectedBackend = Wgpu;
        pub type SelectedDevice = WgpuDevice;

        /// Human-readable backend name for logs.
        pub const BACKEND_NAME: &str = "WGPU (GPU)";
    } else {
        use burn::backend::ndarray::{NdArray, NdArrayDevice};

        pub type SelectedBackend = NdArray;
        pub type SelectedDevice = NdArrayDevice;

        /// Human-readable backend name for logs.
        pub const BACKEND_NAME: &str = "NdArray (CPU)";
    }
}

/// Backend used when gradients are needed.
pub type SelectedAutodiffBackend = Autodiff<SelectedBackend>;

/// Default device of the selected backend.
pub fn create_device() -> SelectedDevice {
    SelectedDevice::default()
}
