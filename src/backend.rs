//! Backend selection
//!
//! The compute backend is chosen once at compile time via cargo features and
//! threaded explicitly through model and tensor placement calls. CUDA wins
//! over WGPU, and the NdArray CPU backend is the fallback.

use burn::backend::Autodiff;

#[cfg(feature = "cuda")]
pub type DefaultBackend = burn::backend::Cuda;

#[cfg(all(feature = "wgpu", not(feature = "cuda")))]
pub type DefaultBackend = burn::backend::Wgpu;

#[cfg(not(any(feature = "cuda", feature = "wgpu")))]
pub type DefaultBackend = burn::backend::NdArray;

/// The default autodiff backend for training
pub type TrainingBackend = Autodiff<DefaultBackend>;

/// Get the default device for the selected backend
pub fn default_device() -> <DefaultBackend as burn::tensor::backend::Backend>::Device {
    <DefaultBackend as burn::tensor::backend::Backend>::Device::default()
}

/// Get a human-readable name for the current backend
pub fn backend_name() -> &'static str {
    if cfg!(feature = "cuda") {
        "CUDA (GPU)"
    } else if cfg!(feature = "wgpu") {
        "WGPU (GPU)"
    } else {
        "NdArray (CPU)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_name_is_stable() {
        // The name must match whichever backend feature set was compiled in.
        let name = backend_name();
        assert!(!name.is_empty());
    }

    #[test]
    fn test_default_device() {
        // Must not panic; the device is requested exactly once at startup.
        let _device = default_device();
    }
}
