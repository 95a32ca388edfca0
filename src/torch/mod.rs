//! Torch function approximators
mod ddpg;
pub mod initializers;
pub mod modules;
pub mod optimizers;
mod parameters;

pub use ddpg::{BuildEvaluatorError, DdpgConfig, DdpgEvaluator, DdpgPolicy};

use ndarray::{ArrayBase, Data, Ix2};
use serde::{Deserialize, Serialize};
use tch::{Device, Tensor};

/// Serializable choice of torch device.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceConfig {
    Cpu,
    Cuda(usize),
    /// The first CUDA device if one is available, otherwise the CPU.
    CudaIfAvailable,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::Cpu
    }
}

impl DeviceConfig {
    pub fn device(self) -> Device {
        match self {
            Self::Cpu => Device::Cpu,
            Self::Cuda(index) => Device::Cuda(index),
            Self::CudaIfAvailable => Device::cuda_if_available(),
        }
    }
}

/// Copy a 2D array into a float tensor on `device`.
#[allow(clippy::cast_possible_wrap)]
pub fn tensor_from_array2<S: Data<Elem = f32>>(array: &ArrayBase<S, Ix2>, device: Device) -> Tensor {
    let (rows, cols) = array.dim();
    // Iteration is in logical order regardless of memory layout
    let data: Vec<f32> = array.iter().copied().collect();
    Tensor::of_slice(&data)
        .reshape(&[rows as i64, cols as i64])
        .to_device(device)
}
