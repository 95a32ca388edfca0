//! Tensor initializers
use serde::{Deserialize, Serialize};
use tch::{
    nn::{Init, Path},
    Tensor,
};

/// Parameter tensor initializers.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum Initializer {
    Zeros,
    Constant(f64),
    /// `Unif(±√(6 / (fan_in + fan_out)))`, a.k.a. Glorot or Xavier initialization.
    GlorotUniform,
    /// `Unif(±√(1 / fan_in))`, the PyTorch default for linear layers.
    FanInUniform,
}

impl Default for Initializer {
    fn default() -> Self {
        Self::GlorotUniform
    }
}

impl Initializer {
    /// Create a new variable in `vs` initialized by this initializer.
    #[allow(clippy::cast_precision_loss)]
    pub fn add_tensor(
        self,
        vs: &Path,
        name: &str,
        shape: &[i64],
        fan_in: usize,
        fan_out: usize,
    ) -> Tensor {
        let init = match self {
            Self::Zeros => Init::Const(0.0),
            Self::Constant(value) => Init::Const(value),
            Self::GlorotUniform => symmetric_uniform((6.0 / (fan_in + fan_out) as f64).sqrt()),
            Self::FanInUniform => symmetric_uniform((1.0 / fan_in as f64).sqrt()),
        };
        vs.var(name, shape, init)
    }
}

fn symmetric_uniform(bound: f64) -> Init {
    Init::Uniform {
        lo: -bound,
        up: bound,
    }
}
