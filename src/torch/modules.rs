//! Neural network modules
use super::initializers::Initializer;
use serde::{Deserialize, Serialize};
use std::iter;
use tch::{nn::Path, Tensor};

/// Activation functions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activation {
    Identity,
    Relu,
    Tanh,
}

impl Default for Activation {
    fn default() -> Self {
        Self::Identity
    }
}

impl Activation {
    pub fn forward(self, input: &Tensor) -> Tensor {
        match self {
            Self::Identity => input.shallow_clone(),
            Self::Relu => input.relu(),
            Self::Tanh => input.tanh(),
        }
    }
}

/// Configuration for the [`Linear`] module.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearConfig {
    pub kernel_init: Initializer,
    /// Initializer for the bias vector. No bias if `None`.
    pub bias_init: Option<Initializer>,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            kernel_init: Initializer::GlorotUniform,
            bias_init: Some(Initializer::Zeros),
        }
    }
}

/// Linear fully-connected layer.
#[derive(Debug)]
pub struct Linear {
    kernel: Tensor,
    bias: Option<Tensor>,
}

impl Linear {
    #[allow(clippy::cast_possible_wrap)]
    pub fn new(vs: &Path, in_dim: usize, out_dim: usize, config: &LinearConfig) -> Self {
        Self {
            kernel: config.kernel_init.add_tensor(
                vs,
                "kernel",
                &[out_dim as i64, in_dim as i64],
                in_dim,
                out_dim,
            ),
            bias: config
                .bias_init
                .map(|init| init.add_tensor(vs, "bias", &[out_dim as i64], in_dim, out_dim)),
        }
    }

    /// A copy sharing the same parameter storage.
    pub fn shallow_clone(&self) -> Self {
        Self {
            kernel: self.kernel.shallow_clone(),
            bias: self.bias.as_ref().map(Tensor::shallow_clone),
        }
    }

    #[inline]
    pub fn forward(&self, input: &Tensor) -> Tensor {
        input.linear(&self.kernel, self.bias.as_ref())
    }
}

/// Configuration for the [`Mlp`] module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpConfig {
    /// Sizes of the hidden layers
    pub hidden_sizes: Vec<usize>,
    /// Activation function between hidden layers.
    pub activation: Activation,
    /// Activation function on the output.
    pub output_activation: Activation,
    pub linear_config: LinearConfig,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_sizes: vec![64],
            activation: Activation::Relu,
            output_activation: Activation::Identity,
            linear_config: LinearConfig::default(),
        }
    }
}

/// Multi-layer perceptron
#[derive(Debug)]
pub struct Mlp {
    layers: Vec<Linear>,
    activation: Activation,
    output_activation: Activation,
}

impl Mlp {
    pub fn new(vs: &Path, in_dim: usize, out_dim: usize, config: &MlpConfig) -> Self {
        let in_dims = iter::once(&in_dim).chain(&config.hidden_sizes);
        let out_dims = config.hidden_sizes.iter().chain(iter::once(&out_dim));
        let layers = in_dims
            .zip(out_dims)
            .enumerate()
            .map(|(i, (&in_, &out_))| {
                Linear::new(
                    &(vs / format!("layer_{}", i)),
                    in_,
                    out_,
                    &config.linear_config,
                )
            })
            .collect();
        Self {
            layers,
            activation: config.activation,
            output_activation: config.output_activation,
        }
    }

    pub fn shallow_clone(&self) -> Self {
        Self {
            layers: self.layers.iter().map(Linear::shallow_clone).collect(),
            activation: self.activation,
            output_activation: self.output_activation,
        }
    }

    pub fn forward(&self, input: &Tensor) -> Tensor {
        let mut hidden = input.shallow_clone();
        for (i, layer) in self.layers.iter().enumerate() {
            if i > 0 {
                hidden = self.activation.forward(&hidden);
            }
            hidden = layer.forward(&hidden);
        }
        self.output_activation.forward(&hidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tch::{nn::VarStore, Device, Kind};

    #[rstest]
    #[case(vec![])]
    #[case(vec![64])]
    #[case(vec![8, 16])]
    fn mlp_output_shape(#[case] hidden_sizes: Vec<usize>) {
        let vs = VarStore::new(Device::Cpu);
        let config = MlpConfig {
            hidden_sizes,
            ..MlpConfig::default()
        };
        let mlp = Mlp::new(&vs.root(), 3, 2, &config);
        let output = mlp.forward(&Tensor::ones(&[5, 3], (Kind::Float, Device::Cpu)));
        assert_eq!(output.size(), vec![5, 2]);
    }

    #[test]
    fn linear_without_bias_maps_zero_to_zero() {
        let vs = VarStore::new(Device::Cpu);
        let config = LinearConfig {
            bias_init: None,
            ..LinearConfig::default()
        };
        let linear = Linear::new(&vs.root(), 4, 3, &config);
        assert_eq!(vs.variables().len(), 1);
        let output = linear.forward(&Tensor::zeros(&[2, 4], (Kind::Float, Device::Cpu)));
        assert_eq!(f64::from(output.abs().sum(Kind::Float)), 0.0);
    }

    #[test]
    fn shallow_clone_shares_parameters() {
        let vs = VarStore::new(Device::Cpu);
        let mlp = Mlp::new(&vs.root(), 2, 1, &MlpConfig::default());
        let clone = mlp.shallow_clone();
        tch::no_grad(|| {
            for (_, mut var) in vs.variables() {
                var.copy_(&var.zeros_like());
            }
        });
        let output = clone.forward(&Tensor::ones(&[1, 2], (Kind::Float, Device::Cpu)));
        assert_eq!(f64::from(output.sum(Kind::Float)), 0.0);
    }
}
