//! Optimizer configuration and steps
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use tch::{nn::VarStore, COptimizer, TchError, Tensor};
use thiserror::Error;

/// Configuration for the Adam optimizer.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdamConfig {
    /// Learning rate
    pub learning_rate: f64,
    /// Coefficient for the running average of the gradient
    pub beta1: f64,
    /// Coefficient for the running average of the square of the gradient
    pub beta2: f64,
    /// Weight decay (L2 penalty)
    pub weight_decay: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            weight_decay: 0.0,
        }
    }
}

impl AdamConfig {
    pub const fn with_learning_rate(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            weight_decay: 0.0,
        }
    }

    /// Build an optimizer over every trainable variable of `vs`.
    pub fn build_optimizer(&self, vs: &VarStore) -> Result<COptimizer, TchError> {
        let mut optimizer = COptimizer::try_from(self)?;
        let variables = vs
            .variables_
            .lock()
            .map_err(|_| TchError::Torch("variable store lock poisoned".into()))?;
        for var in &variables.trainable_variables {
            optimizer.add_parameters(&var.tensor, var.group)?;
        }
        Ok(optimizer)
    }
}

impl TryFrom<&AdamConfig> for COptimizer {
    type Error = TchError;
    fn try_from(config: &AdamConfig) -> Result<Self, Self::Error> {
        COptimizer::adam(
            config.learning_rate,
            config.beta1,
            config.beta2,
            config.weight_decay,
        )
    }
}

#[derive(Error, Debug)]
pub enum OptimizerStepError {
    #[error("loss is not finite ({0})")]
    NonFiniteLoss(f64),
    #[error(transparent)]
    Torch(#[from] TchError),
}

/// Minimize `loss` with a single optimizer step.
///
/// The step is skipped if the loss is not finite, leaving the parameters unchanged.
/// Returns the loss value.
pub fn backward_step(optimizer: &mut COptimizer, loss: &Tensor) -> Result<f64, OptimizerStepError> {
    let value = f64::from(loss);
    if !value.is_finite() {
        return Err(OptimizerStepError::NonFiniteLoss(value));
    }
    optimizer.zero_grad()?;
    loss.backward();
    optimizer.step()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Device, Kind};

    #[test]
    fn adam_step_reduces_loss() {
        let vs = VarStore::new(Device::Cpu);
        let x = vs.root().var("x", &[3], tch::nn::Init::Const(2.0));
        let mut optimizer = AdamConfig::with_learning_rate(0.1)
            .build_optimizer(&vs)
            .unwrap();
        let loss_fn = || (&x * &x).sum(Kind::Float);
        let initial = backward_step(&mut optimizer, &loss_fn()).unwrap();
        for _ in 0..10 {
            backward_step(&mut optimizer, &loss_fn()).unwrap();
        }
        assert!(f64::from(loss_fn()) < initial);
    }

    #[test]
    fn nan_loss_rejected() {
        let vs = VarStore::new(Device::Cpu);
        let x = vs.root().var("x", &[1], tch::nn::Init::Const(1.0));
        let mut optimizer = AdamConfig::default().build_optimizer(&vs).unwrap();
        let loss = (&x * f64::NAN).sum(Kind::Float);
        assert!(matches!(
            backward_step(&mut optimizer, &loss),
            Err(OptimizerStepError::NonFiniteLoss(_))
        ));
        assert_eq!(f64::from(x.sum(Kind::Float)), 1.0);
    }
}
