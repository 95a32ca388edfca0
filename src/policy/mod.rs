//! Policy and value estimation interfaces
#[cfg(test)]
pub mod testing;

use crate::buffers::TransitionBatch;
use crate::smoothing::SmoothingError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Deterministic map from states to actions.
///
/// Exploration noise is added by the caller.
pub trait Policy {
    fn select_action(&self, state: &[f32]) -> Vec<f32>;
}

impl<T: Policy + ?Sized> Policy for &'_ T {
    fn select_action(&self, state: &[f32]) -> Vec<f32> {
        T::select_action(self, state)
    }
}

impl<T: Policy + ?Sized> Policy for Box<T> {
    fn select_action(&self, state: &[f32]) -> Vec<f32> {
        T::select_action(self, state)
    }
}

/// Owns the online and target parameters of a policy and its value estimator.
///
/// The learner thread owns the evaluator.
/// The producer thread acts through the handle returned by [`PolicyEvaluator::policy`].
pub trait PolicyEvaluator {
    /// Handle that selects actions with the current online policy parameters.
    type Policy: Policy + Send;

    fn state_dim(&self) -> usize;

    fn action_dim(&self) -> usize;

    /// A handle sharing the online policy parameters.
    ///
    /// Updates made by [`PolicyEvaluator::update`] are visible through the handle.
    fn policy(&self) -> Self::Policy;

    /// Estimated value of a state under the current policy.
    fn estimate_value(&self, state: &[f32]) -> f32;

    /// Smooth the target parameters toward the online parameters then take the
    /// optimization steps for one batch.
    fn update(&mut self, batch: &TransitionBatch) -> Result<UpdateStats, UpdateError>;
}

impl<T: PolicyEvaluator + ?Sized> PolicyEvaluator for &'_ mut T {
    type Policy = T::Policy;

    fn state_dim(&self) -> usize {
        T::state_dim(self)
    }

    fn action_dim(&self) -> usize {
        T::action_dim(self)
    }

    fn policy(&self) -> Self::Policy {
        T::policy(self)
    }

    fn estimate_value(&self, state: &[f32]) -> f32 {
        T::estimate_value(self, state)
    }

    fn update(&mut self, batch: &TransitionBatch) -> Result<UpdateStats, UpdateError> {
        T::update(self, batch)
    }
}

/// Statistics of a single evaluator update.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateStats {
    pub critic_loss: f64,
    /// Loss of the last actor step, if any step was taken.
    pub actor_loss: Option<f64>,
    pub mean_reward: f64,
    pub mean_q: f64,
    pub min_q: f64,
    pub max_q: f64,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UpdateError {
    #[error("{loss} loss is not finite ({value})")]
    NonFiniteLoss { loss: &'static str, value: f64 },
    #[error("batch has {actual} state features, expected {expected}")]
    BatchShape { expected: usize, actual: usize },
    #[error("optimizer step failed: {0}")]
    Optimizer(String),
    #[error("error smoothing target parameters")]
    Smoothing(#[from] SmoothingError),
}
