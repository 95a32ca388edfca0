//! Evaluators for testing
use super::{Policy, PolicyEvaluator, UpdateError, UpdateStats};
use crate::buffers::TransitionBatch;
use crate::smoothing::Smoothed;
use ndarray::Array1;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Policy that always outputs the same action.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantPolicy(pub Vec<f32>);

impl Policy for ConstantPolicy {
    fn select_action(&self, _: &[f32]) -> Vec<f32> {
        self.0.clone()
    }
}

/// Evaluator whose single online parameter tracks the mean sampled reward.
///
/// Counts its updates and can be scripted to fail on a given update.
#[derive(Debug)]
pub struct MockEvaluator {
    pub state_dim: usize,
    pub action_dim: usize,
    pub params: Smoothed<Array1<f64>>,
    pub updates: Arc<AtomicU64>,
    pub fail_at: Option<u64>,
}

impl MockEvaluator {
    pub fn new(state_dim: usize, action_dim: usize) -> Self {
        Self {
            state_dim,
            action_dim,
            params: Smoothed::new(Array1::zeros(1), 0.5).unwrap(),
            updates: Arc::new(AtomicU64::new(0)),
            fail_at: None,
        }
    }
}

impl PolicyEvaluator for MockEvaluator {
    type Policy = ConstantPolicy;

    fn state_dim(&self) -> usize {
        self.state_dim
    }

    fn action_dim(&self) -> usize {
        self.action_dim
    }

    fn policy(&self) -> Self::Policy {
        ConstantPolicy(vec![0.0; self.action_dim])
    }

    #[allow(clippy::cast_possible_truncation)]
    fn estimate_value(&self, _: &[f32]) -> f32 {
        self.params.online()[0] as f32
    }

    fn update(&mut self, batch: &TransitionBatch) -> Result<UpdateStats, UpdateError> {
        if batch.state_dim() != self.state_dim {
            return Err(UpdateError::BatchShape {
                expected: self.state_dim,
                actual: batch.state_dim(),
            });
        }
        let count = self.updates.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == Some(count) {
            return Err(UpdateError::NonFiniteLoss {
                loss: "critic",
                value: f64::NAN,
            });
        }
        self.params.smooth()?;
        let mean_reward = batch.rewards.mean().map_or(0.0, f64::from);
        self.params.online_mut()[0] = mean_reward;
        let q = self.params.target()[0];
        Ok(UpdateStats {
            critic_loss: (q - mean_reward).powi(2),
            actor_loss: None,
            mean_reward,
            mean_q: q,
            min_q: q,
            max_q: q,
        })
    }
}
