//! Environments for testing
use super::{EnvError, EnvStep, Environment};
use crate::spaces::{BoxSpace, IntervalSpace};
use std::collections::BTreeMap;

/// Deterministic environment whose state counts steps within the episode.
///
/// The state is `[t; state_dim]` and the reward of step `t` is `t + 1`.
/// Episodes are done after `episode_len` steps if set.
/// Steps numbered in `fail_steps` (counted over the environment lifetime, from 0) fail.
#[derive(Debug, Clone, Default)]
pub struct CountingEnv {
    pub state_dim: usize,
    pub episode_len: Option<u64>,
    pub fail_steps: Vec<u64>,
    pub t: Option<u64>,
    pub total_steps: u64,
    pub resets: u64,
    pub actions: Vec<Vec<f32>>,
}

impl CountingEnv {
    pub fn new(state_dim: usize, episode_len: Option<u64>) -> Self {
        Self {
            state_dim,
            episode_len,
            ..Self::default()
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn observe(&self, t: u64) -> Vec<f32> {
        vec![t as f32; self.state_dim]
    }
}

impl Environment for CountingEnv {
    fn state_dim(&self) -> usize {
        self.state_dim
    }

    fn action_bounds(&self) -> BoxSpace {
        BoxSpace::uniform(IntervalSpace { low: -1.0, high: 1.0 }, 1)
    }

    fn reset(&mut self) -> Result<Vec<f32>, EnvError> {
        self.t = Some(0);
        self.resets += 1;
        Ok(self.observe(0))
    }

    #[allow(clippy::cast_precision_loss)]
    fn step(&mut self, action: &[f32]) -> Result<EnvStep, EnvError> {
        let t = self.t.ok_or(EnvError::NotReset)?;
        let step_index = self.total_steps;
        self.total_steps += 1;
        if self.fail_steps.contains(&step_index) {
            self.t = None;
            return Err(EnvError::Simulation(format!("scripted failure at {}", step_index)));
        }
        self.actions.push(action.to_vec());
        let next_t = t + 1;
        let done = self.episode_len.map_or(false, |len| next_t >= len);
        self.t = if done { None } else { Some(next_t) };
        Ok(EnvStep {
            next_state: self.observe(next_t),
            reward: next_t as f64,
            done,
            info: BTreeMap::new(),
        })
    }
}
