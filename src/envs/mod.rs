//! Reinforcement learning environments
mod pendulum;
#[cfg(test)]
pub mod testing;

pub use pendulum::{Pendulum, PendulumConfig};

use crate::spaces::BoxSpace;
use std::collections::BTreeMap;
use thiserror::Error;

/// A stateful environment with continuous observations and actions.
///
/// Episodes start with [`reset`](Environment::reset) and advance with
/// [`step`](Environment::step) until the step reports `done`.
pub trait Environment {
    /// Number of observation features.
    fn state_dim(&self) -> usize;

    /// Number of action features.
    fn action_dim(&self) -> usize {
        self.action_bounds().num_dims()
    }

    /// Valid action values. Every element of the space must be a valid action.
    fn action_bounds(&self) -> BoxSpace;

    /// A lower and upper bound on possible reward values.
    fn reward_range(&self) -> (f64, f64) {
        (f64::NEG_INFINITY, f64::INFINITY)
    }

    /// Start a new episode and return the initial observation.
    fn reset(&mut self) -> Result<Vec<f32>, EnvError>;

    /// Apply an action to the current episode.
    fn step(&mut self, action: &[f32]) -> Result<EnvStep, EnvError>;

    /// Draw the current state. Best effort; the default does nothing.
    fn render_frame(&mut self) {}
}

impl<E: Environment + ?Sized> Environment for Box<E> {
    fn state_dim(&self) -> usize {
        E::state_dim(self)
    }
    fn action_dim(&self) -> usize {
        E::action_dim(self)
    }
    fn action_bounds(&self) -> BoxSpace {
        E::action_bounds(self)
    }
    fn reward_range(&self) -> (f64, f64) {
        E::reward_range(self)
    }
    fn reset(&mut self) -> Result<Vec<f32>, EnvError> {
        E::reset(self)
    }
    fn step(&mut self, action: &[f32]) -> Result<EnvStep, EnvError> {
        E::step(self, action)
    }
    fn render_frame(&mut self) {
        E::render_frame(self)
    }
}

/// Outcome of an environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvStep {
    pub next_state: Vec<f32>,
    pub reward: f64,
    /// The episode has ended; the next call must be to `reset`.
    pub done: bool,
    /// Environment-specific diagnostics.
    pub info: BTreeMap<&'static str, f64>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvError {
    #[error("action has {actual} features, expected {expected}")]
    ActionDim { expected: usize, actual: usize },
    #[error("step called without an active episode")]
    NotReset,
    #[error("simulation failed: {0}")]
    Simulation(String),
}
