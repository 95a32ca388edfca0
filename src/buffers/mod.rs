//! Replay storage of environment transitions
mod transition_store;

pub use transition_store::{PrefillSummary, TransitionStore};

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single environment transition. The action is not stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: Vec<f32>,
    pub reward: f32,
    pub next_state: Vec<f32>,
}

/// A batch of transitions sampled from a [`TransitionStore`].
///
/// Row `i` of every array belongs to the transition stored at `indices[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionBatch {
    /// `[batch_size, state_dim]`
    pub states: Array2<f32>,
    /// `[batch_size]`
    pub rewards: Array1<f32>,
    /// `[batch_size, state_dim]`
    pub next_states: Array2<f32>,
    pub indices: Vec<usize>,
}

impl TransitionBatch {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn state_dim(&self) -> usize {
        self.states.ncols()
    }
}

/// Which slots of the store sampling draws from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleRange {
    /// Every slot `[0, capacity)`, whether or not it has been written.
    ///
    /// Unwritten slots hold zeros.
    Capacity,
    /// Only written slots `[0, len)`.
    Filled,
}

impl Default for SampleRange {
    fn default() -> Self {
        Self::Capacity
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{field} has {actual} features, expected {expected}")]
    DimensionMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("cannot sample written transitions from an empty store")]
    Empty,
    #[error("transition store lock poisoned")]
    Poisoned,
}

/// Summary of one rolled out episode.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct EpisodeSummary {
    /// Number of transitions stored.
    pub steps: u64,
    /// Sum of the untransformed rewards.
    pub total_reward: f64,
    /// Whether the episode ended because the store cursor returned to slot 0.
    pub wrapped: bool,
}

/// Rolls out episodes into a [`TransitionStore`].
pub trait Rollout {
    type Error;

    /// Run a single episode, storing every transition.
    ///
    /// If `stop_at_wrap` is set the episode is cut short as soon as a store brings
    /// the write cursor back to slot 0.
    fn rollout_episode(
        &mut self,
        store: &TransitionStore,
        stop_at_wrap: bool,
    ) -> Result<EpisodeSummary, Self::Error>;
}
