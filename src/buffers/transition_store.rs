use super::{
    EpisodeSummary, Rollout, SampleRange, StoreError, Transition, TransitionBatch,
};
use crate::coord::Coordinator;
use crate::error::ConfigError;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;
use std::sync::{Mutex, MutexGuard};

/// Fixed-capacity circular buffer of transitions shared by one writer and any number of
/// readers.
///
/// Rows are stored in three parallel zero-initialized arrays.
/// A single mutex guards the arrays and the write cursor; it is held only while copying
/// rows in or out.
#[derive(Debug)]
pub struct TransitionStore {
    capacity: usize,
    state_dim: usize,
    rows: Mutex<Rows>,
}

#[derive(Debug)]
struct Rows {
    states: Array2<f32>,
    rewards: Array1<f32>,
    next_states: Array2<f32>,
    /// Next slot to overwrite.
    pointer: usize,
    /// Number of written slots, saturating at capacity.
    len: usize,
}

/// Result of [`TransitionStore::prefill`].
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PrefillSummary {
    pub episodes: u64,
    pub steps: u64,
    /// Whether the write cursor completed a lap back to slot 0.
    pub wrapped: bool,
}

impl TransitionStore {
    pub fn new(capacity: usize, state_dim: usize) -> Result<Self, ConfigError> {
        ConfigError::check_nonzero("capacity", capacity)?;
        ConfigError::check_nonzero("state_dim", state_dim)?;
        Ok(Self {
            capacity,
            state_dim,
            rows: Mutex::new(Rows {
                states: Array2::zeros((capacity, state_dim)),
                rewards: Array1::zeros(capacity),
                next_states: Array2::zeros((capacity, state_dim)),
                pointer: 0,
                len: 0,
            }),
        })
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub const fn state_dim(&self) -> usize {
        self.state_dim
    }

    /// Number of slots written at least once.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Whether every slot has been written at least once.
    pub fn is_full(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == self.capacity)
    }

    /// The next slot to be overwritten.
    pub fn pointer(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.pointer)
    }

    fn lock(&self) -> Result<MutexGuard<Rows>, StoreError> {
        self.rows.lock().map_err(|_| StoreError::Poisoned)
    }

    fn check_dim(&self, field: &'static str, row: &[f32]) -> Result<(), StoreError> {
        if row.len() == self.state_dim {
            Ok(())
        } else {
            Err(StoreError::DimensionMismatch {
                field,
                expected: self.state_dim,
                actual: row.len(),
            })
        }
    }

    /// Write a transition into the slot at the cursor and advance the cursor.
    ///
    /// Overwrites the oldest transition once the store is full.
    /// Returns the slot that was written.
    pub fn store(
        &self,
        state: &[f32],
        reward: f32,
        next_state: &[f32],
    ) -> Result<usize, StoreError> {
        self.check_dim("state", state)?;
        self.check_dim("next_state", next_state)?;

        let mut rows = self.lock()?;
        let slot = rows.pointer;
        rows.states.row_mut(slot).assign(&ArrayView1::from(state));
        rows.rewards[slot] = reward;
        rows.next_states
            .row_mut(slot)
            .assign(&ArrayView1::from(next_state));
        rows.pointer = (slot + 1) % self.capacity;
        rows.len = (rows.len + 1).min(self.capacity);
        Ok(slot)
    }

    /// Copy of the transition in one slot.
    ///
    /// Returns `None` if `index` is out of bounds.
    pub fn get(&self, index: usize) -> Result<Option<Transition>, StoreError> {
        if index >= self.capacity {
            return Ok(None);
        }
        let rows = self.lock()?;
        Ok(Some(Transition {
            state: rows.states.row(index).to_vec(),
            reward: rows.rewards[index],
            next_state: rows.next_states.row(index).to_vec(),
        }))
    }

    /// Sample `n` transitions uniformly over every slot, with replacement.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        n: usize,
        rng: &mut R,
    ) -> Result<TransitionBatch, StoreError> {
        self.sample_from(SampleRange::Capacity, n, rng)
    }

    /// Sample `n` transitions uniformly over `range`, with replacement.
    pub fn sample_from<R: Rng + ?Sized>(
        &self,
        range: SampleRange,
        n: usize,
        rng: &mut R,
    ) -> Result<TransitionBatch, StoreError> {
        let upper = match range {
            SampleRange::Capacity => self.capacity,
            // The fill count never decreases so indices below it stay valid
            SampleRange::Filled => match self.len()? {
                0 => return Err(StoreError::Empty),
                len => len,
            },
        };
        let indices: Vec<usize> = (0..n).map(|_| rng.gen_range(0..upper)).collect();

        let rows = self.lock()?;
        let states = rows.states.select(Axis(0), &indices);
        let rewards = rows.rewards.select(Axis(0), &indices);
        let next_states = rows.next_states.select(Axis(0), &indices);
        drop(rows);

        Ok(TransitionBatch {
            states,
            rewards,
            next_states,
            indices,
        })
    }

    /// Roll out episodes into the store until the write cursor returns to slot 0.
    ///
    /// Starting from an empty store this fills every slot exactly once.
    /// The coordinator is checked between episodes; a stop request ends the prefill early
    /// with `wrapped == false`.
    pub fn prefill<R: Rollout>(
        &self,
        rollout: &mut R,
        coord: &Coordinator,
    ) -> Result<PrefillSummary, R::Error> {
        let mut summary = PrefillSummary::default();
        while !coord.should_stop() {
            let EpisodeSummary { steps, wrapped, .. } = rollout.rollout_episode(self, true)?;
            summary.episodes += 1;
            summary.steps += steps;
            if wrapped {
                summary.wrapped = true;
                break;
            }
        }
        log::info!(
            "prefilled {} transitions over {} episodes",
            summary.steps,
            summary.episodes
        );
        Ok(summary)
    }
}
