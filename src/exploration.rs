//! Exploration noise and its decay schedule.
use crate::error::ConfigError;
use crate::policy::Policy;
use crate::spaces::BoxSpace;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Exploration noise schedule parameters.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    /// Noise scale before any decay.
    pub initial_variance: f64,
    /// Multiplicative decay applied at each decay event.
    pub decay_factor: f64,
    /// Number of learner steps between decay events.
    pub period: u64,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            initial_variance: 3.0,
            decay_factor: 0.995,
            period: 200,
        }
    }
}

impl ExplorationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_non_negative("initial_variance", self.initial_variance)?;
        ConfigError::check_rate("decay_factor", self.decay_factor)?;
        ConfigError::check_nonzero("period", self.period)
    }
}

/// Exploration variance shared between the learner and the producer.
///
/// The variance is `initial_variance * decay_factor ^ m` where `m` is the number of decay
/// events so far. Only the learner records decays.
/// The producer reads the variance at every step.
#[derive(Debug)]
pub struct ExplorationSchedule {
    config: ExplorationConfig,
    decays: AtomicU64,
}

impl ExplorationSchedule {
    pub fn new(config: ExplorationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            decays: AtomicU64::new(0),
        })
    }

    pub const fn config(&self) -> &ExplorationConfig {
        &self.config
    }

    /// Number of decay events so far.
    pub fn decays(&self) -> u64 {
        self.decays.load(Ordering::Acquire)
    }

    /// Current noise scale.
    pub fn variance(&self) -> f64 {
        let decays = i32::try_from(self.decays()).unwrap_or(i32::MAX);
        self.config.initial_variance * self.config.decay_factor.powi(decays)
    }

    /// Whether the step counter value `counter` falls on a period boundary.
    pub const fn is_boundary(&self, counter: u64) -> bool {
        counter % self.config.period == self.config.period - 1
    }

    /// Record that the learner step counter has reached `counter`.
    ///
    /// Decays on period boundaries and returns whether a decay happened.
    pub fn note_step(&self, counter: u64) -> bool {
        let boundary = self.is_boundary(counter);
        if boundary {
            self.decays.fetch_add(1, Ordering::AcqRel);
        }
        boundary
    }

    /// Set the decay count to what a run whose counter went from 1 to `counter` would have
    /// reached.
    pub fn fast_forward(&self, counter: u64) {
        let period = self.config.period;
        // Counter value 0 is never noted, but it is a boundary when the period is 1
        let decays = if period == 1 {
            counter
        } else {
            (counter + 1) / period
        };
        self.decays.store(decays, Ordering::Release);
    }
}

/// Adds Gaussian exploration noise to a policy and clamps to the action bounds.
#[derive(Debug)]
pub struct NoisyActor<'a, P, R> {
    pub policy: P,
    pub schedule: &'a ExplorationSchedule,
    pub bounds: BoxSpace,
    pub rng: R,
}

impl<'a, P: Policy, R: Rng> NoisyActor<'a, P, R> {
    pub fn new(policy: P, schedule: &'a ExplorationSchedule, bounds: BoxSpace, rng: R) -> Self {
        Self {
            policy,
            schedule,
            bounds,
            rng,
        }
    }

    /// Exploratory action for `state`.
    ///
    /// The current variance is used as the standard deviation of the noise.
    #[allow(clippy::cast_possible_truncation)]
    pub fn act(&mut self, state: &[f32]) -> Vec<f32> {
        let scale = self.schedule.variance();
        let mut action = self.policy.select_action(state);
        for a in &mut action {
            let noise: f64 = self.rng.sample(StandardNormal);
            *a += (scale * noise) as f32;
        }
        self.bounds.clamp_in_place(&mut action);
        action
    }
}
