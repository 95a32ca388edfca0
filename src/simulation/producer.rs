use super::metrics::{Metric, MetricsSender};
use crate::buffers::{EpisodeSummary, Rollout, StoreError, TransitionStore};
use crate::coord::Coordinator;
use crate::envs::{EnvError, Environment};
use crate::exploration::NoisyActor;
use crate::policy::Policy;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Affine transform applied to rewards before they are stored: `(r + offset) * scale`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardTransform {
    pub offset: f64,
    pub scale: f64,
}

impl Default for RewardTransform {
    /// Maps pendulum rewards from `[-16.27, 0]` to about `[-1, 1]`.
    fn default() -> Self {
        Self {
            offset: 8.0,
            scale: 0.125,
        }
    }
}

impl RewardTransform {
    /// The transform that leaves rewards unchanged.
    pub const IDENTITY: Self = Self {
        offset: 0.0,
        scale: 1.0,
    };

    #[allow(clippy::cast_possible_truncation)]
    pub fn apply(&self, reward: f64) -> f32 {
        ((reward + self.offset) * self.scale) as f32
    }
}

#[derive(Error, Debug)]
pub enum ProducerError {
    #[error("environment error")]
    Env(#[from] EnvError),
    #[error("error storing transition")]
    Store(#[from] StoreError),
    #[error("{failures} consecutive episodes failed")]
    TooManyEnvErrors {
        failures: u32,
        #[source]
        last: EnvError,
    },
}

/// Totals of a [`Producer::run`].
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ProducerSummary {
    pub episodes: u64,
    pub steps: u64,
    /// Episodes cut short by a tolerated environment error.
    pub aborted_episodes: u64,
}

/// Rolls out the noisy policy in an environment and stores every transition.
#[derive(Debug)]
pub struct Producer<'a, E, P, R> {
    pub env: E,
    pub actor: NoisyActor<'a, P, R>,
    /// Episodes are truncated after this many steps.
    pub max_episode_steps: u64,
    pub reward_transform: RewardTransform,
    /// Render the environment before every step.
    pub render: bool,
    /// Number of consecutive episodes allowed to fail with an environment error.
    pub env_error_tolerance: u32,
    /// Where to report finished episodes from [`Producer::run`].
    pub metrics: Option<MetricsSender>,
    aborted_episodes: u64,
}

impl<'a, E, P, R> Producer<'a, E, P, R>
where
    E: Environment,
    P: Policy,
    R: Rng,
{
    pub fn new(env: E, actor: NoisyActor<'a, P, R>, max_episode_steps: u64) -> Self {
        Self {
            env,
            actor,
            max_episode_steps,
            reward_transform: RewardTransform::default(),
            render: false,
            env_error_tolerance: 0,
            metrics: None,
            aborted_episodes: 0,
        }
    }

    /// Roll out episodes until stop is requested.
    ///
    /// The coordinator is checked at the start of every episode so an episode in progress
    /// always finishes. Stop is requested when this returns, whether or not it failed.
    pub fn run(
        &mut self,
        store: &TransitionStore,
        coord: &Coordinator,
    ) -> Result<ProducerSummary, ProducerError> {
        let _guard = coord.stop_on_drop();
        let mut summary = ProducerSummary::default();
        while !coord.should_stop() {
            let episode = self.rollout_episode(store, false)?;
            summary.episodes += 1;
            summary.steps += episode.steps;
            if let Some(metrics) = &self.metrics {
                metrics.send(Metric::Episode {
                    total_reward: episode.total_reward,
                    length: episode.steps,
                });
            }
        }
        summary.aborted_episodes = self.aborted_episodes;
        log::debug!(
            "producer stopped after {} episodes ({} steps)",
            summary.episodes,
            summary.steps
        );
        Ok(summary)
    }

    /// Run one episode without retrying on failure.
    fn try_episode(
        &mut self,
        store: &TransitionStore,
        stop_at_wrap: bool,
    ) -> Result<EpisodeSummary, ProducerError> {
        let mut summary = EpisodeSummary::default();
        let mut state = self.env.reset()?;
        for _ in 0..self.max_episode_steps {
            if self.render {
                self.env.render_frame();
            }
            let action = self.actor.act(&state);
            let step = self.env.step(&action)?;
            let slot = store.store(
                &state,
                self.reward_transform.apply(step.reward),
                &step.next_state,
            )?;
            summary.steps += 1;
            summary.total_reward += step.reward;

            if stop_at_wrap && slot + 1 == store.capacity() {
                summary.wrapped = true;
                break;
            }
            if step.done {
                break;
            }
            state = step.next_state;
        }
        Ok(summary)
    }
}

impl<'a, E, P, R> Rollout for Producer<'a, E, P, R>
where
    E: Environment,
    P: Policy,
    R: Rng,
{
    type Error = ProducerError;

    /// Roll out an episode, starting over after an environment error.
    ///
    /// Up to `env_error_tolerance` consecutive failed episodes are abandoned with a warning.
    /// Transitions stored before a failure are kept.
    fn rollout_episode(
        &mut self,
        store: &TransitionStore,
        stop_at_wrap: bool,
    ) -> Result<EpisodeSummary, ProducerError> {
        let mut failures = 0;
        loop {
            match self.try_episode(store, stop_at_wrap) {
                Err(ProducerError::Env(err)) => {
                    if failures >= self.env_error_tolerance {
                        return Err(if failures == 0 {
                            ProducerError::Env(err)
                        } else {
                            ProducerError::TooManyEnvErrors {
                                failures: failures + 1,
                                last: err,
                            }
                        });
                    }
                    failures += 1;
                    self.aborted_episodes += 1;
                    log::warn!(
                        "abandoning episode after environment error ({}/{}): {}",
                        failures,
                        self.env_error_tolerance,
                        err
                    );
                }
                result => return result,
            }
        }
    }
}
