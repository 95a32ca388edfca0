use super::learner::Learner;
use super::metrics::metrics_channel;
use super::producer::{Producer, ProducerSummary, RewardTransform};
use crate::buffers::{PrefillSummary, SampleRange, TransitionStore};
use crate::coord::Coordinator;
use crate::envs::Environment;
use crate::error::{ConfigError, TrainError};
use crate::exploration::{ExplorationConfig, ExplorationSchedule, NoisyActor};
use crate::logging::StatsLogger;
use crate::policy::PolicyEvaluator;
use crate::Prng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Configuration for [`train_async`].
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Transition store capacity.
    pub capacity: usize,
    pub batch_size: usize,
    /// Episodes are truncated after this many steps.
    pub max_episode_steps: u64,
    /// Number of learner updates.
    pub num_iterations: u64,
    pub exploration: ExplorationConfig,
    pub reward_transform: RewardTransform,
    pub sample_range: SampleRange,
    /// Number of consecutive failed episodes the producer tolerates.
    pub env_error_tolerance: u32,
    /// Capacity of the metrics channel.
    pub metrics_capacity: usize,
    pub render: bool,
    /// Seed of the producer and learner random number generators.
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            batch_size: 128,
            max_episode_steps: 200,
            num_iterations: 500_000,
            exploration: ExplorationConfig::default(),
            reward_transform: RewardTransform::default(),
            sample_range: SampleRange::default(),
            env_error_tolerance: 0,
            metrics_capacity: 1024,
            render: false,
            seed: 0,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_nonzero("capacity", self.capacity)?;
        ConfigError::check_nonzero("batch_size", self.batch_size)?;
        ConfigError::check_nonzero("max_episode_steps", self.max_episode_steps)?;
        ConfigError::check_nonzero("metrics_capacity", self.metrics_capacity)?;
        self.exploration.validate()
    }
}

/// Summary of a [`train_async`] run.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct TrainSummary {
    /// Learner step counter when training ended.
    pub final_step: u64,
    pub prefill: PrefillSummary,
    pub producer: ProducerSummary,
    /// Metric records written to the logger.
    pub logged_metrics: u64,
    /// Metric records dropped because the logger fell behind.
    pub dropped_metrics: u64,
}

/// Train an evaluator with a producer thread and a learner thread sharing a transition store.
///
/// The store is first filled by rolling out the noisy policy on this thread.
/// Then the producer keeps storing transitions while the learner samples batches and
/// updates `evaluator`. This thread logs the metrics both send until they finish.
/// The learner requests stop after `num_iterations` updates; the producer stops at the
/// start of its next episode. A failure in either thread stops the other.
///
/// `start_step` is the learner step counter to resume from, as restored from a checkpoint.
pub fn train_async<T, E, L>(
    evaluator: &mut T,
    env: E,
    config: &TrainConfig,
    start_step: u64,
    logger: &mut L,
) -> Result<TrainSummary, TrainError>
where
    T: PolicyEvaluator + Send + ?Sized,
    E: Environment + Send,
    L: StatsLogger + ?Sized,
{
    config.validate()?;
    ConfigError::check_dim("state", evaluator.state_dim(), env.state_dim())?;
    ConfigError::check_dim("action", evaluator.action_dim(), env.action_dim())?;

    let store = TransitionStore::new(config.capacity, env.state_dim())?;
    let coord = Coordinator::new();
    let schedule = ExplorationSchedule::new(config.exploration)?;
    schedule.fast_forward(start_step);
    let (metrics, receiver) = metrics_channel(config.metrics_capacity);

    let mut rng = Prng::seed_from_u64(config.seed);
    let producer_rng = Prng::seed_from_u64(rng.gen());
    let learner_rng = Prng::seed_from_u64(rng.gen());

    let bounds = env.action_bounds();
    let actor = NoisyActor::new(evaluator.policy(), &schedule, bounds, producer_rng);
    let mut producer = Producer::new(env, actor, config.max_episode_steps);
    producer.reward_transform = config.reward_transform;
    producer.render = config.render;
    producer.env_error_tolerance = config.env_error_tolerance;
    producer.metrics = Some(metrics.clone());

    let start = Instant::now();
    let prefill = store.prefill(&mut producer, &coord)?;

    let mut learner = Learner {
        evaluator,
        batch_size: config.batch_size,
        num_iterations: config.num_iterations,
        sample_range: config.sample_range,
        start_step,
        schedule: &schedule,
        metrics: Some(metrics),
        rng: learner_rng,
    };

    let store = &store;
    let coord = &coord;
    let (producer_result, learner_result, logged_metrics) = crossbeam::scope(|scope| {
        let producer_thread = scope.spawn(move |_| producer.run(store, coord));
        let learner_thread = scope.spawn(move |_| learner.run(store, coord));
        // Ends once both threads have dropped their senders
        let logged = receiver.drain_into(logger);
        (producer_thread.join(), learner_thread.join(), logged)
    })
    .map_err(|_| TrainError::Panic("training"))?;

    let producer_result = producer_result.map_err(|_| TrainError::Panic("producer"))?;
    let final_step = match learner_result.map_err(|_| TrainError::Panic("learner"))? {
        Ok(step) => step,
        Err(err) => {
            if let Err(producer_err) = &producer_result {
                log::error!("producer also failed: {}", producer_err);
            }
            return Err(err.into());
        }
    };
    let producer = producer_result?;

    let summary = TrainSummary {
        final_step,
        prefill,
        producer,
        logged_metrics,
        dropped_metrics: receiver.dropped(),
    };
    log::info!(
        "training finished at step {} in {:.1?}; producer ran {} episodes",
        summary.final_step,
        start.elapsed(),
        summary.producer.episodes
    );
    if summary.dropped_metrics > 0 {
        log::warn!("{} metric records were dropped", summary.dropped_metrics);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::testing::CountingEnv;
    use crate::logging::testing::MockLogger;
    use crate::policy::testing::MockEvaluator;
    use crate::simulation::{LearnerError, ProducerError};
    use std::sync::atomic::Ordering;

    fn config() -> TrainConfig {
        TrainConfig {
            capacity: 64,
            batch_size: 8,
            max_episode_steps: 10,
            num_iterations: 1000,
            exploration: ExplorationConfig {
                period: 100,
                ..ExplorationConfig::default()
            },
            ..TrainConfig::default()
        }
    }

    #[test]
    fn runs_to_completion() {
        let mut evaluator = MockEvaluator::new(3, 1);
        let updates = evaluator.updates.clone();
        let env = CountingEnv::new(3, Some(7));
        let mut logger = MockLogger::default();
        let config = TrainConfig {
            metrics_capacity: 1 << 16,
            ..config()
        };

        let summary = train_async(&mut evaluator, env, &config, 0, &mut logger).unwrap();
        assert_eq!(summary.final_step, 1000);
        assert_eq!(updates.load(Ordering::SeqCst), 1000);
        assert!(summary.prefill.wrapped);
        assert_eq!(summary.prefill.steps, 64);
        assert_eq!(summary.dropped_metrics, 0);

        let update_records = logger
            .logged()
            .filter(|(id, _)| id.to_string() == "learner/critic_loss")
            .count();
        // Counter values 99, 199, ..., 999
        assert_eq!(update_records, 10);
        // Rewards stored in the store are transformed counts so their mean is positive
        assert!(evaluator.params.online()[0] > 1.0);
    }

    #[test]
    fn resumes_counter() {
        let mut evaluator = MockEvaluator::new(1, 1);
        let env = CountingEnv::new(1, None);
        let config = TrainConfig {
            num_iterations: 50,
            ..config()
        };
        let summary = train_async(&mut evaluator, env, &config, 500, &mut ()).unwrap();
        assert_eq!(summary.final_step, 550);
    }

    #[test]
    fn update_failure_stops_producer() {
        let mut evaluator = MockEvaluator::new(1, 1);
        evaluator.fail_at = Some(20);
        let env = CountingEnv::new(1, Some(5));
        let result = train_async(&mut evaluator, env, &config(), 0, &mut ());
        assert!(matches!(
            result,
            Err(TrainError::Learner(LearnerError::Update { step: 20, .. }))
        ));
    }

    #[test]
    fn env_failure_stops_learner() {
        let mut evaluator = MockEvaluator::new(1, 1);
        let mut env = CountingEnv::new(1, Some(5));
        // After the prefill of 64 steps
        env.fail_steps = vec![100];
        let config = TrainConfig {
            num_iterations: u64::MAX,
            ..config()
        };
        let result = train_async(&mut evaluator, env, &config, 0, &mut ());
        assert!(matches!(
            result,
            Err(TrainError::Producer(ProducerError::Env(_)))
        ));
    }

    #[test]
    fn tolerated_env_failure_continues() {
        let mut evaluator = MockEvaluator::new(1, 1);
        let mut env = CountingEnv::new(1, Some(5));
        env.fail_steps = vec![10, 70];
        let config = TrainConfig {
            env_error_tolerance: 1,
            num_iterations: 200,
            ..config()
        };
        let summary = train_async(&mut evaluator, env, &config, 0, &mut ()).unwrap();
        assert_eq!(summary.final_step, 200);
    }

    #[test]
    fn dimension_mismatch_rejected() {
        let mut evaluator = MockEvaluator::new(2, 1);
        let env = CountingEnv::new(3, None);
        assert!(matches!(
            train_async(&mut evaluator, env, &config(), 0, &mut ()),
            Err(TrainError::Config(ConfigError::DimensionMismatch {
                what: "state",
                expected: 2,
                actual: 3
            }))
        ));
    }

    #[test]
    fn invalid_config_rejected() {
        let mut evaluator = MockEvaluator::new(1, 1);
        let config = TrainConfig {
            batch_size: 0,
            ..config()
        };
        assert!(matches!(
            train_async(&mut evaluator, CountingEnv::new(1, None), &config, 0, &mut ()),
            Err(TrainError::Config(ConfigError::Zero { name: "batch_size" }))
        ));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: TrainConfig = serde_json::from_str(r#"{"batch_size": 32}"#).unwrap();
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.capacity, 10_000);
        assert_eq!(config.reward_transform, RewardTransform::default());
    }
}
