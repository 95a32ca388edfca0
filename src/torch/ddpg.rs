//! Deep Deterministic Policy Gradient
use super::modules::{Activation, Linear, LinearConfig, Mlp, MlpConfig};
use super::optimizers::{backward_step, AdamConfig, OptimizerStepError};
use super::{tensor_from_array2, DeviceConfig};
use crate::buffers::TransitionBatch;
use crate::checkpoint::{part_path, CheckpointError, ParameterFiles};
use crate::error::ConfigError;
use crate::policy::{Policy, PolicyEvaluator, UpdateError, UpdateStats};
use crate::smoothing::{Smoothed, SmoothedPairError};
use crate::spaces::BoxSpace;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tch::{nn::VarStore, COptimizer, Device, Kind, Reduction, TchError, Tensor};
use thiserror::Error;

/// Configuration for [`DdpgEvaluator`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DdpgConfig {
    /// Hidden layer size of the actor and the critic.
    pub hidden_size: usize,
    pub actor_optimizer: AdamConfig,
    pub critic_optimizer: AdamConfig,
    pub discount_factor: f64,
    /// Rate at which the target networks track the online networks.
    pub target_rate: f64,
    pub critic_steps_per_update: usize,
    /// Number of policy improvement steps per update.
    ///
    /// Defaults to one actor step per update. Set to 0 to train the critic alone, which
    /// leaves the policy at its initial weights.
    pub actor_steps_per_update: usize,
    pub device: DeviceConfig,
}

impl Default for DdpgConfig {
    fn default() -> Self {
        Self {
            hidden_size: 64,
            actor_optimizer: AdamConfig::with_learning_rate(1e-3),
            critic_optimizer: AdamConfig::with_learning_rate(2e-3),
            discount_factor: 0.9,
            target_rate: 0.01,
            critic_steps_per_update: 1,
            actor_steps_per_update: 1,
            device: DeviceConfig::default(),
        }
    }
}

impl DdpgConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_nonzero("hidden_size", self.hidden_size)?;
        ConfigError::check_nonzero("critic_steps_per_update", self.critic_steps_per_update)?;
        ConfigError::check_rate("target_rate", self.target_rate)?;
        ConfigError::check_unit_interval("discount_factor", self.discount_factor)?;
        ConfigError::check_non_negative(
            "actor learning_rate",
            self.actor_optimizer.learning_rate,
        )?;
        ConfigError::check_non_negative(
            "critic learning_rate",
            self.critic_optimizer.learning_rate,
        )
    }
}

#[derive(Error, Debug)]
pub enum BuildEvaluatorError {
    #[error("invalid evaluator configuration")]
    Config(#[from] ConfigError),
    #[error("error pairing target networks")]
    Smoothing(#[from] SmoothedPairError),
    #[error(transparent)]
    Torch(#[from] TchError),
}

/// Deterministic policy network: `state -> action` scaled into the action bounds.
#[derive(Debug)]
struct ActorNet {
    mlp: Mlp,
    /// Midpoint of the action bounds, `[1, action_dim]`.
    center: Tensor,
    /// Half-width of the action bounds, `[1, action_dim]`.
    half_range: Tensor,
}

impl ActorNet {
    fn new(vs: &VarStore, state_dim: usize, bounds: &BoxSpace, hidden_size: usize) -> Self {
        let config = MlpConfig {
            hidden_sizes: vec![hidden_size],
            activation: Activation::Relu,
            output_activation: Activation::Tanh,
            linear_config: LinearConfig::default(),
        };
        let center: Vec<f32> = bounds.dims.iter().map(|i| (i.high + i.low) / 2.0).collect();
        let half_range: Vec<f32> = bounds.dims.iter().map(|i| (i.high - i.low) / 2.0).collect();
        let device = vs.device();
        Self {
            mlp: Mlp::new(&vs.root().sub("actor"), state_dim, bounds.num_dims(), &config),
            center: Tensor::of_slice(&center).unsqueeze(0).to_device(device),
            half_range: Tensor::of_slice(&half_range).unsqueeze(0).to_device(device),
        }
    }

    fn forward(&self, states: &Tensor) -> Tensor {
        self.mlp.forward(states) * &self.half_range + &self.center
    }

    fn shallow_clone(&self) -> Self {
        Self {
            mlp: self.mlp.shallow_clone(),
            center: self.center.shallow_clone(),
            half_range: self.half_range.shallow_clone(),
        }
    }
}

/// Action value network: `relu(W_s s + b + W_a a) -> Q`.
#[derive(Debug)]
struct CriticNet {
    state_layer: Linear,
    action_layer: Linear,
    output_layer: Linear,
}

impl CriticNet {
    fn new(vs: &VarStore, state_dim: usize, action_dim: usize, hidden_size: usize) -> Self {
        let root = vs.root().sub("critic");
        let no_bias = LinearConfig {
            bias_init: None,
            ..LinearConfig::default()
        };
        Self {
            state_layer: Linear::new(
                &root.sub("state"),
                state_dim,
                hidden_size,
                &LinearConfig::default(),
            ),
            action_layer: Linear::new(&root.sub("action"), action_dim, hidden_size, &no_bias),
            output_layer: Linear::new(&root.sub("output"), hidden_size, 1, &LinearConfig::default()),
        }
    }

    /// Action values with shape `[batch_size, 1]`.
    fn forward(&self, states: &Tensor, actions: &Tensor) -> Tensor {
        let hidden = (self.state_layer.forward(states) + self.action_layer.forward(actions)).relu();
        self.output_layer.forward(&hidden)
    }
}

/// DDPG actor-critic with online and target networks.
///
/// Based on
/// "[Continuous control with deep reinforcement learning][ddpg]"
/// by Lillicrap et al. (2015).
///
/// The stored transitions carry no action so the critic is fit at the current policy's
/// action: it regresses `Q(s, μ(s))` onto `r + γ Q'(s', μ'(s'))`.
/// The actor ascends `Q(s, μ(s))`.
///
/// [ddpg]: https://arxiv.org/abs/1509.02971
pub struct DdpgEvaluator {
    state_dim: usize,
    action_dim: usize,

    actor_params: Smoothed<VarStore>,
    critic_params: Smoothed<VarStore>,
    actor: ActorNet,
    target_actor: ActorNet,
    critic: CriticNet,
    target_critic: CriticNet,
    actor_optimizer: COptimizer,
    critic_optimizer: COptimizer,

    discount_factor: f64,
    critic_steps_per_update: usize,
    actor_steps_per_update: usize,
    device: Device,
}

impl fmt::Debug for DdpgEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DdpgEvaluator")
            .field("state_dim", &self.state_dim)
            .field("action_dim", &self.action_dim)
            .field("discount_factor", &self.discount_factor)
            .field("target_rate", &self.actor_params.rate())
            .field("device", &self.device)
            .finish()
    }
}

impl DdpgEvaluator {
    pub fn new(
        state_dim: usize,
        action_bounds: &BoxSpace,
        config: &DdpgConfig,
    ) -> Result<Self, BuildEvaluatorError> {
        config.validate()?;
        ConfigError::check_nonzero("state_dim", state_dim)?;
        ConfigError::check_nonzero("action_dim", action_bounds.num_dims())?;
        for (dim, interval) in action_bounds.dims.iter().enumerate() {
            if !(interval.low.is_finite() && interval.high.is_finite()) {
                return Err(ConfigError::ActionBounds { dim }.into());
            }
        }

        let device = config.device.device();
        let action_dim = action_bounds.num_dims();
        let hidden = config.hidden_size;

        let actor_vs = VarStore::new(device);
        let target_actor_vs = VarStore::new(device);
        let actor = ActorNet::new(&actor_vs, state_dim, action_bounds, hidden);
        let target_actor = ActorNet::new(&target_actor_vs, state_dim, action_bounds, hidden);

        let critic_vs = VarStore::new(device);
        let target_critic_vs = VarStore::new(device);
        let critic = CriticNet::new(&critic_vs, state_dim, action_dim, hidden);
        let target_critic = CriticNet::new(&target_critic_vs, state_dim, action_dim, hidden);

        let actor_optimizer = config.actor_optimizer.build_optimizer(&actor_vs)?;
        let critic_optimizer = config.critic_optimizer.build_optimizer(&critic_vs)?;

        Ok(Self {
            state_dim,
            action_dim,
            actor_params: Smoothed::from_pair(actor_vs, target_actor_vs, config.target_rate)?,
            critic_params: Smoothed::from_pair(critic_vs, target_critic_vs, config.target_rate)?,
            actor,
            target_actor,
            critic,
            target_critic,
            actor_optimizer,
            critic_optimizer,
            discount_factor: config.discount_factor,
            critic_steps_per_update: config.critic_steps_per_update,
            actor_steps_per_update: config.actor_steps_per_update,
            device,
        })
    }

    fn state_tensor(&self, state: &[f32]) -> Tensor {
        Tensor::of_slice(state)
            .unsqueeze(0)
            .to_device(self.device)
    }
}

fn step_error(loss: &'static str) -> impl FnOnce(OptimizerStepError) -> UpdateError {
    move |err| match err {
        OptimizerStepError::NonFiniteLoss(value) => UpdateError::NonFiniteLoss { loss, value },
        OptimizerStepError::Torch(err) => UpdateError::Optimizer(err.to_string()),
    }
}

impl PolicyEvaluator for DdpgEvaluator {
    type Policy = DdpgPolicy;

    fn state_dim(&self) -> usize {
        self.state_dim
    }

    fn action_dim(&self) -> usize {
        self.action_dim
    }

    fn policy(&self) -> DdpgPolicy {
        DdpgPolicy {
            actor: self.actor.shallow_clone(),
            device: self.device,
        }
    }

    fn estimate_value(&self, state: &[f32]) -> f32 {
        let _no_grad = tch::no_grad_guard();
        let states = self.state_tensor(state);
        let actions = self.actor.forward(&states);
        f32::from(self.critic.forward(&states, &actions).squeeze())
    }

    fn update(&mut self, batch: &TransitionBatch) -> Result<UpdateStats, UpdateError> {
        if batch.state_dim() != self.state_dim {
            return Err(UpdateError::BatchShape {
                expected: self.state_dim,
                actual: batch.state_dim(),
            });
        }

        self.actor_params.smooth()?;
        self.critic_params.smooth()?;

        let states = tensor_from_array2(&batch.states, self.device);
        let next_states = tensor_from_array2(&batch.next_states, self.device);
        let rewards_vec: Vec<f32> = batch.rewards.iter().copied().collect();
        let rewards = Tensor::of_slice(&rewards_vec)
            .unsqueeze(-1)
            .to_device(self.device);

        let target_values = tch::no_grad(|| {
            let next_actions = self.target_actor.forward(&next_states);
            &rewards + self.target_critic.forward(&next_states, &next_actions) * self.discount_factor
        });
        // Policy actions are fixed during the critic steps
        let actions = tch::no_grad(|| self.actor.forward(&states));

        let mut stats = UpdateStats {
            mean_reward: f64::from(rewards.mean(Kind::Float)),
            ..UpdateStats::default()
        };
        for i in 0..self.critic_steps_per_update {
            let q = self.critic.forward(&states, &actions);
            if i == 0 {
                let _no_grad = tch::no_grad_guard();
                stats.mean_q = f64::from(q.mean(Kind::Float));
                stats.min_q = f64::from(q.min());
                stats.max_q = f64::from(q.max());
            }
            let loss = q.mse_loss(&target_values, Reduction::Mean);
            stats.critic_loss =
                backward_step(&mut self.critic_optimizer, &loss).map_err(step_error("critic"))?;
        }

        for _ in 0..self.actor_steps_per_update {
            let q = self.critic.forward(&states, &self.actor.forward(&states));
            let loss = -q.mean(Kind::Float);
            stats.actor_loss =
                Some(backward_step(&mut self.actor_optimizer, &loss).map_err(step_error("actor"))?);
        }
        Ok(stats)
    }
}

impl ParameterFiles for DdpgEvaluator {
    fn save_parameters(&self, prefix: &Path) -> Result<(), CheckpointError> {
        self.actor_params.online().save(part_path(prefix, "actor"))?;
        self.actor_params
            .target()
            .save(part_path(prefix, "target_actor"))?;
        self.critic_params.online().save(part_path(prefix, "critic"))?;
        self.critic_params
            .target()
            .save(part_path(prefix, "target_critic"))?;
        Ok(())
    }

    fn load_parameters(&mut self, prefix: &Path) -> Result<(), CheckpointError> {
        let (actor, target_actor) = self.actor_params.pair_mut();
        let (critic, target_critic) = self.critic_params.pair_mut();
        for (vs, part) in [
            (actor, "actor"),
            (target_actor, "target_actor"),
            (critic, "critic"),
            (target_critic, "target_critic"),
        ] {
            let path = part_path(prefix, part);
            if !path.exists() {
                return Err(CheckpointError::MissingPart(path));
            }
            // Copies into the existing tensors so that networks and policy handles stay valid
            vs.load(path)?;
        }
        Ok(())
    }
}

/// Action selection handle for a [`DdpgEvaluator`].
///
/// Shares parameter storage with the evaluator's online actor
/// so it always acts with the latest parameters.
#[derive(Debug)]
pub struct DdpgPolicy {
    actor: ActorNet,
    device: Device,
}

impl Policy for DdpgPolicy {
    fn select_action(&self, state: &[f32]) -> Vec<f32> {
        let _no_grad = tch::no_grad_guard();
        let states = Tensor::of_slice(state).unsqueeze(0).to_device(self.device);
        let action = self.actor.forward(&states).squeeze_dim(0).to_device(Device::Cpu);
        Vec::<f32>::from(&action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::Checkpointer;
    use crate::spaces::IntervalSpace;
    use ndarray::{Array1, Array2};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    fn bounds() -> BoxSpace {
        BoxSpace::uniform(IntervalSpace::new(-2.0, 2.0).unwrap(), 1)
    }

    #[fixture]
    fn evaluator() -> DdpgEvaluator {
        tch::manual_seed(0);
        DdpgEvaluator::new(3, &bounds(), &DdpgConfig::default()).unwrap()
    }

    /// Batch of `n` identical transitions.
    fn constant_batch(n: usize, state: [f32; 3], reward: f32) -> TransitionBatch {
        let states = Array2::from_shape_fn((n, 3), |(_, j)| state[j]);
        TransitionBatch {
            next_states: states.clone(),
            states,
            rewards: Array1::from_elem(n, reward),
            indices: (0..n).collect(),
        }
    }

    #[rstest]
    fn actions_within_bounds(evaluator: DdpgEvaluator) {
        let policy = evaluator.policy();
        for state in [[1.0, 0.0, 0.0], [0.0, 1.0, 8.0], [-1.0, 0.0, -8.0]] {
            let action = policy.select_action(&state);
            assert_eq!(action.len(), 1);
            assert!((-2.0..=2.0).contains(&action[0]));
        }
    }

    #[rstest]
    fn update_stats_finite(mut evaluator: DdpgEvaluator) {
        let stats = evaluator
            .update(&constant_batch(16, [1.0, 0.0, 0.5], 0.5))
            .unwrap();
        assert!(stats.critic_loss.is_finite());
        assert!(stats.actor_loss.unwrap().is_finite());
        assert!((stats.mean_reward - 0.5).abs() < 1e-6);
        assert!(stats.min_q <= stats.mean_q && stats.mean_q <= stats.max_q);
    }

    #[rstest]
    fn policy_handle_sees_updates(mut evaluator: DdpgEvaluator) {
        let policy = evaluator.policy();
        let state = [0.0, 1.0, 0.0];
        let before = policy.select_action(&state);
        for _ in 0..20 {
            evaluator
                .update(&constant_batch(32, state, 1.0))
                .unwrap();
        }
        assert_ne!(policy.select_action(&state), before);
        assert_eq!(
            policy.select_action(&state),
            evaluator.policy().select_action(&state)
        );
    }

    #[test]
    fn no_actor_steps_leaves_policy_fixed() {
        tch::manual_seed(1);
        let config = DdpgConfig {
            actor_steps_per_update: 0,
            ..DdpgConfig::default()
        };
        let mut evaluator = DdpgEvaluator::new(3, &bounds(), &config).unwrap();
        let state = [0.5, 0.5, 0.5];
        let before = evaluator.policy().select_action(&state);
        let stats = evaluator
            .update(&constant_batch(8, state, 1.0))
            .unwrap();
        assert_eq!(stats.actor_loss, None);
        assert_eq!(evaluator.policy().select_action(&state), before);
    }

    #[rstest]
    #[case(0.0, true)]
    #[case(1.0, true)]
    #[case(-0.5, false)]
    #[case(1.5, false)]
    fn discount_factor_range(#[case] discount_factor: f64, #[case] ok: bool) {
        let config = DdpgConfig {
            discount_factor,
            ..DdpgConfig::default()
        };
        let result = config.validate();
        assert_eq!(result.is_ok(), ok);
        if !ok {
            assert_eq!(
                result,
                Err(ConfigError::OutsideUnitInterval {
                    name: "discount_factor",
                    value: discount_factor
                })
            );
        }
    }

    #[test]
    fn critic_fits_immediate_reward() {
        tch::manual_seed(2);
        let config = DdpgConfig {
            discount_factor: 0.0,
            actor_steps_per_update: 0,
            ..DdpgConfig::default()
        };
        let mut evaluator = DdpgEvaluator::new(3, &bounds(), &config).unwrap();
        let batch = constant_batch(32, [1.0, 0.0, 0.0], 1.0);
        let first = evaluator.update(&batch).unwrap().critic_loss;
        let mut last = first;
        for _ in 0..300 {
            last = evaluator.update(&batch).unwrap().critic_loss;
        }
        assert!(last < first * 0.1, "{} -> {}", first, last);
        assert!((evaluator.estimate_value(&[1.0, 0.0, 0.0]) - 1.0).abs() < 0.1);
    }

    #[rstest]
    fn wrong_state_dim(mut evaluator: DdpgEvaluator) {
        let batch = TransitionBatch {
            states: Array2::zeros((4, 2)),
            rewards: Array1::zeros(4),
            next_states: Array2::zeros((4, 2)),
            indices: vec![0; 4],
        };
        assert_eq!(
            evaluator.update(&batch),
            Err(UpdateError::BatchShape {
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn invalid_target_rate() {
        let config = DdpgConfig {
            target_rate: 0.0,
            ..DdpgConfig::default()
        };
        assert!(matches!(
            DdpgEvaluator::new(3, &bounds(), &config),
            Err(BuildEvaluatorError::Config(ConfigError::InvalidRate { .. }))
        ));
    }

    #[test]
    fn checkpoint_restores_policy() {
        let dir = TempDir::new().unwrap();
        let checkpointer = Checkpointer::new(dir.path());
        let state = [0.3, -0.2, 1.0];

        tch::manual_seed(3);
        let saved = DdpgEvaluator::new(3, &bounds(), &DdpgConfig::default()).unwrap();
        checkpointer.save(&saved, "DdpgModel", 42).unwrap();

        tch::manual_seed(4);
        let mut restored = DdpgEvaluator::new(3, &bounds(), &DdpgConfig::default()).unwrap();
        let handle = restored.policy();
        assert_ne!(
            handle.select_action(&state),
            saved.policy().select_action(&state)
        );
        let outcome = checkpointer.load(&mut restored).unwrap();
        assert!(outcome.restored);
        assert_eq!(outcome.step, 42);
        // Handles taken before loading see the restored parameters
        assert_eq!(
            handle.select_action(&state),
            saved.policy().select_action(&state)
        );
    }
}
