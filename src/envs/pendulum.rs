use super::{EnvError, EnvStep, Environment};
use crate::spaces::{BoxSpace, IntervalSpace};
use crate::Prng;
use rand::distributions::{Distribution, Uniform};
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Physical constants of the [`Pendulum`] environment.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PendulumConfig {
    /// Maximum absolute angular velocity (rad/s)
    pub max_speed: f64,
    /// Maximum absolute torque (N m)
    pub max_torque: f64,
    /// Simulation time step (s)
    pub time_step: f64,
    /// Acceleration of gravity (m/s^2)
    pub gravity: f64,
    /// Mass of the pendulum (kg)
    pub mass: f64,
    /// Length of the pendulum (m)
    pub length: f64,
}

impl Default for PendulumConfig {
    fn default() -> Self {
        // OpenAI Gym Pendulum-v0
        Self {
            max_speed: 8.0,
            max_torque: 2.0,
            time_step: 0.05,
            gravity: 10.0,
            mass: 1.0,
            length: 1.0,
        }
    }
}

/// Inverted pendulum swing-up.
///
/// A frictionless pendulum starts at a random angle and velocity;
/// the goal is to swing it up and keep it balanced upright with limited torque.
/// Observations are `[cos θ, sin θ, θ̇]` and the action is a single torque.
/// The reward is `-(θ² + 0.1 θ̇² + 0.001 u²)` with `θ` normalized to `[-π, π)`.
/// Episodes never terminate on their own.
///
/// Based on the [OpenAI Gym Pendulum-v0][gym_pendulum] environment.
///
/// [gym_pendulum]: https://github.com/openai/gym/blob/master/gym/envs/classic_control/pendulum.py
#[derive(Debug, Clone)]
pub struct Pendulum {
    config: PendulumConfig,
    rng: Prng,
    /// `(θ, θ̇)` of the active episode.
    state: Option<(f64, f64)>,
}

impl Pendulum {
    pub fn new(config: PendulumConfig, seed: u64) -> Self {
        Self {
            config,
            rng: Prng::seed_from_u64(seed),
            state: None,
        }
    }

    fn observe(theta: f64, theta_dot: f64) -> Vec<f32> {
        #[allow(clippy::cast_possible_truncation)]
        let obs = vec![theta.cos() as f32, theta.sin() as f32, theta_dot as f32];
        obs
    }
}

impl Default for Pendulum {
    fn default() -> Self {
        Self::new(PendulumConfig::default(), 1)
    }
}

/// Map an angle into `[-π, π)`.
fn angle_normalize(x: f64) -> f64 {
    (x + PI).rem_euclid(2.0 * PI) - PI
}

impl Environment for Pendulum {
    fn state_dim(&self) -> usize {
        3
    }

    #[allow(clippy::cast_possible_truncation)]
    fn action_bounds(&self) -> BoxSpace {
        let max_torque = self.config.max_torque as f32;
        BoxSpace::uniform(
            IntervalSpace {
                low: -max_torque,
                high: max_torque,
            },
            1,
        )
    }

    fn reward_range(&self) -> (f64, f64) {
        let c = &self.config;
        let max_cost = PI * PI + 0.1 * c.max_speed * c.max_speed + 0.001 * c.max_torque * c.max_torque;
        (-max_cost, 0.0)
    }

    fn reset(&mut self) -> Result<Vec<f32>, EnvError> {
        let theta = Uniform::new(-PI, PI).sample(&mut self.rng);
        let theta_dot = Uniform::new(-1.0, 1.0).sample(&mut self.rng);
        self.state = Some((theta, theta_dot));
        Ok(Self::observe(theta, theta_dot))
    }

    fn step(&mut self, action: &[f32]) -> Result<EnvStep, EnvError> {
        let (theta, theta_dot) = self.state.ok_or(EnvError::NotReset)?;
        let torque = match action {
            [u] => f64::from(*u).clamp(-self.config.max_torque, self.config.max_torque),
            _ => {
                return Err(EnvError::ActionDim {
                    expected: 1,
                    actual: action.len(),
                })
            }
        };
        if !torque.is_finite() {
            return Err(EnvError::Simulation(format!("non-finite torque {}", torque)));
        }

        let PendulumConfig {
            max_speed,
            time_step: dt,
            gravity: g,
            mass: m,
            length: l,
            ..
        } = self.config;

        let cost = angle_normalize(theta).powi(2)
            + 0.1 * theta_dot.powi(2)
            + 0.001 * torque.powi(2);

        let new_theta_dot = (theta_dot
            + (3.0 * g / (2.0 * l) * theta.sin() + 3.0 / (m * l * l) * torque) * dt)
            .clamp(-max_speed, max_speed);
        let new_theta = theta + new_theta_dot * dt;
        self.state = Some((new_theta, new_theta_dot));

        let mut info = BTreeMap::new();
        info.insert("theta", angle_normalize(new_theta));
        info.insert("torque", torque);
        Ok(EnvStep {
            next_state: Self::observe(new_theta, new_theta_dot),
            reward: -cost,
            done: false,
            info,
        })
    }

    fn render_frame(&mut self) {
        if let Some((theta, theta_dot)) = self.state {
            log::trace!(
                "pendulum θ = {:+.3}  θ̇ = {:+.3}",
                angle_normalize(theta),
                theta_dot
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn step_before_reset_fails() {
        let mut env = Pendulum::default();
        assert_eq!(env.step(&[0.0]), Err(EnvError::NotReset));
    }

    #[test]
    fn observation_on_unit_circle() {
        let mut env = Pendulum::default();
        let obs = env.reset().unwrap();
        assert_eq!(obs.len(), 3);
        assert!((obs[0].powi(2) + obs[1].powi(2) - 1.0).abs() < 1e-5);
        assert!(obs[2].abs() <= 1.0);
    }

    #[test]
    fn rewards_within_range() {
        let mut env = Pendulum::new(PendulumConfig::default(), 7);
        let (low, high) = env.reward_range();
        env.reset().unwrap();
        for i in 0..500 {
            let action = if i % 50 < 25 { 2.0 } else { -2.0 };
            let step = env.step(&[action]).unwrap();
            assert!(!step.done);
            assert!(low <= step.reward && step.reward <= high, "{}", step.reward);
            assert!(step.next_state[2].abs() <= 8.0);
        }
    }

    #[test]
    fn same_seed_same_episode() {
        let mut a = Pendulum::new(PendulumConfig::default(), 3);
        let mut b = Pendulum::new(PendulumConfig::default(), 3);
        assert_eq!(a.reset().unwrap(), b.reset().unwrap());
        assert_eq!(a.step(&[0.5]).unwrap(), b.step(&[0.5]).unwrap());
    }

    #[test]
    fn wrong_action_dim() {
        let mut env = Pendulum::default();
        env.reset().unwrap();
        assert_eq!(
            env.step(&[0.0, 1.0]),
            Err(EnvError::ActionDim {
                expected: 1,
                actual: 2
            })
        );
    }

    #[rstest]
    #[case(0.0, 0.0)]
    #[case(PI, -PI)]
    #[case(3.0 * PI / 2.0, -PI / 2.0)]
    #[case(-PI / 4.0, -PI / 4.0)]
    fn normalize(#[case] x: f64, #[case] expected: f64) {
        assert!((angle_normalize(x) - expected).abs() < 1e-12);
    }

    #[test]
    fn upright_at_rest_is_zero_cost() {
        let mut env = Pendulum::default();
        env.state = Some((0.0, 0.0));
        let step = env.step(&[0.0]).unwrap();
        assert_eq!(step.reward, 0.0);
    }
}
