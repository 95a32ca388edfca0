//! Asynchronous deep deterministic policy gradient.
//!
//! A producer thread rolls out a noisy deterministic policy and writes transitions into a
//! fixed-capacity [`TransitionStore`]. A learner thread samples batches from the store
//! and updates an actor-critic [`PolicyEvaluator`] whose target networks track the online
//! networks by exponential moving average. See [`train_async`].
#![warn(clippy::cast_lossless)]
#![warn(clippy::cast_possible_truncation)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::for_kv_map)] // part of warn(clippy::all), specifically style?
#![warn(clippy::missing_const_for_fn)] // has some false positives
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::redundant_closure_for_method_calls)]
#![warn(clippy::use_self)] // also triggered by macro expansions
pub mod buffers;
pub mod checkpoint;
pub mod coord;
pub mod envs;
mod error;
pub mod exploration;
pub mod logging;
pub mod policy;
pub mod simulation;
pub mod smoothing;
pub mod spaces;
pub mod torch;
pub mod utils;

pub use buffers::{Transition, TransitionBatch, TransitionStore};
pub use checkpoint::Checkpointer;
pub use coord::Coordinator;
pub use envs::{Environment, Pendulum};
pub use error::{ConfigError, TrainError};
pub use exploration::{ExplorationConfig, ExplorationSchedule};
pub use policy::{Policy, PolicyEvaluator};
pub use simulation::{train_async, TrainConfig, TrainSummary};
pub use smoothing::Smoothed;

/// Pseudo-random number generator type used by producers and learners.
pub type Prng = rand_chacha::ChaCha8Rng;
