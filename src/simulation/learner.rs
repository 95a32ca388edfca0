use super::metrics::{Metric, MetricsSender};
use crate::buffers::{SampleRange, StoreError, TransitionStore};
use crate::coord::Coordinator;
use crate::exploration::ExplorationSchedule;
use crate::policy::{PolicyEvaluator, UpdateError};
use rand::Rng;
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LearnerError {
    #[error("error sampling transitions")]
    Store(#[from] StoreError),
    #[error("update failed at step {step}")]
    Update {
        step: u64,
        #[source]
        source: UpdateError,
    },
}

/// Repeatedly samples batches from the store and updates the evaluator.
#[derive(Debug)]
pub struct Learner<'a, T, R> {
    pub evaluator: T,
    pub batch_size: usize,
    /// Number of updates to run before requesting stop.
    pub num_iterations: u64,
    pub sample_range: SampleRange,
    /// Step counter value to resume from.
    pub start_step: u64,
    pub schedule: &'a ExplorationSchedule,
    pub metrics: Option<MetricsSender>,
    pub rng: R,
}

impl<'a, T, R> Learner<'a, T, R>
where
    T: PolicyEvaluator,
    R: Rng,
{
    /// Run updates until `num_iterations` are done or stop is requested.
    ///
    /// Returns the final step counter.
    /// Stop is always requested when this returns so that the producer winds down too.
    pub fn run(&mut self, store: &TransitionStore, coord: &Coordinator) -> Result<u64, LearnerError> {
        let _guard = coord.stop_on_drop();
        let mut counter = self.start_step;
        let start = Instant::now();
        for _ in 0..self.num_iterations {
            if coord.should_stop() {
                log::info!("learner stopping early at step {}", counter);
                break;
            }
            let batch = store.sample_from(self.sample_range, self.batch_size, &mut self.rng)?;
            let stats = self
                .evaluator
                .update(&batch)
                .map_err(|source| LearnerError::Update {
                    step: counter,
                    source,
                })?;
            counter += 1;

            if self.schedule.note_step(counter) {
                let variance = self.schedule.variance();
                log::debug!(
                    "step {}, exploration variance {:.4}, critic loss {:.4}",
                    counter,
                    variance,
                    stats.critic_loss
                );
                if let Some(metrics) = &self.metrics {
                    metrics.send(Metric::Update {
                        step: counter,
                        variance,
                        stats,
                    });
                }
            }
        }
        log::info!(
            "learner finished at step {} after {:.1?}",
            counter,
            start.elapsed()
        );
        Ok(counter)
    }
}
