//! Training metrics passed from the worker threads to the logging thread.
use crate::logging::{ByCounter, Id, LogError, Loggable, StatsLogger};
use crate::policy::UpdateStats;
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A metric record emitted by the learner or the producer.
#[derive(Debug, Clone, PartialEq)]
pub enum Metric {
    /// Learner update statistics, emitted on exploration period boundaries.
    Update {
        /// Learner step counter after the update.
        step: u64,
        /// Exploration variance after any decay at this step.
        variance: f64,
        stats: UpdateStats,
    },
    /// A finished producer episode.
    Episode {
        /// Sum of the untransformed rewards.
        total_reward: f64,
        length: u64,
    },
}

/// Create a bounded metrics channel.
pub fn metrics_channel(capacity: usize) -> (MetricsSender, MetricsReceiver) {
    let (sender, receiver) = channel::bounded(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    (
        MetricsSender {
            sender,
            dropped: Arc::clone(&dropped),
        },
        MetricsReceiver { receiver, dropped },
    )
}

/// Chunker that ends a chunk with every logged learner update.
///
/// Updates are only sent on exploration period boundaries, so each one gets its own summary
/// along with the episodes that finished since the previous update.
pub fn update_chunker() -> ByCounter {
    ByCounter::new(learner_id("step"), 1)
}

/// Non-blocking sending half of a metrics channel.
///
/// Sending never blocks the training loops: records that do not fit are dropped and
/// counted.
#[derive(Debug, Clone)]
pub struct MetricsSender {
    sender: Sender<Metric>,
    dropped: Arc<AtomicU64>,
}

impl MetricsSender {
    /// Send a metric if there is room. Returns whether it was queued.
    pub fn send(&self, metric: Metric) -> bool {
        match self.sender.try_send(metric) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                if self.dropped.fetch_add(1, Ordering::Relaxed) == 0 {
                    log::warn!("metrics channel full; dropping records");
                }
                false
            }
            // Nobody is listening anymore
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Receiving half of a metrics channel.
#[derive(Debug)]
pub struct MetricsReceiver {
    receiver: Receiver<Metric>,
    dropped: Arc<AtomicU64>,
}

impl MetricsReceiver {
    /// Number of records dropped because the channel was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Log every received metric until all senders are gone.
    ///
    /// Returns the number of metrics logged.
    pub fn drain_into<L: StatsLogger + ?Sized>(&self, logger: &mut L) -> u64 {
        let mut writer = MetricWriter::default();
        let mut count = 0;
        for metric in self.receiver.iter() {
            writer.write(&metric, logger);
            count += 1;
        }
        logger.flush();
        count
    }
}

/// Converts metrics to logger calls.
#[derive(Debug, Default)]
struct MetricWriter {
    /// Step of the last logged update; the step counter is logged as increments.
    last_step: Option<u64>,
}

impl MetricWriter {
    fn write<L: StatsLogger + ?Sized>(&mut self, metric: &Metric, logger: &mut L) {
        logger.group_start();
        let result = match metric {
            Metric::Update {
                step,
                variance,
                stats,
            } => {
                let increment = step.saturating_sub(self.last_step.unwrap_or(0));
                self.last_step = Some(*step);
                log_update(logger, increment, *variance, stats)
            }
            Metric::Episode {
                total_reward,
                length,
            } => log_episode(logger, *total_reward, *length),
        };
        logger.group_end();
        if let Err(err) = result {
            log::warn!("error logging {:?}: {}", metric, err);
        }
    }
}

fn learner_id(name: &'static str) -> Id {
    Id::new(name).with_prefix("learner")
}

fn log_update<L: StatsLogger + ?Sized>(
    logger: &mut L,
    step_increment: u64,
    variance: f64,
    stats: &UpdateStats,
) -> Result<(), LogError> {
    logger.group_log(
        learner_id("step"),
        Loggable::CounterIncrement(step_increment),
    )?;
    logger.group_log(learner_id("variance"), variance.into())?;
    logger.group_log(learner_id("critic_loss"), stats.critic_loss.into())?;
    if let Some(actor_loss) = stats.actor_loss {
        logger.group_log(learner_id("actor_loss"), actor_loss.into())?;
    }
    logger.group_log(learner_id("reward"), stats.mean_reward.into())?;
    logger.group_log(learner_id("q_mean"), stats.mean_q.into())?;
    logger.group_log(learner_id("q_min"), stats.min_q.into())?;
    logger.group_log(learner_id("q_max"), stats.max_q.into())
}

#[allow(clippy::cast_precision_loss)]
fn log_episode<L: StatsLogger + ?Sized>(
    logger: &mut L,
    total_reward: f64,
    length: u64,
) -> Result<(), LogError> {
    let id = |name| Id::new(name).with_prefix("producer");
    logger.group_log(id("episodes"), Loggable::CounterIncrement(1))?;
    logger.group_log(id("episode_reward"), total_reward.into())?;
    logger.group_log(id("episode_length"), (length as f64).into())
}
