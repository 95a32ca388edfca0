//! Producer and learner loops and the asynchronous training driver.
mod learner;
mod metrics;
mod producer;
mod train;

pub use learner::{Learner, LearnerError};
pub use metrics::{metrics_channel, update_chunker, Metric, MetricsReceiver, MetricsSender};
pub use producer::{Producer, ProducerError, ProducerSummary, RewardTransform};
pub use train::{train_async, TrainConfig, TrainSummary};
