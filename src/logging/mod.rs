//! Logging training statistics
//!
//! Statistics are logged under hierarchical [`Id`]s to a [`StatsLogger`].
//! Loggers aggregate values into chunk summaries (see [`ChunkLogger`]) that are written out to
//! a backend: the console ([`DisplayLogger`]) or a tensorboard file ([`TensorBoardLogger`]).
//!
//! Diagnostics that are not time-series statistics go through the [`log`] facade instead.
mod chunk;
mod chunk_by_counter;
mod chunk_by_time;
mod display;
mod tensorboard;

pub use chunk::{ChunkLogger, ChunkSummary, Chunker, SummaryWriter};
pub use chunk_by_counter::ByCounter;
pub use chunk_by_time::ByTime;
pub use display::{DisplayBackend, DisplayLogger};
pub use tensorboard::{TensorBoardBackend, TensorBoardLogger};

use std::fmt;
use std::iter::FromIterator;
use std::time::Duration;
use thiserror::Error;

/// Hierarchical identifier of a logged value.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id {
    path: Vec<&'static str>,
}

impl Id {
    /// Identifier consisting of a single name.
    pub fn new(name: &'static str) -> Self {
        Self { path: vec![name] }
    }

    /// Prepend a scope to this identifier.
    #[must_use]
    pub fn with_prefix(mut self, scope: &'static str) -> Self {
        self.path.insert(0, scope);
        self
    }

    /// Path components, outermost scope first.
    pub fn path(&self) -> &[&'static str] {
        &self.path
    }
}

impl FromIterator<&'static str> for Id {
    fn from_iter<I: IntoIterator<Item = &'static str>>(iter: I) -> Self {
        Self {
            path: iter.into_iter().collect(),
        }
    }
}

impl From<&'static str> for Id {
    fn from(name: &'static str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut parts = self.path.iter();
        if let Some(first) = parts.next() {
            f.write_str(first)?;
        }
        for part in parts {
            write!(f, "/{}", part)?;
        }
        Ok(())
    }
}

/// A value that can be logged.
#[derive(Debug, Clone, PartialEq)]
pub enum Loggable {
    /// Nothing. No data to log.
    Nothing,
    /// Increment a counter by the given amount.
    CounterIncrement(u64),
    /// A time duration. Aggregate by taking means.
    Duration(Duration),
    /// A scalar value. Aggregate by taking means.
    Scalar(f64),
}

impl Loggable {
    pub const fn variant_name(&self) -> &'static str {
        match self {
            Self::Nothing => "Nothing",
            Self::CounterIncrement(_) => "CounterIncrement",
            Self::Duration(_) => "Duration",
            Self::Scalar(_) => "Scalar",
        }
    }
}

impl From<f64> for Loggable {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<f32> for Loggable {
    fn from(value: f32) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<Duration> for Loggable {
    fn from(value: Duration) -> Self {
        Self::Duration(value)
    }
}

/// Error logging a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    #[error("incompatible value type; previously {prev} now {now}")]
    IncompatibleValue {
        prev: &'static str,
        now: &'static str,
    },
}

/// Log time series statistics.
///
/// Values logged within a single group (between [`group_start`] and [`group_end`]) are
/// guaranteed to land in the same summary chunk.
///
/// [`group_start`]: StatsLogger::group_start
/// [`group_end`]: StatsLogger::group_end
pub trait StatsLogger {
    /// Start a group of logs.
    fn group_start(&mut self);

    /// Log a value within the current group.
    fn group_log(&mut self, id: Id, value: Loggable) -> Result<(), LogError>;

    /// End the current group.
    fn group_end(&mut self);

    /// Write out any aggregated summaries.
    fn flush(&mut self);

    /// Log a single value as its own group.
    fn log(&mut self, id: Id, value: Loggable) -> Result<(), LogError> {
        self.group_start();
        let result = self.group_log(id, value);
        self.group_end();
        result
    }

    /// Log a scalar value as its own group.
    ///
    /// Incompatible values are reported as warnings rather than errors.
    fn log_scalar(&mut self, name: &'static str, value: f64) {
        self.log(name.into(), Loggable::Scalar(value))
            .unwrap_or_else(|err| log::warn!("error logging {}: {}", name, err));
    }

    /// Log a counter increment as its own group.
    fn log_counter_increment(&mut self, name: &'static str, increment: u64) {
        self.log(name.into(), Loggable::CounterIncrement(increment))
            .unwrap_or_else(|err| log::warn!("error logging {}: {}", name, err));
    }

    /// Log a duration as its own group.
    fn log_duration(&mut self, name: &'static str, duration: Duration) {
        self.log(name.into(), Loggable::Duration(duration))
            .unwrap_or_else(|err| log::warn!("error logging {}: {}", name, err));
    }

    /// Wrap this logger so that all ids are prefixed by `scope`.
    fn with_scope(&mut self, scope: &'static str) -> ScopedLogger<Self>
    where
        Self: Sized,
    {
        ScopedLogger::new(self, scope)
    }
}

/// Logger that does nothing
impl StatsLogger for () {
    fn group_start(&mut self) {}
    fn group_log(&mut self, _: Id, _: Loggable) -> Result<(), LogError> {
        Ok(())
    }
    fn group_end(&mut self) {}
    fn flush(&mut self) {}
}

impl<L: StatsLogger + ?Sized> StatsLogger for &'_ mut L {
    #[inline]
    fn group_start(&mut self) {
        L::group_start(self)
    }
    #[inline]
    fn group_log(&mut self, id: Id, value: Loggable) -> Result<(), LogError> {
        L::group_log(self, id, value)
    }
    #[inline]
    fn group_end(&mut self) {
        L::group_end(self)
    }
    #[inline]
    fn flush(&mut self) {
        L::flush(self)
    }
}

impl<L: StatsLogger + ?Sized> StatsLogger for Box<L> {
    #[inline]
    fn group_start(&mut self) {
        L::group_start(self)
    }
    #[inline]
    fn group_log(&mut self, id: Id, value: Loggable) -> Result<(), LogError> {
        L::group_log(self, id, value)
    }
    #[inline]
    fn group_end(&mut self) {
        L::group_end(self)
    }
    #[inline]
    fn flush(&mut self) {
        L::flush(self)
    }
}

/// Log to both loggers of a pair.
impl<A: StatsLogger, B: StatsLogger> StatsLogger for (A, B) {
    fn group_start(&mut self) {
        self.0.group_start();
        self.1.group_start();
    }
    fn group_log(&mut self, id: Id, value: Loggable) -> Result<(), LogError> {
        let r1 = self.0.group_log(id.clone(), value.clone());
        let r2 = self.1.group_log(id, value);
        r1.and(r2)
    }
    fn group_end(&mut self) {
        self.0.group_end();
        self.1.group_end();
    }
    fn flush(&mut self) {
        self.0.flush();
        self.1.flush();
    }
}

/// Logger wrapper that prefixes all ids with a scope.
#[derive(Debug)]
pub struct ScopedLogger<'a, L: ?Sized> {
    logger: &'a mut L,
    scope: &'static str,
}

impl<'a, L: ?Sized> ScopedLogger<'a, L> {
    pub fn new(logger: &'a mut L, scope: &'static str) -> Self {
        Self { logger, scope }
    }
}

impl<'a, L: StatsLogger + ?Sized> StatsLogger for ScopedLogger<'a, L> {
    #[inline]
    fn group_start(&mut self) {
        self.logger.group_start()
    }
    #[inline]
    fn group_log(&mut self, id: Id, value: Loggable) -> Result<(), LogError> {
        self.logger.group_log(id.with_prefix(self.scope), value)
    }
    #[inline]
    fn group_end(&mut self) {
        self.logger.group_end()
    }
    #[inline]
    fn flush(&mut self) {
        self.logger.flush()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{MockLogCall, MockLogger};
    use super::*;

    #[test]
    fn id_display_joins_path() {
        let id: Id = ["learner", "critic_loss"].into_iter().collect();
        assert_eq!(id.to_string(), "learner/critic_loss");
    }

    #[test]
    fn scoped_logger_prefixes_ids() {
        let mut logger = MockLogger::default();
        logger.with_scope("learner").log_scalar("loss", 1.5);
        assert_eq!(
            logger.calls,
            vec![
                MockLogCall::GroupStart,
                MockLogCall::Log {
                    id: ["learner", "loss"].into_iter().collect(),
                    value: Loggable::Scalar(1.5)
                },
                MockLogCall::GroupEnd,
            ]
        );
    }

    #[test]
    fn pair_logs_to_both() {
        let mut pair = (MockLogger::default(), MockLogger::default());
        pair.log_counter_increment("count", 2);
        pair.flush();
        assert_eq!(pair.0.calls, pair.1.calls);
        assert_eq!(pair.0.calls.last(), Some(&MockLogCall::Flush));
    }
}
