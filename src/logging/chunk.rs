use super::{Id, LogError, Loggable, StatsLogger};
use crate::utils::stats::OnlineMeanVariance;
use std::collections::{btree_map::Entry, BTreeMap};
use std::time::{Duration, Instant};

/// Decides when the current chunk of summaries is flushed.
pub trait Chunker: Send {
    /// A group is starting. Return `true` to flush before it.
    #[inline]
    fn flush_group_start(&mut self) -> bool {
        false
    }

    /// Observe a value as it is logged.
    #[inline]
    fn note_log(&mut self, _id: &Id, _value: &Loggable) {}

    /// Observe the summary that the value just logged with `note_log` was merged into.
    #[inline]
    fn note_log_summary(&mut self, _summary: &ChunkSummary) {}

    /// A group has ended. Return `true` to flush after it.
    #[inline]
    fn flush_group_end(&mut self) -> bool {
        false
    }

    /// The current chunk was flushed.
    fn note_flush(&mut self);
}

/// Backend that receives the summaries of a finished chunk.
pub trait SummaryWriter: Send {
    fn write_summaries<'a, I>(&mut self, summaries: I, elapsed: Duration)
    where
        I: Iterator<Item = (&'a Id, &'a ChunkSummary)>;
}

/// Summarizes logged values over chunks of the time series.
///
/// A [`Chunker`] decides where chunks end and a [`SummaryWriter`] consumes the summaries.
/// Only ids that received a value during the chunk are written.
#[derive(Debug)]
pub struct ChunkLogger<C: Chunker, W: SummaryWriter> {
    chunker: C,
    writer: W,
    // Sorted so that writers see ids in a stable order
    summaries: BTreeMap<Id, Slot>,
    chunk_start: Instant,
}

#[derive(Debug)]
struct Slot {
    summary: ChunkSummary,
    updated: bool,
}

impl<C: Chunker, W: SummaryWriter> ChunkLogger<C, W> {
    pub fn new(chunker: C, writer: W) -> Self {
        Self {
            chunker,
            writer,
            summaries: BTreeMap::new(),
            chunk_start: Instant::now(),
        }
    }
}

impl<C: Chunker, W: SummaryWriter> StatsLogger for ChunkLogger<C, W> {
    fn group_start(&mut self) {
        if self.chunker.flush_group_start() {
            self.flush();
        }
    }

    fn group_log(&mut self, id: Id, value: Loggable) -> Result<(), LogError> {
        self.chunker.note_log(&id, &value);
        let slot = match self.summaries.entry(id) {
            Entry::Vacant(e) => e.insert(Slot {
                summary: value.into(),
                updated: true,
            }),
            Entry::Occupied(e) => {
                let slot = e.into_mut();
                slot.summary.push(value)?;
                slot.updated = true;
                slot
            }
        };
        self.chunker.note_log_summary(&slot.summary);
        Ok(())
    }

    fn group_end(&mut self) {
        if self.chunker.flush_group_end() {
            self.flush();
        }
    }

    fn flush(&mut self) {
        let updated = self
            .summaries
            .iter()
            .filter(|(_, slot)| slot.updated)
            .map(|(id, slot)| (id, &slot.summary));
        self.writer
            .write_summaries(updated, self.chunk_start.elapsed());

        for slot in self.summaries.values_mut() {
            slot.updated = false;
            slot.summary.reset();
        }
        self.chunk_start = Instant::now();
        self.chunker.note_flush();
    }
}

impl<C: Chunker, W: SummaryWriter> Drop for ChunkLogger<C, W> {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Aggregate of the values logged to one id within a chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkSummary {
    Nothing,
    /// Counter value at the start of the chunk and the increment within the chunk.
    Counter { initial_value: u64, increment: u64 },
    /// Statistics of durations in seconds.
    Duration { stats: OnlineMeanVariance<f64> },
    Scalar { stats: OnlineMeanVariance<f64> },
}

impl From<Loggable> for ChunkSummary {
    fn from(value: Loggable) -> Self {
        match value {
            Loggable::Nothing => Self::Nothing,
            Loggable::CounterIncrement(increment) => Self::Counter {
                initial_value: 0,
                increment,
            },
            Loggable::Duration(d) => Self::Duration {
                stats: std::iter::once(d.as_secs_f64()).collect(),
            },
            Loggable::Scalar(v) => Self::Scalar {
                stats: std::iter::once(v).collect(),
            },
        }
    }
}

impl ChunkSummary {
    /// Merge a value into the summary.
    ///
    /// Fails without modifying the summary if the value is a different variant than the one
    /// the summary was created from.
    fn push(&mut self, value: Loggable) -> Result<(), LogError> {
        match (self, value) {
            (Self::Nothing, Loggable::Nothing) => {}
            (Self::Counter { increment, .. }, Loggable::CounterIncrement(i)) => *increment += i,
            (Self::Duration { stats }, Loggable::Duration(d)) => stats.push(d.as_secs_f64()),
            (Self::Scalar { stats }, Loggable::Scalar(v)) => stats.push(v),
            (summary, value) => {
                return Err(LogError::IncompatibleValue {
                    prev: summary.loggable_variant_name(),
                    now: value.variant_name(),
                })
            }
        }
        Ok(())
    }

    /// Prepare for the next chunk. Counters carry their total forward.
    fn reset(&mut self) {
        match self {
            Self::Nothing => {}
            Self::Counter {
                initial_value,
                increment,
            } => {
                *initial_value += *increment;
                *increment = 0;
            }
            Self::Duration { stats } | Self::Scalar { stats } => *stats = OnlineMeanVariance::new(),
        }
    }

    const fn loggable_variant_name(&self) -> &'static str {
        match self {
            Self::Nothing => "Nothing",
            Self::Counter { .. } => "CounterIncrement",
            Self::Duration { .. } => "Duration",
            Self::Scalar { .. } => "Scalar",
        }
    }
}
