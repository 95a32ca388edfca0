use super::chunk::{ChunkSummary, Chunker};
use super::{Id, Loggable};

/// Ends a chunk whenever a counter reaches a multiple of `interval`.
///
/// The flush happens at the end of the group that contains the counter increment,
/// so values logged alongside the increment land in the same chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ByCounter {
    /// Counter that drives the chunking.
    pub counter: Id,
    /// Chunk length measured in counter units.
    pub interval: u64,
    pending: Pending,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
enum Pending {
    Nothing,
    CounterLogged,
    Flush,
}

impl ByCounter {
    pub const fn new(counter: Id, interval: u64) -> Self {
        Self {
            counter,
            interval,
            pending: Pending::Nothing,
        }
    }

    pub fn of_path<T: IntoIterator<Item = &'static str>>(path: T, interval: u64) -> Self {
        Self::new(path.into_iter().collect(), interval)
    }
}

impl Chunker for ByCounter {
    #[inline]
    fn note_log(&mut self, id: &Id, _: &Loggable) {
        if self.pending == Pending::Nothing && id == &self.counter {
            self.pending = Pending::CounterLogged;
        }
    }

    #[inline]
    fn note_log_summary(&mut self, summary: &ChunkSummary) {
        if self.pending != Pending::CounterLogged {
            return;
        }
        self.pending = match summary {
            ChunkSummary::Counter {
                initial_value,
                increment,
            } if self.interval > 0 && (initial_value + increment) % self.interval == 0 => {
                Pending::Flush
            }
            ChunkSummary::Counter { .. } => Pending::Nothing,
            _ => {
                log::warn!("chunk counter {} is not a counter", self.counter);
                Pending::Nothing
            }
        };
    }

    #[inline]
    fn flush_group_end(&mut self) -> bool {
        self.pending == Pending::Flush
    }

    #[inline]
    fn note_flush(&mut self) {
        self.pending = Pending::Nothing;
    }
}

#[cfg(test)]
mod tests {
    use super::super::chunk::tests::RecordingWriter;
    use super::super::{ChunkLogger, StatsLogger};
    use super::*;

    #[test]
    fn flushes_on_counter_multiple() {
        let writer = RecordingWriter::default();
        let mut logger = ChunkLogger::new(ByCounter::new("step".into(), 3), writer.clone());
        for i in 0..7 {
            logger.group_start();
            logger.group_log("loss".into(), Loggable::Scalar(f64::from(i))).unwrap();
            logger.group_log("step".into(), Loggable::CounterIncrement(1)).unwrap();
            logger.group_end();
        }
        assert_eq!(writer.chunks.lock().unwrap().len(), 2);
        drop(logger);
        assert_eq!(writer.chunks.lock().unwrap().len(), 3);
    }
}
