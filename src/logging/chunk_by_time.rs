use super::chunk::Chunker;
use coarsetime::{Duration as CDuration, Instant as CInstant};
use std::time::Duration;

/// Ends a chunk at the first group that starts after a wall-clock deadline.
///
/// The deadline moves `interval` past the time of each flush, whatever triggered it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ByTime {
    interval: CDuration,
    deadline: CInstant,
}

impl ByTime {
    pub fn new(interval: Duration) -> Self {
        let interval = CDuration::new(interval.as_secs(), interval.subsec_nanos());
        Self {
            interval,
            deadline: CInstant::now() + interval,
        }
    }
}

impl Default for ByTime {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl Chunker for ByTime {
    #[inline]
    fn flush_group_start(&mut self) -> bool {
        CInstant::now() >= self.deadline
    }

    fn note_flush(&mut self) {
        self.deadline = CInstant::now() + self.interval;
    }
}

#[cfg(test)]
mod tests {
    use super::super::chunk::tests::RecordingWriter;
    use super::super::{ChunkLogger, Loggable, StatsLogger};
    use super::*;

    fn log_groups<C: Chunker>(logger: &mut ChunkLogger<C, RecordingWriter>, n: u32) {
        for i in 0..n {
            logger.group_start();
            logger.group_log("x".into(), Loggable::Scalar(f64::from(i))).unwrap();
            logger.group_end();
        }
    }

    #[test]
    fn long_interval_keeps_one_chunk() {
        let writer = RecordingWriter::default();
        let mut logger = ChunkLogger::new(ByTime::new(Duration::from_secs(3600)), writer.clone());
        log_groups(&mut logger, 10);
        assert!(writer.chunks.lock().unwrap().is_empty());
        drop(logger);
        assert_eq!(writer.chunks.lock().unwrap().len(), 1);
    }

    #[test]
    fn zero_interval_flushes_before_each_group() {
        let writer = RecordingWriter::default();
        let mut logger = ChunkLogger::new(ByTime::new(Duration::ZERO), writer.clone());
        log_groups(&mut logger, 4);
        // The first group starts an empty chunk
        let chunks = writer.chunks.lock().unwrap();
        assert_eq!(chunks.len(), 4);
        assert!(chunks[0].is_empty());
        assert!(chunks[1..].iter().all(|chunk| chunk.len() == 1));
    }
}
