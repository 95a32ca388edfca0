//! Tensorboard logger
use super::chunk::{ChunkLogger, ChunkSummary, Chunker, SummaryWriter};
use super::{ByTime, Id, LogError, Loggable, StatsLogger};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tensorboard_rs::summary_writer::SummaryWriter as TbSummaryWriter;

/// Logger that writes chunk summaries as tensorboard scalars.
#[derive(Debug)]
pub struct TensorBoardLogger<C: Chunker = ByTime>(ChunkLogger<C, TensorBoardBackend>);

impl<C: Chunker> TensorBoardLogger<C> {
    #[inline]
    pub fn new<P: AsRef<Path>>(chunker: C, log_dir: P) -> Self {
        Self(ChunkLogger::new(chunker, TensorBoardBackend::new(log_dir)))
    }
}

impl<C: Chunker> StatsLogger for TensorBoardLogger<C> {
    #[inline]
    fn group_start(&mut self) {
        self.0.group_start()
    }
    #[inline]
    fn group_log(&mut self, id: Id, value: Loggable) -> Result<(), LogError> {
        self.0.group_log(id, value)
    }
    #[inline]
    fn group_end(&mut self) {
        self.0.group_end()
    }
    #[inline]
    fn flush(&mut self) {
        self.0.flush()
    }
}

/// Summary backend that writes a tensorboard event file.
///
/// Each flushed chunk is one tensorboard step.
pub struct TensorBoardBackend {
    writer: TbSummaryWriter,
    log_dir: PathBuf,
    chunk_index: usize,
}

impl fmt::Debug for TensorBoardBackend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TensorBoardBackend")
            .field("log_dir", &self.log_dir)
            .field("chunk_index", &self.chunk_index)
            .finish()
    }
}

impl TensorBoardBackend {
    pub fn new<P: AsRef<Path>>(log_dir: P) -> Self {
        let log_dir = log_dir.as_ref().to_path_buf();
        Self {
            writer: TbSummaryWriter::new(&log_dir),
            log_dir,
            chunk_index: 0,
        }
    }
}

impl SummaryWriter for TensorBoardBackend {
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn write_summaries<'a, I>(&mut self, summaries: I, _: Duration)
    where
        I: Iterator<Item = (&'a Id, &'a ChunkSummary)>,
    {
        for (id, summary) in summaries {
            let value = match summary {
                ChunkSummary::Counter {
                    initial_value,
                    increment,
                } => Some((initial_value + increment) as f32),
                ChunkSummary::Duration { stats } | ChunkSummary::Scalar { stats } => {
                    stats.mean().map(|mean| mean as f32)
                }
                ChunkSummary::Nothing => None,
            };
            if let Some(value) = value {
                self.writer
                    .add_scalar(&id.to_string(), value, self.chunk_index);
            }
        }
        self.chunk_index += 1;
        self.writer.flush();
    }
}
