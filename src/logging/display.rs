//! Console logger
use super::chunk::{ChunkLogger, ChunkSummary, Chunker, SummaryWriter};
use super::{ByTime, Id, LogError, Loggable, StatsLogger};
use std::fmt;
use std::time::Duration;
use yansi::Paint;

/// Logger that prints chunk summaries to standard output.
#[derive(Debug)]
pub struct DisplayLogger<C: Chunker = ByTime>(ChunkLogger<C, DisplayBackend>);

impl<C: Chunker> DisplayLogger<C> {
    #[inline]
    pub fn new(chunker: C) -> Self {
        Self(ChunkLogger::new(chunker, DisplayBackend))
    }
}

impl Default for DisplayLogger {
    fn default() -> Self {
        Self::new(ByTime::default())
    }
}

impl<C: Chunker> StatsLogger for DisplayLogger<C> {
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

/// Summary backend that prints to standard output.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DisplayBackend;

impl SummaryWriter for DisplayBackend {
    fn write_summaries<'a, I>(&mut self, summaries: I, elapsed: Duration)
    where
        I: Iterator<Item = (&'a Id, &'a ChunkSummary)>,
    {
        println!();
        for (id, summary) in summaries {
            println!(
                "{:<24} {}",
                Paint::fixed(35, id),
                DisplaySummary { summary, elapsed }
            );
        }
    }
}

struct DisplaySummary<'a> {
    summary: &'a ChunkSummary,
    elapsed: Duration,
}

impl fmt::Display for DisplaySummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.summary {
            ChunkSummary::Nothing => Ok(()),
            ChunkSummary::Counter {
                initial_value,
                increment,
            } => {
                write!(
                    f,
                    "{}  (+{})",
                    initial_value + increment,
                    Paint::fixed(253, increment)
                )?;
                // Rate is only meaningful with several increments in the chunk
                if *increment > 5 {
                    #[allow(clippy::cast_precision_loss)]
                    let rate = *increment as f64 / self.elapsed.as_secs_f64();
                    write!(f, "  {}", Paint::fixed(111, format!("{:.2} it/s", rate)))?;
                }
                Ok(())
            }
            ChunkSummary::Duration { stats } => {
                if let Some(mean) = stats.mean() {
                    write!(f, "{}", Seconds(mean))?;
                    if let (true, Some(stddev)) = (stats.count() > 1, stats.stddev()) {
                        write!(f, " {}", Paint::fixed(8, format!("(σ {})", Seconds(stddev))))?;
                    }
                    let share = mean / self.elapsed.as_secs_f64() * 100.0;
                    write!(f, " {}", Paint::fixed(221, format!("{:.2}%", share)))?;
                }
                Ok(())
            }
            ChunkSummary::Scalar { stats } => {
                if let Some(mean) = stats.mean() {
                    write!(f, "{:.4}", mean)?;
                    if let (true, Some(stddev)) = (stats.count() > 1, stats.stddev()) {
                        write!(f, " {}", Paint::fixed(8, format!("(σ {:.4})", stddev)))?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// Format seconds with a unit suited to the magnitude.
struct Seconds(f64);

impl fmt::Display for Seconds {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = self.0;
        if s >= 1.0 {
            write!(f, "{:.3}s", s)
        } else if s >= 1e-3 {
            write!(f, "{:.3}ms", s * 1e3)
        } else {
            write!(f, "{:.3}µs", s * 1e6)
        }
    }
}
