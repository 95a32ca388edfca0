//! Cooperative shutdown shared by the producer and learner threads.
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared stop flag.
///
/// Both loops poll [`Coordinator::should_stop`] at their natural boundaries
/// (episode start for the producer, every iteration for the learner).
/// Nothing is ever preempted.
#[derive(Debug, Default)]
pub struct Coordinator {
    stop: AtomicBool,
}

impl Coordinator {
    pub const fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
        }
    }

    /// Ask every loop to stop. Idempotent.
    pub fn request_stop(&self) {
        if !self.stop.swap(true, Ordering::AcqRel) {
            log::debug!("stop requested");
        }
    }

    #[inline]
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Guard that requests stop when dropped, including during a panic unwind.
    pub const fn stop_on_drop(&self) -> StopGuard {
        StopGuard { coord: self }
    }
}

/// Requests stop on its [`Coordinator`] when dropped.
#[derive(Debug)]
pub struct StopGuard<'a> {
    coord: &'a Coordinator,
}

impl Drop for StopGuard<'_> {
    fn drop(&mut self) {
        self.coord.request_stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_stop_is_idempotent() {
        let coord = Coordinator::new();
        assert!(!coord.should_stop());
        coord.request_stop();
        coord.request_stop();
        assert!(coord.should_stop());
    }

    #[test]
    fn guard_stops_on_panic() {
        let coord = Coordinator::new();
        let result = crossbeam::scope(|s| {
            s.spawn(|_| {
                let _guard = coord.stop_on_drop();
                panic!("loop failed");
            });
        });
        assert!(result.is_err());
        assert!(coord.should_stop());
    }
}
