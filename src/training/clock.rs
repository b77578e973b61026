//! Training clock: step, epoch and wall-clock progress since run start

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Source of monotonic time
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for deterministic runs
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

/// Progress counters consulted by every cadence controller
pub struct TrainingClock {
    clock: Arc<dyn Clock>,
    start: Instant,
    steps: u64,
    epochs: usize,
}

impl TrainingClock {
    /// Start a clock at the current instant of `clock`
    pub fn start(clock: Arc<dyn Clock>) -> Self {
        let start = clock.now();
        Self {
            clock,
            start,
            steps: 0,
            epochs: 0,
        }
    }

    /// Start a clock on the system wall clock
    pub fn system() -> Self {
        Self::start(Arc::new(SystemClock))
    }

    /// Record one completed optimisation step
    pub fn advance_step(&mut self) -> u64 {
        self.steps += 1;
        self.steps
    }

    /// Record one completed epoch
    pub fn advance_epoch(&mut self) -> usize {
        self.epochs += 1;
        self.epochs
    }

    /// Jump the counters forward, e.g. when resuming from a checkpoint
    pub fn fast_forward(&mut self, steps: u64, epochs: usize) -> Result<()> {
        if steps < self.steps || epochs < self.epochs {
            return Err(Error::validation(format!(
                "training clock cannot move backwards (at step {}, epoch {}; asked for step {steps}, epoch {epochs})",
                self.steps, self.epochs
            )));
        }
        self.steps = steps;
        self.epochs = epochs;
        Ok(())
    }

    /// Completed steps
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Completed epochs
    pub fn epochs(&self) -> usize {
        self.epochs
    }

    /// Wall-clock time since the run started
    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.start)
    }
}

impl std::fmt::Debug for TrainingClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainingClock")
            .field("steps", &self.steps)
            .field("epochs", &self.epochs)
            .field("elapsed", &self.elapsed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_advance() {
        let mut clock = TrainingClock::start(Arc::new(ManualClock::new()));
        assert_eq!(clock.advance_step(), 1);
        assert_eq!(clock.advance_step(), 2);
        assert_eq!(clock.advance_epoch(), 1);
        assert_eq!(clock.steps(), 2);
        assert_eq!(clock.epochs(), 1);
    }

    #[test]
    fn test_elapsed_follows_manual_time() {
        let time = ManualClock::new();
        let clock = TrainingClock::start(Arc::new(time.clone()));
        assert_eq!(clock.elapsed(), Duration::ZERO);

        time.advance(Duration::from_secs(90));
        assert_eq!(clock.elapsed(), Duration::from_secs(90));
    }

    #[test]
    fn test_fast_forward_is_monotonic() {
        let mut clock = TrainingClock::start(Arc::new(ManualClock::new()));
        clock.fast_forward(600, 3).unwrap();
        assert_eq!(clock.steps(), 600);
        assert!(clock.fast_forward(599, 3).is_err());
        assert!(clock.fast_forward(600, 2).is_err());
        assert_eq!(clock.epochs(), 3);
    }
}
