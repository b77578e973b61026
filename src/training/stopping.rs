//! Stop conditions: epoch budget and opt-in early stopping

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::EarlyStoppingParameters;
use crate::training::state::{PlateauProgress, RunState};

/// Stop controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopState {
    Running,
    Stopped(StopReason),
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `max_epochs` reached
    EpochBudget,
    /// Plateau signalled with `stop_early` enabled
    EarlyStopping,
}

/// One-shot `Running -> Stopped` state machine
#[derive(Debug, Clone)]
pub struct StopController {
    max_epochs: usize,
    stop_early: bool,
    state: StopState,
}

impl StopController {
    pub fn new(max_epochs: usize, stop_early: bool) -> Self {
        Self {
            max_epochs,
            stop_early,
            state: StopState::Running,
        }
    }

    /// Current state
    pub fn state(&self) -> StopState {
        self.state
    }

    /// Reason for stopping, if stopped
    pub fn reason(&self) -> Option<StopReason> {
        match self.state {
            StopState::Running => None,
            StopState::Stopped(reason) => Some(reason),
        }
    }

    /// Evaluate the stop conditions. Once stopped, always stopped.
    pub fn should_stop(&mut self, run: &RunState) -> bool {
        if let StopState::Stopped(_) = self.state {
            return true;
        }

        if run.epoch >= self.max_epochs {
            info!("Epoch budget of {} exhausted", self.max_epochs);
            self.state = StopState::Stopped(StopReason::EpochBudget);
        } else if self.stop_early && run.plateau_signalled {
            info!("Early stopping at epoch {}, step {}", run.epoch, run.global_step);
            self.state = StopState::Stopped(StopReason::EarlyStopping);
        }

        matches!(self.state, StopState::Stopped(_))
    }
}

/// Raises the early-stopping signal when the monitored metric stops improving
#[derive(Debug, Clone)]
pub struct PlateauDetector {
    patience: usize,
    min_delta: f64,
    progress: PlateauProgress,
}

impl PlateauDetector {
    pub fn new(patience: usize, min_delta: f64) -> Self {
        Self {
            patience,
            min_delta,
            progress: PlateauProgress::default(),
        }
    }

    /// Continue from progress recorded before a resume
    pub fn resume(&mut self, progress: PlateauProgress) {
        self.progress = progress;
    }

    pub fn progress(&self) -> PlateauProgress {
        self.progress
    }

    /// Record a validation metric (lower is better) and report whether a plateau is reached
    pub fn observe(&mut self, value: f64) -> bool {
        let improved = match self.progress.best {
            None => true,
            Some(best) => value < best - self.min_delta,
        };

        if improved {
            self.progress.best = Some(value);
            self.progress.passes_since_best = 0;
        } else {
            self.progress.passes_since_best += 1;
        }
        self.is_plateau()
    }

    /// Whether `patience` passes have gone by without improvement
    pub fn is_plateau(&self) -> bool {
        self.progress.passes_since_best >= self.patience
    }

    pub fn passes_since_best(&self) -> usize {
        self.progress.passes_since_best
    }
}

impl From<&EarlyStoppingParameters> for PlateauDetector {
    fn from(params: &EarlyStoppingParameters) -> Self {
        Self::new(params.patience, params.min_delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_epoch(epoch: usize, plateau: bool) -> RunState {
        RunState {
            epoch,
            plateau_signalled: plateau,
            ..RunState::new()
        }
    }

    #[test]
    fn test_epoch_budget_always_enforced() {
        for stop_early in [false, true] {
            let mut controller = StopController::new(100, stop_early);
            assert!(!controller.should_stop(&at_epoch(99, false)));
            assert!(controller.should_stop(&at_epoch(100, false)));
            assert_eq!(controller.reason(), Some(StopReason::EpochBudget));
        }
    }

    #[test]
    fn test_plateau_ignored_without_stop_early() {
        let mut controller = StopController::new(100, false);
        for epoch in 0..100 {
            assert!(!controller.should_stop(&at_epoch(epoch, true)), "stopped at {epoch}");
        }
        assert!(controller.should_stop(&at_epoch(100, true)));
    }

    #[test]
    fn test_plateau_stops_when_opted_in() {
        let mut controller = StopController::new(100, true);
        assert!(!controller.should_stop(&at_epoch(3, false)));
        assert!(controller.should_stop(&at_epoch(3, true)));
        assert_eq!(controller.reason(), Some(StopReason::EarlyStopping));
    }

    #[test]
    fn test_stopped_is_terminal() {
        let mut controller = StopController::new(2, true);
        assert!(controller.should_stop(&at_epoch(0, true)));
        assert!(controller.should_stop(&at_epoch(0, false)));
        assert_eq!(controller.state(), StopState::Stopped(StopReason::EarlyStopping));
    }

    #[test]
    fn test_plateau_detector_patience() {
        let mut detector = PlateauDetector::new(3, 0.01);
        assert!(!detector.observe(0.50));
        assert!(!detector.observe(0.45));
        // Improvements smaller than min_delta do not count.
        assert!(!detector.observe(0.445));
        assert!(!detector.observe(0.46));
        assert!(detector.observe(0.449));
        assert_eq!(detector.passes_since_best(), 3);

        assert!(!detector.observe(0.30));
        assert!(!detector.is_plateau());
    }

    #[test]
    fn test_plateau_detector_resumes_progress() {
        let mut detector = PlateauDetector::new(3, 0.0);
        detector.observe(0.2);
        detector.observe(0.3);

        let mut resumed = PlateauDetector::new(3, 0.0);
        resumed.resume(detector.progress());
        assert_eq!(resumed.passes_since_best(), 1);
        // Worse than the carried best, so not an improvement.
        assert!(!resumed.observe(0.25));
        assert!(resumed.observe(0.2));
    }
}
