//! Mutable run state owned by the experiment orchestrator

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progress and bookkeeping of a single training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Completed epochs
    pub epoch: usize,

    /// Completed optimisation steps across all epochs
    pub global_step: u64,

    /// Best (lowest) monitored validation metric so far
    pub best_validation_metric: Option<f64>,

    /// Step of the last successfully written periodic checkpoint
    pub last_checkpoint_step: u64,

    /// Step at which a periodic checkpoint was last attempted
    pub last_checkpoint_attempt_step: Option<u64>,

    /// Wall-clock time of the last successful checkpoint
    pub last_checkpoint_time: Option<DateTime<Utc>>,

    /// Run-relative time of the last validation pass (run start if none yet)
    pub last_validation_elapsed: Duration,

    /// Wall-clock time of the last validation pass
    pub last_validation_time: Option<DateTime<Utc>>,

    /// Whether an early-stopping plateau has been signalled
    pub plateau_signalled: bool,

    /// Plateau detector progress, carried across resumes
    #[serde(default)]
    pub plateau_progress: PlateauProgress,

    /// Current learning rate
    pub current_lr: f64,

    /// Run start
    pub start_time: DateTime<Utc>,

    /// Status of the run
    pub status: TrainingStatus,
}

/// Best value seen by the plateau detector and the passes since
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlateauProgress {
    pub best: Option<f64>,
    pub passes_since_best: usize,
}

/// Training status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingStatus {
    NotStarted,
    Running,
    Completed,
    EarlyStopped,
    Failed { error: String },
}

impl RunState {
    /// Fresh state for a new run
    pub fn new() -> Self {
        Self {
            epoch: 0,
            global_step: 0,
            best_validation_metric: None,
            last_checkpoint_step: 0,
            last_checkpoint_attempt_step: None,
            last_checkpoint_time: None,
            last_validation_elapsed: Duration::ZERO,
            last_validation_time: None,
            plateau_signalled: false,
            plateau_progress: PlateauProgress::default(),
            current_lr: 0.0,
            start_time: Utc::now(),
            status: TrainingStatus::NotStarted,
        }
    }

    /// Record a validation metric, returning whether it is a new best
    pub fn record_validation_metric(&mut self, value: f64) -> bool {
        let improved = match self.best_validation_metric {
            None => true,
            Some(best) => value < best,
        };
        if improved {
            self.best_validation_metric = Some(value);
        }
        improved
    }

    /// Training progress as a percentage of the epoch budget
    pub fn progress_percentage(&self, total_epochs: usize) -> f64 {
        if total_epochs == 0 {
            0.0
        } else {
            (self.epoch as f64 / total_epochs as f64) * 100.0
        }
    }

    /// State restored from a checkpoint, with run-relative timers reset for the new process
    pub fn resumed(mut self) -> Self {
        self.last_validation_elapsed = Duration::ZERO;
        self.last_checkpoint_attempt_step = None;
        self.plateau_signalled = false;
        self.status = TrainingStatus::NotStarted;
        self
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
