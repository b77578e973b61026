//! Checkpoint cadence and persistence
//!
//! [`CheckpointController`] decides when a periodic checkpoint is due;
//! [`CheckpointManager`] writes and reads the checkpoint files. A failed
//! write never rolls back run progress: the controller simply waits for the
//! next interval boundary.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RawConfiguration;
use crate::error::{Error, Result};
use crate::training::schedulers::SchedulerStateDict;
use crate::training::state::RunState;

/// File extension of checkpoint files
pub const CHECKPOINT_EXTENSION: &str = "ckpt";

/// Decides when periodic checkpoints are due, counted in optimisation steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointController {
    interval: u64,
}

impl CheckpointController {
    /// Create a controller firing every `interval` steps
    pub fn new(interval: u64) -> Result<Self> {
        if interval == 0 {
            return Err(Error::validation("checkpoint_interval must be > 0"));
        }
        Ok(Self { interval })
    }

    /// Step interval
    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Whether a checkpoint is due after the step just completed
    pub fn should_checkpoint(&self, state: &RunState) -> bool {
        let step = state.global_step;
        if step == 0 || step <= state.last_checkpoint_step {
            return false;
        }
        if state.last_checkpoint_attempt_step == Some(step) {
            return false;
        }
        (step - state.last_checkpoint_step) % self.interval == 0
    }

    /// Mark the current step as attempted, whatever the outcome
    pub fn record_attempt(&self, state: &mut RunState) {
        state.last_checkpoint_attempt_step = Some(state.global_step);
    }

    /// Mark the current step as persisted
    pub fn record_success(&self, state: &mut RunState, at: DateTime<Utc>) {
        state.last_checkpoint_step = state.global_step;
        state.last_checkpoint_time = Some(at);
    }
}

/// Opaque model and optimizer state produced by the training framework
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    /// Serialized model weights
    pub model_state: Vec<u8>,
    /// Serialized optimizer state
    pub optimizer_state: Vec<u8>,
}

/// Why a checkpoint was written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    /// Regular step-interval checkpoint
    Periodic,
    /// New best validation metric
    BestValidation { metric: String, value: f64 },
}

/// Everything persisted in a checkpoint file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingCheckpoint {
    pub experiment_name: String,
    pub kind: CheckpointKind,
    pub epoch: usize,
    pub global_step: u64,
    pub snapshot: ModelSnapshot,
    pub scheduler_state: SchedulerStateDict,
    pub run_state: RunState,
    pub config: RawConfiguration,
    pub training_node_name: String,
    pub timestamp: DateTime<Utc>,
}

/// Summary of a checkpoint found on disk
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointInfo {
    pub path: PathBuf,
    pub kind: CheckpointKind,
    pub epoch: usize,
    pub global_step: u64,
    pub timestamp: DateTime<Utc>,
}

/// Reads and writes checkpoint files for one experiment
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
    experiment_name: String,
}

impl CheckpointManager {
    /// Manage checkpoints under `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>, experiment_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            experiment_name: experiment_name.into(),
        }
    }

    /// Checkpoint directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the periodic checkpoint for `step`
    pub fn periodic_path(&self, step: u64) -> PathBuf {
        self.dir.join(format!(
            "{}-step{step}.{CHECKPOINT_EXTENSION}",
            self.experiment_name
        ))
    }

    /// Path of a best-validation checkpoint
    pub fn best_path(&self, epoch: usize, step: u64, metric: &str, value: f64) -> PathBuf {
        self.dir.join(format!(
            "bestval-epoch={epoch}-step={step}-{metric}={value:.4}.{CHECKPOINT_EXTENSION}"
        ))
    }

    fn path_for(&self, checkpoint: &TrainingCheckpoint) -> PathBuf {
        match &checkpoint.kind {
            CheckpointKind::Periodic => self.periodic_path(checkpoint.global_step),
            CheckpointKind::BestValidation { metric, value } => {
                self.best_path(checkpoint.epoch, checkpoint.global_step, metric, *value)
            }
        }
    }

    /// Write a checkpoint atomically, returning its path.
    ///
    /// Every failure is reported as [`Error::CheckpointWrite`].
    pub fn save_checkpoint(&self, checkpoint: &TrainingCheckpoint) -> Result<PathBuf> {
        let path = self.path_for(checkpoint);
        self.write_atomic(&path, checkpoint)
            .map_err(|e| Error::checkpoint_write(&path, e))?;

        info!(
            "Saved {:?} checkpoint at step {} to {}",
            checkpoint.kind,
            checkpoint.global_step,
            path.display()
        );
        Ok(path)
    }

    fn write_atomic(&self, path: &Path, checkpoint: &TrainingCheckpoint) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let bytes = serde_json::to_vec(checkpoint)?;

        let tmp = path.with_extension(format!("{CHECKPOINT_EXTENSION}.tmp"));
        fs::write(&tmp, bytes)?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    /// Load a checkpoint file
    pub fn load_checkpoint(&self, path: impl AsRef<Path>) -> Result<TrainingCheckpoint> {
        load_checkpoint(path)
    }

    /// All checkpoints in the directory, ordered by step
    pub fn list_checkpoints(&self) -> Result<Vec<CheckpointInfo>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CHECKPOINT_EXTENSION) {
                continue;
            }
            match load_checkpoint(&path) {
                Ok(ckpt) => found.push(CheckpointInfo {
                    path,
                    kind: ckpt.kind,
                    epoch: ckpt.epoch,
                    global_step: ckpt.global_step,
                    timestamp: ckpt.timestamp,
                }),
                Err(e) => debug!("Skipping unreadable checkpoint {}: {}", path.display(), e),
            }
        }
        found.sort_by_key(|info| info.global_step);
        Ok(found)
    }

    /// Most recent periodic checkpoint
    pub fn latest_checkpoint(&self) -> Result<Option<CheckpointInfo>> {
        Ok(self
            .list_checkpoints()?
            .into_iter()
            .rev()
            .find(|info| info.kind == CheckpointKind::Periodic))
    }
}

/// Load a checkpoint file
pub fn load_checkpoint(path: impl AsRef<Path>) -> Result<TrainingCheckpoint> {
    let bytes = fs::read(path.as_ref())?;
    Ok(serde_json::from_slice(&bytes)?)
}
