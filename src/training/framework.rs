//! Seam to the external training framework
//!
//! The orchestrator owns run control; the framework owns the model, the data
//! pipeline and the loss mathematics. [`SyntheticFramework`] stands in for a
//! real one in dry runs.

use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::DEFAULT_MONITOR_METRIC;
use crate::error::{Error, Result};
use crate::training::checkpoints::ModelSnapshot;
use crate::training::clock::ManualClock;
use crate::training::loss::{LossComponents, LossParameters};
use crate::training::validation::ValidationReport;

/// Inputs for one optimisation step
#[derive(Debug, Clone, PartialEq)]
pub struct StepContext {
    /// Epoch the step belongs to
    pub epoch: usize,
    /// 0-based index of the step being executed
    pub global_step: u64,
    /// Learning rate for this step
    pub learning_rate: f64,
    /// Training batch size
    pub batch_size: usize,
    /// Loss weights and bounds
    pub loss: LossParameters,
}

/// Result of one optimisation step
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepOutput {
    /// Unweighted loss terms
    pub losses: LossComponents,
}

/// External training framework driven by the orchestrator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrainingFramework: Send {
    /// Optimisation steps in one pass over the training data
    fn steps_per_epoch(&self) -> u64;

    /// Run one optimisation step
    async fn train_step(&mut self, ctx: StepContext) -> Result<StepOutput>;

    /// Run a validation pass over the validation split
    async fn validate(&mut self, epoch: usize, global_step: u64) -> Result<ValidationReport>;

    /// Capture model and optimizer state for a checkpoint
    fn snapshot(&self) -> Result<ModelSnapshot>;

    /// Restore model and optimizer state from a checkpoint
    fn restore(&mut self, snapshot: ModelSnapshot) -> Result<()>;

    /// Whether the framework itself reports a metric plateau
    fn plateau_signal(&self) -> bool;
}

/// Deterministic stand-in framework with smoothly decaying losses
#[derive(Debug, Clone)]
pub struct SyntheticFramework {
    steps_per_epoch: u64,
    rng: StdRng,
    steps_taken: u64,
    step_time: Option<(ManualClock, Duration)>,
}

impl SyntheticFramework {
    pub fn new(steps_per_epoch: u64, seed: u64) -> Self {
        Self {
            steps_per_epoch,
            rng: StdRng::seed_from_u64(seed),
            steps_taken: 0,
            step_time: None,
        }
    }

    /// Advance `clock` by `per_step` on every training step
    pub fn with_step_duration(mut self, clock: ManualClock, per_step: Duration) -> Self {
        self.step_time = Some((clock, per_step));
        self
    }

    /// Steps executed, including those restored from a snapshot
    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    fn progress(&self) -> f64 {
        (-(self.steps_taken as f64) / 2_000.0).exp()
    }

    fn noise(&mut self, scale: f64) -> f64 {
        (self.rng.random::<f64>() - 0.5) * scale
    }
}

#[async_trait]
impl TrainingFramework for SyntheticFramework {
    fn steps_per_epoch(&self) -> u64 {
        self.steps_per_epoch
    }

    async fn train_step(&mut self, ctx: StepContext) -> Result<StepOutput> {
        if !ctx.learning_rate.is_finite() || ctx.learning_rate < 0.0 {
            return Err(Error::framework(format!(
                "invalid learning rate {} at step {}",
                ctx.learning_rate, ctx.global_step
            )));
        }

        self.steps_taken += 1;
        if let Some((clock, per_step)) = &self.step_time {
            clock.advance(*per_step);
        }

        let progress = self.progress();
        let losses = LossComponents {
            collision: (0.02 + 0.5 * progress + self.noise(0.01)).max(0.0),
            point_match: (0.05 + 1.5 * progress + self.noise(0.02)).max(0.0),
        };
        debug!(
            "Synthetic step {} (hard negatives: {})",
            ctx.global_step,
            ctx.loss.hard_negative_count(ctx.batch_size)
        );
        Ok(StepOutput { losses })
    }

    async fn validate(&mut self, _epoch: usize, _global_step: u64) -> Result<ValidationReport> {
        let progress = self.progress();
        let collision_rate = (0.01 + 0.4 * progress + self.noise(0.005)).clamp(0.0, 1.0);
        Ok(ValidationReport::single(DEFAULT_MONITOR_METRIC, collision_rate)
            .with_metric("avg_val_success_rate", 1.0 - collision_rate))
    }

    fn snapshot(&self) -> Result<ModelSnapshot> {
        Ok(ModelSnapshot {
            model_state: self.steps_taken.to_le_bytes().to_vec(),
            optimizer_state: Vec::new(),
        })
    }

    fn restore(&mut self, snapshot: ModelSnapshot) -> Result<()> {
        let bytes: [u8; 8] = snapshot
            .model_state
            .as_slice()
            .try_into()
            .map_err(|_| Error::framework("snapshot was not produced by the synthetic framework"))?;
        self.steps_taken = u64::from_le_bytes(bytes);
        Ok(())
    }

    fn plateau_signal(&self) -> bool {
        false
    }
}
