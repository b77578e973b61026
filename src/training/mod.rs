//! Training-loop control for motion-policy pretraining
//!
//! The model, data pipeline and loss mathematics belong to an external
//! training framework reached through [`TrainingFramework`]. This module
//! decides everything around it: the learning rate of each step, when to
//! checkpoint, when to validate and when to stop.
//!
//! # Main Components
//!
//! - **Schedulers**: warmup/decay learning-rate schedule
//! - **Clock**: step, epoch and wall-clock progress
//! - **Checkpoints**: step-interval cadence and checkpoint files
//! - **Validation**: wall-clock validation cadence
//! - **Stopping**: epoch budget and opt-in early stopping
//! - **Trainer**: the orchestrator wiring it all together
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use motion_pretrain::config::Configuration;
//! use motion_pretrain::training::{ExperimentOrchestrator, SyntheticFramework};
//!
//! let config = Configuration::from_file("configs/pretrain.yaml")?;
//! let framework = SyntheticFramework::new(100, config.run().seed);
//! let mut orchestrator = ExperimentOrchestrator::new(config, framework)?;
//! let result = orchestrator.run().await?;
//! ```

pub mod checkpoints;
pub mod clock;
pub mod framework;
pub mod loss;
pub mod schedulers;
pub mod state;
pub mod stopping;
pub mod trainer;
pub mod validation;

// Tests module
#[cfg(test)]
mod tests;

pub use checkpoints::{
    CheckpointController, CheckpointInfo, CheckpointKind, CheckpointManager, ModelSnapshot,
    TrainingCheckpoint,
};
pub use clock::{Clock, ManualClock, SystemClock, TrainingClock};
pub use framework::{StepContext, StepOutput, SyntheticFramework, TrainingFramework};
pub use loss::{LossComponents, LossParameters};
pub use schedulers::{Scheduler, SchedulerStateDict, WarmupDecaySchedule, WarmupDecayScheduler};
pub use state::{PlateauProgress, RunState, TrainingStatus};
pub use stopping::{PlateauDetector, StopController, StopReason, StopState};
pub use trainer::{ExperimentOrchestrator, TrainingEvent, TrainingResult};
pub use validation::{ValidationCadence, ValidationReport};
