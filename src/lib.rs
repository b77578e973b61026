//! motion-pretrain - run control for motion-policy pretraining
//!
//! This crate resolves a pretraining experiment configuration and drives the
//! control loop around an external training framework: the learning-rate
//! schedule, step-interval checkpoints, wall-clock validation and the stop
//! conditions.
//!
//! ```rust,ignore
//! use motion_pretrain::{Configuration, ExperimentOrchestrator, SyntheticFramework};
//!
//! let config = Configuration::from_file("configs/pretrain.yaml")?
//!     .with_overrides([("max_epochs", "2")])?;
//! let framework = SyntheticFramework::new(100, config.run().seed);
//! let result = ExperimentOrchestrator::new(config, framework)?.run().await?;
//! ```

#![warn(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod error;
pub mod logging;
pub mod training;

// Re-exports
pub use config::{Configuration, ConfigurationBuilder, ModelVariant, PcBounds, WarmStart};
pub use error::{Error, Result};
pub use training::{
    ExperimentOrchestrator, RunState, SyntheticFramework, TrainingEvent, TrainingFramework,
    TrainingResult,
};
