//! Test fixtures for orchestrator scenarios

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tempfile::TempDir;
use tokio::sync::mpsc;

use crate::config::Configuration;
use crate::training::checkpoints::{CheckpointManager, ModelSnapshot};
use crate::training::clock::ManualClock;
use crate::training::framework::{MockTrainingFramework, StepOutput, TrainingFramework};
use crate::training::loss::LossComponents;
use crate::training::trainer::{ExperimentOrchestrator, TrainingEvent};
use crate::training::validation::ValidationReport;

use super::test_utils::{create_test_config, setup_test_logging};

/// Simulated wall-clock time of one training step
pub const STEP_TIME: Duration = Duration::from_secs(10);

/// Small experiment in a temporary checkpoint directory, on a manual clock.
///
/// Defaults: 5 steps per epoch, 3 epochs, checkpoint every 4 steps and
/// validation every minute, i.e. every 6 steps at [`STEP_TIME`].
pub struct OrchestratorFixture {
    pub temp_dir: TempDir,
    pub clock: ManualClock,
    pub config: Configuration,
}

impl OrchestratorFixture {
    pub fn new(overrides: &[(&str, &str)]) -> Result<Self> {
        setup_test_logging();
        let temp_dir = tempfile::tempdir()?;

        let mut all = vec![
            ("max_epochs", "3"),
            ("checkpoint_interval", "4"),
            ("val_every_n_minutes", "1"),
            ("training_model_parameters.warmup_steps", "4"),
            ("experiment_name", "fixture"),
        ];
        all.extend_from_slice(overrides);
        let config = create_test_config(temp_dir.path(), &all)?;

        Ok(Self {
            temp_dir,
            clock: ManualClock::new(),
            config,
        })
    }

    /// Directory the fixture experiment writes checkpoints to
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.config.run().checkpoint_dir()
    }

    pub fn checkpoint_manager(&self) -> CheckpointManager {
        CheckpointManager::new(self.checkpoint_dir(), &self.config.run().experiment_name)
    }

    /// Mock framework whose steps advance the fixture clock and whose
    /// validation passes report `metrics` in turn, repeating the last value.
    pub fn mock_framework(&self, steps_per_epoch: u64, metrics: Vec<f64>) -> MockTrainingFramework {
        let mut mock = base_mock(steps_per_epoch);

        let clock = self.clock.clone();
        mock.expect_train_step().returning(move |_| {
            clock.advance(STEP_TIME);
            Ok(StepOutput {
                losses: LossComponents {
                    collision: 0.1,
                    point_match: 0.2,
                },
            })
        });

        let mut passes = 0usize;
        mock.expect_validate().returning(move |_, _| {
            let value = metrics
                .get(passes)
                .or(metrics.last())
                .copied()
                .unwrap_or(0.5);
            passes += 1;
            Ok(ValidationReport::single("avg_val_collision_rate", value))
        });

        mock.expect_plateau_signal().return_const(false);
        mock
    }

    /// Orchestrator over `framework` on the fixture clock, with an event channel
    pub fn orchestrator<F: TrainingFramework>(
        &self,
        config: Configuration,
        framework: F,
    ) -> Result<(ExperimentOrchestrator<F>, mpsc::UnboundedReceiver<TrainingEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let orchestrator = ExperimentOrchestrator::new(config, framework)?
            .with_clock(Arc::new(self.clock.clone()))
            .with_event_monitoring(tx);
        Ok((orchestrator, rx))
    }
}

/// Mock framework answering only the epoch length and the checkpoint calls
pub fn base_mock(steps_per_epoch: u64) -> MockTrainingFramework {
    let mut mock = MockTrainingFramework::new();
    mock.expect_steps_per_epoch().return_const(steps_per_epoch);
    mock.expect_snapshot().returning(|| {
        Ok(ModelSnapshot {
            model_state: vec![1, 2, 3],
            optimizer_state: vec![4, 5],
        })
    });
    mock.expect_restore().returning(|_| Ok(()));
    mock
}
