//! Experiment orchestrator
//!
//! Drives the external training loop: for every step it asks the schedule
//! for a learning rate, delegates the step to the framework, advances the
//! clock and then consults the checkpoint, validation and stop controllers in
//! that order. Checkpoint and validation failures are logged and the run
//! carries on; a failing training step ends the run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{Configuration, WarmStart};
use crate::error::{Error, Result};
use crate::training::checkpoints::{
    load_checkpoint, CheckpointController, CheckpointKind, CheckpointManager, TrainingCheckpoint,
};
use crate::training::clock::{Clock, TrainingClock};
use crate::training::framework::{StepContext, TrainingFramework};
use crate::training::loss::LossParameters;
use crate::training::schedulers::{Scheduler, WarmupDecaySchedule, WarmupDecayScheduler};
use crate::training::state::{RunState, TrainingStatus};
use crate::training::stopping::{PlateauDetector, StopController, StopReason};
use crate::training::validation::ValidationCadence;

/// Training events for monitoring
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingEvent {
    EpochStarted { epoch: usize },
    EpochCompleted { epoch: usize, global_step: u64 },
    StepCompleted { step: u64, loss: f64, lr: f64 },
    ValidationCompleted { step: u64, metric: String, value: f64, improved: bool },
    ValidationFailed { step: u64, error: String },
    CheckpointSaved { step: u64, path: PathBuf },
    CheckpointFailed { step: u64, error: String },
    EarlyStopping { reason: String },
    TrainingCompleted { total_steps: u64 },
    Error { error: String },
}

/// Training result information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingResult {
    /// Run state at completion
    pub final_state: RunState,

    /// Why the run stopped, if it stopped normally
    pub stop_reason: Option<StopReason>,

    /// Path to the best-validation checkpoint
    pub best_checkpoint_path: Option<PathBuf>,

    /// Path to the last periodic checkpoint written
    pub last_checkpoint_path: Option<PathBuf>,

    /// Training duration
    pub training_duration: Duration,

    /// Total training steps
    pub total_steps: u64,

    /// Whether training completed successfully
    pub success: bool,

    /// Error message if training failed
    pub error_message: Option<String>,
}

/// Owns run state and wires the controllers around a [`TrainingFramework`]
pub struct ExperimentOrchestrator<F: TrainingFramework> {
    config: Configuration,
    framework: F,
    scheduler: WarmupDecayScheduler,
    clock: TrainingClock,
    checkpoints: CheckpointController,
    validation: ValidationCadence,
    stopping: StopController,
    plateau: PlateauDetector,
    checkpoint_manager: CheckpointManager,
    loss: LossParameters,
    warm_start: WarmStart,
    state: RunState,
    best_checkpoint_path: Option<PathBuf>,
    last_checkpoint_path: Option<PathBuf>,
    training_node_name: String,
    event_tx: Option<mpsc::UnboundedSender<TrainingEvent>>,
}

impl<F: TrainingFramework> ExperimentOrchestrator<F> {
    /// Wire an orchestrator from a validated configuration
    pub fn new(config: Configuration, framework: F) -> Result<Self> {
        let run = config.run();
        let checkpoints = CheckpointController::new(run.checkpoint_interval)?;
        let validation = ValidationCadence::every_minutes(run.val_every_n_minutes)?;
        let stopping = StopController::new(run.max_epochs, run.stop_early);
        let plateau = PlateauDetector::from(&run.early_stopping);
        let checkpoint_manager = CheckpointManager::new(run.checkpoint_dir(), &run.experiment_name);
        let warm_start = run.warm_start.clone();

        let scheduler =
            WarmupDecayScheduler::new(WarmupDecaySchedule::from(config.training_model_parameters()));
        let loss = LossParameters::from(&config);
        let training_node_name =
            std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());

        Ok(Self {
            config,
            framework,
            scheduler,
            clock: TrainingClock::system(),
            checkpoints,
            validation,
            stopping,
            plateau,
            checkpoint_manager,
            loss,
            warm_start,
            state: RunState::new(),
            best_checkpoint_path: None,
            last_checkpoint_path: None,
            training_node_name,
            event_tx: None,
        })
    }

    /// Set up event monitoring
    pub fn with_event_monitoring(mut self, tx: mpsc::UnboundedSender<TrainingEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Measure run time with `clock` instead of the system clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = TrainingClock::start(clock);
        self
    }

    /// Resume from `path` regardless of the configured warm start
    pub fn resume_from(mut self, path: impl Into<PathBuf>) -> Self {
        self.warm_start = WarmStart::Resume(path.into());
        self
    }

    /// Run until a stop condition fires or the framework fails.
    ///
    /// Warm-start failures are returned as errors. Once the loop is running,
    /// a framework failure is reported through [`TrainingResult::success`].
    #[instrument(skip(self), fields(experiment = %self.config.run().experiment_name))]
    pub async fn run(&mut self) -> Result<TrainingResult> {
        info!("Starting experiment {}", self.config.run().experiment_name);
        self.initialize()?;

        let result = match self.run_loop().await {
            Ok(reason) => {
                self.state.status = match reason {
                    StopReason::EpochBudget => TrainingStatus::Completed,
                    StopReason::EarlyStopping => TrainingStatus::EarlyStopped,
                };
                self.result(Some(reason), None)
            }
            Err(e) => {
                let error_msg = format!("Training failed: {e}");
                error!("{}", error_msg);
                self.state.status = TrainingStatus::Failed {
                    error: error_msg.clone(),
                };
                self.send_event(TrainingEvent::Error {
                    error: error_msg.clone(),
                });
                self.result(None, Some(error_msg))
            }
        };

        info!(
            "Training finished after {} steps in {:?}",
            result.total_steps, result.training_duration
        );
        self.send_event(TrainingEvent::TrainingCompleted {
            total_steps: result.total_steps,
        });
        Ok(result)
    }

    fn result(&self, stop_reason: Option<StopReason>, error_message: Option<String>) -> TrainingResult {
        TrainingResult {
            final_state: self.state.clone(),
            stop_reason,
            best_checkpoint_path: self.best_checkpoint_path.clone(),
            last_checkpoint_path: self.last_checkpoint_path.clone(),
            training_duration: self.clock.elapsed(),
            total_steps: self.state.global_step,
            success: error_message.is_none(),
            error_message,
        }
    }

    fn initialize(&mut self) -> Result<()> {
        self.state.start_time = Utc::now();

        match self.warm_start.clone() {
            WarmStart::Fresh => debug!("Starting from freshly initialised weights"),
            WarmStart::LoadWeights(path) => {
                let checkpoint = read_checkpoint(&path)?;
                self.framework.restore(checkpoint.snapshot)?;
                info!("Loaded weights from {}", path.display());
            }
            WarmStart::Resume(path) => self.restore(&path)?,
        }

        self.scheduler.seek(self.state.global_step);
        self.state.current_lr = self.scheduler.get_lr();
        self.state.status = TrainingStatus::Running;

        info!(
            "Run configuration: {:?} model, {} epochs, checkpoint every {} steps, validation every {:?}",
            self.config.run().model_variant,
            self.config.run().max_epochs,
            self.checkpoints.interval(),
            self.validation.interval()
        );
        Ok(())
    }

    fn restore(&mut self, path: &Path) -> Result<()> {
        let checkpoint = read_checkpoint(path)?;
        if checkpoint.experiment_name != self.config.run().experiment_name {
            warn!(
                "Resuming experiment {} from a checkpoint of {}",
                self.config.run().experiment_name,
                checkpoint.experiment_name
            );
        }

        self.scheduler.load_state_dict(checkpoint.scheduler_state)?;
        self.framework.restore(checkpoint.snapshot)?;

        let state = checkpoint.run_state.resumed();
        self.clock.fast_forward(state.global_step, state.epoch)?;
        self.plateau.resume(state.plateau_progress);
        self.state = state;

        info!(
            "Resumed from {} at epoch {}, step {}",
            path.display(),
            self.state.epoch,
            self.state.global_step
        );
        Ok(())
    }

    async fn run_loop(&mut self) -> Result<StopReason> {
        let steps_per_epoch = self.framework.steps_per_epoch();
        if steps_per_epoch == 0 {
            return Err(Error::framework("framework reported an empty epoch"));
        }
        let max_epochs = self.config.run().max_epochs;

        while !self.stopping.should_stop(&self.state) {
            let epoch = self.state.epoch;
            info!("Starting epoch {}/{}", epoch + 1, max_epochs);
            self.send_event(TrainingEvent::EpochStarted { epoch });

            // A resumed run may start part way through an epoch.
            let done_in_epoch = self
                .state
                .global_step
                .saturating_sub(epoch as u64 * steps_per_epoch)
                .min(steps_per_epoch);

            for _ in done_in_epoch..steps_per_epoch {
                self.train_step().await?;
                if self.stopping.should_stop(&self.state) {
                    return self.stop_reason();
                }
            }

            self.state.epoch = self.clock.advance_epoch();
            info!(
                "Epoch {}/{} completed at step {}",
                epoch + 1,
                max_epochs,
                self.state.global_step
            );
            self.send_event(TrainingEvent::EpochCompleted {
                epoch,
                global_step: self.state.global_step,
            });
        }

        self.stop_reason()
    }

    fn stop_reason(&self) -> Result<StopReason> {
        let reason = self
            .stopping
            .reason()
            .ok_or_else(|| Error::framework("run loop ended without a stop condition"))?;
        if reason == StopReason::EarlyStopping {
            self.send_event(TrainingEvent::EarlyStopping {
                reason: format!(
                    "no improvement in {} for {} validation passes",
                    self.config.run().early_stopping.monitor,
                    self.config.run().early_stopping.patience
                ),
            });
        }
        Ok(reason)
    }

    async fn train_step(&mut self) -> Result<()> {
        let step = self.state.global_step;
        let lr = self.scheduler.get_lr();
        self.state.current_lr = lr;

        let ctx = StepContext {
            epoch: self.state.epoch,
            global_step: step,
            learning_rate: lr,
            batch_size: self.config.run().train_batch_size,
            loss: self.loss,
        };
        let output = self.framework.train_step(ctx).await?;
        let loss = self.loss.weighted_total(&output.losses);

        self.scheduler.step();
        self.state.global_step = self.clock.advance_step();

        debug!("Step {} - Loss: {:.4}, LR: {:.2e}", step, loss, lr);
        self.send_event(TrainingEvent::StepCompleted { step, loss, lr });

        self.maybe_checkpoint();
        self.maybe_validate().await;

        if self.framework.plateau_signal() {
            self.state.plateau_signalled = true;
        }
        Ok(())
    }

    fn maybe_checkpoint(&mut self) {
        if !self.checkpoints.should_checkpoint(&self.state) {
            return;
        }
        let step = self.state.global_step;
        self.checkpoints.record_attempt(&mut self.state);

        match self.write_checkpoint(CheckpointKind::Periodic) {
            Ok(path) => {
                self.checkpoints.record_success(&mut self.state, Utc::now());
                self.last_checkpoint_path = Some(path.clone());
                self.send_event(TrainingEvent::CheckpointSaved { step, path });
            }
            Err(e) => {
                warn!("Checkpoint at step {} failed, retrying at the next interval: {}", step, e);
                self.send_event(TrainingEvent::CheckpointFailed {
                    step,
                    error: e.to_string(),
                });
            }
        }
    }

    async fn maybe_validate(&mut self) {
        let now = self.clock.elapsed();
        if !self.validation.should_validate(&self.state, now) {
            return;
        }
        self.validation.record_pass(&mut self.state, now, Utc::now());

        let step = self.state.global_step;
        let monitor = self.config.run().early_stopping.monitor.clone();
        let value = match self
            .framework
            .validate(self.state.epoch, step)
            .await
            .and_then(|report| report.monitored(&monitor))
        {
            Ok(value) => value,
            Err(e) => {
                warn!("Validation pass at step {} failed: {}", step, e);
                self.send_event(TrainingEvent::ValidationFailed {
                    step,
                    error: e.to_string(),
                });
                return;
            }
        };

        let improved = self.state.record_validation_metric(value);
        let plateau = self.plateau.observe(value);
        self.state.plateau_progress = self.plateau.progress();
        if plateau && !self.state.plateau_signalled {
            info!(
                "{} has not improved for {} validation passes",
                monitor,
                self.plateau.passes_since_best()
            );
            self.state.plateau_signalled = true;
        }

        info!(
            "Validation at step {}: {} = {:.4}{}",
            step,
            monitor,
            value,
            if improved { " (new best)" } else { "" }
        );
        self.send_event(TrainingEvent::ValidationCompleted {
            step,
            metric: monitor.clone(),
            value,
            improved,
        });

        if improved {
            match self.write_checkpoint(CheckpointKind::BestValidation { metric: monitor, value }) {
                Ok(path) => {
                    self.best_checkpoint_path = Some(path.clone());
                    self.send_event(TrainingEvent::CheckpointSaved { step, path });
                }
                Err(e) => {
                    warn!("Best-validation checkpoint at step {} failed: {}", step, e);
                    self.send_event(TrainingEvent::CheckpointFailed {
                        step,
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    fn write_checkpoint(&self, kind: CheckpointKind) -> Result<PathBuf> {
        let mut run_state = self.state.clone();
        if kind == CheckpointKind::Periodic {
            run_state.last_checkpoint_step = run_state.global_step;
            run_state.last_checkpoint_time = Some(Utc::now());
        }

        let checkpoint = TrainingCheckpoint {
            experiment_name: self.config.run().experiment_name.clone(),
            kind,
            epoch: self.state.epoch,
            global_step: self.state.global_step,
            snapshot: self.framework.snapshot()?,
            scheduler_state: self.scheduler.state_dict(),
            run_state,
            config: self.config.source().clone(),
            training_node_name: self.training_node_name.clone(),
            timestamp: Utc::now(),
        };
        self.checkpoint_manager.save_checkpoint(&checkpoint)
    }

    /// Send training event
    fn send_event(&self, event: TrainingEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    /// Current run state
    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn framework(&self) -> &F {
        &self.framework
    }

    pub fn checkpoint_manager(&self) -> &CheckpointManager {
        &self.checkpoint_manager
    }
}

fn read_checkpoint(path: &Path) -> Result<TrainingCheckpoint> {
    load_checkpoint(path).map_err(|e| {
        Error::Other(anyhow::Error::new(e).context(format!(
            "failed to load checkpoint {}",
            path.display()
        )))
    })
}
