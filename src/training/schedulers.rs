//! Learning rate schedule for pretraining
//!
//! Linear warmup from zero to `max_lr`, then either a constant plateau or a
//! per-step exponential decay floored at `min_lr`. The schedule is a pure
//! function of the step; [`WarmupDecayScheduler`] only adds a step counter
//! so it can sit behind the [`Scheduler`] trait and be checkpointed.

use serde::{Deserialize, Serialize};

use crate::config::TrainingModelParameters;
use crate::error::{Error, Result};

/// Parameters of the warmup/decay schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarmupDecaySchedule {
    /// Learning-rate floor after warmup
    pub min_lr: f64,
    /// Peak learning rate
    pub max_lr: f64,
    /// Linear warmup length in steps
    pub warmup_steps: u64,
    /// Per-step decay factor after warmup, `None` for a constant plateau
    pub decay_rate: Option<f64>,
}

impl WarmupDecaySchedule {
    /// Create a schedule
    pub fn new(min_lr: f64, max_lr: f64, warmup_steps: u64, decay_rate: Option<f64>) -> Self {
        Self {
            min_lr,
            max_lr,
            warmup_steps,
            decay_rate,
        }
    }

    /// Learning rate for a 0-based optimisation step
    pub fn learning_rate(&self, step: u64) -> f64 {
        if step < self.warmup_steps {
            // Linear warmup
            return self.max_lr * (step as f64 / self.warmup_steps as f64);
        }

        match self.decay_rate {
            Some(rate) => {
                let decay_steps = (step - self.warmup_steps) as f64;
                (self.max_lr * rate.powf(decay_steps))
                    .max(self.min_lr)
                    .min(self.max_lr)
            }
            None => self.max_lr,
        }
    }

    /// Whether the schedule has settled on its final value at `step`
    pub fn is_settled(&self, step: u64) -> bool {
        step >= self.warmup_steps
            && (self.decay_rate.is_none() || self.learning_rate(step) <= self.min_lr)
    }
}

impl From<&TrainingModelParameters> for WarmupDecaySchedule {
    fn from(params: &TrainingModelParameters) -> Self {
        Self::new(
            params.min_lr,
            params.max_lr,
            params.warmup_steps,
            params.decay_rate,
        )
    }
}

/// Learning rate scheduler interface used by the orchestrator
pub trait Scheduler {
    /// Scheduler name
    fn name(&self) -> &str;

    /// Advance one optimisation step
    fn step(&mut self);

    /// Learning rate for the step about to run
    fn get_lr(&self) -> f64;

    /// Steps taken so far
    fn step_count(&self) -> u64;

    /// Scheduler state for checkpointing
    fn state_dict(&self) -> SchedulerStateDict;

    /// Restore state from a checkpoint
    fn load_state_dict(&mut self, state: SchedulerStateDict) -> Result<()>;

    /// Reset to step 0
    fn reset(&mut self);
}

/// Serializable scheduler state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerStateDict {
    /// Scheduler type name
    pub scheduler_type: String,
    /// Step count at save time
    pub step_count: u64,
    /// Learning rate at save time
    pub current_lr: f64,
}

/// Stateful wrapper around [`WarmupDecaySchedule`]
#[derive(Debug, Clone)]
pub struct WarmupDecayScheduler {
    schedule: WarmupDecaySchedule,
    current_step: u64,
}

impl WarmupDecayScheduler {
    /// Create a scheduler positioned at step 0
    pub fn new(schedule: WarmupDecaySchedule) -> Self {
        Self {
            schedule,
            current_step: 0,
        }
    }

    /// Position the scheduler at an arbitrary step
    pub fn seek(&mut self, step: u64) {
        self.current_step = step;
    }

    /// The underlying pure schedule
    pub fn schedule(&self) -> &WarmupDecaySchedule {
        &self.schedule
    }
}

impl Scheduler for WarmupDecayScheduler {
    fn name(&self) -> &str {
        "warmup_decay"
    }

    fn step(&mut self) {
        self.current_step += 1;
    }

    fn get_lr(&self) -> f64 {
        self.schedule.learning_rate(self.current_step)
    }

    fn step_count(&self) -> u64 {
        self.current_step
    }

    fn state_dict(&self) -> SchedulerStateDict {
        SchedulerStateDict {
            scheduler_type: self.name().to_string(),
            step_count: self.current_step,
            current_lr: self.get_lr(),
        }
    }

    fn load_state_dict(&mut self, state: SchedulerStateDict) -> Result<()> {
        if state.scheduler_type != self.name() {
            return Err(Error::validation(format!(
                "cannot restore a `{}` scheduler from `{}` state",
                self.name(),
                state.scheduler_type
            )));
        }
        // The rate is recomputed from the current parameters, never restored.
        self.current_step = state.step_count;
        Ok(())
    }

    fn reset(&mut self) {
        self.current_step = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn pretrain_schedule(decay_rate: Option<f64>) -> WarmupDecaySchedule {
        WarmupDecaySchedule::new(1e-5, 5e-5, 5000, decay_rate)
    }

    #[test]
    fn test_warmup_reference_points() {
        let schedule = pretrain_schedule(None);
        assert_eq!(schedule.learning_rate(0), 0.0);
        assert_relative_eq!(schedule.learning_rate(2500), 2.5e-5);
        assert_relative_eq!(schedule.learning_rate(5000), 5e-5);
    }

    #[test]
    fn test_zero_warmup_starts_at_peak() {
        let schedule = WarmupDecaySchedule::new(1e-5, 5e-5, 0, None);
        assert_eq!(schedule.learning_rate(0), 5e-5);
        assert_eq!(schedule.learning_rate(10), 5e-5);
    }

    #[test]
    fn test_decay_reaches_floor() {
        let schedule = pretrain_schedule(Some(0.999));
        assert_relative_eq!(schedule.learning_rate(5001), 5e-5 * 0.999);
        assert_eq!(schedule.learning_rate(5000 + 100_000), 1e-5);
        assert!(schedule.is_settled(5000 + 100_000));
        assert!(!schedule.is_settled(5001));
    }

    #[test]
    fn test_decay_rate_one_holds_peak() {
        let schedule = pretrain_schedule(Some(1.0));
        assert_eq!(schedule.learning_rate(1_000_000), 5e-5);
    }

    #[test]
    fn test_very_long_runs_do_not_underflow_below_floor() {
        let schedule = pretrain_schedule(Some(0.5));
        assert_eq!(schedule.learning_rate(u64::MAX), 1e-5);
    }

    #[test]
    fn test_scheduler_tracks_steps() {
        let mut scheduler = WarmupDecayScheduler::new(pretrain_schedule(None));
        assert_eq!(scheduler.name(), "warmup_decay");
        assert_eq!(scheduler.get_lr(), 0.0);

        for _ in 0..2500 {
            scheduler.step();
        }
        assert_relative_eq!(scheduler.get_lr(), 2.5e-5);

        let state = scheduler.state_dict();
        assert_eq!(state.step_count, 2500);

        let mut restored = WarmupDecayScheduler::new(pretrain_schedule(None));
        restored.load_state_dict(state).unwrap();
        assert_eq!(restored.step_count(), 2500);

        restored.reset();
        assert_eq!(restored.get_lr(), 0.0);
    }

    #[test]
    fn test_scheduler_rejects_foreign_state() {
        let mut scheduler = WarmupDecayScheduler::new(pretrain_schedule(None));
        let err = scheduler
            .load_state_dict(SchedulerStateDict {
                scheduler_type: "cosine".to_string(),
                step_count: 10,
                current_lr: 1e-3,
            })
            .unwrap_err();
        assert!(err.to_string().contains("cosine"));
    }

    proptest! {
        #[test]
        fn prop_warmup_is_monotone_and_below_peak(
            warmup in 1u64..20_000,
            a in 0u64..20_000,
            b in 0u64..20_000,
        ) {
            let schedule = WarmupDecaySchedule::new(1e-6, 1e-3, warmup, Some(0.99));
            let (lo, hi) = (a.min(b).min(warmup), a.max(b).min(warmup));
            prop_assert!(schedule.learning_rate(lo) <= schedule.learning_rate(hi));
            if lo < warmup {
                prop_assert!(schedule.learning_rate(lo) < schedule.learning_rate(warmup));
            }
        }

        #[test]
        fn prop_post_warmup_stays_in_band(
            warmup in 0u64..10_000,
            offset in 0u64..1_000_000,
            rate in 0.5f64..=1.0,
        ) {
            let schedule = WarmupDecaySchedule::new(1e-5, 5e-5, warmup, Some(rate));
            let lr = schedule.learning_rate(warmup + offset);
            prop_assert!(lr >= 1e-5);
            prop_assert!(lr <= 5e-5);
        }

        #[test]
        fn prop_no_decay_holds_peak(warmup in 0u64..10_000, offset in 0u64..1_000_000) {
            let schedule = WarmupDecaySchedule::new(1e-5, 5e-5, warmup, None);
            prop_assert_eq!(schedule.learning_rate(warmup + offset), 5e-5);
        }
    }
}
