//! Time-based validation cadence
//!
//! Validation cost depends on hardware and queue contention, so passes are
//! scheduled on elapsed wall-clock minutes rather than on step boundaries.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::training::state::RunState;

/// Decides when the next validation pass is due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationCadence {
    interval: Duration,
}

impl ValidationCadence {
    /// Validate every `minutes` minutes of wall-clock time
    pub fn every_minutes(minutes: f64) -> Result<Self> {
        if !minutes.is_finite() || minutes <= 0.0 {
            return Err(Error::validation("val_every_n_minutes must be > 0"));
        }
        let interval = Duration::try_from_secs_f64(minutes * 60.0).map_err(|e| {
            Error::validation(format!("val_every_n_minutes = {minutes} is out of range: {e}"))
        })?;
        Ok(Self { interval })
    }

    /// Cadence as a duration
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a pass is due at `now` (time elapsed since run start)
    pub fn should_validate(&self, state: &RunState, now: Duration) -> bool {
        now.saturating_sub(state.last_validation_elapsed) >= self.interval
    }

    /// Record that a pass was triggered at `now`, successful or not
    pub fn record_pass(&self, state: &mut RunState, now: Duration, at: DateTime<Utc>) {
        state.last_validation_elapsed = now;
        state.last_validation_time = Some(at);
    }
}

/// Metrics produced by one validation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Named metric values
    pub metrics: HashMap<String, f64>,
}

impl ValidationReport {
    /// Report with a single metric
    pub fn single(name: impl Into<String>, value: f64) -> Self {
        Self {
            metrics: HashMap::from([(name.into(), value)]),
        }
    }

    /// Add a metric
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    /// Look up the monitored metric. A missing or non-finite value fails the pass.
    pub fn monitored(&self, name: &str) -> Result<f64> {
        match self.metrics.get(name) {
            Some(value) if value.is_finite() => Ok(*value),
            Some(value) => Err(Error::validation_pass(format!(
                "metric `{name}` is not finite ({value})"
            ))),
            None => Err(Error::validation_pass(format!(
                "validation pass did not report `{name}`"
            ))),
        }
    }
}
