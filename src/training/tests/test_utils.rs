//! Common utilities for testing run control

use std::path::Path;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::config::Configuration;
use crate::training::trainer::TrainingEvent;

/// The example experiment shipped with the crate
pub const EXAMPLE_CONFIG: &str = include_str!("../../../configs/pretrain.yaml");

/// Example experiment writing checkpoints under `save_dir`, with overrides applied
pub fn create_test_config(save_dir: &Path, overrides: &[(&str, &str)]) -> Result<Configuration> {
    let config = Configuration::from_yaml_str(EXAMPLE_CONFIG)?
        .to_builder()
        .save_checkpoint_dir(save_dir)
        .build()?;
    Ok(config.with_overrides(overrides.iter().copied())?)
}

/// Drain every event sent so far
pub fn drain_events(rx: &mut mpsc::UnboundedReceiver<TrainingEvent>) -> Vec<TrainingEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Steps at which periodic or best-validation checkpoints were saved
pub fn saved_checkpoint_steps(events: &[TrainingEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|event| match event {
            TrainingEvent::CheckpointSaved { step, .. } => Some(*step),
            _ => None,
        })
        .collect()
}

/// Steps at which a validation pass produced a metric
pub fn validation_steps(events: &[TrainingEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|event| match event {
            TrainingEvent::ValidationCompleted { step, .. } => Some(*step),
            _ => None,
        })
        .collect()
}

/// Assert that no metric reported by a validation pass is NaN or infinite
pub fn assert_metrics_valid(events: &[TrainingEvent]) {
    for event in events {
        if let TrainingEvent::ValidationCompleted { metric, value, .. } = event {
            assert!(value.is_finite(), "Metric {} is not finite", metric);
        }
    }
}

/// Install a test subscriber so `RUST_LOG` works under `cargo test`
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
