//! Tests for checkpoint persistence

use anyhow::Result;
use chrono::Utc;

use crate::config::Configuration;
use crate::error::Error;
use crate::training::checkpoints::{
    load_checkpoint, CheckpointKind, CheckpointManager, ModelSnapshot, TrainingCheckpoint,
};
use crate::training::schedulers::{Scheduler, WarmupDecaySchedule, WarmupDecayScheduler};
use crate::training::state::RunState;

use super::test_utils::EXAMPLE_CONFIG;

fn checkpoint_at(step: u64, kind: CheckpointKind) -> Result<TrainingCheckpoint> {
    let config = Configuration::from_yaml_str(EXAMPLE_CONFIG)?;
    let mut scheduler =
        WarmupDecayScheduler::new(WarmupDecaySchedule::from(config.training_model_parameters()));
    scheduler.seek(step);

    let run_state = RunState {
        global_step: step,
        epoch: (step / 100) as usize,
        ..RunState::new()
    };
    Ok(TrainingCheckpoint {
        experiment_name: config.run().experiment_name.clone(),
        kind,
        epoch: run_state.epoch,
        global_step: step,
        snapshot: ModelSnapshot {
            model_state: vec![1, 2, 3, 4, 5],
            optimizer_state: vec![6, 7, 8, 9],
        },
        scheduler_state: scheduler.state_dict(),
        run_state,
        config: config.source().clone(),
        training_node_name: "node-0".to_string(),
        timestamp: Utc::now(),
    })
}

#[test]
fn test_checkpoint_save_load() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let manager = CheckpointManager::new(temp_dir.path().join("run"), "pretrain-baseline");

    let checkpoint = checkpoint_at(120, CheckpointKind::Periodic)?;
    let path = manager.save_checkpoint(&checkpoint)?;

    assert_eq!(path, manager.periodic_path(120));
    assert!(path.ends_with("pretrain-baseline-step120.ckpt"));

    let loaded = manager.load_checkpoint(&path)?;
    assert_eq!(loaded.kind, CheckpointKind::Periodic);
    assert_eq!(loaded.global_step, 120);
    assert_eq!(loaded.epoch, 1);
    assert_eq!(loaded.snapshot, checkpoint.snapshot);
    assert_eq!(loaded.run_state.global_step, 120);
    assert_eq!(loaded.scheduler_state.scheduler_type, "warmup_decay");
    assert_eq!(loaded.scheduler_state.step_count, 120);
    assert_eq!(loaded.config.experiment_name, "pretrain-baseline");
    assert_eq!(loaded.training_node_name, "node-0");
    Ok(())
}

#[test]
fn test_no_temporary_files_left_behind() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let manager = CheckpointManager::new(temp_dir.path(), "pretrain-baseline");
    manager.save_checkpoint(&checkpoint_at(60, CheckpointKind::Periodic)?)?;
    manager.save_checkpoint(&checkpoint_at(60, CheckpointKind::Periodic)?)?;

    let mut names = Vec::new();
    for entry in std::fs::read_dir(temp_dir.path())? {
        names.push(entry?.file_name().to_string_lossy().to_string());
    }
    assert_eq!(names, vec!["pretrain-baseline-step60.ckpt".to_string()]);
    Ok(())
}

#[test]
fn test_best_validation_file_name() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let manager = CheckpointManager::new(temp_dir.path(), "pretrain-baseline");
    let kind = CheckpointKind::BestValidation {
        metric: "avg_val_collision_rate".to_string(),
        value: 0.123456,
    };

    let path = manager.save_checkpoint(&checkpoint_at(300, kind)?)?;
    assert_eq!(
        path.file_name().and_then(|n| n.to_str()),
        Some("bestval-epoch=3-step=300-avg_val_collision_rate=0.1235.ckpt")
    );
    Ok(())
}

#[test]
fn test_list_and_latest() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let manager = CheckpointManager::new(temp_dir.path(), "pretrain-baseline");
    assert!(manager.latest_checkpoint()?.is_none());

    for step in [180, 60, 120] {
        manager.save_checkpoint(&checkpoint_at(step, CheckpointKind::Periodic)?)?;
    }
    manager.save_checkpoint(&checkpoint_at(
        200,
        CheckpointKind::BestValidation {
            metric: "avg_val_collision_rate".to_string(),
            value: 0.1,
        },
    )?)?;
    // Foreign and corrupt files are skipped.
    std::fs::write(temp_dir.path().join("notes.txt"), "hello")?;
    std::fs::write(temp_dir.path().join("broken.ckpt"), "{")?;

    let steps: Vec<u64> = manager
        .list_checkpoints()?
        .into_iter()
        .map(|info| info.global_step)
        .collect();
    assert_eq!(steps, vec![60, 120, 180, 200]);

    let latest = manager.latest_checkpoint()?.expect("periodic checkpoint present");
    assert_eq!(latest.global_step, 180);
    assert_eq!(latest.path, manager.periodic_path(180));
    Ok(())
}

#[test]
fn test_missing_directory_lists_nothing() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let manager = CheckpointManager::new(temp_dir.path().join("never-created"), "x");
    assert!(manager.list_checkpoints()?.is_empty());
    Ok(())
}

#[test]
fn test_unwritable_directory_reports_checkpoint_write() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let blocked = temp_dir.path().join("blocked");
    std::fs::write(&blocked, "file, not a directory")?;

    let manager = CheckpointManager::new(blocked.join("run"), "pretrain-baseline");
    let err = manager
        .save_checkpoint(&checkpoint_at(60, CheckpointKind::Periodic)?)
        .unwrap_err();

    assert!(err.is_recoverable());
    match err {
        Error::CheckpointWrite { path, .. } => assert_eq!(path, manager.periodic_path(60)),
        other => panic!("expected CheckpointWrite, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_load_missing_file_fails() {
    let err = load_checkpoint("/definitely/not/here.ckpt").unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
