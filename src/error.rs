//! Error types for experiment configuration and run control

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for motion-pretrain operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed, incomplete or out-of-range configuration. Fatal at startup.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A checkpoint could not be persisted. The run continues.
    #[error("Checkpoint write error at {path}: {source}")]
    CheckpointWrite {
        /// Target path of the failed write
        path: PathBuf,
        /// Underlying cause
        #[source]
        source: Box<Error>,
    },

    /// A validation pass failed. The run continues without a metric update.
    #[error("Validation pass error: {0}")]
    ValidationPass(String),

    /// Failure reported by the external training framework
    #[error("Training framework error: {0}")]
    Framework(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML (de)serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for motion-pretrain operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Wrap a failure that happened while writing a checkpoint
    pub fn checkpoint_write(path: impl Into<PathBuf>, source: Error) -> Self {
        Self::CheckpointWrite {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Create a validation pass error
    pub fn validation_pass(msg: impl Into<String>) -> Self {
        Self::ValidationPass(msg.into())
    }

    /// Create a training framework error
    pub fn framework(msg: impl Into<String>) -> Self {
        Self::Framework(msg.into())
    }

    /// Whether the run may continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::CheckpointWrite { .. } | Self::ValidationPass(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(!Error::validation("max_epochs missing").is_recoverable());
        assert!(Error::validation_pass("loader died").is_recoverable());
        assert!(Error::checkpoint_write(
            "/tmp/x.ckpt",
            Error::Io(std::io::Error::other("disk full"))
        )
        .is_recoverable());
        assert!(!Error::framework("nan loss").is_recoverable());
    }

    #[test]
    fn test_checkpoint_write_message_names_path() {
        let err = Error::checkpoint_write(
            "/ckpt/run-step60.ckpt",
            Error::Io(std::io::Error::other("read-only file system")),
        );
        let msg = err.to_string();
        assert!(msg.contains("/ckpt/run-step60.ckpt"));
        assert!(msg.contains("read-only"));
    }
}
