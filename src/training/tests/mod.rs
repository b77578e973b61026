//! Cross-module tests for run control
//!
//! Unit tests live next to each controller; the suites here exercise the
//! checkpoint files on disk and whole runs of the orchestrator against a
//! mocked and a synthetic framework.

mod checkpoint_tests;

// Utility modules for testing
pub mod fixtures;
pub mod test_utils;
