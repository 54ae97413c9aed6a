//! Run-level errors
//!
//! Faults raised by test code never show up here; they are recorded as
//! results. Only conditions that stop a run as a whole are errors.

use thiserror::Error;

/// Errors that end a test run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("Test run already in progress")]
    RunInProgress,

    #[error("Test run cancelled")]
    Cancelled,

    #[error("Test worker failed: {0}")]
    Worker(String),
}
