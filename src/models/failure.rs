//! Failure details for recorded results
//!
//! Converts errors and panics raised by user steps into the message/trace pair
//! that a result carries.

use std::any::Any;
use thiserror::Error;

/// Structured failure that controls exactly what a result reports.
///
/// Return this (wrapped in `anyhow::Error`) from a step to override the default
/// message and trace derived from the error chain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct FailureDetails {
    pub message: String,
    pub stack_trace: Option<String>,
}

impl FailureDetails {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack_trace: None,
        }
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }
}

/// Message and trace reported for a failed step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFault {
    pub message: String,
    pub stack_trace: Option<String>,
}

impl StepFault {
    /// Build from an error returned by a step.
    pub fn from_error(error: &anyhow::Error) -> Self {
        if let Some(details) = error.downcast_ref::<FailureDetails>() {
            return Self {
                message: details.message.clone(),
                stack_trace: details.stack_trace.clone(),
            };
        }

        let causes: Vec<String> = error
            .chain()
            .skip(1)
            .map(|cause| format!("caused by: {cause}"))
            .collect();

        Self {
            message: error.to_string(),
            stack_trace: if causes.is_empty() {
                None
            } else {
                Some(causes.join("\n"))
            },
        }
    }

    /// Build from a caught panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "step panicked with a non-string payload".to_string()
        };

        Self {
            message: format!("panicked: {message}"),
            stack_trace: None,
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.message = format!("{prefix}{}", self.message);
        self
    }
}
