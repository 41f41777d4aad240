//! Error taxonomy of the workflow engine.

use serde::Serialize;
use thiserror::Error;

use crate::workflow::Step;

/// Errors surfaced by the workflow.
///
/// Service failures never abort the workflow; they become notices and the
/// current step is kept. Guard rejections leave the state untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Transition rejected: {0}")]
    GuardRejected(Guard),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            WorkflowError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            WorkflowError::GuardRejected(_) => ErrorKind::GuardRejected,
        }
    }

    pub fn is_guard(&self) -> bool {
        matches!(self, WorkflowError::GuardRejected(_))
    }
}

impl From<Guard> for WorkflowError {
    fn from(guard: Guard) -> Self {
        WorkflowError::GuardRejected(guard)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ServiceUnavailable,
    MalformedResponse,
    GuardRejected,
}

/// The guard a rejected command failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// A service call sequence is already in flight
    #[error("a service call is in flight")]
    Busy,

    /// Prompt is empty after trimming
    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("no agent selected")]
    NoAgentSelected,

    #[error("unknown agent '{0}'")]
    UnknownAgent(String),

    /// Pre-analysis rated the prompt critical
    #[error("risk level is critical")]
    CriticalRisk,

    /// Pre-analysis result is not available yet
    #[error("no pre-analysis result")]
    MissingAnalysis,

    /// Command is not legal in this step
    #[error("'{command}' is not allowed in step {step}")]
    WrongStep {
        command: &'static str,
        step: Step,
    },
}
