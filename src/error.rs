// src/error.rs

//! Error taxonomy for the resolver.
//!
//! Startup problems surface as [`ConfigurationError`]. Everything that can go
//! wrong while a plan runs is folded into [`PlanExecutionError`], which keeps
//! the partial trace so callers can see what succeeded before the abort.

use std::path::PathBuf;

use thiserror::Error;

use crate::protocol::{ExecutionTrace, StepId};
use crate::validation::plan::PlanValidationError;

/// A tool name was registered twice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("action '{name}' is already registered")]
pub struct DuplicateActionError {
    pub name: String,
}

/// A plan or caller asked for a tool that is not in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown action '{name}'")]
pub struct UnknownActionError {
    pub name: String,
}

/// Failure reported by a tool (or the backend it stands in for).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("action '{action}' failed: {message}")]
pub struct DomainActionError {
    pub action: String,
    pub message: String,
    pub retryable: bool,
}

impl DomainActionError {
    pub fn retryable(action: &str, message: impl Into<String>) -> Self {
        Self {
            action: action.to_string(),
            message: message.into(),
            retryable: true,
        }
    }

    pub fn fatal(action: &str, message: impl Into<String>) -> Self {
        Self {
            action: action.to_string(),
            message: message.into(),
            retryable: false,
        }
    }

    pub fn invalid_input(action: &str, field: &str, expected: &str) -> Self {
        Self::fatal(action, format!("input '{field}' must be {expected}"))
    }

    pub fn cancelled(action: &str) -> Self {
        Self::fatal(action, "cancelled by caller")
    }

    pub fn timed_out(action: &str) -> Self {
        Self::retryable(action, "step deadline exceeded")
    }
}

/// Fatal problems found while building the resolver.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("invalid configuration: {message}")]
    Invalid { message: String },

    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    DuplicateAction(#[from] DuplicateActionError),

    #[error("plan '{plan}' is invalid: {}", join_errors(.errors))]
    InvalidPlan {
        plan: String,
        errors: Vec<PlanValidationError>,
    },

    #[error("missing credentials: environment variable {var} is not set")]
    MissingCredentials { var: String },
}

impl ConfigurationError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

fn join_errors(errors: &[PlanValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Why a plan run stopped early.
#[derive(Debug, Error)]
pub enum ExecutionFailure {
    #[error(transparent)]
    UnknownAction(#[from] UnknownActionError),

    #[error(transparent)]
    Action(#[from] DomainActionError),

    #[error("input '{input}' of step '{step}' could not be resolved: {reason}")]
    UnresolvedInput {
        step: StepId,
        input: String,
        reason: String,
    },

    #[error("resolution was cancelled")]
    Cancelled,

    #[error("resolution deadline exceeded")]
    DeadlineExceeded,
}

/// A plan aborted. `trace` holds every step that completed before the abort.
#[derive(Debug, Error)]
#[error("plan '{plan}' aborted{}: {cause}", .step.as_ref().map(|s| format!(" at step '{s}'")).unwrap_or_default())]
pub struct PlanExecutionError {
    pub plan: String,
    pub step: Option<StepId>,
    #[source]
    pub cause: ExecutionFailure,
    pub trace: ExecutionTrace,
}

impl PlanExecutionError {
    pub fn is_retryable(&self) -> bool {
        matches!(&self.cause, ExecutionFailure::Action(e) if e.retryable)
    }
}

/// Failures of a planner that builds plans at run time.
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("no plan is defined for category '{0}'")]
    NoPlan(String),

    #[error("language model request failed: {0}")]
    Transport(String),

    #[error("language model returned an unusable plan: {0}")]
    Malformed(String),

    #[error("generated plan failed validation: {}", join_errors(.0))]
    Invalid(Vec<PlanValidationError>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("case '{case_id}' already has an open context session")]
pub struct SessionInUseError {
    pub case_id: String,
}

/// The one error type the coordinator hands back to callers.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("planning failed: {0}")]
    Planning(#[from] PlanningError),

    #[error(transparent)]
    Execution(#[from] PlanExecutionError),

    #[error(transparent)]
    Session(#[from] SessionInUseError),
}

impl ResolutionError {
    /// Steps that completed before the failure, if execution had started.
    pub fn partial_trace(&self) -> Option<&ExecutionTrace> {
        match self {
            ResolutionError::Execution(e) => Some(&e.trace),
            _ => None,
        }
    }
}
