//! Error types for pipewright operations.
//!
//! This module defines [`PipewrightError`], the primary error type used
//! throughout the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - `Validation` aborts a run before any step is dispatched
//! - `UnresolvedReference` signals an internal ordering bug and is fatal
//! - `Launch` and `Execution` describe a single step failure; the run
//!   coordinator records them and never propagates them out of a run
//! - Use `anyhow::Error` (via `PipewrightError::Other`) for unexpected errors

use std::path::PathBuf;
use thiserror::Error;

use crate::config::validator::ValidationIssue;

/// Core error type for pipewright operations.
#[derive(Debug, Error)]
pub enum PipewrightError {
    /// Workflow definition file not found.
    #[error("Workflow definition not found: {path}")]
    WorkflowNotFound { path: PathBuf },

    /// Failed to parse the workflow definition document.
    #[error("Failed to parse workflow at {path}: {message}")]
    WorkflowParse { path: PathBuf, message: String },

    /// The workflow definition violates one or more structural rules.
    #[error("Invalid workflow: {}", format_issues(issues))]
    Validation { issues: Vec<ValidationIssue> },

    /// A parameter referenced the output of a step that has not succeeded.
    #[error("Step '{step}' references output '{output}' of step '{source_step}', which is not available")]
    UnresolvedReference {
        step: String,
        source_step: String,
        output: String,
    },

    /// The component could not be started.
    #[error("Step '{step}' could not launch '{component}': {message}")]
    Launch {
        step: String,
        component: String,
        message: String,
    },

    /// The component ran but reported failure or timed out.
    #[error("Step '{step}' failed: {message}")]
    Execution { step: String, message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipewrightError {
    /// Build a validation error from a single issue.
    pub fn validation(issue: ValidationIssue) -> Self {
        Self::Validation {
            issues: vec![issue],
        }
    }

    /// Whether this error means the definition was rejected before dispatch.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::WorkflowNotFound { .. } | Self::WorkflowParse { .. }
        )
    }

    /// Validation issues carried by this error, if any.
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            Self::Validation { issues } => issues,
            _ => &[],
        }
    }
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for pipewright operations.
pub type Result<T> = std::result::Result<T, PipewrightError>;
