//! Run reports.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ValidationIssue;
use crate::error::{PipewrightError, Result};
use crate::steps::record::serialize_millis;
use crate::steps::{ExecutionRecord, StepStatus};
use crate::ui::format_duration;

use super::scheduler::Batch;

/// Exit code for a run stopped by an internal consistency failure.
pub const EXIT_INTERNAL: i32 = 3;

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every step succeeded.
    Completed,
    /// At least one step failed.
    Failed,
    /// Nothing ran because the definition was rejected.
    Aborted,
}

impl RunStatus {
    /// Process exit code for this status.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Completed => 0,
            RunStatus::Failed => 1,
            RunStatus::Aborted => 2,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Aborted => "aborted",
        };
        write!(f, "{}", s)
    }
}

/// Summary of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Workflow name.
    pub workflow: String,
    /// Terminal status.
    pub status: RunStatus,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Total wall time.
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    /// Batch sequence the run followed.
    pub batches: Vec<Batch>,
    /// One record per step, in declaration order.
    pub steps: Vec<ExecutionRecord>,
    /// Why the run was aborted, if it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    /// Validation issues behind an abort.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ValidationIssue>,
    /// Internal error that stopped the run after dispatch began.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    /// Report for a run that never dispatched a step.
    pub fn aborted(workflow: impl Into<String>, error: &PipewrightError) -> Self {
        Self {
            workflow: workflow.into(),
            status: RunStatus::Aborted,
            started_at: Utc::now(),
            duration: Duration::ZERO,
            batches: Vec::new(),
            steps: Vec::new(),
            abort_reason: Some(error.to_string()),
            issues: error.issues().to_vec(),
            error: None,
        }
    }

    /// Record for a step.
    pub fn record(&self, id: &str) -> Option<&ExecutionRecord> {
        self.steps.iter().find(|r| r.step == id)
    }

    /// Number of steps with the given status.
    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|r| r.status == status).count()
    }

    /// Whether the run completed.
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Process exit code.
    pub fn exit_code(&self) -> i32 {
        if self.error.is_some() {
            return EXIT_INTERNAL;
        }
        self.status.exit_code()
    }

    /// One-line summary, e.g. `3 succeeded, 1 failed, 2 skipped in 1.2s`.
    pub fn summary(&self) -> String {
        if let Some(reason) = &self.abort_reason {
            return format!("aborted: {}", reason);
        }

        let mut parts = vec![format!("{} succeeded", self.count(StepStatus::Succeeded))];
        let failed = self.count(StepStatus::Failed);
        if failed > 0 {
            parts.push(format!("{} failed", failed));
        }
        let skipped = self.count(StepStatus::Skipped);
        if skipped > 0 {
            parts.push(format!("{} skipped", skipped));
        }
        let summary = format!("{} in {}", parts.join(", "), format_duration(self.duration));
        match &self.error {
            Some(error) => format!("{}; stopped: {}", summary, error),
            None => summary,
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| PipewrightError::Other(e.into()))
    }

    /// Write the JSON report to a file.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
