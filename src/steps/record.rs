//! Execution records.
//!
//! One [`ExecutionRecord`] exists per step per run. The coordinator opens it
//! right before dispatch, the executor finalizes it, and it stays in the run
//! state so later steps can read its outputs and the report can show it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::error::PipewrightError;
use crate::ui::format_duration;

use super::descriptor::StepDescriptor;

/// Status of a step in the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step is waiting to run.
    Pending,

    /// Step is currently executing.
    Running,

    /// Step completed successfully.
    Succeeded,

    /// Step failed.
    Failed,

    /// Step was never dispatched.
    Skipped,
}

impl StepStatus {
    /// Check if this is a terminal state (no more changes expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Succeeded | StepStatus::Failed | StepStatus::Skipped
        )
    }

    /// Get a display character for this status.
    pub fn display_char(&self) -> char {
        match self {
            StepStatus::Pending => '○',
            StepStatus::Running => '◉',
            StepStatus::Succeeded => '✓',
            StepStatus::Failed => '✗',
            StepStatus::Skipped => '⊘',
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

/// Why a step failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepFailure {
    /// The component could not be started.
    Launch { message: String },
    /// The component exited with a non-success status.
    Exit { code: Option<i32> },
    /// The component exceeded its timeout and was killed.
    Timeout { after_ms: u64 },
    /// The component stopped after a cancellation request.
    Cancelled,
    /// The component succeeded but did not report a declared output.
    MissingOutput { output: String },
}

impl StepFailure {
    /// Whether this is a launch failure (as opposed to an execution failure).
    pub fn is_launch(&self) -> bool {
        matches!(self, Self::Launch { .. })
    }

    /// Human-readable description.
    pub fn describe(&self) -> String {
        match self {
            Self::Launch { message } => format!("could not launch component: {}", message),
            Self::Exit { code: Some(code) } => format!("exited with code {}", code),
            Self::Exit { code: None } => "terminated by signal".to_string(),
            Self::Timeout { after_ms } => format!(
                "timed out after {}",
                format_duration(Duration::from_millis(*after_ms))
            ),
            Self::Cancelled => "cancelled".to_string(),
            Self::MissingOutput { output } => {
                format!("did not report declared output '{}'", output)
            }
        }
    }

    /// Convert to the matching error kind for `step`.
    pub fn to_error(&self, step: &StepDescriptor) -> PipewrightError {
        match self {
            Self::Launch { message } => PipewrightError::Launch {
                step: step.id.clone(),
                component: step.component.clone(),
                message: message.clone(),
            },
            other => PipewrightError::Execution {
                step: step.id.clone(),
                message: other.describe(),
            },
        }
    }
}

/// Why a step was never dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// An upstream step failed. `chain` runs from the failed step to the
    /// immediate dependency that blocked this one.
    Blocked { chain: Vec<String> },
    /// The run stopped early after `trigger` failed.
    FailFast { trigger: String },
    /// The run stopped because `step` could not resolve its parameters.
    Interrupted { step: String },
}

impl SkipReason {
    /// The dependency (or failed step) directly responsible for the skip.
    pub fn blocked_by(&self) -> &str {
        match self {
            Self::Blocked { chain } => chain.last().map(String::as_str).unwrap_or_default(),
            Self::FailFast { trigger } => trigger,
            Self::Interrupted { step } => step,
        }
    }

    /// The step whose failure started the chain.
    pub fn root_cause(&self) -> &str {
        match self {
            Self::Blocked { chain } => chain.first().map(String::as_str).unwrap_or_default(),
            Self::FailFast { trigger } => trigger,
            Self::Interrupted { step } => step,
        }
    }

    /// Human-readable description.
    pub fn describe(&self) -> String {
        match self {
            Self::Blocked { chain } if chain.len() <= 1 => {
                format!("blocked by {} (failed)", self.blocked_by())
            }
            Self::Blocked { chain } => {
                let mut trail = format!("{} failed", chain[0]);
                for id in &chain[1..chain.len() - 1] {
                    trail.push_str(" → ");
                    trail.push_str(id);
                }
                format!("blocked by {} ({})", self.blocked_by(), trail)
            }
            Self::FailFast { trigger } => format!("not run: fail-fast after {} failed", trigger),
            Self::Interrupted { step } => {
                format!("not run: run stopped when {} could not resolve its parameters", step)
            }
        }
    }
}

/// Recorded outcome of one step.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    /// Step id.
    pub step: String,
    /// Display title.
    pub title: String,
    /// Current status.
    pub status: StepStatus,
    /// When dispatch started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the step finished.
    pub finished_at: Option<DateTime<Utc>>,
    /// Wall time of the last attempt.
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    /// Number of attempts made.
    pub attempts: u32,
    /// Exit code of the last attempt.
    pub exit_code: Option<i32>,
    /// Resolved argument list passed to the component.
    pub arguments: Vec<String>,
    /// Outputs available to downstream steps.
    pub outputs: IndexMap<String, String>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Failure detail, for failed steps.
    pub failure: Option<StepFailure>,
    /// Skip detail, for skipped steps.
    pub skip: Option<SkipReason>,
}

pub(crate) fn serialize_millis<S: Serializer>(
    d: &Duration,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl ExecutionRecord {
    /// Open a record for a step about to be dispatched.
    pub fn begin(step: &StepDescriptor) -> Self {
        Self {
            step: step.id.clone(),
            title: step.title.clone(),
            status: StepStatus::Running,
            started_at: Some(Utc::now()),
            finished_at: None,
            duration: Duration::ZERO,
            attempts: 0,
            exit_code: None,
            arguments: Vec::new(),
            outputs: IndexMap::new(),
            stdout: String::new(),
            stderr: String::new(),
            failure: None,
            skip: None,
        }
    }

    /// Record for a step that will never be dispatched.
    pub fn skipped(step: &StepDescriptor, reason: SkipReason) -> Self {
        Self {
            status: StepStatus::Skipped,
            started_at: None,
            skip: Some(reason),
            ..Self::begin(step)
        }
    }

    /// Whether the step succeeded.
    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Succeeded
    }

    /// Look up an output value.
    pub fn output(&self, name: &str) -> Option<&str> {
        self.outputs.get(name).map(String::as_str)
    }

    /// The last `max_lines` lines of captured output (stdout, then stderr).
    pub fn output_excerpt(&self, max_lines: usize) -> String {
        let lines: Vec<&str> = self
            .stdout
            .lines()
            .chain(self.stderr.lines())
            .filter(|l| !l.trim().is_empty())
            .collect();
        let start = lines.len().saturating_sub(max_lines);
        lines[start..].join("\n")
    }

    /// Short explanation of a non-success outcome.
    pub fn detail(&self) -> Option<String> {
        if let Some(skip) = &self.skip {
            return Some(skip.describe());
        }
        self.failure.as_ref().map(StepFailure::describe)
    }

    /// Generate a summary line for display.
    pub fn summary_line(&self) -> String {
        let duration = format_duration(self.duration);
        match self.status {
            StepStatus::Succeeded => {
                format!("{} {} ({})", self.status.display_char(), self.step, duration)
            }
            StepStatus::Failed => format!(
                "{} {} ({}) - {}",
                self.status.display_char(),
                self.step,
                duration,
                self.detail().unwrap_or_else(|| "unknown error".to_string())
            ),
            StepStatus::Skipped => format!(
                "{} {} skipped, {}",
                self.status.display_char(),
                self.step,
                self.detail().unwrap_or_default()
            ),
            _ => format!("{} {}", self.status.display_char(), self.step),
        }
    }
}
