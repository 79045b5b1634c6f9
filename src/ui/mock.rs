//! Mock UI implementation for testing.
//!
//! `MockUI` implements the `UserInterface` trait and captures all
//! interactions for later assertion.
//!
//! # Example
//!
//! ```
//! use pipewright::ui::{MockUI, UserInterface};
//!
//! let mut ui = MockUI::new();
//!
//! // Use ui in code under test...
//! ui.message("Loading pipeline.yml");
//! ui.success("Workflow is valid");
//!
//! // Assert on captured interactions
//! assert!(ui.has_message("Loading pipeline.yml"));
//! assert!(ui.successes().contains(&"Workflow is valid".to_string()));
//! ```

use std::sync::{Arc, Mutex};

use crate::runner::RunReport;
use crate::steps::ExecutionRecord;

use super::{OutputMode, SpinnerHandle, UserInterface};

/// Mock UI implementation for testing.
#[derive(Debug, Default)]
pub struct MockUI {
    mode: OutputMode,
    interactive: bool,
    messages: Vec<String>,
    successes: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
    headers: Vec<String>,
    spinners: Vec<String>,
    run_headers: Vec<(String, usize, usize)>,
    batches: Vec<(usize, usize, Vec<String>)>,
    steps: Vec<ExecutionRecord>,
    failure_outputs: Vec<String>,
    summaries: Vec<RunReport>,
}

impl MockUI {
    /// Create a new MockUI with Normal output mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new MockUI with the given output mode.
    pub fn with_mode(mode: OutputMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Set whether the mock reports itself as interactive.
    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn successes(&self) -> &[String] {
        &self.successes
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Messages of every spinner started.
    pub fn spinners(&self) -> &[String] {
        &self.spinners
    }

    /// `(workflow, step_count, batch_count)` per run banner.
    pub fn run_headers(&self) -> &[(String, usize, usize)] {
        &self.run_headers
    }

    /// `(index, total, steps)` per announced batch.
    pub fn batches(&self) -> &[(usize, usize, Vec<String>)] {
        &self.batches
    }

    /// Step outcomes in the order they were shown.
    pub fn steps(&self) -> &[ExecutionRecord] {
        &self.steps
    }

    /// Ids of steps whose failure output was shown.
    pub fn failure_outputs(&self) -> &[String] {
        &self.failure_outputs
    }

    pub fn summaries(&self) -> &[RunReport] {
        &self.summaries
    }

    pub fn has_message(&self, msg: &str) -> bool {
        self.messages.iter().any(|m| m.contains(msg))
    }

    pub fn has_success(&self, msg: &str) -> bool {
        self.successes.iter().any(|m| m.contains(msg))
    }

    pub fn has_warning(&self, msg: &str) -> bool {
        self.warnings.iter().any(|m| m.contains(msg))
    }

    pub fn has_error(&self, msg: &str) -> bool {
        self.errors.iter().any(|m| m.contains(msg))
    }

    /// Clear all captured interactions.
    pub fn clear(&mut self) {
        *self = Self {
            mode: self.mode,
            interactive: self.interactive,
            ..Self::default()
        };
    }
}

impl UserInterface for MockUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn set_output_mode(&mut self, mode: OutputMode) {
        self.mode = mode;
    }

    fn message(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }

    fn success(&mut self, msg: &str) {
        self.successes.push(msg.to_string());
    }

    fn warning(&mut self, msg: &str) {
        self.warnings.push(msg.to_string());
    }

    fn error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        self.spinners.push(message.to_string());
        Box::new(MockSpinner::new())
    }

    fn show_header(&mut self, title: &str) {
        self.headers.push(title.to_string());
    }

    fn show_run_header(&mut self, workflow: &str, step_count: usize, batch_count: usize) {
        self.run_headers
            .push((workflow.to_string(), step_count, batch_count));
    }

    fn show_batch(&mut self, index: usize, total: usize, steps: &[String]) {
        self.batches.push((index, total, steps.to_vec()));
    }

    fn show_step(&mut self, record: &ExecutionRecord) {
        self.steps.push(record.clone());
    }

    fn show_failure_output(&mut self, record: &ExecutionRecord) {
        self.failure_outputs.push(record.step.clone());
    }

    fn show_run_summary(&mut self, report: &RunReport) {
        self.summaries.push(report.clone());
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }
}

/// Mock spinner that captures finish messages.
#[derive(Debug, Default)]
pub struct MockSpinner {
    messages: Vec<String>,
    finish_message: Option<String>,
    status: Arc<Mutex<Option<SpinnerStatus>>>,
}

/// Status of a mock spinner when finished.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpinnerStatus {
    /// Finished successfully.
    Success,
    /// Finished with error.
    Error,
    /// Finished as skipped.
    Skipped,
}

impl MockSpinner {
    /// Create a new mock spinner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all messages set during spinning.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Get the final finish message.
    pub fn finish_message(&self) -> Option<&str> {
        self.finish_message.as_deref()
    }

    /// Get the final status.
    pub fn status(&self) -> Option<SpinnerStatus> {
        self.status.lock().ok().and_then(|s| *s)
    }

    /// Status cell that stays readable after the spinner is boxed away.
    pub fn shared_status(&self) -> Arc<Mutex<Option<SpinnerStatus>>> {
        Arc::clone(&self.status)
    }

    fn finish(&mut self, msg: &str, status: SpinnerStatus) {
        self.finish_message = Some(msg.to_string());
        if let Ok(mut slot) = self.status.lock() {
            *slot = Some(status);
        }
    }
}

impl SpinnerHandle for MockSpinner {
    fn set_message(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }

    fn finish_success(&mut self, msg: &str) {
        self.finish(msg, SpinnerStatus::Success);
    }

    fn finish_error(&mut self, msg: &str) {
        self.finish(msg, SpinnerStatus::Error);
    }

    fn finish_skipped(&mut self, msg: &str) {
        self.finish(msg, SpinnerStatus::Skipped);
    }
}
