//! Non-interactive UI for CI/headless environments.

use crate::runner::RunReport;
use crate::steps::{ExecutionRecord, StepStatus};

use super::theme::PipewrightTheme;
use super::{OutputMode, ProgressSpinner, SpinnerHandle, UserInterface, FAILURE_EXCERPT_LINES};

/// UI implementation for non-interactive mode.
///
/// Output is plain text with one line per event. Spinners are never drawn,
/// so batches are announced as lines instead.
pub struct NonInteractiveUI {
    mode: OutputMode,
    theme: PipewrightTheme,
    is_ci: bool,
}

impl NonInteractiveUI {
    /// Create a new non-interactive UI.
    pub fn new(mode: OutputMode) -> Self {
        Self::with_ci(mode, crate::shell::is_ci())
    }

    /// Create with explicit CI flag (for testing).
    pub fn with_ci(mode: OutputMode, is_ci: bool) -> Self {
        Self {
            mode,
            theme: PipewrightTheme::plain(),
            is_ci,
        }
    }

    /// Whether a CI environment was detected.
    pub fn is_ci(&self) -> bool {
        self.is_ci
    }
}

impl UserInterface for NonInteractiveUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn set_output_mode(&mut self, mode: OutputMode) {
        self.mode = mode;
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("{}", msg);
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("{}", self.theme.format_success(msg));
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            eprintln!("{}", self.theme.format_warning(msg));
        }
    }

    fn error(&mut self, msg: &str) {
        eprintln!("{}", self.theme.format_error(msg));
    }

    fn start_spinner(&mut self, _message: &str) -> Box<dyn SpinnerHandle> {
        Box::new(ProgressSpinner::hidden())
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            println!("\n=== {} ===\n", title);
        }
    }

    fn show_run_header(&mut self, workflow: &str, step_count: usize, batch_count: usize) {
        if self.mode.shows_status() {
            println!(
                "Running {} ({} steps in {} batches)",
                workflow, step_count, batch_count
            );
        }
    }

    fn show_batch(&mut self, index: usize, total: usize, steps: &[String]) {
        if self.mode.shows_steps() {
            println!("[{}/{}] {}", index + 1, total, steps.join(", "));
        }
    }

    fn show_step(&mut self, record: &ExecutionRecord) {
        let failed = record.status == StepStatus::Failed;
        if self.mode.shows_steps() || (failed && self.mode.shows_status()) {
            println!("  {}", record.summary_line());
        }
    }

    fn show_failure_output(&mut self, record: &ExecutionRecord) {
        if self.mode.shows_status() {
            for line in self.theme.failure_block(record, FAILURE_EXCERPT_LINES) {
                println!("{}", line);
            }
        }
    }

    fn show_run_summary(&mut self, report: &RunReport) {
        if self.mode.shows_status() {
            println!();
            for line in self.theme.summary_block(report) {
                println!("{}", line);
            }
        }
    }

    fn is_interactive(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_interactive_is_never_interactive() {
        let ui = NonInteractiveUI::with_ci(OutputMode::Normal, false);
        assert!(!ui.is_interactive());
        assert!(!ui.is_ci());
    }

    #[test]
    fn non_interactive_respects_mode() {
        let mut ui = NonInteractiveUI::with_ci(OutputMode::Quiet, true);
        assert_eq!(ui.output_mode(), OutputMode::Quiet);
        assert!(ui.is_ci());
        ui.set_output_mode(OutputMode::Silent);
        assert_eq!(ui.output_mode(), OutputMode::Silent);
    }

    #[test]
    fn spinner_is_hidden() {
        let mut ui = NonInteractiveUI::with_ci(OutputMode::Normal, false);
        let spinner = ui.start_spinner("Batch 1/1");
        assert!(spinner.progress_bar().is_some_and(|bar| bar.is_hidden()));
    }
}
