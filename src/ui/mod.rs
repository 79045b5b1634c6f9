//! User interface abstractions.
//!
//! All terminal output from the CLI goes through [`UserInterface`], so
//! commands can be tested with [`MockUI`] and run unattended with
//! [`NonInteractiveUI`].

pub mod mock;
pub mod non_interactive;
pub mod output;
pub mod progress;
pub mod spinner;
pub mod terminal;
pub mod theme;

pub use mock::{MockSpinner, MockUI, SpinnerStatus};
pub use non_interactive::NonInteractiveUI;
pub use output::OutputMode;
pub use progress::{format_duration, BatchProgress};
pub use spinner::{LiveOutput, ProgressSpinner};
pub use terminal::{create_ui, TerminalUI};
pub use theme::{should_use_colors, PipewrightTheme};

use crate::runner::RunReport;
use crate::steps::ExecutionRecord;

/// Lines of component output shown for a failed step.
pub const FAILURE_EXCERPT_LINES: usize = 10;

/// Trait for user interaction.
pub trait UserInterface {
    /// Get the current output mode.
    fn output_mode(&self) -> OutputMode;

    /// Change the output mode.
    fn set_output_mode(&mut self, mode: OutputMode);

    /// Show a plain message.
    fn message(&mut self, msg: &str);

    /// Show a success message.
    fn success(&mut self, msg: &str);

    /// Show a warning message.
    fn warning(&mut self, msg: &str);

    /// Show an error message. Always shown.
    fn error(&mut self, msg: &str);

    /// Start a spinner.
    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle>;

    /// Show a section header.
    fn show_header(&mut self, title: &str);

    /// Show the banner at the start of a run.
    fn show_run_header(&mut self, workflow: &str, step_count: usize, batch_count: usize);

    /// Announce a batch when no spinner is shown for it.
    fn show_batch(&mut self, index: usize, total: usize, steps: &[String]);

    /// Show the outcome of one step.
    fn show_step(&mut self, record: &ExecutionRecord);

    /// Show the tail of a failed step's output.
    fn show_failure_output(&mut self, record: &ExecutionRecord);

    /// Show the end-of-run summary.
    fn show_run_summary(&mut self, report: &RunReport);

    /// Check if running interactively.
    fn is_interactive(&self) -> bool;
}

/// Handle for controlling a spinner.
pub trait SpinnerHandle: Send {
    /// Update the spinner message.
    fn set_message(&mut self, msg: &str);

    /// Finish with success.
    fn finish_success(&mut self, msg: &str);

    /// Finish with error.
    fn finish_error(&mut self, msg: &str);

    /// Finish as skipped.
    fn finish_skipped(&mut self, msg: &str);

    /// Underlying progress bar, for spinners that draw one.
    fn progress_bar(&self) -> Option<indicatif::ProgressBar> {
        None
    }
}
