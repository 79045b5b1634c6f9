//! Interactive terminal UI.

use console::Term;
use std::io::Write;

use crate::runner::RunReport;
use crate::steps::{ExecutionRecord, StepStatus};

use super::{
    should_use_colors, NonInteractiveUI, OutputMode, PipewrightTheme, ProgressSpinner,
    SpinnerHandle, UserInterface, FAILURE_EXCERPT_LINES,
};

/// Interactive terminal UI implementation.
pub struct TerminalUI {
    term: Term,
    theme: PipewrightTheme,
    mode: OutputMode,
}

impl TerminalUI {
    /// Create a new terminal UI.
    pub fn new(mode: OutputMode) -> Self {
        Self::with_colors(mode, should_use_colors())
    }

    /// Create a terminal UI with colors forced on or off.
    pub fn with_colors(mode: OutputMode, colors: bool) -> Self {
        let theme = if colors {
            PipewrightTheme::new()
        } else {
            PipewrightTheme::plain()
        };

        Self {
            term: Term::stdout(),
            theme,
            mode,
        }
    }

    fn lines(&mut self, lines: Vec<String>) {
        for line in lines {
            writeln!(self.term, "{}", line).ok();
        }
    }
}

impl UserInterface for TerminalUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn set_output_mode(&mut self, mode: OutputMode) {
        self.mode = mode;
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", msg).ok();
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_success(msg)).ok();
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_warning(msg)).ok();
        }
    }

    fn error(&mut self, msg: &str) {
        writeln!(self.term, "{}", self.theme.format_error(msg)).ok();
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        if self.mode.shows_spinners() {
            Box::new(ProgressSpinner::with_indent(message, 2))
        } else {
            Box::new(ProgressSpinner::hidden())
        }
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "\n{}\n", self.theme.format_header(title)).ok();
        }
    }

    fn show_run_header(&mut self, workflow: &str, step_count: usize, batch_count: usize) {
        if self.mode.shows_status() {
            let step_label = if step_count == 1 { "step" } else { "steps" };
            let batch_label = if batch_count == 1 { "batch" } else { "batches" };
            writeln!(
                self.term,
                "\n{} {} {} {}\n",
                self.theme.header.apply_to("▶"),
                self.theme.highlight.apply_to(workflow),
                self.theme.dim.apply_to("·"),
                self.theme.dim.apply_to(format!(
                    "{} {} in {} {}",
                    step_count, step_label, batch_count, batch_label
                )),
            )
            .ok();
        }
    }

    fn show_batch(&mut self, index: usize, total: usize, steps: &[String]) {
        if self.mode.shows_steps() {
            writeln!(
                self.term,
                "  {} {}",
                self.theme.info.apply_to(format!("[{}/{}]", index + 1, total)),
                self.theme.dim.apply_to(steps.join(", "))
            )
            .ok();
        }
    }

    fn show_step(&mut self, record: &ExecutionRecord) {
        let failed = record.status == StepStatus::Failed;
        if self.mode.shows_steps() || (failed && self.mode.shows_status()) {
            writeln!(self.term, "    {}", self.theme.format_record(record)).ok();
        }
    }

    fn show_failure_output(&mut self, record: &ExecutionRecord) {
        if self.mode.shows_status() {
            let block = self.theme.failure_block(record, FAILURE_EXCERPT_LINES);
            self.lines(block);
        }
    }

    fn show_run_summary(&mut self, report: &RunReport) {
        if !self.mode.shows_status() {
            return;
        }
        writeln!(self.term).ok();
        let block = self.theme.summary_block(report);
        self.lines(block);
    }

    fn is_interactive(&self) -> bool {
        self.term.is_term()
    }
}

/// Create the appropriate UI based on context.
pub fn create_ui(interactive: bool, mode: OutputMode) -> Box<dyn UserInterface> {
    if interactive && Term::stdout().is_term() {
        Box::new(TerminalUI::new(mode))
    } else {
        Box::new(NonInteractiveUI::new(mode))
    }
}
