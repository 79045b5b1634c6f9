//! Progress spinners.

use indicatif::{ProgressBar, ProgressStyle};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::shell::OutputLine;
use crate::steps::StepOutputCallback;

use super::theme::PipewrightTheme;
use super::SpinnerHandle;

/// A progress spinner for long-running operations.
pub struct ProgressSpinner {
    bar: ProgressBar,
    indent: usize,
}

impl ProgressSpinner {
    /// Create a new spinner with a message.
    pub fn new(message: &str) -> Self {
        Self::with_indent(message, 0)
    }

    /// Create a new spinner with indentation.
    pub fn with_indent(message: &str, indent: usize) -> Self {
        let bar = ProgressBar::new_spinner();
        let prefix = " ".repeat(indent);
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template(&format!("{}{{spinner:.magenta}} {{msg}}", prefix))
        {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));

        Self { bar, indent }
    }

    /// Create a spinner that doesn't show (for silent mode).
    pub fn hidden() -> Self {
        let bar = ProgressBar::hidden();
        Self { bar, indent: 0 }
    }

    fn finish_with(&mut self, line: String) {
        if let Ok(style) = ProgressStyle::default_spinner().template("{msg}") {
            self.bar.set_style(style);
        }
        let prefix = " ".repeat(self.indent);
        self.bar.finish_with_message(format!("{}{}", prefix, line));
    }
}

impl SpinnerHandle for ProgressSpinner {
    fn set_message(&mut self, msg: &str) {
        self.bar.set_message(msg.to_string());
    }

    fn finish_success(&mut self, msg: &str) {
        let line = PipewrightTheme::new().format_success(msg);
        self.finish_with(line);
    }

    fn finish_error(&mut self, msg: &str) {
        let line = PipewrightTheme::new().format_error(msg);
        self.finish_with(line);
    }

    fn finish_skipped(&mut self, msg: &str) {
        let line = PipewrightTheme::new().format_skipped(msg);
        self.finish_with(line);
    }

    fn progress_bar(&self) -> Option<ProgressBar> {
        Some(self.bar.clone())
    }
}

#[derive(Default)]
struct LiveState {
    bar: Option<ProgressBar>,
    base: String,
    lines: VecDeque<String>,
}

/// Shows the last few component output lines under the active spinner.
///
/// Components run on worker threads for the whole run while spinners come
/// and go per batch, so the callback writes into shared state that the
/// current spinner is attached to.
#[derive(Clone)]
pub struct LiveOutput {
    state: Arc<Mutex<LiveState>>,
    max_lines: usize,
}

impl LiveOutput {
    pub fn new(max_lines: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(LiveState::default())),
            max_lines,
        }
    }

    /// Route output to a spinner, replacing any previous one.
    pub fn attach(&self, spinner: &dyn SpinnerHandle, base_message: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.bar = spinner.progress_bar();
            state.base = base_message.to_string();
            state.lines.clear();
            render(&state);
        }
    }

    /// Change the spinner's primary message, keeping the live lines.
    pub fn set_base(&self, base_message: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.base = base_message.to_string();
            render(&state);
        }
    }

    /// Stop updating the current spinner.
    pub fn detach(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.bar = None;
            state.lines.clear();
        }
    }

    /// Callback to hand to the run coordinator.
    pub fn callback(&self) -> StepOutputCallback {
        let state = Arc::clone(&self.state);
        let max_lines = self.max_lines;

        Arc::new(move |step: &str, line: OutputLine| {
            let text = match &line {
                OutputLine::Stdout(s) | OutputLine::Stderr(s) => s.trim_end(),
            };
            if text.is_empty() {
                return;
            }

            let mut display = format!("{}: {}", step, text);
            if display.chars().count() > 72 {
                display = format!("{}...", display.chars().take(69).collect::<String>());
            }

            let Ok(mut state) = state.lock() else {
                return;
            };
            if state.bar.is_none() {
                return;
            }
            state.lines.push_back(display);
            while state.lines.len() > max_lines {
                state.lines.pop_front();
            }
            render(&state);
        })
    }

    #[cfg(test)]
    fn lines(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.lines.iter().cloned().collect())
            .unwrap_or_default()
    }
}

fn render(state: &LiveState) {
    let Some(bar) = &state.bar else {
        return;
    };
    let theme = PipewrightTheme::new();
    let mut msg = state.base.clone();
    for line in &state.lines {
        msg.push('\n');
        msg.push_str("  ");
        msg.push_str(&theme.dim.apply_to(format!("» {}", line)).to_string());
    }
    bar.set_message(msg);
}
