//! Visual theme and styling.

use console::Style;

use crate::runner::RunReport;
use crate::steps::{ExecutionRecord, StepStatus};

use super::progress::format_duration;

/// Pipewright's visual theme.
#[derive(Debug, Clone)]
pub struct PipewrightTheme {
    /// Style for success messages (green).
    pub success: Style,
    /// Style for warning messages (orange).
    pub warning: Style,
    /// Style for error messages (red bold).
    pub error: Style,
    /// Style for informational/running elements (cyan).
    pub info: Style,
    /// Style for dim/secondary text.
    pub dim: Style,
    /// Style for highlighted/important text (bold).
    pub highlight: Style,
    /// Style for headers (cyan bold).
    pub header: Style,
    /// Style for durations and timestamps (dim).
    pub duration: Style,
    /// Style for commands shown in output (dim italic).
    pub command: Style,
    /// Style for box-drawing borders (dim).
    pub border: Style,
    /// Style for blocked/skipped status (orange).
    pub blocked: Style,
}

impl Default for PipewrightTheme {
    fn default() -> Self {
        Self::new()
    }
}

impl PipewrightTheme {
    /// Create the default theme.
    pub fn new() -> Self {
        Self {
            success: Style::new().green(),
            warning: Style::new().color256(208),
            error: Style::new().red().bold(),
            info: Style::new().cyan(),
            dim: Style::new().dim(),
            highlight: Style::new().bold(),
            header: Style::new().bold().cyan(),
            duration: Style::new().dim(),
            command: Style::new().dim().italic(),
            border: Style::new().dim(),
            blocked: Style::new().color256(208),
        }
    }

    /// Create a theme without colors (for non-TTY or --no-color).
    pub fn plain() -> Self {
        Self {
            success: Style::new(),
            warning: Style::new(),
            error: Style::new(),
            info: Style::new(),
            dim: Style::new(),
            highlight: Style::new(),
            header: Style::new(),
            duration: Style::new(),
            command: Style::new(),
            border: Style::new(),
            blocked: Style::new(),
        }
    }

    /// Format a success message (icon + text in green).
    pub fn format_success(&self, msg: &str) -> String {
        format!("{}", self.success.apply_to(format!("✓ {}", msg)))
    }

    /// Format a warning message (icon + text in orange).
    pub fn format_warning(&self, msg: &str) -> String {
        format!("{}", self.warning.apply_to(format!("⚠ {}", msg)))
    }

    /// Format an error message (icon + text in red bold).
    pub fn format_error(&self, msg: &str) -> String {
        format!("{}", self.error.apply_to(format!("✗ {}", msg)))
    }

    /// Format a skipped message (icon + text in orange).
    pub fn format_skipped(&self, msg: &str) -> String {
        format!("{}", self.blocked.apply_to(format!("⊘ {}", msg)))
    }

    /// Format a header banner.
    pub fn format_header(&self, title: &str) -> String {
        format!("{} {}", self.header.apply_to("▶"), self.highlight.apply_to(title))
    }

    /// Styled status icon.
    pub fn status_icon(&self, status: StepStatus) -> String {
        let style = match status {
            StepStatus::Succeeded => &self.success,
            StepStatus::Failed => &self.error,
            StepStatus::Skipped => &self.blocked,
            StepStatus::Pending | StepStatus::Running => &self.info,
        };
        style.apply_to(status.display_char()).to_string()
    }

    /// One line describing a step's outcome.
    pub fn format_record(&self, record: &ExecutionRecord) -> String {
        let icon = self.status_icon(record.status);
        match record.status {
            StepStatus::Skipped => format!(
                "{} {:<20} {}",
                icon,
                record.step,
                self.dim.apply_to(format!(
                    "skipped, {}",
                    record.detail().unwrap_or_default()
                ))
            ),
            StepStatus::Failed => format!(
                "{} {:<20} {} {}",
                icon,
                record.step,
                self.duration.apply_to(format_duration(record.duration)),
                self.error
                    .apply_to(record.detail().unwrap_or_else(|| "failed".to_string()))
            ),
            _ => {
                let attempts = if record.attempts > 1 {
                    format!(" (attempt {})", record.attempts)
                } else {
                    String::new()
                };
                format!(
                    "{} {:<20} {}{}",
                    icon,
                    record.step,
                    self.duration.apply_to(format_duration(record.duration)),
                    self.dim.apply_to(attempts)
                )
            }
        }
    }

    /// Boxed tail of a failed step's output.
    pub fn failure_block(&self, record: &ExecutionRecord, max_lines: usize) -> Vec<String> {
        let b = &self.border;
        let mut lines = vec![format!(
            "    {} {}",
            b.apply_to("┌─"),
            b.apply_to(format!("{} output ─────────────────────", record.step))
        )];
        let excerpt = record.output_excerpt(max_lines);
        if excerpt.is_empty() {
            lines.push(format!("    {} {}", b.apply_to("│"), self.dim.apply_to("(no output)")));
        }
        for line in excerpt.lines() {
            lines.push(format!("    {} {}", b.apply_to("│"), line));
        }
        lines.push(format!(
            "    {}",
            b.apply_to("└────────────────────────────────────")
        ));
        lines
    }

    /// Boxed end-of-run summary.
    pub fn summary_block(&self, report: &RunReport) -> Vec<String> {
        let b = &self.border;
        let mut lines = vec![format!(
            "  {} {}",
            b.apply_to("┌─"),
            b.apply_to("Summary ──────────────────────────")
        )];
        for record in &report.steps {
            lines.push(format!("  {} {}", b.apply_to("│"), self.format_record(record)));
        }
        lines.push(format!(
            "  {}",
            b.apply_to("├────────────────────────────────────")
        ));

        let status = match report.status {
            crate::runner::RunStatus::Completed => self.success.apply_to(report.status),
            _ => self.error.apply_to(report.status),
        };
        lines.push(format!(
            "  {} {} {} {}",
            b.apply_to("│"),
            status,
            self.dim.apply_to("·"),
            report.summary()
        ));
        lines.push(format!(
            "  {}",
            b.apply_to("└────────────────────────────────────")
        ));
        lines
    }
}

/// Check if colors should be enabled.
pub fn should_use_colors() -> bool {
    // Check NO_COLOR env var (https://no-color.org/)
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    console::Term::stdout().is_term()
}
