//! Batch progress display.

use std::time::{Duration, Instant};

use crate::steps::{ExecutionRecord, StepStatus};

use super::{LiveOutput, SpinnerHandle};

/// Tracks one batch while its steps run.
///
/// Step lines are held back until the batch finishes so they never
/// interleave with the spinner.
pub struct BatchProgress {
    label: String,
    total: usize,
    finished: usize,
    failed: usize,
    skipped: usize,
    records: Vec<ExecutionRecord>,
    spinner: Option<Box<dyn SpinnerHandle>>,
    live: Option<LiveOutput>,
    start_time: Instant,
}

impl BatchProgress {
    /// Create progress for batch `index` (zero-based) of `total_batches`.
    pub fn new(index: usize, total_batches: usize, steps: &[String]) -> Self {
        Self {
            label: format!("Batch {}/{}: {}", index + 1, total_batches, steps.join(", ")),
            total: steps.len(),
            finished: 0,
            failed: 0,
            skipped: 0,
            records: Vec::new(),
            spinner: None,
            live: None,
            start_time: Instant::now(),
        }
    }

    /// Show a spinner for the batch, optionally with live output under it.
    pub fn with_spinner(mut self, spinner: Box<dyn SpinnerHandle>, live: Option<&LiveOutput>) -> Self {
        if let Some(live) = live {
            live.attach(spinner.as_ref(), &self.message());
            self.live = Some(live.clone());
        }
        self.spinner = Some(spinner);
        self
    }

    /// Batch label, e.g. `Batch 2/4: clean, enrich`.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Current spinner message.
    pub fn message(&self) -> String {
        if self.finished == 0 {
            self.label.clone()
        } else {
            format!("{} ({}/{} done)", self.label, self.finished, self.total)
        }
    }

    /// Record a step outcome and update the spinner.
    pub fn step_finished(&mut self, record: &ExecutionRecord) {
        self.finished += 1;
        match record.status {
            StepStatus::Failed => self.failed += 1,
            StepStatus::Skipped => self.skipped += 1,
            _ => {}
        }
        self.records.push(record.clone());

        let msg = self.message();
        match (&self.live, &mut self.spinner) {
            (Some(live), _) => live.set_base(&msg),
            (None, Some(spinner)) => spinner.set_message(&msg),
            (None, None) => {}
        }
    }

    /// Get elapsed duration.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Close the spinner and hand back the step outcomes in arrival order.
    pub fn finish(mut self) -> Vec<ExecutionRecord> {
        if let Some(live) = self.live.take() {
            live.detach();
        }
        if let Some(mut spinner) = self.spinner.take() {
            let msg = format!("{} ({})", self.label, format_duration(self.elapsed()));
            if self.failed > 0 {
                spinner.finish_error(&msg);
            } else if self.skipped == self.total && self.total > 0 {
                spinner.finish_skipped(&msg);
            } else {
                spinner.finish_success(&msg);
            }
        }
        self.records
    }
}

/// Format a duration for display.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{}ms", d.as_millis())
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = secs / 60.0;
        format!("{:.1}m", mins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::{SkipReason, StepDescriptor};
    use crate::ui::{MockSpinner, SpinnerStatus};

    fn steps(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn finished(id: &str, status: StepStatus) -> ExecutionRecord {
        let mut record = ExecutionRecord::begin(&StepDescriptor::new(id, "x.py"));
        record.status = status;
        record
    }

    #[test]
    fn format_duration_milliseconds() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
    }

    #[test]
    fn format_duration_seconds() {
        assert_eq!(format_duration(Duration::from_secs_f64(5.3)), "5.3s");
    }

    #[test]
    fn format_duration_minutes() {
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
    }

    #[test]
    fn format_duration_zero() {
        assert_eq!(format_duration(Duration::ZERO), "0ms");
    }

    #[test]
    fn label_is_one_based() {
        let progress = BatchProgress::new(1, 4, &steps(&["clean", "enrich"]));
        assert_eq!(progress.label(), "Batch 2/4: clean, enrich");
    }

    #[test]
    fn message_counts_finished_steps() {
        let mut progress = BatchProgress::new(0, 1, &steps(&["a", "b"]));
        progress.step_finished(&finished("a", StepStatus::Succeeded));
        assert_eq!(progress.message(), "Batch 1/1: a, b (1/2 done)");
    }

    #[test]
    fn finish_returns_records_in_arrival_order() {
        let mut progress = BatchProgress::new(0, 1, &steps(&["a", "b"]));
        progress.step_finished(&finished("b", StepStatus::Succeeded));
        progress.step_finished(&finished("a", StepStatus::Failed));

        let ids: Vec<_> = progress.finish().into_iter().map(|r| r.step).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn failed_batch_finishes_spinner_with_error() {
        let spinner = MockSpinner::new();
        let status = spinner.shared_status();
        let mut progress =
            BatchProgress::new(0, 1, &steps(&["a"])).with_spinner(Box::new(spinner), None);
        progress.step_finished(&finished("a", StepStatus::Failed));
        progress.finish();

        assert_eq!(*status.lock().unwrap(), Some(SpinnerStatus::Error));
    }

    #[test]
    fn fully_skipped_batch_finishes_spinner_as_skipped() {
        let spinner = MockSpinner::new();
        let status = spinner.shared_status();
        let mut progress =
            BatchProgress::new(0, 1, &steps(&["c"])).with_spinner(Box::new(spinner), None);
        let skipped = ExecutionRecord::skipped(
            &StepDescriptor::new("c", "c.py"),
            SkipReason::Blocked {
                chain: vec!["a".into()],
            },
        );
        progress.step_finished(&skipped);
        progress.finish();

        assert_eq!(*status.lock().unwrap(), Some(SpinnerStatus::Skipped));
    }
}
