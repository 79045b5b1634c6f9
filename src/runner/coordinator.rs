//! Run coordination.
//!
//! [`RunCoordinator`] drives a validated workflow through its batches. Steps
//! inside a batch run on scoped worker threads; their records come back over
//! a channel and are folded into the [`RunState`] on the coordinator thread,
//! so the state never needs a lock. A batch is fully settled before the next
//! one resolves its parameters.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::{Settings, WorkflowDefinition, DEFAULT_MAX_PARALLEL};
use crate::error::{PipewrightError, Result};
use crate::shell::CancelToken;
use crate::steps::{
    resolve, ExecutionContext, ExecutionRecord, Invoker, SkipReason, StepDescriptor,
    StepExecutor, StepFailure, StepOutputCallback,
};

use super::report::{RunReport, RunStatus};
use super::scheduler;
use super::state::RunState;

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Nothing has happened yet.
    Pending,
    /// The graph is being ordered into batches.
    Scheduling,
    /// Batches are being executed.
    Dispatching,
    /// Every step succeeded.
    Completed,
    /// At least one step failed.
    Failed,
    /// The run stopped before any step was dispatched.
    Aborted,
}

impl RunPhase {
    /// Check if this is a terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted)
    }

    /// Whether moving from this phase to `next` is allowed.
    pub fn can_advance_to(&self, next: RunPhase) -> bool {
        use RunPhase::*;
        matches!(
            (*self, next),
            (Pending, Scheduling)
                | (Pending, Aborted)
                | (Scheduling, Dispatching)
                | (Scheduling, Aborted)
                | (Dispatching, Completed)
                | (Dispatching, Failed)
        )
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunPhase::Pending => "pending",
            RunPhase::Scheduling => "scheduling",
            RunPhase::Dispatching => "dispatching",
            RunPhase::Completed => "completed",
            RunPhase::Failed => "failed",
            RunPhase::Aborted => "aborted",
        };
        write!(f, "{}", s)
    }
}

/// Progress events emitted during a run, always on the calling thread.
#[derive(Debug)]
pub enum RunProgress<'a> {
    /// The run moved to a new phase.
    Phase(RunPhase),
    /// A batch is about to be dispatched.
    BatchStarting {
        index: usize,
        total: usize,
        steps: &'a [String],
    },
    /// A step attempt is starting.
    StepStarting { step: &'a str, attempt: u32 },
    /// A step finished (successfully or not).
    StepFinished { record: &'a ExecutionRecord },
    /// A step will not run.
    StepSkipped { record: &'a ExecutionRecord },
}

/// Options for running a workflow.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Stop after the first failure, cancelling in-flight siblings.
    pub fail_fast: bool,
    /// Timeout for each step that does not set its own.
    pub timeout: Option<Duration>,
    /// Maximum concurrent steps inside one batch.
    pub max_parallel: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            fail_fast: false,
            timeout: None,
            max_parallel: DEFAULT_MAX_PARALLEL,
        }
    }
}

impl RunOptions {
    /// Options taken from a workflow's settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            fail_fast: settings.fail_fast,
            timeout: settings.timeout_seconds.map(Duration::from_secs),
            max_parallel: settings.max_parallel.unwrap_or(DEFAULT_MAX_PARALLEL),
        }
    }
}

enum WorkerEvent<'g> {
    Starting {
        step: &'g str,
        attempt: u32,
    },
    Finished(&'g StepDescriptor, ExecutionRecord),
    /// Cancellation arrived before the step was started.
    NotStarted(&'g StepDescriptor),
}

/// Drives a workflow from validated graph to run report.
pub struct RunCoordinator {
    invoker: Arc<dyn Invoker>,
    options: RunOptions,
    on_output: Option<StepOutputCallback>,
}

impl RunCoordinator {
    /// Create a coordinator that runs components through `invoker`.
    pub fn new(invoker: Arc<dyn Invoker>, options: RunOptions) -> Self {
        Self {
            invoker,
            options,
            on_output: None,
        }
    }

    /// Forward component output lines to `callback` as they arrive.
    pub fn with_output(mut self, callback: StepOutputCallback) -> Self {
        self.on_output = Some(callback);
        self
    }

    /// Effective options.
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run a workflow to completion.
    pub fn run(&self, workflow: &WorkflowDefinition) -> Result<RunReport> {
        self.run_with_progress(workflow, |_| {})
    }

    /// Run a workflow, reporting progress as it goes.
    ///
    /// Step failures are recorded in the report. An error is returned only
    /// when the graph cannot be scheduled. A reference that cannot be
    /// resolved stops the run: the report keeps every record made so far,
    /// marks the remaining steps as not run, and carries the error.
    pub fn run_with_progress(
        &self,
        workflow: &WorkflowDefinition,
        mut on_progress: impl FnMut(RunProgress<'_>),
    ) -> Result<RunReport> {
        let started_at = Utc::now();
        let start = Instant::now();
        let graph = &workflow.graph;
        let mut phase = RunPhase::Pending;

        info!(workflow = %workflow.name, steps = graph.len(), "Starting run");

        advance(&mut phase, RunPhase::Scheduling, &mut on_progress);
        let batches = match scheduler::order(graph) {
            Ok(batches) => batches,
            Err(e) => {
                advance(&mut phase, RunPhase::Aborted, &mut on_progress);
                return Err(e);
            }
        };
        debug!(batches = batches.len(), "Scheduled run");

        advance(&mut phase, RunPhase::Dispatching, &mut on_progress);

        let executor = StepExecutor::new(
            Arc::clone(&self.invoker),
            ExecutionContext {
                workflow: workflow.name.clone(),
                working_dir: workflow.working_dir(),
                env: workflow.settings.env.clone(),
                timeout: self.options.timeout,
                cancel: CancelToken::new(),
                on_output: self.on_output.clone(),
            },
        );

        let mut state = RunState::new(graph);
        let mut trigger: Option<String> = None;
        let mut interrupted: Option<(String, PipewrightError)> = None;

        'batches: for (index, batch) in batches.iter().enumerate() {
            on_progress(RunProgress::BatchStarting {
                index,
                total: batches.len(),
                steps: batch,
            });

            let mut ready = Vec::new();
            for step in batch.iter().filter_map(|id| graph.step(id)) {
                let skip = match (state.blocking_chain(graph, &step.id), &trigger) {
                    (Some(chain), _) => Some(SkipReason::Blocked { chain }),
                    (None, Some(trigger)) => Some(SkipReason::FailFast {
                        trigger: trigger.clone(),
                    }),
                    (None, None) => None,
                };

                if let Some(reason) = skip {
                    debug!(step = %step.id, "Skipping: {}", reason.describe());
                    let record = ExecutionRecord::skipped(step, reason);
                    on_progress(RunProgress::StepSkipped { record: &record });
                    state.insert(record);
                    continue;
                }

                match resolve(step, &state) {
                    Ok(arguments) => ready.push((step, arguments)),
                    Err(err) => {
                        interrupted = Some((step.id.clone(), err));
                        break 'batches;
                    }
                }
            }

            self.dispatch_batch(
                &executor,
                ready,
                &mut state,
                &mut trigger,
                &mut on_progress,
            );
        }

        // Every step still without a record is reported as not run.
        if let Some((stopped_at, err)) = &interrupted {
            error!(step = %stopped_at, "Run stopped: {}", err);
            let pending: Vec<_> = graph
                .steps()
                .iter()
                .filter(|s| state.is_pending(&s.id))
                .collect();
            for step in pending {
                let record = ExecutionRecord::skipped(
                    step,
                    SkipReason::Interrupted {
                        step: stopped_at.clone(),
                    },
                );
                on_progress(RunProgress::StepSkipped { record: &record });
                state.insert(record);
            }
        }

        let status = if interrupted.is_some() || state.has_failures() {
            advance(&mut phase, RunPhase::Failed, &mut on_progress);
            RunStatus::Failed
        } else {
            advance(&mut phase, RunPhase::Completed, &mut on_progress);
            RunStatus::Completed
        };

        let duration = start.elapsed();
        info!(
            workflow = %workflow.name,
            status = %status,
            duration_ms = duration.as_millis() as u64,
            "Run finished"
        );

        Ok(RunReport {
            workflow: workflow.name.clone(),
            status,
            started_at,
            duration,
            batches,
            steps: state.into_records(graph),
            abort_reason: None,
            issues: Vec::new(),
            error: interrupted.map(|(_, err)| err.to_string()),
        })
    }

    /// Run every ready step of one batch and wait for all of them.
    fn dispatch_batch<'g>(
        &self,
        executor: &StepExecutor,
        ready: Vec<(&'g StepDescriptor, Vec<String>)>,
        state: &mut RunState,
        trigger: &mut Option<String>,
        on_progress: &mut impl FnMut(RunProgress<'_>),
    ) {
        if ready.is_empty() {
            return;
        }

        let workers = self.options.max_parallel.max(1).min(ready.len());
        let cancel = executor.context().cancel.clone();
        let fail_fast = self.options.fail_fast;

        // Records are opened here, right before the steps are handed out.
        let queue: Mutex<VecDeque<_>> = Mutex::new(
            ready
                .into_iter()
                .map(|(step, args)| (step, args, ExecutionRecord::begin(step)))
                .collect(),
        );
        let (tx, rx) = mpsc::channel::<WorkerEvent<'g>>();

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let queue = &queue;
                let cancel = &cancel;
                scope.spawn(move || loop {
                    let job = queue.lock().ok().and_then(|mut q| q.pop_front());
                    let Some((step, args, record)) = job else {
                        break;
                    };

                    if cancel.is_cancelled() {
                        let _ = tx.send(WorkerEvent::NotStarted(step));
                        continue;
                    }

                    let record = run_attempts(executor, step, args, record, &tx);
                    if fail_fast && !record.is_success() {
                        cancel.cancel();
                    }
                    let _ = tx.send(WorkerEvent::Finished(step, record));
                });
            }
            drop(tx);

            let mut not_started = Vec::new();
            for event in rx {
                match event {
                    WorkerEvent::Starting { step, attempt } => {
                        on_progress(RunProgress::StepStarting { step, attempt });
                    }
                    WorkerEvent::Finished(step, record) => {
                        if !record.is_success() {
                            match &record.failure {
                                Some(failure) => warn!(step = %step.id, "{}", failure.to_error(step)),
                                None => warn!(step = %step.id, "Step failed"),
                            }
                            if fail_fast && trigger.is_none() {
                                info!(step = %record.step, "Fail-fast: cancelling remaining steps");
                                *trigger = Some(record.step.clone());
                            }
                        }
                        on_progress(RunProgress::StepFinished { record: &record });
                        state.insert(record);
                    }
                    WorkerEvent::NotStarted(step) => not_started.push(step),
                }
            }

            // The failure that cancelled these may be reported after them.
            for step in not_started {
                let record = ExecutionRecord::skipped(
                    step,
                    SkipReason::FailFast {
                        trigger: trigger.clone().unwrap_or_default(),
                    },
                );
                on_progress(RunProgress::StepSkipped { record: &record });
                state.insert(record);
            }
        });
    }
}

/// Execute a step, retrying failed attempts up to the step's retry count.
fn run_attempts<'g>(
    executor: &StepExecutor,
    step: &'g StepDescriptor,
    arguments: Vec<String>,
    mut record: ExecutionRecord,
    events: &mpsc::Sender<WorkerEvent<'g>>,
) -> ExecutionRecord {
    let cancel = &executor.context().cancel;
    loop {
        let _ = events.send(WorkerEvent::Starting {
            step: &step.id,
            attempt: record.attempts + 1,
        });
        record = executor.complete(record, step, arguments.clone());

        let retryable = !record.is_success()
            && record.attempts <= step.retry
            && record.failure != Some(StepFailure::Cancelled)
            && !cancel.is_cancelled();
        if !retryable {
            return record;
        }
        debug!(
            step = %step.id,
            attempt = record.attempts,
            retries = step.retry,
            "Retrying failed step"
        );
    }
}

fn advance(
    phase: &mut RunPhase,
    next: RunPhase,
    on_progress: &mut impl FnMut(RunProgress<'_>),
) {
    debug_assert!(
        phase.can_advance_to(next),
        "invalid run phase transition {} -> {}",
        phase,
        next
    );
    debug!("Run phase {} -> {}", phase, next);
    *phase = next;
    on_progress(RunProgress::Phase(next));
}
