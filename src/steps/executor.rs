//! Step execution.
//!
//! Runs one attempt of a step through an [`Invoker`] and folds the outcome
//! into its [`ExecutionRecord`]. The executor never retries.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use indexmap::IndexMap;
use regex::Regex;

use crate::error::PipewrightError;
use crate::shell::{CancelToken, CommandResult, OutputCallback, OutputLine};

use super::descriptor::StepDescriptor;
use super::invoker::{InvocationRequest, Invoker};
use super::record::{ExecutionRecord, StepFailure, StepStatus};

/// Stdout marker a component uses to publish a runtime output.
static OUTPUT_MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^::set-output name=([A-Za-z0-9_.-]+)::(.*)$")
        .expect("OUTPUT_MARKER_REGEX must compile")
});

/// Environment variable carrying the running step's id.
pub const STEP_ENV_VAR: &str = "PIPEWRIGHT_STEP";

/// Environment variable carrying the workflow name.
pub const WORKFLOW_ENV_VAR: &str = "PIPEWRIGHT_WORKFLOW";

/// Receives output lines tagged with the id of the step that produced them.
pub type StepOutputCallback = Arc<dyn Fn(&str, OutputLine) + Send + Sync>;

/// Run-wide settings shared by every step execution.
#[derive(Clone, Default)]
pub struct ExecutionContext {
    /// Workflow name, exported to components.
    pub workflow: String,
    /// Working directory for components.
    pub working_dir: Option<PathBuf>,
    /// Environment applied to every component.
    pub env: HashMap<String, String>,
    /// Timeout for steps without their own.
    pub timeout: Option<Duration>,
    /// Cancellation signal for the run.
    pub cancel: CancelToken,
    /// Receives output lines from every component.
    pub on_output: Option<StepOutputCallback>,
}

/// Executes steps through an invoker.
#[derive(Clone)]
pub struct StepExecutor {
    invoker: Arc<dyn Invoker>,
    context: ExecutionContext,
}

impl StepExecutor {
    pub fn new(invoker: Arc<dyn Invoker>, context: ExecutionContext) -> Self {
        Self { invoker, context }
    }

    /// Run-wide settings.
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    fn output_callback(&self, step: &StepDescriptor) -> Option<OutputCallback> {
        let callback = Arc::clone(self.context.on_output.as_ref()?);
        let id = step.id.clone();
        Some(Arc::new(move |line: OutputLine| callback(&id, line)))
    }

    /// Run a step once and return its finalized record.
    pub fn execute(&self, step: &StepDescriptor, arguments: Vec<String>) -> ExecutionRecord {
        self.complete(ExecutionRecord::begin(step), step, arguments)
    }

    /// Run one more attempt of a step, finalizing an already-open record.
    pub fn complete(
        &self,
        mut record: ExecutionRecord,
        step: &StepDescriptor,
        arguments: Vec<String>,
    ) -> ExecutionRecord {
        record.attempts += 1;
        record.arguments = arguments;
        record.outputs.clear();

        let env = self.environment(step);
        let timeout = step.timeout.or(self.context.timeout);
        let request = InvocationRequest {
            step,
            arguments: &record.arguments,
            working_dir: self.context.working_dir.as_deref(),
            env: &env,
            timeout,
            cancel: &self.context.cancel,
            on_output: self.output_callback(step),
        };

        let started = Instant::now();
        let outcome = self.invoker.invoke(&request);

        let failure = match outcome {
            Ok(result) => {
                let failure = classify(&result, timeout);
                record.duration = result.duration;
                record.exit_code = result.exit_code;
                record.stdout = result.stdout;
                record.stderr = result.stderr;
                match failure {
                    Some(failure) => Some(failure),
                    None => match collect_outputs(step, &record.stdout) {
                        Ok(outputs) => {
                            record.outputs = outputs;
                            None
                        }
                        Err(missing) => Some(missing),
                    },
                }
            }
            Err(err) => {
                record.duration = started.elapsed();
                record.exit_code = None;
                record.stdout.clear();
                record.stderr.clear();
                Some(StepFailure::Launch {
                    message: launch_message(err),
                })
            }
        };

        record.finished_at = Some(Utc::now());
        record.status = if failure.is_some() {
            StepStatus::Failed
        } else {
            StepStatus::Succeeded
        };

        match &failure {
            Some(f) => tracing::debug!(
                step = %step.id,
                attempt = record.attempts,
                "Step failed: {}",
                f.describe()
            ),
            None => tracing::debug!(
                step = %step.id,
                attempt = record.attempts,
                duration_ms = record.duration.as_millis() as u64,
                "Step succeeded"
            ),
        }

        record.failure = failure;
        record
    }

    fn environment(&self, step: &StepDescriptor) -> HashMap<String, String> {
        let mut env = self.context.env.clone();
        env.extend(step.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env.insert(STEP_ENV_VAR.to_string(), step.id.clone());
        env.insert(WORKFLOW_ENV_VAR.to_string(), self.context.workflow.clone());
        env
    }
}

fn classify(result: &CommandResult, timeout: Option<Duration>) -> Option<StepFailure> {
    if result.timed_out {
        let after = timeout.unwrap_or(result.duration);
        return Some(StepFailure::Timeout {
            after_ms: after.as_millis() as u64,
        });
    }
    if result.cancelled {
        return Some(StepFailure::Cancelled);
    }
    if !result.success {
        return Some(StepFailure::Exit {
            code: result.exit_code,
        });
    }
    None
}

/// Outputs of a successful step: its text parameters, then the declared
/// runtime outputs found in stdout.
fn collect_outputs(
    step: &StepDescriptor,
    stdout: &str,
) -> std::result::Result<IndexMap<String, String>, StepFailure> {
    let mut outputs = IndexMap::new();

    for (name, value) in &step.parameters {
        if let Some(text) = value.as_text() {
            outputs.insert(name.clone(), text.to_string());
        }
    }

    for line in stdout.lines() {
        let Some(caps) = OUTPUT_MARKER_REGEX.captures(line.trim_end()) else {
            continue;
        };
        let name = &caps[1];
        if step.outputs.iter().any(|o| o == name) {
            outputs.insert(name.to_string(), caps[2].to_string());
        } else {
            tracing::debug!(step = %step.id, output = name, "Ignoring undeclared output");
        }
    }

    if let Some(missing) = step.outputs.iter().find(|o| !outputs.contains_key(*o)) {
        return Err(StepFailure::MissingOutput {
            output: missing.clone(),
        });
    }

    Ok(outputs)
}

fn launch_message(err: PipewrightError) -> String {
    match err {
        PipewrightError::Launch { message, .. } => message,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::{FnInvoker, ParameterValue};
    use std::sync::Mutex;

    fn executor<F>(func: F) -> StepExecutor
    where
        F: Fn(&InvocationRequest<'_>) -> crate::error::Result<CommandResult>
            + Send
            + Sync
            + 'static,
    {
        StepExecutor::new(
            Arc::new(FnInvoker::new(func)),
            ExecutionContext {
                workflow: "sales".into(),
                ..Default::default()
            },
        )
    }

    fn ok(stdout: &str) -> crate::error::Result<CommandResult> {
        Ok(CommandResult::success(
            stdout.to_string(),
            String::new(),
            Duration::from_millis(5),
        ))
    }

    #[test]
    fn success_records_text_parameters_as_outputs() {
        let step = StepDescriptor::new("load", "src/load.py")
            .parameter("output", ParameterValue::text("data/loaded.csv"))
            .parameter("verbose", ParameterValue::switch(true));
        let record = executor(|_| ok("loaded 10 rows\n")).execute(
            &step,
            vec!["--output".into(), "data/loaded.csv".into(), "--verbose".into()],
        );

        assert_eq!(record.status, StepStatus::Succeeded);
        assert_eq!(record.attempts, 1);
        assert_eq!(record.output("output"), Some("data/loaded.csv"));
        assert_eq!(record.output("verbose"), None);
        assert!(record.stdout.contains("loaded 10 rows"));
        assert!(record.finished_at.is_some());
    }

    #[test]
    fn runtime_outputs_are_read_from_markers() {
        let step = StepDescriptor::new("stage", "stage.sh").output("temp_dir");
        let record = executor(|_| ok("working\n::set-output name=temp_dir::/tmp/run-42\n::set-output name=other::x\n"))
            .execute(&step, vec![]);

        assert_eq!(record.status, StepStatus::Succeeded);
        assert_eq!(record.output("temp_dir"), Some("/tmp/run-42"));
        assert_eq!(record.output("other"), None);
    }

    #[test]
    fn missing_declared_output_fails_step() {
        let step = StepDescriptor::new("stage", "stage.sh").output("temp_dir");
        let record = executor(|_| ok("nothing here\n")).execute(&step, vec![]);

        assert_eq!(record.status, StepStatus::Failed);
        assert_eq!(
            record.failure,
            Some(StepFailure::MissingOutput {
                output: "temp_dir".into()
            })
        );
        assert!(record.outputs.is_empty());
    }

    #[test]
    fn non_zero_exit_is_execution_failure() {
        let step = StepDescriptor::new("clean", "clean.py");
        let record = executor(|_| {
            Ok(CommandResult::failure(
                Some(2),
                String::new(),
                "bad input\n".into(),
                Duration::ZERO,
            ))
        })
        .execute(&step, vec![]);

        assert_eq!(record.status, StepStatus::Failed);
        assert_eq!(record.exit_code, Some(2));
        assert_eq!(record.failure, Some(StepFailure::Exit { code: Some(2) }));
        assert!(record.stderr.contains("bad input"));
    }

    #[test]
    fn launch_error_is_launch_failure() {
        let step = StepDescriptor::new("load", "missing.py");
        let record = executor(|req| {
            Err(PipewrightError::Launch {
                step: req.step.id.clone(),
                component: req.step.component.clone(),
                message: "No such file or directory".into(),
            })
        })
        .execute(&step, vec![]);

        assert_eq!(record.status, StepStatus::Failed);
        assert_eq!(
            record.failure,
            Some(StepFailure::Launch {
                message: "No such file or directory".into()
            })
        );
    }

    #[test]
    fn timed_out_result_is_timeout_failure() {
        let mut step = StepDescriptor::new("slow", "slow.sh");
        step.timeout = Some(Duration::from_secs(3));
        let record = executor(|_| {
            let mut result =
                CommandResult::failure(None, String::new(), String::new(), Duration::from_secs(3));
            result.timed_out = true;
            Ok(result)
        })
        .execute(&step, vec![]);

        assert_eq!(record.failure, Some(StepFailure::Timeout { after_ms: 3000 }));
    }

    #[test]
    fn components_see_step_and_workflow_env() {
        let seen = Arc::new(Mutex::new(HashMap::new()));
        let sink = Arc::clone(&seen);
        let mut step = StepDescriptor::new("load", "load.py");
        step.env.insert("REGION".into(), "eu".into());

        executor(move |req| {
            *sink.lock().unwrap() = req.env.clone();
            ok("")
        })
        .execute(&step, vec![]);

        let env = seen.lock().unwrap();
        assert_eq!(env.get(STEP_ENV_VAR).map(String::as_str), Some("load"));
        assert_eq!(env.get(WORKFLOW_ENV_VAR).map(String::as_str), Some("sales"));
        assert_eq!(env.get("REGION").map(String::as_str), Some("eu"));
    }

    #[test]
    fn complete_counts_attempts_on_same_record() {
        let step = StepDescriptor::new("flaky", "flaky.sh");
        let exec = executor(|_| ok(""));
        let first = exec.execute(&step, vec![]);
        let second = exec.complete(first, &step, vec![]);
        assert_eq!(second.attempts, 2);
    }

    #[test]
    fn output_lines_are_tagged_with_step_id() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let exec = StepExecutor::new(
            Arc::new(FnInvoker::new(|req: &InvocationRequest<'_>| {
                if let Some(callback) = &req.on_output {
                    callback(OutputLine::Stdout("rows: 12".into()));
                }
                ok("")
            })),
            ExecutionContext {
                on_output: Some(Arc::new(move |step: &str, line: OutputLine| {
                    if let OutputLine::Stdout(text) = line {
                        sink.lock().unwrap().push(format!("{}: {}", step, text));
                    }
                })),
                ..Default::default()
            },
        );

        exec.execute(&StepDescriptor::new("load", "load.py"), vec![]);
        assert_eq!(*lines.lock().unwrap(), vec!["load: rows: 12".to_string()]);
    }
}
