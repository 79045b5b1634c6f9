//! Component invocation.
//!
//! The [`Invoker`] trait is the single seam between the orchestrator and
//! whatever actually runs a step. [`ProcessInvoker`] launches external
//! programs; [`FnInvoker`] runs a closure in-process.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{PipewrightError, Result};
use crate::shell::platform::interpreter_for;
use crate::shell::{execute_streaming, CancelToken, CommandOptions, CommandResult, OutputCallback};

use super::descriptor::StepDescriptor;

/// Everything an invoker needs to run one attempt of a step.
pub struct InvocationRequest<'a> {
    /// The step being run.
    pub step: &'a StepDescriptor,
    /// Resolved argument list.
    pub arguments: &'a [String],
    /// Working directory, if not the current one.
    pub working_dir: Option<&'a Path>,
    /// Extra environment for the component.
    pub env: &'a HashMap<String, String>,
    /// Upper bound on run time.
    pub timeout: Option<Duration>,
    /// Cooperative cancellation signal.
    pub cancel: &'a CancelToken,
    /// Receives output lines as they are produced.
    pub on_output: Option<OutputCallback>,
}

/// An invocable unit of work.
///
/// Returns `Err` only when the component could not be started at all; any
/// non-success outcome after launch is reported through [`CommandResult`].
pub trait Invoker: Send + Sync {
    fn invoke(&self, request: &InvocationRequest<'_>) -> Result<CommandResult>;
}

/// Launches components as child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessInvoker {
    default_interpreter: Option<String>,
}

impl ProcessInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interpreter used for steps that do not name their own.
    pub fn with_default_interpreter(mut self, interpreter: Option<String>) -> Self {
        self.default_interpreter = interpreter;
        self
    }

    /// Program and arguments that will be executed for `step`.
    pub fn command_line(&self, step: &StepDescriptor, arguments: &[String]) -> Result<Vec<String>> {
        let component: Vec<&str> = step.component.split_whitespace().collect();
        let Some(first) = component.first() else {
            return Err(PipewrightError::Launch {
                step: step.id.clone(),
                component: step.component.clone(),
                message: "component is empty".to_string(),
            });
        };

        let interpreter = step
            .interpreter
            .as_deref()
            .or(self.default_interpreter.as_deref())
            .or_else(|| interpreter_for(first));

        let mut line: Vec<String> = interpreter
            .map(|i| i.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        line.extend(component.iter().map(|w| w.to_string()));
        line.extend(arguments.iter().cloned());
        Ok(line)
    }
}

impl Invoker for ProcessInvoker {
    fn invoke(&self, request: &InvocationRequest<'_>) -> Result<CommandResult> {
        let line = self.command_line(request.step, request.arguments)?;
        let (program, args) = line.split_first().ok_or_else(|| PipewrightError::Launch {
            step: request.step.id.clone(),
            component: request.step.component.clone(),
            message: "nothing to execute".to_string(),
        })?;

        tracing::debug!(step = %request.step.id, command = ?line, "Launching component");

        let options = CommandOptions {
            cwd: request.working_dir.map(Path::to_path_buf),
            env: request.env.clone(),
            timeout: request.timeout,
            cancel: Some(request.cancel.clone()),
        };

        execute_streaming(program, args, &options, request.on_output.clone()).map_err(|e| {
            PipewrightError::Launch {
                step: request.step.id.clone(),
                component: request.step.component.clone(),
                message: e.to_string(),
            }
        })
    }
}

/// Runs a closure in place of an external component.
pub struct FnInvoker<F> {
    func: F,
}

impl<F> FnInvoker<F>
where
    F: Fn(&InvocationRequest<'_>) -> Result<CommandResult> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Invoker for FnInvoker<F>
where
    F: Fn(&InvocationRequest<'_>) -> Result<CommandResult> + Send + Sync,
{
    fn invoke(&self, request: &InvocationRequest<'_>) -> Result<CommandResult> {
        (self.func)(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(
        step: &'a StepDescriptor,
        args: &'a [String],
        env: &'a HashMap<String, String>,
        cancel: &'a CancelToken,
    ) -> InvocationRequest<'a> {
        InvocationRequest {
            step,
            arguments: args,
            working_dir: None,
            env,
            timeout: None,
            cancel,
            on_output: None,
        }
    }

    #[test]
    fn python_component_gets_interpreter() {
        let step = StepDescriptor::new("load", "src/load.py");
        let line = ProcessInvoker::new()
            .command_line(&step, &["--output".into(), "data/x.csv".into()])
            .unwrap();
        assert!(line[0].starts_with("python"));
        assert_eq!(&line[1..], ["src/load.py", "--output", "data/x.csv"]);
    }

    #[test]
    fn step_interpreter_beats_default() {
        let mut step = StepDescriptor::new("load", "src/load.py");
        step.interpreter = Some("python3 -u".into());
        let line = ProcessInvoker::new()
            .with_default_interpreter(Some("pypy3".into()))
            .command_line(&step, &[])
            .unwrap();
        assert_eq!(line, vec!["python3", "-u", "src/load.py"]);
    }

    #[test]
    fn default_interpreter_applies_to_plain_components() {
        let step = StepDescriptor::new("export", "tools/export");
        let line = ProcessInvoker::new()
            .with_default_interpreter(Some("bash".into()))
            .command_line(&step, &[])
            .unwrap();
        assert_eq!(line, vec!["bash", "tools/export"]);
    }

    #[test]
    fn multi_word_component_is_split() {
        let step = StepDescriptor::new("echo", "sh -c");
        let line = ProcessInvoker::new()
            .command_line(&step, &["echo hi".into()])
            .unwrap();
        assert_eq!(line, vec!["sh", "-c", "echo hi"]);
    }

    #[test]
    fn blank_component_is_launch_error() {
        let step = StepDescriptor::new("empty", "  ");
        let err = ProcessInvoker::new().command_line(&step, &[]).unwrap_err();
        assert!(matches!(err, PipewrightError::Launch { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn process_invoker_runs_component() {
        let step = StepDescriptor::new("greet", "sh -c");
        let args = vec!["echo \"$PIPEWRIGHT_STEP\"".to_string()];
        let mut env = HashMap::new();
        env.insert("PIPEWRIGHT_STEP".to_string(), "greet".to_string());
        let cancel = CancelToken::new();

        let result = ProcessInvoker::new()
            .invoke(&request(&step, &args, &env, &cancel))
            .unwrap();
        assert!(result.success);
        assert_eq!(result.stdout.trim(), "greet");
    }

    #[cfg(unix)]
    #[test]
    fn unlaunchable_component_is_launch_error() {
        let step = StepDescriptor::new("missing", "/nonexistent/pipewright/tool");
        let env = HashMap::new();
        let cancel = CancelToken::new();

        let err = ProcessInvoker::new()
            .invoke(&request(&step, &[], &env, &cancel))
            .unwrap_err();
        assert!(matches!(err, PipewrightError::Launch { ref step, .. } if step == "missing"));
    }

    #[test]
    fn fn_invoker_sees_arguments() {
        let invoker = FnInvoker::new(|req: &InvocationRequest<'_>| {
            Ok(CommandResult::success(
                req.arguments.join(" "),
                String::new(),
                Duration::ZERO,
            ))
        });
        let step = StepDescriptor::new("s", "s");
        let args = vec!["--a".to_string(), "1".to_string()];
        let env = HashMap::new();
        let cancel = CancelToken::new();

        let result = invoker.invoke(&request(&step, &args, &env, &cancel)).unwrap();
        assert_eq!(result.stdout, "--a 1");
    }
}
