//! Run command implementation.
//!
//! The `pipewright run` command executes a workflow. Command-line flags
//! override the workflow's `settings`, which override the defaults.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use console::Style;

use crate::cli::args::RunArgs;
use crate::config::WorkflowDefinition;
use crate::error::Result;
use crate::runner::{scheduler, RunCoordinator, RunOptions, RunProgress, RunReport};
use crate::shell::OutputLine;
use crate::steps::{ExecutionRecord, Invoker, ProcessInvoker, StepOutputCallback, StepStatus};
use crate::ui::{BatchProgress, LiveOutput, OutputMode, UserInterface};

use super::dispatcher::{Command, CommandResult};
use super::display::{exit_code_for, resolve_path, show_error, workflow_label};
use super::plan::show_plan;

/// Live output lines kept under a batch spinner.
const LIVE_OUTPUT_LINES: usize = 2;

/// The run command implementation.
pub struct RunCommand {
    project_root: PathBuf,
    args: RunArgs,
}

impl RunCommand {
    /// Create a new run command.
    pub fn new(project_root: &Path, args: RunArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            args,
        }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &RunArgs {
        &self.args
    }

    /// Run options: flags first, then workflow settings, then defaults.
    pub fn build_options(&self, definition: &WorkflowDefinition) -> RunOptions {
        let mut options = RunOptions::from_settings(&definition.settings);
        if self.args.fail_fast {
            options.fail_fast = true;
        }
        if let Some(secs) = self.args.timeout_seconds {
            options.timeout = Some(Duration::from_secs(secs));
        }
        if let Some(max) = self.args.max_parallel {
            options.max_parallel = max as usize;
        }
        options
    }

    /// Run a loaded workflow through `invoker`.
    pub fn run_with(
        &self,
        ui: &mut dyn UserInterface,
        definition: &WorkflowDefinition,
        invoker: Arc<dyn Invoker>,
    ) -> Result<CommandResult> {
        if self.args.json {
            ui.set_output_mode(OutputMode::Silent);
        }
        let mode = ui.output_mode();
        let spinners = mode.shows_spinners() && ui.is_interactive();
        let live = spinners.then(|| LiveOutput::new(LIVE_OUTPUT_LINES));

        let mut coordinator = RunCoordinator::new(invoker, self.build_options(definition));
        if mode.shows_command_output() {
            coordinator = coordinator.with_output(stream_output());
        } else if let Some(live) = &live {
            coordinator = coordinator.with_output(live.callback());
        }

        let batch_count = scheduler::order(&definition.graph)
            .map(|b| b.len())
            .unwrap_or_default();
        ui.show_run_header(&definition.name, definition.steps().len(), batch_count);

        let mut current: Option<BatchProgress> = None;
        let outcome = coordinator.run_with_progress(definition, |event| match event {
            RunProgress::BatchStarting {
                index,
                total,
                steps,
            } => {
                if let Some(done) = current.take() {
                    show_batch_results(ui, done);
                }
                let progress = BatchProgress::new(index, total, steps);
                current = Some(if spinners {
                    let spinner = ui.start_spinner(progress.label());
                    progress.with_spinner(spinner, live.as_ref())
                } else {
                    ui.show_batch(index, total, steps);
                    progress
                });
            }
            RunProgress::StepStarting { step, attempt } if attempt > 1 => {
                tracing::info!(step, attempt, "Retrying step");
            }
            RunProgress::StepFinished { record } | RunProgress::StepSkipped { record } => {
                match current.as_mut() {
                    Some(progress) => progress.step_finished(record),
                    None => show_record(ui, record),
                }
            }
            _ => {}
        });
        if let Some(done) = current.take() {
            show_batch_results(ui, done);
        }

        match outcome {
            Ok(report) => {
                ui.show_run_summary(&report);
                self.emit(&report)?;
                Ok(CommandResult::from_exit_code(report.exit_code()))
            }
            Err(err) => {
                if !self.args.json {
                    show_error(ui, &err);
                }
                self.emit(&RunReport::aborted(&definition.name, &err))?;
                Ok(CommandResult::failure(exit_code_for(&err)))
            }
        }
    }

    /// Print and/or write the JSON report as requested.
    fn emit(&self, report: &RunReport) -> Result<()> {
        if self.args.json {
            println!("{}", report.to_json()?);
        }
        if let Some(path) = &self.args.report {
            let path = resolve_path(&self.project_root, path);
            report.write_json(&path)?;
            tracing::debug!(path = %path.display(), "Wrote run report");
        }
        Ok(())
    }
}

impl Command for RunCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let path = resolve_path(&self.project_root, &self.args.workflow);
        let definition = match WorkflowDefinition::load(&path) {
            Ok(definition) => definition,
            Err(err) => {
                if !self.args.json {
                    show_error(ui, &err);
                }
                self.emit(&RunReport::aborted(workflow_label(&path), &err))?;
                return Ok(CommandResult::failure(exit_code_for(&err)));
            }
        };

        if self.args.dry_run {
            return show_plan(ui, &definition, self.args.json);
        }

        let invoker =
            ProcessInvoker::new().with_default_interpreter(definition.settings.interpreter.clone());
        self.run_with(ui, &definition, Arc::new(invoker))
    }
}

fn show_record(ui: &mut dyn UserInterface, record: &ExecutionRecord) {
    ui.show_step(record);
    if record.status == StepStatus::Failed {
        ui.show_failure_output(record);
    }
}

fn show_batch_results(ui: &mut dyn UserInterface, progress: BatchProgress) {
    for record in progress.finish() {
        show_record(ui, &record);
    }
}

/// Echo component output as it arrives, prefixed with the step id.
fn stream_output() -> StepOutputCallback {
    let prefix = Style::new().dim();
    Arc::new(move |step: &str, line: OutputLine| {
        let tag = prefix.apply_to(format!("{} │", step));
        match line {
            OutputLine::Stdout(text) => println!("    {} {}", tag, text),
            OutputLine::Stderr(text) => eprintln!("    {} {}", tag, text),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipewrightError;
    use crate::shell::CommandResult as ProcessResult;
    use crate::steps::{FnInvoker, InvocationRequest};
    use crate::ui::MockUI;
    use std::fs;
    use tempfile::TempDir;

    const PIPELINE: &str = r#"
name: sales
settings:
  timeout_seconds: 60
  max_parallel: 2
steps:
  - id: load
    component: src/load.py
    parameters:
      output: data/loaded.csv
  - id: clean
    component: src/clean.py
    depends_on: [load]
    parameters:
      input: "${steps.load.output}"
  - id: audit
    component: src/audit.py
"#;

    fn definition(yaml: &str) -> WorkflowDefinition {
        let config = crate::config::parse_workflow(yaml, Path::new("pipeline.yml")).unwrap();
        WorkflowDefinition::from_config(config, PathBuf::from(".")).unwrap()
    }

    fn scripted<F>(func: F) -> Arc<dyn Invoker>
    where
        F: Fn(&InvocationRequest<'_>) -> Result<ProcessResult> + Send + Sync + 'static,
    {
        Arc::new(FnInvoker::new(func))
    }

    fn ok() -> Result<ProcessResult> {
        Ok(ProcessResult::success(
            String::new(),
            String::new(),
            Duration::from_millis(1),
        ))
    }

    fn command(args: RunArgs) -> RunCommand {
        RunCommand::new(Path::new("."), args)
    }

    #[test]
    fn options_come_from_settings() {
        let options = command(RunArgs::new("p.yml")).build_options(&definition(PIPELINE));
        assert_eq!(options.timeout, Some(Duration::from_secs(60)));
        assert_eq!(options.max_parallel, 2);
        assert!(!options.fail_fast);
    }

    #[test]
    fn flags_override_settings() {
        let args = RunArgs {
            fail_fast: true,
            timeout_seconds: Some(5),
            max_parallel: Some(1),
            ..RunArgs::new("p.yml")
        };
        let options = command(args).build_options(&definition(PIPELINE));
        assert!(options.fail_fast);
        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
        assert_eq!(options.max_parallel, 1);
    }

    #[test]
    fn successful_run_exits_zero() {
        let mut ui = MockUI::new();
        let result = command(RunArgs::new("p.yml"))
            .run_with(&mut ui, &definition(PIPELINE), scripted(|_| ok()))
            .unwrap();

        assert!(result.success);
        assert_eq!(ui.run_headers()[0], ("sales".to_string(), 3, 2));
        assert_eq!(ui.batches().len(), 2);
        assert_eq!(ui.steps().len(), 3);
        assert!(ui.summaries()[0].is_success());
    }

    #[test]
    fn step_failure_exits_one_and_shows_blocked_chain() {
        let mut ui = MockUI::new();
        let invoker = scripted(|req| {
            if req.step.id == "load" {
                Ok(ProcessResult::failure(
                    Some(2),
                    String::new(),
                    "boom".into(),
                    Duration::ZERO,
                ))
            } else {
                ok()
            }
        });
        let result = command(RunArgs::new("p.yml"))
            .run_with(&mut ui, &definition(PIPELINE), invoker)
            .unwrap();

        assert_eq!(result.exit_code, 1);
        assert_eq!(ui.failure_outputs(), &["load"]);

        let summary = &ui.summaries()[0];
        assert_eq!(summary.record("audit").unwrap().status, StepStatus::Succeeded);
        let clean = summary.record("clean").unwrap();
        assert_eq!(clean.status, StepStatus::Skipped);
        assert_eq!(clean.detail().unwrap(), "blocked by load (failed)");
    }

    #[test]
    fn unresolved_reference_exits_three() {
        let err = PipewrightError::UnresolvedReference {
            step: "clean".into(),
            source_step: "load".into(),
            output: "output".into(),
        };
        assert_eq!(exit_code_for(&err), 3);
    }

    #[test]
    fn report_file_is_written() {
        let temp = TempDir::new().unwrap();
        let args = RunArgs {
            report: Some(PathBuf::from("report.json")),
            ..RunArgs::new("p.yml")
        };
        let mut ui = MockUI::new();
        RunCommand::new(temp.path(), args)
            .run_with(&mut ui, &definition(PIPELINE), scripted(|_| ok()))
            .unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(temp.path().join("report.json")).unwrap())
                .unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["steps"][1]["arguments"][1], "data/loaded.csv");
    }

    #[test]
    fn invalid_workflow_is_aborted_with_report() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("p.yml"), "name: broken\n").unwrap();
        let args = RunArgs {
            report: Some(PathBuf::from("report.json")),
            ..RunArgs::new("p.yml")
        };
        let mut ui = MockUI::new();
        let result = RunCommand::new(temp.path(), args).execute(&mut ui).unwrap();

        assert_eq!(result.exit_code, 2);
        assert!(ui.has_error("missing-steps"));
        let report = fs::read_to_string(temp.path().join("report.json")).unwrap();
        assert!(report.contains("\"status\": \"aborted\""));
        assert!(report.contains("missing-steps"));
    }

    #[test]
    fn missing_workflow_is_aborted() {
        let temp = TempDir::new().unwrap();
        let mut ui = MockUI::new();
        let result = RunCommand::new(temp.path(), RunArgs::new("nope.yml"))
            .execute(&mut ui)
            .unwrap();
        assert_eq!(result.exit_code, 2);
    }

    #[test]
    fn dry_run_runs_nothing() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("p.yml"),
            "steps:\n  - { id: marker, component: sh -c 'touch ran' }\n",
        )
        .unwrap();
        let args = RunArgs {
            dry_run: true,
            ..RunArgs::new("p.yml")
        };
        let mut ui = MockUI::new();
        let result = RunCommand::new(temp.path(), args).execute(&mut ui).unwrap();

        assert!(result.success);
        assert!(ui.has_message("[1/1] marker"));
        assert!(!temp.path().join("ran").exists());
    }
}
