//! Plan command implementation.
//!
//! The `pipewright plan` command prints the batches a run would follow and
//! the command line each step would be launched with, without running
//! anything. Reference parameters appear as `${steps.<id>.<output>}`.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cli::args::PlanArgs;
use crate::config::WorkflowDefinition;
use crate::error::{PipewrightError, Result};
use crate::runner::scheduler;
use crate::steps::{preview, ProcessInvoker};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::display::{exit_code_for, load_or_report, resolve_path};

/// The plan command implementation.
pub struct PlanCommand {
    project_root: PathBuf,
    args: PlanArgs,
}

#[derive(Debug, Serialize)]
struct PlannedStep {
    step: String,
    title: String,
    command: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Plan {
    workflow: String,
    batches: Vec<Vec<PlannedStep>>,
}

impl PlanCommand {
    /// Create a new plan command.
    pub fn new(project_root: &Path, args: PlanArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            args,
        }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &PlanArgs {
        &self.args
    }
}

impl Command for PlanCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let path = resolve_path(&self.project_root, &self.args.workflow);
        match load_or_report(ui, &path) {
            Ok(definition) => show_plan(ui, &definition, self.args.json),
            Err(err) => Ok(CommandResult::failure(exit_code_for(&err))),
        }
    }
}

fn build_plan(definition: &WorkflowDefinition) -> Result<Plan> {
    let invoker =
        ProcessInvoker::new().with_default_interpreter(definition.settings.interpreter.clone());
    let graph = &definition.graph;

    let batches = scheduler::order(graph)?
        .into_iter()
        .map(|batch| {
            batch
                .into_iter()
                .map(|id| {
                    let step = graph.step(&id).ok_or_else(|| {
                        PipewrightError::Other(anyhow::anyhow!("scheduled unknown step '{}'", id))
                    })?;
                    Ok(PlannedStep {
                        command: invoker.command_line(step, &preview(step))?,
                        title: step.title.clone(),
                        step: id,
                    })
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Plan {
        workflow: definition.name.clone(),
        batches,
    })
}

/// Print the plan for a loaded workflow.
pub fn show_plan(
    ui: &mut dyn UserInterface,
    definition: &WorkflowDefinition,
    json: bool,
) -> Result<CommandResult> {
    let plan = build_plan(definition)?;

    if json {
        let out = serde_json::to_string_pretty(&plan).map_err(|e| PipewrightError::Other(e.into()))?;
        println!("{}", out);
        return Ok(CommandResult::success());
    }

    ui.show_header(&format!(
        "Plan: {} ({} steps, {} batches)",
        plan.workflow,
        definition.steps().len(),
        plan.batches.len()
    ));
    let total = plan.batches.len();
    for (index, batch) in plan.batches.iter().enumerate() {
        let ids: Vec<String> = batch.iter().map(|s| s.step.clone()).collect();
        ui.message(&format!("  [{}/{}] {}", index + 1, total, ids.join(", ")));
        for step in batch {
            ui.message(&format!("      {}", step.command.join(" ")));
        }
    }

    Ok(CommandResult::success())
}
