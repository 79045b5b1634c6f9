//! Validate command implementation.
//!
//! The `pipewright validate` command checks a workflow definition the same
//! way `run` does before dispatching anything, and reports every issue.

use std::path::{Path, PathBuf};

use crate::cli::args::ValidateArgs;
use crate::error::Result;
use crate::runner::scheduler;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::display::{exit_code_for, load_or_report, resolve_path, show_error};

/// The validate command implementation.
pub struct ValidateCommand {
    project_root: PathBuf,
    args: ValidateArgs,
}

impl ValidateCommand {
    /// Create a new validate command.
    pub fn new(project_root: &Path, args: ValidateArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            args,
        }
    }
}

impl Command for ValidateCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let path = resolve_path(&self.project_root, &self.args.workflow);
        let definition = match load_or_report(ui, &path) {
            Ok(definition) => definition,
            Err(err) => return Ok(CommandResult::failure(exit_code_for(&err))),
        };

        let batches = match scheduler::order(&definition.graph) {
            Ok(batches) => batches,
            Err(err) => {
                show_error(ui, &err);
                return Ok(CommandResult::failure(exit_code_for(&err)));
            }
        };

        ui.success(&format!(
            "{} is valid ({} steps in {} batches)",
            definition.name,
            definition.steps().len(),
            batches.len()
        ));
        Ok(CommandResult::success())
    }
}
