//! List command implementation.
//!
//! The `pipewright list` command lists the workflow definitions in a
//! directory, with their step counts, and flags the ones that do not
//! validate.

use std::path::{Path, PathBuf};

use crate::cli::args::ListArgs;
use crate::config::{discover_workflows, WorkflowDefinition, DEFAULT_WORKFLOW_DIR};
use crate::error::Result;
use crate::ui::theme::PipewrightTheme;
use crate::ui::{should_use_colors, UserInterface};

use super::dispatcher::{Command, CommandResult};
use super::display::{resolve_path, workflow_label};

/// The list command implementation.
pub struct ListCommand {
    project_root: PathBuf,
    args: ListArgs,
}

impl ListCommand {
    /// Create a new list command.
    pub fn new(project_root: &Path, args: ListArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            args,
        }
    }

    /// Directory that will be searched.
    pub fn search_dir(&self) -> PathBuf {
        let dir = self
            .args
            .dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKFLOW_DIR));
        resolve_path(&self.project_root, &dir)
    }
}

impl Command for ListCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let dir = self.search_dir();
        let files = discover_workflows(&dir)?;

        if files.is_empty() {
            ui.warning(&format!("No workflows found in {}", dir.display()));
            return Ok(CommandResult::success());
        }

        let theme = if should_use_colors() {
            PipewrightTheme::new()
        } else {
            PipewrightTheme::plain()
        };

        ui.show_header(&format!("Workflows in {}", dir.display()));
        for path in &files {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            match WorkflowDefinition::load(path) {
                Ok(definition) => {
                    let count = definition.steps().len();
                    let noun = if count == 1 { "step" } else { "steps" };
                    ui.message(&format!(
                        "  {} {} {}",
                        theme.highlight.apply_to(format!("{:<20}", definition.name)),
                        theme.dim.apply_to(format!("{:<24}", file_name)),
                        theme.dim.apply_to(format!("{} {}", count, noun)),
                    ));
                    if let Some(desc) = &definition.description {
                        ui.message(&format!("      {}", theme.dim.apply_to(desc)));
                    }
                }
                Err(err) => {
                    tracing::debug!(path = %path.display(), "Skipping invalid workflow: {}", err);
                    ui.message(&format!(
                        "  {} {} {}",
                        theme.highlight.apply_to(format!("{:<20}", workflow_label(path))),
                        theme.dim.apply_to(format!("{:<24}", file_name)),
                        theme.error.apply_to("invalid"),
                    ));
                }
            }
        }

        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MockUI;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_dir_is_pipelines() {
        let cmd = ListCommand::new(Path::new("/work"), ListArgs::default());
        assert_eq!(cmd.search_dir(), PathBuf::from("/work/pipelines"));
    }

    #[test]
    fn empty_dir_warns() {
        let temp = TempDir::new().unwrap();
        let mut ui = MockUI::new();
        let result = ListCommand::new(temp.path(), ListArgs::default())
            .execute(&mut ui)
            .unwrap();

        assert!(result.success);
        assert!(ui.has_warning("No workflows found"));
    }

    #[test]
    fn lists_valid_and_invalid_workflows() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("pipelines");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("sales.yml"),
            "name: sales\ndescription: Daily sales\nsteps:\n  - { id: load, component: load.py }\n",
        )
        .unwrap();
        fs::write(dir.join("broken.yaml"), "name: broken\nsteps: []\n").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let mut ui = MockUI::new();
        let result = ListCommand::new(temp.path(), ListArgs::default())
            .execute(&mut ui)
            .unwrap();

        assert!(result.success);
        assert!(ui.has_message("sales.yml"));
        assert!(ui.has_message("1 step"));
        assert!(ui.has_message("Daily sales"));
        assert!(ui.messages().iter().any(|m| m.contains("broken") && m.contains("invalid")));
        assert!(!ui.has_message("notes.txt"));
    }

    #[test]
    fn explicit_dir_is_used() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("etl.yml"),
            "steps:\n  - { id: a, component: a.sh }\n  - { id: b, component: b.sh }\n",
        )
        .unwrap();

        let mut ui = MockUI::new();
        ListCommand::new(
            Path::new("/"),
            ListArgs {
                dir: Some(temp.path().to_path_buf()),
            },
        )
        .execute(&mut ui)
        .unwrap();

        assert!(ui.has_message("etl"));
        assert!(ui.has_message("2 steps"));
    }
}
