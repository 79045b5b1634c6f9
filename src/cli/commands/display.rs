//! Shared helpers for loading workflows and reporting their errors.

use std::path::{Path, PathBuf};

use crate::config::WorkflowDefinition;
use crate::error::PipewrightError;
pub use crate::runner::EXIT_INTERNAL;
use crate::ui::UserInterface;

/// Exit code for a definition that could not be read or validated.
pub const EXIT_ABORTED: i32 = 2;

/// Resolve a workflow path given on the command line.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}

/// Exit code a command should return for an error.
pub fn exit_code_for(err: &PipewrightError) -> i32 {
    match err {
        PipewrightError::WorkflowNotFound { .. }
        | PipewrightError::WorkflowParse { .. }
        | PipewrightError::Validation { .. } => EXIT_ABORTED,
        PipewrightError::UnresolvedReference { .. } => EXIT_INTERNAL,
        _ => 1,
    }
}

/// Print an error, listing each validation issue on its own line.
pub fn show_error(ui: &mut dyn UserInterface, err: &PipewrightError) {
    if err.is_validation() {
        let issues = err.issues();
        let noun = if issues.len() == 1 { "issue" } else { "issues" };
        ui.error(&format!("Invalid workflow ({} {})", issues.len(), noun));
        for issue in issues {
            ui.error(&format!("  [{}] {}", issue.rule, issue.message));
        }
    } else {
        ui.error(&err.to_string());
    }
}

/// Load a workflow, printing the error if it cannot be used.
pub fn load_or_report(
    ui: &mut dyn UserInterface,
    path: &Path,
) -> std::result::Result<WorkflowDefinition, PipewrightError> {
    WorkflowDefinition::load(path).inspect_err(|err| {
        tracing::debug!(path = %path.display(), "Workflow rejected: {}", err);
        show_error(ui, err);
    })
}

/// Name a workflow file is known by before it has been parsed.
pub fn workflow_label(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationIssue;
    use crate::ui::MockUI;

    #[test]
    fn resolve_path_keeps_absolute() {
        let root = Path::new("/work");
        assert_eq!(
            resolve_path(root, Path::new("/etc/p.yml")),
            PathBuf::from("/etc/p.yml")
        );
        assert_eq!(
            resolve_path(root, Path::new("pipelines/p.yml")),
            PathBuf::from("/work/pipelines/p.yml")
        );
    }

    #[test]
    fn exit_codes_by_error_kind() {
        let not_found = PipewrightError::WorkflowNotFound {
            path: PathBuf::from("x.yml"),
        };
        let unresolved = PipewrightError::UnresolvedReference {
            step: "b".into(),
            source_step: "a".into(),
            output: "output".into(),
        };
        let io = PipewrightError::Io(std::io::Error::other("disk"));

        assert_eq!(exit_code_for(&not_found), EXIT_ABORTED);
        assert_eq!(exit_code_for(&unresolved), EXIT_INTERNAL);
        assert_eq!(exit_code_for(&io), 1);
    }

    #[test]
    fn show_error_lists_each_issue() {
        let err = PipewrightError::Validation {
            issues: vec![
                ValidationIssue::new("duplicate-id", "Duplicate step id 'load'", ["load"]),
                ValidationIssue::new("unknown-step", "Step 'b' depends on unknown step 'z'", ["b"]),
            ],
        };
        let mut ui = MockUI::new();
        show_error(&mut ui, &err);

        assert_eq!(ui.errors().len(), 3);
        assert!(ui.has_error("2 issues"));
        assert!(ui.has_error("[duplicate-id]"));
        assert!(ui.has_error("[unknown-step]"));
    }

    #[test]
    fn label_is_file_stem() {
        assert_eq!(workflow_label(Path::new("pipelines/sales.yml")), "sales");
    }
}
