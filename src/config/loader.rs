//! Workflow file discovery and loading.

use crate::config::schema::WorkflowConfig;
use crate::error::{PipewrightError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory searched by `pipewright list` when none is given.
pub const DEFAULT_WORKFLOW_DIR: &str = "pipelines";

/// Load a workflow file and parse it into a [`WorkflowConfig`].
///
/// # Errors
///
/// Returns `WorkflowNotFound` if the file doesn't exist.
/// Returns `WorkflowParse` if the YAML is invalid.
pub fn load_workflow_file(path: &Path) -> Result<WorkflowConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PipewrightError::WorkflowNotFound {
                path: path.to_path_buf(),
            }
        } else {
            PipewrightError::Io(e)
        }
    })?;

    parse_workflow(&content, path)
}

/// Parse YAML content into a [`WorkflowConfig`].
///
/// # Arguments
///
/// * `content` - The YAML content to parse
/// * `source_path` - Path for error reporting
pub fn parse_workflow(content: &str, source_path: &Path) -> Result<WorkflowConfig> {
    serde_yaml::from_str(content).map_err(|e| PipewrightError::WorkflowParse {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

/// List workflow files (`*.yml` / `*.yaml`) in a directory, sorted by name.
pub fn discover_workflows(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut found: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "yml" || e == "yaml")
        })
        .collect();
    found.sort();

    Ok(found)
}
