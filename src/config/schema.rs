//! Workflow definition schema.
//!
//! This module contains the struct definitions that map to the YAML
//! workflow file format. The older `pipeline` / `script` / `params`
//! spelling is accepted through serde aliases.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

use indexmap::IndexMap;

use crate::steps::ParameterValue;

/// Root of a workflow definition document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Workflow name (for display and the run report)
    pub name: Option<String>,

    /// Free-form description
    pub description: Option<String>,

    /// Run settings
    pub settings: Settings,

    /// Step definitions, in declaration order
    #[serde(alias = "pipeline")]
    pub steps: Option<Vec<StepConfig>>,
}

/// Settings that apply to the whole run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Stop dispatching (and cancel siblings) after the first failure
    pub fail_fast: bool,

    /// Per-step timeout in seconds (unset = unbounded)
    pub timeout_seconds: Option<u64>,

    /// Maximum concurrent steps inside one batch
    pub max_parallel: Option<usize>,

    /// Working directory, relative to the workflow file
    pub working_dir: Option<PathBuf>,

    /// Default interpreter for every component
    pub interpreter: Option<String>,

    /// Environment variables for every component
    pub env: HashMap<String, String>,
}

/// Default worker cap when neither the CLI nor the workflow sets one.
pub const DEFAULT_MAX_PARALLEL: usize = 4;

/// A single step as written in the workflow file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    /// Unique step id
    pub id: Option<String>,

    /// Display title (also the id fallback for older files)
    pub name: Option<String>,

    /// Component to invoke
    #[serde(alias = "script")]
    pub component: Option<String>,

    /// Interpreter override for this step
    pub interpreter: Option<String>,

    /// Ids of upstream steps
    pub depends_on: Vec<String>,

    /// Parameters passed to the component as flags
    #[serde(alias = "params")]
    pub parameters: IndexMap<String, ParameterValue>,

    /// Outputs the component reports on stdout at runtime
    pub outputs: Vec<String>,

    /// Number of additional attempts after a failure
    pub retry: u32,

    /// Timeout override in seconds
    pub timeout_seconds: Option<u64>,

    /// Extra environment variables
    pub env: HashMap<String, String>,
}

impl StepConfig {
    /// The effective id for the step at 1-based `position`.
    pub fn effective_id(&self, position: usize) -> String {
        self.id
            .clone()
            .or_else(|| self.name.clone())
            .unwrap_or_else(|| format!("step_{}", position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_workflow() {
        let yaml = r#"
name: simple
steps:
  - id: load
    component: src/load.py
"#;
        let config: WorkflowConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.name.as_deref(), Some("simple"));
        let steps = config.steps.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].component.as_deref(), Some("src/load.py"));
        assert!(steps[0].depends_on.is_empty());
    }

    #[test]
    fn missing_steps_is_none() {
        let config: WorkflowConfig = serde_yaml::from_str("name: nothing\n").unwrap();
        assert!(config.steps.is_none());
    }

    #[test]
    fn parses_settings() {
        let yaml = r#"
settings:
  fail_fast: true
  timeout_seconds: 30
  max_parallel: 2
  interpreter: python3
  env:
    MODE: test
steps: []
"#;
        let config: WorkflowConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.settings.fail_fast);
        assert_eq!(config.settings.timeout_seconds, Some(30));
        assert_eq!(config.settings.max_parallel, Some(2));
        assert_eq!(config.settings.interpreter.as_deref(), Some("python3"));
        assert_eq!(config.settings.env.get("MODE").map(String::as_str), Some("test"));
    }

    #[test]
    fn accepts_legacy_spelling() {
        let yaml = r#"
pipeline:
  - name: Load data
    script: src/load.py
    params:
      output: data/raw.csv
"#;
        let config: WorkflowConfig = serde_yaml::from_str(yaml).unwrap();
        let steps = config.steps.unwrap();
        assert_eq!(steps[0].component.as_deref(), Some("src/load.py"));
        assert_eq!(
            steps[0].parameters["output"],
            ParameterValue::text("data/raw.csv")
        );
        assert_eq!(steps[0].effective_id(1), "Load data");
    }

    #[test]
    fn effective_id_falls_back_to_position() {
        let step = StepConfig::default();
        assert_eq!(step.effective_id(3), "step_3");
    }
}
