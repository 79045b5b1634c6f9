//! Validated workflow definitions.
//!
//! [`WorkflowDefinition`] is what the rest of the crate consumes: the
//! document has been checked, every step turned into a
//! [`StepDescriptor`], and the dependency graph proven acyclic.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::loader::load_workflow_file;
use crate::config::schema::{Settings, WorkflowConfig};
use crate::config::validator::{validate_document, validate_references, ValidationIssue};
use crate::error::{PipewrightError, Result};
use crate::runner::{DependencyGraph, DependencyGraphBuilder};
use crate::steps::StepDescriptor;

/// A workflow whose definition passed validation.
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    /// Workflow name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Run settings from the document.
    pub settings: Settings,
    /// Directory relative paths are resolved against.
    pub base_dir: PathBuf,
    /// Validated dependency graph (holds the step descriptors).
    pub graph: DependencyGraph,
}

impl WorkflowDefinition {
    /// Load and validate a workflow file.
    pub fn load(path: &Path) -> Result<Self> {
        let config = load_workflow_file(path)?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let name = config.name.clone().unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "workflow".to_string())
        });
        let config = WorkflowConfig {
            name: Some(name),
            ..config
        };
        Self::from_config(config, base_dir)
    }

    /// Validate a parsed document.
    ///
    /// Issues from every stage (document, graph, references) are reported
    /// together, grouped by stage and in declaration order within one.
    pub fn from_config(config: WorkflowConfig, base_dir: PathBuf) -> Result<Self> {
        let issues = validate_document(&config);
        if config.steps.as_ref().is_none_or(Vec::is_empty) {
            return Err(PipewrightError::Validation { issues });
        }

        let settings = config.settings;
        let steps: Vec<StepDescriptor> = config
            .steps
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, step)| {
                let id = step.effective_id(i + 1);
                StepDescriptor {
                    title: step.name.clone().unwrap_or_else(|| id.clone()),
                    id,
                    component: step.component.unwrap_or_default(),
                    interpreter: step.interpreter,
                    depends_on: step.depends_on,
                    parameters: step.parameters,
                    outputs: step.outputs,
                    retry: step.retry,
                    timeout: step.timeout_seconds.map(Duration::from_secs),
                    env: step.env,
                }
            })
            .collect();

        let graph = validated_graph(steps, issues)?;

        Ok(Self {
            name: config.name.unwrap_or_else(|| "workflow".to_string()),
            description: config.description,
            settings,
            base_dir,
            graph,
        })
    }

    /// Build a workflow directly from descriptors, with default settings.
    ///
    /// Runs the same graph and reference checks as a loaded document.
    pub fn from_steps(name: impl Into<String>, steps: Vec<StepDescriptor>) -> Result<Self> {
        let graph = validated_graph(steps, Vec::new())?;

        Ok(Self {
            name: name.into(),
            description: None,
            settings: Settings::default(),
            base_dir: PathBuf::from("."),
            graph,
        })
    }

    /// Steps in declaration order.
    pub fn steps(&self) -> &[StepDescriptor] {
        self.graph.steps()
    }

    /// Working directory for components.
    pub fn working_dir(&self) -> Option<PathBuf> {
        self.settings
            .working_dir
            .as_ref()
            .map(|dir| self.base_dir.join(dir))
    }
}

/// Build the graph and check references, adding to issues already found.
fn validated_graph(
    steps: Vec<StepDescriptor>,
    mut issues: Vec<ValidationIssue>,
) -> Result<DependencyGraph> {
    let (graph, structural) = DependencyGraphBuilder::from_steps(steps).build_collecting();
    issues.extend(structural);
    issues.extend(validate_references(&graph));

    if issues.is_empty() {
        Ok(graph)
    } else {
        Err(PipewrightError::Validation { issues })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_workflow;

    fn definition(yaml: &str) -> Result<WorkflowDefinition> {
        let config = parse_workflow(yaml, Path::new("test.yml"))?;
        WorkflowDefinition::from_config(config, PathBuf::from("/work"))
    }

    #[test]
    fn builds_descriptors_in_order() {
        let def = definition(
            r#"
name: sales
steps:
  - id: load
    component: src/load.py
    parameters:
      output: data/loaded.csv
  - id: transform
    name: Transform data
    component: src/transform.py
    depends_on: [load]
    timeout_seconds: 5
    parameters:
      input: "${steps.load.output}"
"#,
        )
        .unwrap();

        assert_eq!(def.name, "sales");
        let ids: Vec<_> = def.steps().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["load", "transform"]);
        assert_eq!(def.steps()[1].title, "Transform data");
        assert_eq!(def.steps()[1].timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn empty_steps_is_the_only_issue() {
        let err = definition("name: empty\nsteps: []\n").unwrap_err();
        assert_eq!(err.issues()[0].rule, "empty-steps");
    }

    #[test]
    fn issues_from_every_stage_are_reported_together() {
        let err = definition(
            r#"
steps:
  - { id: a }
  - { id: b, component: b.py, depends_on: [ghost] }
  - id: c
    component: c.py
    parameters:
      input: "${steps.b.output}"
"#,
        )
        .unwrap_err();
        let rules: Vec<_> = err.issues().iter().map(|i| i.rule.as_str()).collect();
        assert_eq!(
            rules,
            vec!["missing-component", "unknown-step", "reference-not-upstream"]
        );
    }

    #[test]
    fn cycle_is_validation_error() {
        let err = definition(
            r#"
steps:
  - { id: a, component: a.py, depends_on: [b] }
  - { id: b, component: b.py, depends_on: [a] }
"#,
        )
        .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.issues()[0].rule, "circular-dependency");
    }

    #[test]
    fn working_dir_is_relative_to_file() {
        let def = definition(
            r#"
settings:
  working_dir: project
steps:
  - { id: a, component: a.py }
"#,
        )
        .unwrap();
        assert_eq!(def.working_dir(), Some(PathBuf::from("/work/project")));
    }

    #[test]
    fn from_steps_checks_references() {
        use crate::steps::ParameterValue;

        let err = WorkflowDefinition::from_steps(
            "lib",
            vec![
                StepDescriptor::new("a", "a.py"),
                StepDescriptor::new("b", "b.py")
                    .parameter("input", ParameterValue::reference("a", "output")),
            ],
        )
        .unwrap_err();
        assert!(err.is_validation());

        let def = WorkflowDefinition::from_steps("lib", vec![StepDescriptor::new("a", "a.py")])
            .unwrap();
        assert_eq!(def.name, "lib");
        assert!(def.working_dir().is_none());
    }
}
