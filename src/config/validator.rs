//! Workflow validation rules.
//!
//! This module validates a workflow definition for correctness:
//! - `steps` must be present and non-empty
//! - every step needs an id and a component
//! - references must point at an upstream step's declared output
//! - independent steps must not produce the same referenced output
//!
//! Graph-shape rules (duplicate ids, unknown dependencies, cycles) are
//! enforced by [`DependencyGraphBuilder`](crate::runner::DependencyGraphBuilder).
//! Issues are reported in declaration order so the same definition always
//! yields the same error.

use serde::Serialize;

use crate::config::schema::WorkflowConfig;
use crate::runner::DependencyGraph;

/// A single validation failure with context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Rule identifier
    pub rule: String,
    /// Human-readable error message
    pub message: String,
    /// Step ids involved (cycle members, offending step, ...)
    pub steps: Vec<String>,
}

impl ValidationIssue {
    /// Create a new issue.
    pub fn new<I, S>(rule: &str, message: impl Into<String>, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rule: rule.to_string(),
            message: message.into(),
            steps: steps.into_iter().map(Into::into).collect(),
        }
    }
}

/// Validate document-level structure.
pub fn validate_document(config: &WorkflowConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let steps = match &config.steps {
        None => {
            issues.push(ValidationIssue::new(
                "missing-steps",
                "Workflow has no 'steps' section",
                Vec::<String>::new(),
            ));
            return issues;
        }
        Some(steps) if steps.is_empty() => {
            issues.push(ValidationIssue::new(
                "empty-steps",
                "Workflow 'steps' section contains no entries",
                Vec::<String>::new(),
            ));
            return issues;
        }
        Some(steps) => steps,
    };

    for (i, step) in steps.iter().enumerate() {
        let id = step.effective_id(i + 1);

        if id.trim().is_empty() {
            issues.push(ValidationIssue::new(
                "blank-id",
                format!("Step {} has a blank id", i + 1),
                Vec::<String>::new(),
            ));
        }

        if step.component.as_deref().is_none_or(|c| c.trim().is_empty()) {
            issues.push(ValidationIssue::new(
                "missing-component",
                format!("Step '{}' must declare a 'component'", id),
                [id.as_str()],
            ));
        }
    }

    issues
}

/// Validate parameter references against a built graph.
pub fn validate_references(graph: &DependencyGraph) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for step in graph.steps() {
        for (name, reference) in step
            .parameters
            .iter()
            .filter_map(|(n, v)| v.as_reference().map(|r| (n, r)))
        {
            let Some(producer) = graph.step(&reference.step) else {
                issues.push(ValidationIssue::new(
                    "unknown-reference",
                    format!(
                        "Step '{}' parameter '{}' references unknown step '{}'",
                        step.id, name, reference.step
                    ),
                    [step.id.as_str()],
                ));
                continue;
            };

            if !graph.is_upstream_of(&producer.id, &step.id) {
                issues.push(ValidationIssue::new(
                    "reference-not-upstream",
                    format!(
                        "Step '{}' parameter '{}' references '{}', which is not among its dependencies",
                        step.id, name, producer.id
                    ),
                    [step.id.as_str(), producer.id.as_str()],
                ));
                continue;
            }

            if !producer.exposes_output(&reference.output) {
                issues.push(ValidationIssue::new(
                    "undeclared-output",
                    format!(
                        "Step '{}' parameter '{}' references output '{}' which step '{}' does not declare",
                        step.id, name, reference.output, producer.id
                    ),
                    [step.id.as_str(), producer.id.as_str()],
                ));
            }
        }
    }

    issues.extend(validate_output_races(graph));
    issues
}

/// Reject independent steps that produce the same referenced output value.
///
/// Steps in the same batch run concurrently, so two unordered producers of
/// one path would race on it.
fn validate_output_races(graph: &DependencyGraph) -> Vec<ValidationIssue> {
    let mut produced: Vec<(&str, &str)> = Vec::new();

    for step in graph.steps() {
        for reference in step.references() {
            let Some(value) = graph
                .step(&reference.step)
                .and_then(|p| p.parameters.get(&reference.output))
                .and_then(|v| v.as_text())
            else {
                continue;
            };
            let entry = (reference.step.as_str(), value);
            if !produced.contains(&entry) {
                produced.push(entry);
            }
        }
    }

    // Producer order follows declaration order for stable messages.
    produced.sort_by_key(|(id, _)| graph.index_of(id));

    let mut issues = Vec::new();
    for (i, (a, value)) in produced.iter().enumerate() {
        for (b, other) in &produced[i + 1..] {
            if a == b || value != other {
                continue;
            }
            if graph.is_upstream_of(a, b) || graph.is_upstream_of(b, a) {
                continue;
            }
            issues.push(ValidationIssue::new(
                "output-race",
                format!(
                    "Steps '{}' and '{}' both produce '{}' but neither depends on the other",
                    a, b, value
                ),
                [*a, *b],
            ));
        }
    }

    issues
}
