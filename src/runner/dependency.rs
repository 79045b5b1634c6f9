//! Dependency graph for step execution ordering.
//!
//! Steps live in an arena (`Vec<StepDescriptor>`) in declaration order and
//! edges are stored as index lists, so traversal and cycle reporting are
//! plain index operations.

use std::collections::{HashMap, HashSet};

use crate::config::validator::ValidationIssue;
use crate::error::{PipewrightError, Result};
use crate::steps::StepDescriptor;

/// Validated, acyclic dependency graph over a workflow's steps.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Steps in declaration order.
    steps: Vec<StepDescriptor>,
    /// Step id to arena index.
    index: HashMap<String, usize>,
    /// Direct dependencies of each step (indices, declaration order).
    dependencies: Vec<Vec<usize>>,
    /// Steps that directly depend on each step (indices, ascending).
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Create a new dependency graph builder.
    pub fn builder() -> DependencyGraphBuilder {
        DependencyGraphBuilder::new()
    }

    /// Build a graph from an ordered sequence of steps.
    pub fn build(steps: Vec<StepDescriptor>) -> Result<Self> {
        DependencyGraphBuilder::from_steps(steps).build()
    }

    /// Steps in declaration order.
    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    /// Look up a step by id.
    pub fn step(&self, id: &str) -> Option<&StepDescriptor> {
        self.index.get(id).map(|&i| &self.steps[i])
    }

    /// Declaration position of a step.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Check if a step exists in the graph.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Get the number of steps in the graph.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Direct dependency indices of the step at `index`.
    pub(crate) fn dependency_indices(&self, index: usize) -> &[usize] {
        &self.dependencies[index]
    }

    /// Direct dependent indices of the step at `index`.
    pub(crate) fn dependent_indices(&self, index: usize) -> &[usize] {
        &self.dependents[index]
    }

    /// Get steps that depend directly on the given step.
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        self.index
            .get(id)
            .map(|&i| {
                self.dependents[i]
                    .iter()
                    .map(|&d| self.steps[d].id.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get all transitive dependents of a step.
    ///
    /// Returns steps that depend on the given step, directly or indirectly.
    pub fn transitive_dependents(&self, id: &str) -> HashSet<String> {
        self.walk(id, &self.dependents)
    }

    /// Get all transitive dependencies of a step.
    pub fn transitive_dependencies(&self, id: &str) -> HashSet<String> {
        self.walk(id, &self.dependencies)
    }

    /// Whether a dependency path runs from `upstream` to `downstream`.
    pub fn is_upstream_of(&self, upstream: &str, downstream: &str) -> bool {
        self.transitive_dependencies(downstream).contains(upstream)
    }

    fn walk(&self, id: &str, edges: &[Vec<usize>]) -> HashSet<String> {
        let mut result = HashSet::new();
        let Some(&start) = self.index.get(id) else {
            return result;
        };
        let mut to_visit = vec![start];

        while let Some(current) = to_visit.pop() {
            for &next in &edges[current] {
                if result.insert(self.steps[next].id.clone()) {
                    to_visit.push(next);
                }
            }
        }

        result
    }

    /// Find a cycle in the graph, returning the path if one exists.
    ///
    /// The path starts and ends with the same id, e.g. `[a, b, a]`.
    /// Traversal follows declaration order, so the result is deterministic.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        find_cycle(&self.steps, &self.dependencies)
    }

    /// Build a graph without any validation. Unknown dependencies are dropped.
    #[cfg(test)]
    pub(crate) fn unchecked(steps: Vec<StepDescriptor>) -> Self {
        let index: HashMap<String, usize> = steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();
        let dependencies: Vec<Vec<usize>> = steps
            .iter()
            .map(|s| s.depends_on.iter().filter_map(|d| index.get(d).copied()).collect())
            .collect();
        let mut dependents = vec![Vec::new(); steps.len()];
        for (i, deps) in dependencies.iter().enumerate() {
            for &d in deps {
                dependents[d].push(i);
            }
        }
        Self {
            steps,
            index,
            dependencies,
            dependents,
        }
    }
}

fn find_cycle(steps: &[StepDescriptor], dependencies: &[Vec<usize>]) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Unvisited,
        InProgress,
        Done,
    }

    fn dfs(
        node: usize,
        dependencies: &[Vec<usize>],
        state: &mut [State],
        path: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        state[node] = State::InProgress;
        path.push(node);

        for &dep in &dependencies[node] {
            match state[dep] {
                State::InProgress => {
                    let start = path.iter().position(|&n| n == dep).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(dep);
                    return Some(cycle);
                }
                State::Unvisited => {
                    if let Some(cycle) = dfs(dep, dependencies, state, path) {
                        return Some(cycle);
                    }
                }
                State::Done => {}
            }
        }

        path.pop();
        state[node] = State::Done;
        None
    }

    let mut state = vec![State::Unvisited; steps.len()];
    let mut path = Vec::new();

    for node in 0..steps.len() {
        if state[node] == State::Unvisited {
            if let Some(cycle) = dfs(node, dependencies, &mut state, &mut path) {
                return Some(cycle.into_iter().map(|i| steps[i].id.clone()).collect());
            }
        }
    }

    None
}

/// Builder for constructing a DependencyGraph.
#[derive(Debug, Default)]
pub struct DependencyGraphBuilder {
    steps: Vec<StepDescriptor>,
}

impl DependencyGraphBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing list of steps.
    pub fn from_steps(steps: Vec<StepDescriptor>) -> Self {
        Self { steps }
    }

    /// Add a step.
    pub fn add_step(mut self, step: StepDescriptor) -> Self {
        self.steps.push(step);
        self
    }

    /// Build the dependency graph.
    ///
    /// Fails with a validation error when an id is duplicated, a step
    /// depends on itself or on an unknown id, or the graph has a cycle.
    /// Every issue is reported together in declaration order.
    pub fn build(self) -> Result<DependencyGraph> {
        let (graph, issues) = self.build_collecting();
        if issues.is_empty() {
            Ok(graph)
        } else {
            Err(PipewrightError::Validation { issues })
        }
    }

    /// Build the graph and collect structural issues instead of failing.
    ///
    /// Repeated ids resolve to their first declaration. Unknown and self
    /// dependencies are left out of the adjacency, so the graph stays usable
    /// for further checks even when issues were found.
    pub(crate) fn build_collecting(self) -> (DependencyGraph, Vec<ValidationIssue>) {
        let mut issues = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for (i, step) in self.steps.iter().enumerate() {
            if index.contains_key(&step.id) {
                issues.push(ValidationIssue::new(
                    "duplicate-step",
                    format!("Step '{}' is declared more than once", step.id),
                    [step.id.as_str()],
                ));
            } else {
                index.insert(step.id.clone(), i);
            }
        }

        let mut dependencies: Vec<Vec<usize>> = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let mut deps: Vec<usize> = Vec::new();
            for dep in &step.depends_on {
                if dep == &step.id {
                    issues.push(ValidationIssue::new(
                        "self-dependency",
                        format!("Step '{}' depends on itself", step.id),
                        [step.id.as_str()],
                    ));
                    continue;
                }
                match index.get(dep) {
                    Some(&d) => {
                        if !deps.contains(&d) {
                            deps.push(d);
                        }
                    }
                    None => issues.push(ValidationIssue::new(
                        "unknown-step",
                        format!("Step '{}' depends on unknown step '{}'", step.id, dep),
                        [step.id.as_str(), dep.as_str()],
                    )),
                }
            }
            dependencies.push(deps);
        }

        if let Some(cycle) = find_cycle(&self.steps, &dependencies) {
            let members: Vec<&str> = cycle[..cycle.len() - 1]
                .iter()
                .map(String::as_str)
                .collect();
            issues.push(ValidationIssue::new(
                "circular-dependency",
                format!("Circular dependency detected: {}", cycle.join(" -> ")),
                members,
            ));
        }

        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.steps.len()];
        for (i, deps) in dependencies.iter().enumerate() {
            for &d in deps {
                dependents[d].push(i);
            }
        }

        let graph = DependencyGraph {
            steps: self.steps,
            index,
            dependencies,
            dependents,
        };
        (graph, issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, deps: &[&str]) -> StepDescriptor {
        StepDescriptor::new(id, format!("components/{}.py", id)).depends_on(deps.iter().copied())
    }

    fn build(steps: Vec<StepDescriptor>) -> Result<DependencyGraph> {
        DependencyGraph::build(steps)
    }

    #[test]
    fn builder_creates_empty_graph() {
        let graph = DependencyGraph::builder().build().unwrap();
        assert!(graph.is_empty());
    }

    #[test]
    fn builder_adds_step_with_dependencies() {
        let graph = build(vec![step("load", &[]), step("clean", &["load"])]).unwrap();

        assert!(graph.contains("load"));
        assert!(graph.contains("clean"));
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.dependents_of("load"), vec!["clean"]);
        assert_eq!(graph.index_of("clean"), Some(1));
    }

    #[test]
    fn keeps_declaration_order() {
        let graph = build(vec![step("b", &[]), step("a", &[]), step("c", &["a"])]).unwrap();
        let ids: Vec<_> = graph.steps().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn rejects_duplicate_id() {
        let err = build(vec![step("a", &[]), step("a", &[])]).unwrap_err();
        assert_eq!(err.issues()[0].rule, "duplicate-step");
        assert_eq!(err.issues()[0].steps, vec!["a"]);
    }

    #[test]
    fn rejects_unknown_dependency() {
        let err = build(vec![step("x", &["y"])]).unwrap_err();
        let issue = &err.issues()[0];
        assert_eq!(issue.rule, "unknown-step");
        assert!(issue.message.contains("'y'"));
    }

    #[test]
    fn rejects_self_dependency() {
        let err = build(vec![step("a", &["a"])]).unwrap_err();
        assert_eq!(err.issues()[0].rule, "self-dependency");
    }

    #[test]
    fn reports_all_structural_issues_in_order() {
        let err = build(vec![step("a", &["ghost"]), step("a", &[]), step("b", &["b"])]).unwrap_err();
        let rules: Vec<_> = err.issues().iter().map(|i| i.rule.as_str()).collect();
        assert_eq!(rules, vec!["duplicate-step", "unknown-step", "self-dependency"]);
    }

    #[test]
    fn cycle_is_reported_alongside_structural_issues() {
        let err = build(vec![step("a", &["b"]), step("b", &["a"]), step("c", &["ghost"])])
            .unwrap_err();
        let rules: Vec<_> = err.issues().iter().map(|i| i.rule.as_str()).collect();
        assert_eq!(rules, vec!["unknown-step", "circular-dependency"]);
    }

    #[test]
    fn collecting_build_keeps_known_edges() {
        let (graph, issues) = DependencyGraph::builder()
            .add_step(step("load", &[]))
            .add_step(step("clean", &["load", "ghost"]))
            .build_collecting();
        assert_eq!(issues.len(), 1);
        assert!(graph.is_upstream_of("load", "clean"));
    }

    #[test]
    fn unknown_dependency_error_is_stable() {
        let first = build(vec![step("x", &["y"])]).unwrap_err().to_string();
        let second = build(vec![step("x", &["y"])]).unwrap_err().to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn simple_cycle_reports_members() {
        let err = build(vec![step("a", &["b"]), step("b", &["a"])]).unwrap_err();
        let issue = &err.issues()[0];
        assert_eq!(issue.rule, "circular-dependency");
        assert!(issue.steps.contains(&"a".to_string()));
        assert!(issue.steps.contains(&"b".to_string()));
        assert!(issue.message.contains("a -> b -> a"));
    }

    #[test]
    fn longer_cycle_reports_full_path() {
        let err = build(vec![
            step("root", &[]),
            step("a", &["root", "c"]),
            step("b", &["a"]),
            step("c", &["b"]),
        ])
        .unwrap_err();
        let issue = &err.issues()[0];
        assert_eq!(issue.steps.len(), 3);
        for id in ["a", "b", "c"] {
            assert!(issue.steps.contains(&id.to_string()));
        }
        assert!(!issue.steps.contains(&"root".to_string()));
    }

    #[test]
    fn no_cycle_returns_none() {
        let graph = build(vec![step("a", &[]), step("b", &["a"])]).unwrap();
        assert!(graph.find_cycle().is_none());
    }

    #[test]
    fn transitive_dependents_indirect() {
        let graph = build(vec![
            step("a", &[]),
            step("b", &["a"]),
            step("c", &["b"]),
            step("d", &[]),
        ])
        .unwrap();

        let deps = graph.transitive_dependents("a");
        assert!(deps.contains("b"));
        assert!(deps.contains("c"));
        assert!(!deps.contains("d"));
        assert!(graph.transitive_dependents("c").is_empty());
    }

    #[test]
    fn upstream_relation_follows_paths() {
        let graph = build(vec![
            step("a", &[]),
            step("b", &["a"]),
            step("c", &["b"]),
            step("d", &[]),
        ])
        .unwrap();

        assert!(graph.is_upstream_of("a", "c"));
        assert!(!graph.is_upstream_of("c", "a"));
        assert!(!graph.is_upstream_of("d", "c"));
    }

    #[test]
    fn duplicate_dependency_entries_collapse() {
        let graph = build(vec![step("a", &[]), step("b", &["a", "a"])]).unwrap();
        assert_eq!(graph.dependency_indices(1), &[0]);
    }
}
