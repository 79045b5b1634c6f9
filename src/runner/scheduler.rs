//! Batch scheduling.
//!
//! Turns a [`DependencyGraph`] into a sequence of batches with Kahn's
//! algorithm. Every step lands in the earliest batch whose predecessors are
//! all placed, so the members of one batch are mutually independent and may
//! run concurrently. Within a batch, steps keep declaration order.

use crate::config::validator::ValidationIssue;
use crate::error::{PipewrightError, Result};

use super::dependency::DependencyGraph;

/// Step ids that may run together, in declaration order.
pub type Batch = Vec<String>;

/// Compute the batch sequence for a graph.
///
/// Fails with a validation error instead of looping if the graph turns out
/// to be cyclic.
pub fn order(graph: &DependencyGraph) -> Result<Vec<Batch>> {
    let len = graph.len();
    let mut in_degree: Vec<usize> = (0..len)
        .map(|i| graph.dependency_indices(i).len())
        .collect();

    let mut ready: Vec<usize> = (0..len).filter(|&i| in_degree[i] == 0).collect();
    let mut batches: Vec<Batch> = Vec::new();
    let mut placed = 0;

    while !ready.is_empty() {
        ready.sort_unstable();
        let mut next = Vec::new();

        for &step in &ready {
            for &dependent in graph.dependent_indices(step) {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }

        placed += ready.len();
        batches.push(
            ready
                .iter()
                .map(|&i| graph.steps()[i].id.clone())
                .collect(),
        );
        ready = next;
    }

    if placed != len {
        let unplaced: Vec<&str> = (0..len)
            .filter(|&i| in_degree[i] > 0)
            .map(|i| graph.steps()[i].id.as_str())
            .collect();
        let cycle = graph
            .find_cycle()
            .unwrap_or_else(|| unplaced.iter().map(|s| s.to_string()).collect());
        return Err(PipewrightError::validation(ValidationIssue::new(
            "circular-dependency",
            format!(
                "Circular dependency detected while scheduling: {}",
                cycle.join(" -> ")
            ),
            unplaced,
        )));
    }

    Ok(batches)
}

/// Position of each step's batch, keyed by step id.
pub fn batch_index(batches: &[Batch], id: &str) -> Option<usize> {
    batches.iter().position(|b| b.iter().any(|s| s == id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::StepDescriptor;

    fn step(id: &str, deps: &[&str]) -> StepDescriptor {
        StepDescriptor::new(id, format!("{}.py", id)).depends_on(deps.iter().copied())
    }

    fn graph(steps: Vec<StepDescriptor>) -> DependencyGraph {
        DependencyGraph::build(steps).unwrap()
    }

    #[test]
    fn empty_graph_has_no_batches() {
        let g = DependencyGraph::builder().build().unwrap();
        assert!(order(&g).unwrap().is_empty());
    }

    #[test]
    fn linear_chain_is_one_step_per_batch() {
        let g = graph(vec![
            step("load", &[]),
            step("clean", &["load"]),
            step("analyze", &["clean"]),
            step("report", &["analyze"]),
        ]);

        assert_eq!(
            order(&g).unwrap(),
            vec![
                vec!["load"],
                vec!["clean"],
                vec!["analyze"],
                vec!["report"]
            ]
        );
    }

    #[test]
    fn independent_steps_share_a_batch() {
        let g = graph(vec![step("c", &[]), step("a", &[]), step("b", &[])]);
        assert_eq!(order(&g).unwrap(), vec![vec!["c", "a", "b"]]);
    }

    #[test]
    fn diamond_groups_middle_steps() {
        let g = graph(vec![
            step("a", &[]),
            step("b", &["a"]),
            step("c", &["a"]),
            step("d", &["b", "c"]),
        ]);

        assert_eq!(
            order(&g).unwrap(),
            vec![vec!["a"], vec!["b", "c"], vec!["d"]]
        );
    }

    #[test]
    fn step_lands_in_earliest_batch() {
        // `late` only needs `a`, so it runs beside `b` rather than after `c`.
        let g = graph(vec![
            step("a", &[]),
            step("b", &["a"]),
            step("c", &["b"]),
            step("late", &["a"]),
        ]);

        assert_eq!(
            order(&g).unwrap(),
            vec![vec!["a"], vec!["b", "late"], vec!["c"]]
        );
    }

    #[test]
    fn tie_break_follows_declaration_order_not_name() {
        let g = graph(vec![
            step("root", &[]),
            step("zeta", &["root"]),
            step("alpha", &["root"]),
        ]);

        assert_eq!(order(&g).unwrap()[1], vec!["zeta", "alpha"]);
    }

    #[test]
    fn ordering_is_deterministic() {
        let steps = vec![
            step("e", &["b", "c"]),
            step("b", &["a"]),
            step("c", &["a"]),
            step("a", &[]),
            step("d", &[]),
        ];
        let first = order(&graph(steps.clone())).unwrap();
        let second = order(&graph(steps)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, vec![vec!["a", "d"], vec!["b", "c"], vec!["e"]]);
    }

    #[test]
    fn every_edge_crosses_forward() {
        let g = graph(vec![
            step("a", &[]),
            step("b", &["a"]),
            step("c", &["a", "b"]),
            step("d", &["c"]),
            step("e", &["a"]),
            step("f", &["e", "d"]),
        ]);
        let batches = order(&g).unwrap();

        for s in g.steps() {
            for dep in &s.depends_on {
                assert!(batch_index(&batches, dep) < batch_index(&batches, &s.id));
            }
        }
    }

    #[test]
    fn cyclic_graph_fails_instead_of_looping() {
        let g = DependencyGraph::unchecked(vec![
            step("ok", &[]),
            step("a", &["b"]),
            step("b", &["a"]),
        ]);

        let err = order(&g).unwrap_err();
        let issue = &err.issues()[0];
        assert_eq!(issue.rule, "circular-dependency");
        assert_eq!(issue.steps, vec!["a", "b"]);
    }
}
