//! Run state.
//!
//! Everything a run knows about its own progress: which steps are pending,
//! completed, failed or skipped, and every [`ExecutionRecord`] produced so
//! far. Only the coordinator mutates it, and only between batches or when a
//! worker result arrives on the coordinator thread.

use std::collections::{HashMap, HashSet};

use crate::steps::{ExecutionRecord, SkipReason, StepStatus};

use super::dependency::DependencyGraph;

/// Mutable state of one workflow execution.
#[derive(Debug, Default)]
pub struct RunState {
    records: HashMap<String, ExecutionRecord>,
    pending: HashSet<String>,
    completed: HashSet<String>,
    failed: HashSet<String>,
    skipped: HashSet<String>,
}

impl RunState {
    /// Fresh state with every step in `graph` pending.
    pub fn new(graph: &DependencyGraph) -> Self {
        Self {
            pending: graph.steps().iter().map(|s| s.id.clone()).collect(),
            ..Self::default()
        }
    }

    /// Store a finalized record, moving its step out of the pending set.
    pub fn insert(&mut self, record: ExecutionRecord) {
        let id = record.step.clone();
        self.pending.remove(&id);
        self.completed.remove(&id);
        self.failed.remove(&id);
        self.skipped.remove(&id);

        match record.status {
            StepStatus::Succeeded => {
                self.completed.insert(id.clone());
            }
            StepStatus::Failed => {
                self.failed.insert(id.clone());
            }
            StepStatus::Skipped => {
                self.skipped.insert(id.clone());
            }
            StepStatus::Pending | StepStatus::Running => {
                self.pending.insert(id.clone());
            }
        }

        self.records.insert(id, record);
    }

    /// Record for a step, if one exists yet.
    pub fn record(&self, id: &str) -> Option<&ExecutionRecord> {
        self.records.get(id)
    }

    /// Whether the step finished successfully.
    pub fn is_completed(&self, id: &str) -> bool {
        self.completed.contains(id)
    }

    /// Whether the step failed.
    pub fn is_failed(&self, id: &str) -> bool {
        self.failed.contains(id)
    }

    /// Whether the step was skipped.
    pub fn is_skipped(&self, id: &str) -> bool {
        self.skipped.contains(id)
    }

    /// Whether the step has no final record yet.
    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains(id)
    }

    /// Number of steps without a final record.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether any step has failed.
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Work out why a step cannot run, if one of its dependencies failed or
    /// was itself blocked.
    ///
    /// The returned chain starts at the failed step and ends at the direct
    /// dependency. Dependencies are checked in declaration order.
    pub fn blocking_chain(&self, graph: &DependencyGraph, id: &str) -> Option<Vec<String>> {
        let step = graph.step(id)?;

        step.depends_on.iter().find_map(|dep| {
            if self.is_failed(dep) {
                return Some(vec![dep.clone()]);
            }
            match self.record(dep).and_then(|r| r.skip.as_ref()) {
                Some(SkipReason::Blocked { chain }) => {
                    let mut chain = chain.clone();
                    chain.push(dep.clone());
                    Some(chain)
                }
                _ => None,
            }
        })
    }

    /// Consume the state, returning records in declaration order.
    ///
    /// Steps that never received a record are omitted.
    pub fn into_records(mut self, graph: &DependencyGraph) -> Vec<ExecutionRecord> {
        graph
            .steps()
            .iter()
            .filter_map(|s| self.records.remove(&s.id))
            .collect()
    }
}
