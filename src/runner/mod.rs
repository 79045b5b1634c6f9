//! Workflow orchestration: graph, scheduling, run state, and coordination.

pub mod coordinator;
pub mod dependency;
pub mod report;
pub mod scheduler;
pub mod state;

pub use coordinator::{RunCoordinator, RunOptions, RunPhase, RunProgress};
pub use dependency::{DependencyGraph, DependencyGraphBuilder};
pub use report::{RunReport, RunStatus, EXIT_INTERNAL};
pub use scheduler::{batch_index, order, Batch};
pub use state::RunState;
