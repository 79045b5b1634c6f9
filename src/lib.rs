//! Pipewright - Declarative pipeline runner.
//!
//! Pipewright reads a workflow of steps from YAML, orders them by their
//! dependencies, and runs each batch of independent steps concurrently.
//! A failed step takes down only the steps downstream of it; every step
//! ends up with an execution record in the run report.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Workflow loading, parsing, and validation
//! - [`error`] - Error types and result aliases
//! - [`runner`] - Dependency graph, scheduling, and run coordination
//! - [`shell`] - Process execution with timeouts and cancellation
//! - [`steps`] - Step descriptors, parameter resolution, and execution
//! - [`ui`] - Spinners and terminal output
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pipewright::config::WorkflowDefinition;
//! use pipewright::runner::{RunCoordinator, RunOptions, RunStatus};
//! use pipewright::shell::CommandResult;
//! use pipewright::steps::{FnInvoker, InvocationRequest, ParameterValue, StepDescriptor};
//!
//! let workflow = WorkflowDefinition::from_steps(
//!     "sales",
//!     vec![
//!         StepDescriptor::new("load", "src/load.py")
//!             .parameter("output", ParameterValue::text("data/loaded.csv")),
//!         StepDescriptor::new("transform", "src/transform.py")
//!             .depends_on(["load"])
//!             .parameter("input", ParameterValue::reference("load", "output")),
//!     ],
//! )
//! .unwrap();
//!
//! let invoker = FnInvoker::new(|_req: &InvocationRequest<'_>| {
//!     Ok(CommandResult::success(String::new(), String::new(), Duration::ZERO))
//! });
//! let report = RunCoordinator::new(Arc::new(invoker), RunOptions::default())
//!     .run(&workflow)
//!     .unwrap();
//!
//! assert_eq!(report.status, RunStatus::Completed);
//! assert_eq!(
//!     report.record("transform").unwrap().arguments,
//!     vec!["--input", "data/loaded.csv"]
//! );
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod runner;
pub mod shell;
pub mod steps;
pub mod ui;

pub use error::{PipewrightError, Result};
