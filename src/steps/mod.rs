//! Step descriptors, parameter resolution, and execution.
//!
//! - [`StepDescriptor`] - The validated, immutable form of a workflow step
//! - [`resolve`] - Expand parameters into the component's argument list
//! - [`Invoker`] - The boundary every component is run through
//! - [`StepExecutor`] - Run one attempt of a step and record the outcome
//! - [`ExecutionRecord`] - What happened to a step during a run
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pipewright::shell::CommandResult;
//! use pipewright::steps::{
//!     ExecutionContext, FnInvoker, ParameterValue, StepDescriptor, StepExecutor, StepStatus,
//! };
//!
//! let step = StepDescriptor::new("load", "src/load.py")
//!     .parameter("output", ParameterValue::text("data/loaded.csv"));
//!
//! let invoker = FnInvoker::new(|_req: &pipewright::steps::InvocationRequest<'_>| {
//!     Ok(CommandResult::success(String::new(), String::new(), Duration::ZERO))
//! });
//! let executor = StepExecutor::new(Arc::new(invoker), ExecutionContext::default());
//!
//! let record = executor.execute(&step, vec!["--output".into(), "data/loaded.csv".into()]);
//! assert_eq!(record.status, StepStatus::Succeeded);
//! assert_eq!(record.output("output"), Some("data/loaded.csv"));
//! ```

pub mod descriptor;
pub mod executor;
pub mod invoker;
pub mod record;
pub mod resolver;

pub use descriptor::{Literal, OutputReference, ParameterValue, StepDescriptor};
pub use executor::{
    ExecutionContext, StepExecutor, StepOutputCallback, STEP_ENV_VAR, WORKFLOW_ENV_VAR,
};
pub use invoker::{FnInvoker, InvocationRequest, Invoker, ProcessInvoker};
pub use record::{ExecutionRecord, SkipReason, StepFailure, StepStatus};
pub use resolver::{flag_name, preview, resolve};
