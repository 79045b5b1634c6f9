//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations. This allows:
//! - Single binary with subcommands (`pipewright run`, `pipewright plan`)
//! - Shared loading and error reporting through [`display`]
//! - Consistent global flag handling

pub mod dispatcher;
pub mod display;
pub mod list;
pub mod plan;
pub mod run;
pub mod validate;

pub use dispatcher::{Command, CommandDispatcher, CommandResult};
