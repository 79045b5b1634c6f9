//! Process execution for components launched as external programs.

pub mod command;
pub mod platform;

pub use command::{
    execute, execute_streaming, CancelToken, CommandOptions, CommandResult, OutputCallback,
    OutputLine,
};
pub use platform::is_ci;
