//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Pipewright - Run declarative data pipelines step by step.
#[derive(Debug, Parser)]
#[command(name = "pipewright")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Show verbose output, including component output as it runs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output: summary and failures only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a workflow
    Run(RunArgs),

    /// Show the batches and commands a run would execute
    Plan(PlanArgs),

    /// Check a workflow definition without running it
    Validate(ValidateArgs),

    /// List workflow definitions in a directory
    List(ListArgs),
}

/// Arguments for the `run` command.
#[derive(Debug, Clone, clap::Args)]
pub struct RunArgs {
    /// Path to the workflow definition
    pub workflow: PathBuf,

    /// Cancel running steps and skip the rest after the first failure
    #[arg(long, env = "PIPEWRIGHT_FAIL_FAST")]
    pub fail_fast: bool,

    /// Per-step timeout in seconds (overrides the workflow setting)
    #[arg(long, value_name = "N", env = "PIPEWRIGHT_TIMEOUT_SECONDS")]
    pub timeout_seconds: Option<u64>,

    /// Maximum steps run at once inside a batch
    #[arg(long, value_name = "N", env = "PIPEWRIGHT_MAX_PARALLEL",
          value_parser = clap::value_parser!(u64).range(1..))]
    pub max_parallel: Option<u64>,

    /// Preview batches and commands without executing
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Write the run report as JSON to a file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

impl RunArgs {
    /// Arguments for running `workflow` with every option at its default.
    pub fn new(workflow: impl Into<PathBuf>) -> Self {
        Self {
            workflow: workflow.into(),
            fail_fast: false,
            timeout_seconds: None,
            max_parallel: None,
            dry_run: false,
            json: false,
            report: None,
        }
    }
}

/// Arguments for the `plan` command.
#[derive(Debug, Clone, clap::Args)]
pub struct PlanArgs {
    /// Path to the workflow definition
    pub workflow: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command.
#[derive(Debug, Clone, clap::Args)]
pub struct ValidateArgs {
    /// Path to the workflow definition
    pub workflow: PathBuf,
}

/// Arguments for the `list` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ListArgs {
    /// Directory to search (default: ./pipelines)
    pub dir: Option<PathBuf>,
}
