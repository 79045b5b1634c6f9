//! Workflow definition loading, parsing, and validation.
//!
//! This module handles everything between a YAML file on disk and a
//! validated [`WorkflowDefinition`]:
//! - Schema definitions in [`schema`]
//! - File loading and discovery in [`loader`]
//! - Validation rules in [`validator`]
//! - The validated form in [`definition`]
//!
//! # Example
//!
//! ```
//! use pipewright::config::{parse_workflow, WorkflowDefinition};
//! use std::path::{Path, PathBuf};
//!
//! let yaml = r#"
//! name: demo
//! steps:
//!   - id: load
//!     component: src/load.py
//!   - id: clean
//!     component: src/clean.py
//!     depends_on: [load]
//! "#;
//!
//! let config = parse_workflow(yaml, Path::new("demo.yml")).unwrap();
//! let workflow = WorkflowDefinition::from_config(config, PathBuf::from(".")).unwrap();
//! assert_eq!(workflow.steps().len(), 2);
//! ```

pub mod definition;
pub mod loader;
pub mod schema;
pub mod validator;

pub use definition::WorkflowDefinition;
pub use loader::{discover_workflows, load_workflow_file, parse_workflow, DEFAULT_WORKFLOW_DIR};
pub use schema::{Settings, StepConfig, WorkflowConfig, DEFAULT_MAX_PARALLEL};
pub use validator::{validate_document, validate_references, ValidationIssue};
