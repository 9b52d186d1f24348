//! Taskflow - a task and workflow engine
//!
//! Tasks run in sequence against a shared [`engine::TaskContext`]. Tasks may
//! complete synchronously or suspend until an external event resumes them,
//! and listeners observe every step. Workflows can be built in code or
//! loaded from a `taskflow.yml` file and run from the command line.

// Public modules
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod runner;
pub mod tasks;

// Re-export commonly used types
pub use engine::{TaskContext, TaskEvent, TaskListener, Workflow, WorkflowState};
pub use error::{FlowError, Result};

/// Current version of Taskflow
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
