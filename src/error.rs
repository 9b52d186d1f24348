//! Error types for Taskflow

use crate::engine::WorkflowState;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;
use thiserror::Error;

/// Result type alias for Taskflow operations
pub type Result<T> = std::result::Result<T, FlowError>;

/// Main error type for Taskflow
#[derive(Error, Debug)]
pub enum FlowError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Workflow misuse (adding tasks after start, double start, ...)
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Variable interpolation errors
    #[error("Interpolation error: {0}")]
    Interpolation(#[from] InterpolationError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Environment file errors
    #[error("Environment file error: {0}")]
    Env(#[from] dotenvy::Error),
}

/// Configuration parsing and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find config file (searched: {0})")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Workflow '{0}' is not defined")]
    WorkflowNotFound(String),

    #[error("Circular workflow reference detected: {0}")]
    CircularReference(String),

    #[error("Failed to include file '{path}': {error}")]
    IncludeFile { path: PathBuf, error: String },
}

/// Errors raised by the workflow itself when it is driven incorrectly
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Tasks can only be added before the workflow starts (state: {0})")]
    AlreadyStarted(WorkflowState),

    #[error("Workflow cannot be started from state {0}")]
    NotReady(WorkflowState),

    #[error("Workflow is not running (state: {0})")]
    NotRunning(WorkflowState),

    #[error("No task is awaiting completion")]
    NoActiveTask,

    #[error("Task '{0}' may not be skipped")]
    SkipNotAllowed(String),
}

/// Task failures, reported through the task's handle or returned from `start`
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("{0}")]
    Failed(String),

    #[error("Object '{0}' is not present in the context")]
    MissingObject(String),

    #[error("Task '{0}' gave up")]
    Aborted(String),

    #[error("Task '{0}' returned without completing")]
    NotCompleted(String),

    #[error("Task '{0}' dropped its handle without notifying")]
    Abandoned(String),

    #[error("Task '{0}' may not be skipped")]
    SkipNotAllowed(String),

    #[error("Workflow '{name}' failed: {cause}")]
    Workflow { name: String, cause: Rc<TaskError> },

    #[error("Interpolation error: {0}")]
    Interpolation(#[from] InterpolationError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskError {
    /// Convenience constructor for ad-hoc failures
    pub fn failed(message: impl Into<String>) -> Self {
        TaskError::Failed(message.into())
    }
}

/// Variable interpolation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterpolationError {
    #[error("Variable '{0}' is not defined")]
    UndefinedVariable(String),

    #[error("Invalid interpolation syntax: {0}")]
    InvalidSyntax(String),
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for task operations
pub type TaskResult<T> = std::result::Result<T, TaskError>;

/// Specialized result type for workflow operations
pub type WorkflowResult<T> = std::result::Result<T, WorkflowError>;

/// Specialized result type for interpolation operations
pub type InterpolationResult<T> = std::result::Result<T, InterpolationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_error_wraps_anyhow() {
        let err: TaskError = anyhow::anyhow!("database unavailable").into();
        assert_eq!(err.to_string(), "database unavailable");
    }

    #[test]
    fn test_nested_workflow_error_message() {
        let err = TaskError::Workflow {
            name: "payment".to_string(),
            cause: Rc::new(TaskError::failed("card declined")),
        };
        assert_eq!(err.to_string(), "Workflow 'payment' failed: card declined");
    }

    #[test]
    fn test_workflow_error_converts_to_flow_error() {
        let err: FlowError = WorkflowError::NoActiveTask.into();
        assert!(matches!(err, FlowError::Workflow(WorkflowError::NoActiveTask)));
    }
}
