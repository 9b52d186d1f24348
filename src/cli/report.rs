//! Terminal reporting of workflow progress

use crate::engine::{TaskEvent, TaskListener};
use colored::*;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Silent = 0,
    Quiet = 1,
    Normal = 2,
    Verbose = 3,
}

impl Verbosity {
    /// Default `tracing` filter when `RUST_LOG` is not set
    pub fn log_filter(self) -> &'static str {
        match self {
            Verbosity::Verbose => "taskflow=debug",
            _ => "off",
        }
    }
}

/// Prints task progress of a workflow to stderr
#[derive(Debug, Clone)]
pub struct Reporter {
    workflow: String,
    verbosity: Verbosity,
}

impl Reporter {
    pub fn new(workflow: impl Into<String>, verbosity: Verbosity) -> Self {
        Reporter {
            workflow: workflow.into(),
            verbosity,
        }
    }

    /// The line to print for an event, if any at this verbosity
    pub fn line(&self, event: &TaskEvent) -> Option<String> {
        let line = match event {
            TaskEvent::TaskStarted { task } if self.verbosity >= Verbosity::Verbose => {
                format!("{} {}", "[START]".cyan(), task.name)
            }
            TaskEvent::TaskCompleted { task } if self.verbosity >= Verbosity::Normal => {
                format!("{} {}", "[DONE]".green(), task.name)
            }
            TaskEvent::TaskSkipped { task, cause } if self.verbosity >= Verbosity::Normal => {
                match cause {
                    Some(cause) => format!("{} {}: {}", "[SKIP]".yellow(), task.name, cause),
                    None => format!("{} {}", "[SKIP]".yellow(), task.name),
                }
            }
            TaskEvent::TaskFailed { task, cause } if self.verbosity >= Verbosity::Quiet => {
                format!("{} {}: {}", "[FAIL]".red().bold(), task.name, cause)
            }
            TaskEvent::WorkflowCompleted if self.verbosity >= Verbosity::Normal => {
                format!("{} {}", "Workflow completed:".green().bold(), self.workflow)
            }
            TaskEvent::WorkflowFailed { task, .. } if self.verbosity >= Verbosity::Quiet => {
                format!(
                    "{} {} (at {})",
                    "Workflow failed:".red().bold(),
                    self.workflow,
                    task.name
                )
            }
            TaskEvent::WorkflowCancelled { .. } if self.verbosity >= Verbosity::Quiet => {
                format!("{} {}", "Workflow cancelled:".yellow().bold(), self.workflow)
            }
            _ => return None,
        };
        Some(line)
    }
}

impl TaskListener for Reporter {
    fn task_event(&self, event: &TaskEvent) {
        if let Some(line) = self.line(event) {
            eprintln!("{}", line);
        }
    }
}
