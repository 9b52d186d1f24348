//! Workflow events and listeners
//!
//! A workflow notifies its listeners as each task starts and finishes and
//! when the workflow itself reaches a terminal state.

use crate::engine::task::TaskRef;
use crate::error::TaskError;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// The type of an event, independent of its payload
///
/// Task and workflow outcomes are distinct kinds, so a run yields at most one
/// event of each workflow kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Started,
    Completed,
    Skipped,
    Failed,
    WorkflowCompleted,
    WorkflowFailed,
    Cancelled,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Started => "STARTED",
            EventKind::Completed => "COMPLETED",
            EventKind::Skipped => "SKIPPED",
            EventKind::Failed => "FAILED",
            EventKind::WorkflowCompleted => "WORKFLOW_COMPLETED",
            EventKind::WorkflowFailed => "WORKFLOW_FAILED",
            EventKind::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// Events emitted while a workflow runs
#[derive(Debug, Clone)]
pub enum TaskEvent {
    /// A task has been handed the context
    TaskStarted { task: TaskRef },

    /// A task reported completion
    TaskCompleted { task: TaskRef },

    /// A task was bypassed. `cause` is set when a non-required task failed.
    TaskSkipped {
        task: TaskRef,
        cause: Option<Rc<TaskError>>,
    },

    /// A required task failed
    TaskFailed { task: TaskRef, cause: Rc<TaskError> },

    /// Every task finished
    WorkflowCompleted,

    /// The workflow halted on a required task's failure
    WorkflowFailed { task: TaskRef, cause: Rc<TaskError> },

    /// The workflow was cancelled, while `task` was active if set
    WorkflowCancelled { task: Option<TaskRef> },
}

impl TaskEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TaskEvent::TaskStarted { .. } => EventKind::Started,
            TaskEvent::TaskCompleted { .. } => EventKind::Completed,
            TaskEvent::TaskSkipped { .. } => EventKind::Skipped,
            TaskEvent::TaskFailed { .. } => EventKind::Failed,
            TaskEvent::WorkflowCompleted => EventKind::WorkflowCompleted,
            TaskEvent::WorkflowFailed { .. } => EventKind::WorkflowFailed,
            TaskEvent::WorkflowCancelled { .. } => EventKind::Cancelled,
        }
    }

    /// The task the event refers to, if any
    pub fn task(&self) -> Option<&TaskRef> {
        match self {
            TaskEvent::TaskStarted { task }
            | TaskEvent::TaskCompleted { task }
            | TaskEvent::TaskSkipped { task, .. }
            | TaskEvent::TaskFailed { task, .. }
            | TaskEvent::WorkflowFailed { task, .. } => Some(task),
            TaskEvent::WorkflowCancelled { task } => task.as_ref(),
            TaskEvent::WorkflowCompleted => None,
        }
    }

    /// The failure carried by the event, if any
    pub fn cause(&self) -> Option<&Rc<TaskError>> {
        match self {
            TaskEvent::TaskFailed { cause, .. } | TaskEvent::WorkflowFailed { cause, .. } => {
                Some(cause)
            }
            TaskEvent::TaskSkipped { cause, .. } => cause.as_ref(),
            _ => None,
        }
    }

    /// Whether this event ends the workflow
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskEvent::WorkflowCompleted
                | TaskEvent::WorkflowFailed { .. }
                | TaskEvent::WorkflowCancelled { .. }
        )
    }
}

/// Observer of workflow events
pub trait TaskListener {
    fn task_event(&self, event: &TaskEvent);
}

impl<F> TaskListener for F
where
    F: Fn(&TaskEvent),
{
    fn task_event(&self, event: &TaskEvent) {
        self(event)
    }
}

/// A listener that records every event it receives
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<TaskEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TaskEvent> {
        self.events.borrow().clone()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.borrow().iter().filter(|e| e.kind() == kind).count()
    }

    /// Names of the tasks that were started, in order
    pub fn started(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                TaskEvent::TaskStarted { task } => Some(task.name.clone()),
                _ => None,
            })
            .collect()
    }

    /// The terminal event, once the workflow has finished
    pub fn terminal(&self) -> Option<TaskEvent> {
        self.events.borrow().iter().find(|e| e.is_terminal()).cloned()
    }
}

impl TaskListener for EventLog {
    fn task_event(&self, event: &TaskEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

/// A listener that writes events to the `tracing` subscriber
#[derive(Debug, Clone)]
pub struct TracingListener {
    workflow: String,
}

impl TracingListener {
    pub fn new(workflow: impl Into<String>) -> Self {
        TracingListener {
            workflow: workflow.into(),
        }
    }
}

impl TaskListener for TracingListener {
    fn task_event(&self, event: &TaskEvent) {
        let workflow = self.workflow.as_str();
        match event {
            TaskEvent::TaskStarted { task } => {
                tracing::debug!(workflow, task = %task, "task started")
            }
            TaskEvent::TaskCompleted { task } => {
                tracing::debug!(workflow, task = %task, "task completed")
            }
            TaskEvent::TaskSkipped { task, cause: None } => {
                tracing::info!(workflow, task = %task, "task skipped")
            }
            TaskEvent::TaskSkipped {
                task,
                cause: Some(cause),
            } => {
                tracing::warn!(workflow, task = %task, error = %cause, "optional task failed")
            }
            TaskEvent::TaskFailed { task, cause } => {
                tracing::error!(workflow, task = %task, error = %cause, "task failed")
            }
            TaskEvent::WorkflowCompleted => tracing::info!(workflow, "workflow completed"),
            TaskEvent::WorkflowFailed { task, cause } => {
                tracing::error!(workflow, task = %task, error = %cause, "workflow failed")
            }
            TaskEvent::WorkflowCancelled { task } => match task {
                Some(task) => tracing::info!(workflow, task = %task, "workflow cancelled"),
                None => tracing::info!(workflow, "workflow cancelled"),
            },
        }
    }
}
