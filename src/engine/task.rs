//! Task contract
//!
//! A task is started with the workflow's context and a [`TaskHandle`]. It
//! reports its outcome through the handle, either before `start` returns
//! (synchronous tasks) or later from a UI callback (interactive tasks).

use crate::engine::context::TaskContext;
use crate::engine::workflow::{self, Notice, Outcome, Shared};
use crate::error::{TaskError, TaskResult};
use std::fmt;
use std::rc::Weak;

/// A unit of work in a workflow
pub trait Task {
    /// Display name, used in events and logs
    fn name(&self) -> &str;

    /// Begin the task. Report the outcome through `handle`.
    ///
    /// Returning `Err` fails the task unless the handle already notified.
    fn start(&mut self, ctx: &TaskContext, handle: TaskHandle) -> TaskResult<()>;

    /// A failing required task halts the workflow; other failures are tolerated
    fn is_required(&self) -> bool {
        true
    }

    /// Whether the user may bypass the task without failing it
    fn is_skip_allowed(&self) -> bool {
        false
    }

    /// Interactive tasks may return from `start` before notifying
    fn as_interactive(&self) -> Option<&dyn Interactive> {
        None
    }

    /// Stop work left running by `start`
    ///
    /// Called when the workflow cancels or skips the task while it is
    /// suspended. The task's handle is already stale by then.
    fn cancel(&mut self) {}
}

impl fmt::Debug for dyn Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name())
            .field("required", &self.is_required())
            .finish()
    }
}

/// Capability of tasks that wait on an external event to complete
pub trait Interactive {
    /// Short description of what the task is waiting for
    fn awaiting(&self) -> String;
}

/// Capability of tasks whose work can be attempted more than once
///
/// `Ok(false)` means the attempt failed and must not be retried. `Err` means
/// the attempt failed and may be retried.
pub trait Retryable {
    fn first_attempt(&mut self, ctx: &TaskContext) -> TaskResult<bool>;

    /// Called for every attempt after the first, e.g. to suppress a confirmation
    fn subsequent_attempt(&mut self, ctx: &TaskContext) -> TaskResult<bool> {
        self.first_attempt(ctx)
    }
}

/// Identifies a task within its workflow
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskRef {
    pub index: usize,
    pub name: String,
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{})", self.name, self.index + 1)
    }
}

/// The channel through which a task notifies its workflow
///
/// Each notification consumes the handle, so a task reports at most once.
/// Dropping a handle without notifying fails the task.
pub struct TaskHandle {
    workflow: Weak<Shared>,
    token: u64,
    task: TaskRef,
    skip_allowed: bool,
    notified: bool,
}

impl TaskHandle {
    pub(crate) fn new(workflow: Weak<Shared>, token: u64, task: TaskRef, skip_allowed: bool) -> Self {
        TaskHandle {
            workflow,
            token,
            task,
            skip_allowed,
            notified: false,
        }
    }

    /// The task this handle belongs to
    pub fn task(&self) -> &TaskRef {
        &self.task
    }

    /// Whether the owning workflow is still waiting on this handle
    pub fn is_live(&self) -> bool {
        self.workflow
            .upgrade()
            .is_some_and(|shared| workflow::is_current(&shared, self.token))
    }

    pub fn completed(mut self) {
        self.notify(Outcome::Completed);
    }

    pub fn failed(mut self, cause: TaskError) {
        self.notify(Outcome::Failed(cause));
    }

    pub fn cancelled(mut self) {
        self.notify(Outcome::Cancelled);
    }

    /// Bypass the task. Fails it instead when the task is not skip-allowed.
    pub fn skipped(mut self) {
        let outcome = if self.skip_allowed {
            Outcome::Skipped
        } else {
            Outcome::Failed(TaskError::SkipNotAllowed(self.task.name.clone()))
        };
        self.notify(outcome);
    }

    fn notify(&mut self, outcome: Outcome) {
        self.notified = true;
        if let Some(shared) = self.workflow.upgrade() {
            workflow::resolve(&shared, self.token, Notice::Outcome(outcome));
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        if self.notified {
            return;
        }
        if let Some(shared) = self.workflow.upgrade() {
            workflow::resolve(&shared, self.token, Notice::Dropped);
        }
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("task", &self.task)
            .field("token", &self.token)
            .finish()
    }
}
