//! Synchronous closure tasks

use crate::engine::{Task, TaskContext, TaskHandle};
use crate::error::TaskResult;

/// A task that runs a closure to completion inside `start`
///
/// An `Err` from the closure fails the task.
pub struct SyncTask<F> {
    name: String,
    required: bool,
    skip_allowed: bool,
    action: F,
}

impl<F> SyncTask<F>
where
    F: FnMut(&TaskContext) -> TaskResult<()>,
{
    pub fn new(name: impl Into<String>, action: F) -> Self {
        SyncTask {
            name: name.into(),
            required: true,
            skip_allowed: false,
            action,
        }
    }

    /// Tolerate failure of this task
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Let the user bypass this task
    pub fn skippable(mut self) -> Self {
        self.skip_allowed = true;
        self
    }
}

impl<F> Task for SyncTask<F>
where
    F: FnMut(&TaskContext) -> TaskResult<()>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, ctx: &TaskContext, handle: TaskHandle) -> TaskResult<()> {
        (self.action)(ctx)?;
        handle.completed();
        Ok(())
    }

    fn is_required(&self) -> bool {
        self.required
    }

    fn is_skip_allowed(&self) -> bool {
        self.skip_allowed
    }
}
