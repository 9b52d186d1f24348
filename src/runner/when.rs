//! When condition evaluation
//!
//! This module evaluates step conditions against the context and wraps tasks
//! so that they only act when their conditions hold.

use crate::config::When;
use crate::engine::{Interactive, Task, TaskContext, TaskHandle};
use crate::error::TaskResult;
use crate::runner::interpolate;

/// Evaluate a list of when conditions (all must be true - AND logic)
pub fn evaluate_when_list(when_list: &[When], ctx: &TaskContext) -> TaskResult<bool> {
    for when in when_list {
        if !evaluate_when(when, ctx)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Evaluate a single when condition
pub fn evaluate_when(when: &When, ctx: &TaskContext) -> TaskResult<bool> {
    if let Some(key) = &when.set {
        return Ok(ctx.contains(key));
    }
    if let Some(key) = &when.not_set {
        return Ok(!ctx.contains(key));
    }

    let vars = ctx.vars();
    if let Some(cmp) = &when.equal {
        return Ok(interpolate(&cmp.left, &vars)? == interpolate(&cmp.right, &vars)?);
    }
    if let Some(cmp) = &when.not_equal {
        return Ok(interpolate(&cmp.left, &vars)? != interpolate(&cmp.right, &vars)?);
    }

    Ok(true)
}

/// A task that completes without acting unless its conditions hold
pub struct Conditional<T> {
    when: Vec<When>,
    inner: T,
}

impl<T: Task> Conditional<T> {
    pub fn new(when: Vec<When>, inner: T) -> Self {
        Conditional { when, inner }
    }
}

impl<T: Task> Task for Conditional<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn start(&mut self, ctx: &TaskContext, handle: TaskHandle) -> TaskResult<()> {
        if evaluate_when_list(&self.when, ctx)? {
            return self.inner.start(ctx, handle);
        }
        tracing::debug!(task = %self.inner.name(), "conditions not met");
        handle.completed();
        Ok(())
    }

    fn is_required(&self) -> bool {
        self.inner.is_required()
    }

    fn is_skip_allowed(&self) -> bool {
        self.inner.is_skip_allowed()
    }

    fn as_interactive(&self) -> Option<&dyn Interactive> {
        self.inner.as_interactive()
    }

    fn cancel(&mut self) {
        self.inner.cancel()
    }
}
