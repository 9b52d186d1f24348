//! Sub-workflow tasks
//!
//! A whole workflow run as a single task of an enclosing workflow.

use crate::engine::{
    ContextMode, Interactive, Task, TaskContext, TaskEvent, TaskHandle, Workflow,
};
use crate::error::{TaskError, TaskResult};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

enum Source {
    Single(Workflow),
    Factory(Box<dyn Fn() -> TaskResult<Workflow>>),
}

/// An inner workflow that has started but not finished
struct Run {
    workflow: Workflow,
    /// The outer handle, taken by whoever ends the run first
    handle: Rc<RefCell<Option<TaskHandle>>>,
}

/// Runs an inner workflow and reports its outcome as its own
pub struct SubWorkflowTask {
    name: String,
    source: Source,
    mode: ContextMode,
    required: bool,
    skip_allowed: bool,
    /// Keeps a suspended inner workflow alive; cleared when it finishes
    running: Rc<RefCell<Option<Run>>>,
}

impl SubWorkflowTask {
    /// Wrap a workflow instance. Workflows run once, so neither can the task.
    pub fn new(workflow: Workflow, mode: ContextMode) -> Self {
        SubWorkflowTask {
            name: workflow.name(),
            source: Source::Single(workflow),
            mode,
            required: true,
            skip_allowed: false,
            running: Rc::default(),
        }
    }

    /// Build a fresh inner workflow every time the task starts
    pub fn with_factory<F>(name: impl Into<String>, mode: ContextMode, factory: F) -> Self
    where
        F: Fn() -> TaskResult<Workflow> + 'static,
    {
        SubWorkflowTask {
            name: name.into(),
            source: Source::Factory(Box::new(factory)),
            mode,
            required: true,
            skip_allowed: false,
            running: Rc::default(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn skippable(mut self) -> Self {
        self.skip_allowed = true;
        self
    }

    pub fn mode(&self) -> ContextMode {
        self.mode
    }
}

impl Task for SubWorkflowTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, ctx: &TaskContext, handle: TaskHandle) -> TaskResult<()> {
        let workflow = match &self.source {
            Source::Single(workflow) => workflow.clone(),
            Source::Factory(factory) => factory()?,
        };

        let slot = Rc::new(RefCell::new(Some(handle)));
        let forward = Rc::clone(&slot);
        let running: Weak<RefCell<Option<Run>>> = Rc::downgrade(&self.running);
        let name = self.name.clone();
        workflow.add_listener(move |event: &TaskEvent| {
            if !event.is_terminal() {
                return;
            }
            let Some(handle) = forward.borrow_mut().take() else {
                return;
            };
            if let Some(running) = running.upgrade() {
                running.borrow_mut().take();
            }
            match event {
                TaskEvent::WorkflowFailed { cause, .. } => handle.failed(TaskError::Workflow {
                    name: name.clone(),
                    cause: Rc::clone(cause),
                }),
                TaskEvent::WorkflowCancelled { .. } => handle.cancelled(),
                _ => handle.completed(),
            }
        });

        let inner_ctx = ctx.derive(self.mode);
        *self.running.borrow_mut() = Some(Run {
            workflow: workflow.clone(),
            handle: Rc::clone(&slot),
        });
        if let Err(e) = workflow.start(&inner_ctx) {
            self.running.borrow_mut().take();
            slot.borrow_mut().take();
            return Err(anyhow::Error::new(e).into());
        }
        Ok(())
    }

    fn is_required(&self) -> bool {
        self.required
    }

    fn is_skip_allowed(&self) -> bool {
        self.skip_allowed
    }

    fn as_interactive(&self) -> Option<&dyn Interactive> {
        Some(self)
    }

    fn cancel(&mut self) {
        let Some(run) = self.running.borrow_mut().take() else {
            return;
        };
        // Retire the outer handle first so the inner cancellation is not forwarded
        let handle = run.handle.borrow_mut().take();
        drop(handle);
        if let Err(e) = run.workflow.cancel() {
            tracing::trace!(task = %self.name, error = %e, "inner workflow not running");
        }
    }
}

impl Interactive for SubWorkflowTask {
    fn awaiting(&self) -> String {
        self.running
            .borrow()
            .as_ref()
            .and_then(|run| run.workflow.awaiting())
            .unwrap_or_else(|| format!("workflow '{}'", self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EventKind, EventLog, WorkflowState};
    use crate::tasks::{PromptQueue, PromptTask, SyncTask};

    fn writer(key: &'static str, value: &'static str) -> SyncTask<impl FnMut(&TaskContext) -> TaskResult<()>> {
        SyncTask::new(format!("set {}", key), move |ctx: &TaskContext| {
            ctx.set_var(key, value);
            Ok(())
        })
    }

    #[test]
    fn test_inner_completion_propagates() {
        let inner = Workflow::new("payment");
        inner.add_task(writer("paid", "yes")).unwrap();

        let outer = Workflow::new("checkout");
        let log = EventLog::new();
        outer.add_listener(log.clone());
        outer
            .add_task(SubWorkflowTask::new(inner.clone(), ContextMode::Shared))
            .unwrap();
        outer.add_task(writer("done", "yes")).unwrap();

        let ctx = TaskContext::new();
        outer.start(&ctx).unwrap();

        assert_eq!(inner.state(), WorkflowState::Completed);
        assert_eq!(outer.state(), WorkflowState::Completed);
        assert_eq!(ctx.get_var("paid"), Some("yes".to_string()));
        assert_eq!(log.started(), vec!["payment", "set done"]);
    }

    #[test]
    fn test_inherited_context_writes_stay_inside() {
        let inner = Workflow::new("payment");
        inner.add_task(writer("paid", "yes")).unwrap();

        let outer = Workflow::new("checkout");
        outer
            .add_task(SubWorkflowTask::new(inner, ContextMode::Inherit))
            .unwrap();

        let ctx = TaskContext::new();
        outer.start(&ctx).unwrap();

        assert_eq!(outer.state(), WorkflowState::Completed);
        assert!(!ctx.contains("paid"));
    }

    #[test]
    fn test_inner_failure_fails_outer() {
        let inner = Workflow::new("payment");
        inner
            .add_task(SyncTask::new("charge", |_: &TaskContext| {
                Err(TaskError::failed("card declined"))
            }))
            .unwrap();

        let outer = Workflow::new("checkout");
        let log = EventLog::new();
        outer.add_listener(log.clone());
        outer
            .add_task(SubWorkflowTask::new(inner, ContextMode::Inherit))
            .unwrap();
        outer.add_task(writer("done", "yes")).unwrap();

        outer.start(&TaskContext::new()).unwrap();

        assert_eq!(outer.state(), WorkflowState::Failed);
        assert_eq!(log.started(), vec!["payment"]);
        let cause = log.terminal().and_then(|e| e.cause().cloned()).unwrap();
        assert_eq!(cause.to_string(), "Workflow 'payment' failed: card declined");
    }

    #[test]
    fn test_single_workflow_cannot_run_twice() {
        let inner = Workflow::new("payment");
        let outer = Workflow::new("checkout");
        let log = EventLog::new();
        outer.add_listener(log.clone());
        outer
            .add_task(SubWorkflowTask::new(inner.clone(), ContextMode::Shared).optional())
            .unwrap();
        outer
            .add_task(SubWorkflowTask::new(inner, ContextMode::Shared).optional())
            .unwrap();

        outer.start(&TaskContext::new()).unwrap();

        assert_eq!(outer.state(), WorkflowState::Completed);
        assert_eq!(log.count(EventKind::Skipped), 1);
    }

    #[test]
    fn test_finished_run_is_released() {
        let prompts = PromptQueue::new();
        let inner = Workflow::new("payment");
        inner
            .add_task(PromptTask::new("amount", "Amount?", &prompts))
            .unwrap();
        let task = SubWorkflowTask::new(inner.clone(), ContextMode::Inherit);
        let running = Rc::clone(&task.running);

        let outer = Workflow::new("checkout");
        outer.add_task(task).unwrap();
        outer.start(&TaskContext::new()).unwrap();

        assert!(running.borrow().is_some());
        assert_eq!(outer.awaiting(), Some("Amount?".to_string()));

        prompts.pop().unwrap().answer("12");

        assert_eq!(outer.state(), WorkflowState::Completed);
        assert!(running.borrow().is_none());
    }

    #[test]
    fn test_factory_builds_fresh_workflows() {
        let factory = || -> TaskResult<Workflow> {
            let w = Workflow::new("payment");
            w.add_task(writer("paid", "yes")).unwrap();
            Ok(w)
        };
        let outer = Workflow::new("checkout");
        outer
            .add_task(SubWorkflowTask::with_factory("pay once", ContextMode::Shared, factory))
            .unwrap();
        outer
            .add_task(SubWorkflowTask::with_factory("pay twice", ContextMode::Shared, factory))
            .unwrap();

        outer.start(&TaskContext::new()).unwrap();
        assert_eq!(outer.state(), WorkflowState::Completed);
    }
}
