//! Workflow state machine
//!
//! A workflow runs its tasks one at a time, in insertion order, on a shared
//! context. It owns no thread: it advances whenever the active task notifies
//! its handle, whether that happens inside `start` or later from a UI event.

use crate::engine::context::TaskContext;
use crate::engine::event::{TaskEvent, TaskListener};
use crate::engine::task::{Task, TaskHandle, TaskRef};
use crate::error::{TaskError, WorkflowError, WorkflowResult};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Lifecycle of a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowState {
    Ready,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowState::Completed | WorkflowState::Failed | WorkflowState::Cancelled
        )
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowState::Ready => "READY",
            WorkflowState::Running => "RUNNING",
            WorkflowState::Completed => "COMPLETED",
            WorkflowState::Failed => "FAILED",
            WorkflowState::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// How a task finished
pub(crate) enum Outcome {
    Completed,
    Skipped,
    Failed(TaskError),
    Cancelled,
}

/// What a handle reports
pub(crate) enum Notice {
    Outcome(Outcome),
    Dropped,
}

type TaskCell = Rc<RefCell<Box<dyn Task>>>;

/// Flags captured when a task is started
struct ActiveTask {
    task: TaskRef,
    required: bool,
    skip_allowed: bool,
    awaiting: Option<String>,
}

/// Notifications received while a task's `start` is on the stack
#[derive(Default)]
struct Dispatch {
    notice: Option<Outcome>,
    dropped: bool,
    /// The notice came from the workflow rather than the task's handle
    interrupted: bool,
}

impl Dispatch {
    fn interrupt(&mut self, outcome: Outcome) {
        if self.notice.is_none() {
            self.notice = Some(outcome);
            self.interrupted = true;
        }
    }
}

pub(crate) struct Inner {
    name: String,
    tasks: Vec<TaskCell>,
    listeners: Vec<Rc<dyn TaskListener>>,
    state: WorkflowState,
    /// Identifies the handle that may currently notify
    token: u64,
    active: Option<ActiveTask>,
    dispatch: Option<Dispatch>,
    context: Option<TaskContext>,
}

pub(crate) type Shared = RefCell<Inner>;

enum Step {
    Start(usize),
    Apply(Outcome),
}

/// An ordered sequence of tasks sharing one context
///
/// `Workflow` is a cheap handle; clones refer to the same workflow.
#[derive(Clone)]
pub struct Workflow {
    shared: Rc<Shared>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Workflow {
            shared: Rc::new(RefCell::new(Inner {
                name: name.into(),
                tasks: Vec::new(),
                listeners: Vec::new(),
                state: WorkflowState::Ready,
                token: 0,
                active: None,
                dispatch: None,
                context: None,
            })),
        }
    }

    pub fn name(&self) -> String {
        self.shared.borrow().name.clone()
    }

    pub fn state(&self) -> WorkflowState {
        self.shared.borrow().state
    }

    pub fn len(&self) -> usize {
        self.shared.borrow().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a task. Only permitted before the workflow starts.
    pub fn add_task<T: Task + 'static>(&self, task: T) -> WorkflowResult<()> {
        self.add_boxed(Box::new(task))
    }

    pub fn add_boxed(&self, task: Box<dyn Task>) -> WorkflowResult<()> {
        let mut inner = self.shared.borrow_mut();
        if inner.state != WorkflowState::Ready {
            return Err(WorkflowError::AlreadyStarted(inner.state));
        }
        inner.tasks.push(Rc::new(RefCell::new(task)));
        Ok(())
    }

    pub fn add_listener<L: TaskListener + 'static>(&self, listener: L) {
        self.add_shared_listener(Rc::new(listener));
    }

    pub fn add_shared_listener(&self, listener: Rc<dyn TaskListener>) {
        self.shared.borrow_mut().listeners.push(listener);
    }

    /// The task that is executing or awaiting completion
    pub fn active_task(&self) -> Option<TaskRef> {
        self.shared.borrow().active.as_ref().map(|a| a.task.clone())
    }

    /// What the active interactive task is waiting for, once it has suspended
    pub fn awaiting(&self) -> Option<String> {
        self.shared
            .borrow()
            .active
            .as_ref()
            .and_then(|a| a.awaiting.clone())
    }

    /// The context of a running workflow
    pub fn context(&self) -> Option<TaskContext> {
        self.shared.borrow().context.clone()
    }

    /// Run the tasks in order on `ctx`
    ///
    /// Returns once the workflow has finished or an interactive task has
    /// suspended it.
    pub fn start(&self, ctx: &TaskContext) -> WorkflowResult<()> {
        let first = {
            let mut inner = self.shared.borrow_mut();
            if inner.state != WorkflowState::Ready {
                return Err(WorkflowError::NotReady(inner.state));
            }
            inner.state = WorkflowState::Running;
            inner.context = Some(ctx.clone());
            tracing::debug!(workflow = %inner.name, tasks = inner.tasks.len(), "workflow started");
            if inner.tasks.is_empty() {
                None
            } else {
                Some(0)
            }
        };

        match first {
            Some(index) => drive(&self.shared, Step::Start(index)),
            None => {
                let listeners = finish(&mut self.shared.borrow_mut(), WorkflowState::Completed);
                emit(&listeners, &[TaskEvent::WorkflowCompleted]);
            }
        }
        Ok(())
    }

    /// Stop the workflow; no further tasks start
    ///
    /// A suspended active task is told to stop through [`Task::cancel`].
    /// Context changes made by tasks that already ran are kept.
    pub fn cancel(&self) -> WorkflowResult<()> {
        let (listeners, task, cell) = {
            let mut inner = self.shared.borrow_mut();
            if inner.state != WorkflowState::Running {
                return Err(WorkflowError::NotRunning(inner.state));
            }
            if let Some(dispatch) = inner.dispatch.as_mut() {
                dispatch.interrupt(Outcome::Cancelled);
                return Ok(());
            }
            let task = inner.active.take().map(|a| a.task);
            let cell = task.as_ref().map(|t| Rc::clone(&inner.tasks[t.index]));
            (finish(&mut inner, WorkflowState::Cancelled), task, cell)
        };
        if let Some(cell) = cell {
            interrupt(&cell);
        }
        emit(&listeners, &[TaskEvent::WorkflowCancelled { task }]);
        Ok(())
    }

    /// Bypass the active task on the user's behalf
    ///
    /// A suspended task is told to stop through [`Task::cancel`] before the
    /// next task starts.
    pub fn skip_current(&self) -> WorkflowResult<()> {
        let cell = {
            let mut inner = self.shared.borrow_mut();
            if inner.state != WorkflowState::Running {
                return Err(WorkflowError::NotRunning(inner.state));
            }
            let active = inner.active.as_ref().ok_or(WorkflowError::NoActiveTask)?;
            if !active.skip_allowed {
                return Err(WorkflowError::SkipNotAllowed(active.task.name.clone()));
            }
            let index = active.task.index;
            if let Some(dispatch) = inner.dispatch.as_mut() {
                dispatch.interrupt(Outcome::Skipped);
                return Ok(());
            }
            // The task's own handle goes stale
            inner.token += 1;
            Rc::clone(&inner.tasks[index])
        };
        interrupt(&cell);
        drive(&self.shared, Step::Apply(Outcome::Skipped));
        Ok(())
    }
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.borrow();
        f.debug_struct("Workflow")
            .field("name", &inner.name)
            .field("state", &inner.state)
            .field("tasks", &inner.tasks.len())
            .finish()
    }
}

/// Whether `token` identifies the task the workflow is waiting on
pub(crate) fn is_current(shared: &Shared, token: u64) -> bool {
    shared.try_borrow().is_ok_and(|inner| {
        inner.state == WorkflowState::Running && inner.active.is_some() && inner.token == token
    })
}

/// Deliver a handle's notification
///
/// Stale tokens are ignored. While the task's `start` is still on the stack the
/// notification is recorded and applied once it returns.
pub(crate) fn resolve(shared: &Rc<Shared>, token: u64, notice: Notice) {
    let outcome = {
        let Ok(mut inner) = shared.try_borrow_mut() else {
            return;
        };
        if inner.state != WorkflowState::Running || inner.active.is_none() || inner.token != token {
            tracing::trace!(workflow = %inner.name, token, "ignoring stale notification");
            return;
        }
        if let Some(dispatch) = inner.dispatch.as_mut() {
            match notice {
                Notice::Outcome(outcome) => {
                    dispatch.notice.get_or_insert(outcome);
                }
                Notice::Dropped => dispatch.dropped = true,
            }
            return;
        }
        match notice {
            Notice::Outcome(outcome) => outcome,
            Notice::Dropped => {
                let name = inner.active.as_ref().map(|a| a.task.name.clone()).unwrap_or_default();
                Outcome::Failed(TaskError::Abandoned(name))
            }
        }
    };
    drive(shared, Step::Apply(outcome));
}

fn drive(shared: &Rc<Shared>, step: Step) {
    let mut step = step;
    loop {
        step = match step {
            Step::Start(index) => match start_task(shared, index) {
                Some(outcome) => Step::Apply(outcome),
                None => return,
            },
            Step::Apply(outcome) => match apply(shared, outcome) {
                Some(next) => Step::Start(next),
                None => return,
            },
        };
    }
}

/// Start the task at `index`, returning its outcome if it finished in `start`
fn start_task(shared: &Rc<Shared>, index: usize) -> Option<Outcome> {
    let (task, ctx, token, task_ref, skip_allowed, interactive, listeners) = {
        let mut inner = shared.borrow_mut();
        if inner.state != WorkflowState::Running {
            return None;
        }
        let ctx = inner.context.clone()?;
        let task = Rc::clone(&inner.tasks[index]);
        let (name, required, skip_allowed, interactive) = {
            let t = task.borrow();
            (
                t.name().to_string(),
                t.is_required(),
                t.is_skip_allowed(),
                t.as_interactive().is_some(),
            )
        };
        let task_ref = TaskRef { index, name };
        inner.token += 1;
        inner.active = Some(ActiveTask {
            task: task_ref.clone(),
            required,
            skip_allowed,
            awaiting: None,
        });
        inner.dispatch = Some(Dispatch::default());
        tracing::trace!(workflow = %inner.name, task = %task_ref, "starting task");
        (
            task,
            ctx,
            inner.token,
            task_ref,
            skip_allowed,
            interactive,
            inner.listeners.clone(),
        )
    };

    emit(
        &listeners,
        &[TaskEvent::TaskStarted {
            task: task_ref.clone(),
        }],
    );

    // A listener may have cancelled before the task got going
    let cancelled_early = shared
        .borrow()
        .dispatch
        .as_ref()
        .is_some_and(|d| d.notice.is_some());
    let result = if cancelled_early {
        Ok(())
    } else {
        let handle = TaskHandle::new(Rc::downgrade(shared), token, task_ref.clone(), skip_allowed);
        let result = task.borrow_mut().start(&ctx, handle);
        result
    };

    let mut inner = shared.borrow_mut();
    let dispatch = inner.dispatch.take().unwrap_or_default();
    if inner.state != WorkflowState::Running || inner.token != token {
        return None;
    }
    if dispatch.interrupted && !cancelled_early {
        inner.token += 1;
        drop(inner);
        interrupt(&task);
        return dispatch.notice;
    }
    match (dispatch.notice, result) {
        (Some(outcome), _) => Some(outcome),
        (None, Err(e)) => Some(Outcome::Failed(e)),
        (None, Ok(())) if dispatch.dropped => Some(Outcome::Failed(TaskError::Abandoned(task_ref.name))),
        (None, Ok(())) if interactive => {
            let awaiting = task.borrow().as_interactive().map(|i| i.awaiting());
            tracing::debug!(
                workflow = %inner.name,
                task = %task_ref,
                awaiting = awaiting.as_deref().unwrap_or(""),
                "task suspended"
            );
            if let Some(active) = inner.active.as_mut() {
                active.awaiting = awaiting;
            }
            None
        }
        (None, Ok(())) => Some(Outcome::Failed(TaskError::NotCompleted(task_ref.name))),
    }
}

/// Apply the active task's outcome, returning the next task to start
fn apply(shared: &Rc<Shared>, outcome: Outcome) -> Option<usize> {
    let (listeners, events, next) = {
        let mut inner = shared.borrow_mut();
        let active = inner.active.take()?;
        let task = active.task;
        let mut events = Vec::with_capacity(2);

        let halted = match outcome {
            Outcome::Completed => {
                events.push(TaskEvent::TaskCompleted { task: task.clone() });
                None
            }
            Outcome::Skipped => {
                events.push(TaskEvent::TaskSkipped {
                    task: task.clone(),
                    cause: None,
                });
                None
            }
            Outcome::Failed(cause) if !active.required => {
                events.push(TaskEvent::TaskSkipped {
                    task: task.clone(),
                    cause: Some(Rc::new(cause)),
                });
                None
            }
            Outcome::Failed(cause) => {
                let cause = Rc::new(cause);
                events.push(TaskEvent::TaskFailed {
                    task: task.clone(),
                    cause: Rc::clone(&cause),
                });
                events.push(TaskEvent::WorkflowFailed {
                    task: task.clone(),
                    cause,
                });
                Some(WorkflowState::Failed)
            }
            Outcome::Cancelled => {
                events.push(TaskEvent::WorkflowCancelled {
                    task: Some(task.clone()),
                });
                Some(WorkflowState::Cancelled)
            }
        };

        let next = task.index + 1;
        match halted {
            Some(state) => (finish(&mut inner, state), events, None),
            None if next < inner.tasks.len() => (inner.listeners.clone(), events, Some(next)),
            None => {
                events.push(TaskEvent::WorkflowCompleted);
                (finish(&mut inner, WorkflowState::Completed), events, None)
            }
        }
    };

    emit(&listeners, &events);
    next
}

/// Enter a terminal state, returning the listeners to notify
fn finish(inner: &mut Inner, state: WorkflowState) -> Vec<Rc<dyn TaskListener>> {
    tracing::debug!(workflow = %inner.name, %state, "workflow finished");
    inner.state = state;
    inner.token += 1;
    inner.active = None;
    inner.context = None;
    inner.listeners.clone()
}

/// Tell a task the workflow has moved past to stop what it left running
fn interrupt(task: &TaskCell) {
    match task.try_borrow_mut() {
        Ok(mut task) => task.cancel(),
        Err(_) => tracing::trace!("task busy, not interrupted"),
    }
}

fn emit(listeners: &[Rc<dyn TaskListener>], events: &[TaskEvent]) {
    for event in events {
        for listener in listeners {
            listener.task_event(event);
        }
    }
}
