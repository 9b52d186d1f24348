//! Interactive prompt tasks
//!
//! A prompt task suspends its workflow until the surrounding UI answers it.
//! Pending prompts are parked on a [`PromptQueue`] that the UI drains from its
//! event loop.

use crate::engine::{Interactive, Task, TaskContext, TaskHandle};
use crate::error::{TaskError, TaskResult};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// Prompts waiting for an answer, oldest first
#[derive(Clone, Default)]
pub struct PromptQueue {
    pending: Rc<RefCell<VecDeque<PendingPrompt>>>,
}

impl PromptQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the oldest pending prompt
    pub fn pop(&self) -> Option<PendingPrompt> {
        self.pending.borrow_mut().pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    fn push(&self, prompt: PendingPrompt) {
        self.pending.borrow_mut().push_back(prompt);
    }
}

impl fmt::Debug for PromptQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptQueue").field("pending", &self.len()).finish()
    }
}

/// A suspended prompt. Consuming it resumes the workflow.
pub struct PendingPrompt {
    key: String,
    message: String,
    skip_allowed: bool,
    ctx: TaskContext,
    handle: TaskHandle,
}

impl PendingPrompt {
    /// The context key the answer is stored under
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn skip_allowed(&self) -> bool {
        self.skip_allowed
    }

    /// Store the answer and complete the task
    pub fn answer(self, value: impl Into<String>) {
        self.ctx.set_var(self.key, value.into());
        self.handle.completed();
    }

    pub fn skip(self) {
        self.handle.skipped();
    }

    pub fn cancel(self) {
        self.handle.cancelled();
    }

    pub fn reject(self, reason: impl Into<String>) {
        self.handle.failed(TaskError::Failed(reason.into()));
    }
}

impl fmt::Debug for PendingPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingPrompt")
            .field("key", &self.key)
            .field("message", &self.message)
            .finish()
    }
}

/// Asks the user for a value and stores it in the context
pub struct PromptTask {
    name: String,
    key: String,
    message: String,
    required: bool,
    skip_allowed: bool,
    queue: PromptQueue,
}

impl PromptTask {
    pub fn new(key: impl Into<String>, message: impl Into<String>, queue: &PromptQueue) -> Self {
        let key = key.into();
        PromptTask {
            name: format!("prompt {}", key),
            key,
            message: message.into(),
            required: true,
            skip_allowed: false,
            queue: queue.clone(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn skippable(mut self) -> Self {
        self.skip_allowed = true;
        self
    }
}

impl Task for PromptTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, ctx: &TaskContext, handle: TaskHandle) -> TaskResult<()> {
        self.queue.push(PendingPrompt {
            key: self.key.clone(),
            message: self.message.clone(),
            skip_allowed: self.skip_allowed,
            ctx: ctx.clone(),
            handle,
        });
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
}

impl Interactive for PromptTask {
    fn awaiting(&self) -> String {
        self.message.clone()
    }
}
