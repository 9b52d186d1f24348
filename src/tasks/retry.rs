//! Retryable tasks
//!
//! The workflow never retries. A [`RetryingTask`] retries its own work
//! according to its policy and tells the work whether an attempt is the first.

use crate::engine::{Retryable, Task, TaskContext, TaskHandle};
use crate::error::{TaskError, TaskResult};

/// How many times a retryable failure is attempted again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// A retryable failure fails the task
    #[default]
    Never,
    /// Up to this many attempts in total per start
    Attempts(u32),
}

impl RetryPolicy {
    fn allows(self, attempts: u32) -> bool {
        match self {
            RetryPolicy::Never => false,
            RetryPolicy::Attempts(max) => attempts < max,
        }
    }
}

/// Adapts [`Retryable`] work into a task
pub struct RetryingTask<R> {
    name: String,
    work: R,
    policy: RetryPolicy,
    required: bool,
    first: bool,
}

impl<R: Retryable> RetryingTask<R> {
    pub fn new(name: impl Into<String>, work: R) -> Self {
        RetryingTask {
            name: name.into(),
            work,
            policy: RetryPolicy::Never,
            required: true,
            first: true,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Whether the next `run` takes the first-attempt path
    pub fn is_first_attempt(&self) -> bool {
        self.first
    }

    pub fn work(&self) -> &R {
        &self.work
    }

    /// Make one attempt
    ///
    /// The first call after construction takes the first-attempt path; every
    /// later call takes the subsequent-attempt path.
    pub fn run(&mut self, ctx: &TaskContext) -> TaskResult<bool> {
        if self.first {
            self.first = false;
            self.work.first_attempt(ctx)
        } else {
            self.work.subsequent_attempt(ctx)
        }
    }
}

impl<R: Retryable> Task for RetryingTask<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, ctx: &TaskContext, handle: TaskHandle) -> TaskResult<()> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.run(ctx) {
                Ok(true) => {
                    handle.completed();
                    return Ok(());
                }
                Ok(false) => {
                    handle.failed(TaskError::Aborted(self.name.clone()));
                    return Ok(());
                }
                Err(e) if self.policy.allows(attempts) => {
                    tracing::debug!(task = %self.name, attempts, error = %e, "retrying task");
                }
                Err(e) => {
                    handle.failed(e);
                    return Ok(());
                }
            }
        }
    }

    fn is_required(&self) -> bool {
        self.required
    }
}
