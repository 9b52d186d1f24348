//! Workflow construction from configuration
//!
//! Turns validated workflow definitions into runnable [`Workflow`]s. Steps
//! become tasks; `workflow` steps build their sub-workflow afresh each run.

use crate::config::{Config, Step, WorkflowDef};
use crate::engine::{Task, TaskContext, TaskHandle, TracingListener, Workflow};
use crate::error::{ConfigError, ConfigResult, TaskError, TaskResult};
use crate::runner::{interpolate, Conditional};
use crate::tasks::{PromptQueue, PromptTask, SubWorkflowTask};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Builds workflows from a configuration
///
/// All prompt steps of the workflows it builds park on the same queue.
#[derive(Clone)]
pub struct WorkflowFactory {
    config: Rc<Config>,
    prompts: PromptQueue,
}

impl WorkflowFactory {
    pub fn new(config: Config) -> Self {
        WorkflowFactory {
            config: Rc::new(config),
            prompts: PromptQueue::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Prompts waiting for an answer
    pub fn prompts(&self) -> &PromptQueue {
        &self.prompts
    }

    /// Build the named workflow
    pub fn build(&self, name: &str) -> ConfigResult<Workflow> {
        let def = self
            .config
            .workflows
            .get(name)
            .ok_or_else(|| ConfigError::WorkflowNotFound(name.to_string()))?;

        let workflow = Workflow::new(name);
        workflow.add_listener(TracingListener::new(name));
        for step in &def.steps {
            let task = self.build_step(step)?;
            workflow
                .add_boxed(task)
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(workflow)
    }

    /// Public workflows, sorted by name
    pub fn listed(&self) -> impl Iterator<Item = (&String, &WorkflowDef)> {
        self.config.workflows.iter().filter(|(_, def)| !def.private)
    }

    fn build_step(&self, step: &Step) -> ConfigResult<Box<dyn Task>> {
        let task: Box<dyn Task> = if let Some(values) = &step.set {
            let name = step_name(step, || format!("set {}", join_keys(values.keys())));
            Box::new(self.conditional(step, StepTask::new(name, step, Action::Set(values.clone()))))
        } else if let Some(keys) = &step.require {
            let name = step_name(step, || format!("require {}", keys.join(", ")));
            Box::new(self.conditional(step, StepTask::new(name, step, Action::Require(keys.clone()))))
        } else if let Some(message) = &step.echo {
            let name = step_name(step, || "echo".to_string());
            Box::new(self.conditional(step, StepTask::new(name, step, Action::Echo(message.clone()))))
        } else if let Some(message) = &step.fail {
            let name = step_name(step, || "fail".to_string());
            Box::new(self.conditional(step, StepTask::new(name, step, Action::Fail(message.clone()))))
        } else if let Some(prompt) = &step.prompt {
            let message = prompt.message.clone().unwrap_or_else(|| prompt.key.clone());
            let mut task = PromptTask::new(&prompt.key, message, &self.prompts);
            if let Some(name) = &step.name {
                task = task.named(name);
            }
            if !step.required {
                task = task.optional();
            }
            if step.skip || prompt.skip {
                task = task.skippable();
            }
            Box::new(self.conditional(step, task))
        } else if let Some(reference) = &step.workflow {
            let target = reference.name().to_string();
            let name = step_name(step, || target.clone());
            let factory = self.clone();
            let mut task = SubWorkflowTask::with_factory(name, reference.mode(), move || {
                factory
                    .build(&target)
                    .map_err(|e| TaskError::Other(anyhow::Error::new(e)))
            });
            if !step.required {
                task = task.optional();
            }
            if step.skip {
                task = task.skippable();
            }
            Box::new(self.conditional(step, task))
        } else {
            return Err(ConfigError::Invalid(
                "step has no action (expected one of set, require, echo, prompt, workflow, fail)"
                    .to_string(),
            ));
        };
        Ok(task)
    }

    fn conditional<T: Task>(&self, step: &Step, task: T) -> Conditional<T> {
        Conditional::new(step.when.clone(), task)
    }
}

fn step_name(step: &Step, default: impl FnOnce() -> String) -> String {
    step.name.clone().unwrap_or_else(default)
}

fn join_keys<'a>(keys: impl Iterator<Item = &'a String>) -> String {
    keys.map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// What a synchronous step does
#[derive(Debug, Clone)]
enum Action {
    Set(BTreeMap<String, String>),
    Require(Vec<String>),
    Echo(String),
    Fail(String),
}

/// A synchronous configured step
struct StepTask {
    name: String,
    required: bool,
    skip_allowed: bool,
    action: Action,
}

impl StepTask {
    fn new(name: String, step: &Step, action: Action) -> Self {
        StepTask {
            name,
            required: step.required,
            skip_allowed: step.skip,
            action,
        }
    }

    fn run(&self, ctx: &TaskContext) -> TaskResult<()> {
        match &self.action {
            Action::Set(values) => {
                // Keys apply in sorted order, each seeing those before it
                for (key, value) in values {
                    let value = interpolate(value, &ctx.vars())?;
                    ctx.set_var(key.clone(), value);
                }
            }
            Action::Require(keys) => {
                if let Some(missing) = keys.iter().find(|k| !ctx.contains(k)) {
                    return Err(TaskError::MissingObject(missing.clone()));
                }
            }
            Action::Echo(message) => {
                println!("{}", interpolate(message, &ctx.vars())?);
            }
            Action::Fail(message) => {
                let message = interpolate(message, &ctx.vars()).unwrap_or_else(|_| message.clone());
                return Err(TaskError::Failed(message));
            }
        }
        Ok(())
    }
}

impl Task for StepTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, ctx: &TaskContext, handle: TaskHandle) -> TaskResult<()> {
        self.run(ctx)?;
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
