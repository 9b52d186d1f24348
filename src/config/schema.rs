//! Configuration validation
//!
//! This module provides validation logic for configuration files.

use crate::config::types::{Config, Step, WorkflowDef};
use crate::error::{ConfigError, ConfigResult};
use std::collections::HashSet;

/// Validate a complete configuration
pub fn validate_config(config: &Config) -> ConfigResult<()> {
    for (name, workflow) in &config.workflows {
        validate_workflow(config, name, workflow)?;
    }

    detect_circular_references(config)?;

    Ok(())
}

/// Validate a single workflow
pub fn validate_workflow(config: &Config, name: &str, workflow: &WorkflowDef) -> ConfigResult<()> {
    for (index, step) in workflow.steps.iter().enumerate() {
        validate_step(step).map_err(|reason| {
            ConfigError::Invalid(format!("workflow '{}', step {}: {}", name, index + 1, reason))
        })?;

        if let Some(reference) = &step.workflow {
            if !config.workflows.contains_key(reference.name()) {
                return Err(ConfigError::WorkflowNotFound(reference.name().to_string()));
            }
        }
    }
    Ok(())
}

/// Check a step's shape, returning the reason it is invalid
fn validate_step(step: &Step) -> Result<(), String> {
    match step.action_count() {
        1 => {}
        0 => {
            return Err(
                "no action given (expected one of set, require, echo, prompt, workflow, fail)"
                    .to_string(),
            )
        }
        n => return Err(format!("{} actions given, expected exactly one", n)),
    }

    if let Some(keys) = &step.require {
        if keys.is_empty() || keys.iter().any(|k| k.trim().is_empty()) {
            return Err("require needs at least one non-empty key".to_string());
        }
    }
    if let Some(values) = &step.set {
        if values.is_empty() || values.keys().any(|k| k.trim().is_empty()) {
            return Err("set needs at least one non-empty key".to_string());
        }
    }
    if let Some(prompt) = &step.prompt {
        if prompt.key.trim().is_empty() {
            return Err("prompt key cannot be empty".to_string());
        }
    }
    for when in &step.when {
        let conditions = [
            when.set.is_some(),
            when.not_set.is_some(),
            when.equal.is_some(),
            when.not_equal.is_some(),
        ];
        if conditions.iter().filter(|c| **c).count() != 1 {
            return Err("each when condition needs exactly one test".to_string());
        }
    }

    Ok(())
}

/// Detect workflows that reach themselves through sub-workflow steps
fn detect_circular_references(config: &Config) -> ConfigResult<()> {
    let mut visited = HashSet::new();
    for name in config.workflows.keys() {
        let mut stack = Vec::new();
        check_cycle(config, name, &mut visited, &mut stack)?;
    }
    Ok(())
}

/// Recursively check for cycles in sub-workflow references
fn check_cycle(
    config: &Config,
    name: &str,
    visited: &mut HashSet<String>,
    stack: &mut Vec<String>,
) -> ConfigResult<()> {
    if stack.iter().any(|s| s == name) {
        stack.push(name.to_string());
        return Err(ConfigError::CircularReference(stack.join(" -> ")));
    }

    if visited.contains(name) {
        return Ok(());
    }

    let workflow = config
        .workflows
        .get(name)
        .ok_or_else(|| ConfigError::WorkflowNotFound(name.to_string()))?;

    stack.push(name.to_string());

    for reference in workflow.steps.iter().filter_map(|s| s.workflow.as_ref()) {
        check_cycle(config, reference.name(), visited, stack)?;
    }

    stack.pop();
    visited.insert(name.to_string());

    Ok(())
}
