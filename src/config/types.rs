//! Core configuration types
//!
//! This module defines the data structures that represent a taskflow.yml file.

use crate::engine::ContextMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Application name (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Application usage description (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,

    /// Workflows defined in the configuration
    #[serde(default)]
    pub workflows: BTreeMap<String, WorkflowDef>,
}

/// A workflow definition
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WorkflowDef {
    /// Usage description for help text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,

    /// Longer description for help text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether this workflow is private (only usable as a sub-workflow)
    #[serde(default)]
    pub private: bool,

    /// Steps to run, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,

    /// Load the workflow body from another file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,
}

/// A single step. Exactly one of the action fields must be present.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Step {
    /// Display name (defaults to a description of the action)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Whether failure of this step halts the workflow
    #[serde(default = "default_required")]
    pub required: bool,

    /// Whether the user may bypass this step
    #[serde(default)]
    pub skip: bool,

    /// Conditions that must all hold for the step to act
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub when: Vec<When>,

    /// Store values in the context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<BTreeMap<String, String>>,

    /// Fail unless these keys are present in the context
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_keys"
    )]
    pub require: Option<Vec<String>>,

    /// Print a message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub echo: Option<String>,

    /// Ask the user for a value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<Prompt>,

    /// Run another workflow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowRef>,

    /// Fail with a message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail: Option<String>,
}

fn default_required() -> bool {
    true
}

impl Step {
    /// Number of action fields present
    pub fn action_count(&self) -> usize {
        [
            self.set.is_some(),
            self.require.is_some(),
            self.echo.is_some(),
            self.prompt.is_some(),
            self.workflow.is_some(),
            self.fail.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}

/// A prompt for user input
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Prompt {
    /// Context key to store the answer under
    pub key: String,

    /// Message shown to the user (defaults to the key)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Whether a blank answer skips the prompt
    #[serde(default)]
    pub skip: bool,
}

/// A reference to another workflow
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum WorkflowRef {
    /// Simple workflow name
    Simple(String),

    /// Workflow name with context mode
    Complex(WorkflowRefDetail),
}

/// Detailed sub-workflow reference
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowRefDetail {
    /// Name of the workflow to run
    pub name: String,

    /// How the sub-workflow sees the enclosing context
    #[serde(default)]
    pub context: ContextMode,
}

impl WorkflowRef {
    pub fn name(&self) -> &str {
        match self {
            WorkflowRef::Simple(name) => name,
            WorkflowRef::Complex(detail) => &detail.name,
        }
    }

    pub fn mode(&self) -> ContextMode {
        match self {
            WorkflowRef::Simple(_) => ContextMode::default(),
            WorkflowRef::Complex(detail) => detail.context,
        }
    }
}

/// A conditional expression
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct When {
    /// Check if a context key is present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<String>,

    /// Check if a context key is absent
    #[serde(rename = "not-set", default, skip_serializing_if = "Option::is_none")]
    pub not_set: Option<String>,

    /// Check if values are equal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equal: Option<WhenComparison>,

    /// Check if values are not equal
    #[serde(rename = "not-equal", default, skip_serializing_if = "Option::is_none")]
    pub not_equal: Option<WhenComparison>,
}

/// A comparison for when conditions
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WhenComparison {
    /// Left-hand side of comparison
    pub left: String,

    /// Right-hand side of comparison
    pub right: String,
}

/// Custom deserializer for key lists that handles both single values and arrays
fn deserialize_keys<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    let value = Value::deserialize(deserializer)?;

    match value {
        // Single key
        Value::String(s) => Ok(Some(vec![s])),
        // Array of keys
        Value::Sequence(seq) => {
            let mut keys = Vec::new();
            for item in seq {
                let key = String::deserialize(item).map_err(D::Error::custom)?;
                keys.push(key);
            }
            Ok(Some(keys))
        }
        Value::Null => Ok(Some(Vec::new())),
        _ => Err(D::Error::custom("require must be a string or array")),
    }
}
