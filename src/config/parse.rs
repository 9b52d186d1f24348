//! Configuration file parsing and discovery

use crate::config::types::{Config, WorkflowDef};
use crate::error::{ConfigError, ConfigResult, FlowError};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file names to search for
const CONFIG_FILE_NAMES: &[&str] = &["taskflow.yml", "taskflow.yaml"];

/// Find the configuration file by searching current and parent directories
pub fn find_config_file() -> ConfigResult<PathBuf> {
    find_config_file_from(env::current_dir().map_err(|e| {
        ConfigError::Invalid(format!("Failed to get current directory: {}", e))
    })?)
}

/// Find the configuration file starting from a specific directory
pub fn find_config_file_from(start_dir: PathBuf) -> ConfigResult<PathBuf> {
    let mut current_dir = start_dir;
    let mut searched_paths = Vec::new();

    loop {
        for file_name in CONFIG_FILE_NAMES {
            let config_path = current_dir.join(file_name);
            searched_paths.push(config_path.display().to_string());

            if config_path.is_file() {
                return Ok(config_path);
            }
        }

        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => return Err(ConfigError::NotFound(searched_paths.join(", "))),
        }
    }
}

/// Parse a configuration file from a path
pub fn parse_config_file(path: &Path) -> Result<Config, FlowError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read file: {}", e)))?;

    parse_config(&contents, Some(path))
}

/// Parse configuration from a string
///
/// Includes are resolved relative to `config_path` when one is given.
pub fn parse_config(yaml: &str, config_path: Option<&Path>) -> Result<Config, FlowError> {
    let mut config: Config = serde_yaml::from_str(yaml)?;

    if let Some(base_path) = config_path {
        process_includes(&mut config, base_path)?;
    }

    Ok(config)
}

/// Replace workflows that name an include file with the file's content
fn process_includes(config: &mut Config, config_path: &Path) -> ConfigResult<()> {
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    for workflow in config.workflows.values_mut() {
        let Some(include_path) = workflow.include.take() else {
            continue;
        };
        let mut included = load_included_workflow(&base_dir.join(include_path))?;
        // Settings given alongside the include win over the included file
        included.usage = workflow.usage.take().or(included.usage);
        included.description = workflow.description.take().or(included.description);
        included.private |= workflow.private;
        *workflow = included;
    }

    Ok(())
}

/// Load a workflow from an included file
fn load_included_workflow(path: &Path) -> ConfigResult<WorkflowDef> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::IncludeFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    let workflow: WorkflowDef =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::IncludeFile {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

    if workflow.include.is_some() {
        return Err(ConfigError::IncludeFile {
            path: path.to_path_buf(),
            error: "included workflows cannot include further files".to_string(),
        });
    }

    Ok(workflow)
}

/// Parse configuration with automatic file discovery
pub fn parse_config_auto() -> Result<(Config, PathBuf), FlowError> {
    let config_path = find_config_file()?;
    let config = parse_config_file(&config_path)?;
    Ok((config, config_path))
}
