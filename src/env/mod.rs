//! Environment resolution for workflow runs
//!
//! An environment set is a flat YAML map of variable names to values. Sets are
//! looked up in a cascade of candidate locations around the working directory
//! and merged key-by-key into an accumulator, so later sets win over earlier
//! ones. Explicit `key=value` parameters are applied last by the caller.

pub mod template;

pub use template::substitute;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("environment '{0}' not found.")]
    NotFound(String),

    #[error("cannot open '{name}'. {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse '{name}'. {message}")]
    Parse { name: String, message: String },
}

/// Append the default `.yml` extension unless the name already carries a YAML one.
pub fn with_yaml_extension(name: &str) -> String {
    match Path::new(name).extension().and_then(|ext| ext.to_str()) {
        Some("yml") | Some("yaml") => name.to_string(),
        _ => format!("{name}.yml"),
    }
}

/// Candidate locations for an environment file, in lookup order.
pub fn candidate_paths(working_dir: &Path, name: &str) -> Vec<PathBuf> {
    vec![
        PathBuf::from(name),
        working_dir.join("..").join("env").join(name),
        working_dir.join("env").join(name),
        working_dir.join(name),
    ]
}

/// Find the first existing candidate for `name`
pub fn resolve_environment_path(working_dir: &Path, name: &str) -> Result<PathBuf, EnvError> {
    let file_name = with_yaml_extension(name);

    candidate_paths(working_dir, &file_name)
        .into_iter()
        .find(|candidate| candidate.is_file())
        .ok_or(EnvError::NotFound(file_name))
}

/// Resolve the environment set `name` and merge it into `existing`.
pub fn add_environment_from_path(
    working_dir: &Path,
    name: &str,
    existing: &mut HashMap<String, String>,
) -> Result<(), EnvError> {
    if name.is_empty() {
        return Ok(());
    }

    let path = resolve_environment_path(working_dir, name)?;
    debug!("Loading environment '{}' from {}", name, path.display());

    let data = std::fs::read_to_string(&path).map_err(|source| EnvError::Read {
        name: name.to_string(),
        source,
    })?;

    let values = parse_environment(&data).map_err(|message| EnvError::Parse {
        name: name.to_string(),
        message,
    })?;

    existing.extend(values);
    Ok(())
}

/// Merge every named environment set in order, then the explicit parameters.
pub fn load_environment<I, S>(
    working_dir: &Path,
    names: I,
    params: &HashMap<String, String>,
) -> Result<HashMap<String, String>, EnvError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut variables = HashMap::new();

    for name in names {
        add_environment_from_path(working_dir, name.as_ref(), &mut variables)?;
    }

    variables.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
    Ok(variables)
}

/// Parse a flat YAML map, stringifying scalar values.
fn parse_environment(data: &str) -> Result<HashMap<String, String>, String> {
    let value: Value = serde_yaml::from_str(data).map_err(|e| e.to_string())?;

    let mapping = match value {
        Value::Null => return Ok(HashMap::new()),
        Value::Mapping(mapping) => mapping,
        _ => return Err("expected a map of variable names to values".to_string()),
    };

    mapping
        .into_iter()
        .map(|(key, value)| {
            let key = scalar_to_string(&key).ok_or_else(|| "keys must be scalars".to_string())?;
            let value = scalar_to_string(&value)
                .ok_or_else(|| format!("value for '{key}' must be a scalar"))?;
            Ok((key, value))
        })
        .collect()
}

pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}
