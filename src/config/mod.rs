//! Run configuration
//!
//! Everything one invocation needs before the engine starts: the target file,
//! the environment sets to load, explicit `key=value` parameters and output
//! settings.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::env::{self, EnvError};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Workflow file to run
    pub target: PathBuf,
    /// Environment set names, merged in order
    pub environments: Vec<String>,
    /// Explicit variables; these win over every environment set
    pub params: HashMap<String, String>,
    /// Verbosity level for logging
    pub verbose: u8,
    /// Suppress progress bars
    pub quiet: bool,
}

impl RunConfig {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            ..Default::default()
        }
    }

    pub fn with_environment(mut self, name: impl Into<String>) -> Self {
        self.environments.push(name.into());
        self
    }

    pub fn with_environments<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environments.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add parameters given as `key=value` strings.
    pub fn with_raw_params<I, S>(mut self, raw: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for param in raw {
            let (key, value) = parse_param(param.as_ref())?;
            self.params.insert(key, value);
        }
        Ok(self)
    }

    pub fn with_verbose(mut self, verbose: u8) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Directory containing the target; environment lookups are relative to it.
    pub fn target_dir(&self) -> &Path {
        match self.target.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    /// Merge the configured environment sets, then the explicit parameters.
    pub fn load_environment(&self) -> std::result::Result<HashMap<String, String>, EnvError> {
        env::load_environment(self.target_dir(), &self.environments, &self.params)
    }

    /// Log filter for the configured verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn,nap::request=info",
            1 => "info",
            2 => "debug",
            _ => "trace,hyper=debug,reqwest=debug",
        }
    }
}

/// Split `key=value` on the first `=`.
pub fn parse_param(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| Error::Config(format!("parameter '{raw}' must look like <name>=<value>")))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(Error::Config(format!("parameter '{raw}' has an empty name")));
    }

    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("token=a=b").unwrap(),
            ("token".to_string(), "a=b".to_string())
        );
        assert_eq!(
            parse_param("empty=").unwrap(),
            ("empty".to_string(), String::new())
        );
        assert!(matches!(parse_param("novalue"), Err(Error::Config(_))));
        assert!(matches!(parse_param("=x"), Err(Error::Config(_))));
    }

    #[test]
    fn test_builder() {
        let config = RunConfig::new("tests/main.yml")
            .with_environment("dev")
            .with_environments(["local"])
            .with_raw_params(["a=1", "b=2"])
            .unwrap()
            .with_verbose(2)
            .with_quiet(true);

        assert_eq!(config.environments, vec!["dev", "local"]);
        assert_eq!(config.params["b"], "2");
        assert_eq!(config.target_dir(), Path::new("tests"));
        assert_eq!(config.log_level(), "debug");
        assert!(config.quiet);
    }

    #[test]
    fn test_target_dir_of_bare_file_is_current_dir() {
        assert_eq!(RunConfig::new("main.yml").target_dir(), Path::new("."));
    }

    #[test]
    fn test_load_environment_params_win() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::create_dir(dir.path().join("env"))?;
        std::fs::write(dir.path().join("env/dev.yml"), "host: dev\nport: 80\n")?;
        std::fs::write(dir.path().join("env/extra.yml"), "port: 8080\n")?;

        let config = RunConfig::new(dir.path().join("main.yml"))
            .with_environments(["dev", "extra"])
            .with_param("host", "override");

        let env = config.load_environment()?;
        assert_eq!(env["host"], "override");
        assert_eq!(env["port"], "8080");
        Ok(())
    }
}
