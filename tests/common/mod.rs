//! Common test utilities and helpers

#![allow(dead_code)]

use anyhow::Result;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use nap::context::Context;
use nap::http::{HttpClient, MockHttpRunner};

/// Builder for a temporary workflow tree
pub struct WorkspaceBuilder {
    temp_dir: TempDir,
    files: Vec<(PathBuf, String)>,
    variables: HashMap<String, String>,
}

impl WorkspaceBuilder {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
            files: Vec::new(),
            variables: HashMap::new(),
        })
    }

    /// Add a workflow, environment or script file
    pub fn with_file(mut self, path: impl AsRef<Path>, content: &str) -> Self {
        self.files
            .push((path.as_ref().to_path_buf(), content.to_string()));
        self
    }

    pub fn with_variable(mut self, name: &str, value: &str) -> Self {
        self.variables.insert(name.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> Result<Workspace> {
        for (file_path, content) in &self.files {
            let full_path = self.temp_dir.path().join(file_path);
            if let Some(parent) = full_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(full_path, content)?;
        }

        let (http, mock) = HttpClient::mock();
        Ok(Workspace {
            temp_dir: self.temp_dir,
            variables: self.variables,
            http,
            mock,
        })
    }
}

/// A temporary workflow tree wired to a mock HTTP runner
pub struct Workspace {
    temp_dir: TempDir,
    variables: HashMap<String, String>,
    http: HttpClient,
    pub mock: MockHttpRunner,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Fresh root context for a run inside the workspace
    pub fn context(&self) -> Context {
        Context::new(self.path(), self.variables.clone(), self.http.clone())
    }
}

/// A request file body for `url` with optional extra YAML lines
pub fn request_yaml(name: &str, url: &str, extra: &str) -> String {
    format!("kind: request\nname: {name}\npath: {url}\nverb: GET\n{extra}")
}

/// A routine file running `steps` in order
pub fn routine_yaml(name: &str, steps: &[&str]) -> String {
    let steps: String = steps
        .iter()
        .map(|step| format!("  - run: {step}\n"))
        .collect();
    format!("kind: routine\nname: {name}\nsteps:\n{steps}")
}
