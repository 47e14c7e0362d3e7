//! Routines: ordered steps pointing at other workflow files
//!
//! A step names a request, script or routine file relative to the routine's
//! directory and may expand into several iterations, one per matched
//! environment file.

pub mod engine;
pub mod result;

pub use engine::{run_path, run_routine};
pub use result::{RoutineResult, RoutineSummary, RunStats, StepOutcome, StepResult, Tally};

use serde::Deserialize;
use std::fmt;
use std::ops::Deref;
use std::path::Path;

use crate::context::Context;
use crate::env::add_environment_from_path;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Routine {
    pub name: String,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub run: String,
    #[serde(default)]
    pub iterations: Option<Iterations>,
}

/// One glob or a list of globs matching environment files.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Iterations {
    Single(String),
    Many(Vec<String>),
}

impl Iterations {
    pub fn patterns(&self) -> Vec<&str> {
        match self {
            Iterations::Single(pattern) => vec![pattern.as_str()],
            Iterations::Many(patterns) => patterns.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Request,
    Script,
    Routine,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            StepKind::Request => "request",
            StepKind::Script => "script",
            StepKind::Routine => "routine",
        };
        f.write_str(kind)
    }
}

impl Step {
    pub fn new(run: impl Into<String>) -> Self {
        Self {
            run: run.into(),
            iterations: None,
        }
    }

    /// Contexts this step runs in: one isolated clone per matched environment
    /// file, or `ctx` itself when nothing matches.
    pub fn expand_iterations<'a>(&self, ctx: &'a Context) -> Result<Vec<Iteration<'a>>> {
        let Some(iterations) = &self.iterations else {
            return Ok(vec![Iteration::Original(ctx)]);
        };

        let mut matches = Vec::new();
        for pattern in iterations.patterns() {
            let full = ctx.working_dir().join(pattern);
            let paths = glob::glob(&full.to_string_lossy()).map_err(|e| {
                Error::Config(format!("invalid iteration pattern '{pattern}': {e}"))
            })?;
            matches.extend(paths.filter_map(std::result::Result::ok));
        }

        if matches.is_empty() {
            return Ok(vec![Iteration::Original(ctx)]);
        }

        matches
            .into_iter()
            .map(|path| -> Result<Iteration<'a>> {
                let mut variables = ctx.env_snapshot();
                add_environment_from_path(
                    ctx.working_dir(),
                    &path.to_string_lossy(),
                    &mut variables,
                )?;

                let iteration = ctx.clone_into(ctx.working_dir());
                iteration.merge_env(variables);
                Ok(Iteration::Isolated(iteration))
            })
            .collect()
    }
}

/// Context for one iteration of a step.
pub enum Iteration<'a> {
    Original(&'a Context),
    Isolated(Context),
}

impl Deref for Iteration<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        match self {
            Iteration::Original(ctx) => ctx,
            Iteration::Isolated(ctx) => ctx,
        }
    }
}

impl Routine {
    /// Single-step routine wrapping `run`.
    pub fn synthetic(name: impl Into<String>, run: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: vec![Step::new(run)],
        }
    }

    pub fn parse(data: &str, path: &Path) -> Result<Self> {
        let mut routine: Routine = serde_yaml::from_str(data).map_err(|e| Error::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        if routine.name.is_empty() {
            routine.name = path.display().to_string();
        }

        Ok(routine)
    }

    pub fn load_from_path(path: &Path, ctx: &Context) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::parse(&ctx.substitute(&data), path)
    }
}

pub fn is_script_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("js") | Some("rhai")
    )
}

/// Work out what kind of file `path` is without fully parsing it.
pub fn sniff_kind(path: &Path, ctx: &Context) -> Result<StepKind> {
    if is_script_path(path) {
        return Ok(StepKind::Script);
    }

    let data = std::fs::read_to_string(path).map_err(|e| {
        Error::UnknownKind(format!("{} (cannot read file: {e})", path.display()))
    })?;

    let peek: serde_yaml::Value =
        serde_yaml::from_str(&ctx.substitute(&data)).map_err(|e| Error::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    let kind = peek
        .get("kind")
        .or_else(|| peek.get("type"))
        .and_then(serde_yaml::Value::as_str);

    match kind {
        Some("request") => Ok(StepKind::Request),
        Some("routine") => Ok(StepKind::Routine),
        _ => Err(Error::UnknownKind(path.display().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpClient;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn context(dir: &Path) -> Context {
        let env = HashMap::from([("kind".to_string(), "request".to_string())]);
        Context::new(dir, env, HttpClient::mock().0)
    }

    #[test]
    fn test_sniff_kinds() -> Result<()> {
        let dir = TempDir::new()?;
        let ctx = context(dir.path());

        std::fs::write(dir.path().join("a.yml"), "kind: request\npath: x")?;
        std::fs::write(dir.path().join("b.yml"), "type: routine\nsteps: []")?;
        std::fs::write(dir.path().join("c.yml"), "kind: ${kind}\n")?;
        std::fs::write(dir.path().join("d.js"), "this is not yaml: [")?;
        std::fs::write(dir.path().join("e.rhai"), "")?;

        assert_eq!(sniff_kind(&dir.path().join("a.yml"), &ctx)?, StepKind::Request);
        assert_eq!(sniff_kind(&dir.path().join("b.yml"), &ctx)?, StepKind::Routine);
        assert_eq!(sniff_kind(&dir.path().join("c.yml"), &ctx)?, StepKind::Request);
        assert_eq!(sniff_kind(&dir.path().join("d.js"), &ctx)?, StepKind::Script);
        assert_eq!(sniff_kind(&dir.path().join("e.rhai"), &ctx)?, StepKind::Script);
        Ok(())
    }

    #[test]
    fn test_sniff_failures() -> Result<()> {
        let dir = TempDir::new()?;
        let ctx = context(dir.path());

        std::fs::write(dir.path().join("nokind.yml"), "path: x")?;
        std::fs::write(dir.path().join("bad.yml"), "kind: [")?;
        std::fs::write(dir.path().join("other.yml"), "kind: banana")?;

        assert!(matches!(
            sniff_kind(&dir.path().join("nokind.yml"), &ctx),
            Err(Error::UnknownKind(_))
        ));
        assert!(matches!(
            sniff_kind(&dir.path().join("bad.yml"), &ctx),
            Err(Error::Parse { .. })
        ));
        assert!(matches!(
            sniff_kind(&dir.path().join("other.yml"), &ctx),
            Err(Error::UnknownKind(_))
        ));
        Ok(())
    }

    #[test]
    fn test_parse_routine_steps() {
        let yaml = r#"
kind: routine
steps:
  - run: login.yml
  - run: users.yml
    iterations: data/*.yml
  - run: both.yml
    iterations:
      - a.yml
      - b.yml
"#;
        let routine = Routine::parse(yaml, Path::new("flows/main.yml")).unwrap();

        assert_eq!(routine.name, "flows/main.yml");
        assert_eq!(routine.steps.len(), 3);
        assert!(routine.steps[0].iterations.is_none());
        assert_eq!(
            routine.steps[1].iterations.as_ref().unwrap().patterns(),
            vec!["data/*.yml"]
        );
        assert_eq!(
            routine.steps[2].iterations.as_ref().unwrap().patterns(),
            vec!["a.yml", "b.yml"]
        );
    }

    #[test]
    fn test_expand_iterations_clones_per_match() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::create_dir(dir.path().join("data"))?;
        std::fs::write(dir.path().join("data/one.yml"), "user: one")?;
        std::fs::write(dir.path().join("data/two.yml"), "user: two")?;

        let ctx = context(dir.path());
        ctx.env_set("user", "base");

        let mut step = Step::new("req.yml");
        step.iterations = Some(Iterations::Single("data/*.yml".to_string()));

        let iterations = step.expand_iterations(&ctx)?;
        let users: Vec<String> = iterations
            .iter()
            .map(|it| it.env_get("user").unwrap_or_default())
            .collect();

        assert_eq!(users, vec!["one", "two"]);
        assert!(iterations.iter().all(|it| matches!(it, Iteration::Isolated(_))));
        assert_eq!(ctx.env_get("user").as_deref(), Some("base"));
        Ok(())
    }

    #[test]
    fn test_expand_without_matches_uses_original() -> Result<()> {
        let dir = TempDir::new()?;
        let ctx = context(dir.path());

        let mut step = Step::new("req.yml");
        step.iterations = Some(Iterations::Many(vec!["none/*.yml".to_string()]));

        let iterations = step.expand_iterations(&ctx)?;
        assert_eq!(iterations.len(), 1);
        assert!(matches!(iterations[0], Iteration::Original(_)));

        let plain = Step::new("req.yml").expand_iterations(&ctx)?;
        assert!(matches!(plain[0], Iteration::Original(_)));
        Ok(())
    }
}
