//! Embedded scripting for workflow steps and request hooks
//!
//! Scripts are written in Rhai and see two globals:
//!
//! - `nap.env.get(name)` / `nap.env.set(name, value)` read and write the
//!   environment of the owning context
//! - `nap.run(path)` executes another workflow file and returns its summary
//! - `nap.fail(...)` marks the current script as failed
//! - `nap.http` holds the last request/response snapshot in post-request scripts
//! - `console.log(...)` and `print(...)` append to the script's output buffer
//!
//! `nap.fail` and `console.log` take up to four arguments joined by spaces;
//! longer messages are passed as one array, e.g. `console.log([a, b, c, d, e])`.
//!
//! Each [`Context`] owns its own [`ScriptSession`]; top-level variables persist
//! between scripts run in the same session.

mod api;

use chrono::{DateTime, Utc};
use rhai::{Engine, EvalAltResult, Scope};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::context::Context;
use crate::query::HttpExchange;
use api::{Console, NapApi, ScriptState};

#[derive(Debug, Clone, Error)]
pub enum ScriptError {
    #[error("{0}")]
    Eval(String),

    #[error("{0}")]
    Failed(String),

    #[error("could not read script {path}: {message}")]
    Read { path: String, message: String },
}

#[derive(Debug, Clone)]
pub struct ScriptResult {
    pub output: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub error: Option<ScriptError>,
}

impl ScriptResult {
    pub fn from_error(error: ScriptError) -> Self {
        let now = Utc::now();
        Self {
            output: Vec::new(),
            started_at: now,
            finished_at: now,
            error: Some(error),
        }
    }

    pub fn is_passing(&self) -> bool {
        self.error.is_none()
    }

    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

pub struct ScriptSession {
    engine: Engine,
    scope: Mutex<Scope<'static>>,
    state: Arc<ScriptState>,
}

impl ScriptSession {
    pub fn new(ctx: Context) -> Self {
        let state = Arc::new(ScriptState::new());

        let mut engine = Engine::new();
        api::register(&mut engine);

        let printer = Arc::clone(&state);
        engine.on_print(move |text| printer.push_output(text.to_string()));
        let debugger = Arc::clone(&state);
        engine.on_debug(move |text, _, _| debugger.push_output(text.to_string()));

        let mut scope = Scope::new();
        scope.push(
            "nap",
            NapApi {
                ctx: Arc::new(ctx),
                state: Arc::clone(&state),
            },
        );
        scope.push(
            "console",
            Console {
                state: Arc::clone(&state),
            },
        );

        Self {
            engine,
            scope: Mutex::new(scope),
            state,
        }
    }

    /// Evaluate `source` and collect its output and outcome.
    pub fn run_source(&self, source: &str) -> ScriptResult {
        self.state.take_output();
        self.state.take_failure();

        let started_at = Utc::now();
        let outcome = self.eval(source);
        let finished_at = Utc::now();

        let output = self.state.take_output();
        let failure = self.state.take_failure();

        let error = match outcome {
            Err(e) => Some(ScriptError::Eval(e.to_string())),
            Ok(()) => failure.map(ScriptError::Failed),
        };

        ScriptResult {
            output,
            started_at,
            finished_at,
            error,
        }
    }

    pub fn run_file(&self, path: &Path) -> ScriptResult {
        match std::fs::read_to_string(path) {
            Ok(source) => self.run_source(&source),
            Err(e) => ScriptResult::from_error(ScriptError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// Expose `exchange` to later scripts as `nap.http`.
    pub fn set_http(&self, exchange: &HttpExchange) -> Result<(), ScriptError> {
        let value =
            rhai::serde::to_dynamic(exchange).map_err(|e| ScriptError::Eval(e.to_string()))?;
        self.state.set_http(value);
        Ok(())
    }

    fn eval(&self, source: &str) -> Result<(), Box<EvalAltResult>> {
        let mut scope = self.scope.lock().unwrap_or_else(PoisonError::into_inner);
        let mut run = || self.engine.run_with_scope(&mut scope, source);

        // nap.run blocks on the runtime, which needs a worker it can hand off.
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(run)
            }
            _ => run(),
        }
    }
}

impl std::fmt::Debug for ScriptSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptSession").finish_non_exhaustive()
    }
}
