//! Run-time state threaded through one execution branch
//!
//! A [`Context`] owns a working directory, the environment variables used for
//! template substitution, the cookies collected from earlier responses and a
//! lazily created script session. Subroutines and iterations get an isolated
//! copy through [`Context::clone_into`]; the progress view and HTTP client are
//! shared by the whole tree.

pub mod progress;

pub use progress::{RoutineProgress, RunProgress};

use once_cell::sync::OnceCell;
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::env::substitute;
use crate::http::{HttpClient, ResponseCookie};
use crate::script::ScriptSession;

pub struct Context {
    working_dir: PathBuf,
    env: Arc<RwLock<HashMap<String, String>>>,
    cookies: Arc<Mutex<Vec<ResponseCookie>>>,
    progress: Option<RunProgress>,
    http: HttpClient,
    lineage: Arc<Vec<PathBuf>>,
    session: OnceCell<ScriptSession>,
}

impl Context {
    pub fn new(working_dir: impl Into<PathBuf>, env: HashMap<String, String>, http: HttpClient) -> Self {
        Self {
            working_dir: working_dir.into(),
            env: Arc::new(RwLock::new(env)),
            cookies: Arc::new(Mutex::new(Vec::new())),
            progress: None,
            http,
            lineage: Arc::new(Vec::new()),
            session: OnceCell::new(),
        }
    }

    pub fn with_progress(mut self, progress: RunProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Isolated copy rooted at `working_dir`.
    ///
    /// Environment and cookies are copied by value, the script session starts
    /// fresh, and progress and transport stay shared.
    pub fn clone_into(&self, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            env: Arc::new(RwLock::new(self.env_snapshot())),
            cookies: Arc::new(Mutex::new(self.cookies())),
            progress: self.progress.clone(),
            http: self.http.clone(),
            lineage: Arc::clone(&self.lineage),
            session: OnceCell::new(),
        }
    }

    /// Handle onto the same environment and cookies with its own script session.
    pub fn share(&self) -> Self {
        Self {
            working_dir: self.working_dir.clone(),
            env: Arc::clone(&self.env),
            cookies: Arc::clone(&self.cookies),
            progress: self.progress.clone(),
            http: self.http.clone(),
            lineage: Arc::clone(&self.lineage),
            session: OnceCell::new(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn progress(&self) -> Option<&RunProgress> {
        self.progress.as_ref()
    }

    pub fn env_get(&self, name: &str) -> Option<String> {
        self.env
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn env_set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.env
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), value.into());
    }

    /// Merge `variables` over the current environment.
    pub fn merge_env(&self, variables: HashMap<String, String>) {
        self.env
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(variables);
    }

    pub fn env_snapshot(&self) -> HashMap<String, String> {
        self.env
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply `${name}` substitution using the current environment.
    pub fn substitute(&self, text: &str) -> String {
        let env = self.env.read().unwrap_or_else(PoisonError::into_inner);
        match substitute(text, &env) {
            Cow::Borrowed(unchanged) => unchanged.to_string(),
            Cow::Owned(replaced) => replaced,
        }
    }

    pub fn cookies(&self) -> Vec<ResponseCookie> {
        self.cookies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn add_cookies(&self, cookies: impl IntoIterator<Item = ResponseCookie>) {
        self.cookies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(cookies);
    }

    /// Whether the routine file at `path` is already being executed on this branch.
    pub fn is_on_lineage(&self, path: &Path) -> bool {
        self.lineage.iter().any(|entry| entry == path)
    }

    pub fn push_lineage(&mut self, path: PathBuf) {
        let mut lineage = self.lineage.as_ref().clone();
        lineage.push(path);
        self.lineage = Arc::new(lineage);
    }

    /// Script session for this context, created on first use.
    pub fn script_session(&self) -> &ScriptSession {
        self.session.get_or_init(|| ScriptSession::new(self.share()))
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("working_dir", &self.working_dir)
            .field("lineage", &self.lineage)
            .finish_non_exhaustive()
    }
}
