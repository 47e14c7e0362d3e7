//! Values exposed to scripts as `nap` and `console`

use rhai::{Array, Dynamic, Engine, EvalAltResult};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::debug;

use crate::context::Context;
use crate::routine;

/// Per-session buffers written by the script API.
pub(crate) struct ScriptState {
    output: Mutex<Vec<String>>,
    failure: Mutex<Option<String>>,
    http: Mutex<Dynamic>,
}

impl ScriptState {
    pub(crate) fn new() -> Self {
        Self {
            output: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            http: Mutex::new(Dynamic::UNIT),
        }
    }

    pub(crate) fn push_output(&self, line: String) {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }

    pub(crate) fn take_output(&self) -> Vec<String> {
        std::mem::take(&mut *self.output.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub(crate) fn set_failure(&self, message: String) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(message);
    }

    pub(crate) fn take_failure(&self) -> Option<String> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub(crate) fn http(&self) -> Dynamic {
        self.http
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_http(&self, value: Dynamic) {
        *self.http.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }
}

#[derive(Clone)]
pub(crate) struct NapApi {
    pub(crate) ctx: Arc<Context>,
    pub(crate) state: Arc<ScriptState>,
}

#[derive(Clone)]
pub(crate) struct EnvApi {
    ctx: Arc<Context>,
}

#[derive(Clone)]
pub(crate) struct Console {
    pub(crate) state: Arc<ScriptState>,
}

fn join(args: &[Dynamic]) -> String {
    args.iter()
        .map(|arg| arg.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

impl NapApi {
    fn fail(&mut self, args: &[Dynamic]) {
        self.state.set_failure(join(args));
    }

    fn run(&mut self, path: &str) -> Result<Dynamic, Box<EvalAltResult>> {
        let handle = Handle::try_current().map_err(|e| e.to_string())?;
        if handle.runtime_flavor() != RuntimeFlavor::MultiThread {
            return Err("nap.run requires a multi-threaded runtime".into());
        }

        debug!("Script requested run of {}", path);
        let result = handle.block_on(routine::run_path(self.ctx.share(), path.to_string()));
        rhai::serde::to_dynamic(result.summary())
    }
}

impl Console {
    fn log(&mut self, args: &[Dynamic]) {
        self.state.push_output(join(args));
    }
}

pub(crate) fn register(engine: &mut Engine) {
    engine
        .register_type_with_name::<NapApi>("Nap")
        .register_get("env", |api: &mut NapApi| EnvApi {
            ctx: Arc::clone(&api.ctx),
        })
        .register_set("env", |_: &mut NapApi, _: EnvApi| {})
        .register_get("http", |api: &mut NapApi| api.state.http())
        .register_set("http", |api: &mut NapApi, value: Dynamic| {
            api.state.set_http(value)
        })
        .register_fn("run", NapApi::run)
        .register_fn("fail", |api: &mut NapApi| api.fail(&[]))
        .register_fn("fail", |api: &mut NapApi, a: Dynamic| api.fail(&[a]))
        .register_fn("fail", |api: &mut NapApi, a: Dynamic, b: Dynamic| {
            api.fail(&[a, b])
        })
        .register_fn(
            "fail",
            |api: &mut NapApi, a: Dynamic, b: Dynamic, c: Dynamic| api.fail(&[a, b, c]),
        )
        .register_fn(
            "fail",
            |api: &mut NapApi, a: Dynamic, b: Dynamic, c: Dynamic, d: Dynamic| {
                api.fail(&[a, b, c, d])
            },
        )
        .register_fn("fail", |api: &mut NapApi, args: Array| api.fail(&args));

    engine
        .register_type_with_name::<EnvApi>("NapEnv")
        .register_fn("get", |env: &mut EnvApi, name: &str| {
            env.ctx.env_get(name).unwrap_or_default()
        })
        .register_fn("set", |env: &mut EnvApi, name: &str, value: Dynamic| {
            env.ctx.env_set(name, value.to_string())
        });

    engine
        .register_type_with_name::<Console>("Console")
        .register_fn("log", |c: &mut Console| c.log(&[]))
        .register_fn("log", |c: &mut Console, a: Dynamic| c.log(&[a]))
        .register_fn("log", |c: &mut Console, a: Dynamic, b: Dynamic| c.log(&[a, b]))
        .register_fn(
            "log",
            |c: &mut Console, a: Dynamic, b: Dynamic, d: Dynamic| c.log(&[a, b, d]),
        )
        .register_fn(
            "log",
            |c: &mut Console, a: Dynamic, b: Dynamic, d: Dynamic, e: Dynamic| {
                c.log(&[a, b, d, e])
            },
        )
        .register_fn("log", |c: &mut Console, args: Array| c.log(&args));
}
