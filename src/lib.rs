//! # Nap
//!
//! Declarative API test automation. Workflow files describe HTTP requests,
//! scripts and routines (ordered steps referring to other files); nap runs them,
//! threads captured values between steps and asserts on the responses.
//!
//! ## Usage
//!
//! ```bash
//! nap run routines/smoke.yml -e dev -p token=abc
//! ```
//!
//! ## Modules
//!
//! - `config` - Run configuration and `key=value` parameter parsing
//! - `env` - Environment set resolution and `${name}` template substitution
//! - `query` - Query micro-language over an HTTP exchange
//! - `assert` - Assertion parsing and evaluation
//! - `capture` - Writing query results into the environment
//! - `script` - Embedded Rhai scripting with the `nap` API
//! - `http` - HTTP transport abstraction with reqwest and mock runners
//! - `request` - Request files, body resolution and execution
//! - `routine` - Routine files, iterations, result trees and the execution engine
//! - `context` - Per-branch run state and shared progress
//! - `report` - Text rendering of results
pub mod assert;
pub mod capture;
pub mod config;
pub mod context;
pub mod env;
pub mod error;
pub mod http;
pub mod query;
pub mod report;
pub mod request;
pub mod routine;
pub mod script;

pub use context::Context;
pub use error::{Error, Result};
pub use routine::{run_path, RoutineResult};
