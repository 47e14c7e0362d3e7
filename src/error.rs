use thiserror::Error;

use crate::assert::AssertError;
use crate::env::EnvError;
use crate::http::HttpError;
use crate::query::QueryError;
use crate::script::ScriptError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Environment(#[from] EnvError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Assert(#[from] AssertError),

    #[error("Request failed to execute: {0}")]
    Http(#[from] HttpError),

    #[error("file doesn't exist: {0}")]
    NotFound(String),

    #[error("type of file unclear: {0}")]
    UnknownKind(String),

    #[error("invalid YAML file: {path} (cannot unmarshal: {message})")]
    Parse { path: String, message: String },

    #[error("could not read body: {0}")]
    Body(String),

    #[error("cyclic routine reference: {0}")]
    CyclicReference(String),

    #[error("Pre-Request Script Error: {0}")]
    PreRequestScript(ScriptError),

    #[error("Post-Request Script Error: {0}")]
    PostRequestScript(ScriptError),

    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
