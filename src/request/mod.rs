//! Request definitions and their execution
//!
//! A request file is re-read and re-substituted every time it runs so that
//! values captured by earlier steps flow into later ones.

pub mod body;
pub mod executor;

pub use executor::run_request;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::query::HttpExchange;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Request {
    pub name: String,
    pub path: String,
    pub verb: String,
    pub headers: IndexMap<String, String>,
    pub cookies: IndexMap<String, String>,
    pub timeout_seconds: u64,
    pub body: Option<serde_yaml::Value>,
    pub graphql: Option<GraphQl>,
    pub pre_request_script: String,
    pub post_request_script: String,
    pub pre_request_script_file: String,
    pub post_request_script_file: String,
    pub captures: IndexMap<String, String>,
    pub asserts: Vec<String>,
    pub verbose: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphQl {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<serde_json::Value>,
}

impl Request {
    pub fn parse(data: &str, path: &Path) -> Result<Self> {
        let mut request: Request = serde_yaml::from_str(data).map_err(|e| Error::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        if request.verb.is_empty() {
            request.verb = "GET".to_string();
        }
        if request.name.is_empty() {
            request.name = path.display().to_string();
        }

        Ok(request)
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Replace any header named `name` (case-insensitively) with `value`.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.remove_header(name);
        self.headers.insert(name.to_string(), value.to_string());
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
    }
}

/// Read the request at `path`, substitute the context's environment and parse it.
pub fn load_from_path(path: &Path, ctx: &Context) -> Result<Request> {
    let data = std::fs::read_to_string(path)?;
    Request::parse(&ctx.substitute(&data), path)
}

#[derive(Debug)]
pub struct RequestResult {
    pub name: String,
    /// Status line of the response, when one arrived
    pub status: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub error: Option<Error>,
    pub exchange: Option<HttpExchange>,
}

impl RequestResult {
    pub fn new(name: &str) -> Self {
        let now = Utc::now();
        Self {
            name: name.to_string(),
            status: None,
            started_at: now,
            finished_at: now,
            error: None,
            exchange: None,
        }
    }

    pub fn is_passing(&self) -> bool {
        self.error.is_none()
    }

    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpClient;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_parse_request_fields() {
        let yaml = r#"
kind: request
name: create user
path: http://localhost/users
verb: POST
headers:
  Content-Type: application/json
cookies:
  session: abc
timeoutSeconds: 5
body: '{"name": "bob"}'
preRequestScript: nap.env.set("x", "1");
captures:
  userId: jsonpath $.id
asserts:
  - status == 201
verbose: true
"#;
        let request = Request::parse(yaml, Path::new("users/create.yml")).unwrap();

        assert_eq!(request.name, "create user");
        assert_eq!(request.verb, "POST");
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.cookies["session"], "abc");
        assert_eq!(request.timeout_seconds, 5);
        assert_eq!(request.captures["userId"], "jsonpath $.id");
        assert_eq!(request.asserts, vec!["status == 201"]);
        assert!(request.verbose);
    }

    #[test]
    fn test_parse_defaults() {
        let request = Request::parse("path: http://localhost", Path::new("ping.yml")).unwrap();
        assert_eq!(request.verb, "GET");
        assert_eq!(request.name, "ping.yml");
        assert!(request.body.is_none());
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = Request::parse("asserts: {", Path::new("broken.yml")).unwrap_err();
        assert!(err.to_string().contains("broken.yml"));
    }

    #[test]
    fn test_load_substitutes_environment() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("get.yml");
        std::fs::write(&path, "path: ${base}/users/${id}\nverb: GET\n")?;

        let env = HashMap::from([
            ("base".to_string(), "http://api".to_string()),
            ("id".to_string(), "7".to_string()),
        ]);
        let ctx = Context::new(dir.path(), env, HttpClient::mock().0);

        let request = load_from_path(&path, &ctx)?;
        assert_eq!(request.path, "http://api/users/7");
        Ok(())
    }

    #[test]
    fn test_header_helpers() {
        let mut request = Request::default();
        request.set_header("content-type", "text/plain");
        request.set_header("Content-Type", "application/json");

        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("CONTENT-TYPE"), Some("application/json"));

        request.remove_header("content-TYPE");
        assert!(request.headers.is_empty());
    }
}
