//! Query evaluation against an HTTP exchange
//!
//! A query selects a sequence of values out of an [`HttpExchange`]:
//!
//! - `jsonpath <expr>` with an optional trailing `.length()` aggregate
//! - `header <name>`
//! - `cookie <name>` or `cookie <name>[<attribute>]`
//! - `status`, `duration`, `body`
//!
//! Results are always sequences so that assertions and captures can treat
//! "absent", "single" and "many" uniformly.

pub mod exchange;

pub use exchange::{ExchangeRequest, ExchangeResponse, HttpExchange};

use serde_json::Value;
use serde_json_path::JsonPath;
use thiserror::Error;

use crate::http::ResponseCookie;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Query \"{0}\" not recognized.")]
    Unrecognized(String),

    #[error("invalid jsonpath expression \"{expression}\": {message}")]
    JsonPath { expression: String, message: String },

    #[error("response body is not valid JSON")]
    InvalidJsonBody,

    #[error("unknown cookie attribute \"{0}\"")]
    UnknownCookieAttribute(String),
}

const LENGTH_AGGREGATE: &str = ".length()";

/// Evaluate `query` against the exchange; a missing exchange or response yields no values.
pub fn evaluate(query: &str, exchange: Option<&HttpExchange>) -> Result<Vec<Value>, QueryError> {
    let Some(response) = exchange.and_then(|e| e.response.as_ref()) else {
        return Ok(Vec::new());
    };

    if let Some(expression) = query.strip_prefix("jsonpath ") {
        return eval_json_path(expression.trim(), response);
    }

    if let Some(name) = query.strip_prefix("header ") {
        return Ok(response
            .header(name.trim())
            .map(|values| values.iter().cloned().map(Value::String).collect())
            .unwrap_or_default());
    }

    if let Some(cookie) = query.strip_prefix("cookie ") {
        return eval_cookie(cookie, response);
    }

    match query {
        "status" => Ok(vec![Value::String(response.status_code.to_string())]),
        "duration" => Ok(vec![Value::String(response.elapsed_ms.to_string())]),
        "body" => Ok(vec![Value::String(response.body.clone())]),
        _ => Err(QueryError::Unrecognized(query.to_string())),
    }
}

fn eval_json_path(expression: &str, response: &ExchangeResponse) -> Result<Vec<Value>, QueryError> {
    let body = match &response.json_body {
        Some(body) => body,
        None if response.body.trim().is_empty() => return Ok(Vec::new()),
        None => return Err(QueryError::InvalidJsonBody),
    };

    match expression.strip_suffix(LENGTH_AGGREGATE) {
        Some(base) => {
            let nodes = select(base, body)?;
            let length = match nodes.as_slice() {
                [] => return Ok(Vec::new()),
                [Value::Array(items)] => items.len(),
                [Value::Object(members)] => members.len(),
                many => many.len(),
            };
            Ok(vec![Value::from(length)])
        }
        None => select(expression, body),
    }
}

fn select(expression: &str, body: &Value) -> Result<Vec<Value>, QueryError> {
    let path = JsonPath::parse(expression).map_err(|e| QueryError::JsonPath {
        expression: expression.to_string(),
        message: e.to_string(),
    })?;

    Ok(path.query(body).all().into_iter().cloned().collect())
}

fn eval_cookie(selector: &str, response: &ExchangeResponse) -> Result<Vec<Value>, QueryError> {
    let (name, attribute) = match selector.split_once('[') {
        Some((name, rest)) => (name.trim(), Some(rest.trim().trim_end_matches(']').trim())),
        None => (selector.trim(), None),
    };

    let Some(cookie) = response.cookies.get(name) else {
        return Ok(Vec::new());
    };

    match attribute {
        None => Ok(vec![Value::String(cookie.value.clone())]),
        Some(attribute) => cookie_attribute(cookie, attribute).map(|value| vec![value]),
    }
}

fn cookie_attribute(cookie: &ResponseCookie, attribute: &str) -> Result<Value, QueryError> {
    let value = match attribute {
        "Value" => Value::String(cookie.value.clone()),
        "Expires" => Value::String(cookie.raw_expires.clone()),
        "Max-Age" => Value::from(cookie.max_age),
        "Domain" => Value::String(cookie.domain.clone()),
        "Path" => Value::String(cookie.path.clone()),
        "Secure" => Value::Bool(cookie.secure),
        "HttpOnly" => Value::Bool(cookie.http_only),
        "SameSite" => Value::String(cookie.same_site.clone()),
        other => return Err(QueryError::UnknownCookieAttribute(other.to_string())),
    };
    Ok(value)
}

/// String form of a query value as used by assertions and captures.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        v => serde_json::to_string(v).unwrap_or_default(),
    }
}
