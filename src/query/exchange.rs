//! Snapshot of one HTTP request/response pair
//!
//! Queries, captures and post-request scripts all read from this snapshot
//! instead of the live transport response.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::http::{HttpOutput, ResponseCookie};

#[derive(Debug, Clone, Default, Serialize)]
pub struct HttpExchange {
    pub request: ExchangeRequest,
    pub response: Option<ExchangeResponse>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExchangeRequest {
    pub url: String,
    pub verb: String,
    pub body: String,
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeResponse {
    pub status_code: u16,
    pub status: String,
    pub body: String,
    pub json_body: Option<Value>,
    /// Header values keyed by lower-cased header name
    pub headers: HashMap<String, Vec<String>>,
    #[serde(skip)]
    pub cookies: HashMap<String, ResponseCookie>,
    pub elapsed_ms: u64,
}

impl ExchangeResponse {
    pub fn from_output(output: &HttpOutput) -> Self {
        let mut headers: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in &output.headers {
            headers
                .entry(name.to_lowercase())
                .or_default()
                .push(value.clone());
        }

        let cookies = output
            .cookies
            .iter()
            .map(|cookie| (cookie.name.clone(), cookie.clone()))
            .collect();

        Self {
            status_code: output.status,
            status: output.status_text.clone(),
            json_body: parse_json_body(&output.body),
            body: output.body.clone(),
            headers,
            cookies,
            elapsed_ms: output.duration.as_millis() as u64,
        }
    }

    pub fn header(&self, name: &str) -> Option<&Vec<String>> {
        self.headers.get(&name.to_lowercase())
    }
}

fn parse_json_body(body: &str) -> Option<Value> {
    if body.trim().is_empty() {
        return None;
    }
    serde_json::from_str(body).ok()
}

impl HttpExchange {
    pub fn new(request: ExchangeRequest, response: Option<ExchangeResponse>) -> Self {
        Self { request, response }
    }

    /// Snapshot with a response whose body is `body`; handy for evaluating queries directly.
    pub fn with_response_body(body: &str) -> Self {
        Self {
            request: ExchangeRequest::default(),
            response: Some(ExchangeResponse {
                status_code: 200,
                status: "200 OK".to_string(),
                json_body: parse_json_body(body),
                body: body.to_string(),
                ..Default::default()
            }),
        }
    }
}
