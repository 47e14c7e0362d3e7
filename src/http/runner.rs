use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::debug;

use super::error::HttpError;

#[derive(Debug, Clone)]
pub struct HttpCall {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: HttpBody,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
pub enum HttpBody {
    #[default]
    Empty,
    Text(String),
    Bytes(Vec<u8>),
    Multipart(Vec<FormPart>),
}

impl HttpBody {
    /// Textual view of the body for logs and script snapshots.
    pub fn preview(&self) -> String {
        match self {
            HttpBody::Empty => String::new(),
            HttpBody::Text(text) => text.clone(),
            HttpBody::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            HttpBody::Multipart(parts) => parts
                .iter()
                .map(|part| match part {
                    FormPart::Text { name, value } => format!("{name}={value}"),
                    FormPart::File {
                        name, file_name, ..
                    } => format!("{name}=@{file_name}"),
                })
                .collect::<Vec<_>>()
                .join("&"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        contents: Vec<u8>,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseCookie {
    pub name: String,
    pub value: String,
    pub raw_expires: String,
    pub max_age: i64,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: String,
}

impl ResponseCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpOutput {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub cookies: Vec<ResponseCookie>,
    pub duration: Duration,
}

#[async_trait]
pub trait HttpRunner: Send + Sync {
    async fn send(&self, call: HttpCall) -> Result<HttpOutput, HttpError>;
}

pub struct ReqwestHttpRunner {
    client: reqwest::Client,
}

impl ReqwestHttpRunner {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn build_form(parts: Vec<FormPart>) -> reqwest::multipart::Form {
        parts
            .into_iter()
            .fold(reqwest::multipart::Form::new(), |form, part| match part {
                FormPart::Text { name, value } => form.text(name, value),
                FormPart::File {
                    name,
                    file_name,
                    contents,
                } => form.part(
                    name,
                    reqwest::multipart::Part::bytes(contents).file_name(file_name),
                ),
            })
    }

    fn convert_cookie(cookie: reqwest::cookie::Cookie<'_>) -> ResponseCookie {
        let same_site = if cookie.same_site_strict() {
            "Strict"
        } else if cookie.same_site_lax() {
            "Lax"
        } else {
            ""
        };

        ResponseCookie {
            name: cookie.name().to_string(),
            value: cookie.value().to_string(),
            raw_expires: cookie
                .expires()
                .map(|at| {
                    DateTime::<Utc>::from(at)
                        .format("%a, %d %b %Y %H:%M:%S GMT")
                        .to_string()
                })
                .unwrap_or_default(),
            max_age: cookie.max_age().map(|age| age.as_secs() as i64).unwrap_or(0),
            domain: cookie.domain().unwrap_or_default().to_string(),
            path: cookie.path().unwrap_or_default().to_string(),
            secure: cookie.secure(),
            http_only: cookie.http_only(),
            same_site: same_site.to_string(),
        }
    }
}

impl Default for ReqwestHttpRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpRunner for ReqwestHttpRunner {
    async fn send(&self, call: HttpCall) -> Result<HttpOutput, HttpError> {
        let method = reqwest::Method::from_bytes(call.method.to_uppercase().as_bytes())
            .map_err(|_| HttpError::InvalidMethod(call.method.clone()))?;

        let mut request = self.client.request(method, &call.url);

        for (name, value) in &call.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        request = match call.body {
            HttpBody::Empty => request,
            HttpBody::Text(text) => request.body(text),
            HttpBody::Bytes(bytes) => request.body(bytes),
            HttpBody::Multipart(parts) => request.multipart(Self::build_form(parts)),
        };

        if let Some(timeout) = call.timeout {
            request = request.timeout(timeout);
        }

        debug!("Sending {} {}", call.method, call.url);
        let started = Instant::now();

        let response = request.send().await.map_err(|e| match call.timeout {
            Some(timeout) if e.is_timeout() => HttpError::Timeout(timeout),
            _ => HttpError::from(e),
        })?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let cookies = response.cookies().map(Self::convert_cookie).collect();

        let body = response.text().await.map_err(|e| match call.timeout {
            Some(timeout) if e.is_timeout() => HttpError::Timeout(timeout),
            _ => HttpError::from(e),
        })?;

        Ok(HttpOutput {
            status: status.as_u16(),
            status_text: match status.canonical_reason() {
                Some(reason) => format!("{} {}", status.as_u16(), reason),
                None => status.as_u16().to_string(),
            },
            headers,
            body,
            cookies,
            duration: started.elapsed(),
        })
    }
}
