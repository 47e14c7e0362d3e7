//! Resolving a request's body into what goes on the wire
//!
//! Precedence: a `graphql` block, then a multipart form when the request's
//! `Content-Type` asks for one, then `@file` references, then plain text.
//! `@file` paths are relative to the directory holding the request file.

use serde_yaml::Value;
use std::path::Path;

use super::Request;
use crate::env::scalar_to_string;
use crate::error::{Error, Result};
use crate::http::{FormPart, HttpBody};

const CONTENT_TYPE: &str = "Content-Type";

/// Build the body for `request`, adjusting its verb and headers where the body kind demands it.
pub fn resolve_body(request: &mut Request, base_dir: &Path) -> Result<HttpBody> {
    if let Some(mut graphql) = request.graphql.clone() {
        if let Some(file) = graphql.query.strip_prefix('@') {
            graphql.query = std::fs::read_to_string(base_dir.join(file))?;
        }

        let payload = serde_json::to_string(&graphql)?;
        request.verb = "POST".to_string();
        request.set_header(CONTENT_TYPE, "application/json");
        return Ok(HttpBody::Text(payload));
    }

    let Some(body) = request.body.clone() else {
        return Ok(HttpBody::Empty);
    };

    let is_multipart = request
        .header(CONTENT_TYPE)
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if is_multipart {
        let Value::Mapping(fields) = body else {
            return Err(Error::Body("Could not read form body.".to_string()));
        };
        let parts = form_parts(&fields, base_dir)?;
        // the transport writes its own boundary-bearing content type
        request.remove_header(CONTENT_TYPE);
        return Ok(HttpBody::Multipart(parts));
    }

    match body {
        Value::Null => Ok(HttpBody::Empty),
        Value::String(text) if text.is_empty() => Ok(HttpBody::Empty),
        Value::String(text) => match text.strip_prefix('@') {
            Some(file) => Ok(HttpBody::Bytes(std::fs::read(base_dir.join(file))?)),
            None => Ok(HttpBody::Text(text)),
        },
        _ => Err(Error::Body("Could not read body as string".to_string())),
    }
}

fn form_parts(fields: &serde_yaml::Mapping, base_dir: &Path) -> Result<Vec<FormPart>> {
    fields
        .iter()
        .map(|(key, value)| {
            let name = scalar_to_string(key)
                .ok_or_else(|| Error::Body("form field names must be scalars".to_string()))?;
            let value = scalar_to_string(value)
                .ok_or_else(|| Error::Body(format!("form field '{name}' must be a scalar")))?;

            match value.strip_prefix('@') {
                Some(file) => {
                    let path = base_dir.join(file);
                    let file_name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| file.to_string());
                    Ok(FormPart::File {
                        name,
                        file_name,
                        contents: std::fs::read(&path)?,
                    })
                }
                None => Ok(FormPart::Text { name, value }),
            }
        })
        .collect()
}
