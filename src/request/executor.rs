use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use super::body::resolve_body;
use super::{Request, RequestResult};
use crate::assert::{self, Assertion};
use crate::capture::capture;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::http::{HttpBody, HttpCall, HttpOutput};
use crate::query::{self, ExchangeRequest, ExchangeResponse, HttpExchange};
use crate::script::ScriptResult;

/// Execute `request`, loaded from `request_path`, against `ctx`.
///
/// Order: pre-request scripts, body resolution, the HTTP call, post-request
/// scripts, captures, then assertions. The first failure stops the sequence
/// and is recorded on the result.
pub async fn run_request(ctx: &Context, request_path: &Path, request: Request) -> RequestResult {
    let mut result = RequestResult::new(&request.name);
    let base_dir = request_path.parent().unwrap_or_else(|| Path::new("."));

    if let Err(e) = execute(ctx, base_dir, request, &mut result).await {
        debug!("Request {} failed: {}", result.name, e);
        result.error = Some(e);
    }

    result
}

async fn execute(
    ctx: &Context,
    base_dir: &Path,
    mut request: Request,
    result: &mut RequestResult,
) -> Result<()> {
    run_hooks(
        ctx,
        base_dir,
        &request.pre_request_script,
        &request.pre_request_script_file,
    )
    .map_err(Error::PreRequestScript)?;

    let body = resolve_body(&mut request, base_dir)?;
    let call = build_call(ctx, &request, body);

    if request.verbose {
        info!(
            "REQUEST:\n{} {}\n{}\n\n{}",
            call.method,
            call.url,
            format_headers(&call.headers),
            call.body.preview()
        );
    }

    let exchange_request = ExchangeRequest {
        url: call.url.clone(),
        verb: call.method.clone(),
        body: call.body.preview(),
        headers: call.headers.iter().cloned().collect::<HashMap<_, _>>(),
    };

    result.started_at = Utc::now();
    let output = ctx.http().send(call).await;
    result.finished_at = Utc::now();
    let output = output?;

    if request.verbose {
        log_response(&output);
    }

    result.status = Some(output.status_text.clone());
    ctx.add_cookies(output.cookies.iter().cloned());

    let exchange = HttpExchange::new(exchange_request, Some(ExchangeResponse::from_output(&output)));
    result.exchange = Some(exchange.clone());

    ctx.script_session()
        .set_http(&exchange)
        .map_err(Error::PostRequestScript)?;
    run_hooks(
        ctx,
        base_dir,
        &request.post_request_script,
        &request.post_request_script_file,
    )
    .map_err(Error::PostRequestScript)?;

    for (variable, capture_query) in &request.captures {
        capture(variable, capture_query, ctx, Some(&exchange))?;
    }

    for raw in &request.asserts {
        let assertion = Assertion::parse(raw)?;
        check(&assertion, &exchange)?;
    }

    Ok(())
}

fn check(assertion: &Assertion, exchange: &HttpExchange) -> Result<()> {
    let actual = query::evaluate(&assertion.query, Some(exchange))?;
    assert::evaluate(assertion, &actual)?;
    Ok(())
}

/// Run an inline script and then a script file, stopping at the first failure.
fn run_hooks(
    ctx: &Context,
    base_dir: &Path,
    inline: &str,
    file: &str,
) -> std::result::Result<(), crate::script::ScriptError> {
    if !inline.is_empty() {
        into_outcome(ctx.script_session().run_source(inline))?;
    }
    if !file.is_empty() {
        into_outcome(ctx.script_session().run_file(&base_dir.join(file)))?;
    }
    Ok(())
}

fn into_outcome(result: ScriptResult) -> std::result::Result<(), crate::script::ScriptError> {
    for line in &result.output {
        debug!("script: {}", line);
    }
    match result.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn build_call(ctx: &Context, request: &Request, body: HttpBody) -> HttpCall {
    let mut headers: Vec<(String, String)> = request
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let cookies: Vec<String> = request
        .cookies
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .chain(
            ctx.cookies()
                .into_iter()
                .map(|cookie| format!("{}={}", cookie.name, cookie.value)),
        )
        .collect();

    if !cookies.is_empty() {
        headers.push(("Cookie".to_string(), cookies.join("; ")));
    }

    HttpCall {
        method: request.verb.to_uppercase(),
        url: request.path.clone(),
        headers,
        body,
        timeout: (request.timeout_seconds > 0).then(|| Duration::from_secs(request.timeout_seconds)),
    }
}

fn format_headers(headers: &[(String, String)]) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn log_response(output: &HttpOutput) {
    info!(
        "RESPONSE:\n{} ({}ms)\n{}\n\n{}",
        output.status_text,
        output.duration.as_millis(),
        format_headers(&output.headers),
        output.body
    );
}
