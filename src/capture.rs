//! Binding query results into the environment

use tracing::debug;

use crate::context::Context;
use crate::query::{self, value_to_string, HttpExchange, QueryError};

/// Store the first value selected by `query` under `variable`.
///
/// An empty result leaves any existing value in place; a query error leaves
/// the environment untouched.
pub fn capture(
    variable: &str,
    query: &str,
    ctx: &Context,
    exchange: Option<&HttpExchange>,
) -> Result<(), QueryError> {
    let values = query::evaluate(query, exchange)?;

    match values.first() {
        Some(first) => {
            let value = value_to_string(first);
            debug!("Captured {} = {}", variable, value);
            ctx.env_set(variable, value);
        }
        None => debug!("Capture of {} selected nothing; keeping current value", variable),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpClient;
    use std::collections::HashMap;

    fn context() -> Context {
        let env = HashMap::from([("id".to_string(), "previous".to_string())]);
        Context::new(".", env, HttpClient::mock().0)
    }

    #[test]
    fn test_capture_first_value() {
        let ctx = context();
        let exchange = HttpExchange::with_response_body(r#"{"items": [{"id": 7}, {"id": 8}]}"#);

        capture("id", "jsonpath $.items[*].id", &ctx, Some(&exchange)).unwrap();

        assert_eq!(ctx.env_get("id").as_deref(), Some("7"));
    }

    #[test]
    fn test_capture_status_into_new_variable() {
        let ctx = context();
        let exchange = HttpExchange::with_response_body("");

        capture("code", "status", &ctx, Some(&exchange)).unwrap();

        assert_eq!(ctx.env_get("code").as_deref(), Some("200"));
    }

    #[test]
    fn test_empty_result_keeps_existing_value() {
        let ctx = context();
        let exchange = HttpExchange::with_response_body(r#"{"items": []}"#);

        capture("id", "jsonpath $.missing", &ctx, Some(&exchange)).unwrap();
        capture("id", "status", &ctx, None).unwrap();

        assert_eq!(ctx.env_get("id").as_deref(), Some("previous"));
    }

    #[test]
    fn test_error_leaves_environment_untouched() {
        let ctx = context();
        let exchange = HttpExchange::with_response_body("{}");

        let err = capture("id", "statuscode", &ctx, Some(&exchange)).unwrap_err();

        assert!(matches!(err, QueryError::Unrecognized(_)));
        assert_eq!(ctx.env_get("id").as_deref(), Some("previous"));
    }
}
