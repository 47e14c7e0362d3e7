//! Assertions over query results
//!
//! An assertion is written as `<query> <predicate> "<expectation>"`, where the
//! predicate may be negated with a leading `not`. Evaluation takes the first
//! value of the query result as the comparand; an empty result compares as an
//! empty string, or as `0` where a number is needed.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::query::value_to_string;

#[derive(Debug, Error)]
pub enum AssertError {
    #[error("Assert failed \"{query} {predicate} {expectation}\" (actual: \"{actual}\")")]
    Failed {
        query: String,
        predicate: String,
        expectation: String,
        actual: String,
    },

    #[error("Unrecognized predicate \"{0}\"")]
    UnrecognizedPredicate(String),

    #[error("invalid regular expression \"{pattern}\": {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("invalid assertion \"{0}\"")]
    InvalidAssertion(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Matches,
    Contains,
    StartsWith,
    EndsWith,
    In,
}

impl Predicate {
    pub const ALL: [Predicate; 11] = [
        Predicate::Equal,
        Predicate::NotEqual,
        Predicate::GreaterOrEqual,
        Predicate::Greater,
        Predicate::LessOrEqual,
        Predicate::Less,
        Predicate::Matches,
        Predicate::Contains,
        Predicate::StartsWith,
        Predicate::EndsWith,
        Predicate::In,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            Predicate::Equal => "==",
            Predicate::NotEqual => "!=",
            Predicate::Greater => ">",
            Predicate::GreaterOrEqual => ">=",
            Predicate::Less => "<",
            Predicate::LessOrEqual => "<=",
            Predicate::Matches => "matches",
            Predicate::Contains => "contains",
            Predicate::StartsWith => "startswith",
            Predicate::EndsWith => "endswith",
            Predicate::In => "in",
        }
    }
}

impl FromStr for Predicate {
    type Err = AssertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Predicate::ALL
            .into_iter()
            .find(|p| p.token() == s)
            .ok_or_else(|| AssertError::UnrecognizedPredicate(s.to_string()))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

fn predicate_alternation() -> String {
    Predicate::ALL
        .iter()
        .map(|p| regex::escape(p.token()))
        .collect::<Vec<_>>()
        .join("|")
}

/// Quoted expectation; the query takes everything up to the last predicate.
static QUOTED_ASSERTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"^(?P<query>.+) (?P<predicate>(?:not )?(?:{})) "(?P<expectation>.*)"$"#,
        predicate_alternation()
    ))
    .expect("assertion pattern is valid")
});

/// Bare expectation; the query stops at the first predicate.
static BARE_ASSERTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?P<query>.+?) (?P<predicate>(?:not )?(?:{})) (?P<expectation>.+)$",
        predicate_alternation()
    ))
    .expect("assertion pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    pub query: String,
    /// Raw predicate, including any `not ` prefix
    pub predicate: String,
    pub expectation: String,
}

impl Assertion {
    pub fn new(query: &str, predicate: &str, expectation: &str) -> Self {
        Self {
            query: query.to_string(),
            predicate: predicate.to_string(),
            expectation: expectation.to_string(),
        }
    }

    /// Parse `<query> [not] <predicate> "<expectation>"`.
    pub fn parse(raw: &str) -> Result<Self, AssertError> {
        let raw = raw.trim();
        let caps = QUOTED_ASSERTION
            .captures(raw)
            .or_else(|| BARE_ASSERTION.captures(raw))
            .ok_or_else(|| AssertError::InvalidAssertion(raw.to_string()))?;

        let mut query = caps["query"].trim().to_string();
        let mut predicate = caps["predicate"].to_string();

        if let Some(stripped) = query.strip_suffix(" not") {
            query = stripped.trim_end().to_string();
            predicate = format!("not {predicate}");
        }

        Ok(Self {
            query,
            predicate,
            expectation: unquote(caps["expectation"].trim()).to_string(),
        })
    }

    /// Predicate with the negation stripped, and whether it was negated.
    pub fn split_negation(&self) -> (&str, bool) {
        match self.predicate.strip_prefix("not ") {
            Some(base) => (base.trim(), true),
            None => (self.predicate.as_str(), false),
        }
    }
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
}

/// Judge `actual` against the assertion.
pub fn evaluate(assertion: &Assertion, actual: &[Value]) -> Result<(), AssertError> {
    let (base, negated) = assertion.split_negation();
    let predicate: Predicate = base.parse()?;
    let desired = !negated;

    let comparand = actual.first().map(value_to_string);
    let outcome = test_predicate(predicate, comparand.as_deref(), &assertion.expectation)?;

    if outcome == desired {
        Ok(())
    } else {
        Err(AssertError::Failed {
            query: assertion.query.clone(),
            predicate: assertion.predicate.clone(),
            expectation: assertion.expectation.clone(),
            actual: comparand.unwrap_or_default(),
        })
    }
}

fn test_predicate(
    predicate: Predicate,
    comparand: Option<&str>,
    expectation: &str,
) -> Result<bool, AssertError> {
    let text = comparand.unwrap_or_default();

    let outcome = match predicate {
        Predicate::Equal => equals(comparand, expectation),
        Predicate::NotEqual => !equals(comparand, expectation),
        Predicate::Greater => compare(comparand, expectation, |a, e| a > e),
        Predicate::GreaterOrEqual => compare(comparand, expectation, |a, e| a >= e),
        Predicate::Less => compare(comparand, expectation, |a, e| a < e),
        Predicate::LessOrEqual => compare(comparand, expectation, |a, e| a <= e),
        Predicate::Matches => Regex::new(expectation)
            .map_err(|e| AssertError::InvalidPattern {
                pattern: expectation.to_string(),
                message: e.to_string(),
            })?
            .is_match(text),
        Predicate::Contains => text.contains(expectation),
        Predicate::StartsWith => text.starts_with(expectation),
        Predicate::EndsWith => text.ends_with(expectation),
        Predicate::In => is_in(text, expectation),
    };

    Ok(outcome)
}

fn equals(comparand: Option<&str>, expectation: &str) -> bool {
    if comparand.is_none() && expectation == "[]" {
        return true;
    }

    if comparand.unwrap_or_default() == expectation {
        return true;
    }

    matches!(
        (parse_number(comparand), parse_number(Some(expectation))),
        (Some(a), Some(e)) if a == e
    )
}

fn compare(comparand: Option<&str>, expectation: &str, op: impl Fn(f64, f64) -> bool) -> bool {
    match (parse_number(comparand), parse_number(Some(expectation))) {
        (Some(a), Some(e)) => op(a, e),
        _ => false,
    }
}

fn is_in(text: &str, expectation: &str) -> bool {
    let Ok(candidates) = serde_json::from_str::<Vec<Value>>(expectation) else {
        return false;
    };

    let actual_number = parse_number(Some(text));

    candidates.iter().any(|candidate| {
        let candidate = value_to_string(candidate);
        candidate == text
            || matches!(
                (actual_number, parse_number(Some(&candidate))),
                (Some(a), Some(c)) if a == c
            )
    })
}

/// Numeric view of a comparand; an absent value counts as zero.
fn parse_number(value: Option<&str>) -> Option<f64> {
    match value {
        None => Some(0.0),
        Some(s) => s.trim().parse::<f64>().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strs(values: &[&str]) -> Vec<Value> {
        values.iter().map(|v| json!(v)).collect()
    }

    #[test]
    fn test_asserts() {
        let cases: Vec<(&str, &str, &str, Vec<Value>, bool)> = vec![
            ("equality passing", "==", "abc", strs(&["abc"]), true),
            ("[] == 0 passing", "==", "0", vec![], true),
            ("[] == [] passing", "==", "[]", vec![], true),
            ("equality not passing", "==", "abc", strs(&["123"]), false),
            ("numeric equality", "==", "1", strs(&["1.0"]), true),
            ("numeric json value", "==", "3", vec![json!(3)], true),
            ("not-equality passing", "not ==", "abc", strs(&["123"]), true),
            ("not-equality not passing", "not ==", "abc", strs(&["abc"]), false),
            ("inequality passing", "!=", "abc", strs(&["123"]), true),
            ("[] != 0 not passing", "!=", "0", vec![], false),
            ("[] != [] not passing", "!=", "[]", vec![], false),
            ("inequality not passing", "!=", "abc", strs(&["abc"]), false),
            ("not-inequality passing", "not !=", "abc", strs(&["abc"]), true),
            ("gt passing", ">", "1", strs(&["2"]), true),
            ("gt not passing", ">", "2", strs(&["1"]), false),
            ("not-gt passing", "not >", "2", strs(&["1"]), true),
            ("gt unparseable", ">", "1", strs(&["abc"]), false),
            ("not gt unparseable", "not >", "1", strs(&["abc"]), true),
            ("gt empty is zero", ">", "-1", vec![], true),
            ("lt passing", "<", "2", strs(&["1"]), true),
            ("lt not passing", "<", "1", strs(&["2"]), false),
            ("gte passing", ">=", "2", strs(&["2"]), true),
            ("lte passing", "<=", "2", strs(&["1"]), true),
            ("lte not passing", "<=", "1", strs(&["2"]), false),
            ("matches passing", "matches", "^test.+$", strs(&["testing123"]), true),
            ("matches not passing", "matches", "^test.+$", strs(&["test"]), false),
            ("not matches passing", "not matches", "^test.+$", strs(&["test"]), true),
            ("contains passing", "contains", "bc12", strs(&["abc123"]), true),
            ("contains not passing", "contains", "abcd", strs(&["abc123"]), false),
            ("startswith passing", "startswith", "abc", strs(&["abc123"]), true),
            ("startswith not passing", "startswith", "def", strs(&["abc123"]), false),
            ("endswith passing", "endswith", "123", strs(&["abc123"]), true),
            ("not endswith passing", "not endswith", "456", strs(&["abc123"]), true),
            ("in passing", "in", "[1,2,3]", strs(&["1"]), true),
            ("in numeric", "in", "[1,2,3]", strs(&["2.0"]), true),
            ("in strings", "in", r#"["a","b"]"#, strs(&["b"]), true),
            ("in not passing", "in", "[1,2,3]", strs(&["4"]), false),
            ("not in passing", "not in", "[1,2,3]", strs(&["4"]), true),
            ("not in not passing", "not in", "[1,2,3]", strs(&["1"]), false),
            ("in malformed list", "in", "[1,2", strs(&["1"]), false),
        ];

        for (name, predicate, expectation, actual, should_pass) in cases {
            let assertion = Assertion::new("q", predicate, expectation);
            let passed = evaluate(&assertion, &actual).is_ok();
            assert_eq!(passed, should_pass, "case: {name}");
        }
    }

    #[test]
    fn test_negation_is_strict_complement() {
        let samples = vec![vec![], strs(&["1.0"]), strs(&["abc"]), strs(&["5"])];
        let expectations = ["1", "abc", "[]", "[1,5]", "^a"];

        for predicate in Predicate::ALL {
            for expectation in expectations {
                for actual in &samples {
                    let plain = Assertion::new("q", predicate.token(), expectation);
                    let negated =
                        Assertion::new("q", &format!("not {}", predicate.token()), expectation);
                    assert_ne!(
                        evaluate(&plain, actual).is_ok(),
                        evaluate(&negated, actual).is_ok(),
                        "{predicate} {expectation} {actual:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_unrecognized_predicate_is_an_error() {
        let assertion = Assertion::new("status", "~=", "200");
        let err = evaluate(&assertion, &strs(&["200"])).unwrap_err();
        assert!(matches!(err, AssertError::UnrecognizedPredicate(ref p) if p == "~="));
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let assertion = Assertion::new("body", "matches", "(");
        let err = evaluate(&assertion, &strs(&["x"])).unwrap_err();
        assert!(matches!(err, AssertError::InvalidPattern { .. }));
    }

    #[test]
    fn test_failure_message_names_the_assertion() {
        let assertion = Assertion::new("status", "==", "200");
        let err = evaluate(&assertion, &strs(&["404"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Assert failed \"status == 200\" (actual: \"404\")"
        );
    }

    #[test]
    fn test_parse_assertions() {
        let parsed = Assertion::parse(r#"status == 200"#).unwrap();
        assert_eq!(parsed, Assertion::new("status", "==", "200"));

        let parsed = Assertion::parse(r#"jsonpath $.name not startswith "Bob""#).unwrap();
        assert_eq!(
            parsed,
            Assertion::new("jsonpath $.name", "not startswith", "Bob")
        );

        let parsed = Assertion::parse(r#"header Content-Type contains "json""#).unwrap();
        assert_eq!(parsed.query, "header Content-Type");
        assert_eq!(parsed.predicate, "contains");
        assert_eq!(parsed.expectation, "json");

        let parsed = Assertion::parse(r#"jsonpath $.items.length() >= 2"#).unwrap();
        assert_eq!(
            parsed,
            Assertion::new("jsonpath $.items.length()", ">=", "2")
        );

        let parsed = Assertion::parse(r#"body contains "hello world""#).unwrap();
        assert_eq!(parsed.expectation, "hello world");

        let parsed = Assertion::parse(r#"body contains "a == b""#).unwrap();
        assert_eq!(parsed, Assertion::new("body", "contains", "a == b"));
    }

    #[test]
    fn test_parse_filter_query_keeps_inner_predicates() {
        let parsed = Assertion::parse(r#"jsonpath $.items[?@.id == 2].name == "b""#).unwrap();
        assert_eq!(
            parsed,
            Assertion::new("jsonpath $.items[?@.id == 2].name", "==", "b")
        );

        let parsed =
            Assertion::parse(r#"jsonpath $.items[?@.id > 1].name not contains "z""#).unwrap();
        assert_eq!(
            parsed,
            Assertion::new("jsonpath $.items[?@.id > 1].name", "not contains", "z")
        );
    }

    #[test]
    fn test_filter_query_assertion_evaluates() {
        let exchange = crate::query::HttpExchange::with_response_body(
            r#"{"items": [{"id": 1, "name": "a"}, {"id": 2, "name": "b"}]}"#,
        );
        let assertion = Assertion::parse(r#"jsonpath $.items[?@.id == 2].name == "b""#).unwrap();

        let actual = crate::query::evaluate(&assertion.query, Some(&exchange)).unwrap();

        assert!(evaluate(&assertion, &actual).is_ok());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            Assertion::parse("status"),
            Err(AssertError::InvalidAssertion(_))
        ));
    }
}
