//! Textual `${name}` substitution
//!
//! Substitution runs over the raw text of a workflow file before it is parsed,
//! so values are inserted verbatim. A value containing YAML syntax (an
//! unbalanced quote, a `: `) can change the structure of the parsed document.

use std::borrow::Cow;
use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern is valid"));

/// Replace every `${name}` with the value of `name`, leaving unknown placeholders as-is.
pub fn substitute<'a>(text: &'a str, variables: &HashMap<String, String>) -> Cow<'a, str> {
    PLACEHOLDER.replace_all(text, |caps: &Captures| match variables.get(&caps[1]) {
        Some(value) => value.clone(),
        None => caps[0].to_string(),
    })
}
