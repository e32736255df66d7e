//! Variable interpolation for compose documents
//!
//! Runs on the raw text of a document before it is parsed, so a substituted
//! value can land in any scalar position. Supported forms:
//!
//! - `${VAR}`: value of `VAR`, empty if unset
//! - `${VAR:-default}`: `default` if `VAR` is unset or empty
//! - `${VAR-default}`: `default` only if `VAR` is unset
//!
//! Substitution is a single pass; defaults are inserted literally.

use super::env::EnvLookup;
use regex::{Captures, Regex};
use std::sync::OnceLock;

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid interpolation pattern"))
}

/// Replace every `${...}` reference in `text` using `env`
pub fn interpolate(text: &str, env: &dyn EnvLookup) -> String {
    reference_pattern()
        .replace_all(text, |caps: &Captures| resolve_reference(&caps[1], env))
        .into_owned()
}

/// Resolve the inner expression of a single `${...}` reference
fn resolve_reference(inner: &str, env: &dyn EnvLookup) -> String {
    // `:-` wins over `-` when both appear
    if let Some((name, default)) = inner.split_once(":-") {
        return match env.lookup(name) {
            Some(value) if !value.is_empty() => value,
            _ => default.to_string(),
        };
    }

    if let Some((name, default)) = inner.split_once('-') {
        return env.lookup(name).unwrap_or_else(|| default.to_string());
    }

    env.get_or_empty(inner)
}
