//! Prompt template filling.
//!
//! Placeholders are the literal token `{ key }`: one space after the opening
//! brace and one before the closing brace. Substitution is a single left to
//! right pass, so text inserted for one field is never scanned again.

use crate::config::load_template_text;
use crate::error::Result;
use crate::record::Record;
use serde_json::{Number, Value};
use std::path::Path;

const OPEN: &str = "{ ";
const CLOSE: &str = " }";

/// A prompt template loaded from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    text: String,
}

impl Template {
    /// Wrap template text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Read a template file.
    pub fn from_file(path: &Path) -> Result<Self> {
        load_template_text(path).map(Self::new)
    }

    /// Fill the template with a record's fields.
    pub fn fill(&self, record: &Record) -> String {
        fill_template(&self.text, record)
    }

    /// Field names referenced by the template, in order of first use.
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut rest = self.text.as_str();
        while let Some(start) = rest.find(OPEN) {
            match placeholder_at(&rest[start..]) {
                Some((key, after)) => {
                    if !names.iter().any(|n| n == key) {
                        names.push(key.to_string());
                    }
                    rest = after;
                }
                None => rest = &rest[start + 1..],
            }
        }
        names
    }
}

/// Replace every `{ key }` whose key is a non-null field of `record`.
///
/// Tokens are built from the record's keys, so any key matches, including
/// ones containing ` }` and the empty key. Where tokens overlap at the same
/// position the longest wins. Unknown placeholders are kept as written.
pub fn fill_template(template: &str, record: &Record) -> String {
    let mut tokens: Vec<(String, String)> = record
        .iter()
        .filter_map(|(key, value)| {
            stringify(value).map(|value| (format!("{OPEN}{key}{CLOSE}"), value))
        })
        .collect();
    tokens.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];

        match tokens
            .iter()
            .find(|(token, _)| candidate.starts_with(token.as_str()))
        {
            Some((token, value)) => {
                out.push_str(value);
                rest = &candidate[token.len()..];
            }
            None => {
                out.push('{');
                rest = &candidate[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Parse a `{ key }` token at the very start of `text`, returning the key and
/// the text after the token.
fn placeholder_at(text: &str) -> Option<(&str, &str)> {
    let body = text.strip_prefix(OPEN)?;
    let close = body.find(CLOSE)?;
    let key = &body[..close];
    if key.is_empty() || key.contains(OPEN) {
        return None;
    }
    Some((key, &body[close + CLOSE.len()..]))
}

/// String form of a field value; `None` for null.
fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(number_text(n)),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Whole floats are written without a fractional part, so `10.0` fills as
/// `10`.
fn number_text(n: &Number) -> String {
    match n.as_f64() {
        Some(f)
            if n.is_f64() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 =>
        {
            (f as i64).to_string()
        }
        _ => n.to_string(),
    }
}
