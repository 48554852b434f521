//! Record and reply types.
//!
//! Input records have no fixed schema, so they stay as ordered JSON objects.
//! A [`ProcessedItem`] pairs one record with everything learned from the
//! model's reply.

use crate::extract::StructuredResult;
use serde::Serialize;
use serde_json::{Map, Value};

/// One input item: an ordered mapping of field name to JSON value.
pub type Record = Map<String, Value>;

/// What the gateway returns for one prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyPayload {
    /// Model output, or a diagnostic when the call failed.
    pub content: String,
    /// Wall time of the attempt in milliseconds, failures included.
    pub duration_ms: u64,
    /// Characters in the prompt.
    pub input_chars: usize,
    /// Characters in `content`.
    pub output_chars: usize,
    /// `content` is a synthesized error message rather than model output.
    pub transport_error: bool,
}

impl ReplyPayload {
    /// A reply carrying model output.
    pub fn success(prompt: &str, content: impl Into<String>, duration_ms: u64) -> Self {
        let content = content.into();
        Self {
            input_chars: prompt.chars().count(),
            output_chars: content.chars().count(),
            content,
            duration_ms,
            transport_error: false,
        }
    }

    /// A reply standing in for a failed call.
    pub fn failure(prompt: &str, message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            transport_error: true,
            ..Self::success(prompt, message, duration_ms)
        }
    }
}

/// A record together with the model's processed reply.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedItem {
    /// The input record, unchanged.
    pub original: Record,
    /// The reply and its extracted result.
    pub reply: Reply,
}

/// The reply half of a [`ProcessedItem`].
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    /// Raw model output.
    pub context: String,
    /// Normalized text between the result tags, empty when absent.
    pub result: String,
    /// Structured interpretation of `result`.
    pub result_formatted: StructuredResult,
    /// When the item completed (RFC 3339, UTC).
    pub time: String,
    /// Model that produced the reply.
    pub model: String,
}

/// Short label for log lines: the first 50 characters of the record's
/// `title` field, when it has one.
pub fn display_title(record: &Record) -> String {
    match record.get("title").and_then(Value::as_str) {
        Some(title) if title.chars().count() > 50 => {
            format!("{}...", title.chars().take(50).collect::<String>())
        }
        Some(title) => title.to_string(),
        None => "[untitled]".to_string(),
    }
}
