//! Result extraction from free-text model replies.
//!
//! Replies are expected to wrap their answer in `<result>...</result>`, but
//! models do not always comply. Extraction never fails: a reply without a
//! usable result section is classified as empty and a short preview of it is
//! kept instead.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value;

static RESULT_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<result>(.*?)</result>").expect("valid result tag pattern"));

/// Maximum characters kept from a reply that has no result section.
pub const PREVIEW_CHARS: usize = 200;

/// How the content of an extracted result was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// The result parsed as JSON.
    Json,
    /// The result is plain text.
    Text,
}

impl ContentKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
        }
    }
}

/// Structured interpretation of a model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredResult {
    /// A non-empty `<result>` section was found.
    Extracted {
        /// Parsed JSON, or the cleaned text when it is not JSON.
        content: Value,
        /// The cleaned single-line text of the section.
        raw_content: String,
        /// Character length of the normalized section.
        length: usize,
        /// Whether `content` came from JSON.
        kind: ContentKind,
    },
    /// No usable `<result>` section.
    Empty {
        /// Whitespace-collapsed start of the reply.
        original_response_preview: String,
    },
}

impl StructuredResult {
    /// Whether a result section was found.
    pub fn is_extracted(&self) -> bool {
        matches!(self, Self::Extracted { .. })
    }

    /// The `type` label: `json`, `text` or `empty`.
    pub fn type_label(&self) -> &'static str {
        match self {
            Self::Extracted { kind, .. } => kind.as_str(),
            Self::Empty { .. } => "empty",
        }
    }

    /// The interpreted content; `Value::Null` when nothing was extracted.
    pub fn content(&self) -> &Value {
        match self {
            Self::Extracted { content, .. } => content,
            Self::Empty { .. } => &Value::Null,
        }
    }
}

impl Serialize for StructuredResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Extracted {
                content,
                raw_content,
                length,
                kind,
            } => {
                let mut s = serializer.serialize_struct("StructuredResult", 5)?;
                s.serialize_field("content", content)?;
                s.serialize_field("raw_content", raw_content)?;
                s.serialize_field("extracted", &true)?;
                s.serialize_field("length", length)?;
                s.serialize_field("type", kind.as_str())?;
                s.end()
            }
            Self::Empty {
                original_response_preview,
            } => {
                let mut s = serializer.serialize_struct("StructuredResult", 4)?;
                s.serialize_field("content", &Value::Null)?;
                s.serialize_field("extracted", &false)?;
                s.serialize_field("original_response_preview", original_response_preview)?;
                s.serialize_field("type", "empty")?;
                s.end()
            }
        }
    }
}

/// Output of [`extract_result`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedResult {
    /// Normalized text of the result section, empty when absent.
    pub result: String,
    /// Structured interpretation.
    pub result_formatted: StructuredResult,
}

/// Pull the `<result>` section out of a model reply.
pub fn extract_result(reply: &str) -> ExtractedResult {
    let result = RESULT_TAG
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map(|m| normalize_section(m.as_str()))
        .unwrap_or_default();

    if result.is_empty() {
        return ExtractedResult {
            result,
            result_formatted: StructuredResult::Empty {
                original_response_preview: preview(reply),
            },
        };
    }

    let cleaned = collapse_whitespace(&result);
    let (content, kind) = match serde_json::from_str::<Value>(&cleaned) {
        Ok(value) => (value, ContentKind::Json),
        Err(_) => (Value::String(cleaned.clone()), ContentKind::Text),
    };

    ExtractedResult {
        result_formatted: StructuredResult::Extracted {
            content,
            raw_content: cleaned,
            length: result.chars().count(),
            kind,
        },
        result,
    }
}

/// Trim, unify line endings and squeeze blank lines.
fn normalize_section(section: &str) -> String {
    let unified = section.trim().replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(unified.len());
    let mut last_newline = false;
    for c in unified.chars() {
        if c == '\n' {
            if !last_newline {
                out.push(c);
            }
            last_newline = true;
        } else {
            out.push(c);
            last_newline = false;
        }
    }
    out.trim().to_string()
}

/// Replace every whitespace run (newlines included) with one space and trim.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn preview(reply: &str) -> String {
    collapse_whitespace(reply).chars().take(PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_result() {
        let out = extract_result("noise <result>{\"a\":1}</result> more");
        assert_eq!(out.result, "{\"a\":1}");
        assert_eq!(
            out.result_formatted,
            StructuredResult::Extracted {
                content: json!({"a": 1}),
                raw_content: "{\"a\":1}".to_string(),
                length: 7,
                kind: ContentKind::Json,
            }
        );
    }

    #[test]
    fn test_text_result() {
        let out = extract_result("<result>hello\nworld</result>");
        assert_eq!(out.result, "hello\nworld");
        assert!(out.result_formatted.is_extracted());
        assert_eq!(out.result_formatted.type_label(), "text");
        assert_eq!(out.result_formatted.content(), &json!("hello world"));
    }

    #[test]
    fn test_scalar_json_is_json() {
        let number = extract_result("<result>42</result>");
        assert_eq!(number.result_formatted.type_label(), "json");
        assert_eq!(number.result_formatted.content(), &json!(42));

        let quoted = extract_result("<result>\"yes\"</result>");
        assert_eq!(quoted.result_formatted.type_label(), "json");
        assert_eq!(quoted.result_formatted.content(), &json!("yes"));

        let flag = extract_result("<result>true</result>");
        assert_eq!(flag.result_formatted.type_label(), "json");
    }

    #[test]
    fn test_line_endings_normalized() {
        let out = extract_result("<result>\r\n  a\r\n\r\n\rb  \n\n c \r\n</result>");
        assert_eq!(out.result, "a\nb  \n c");
        match out.result_formatted {
            StructuredResult::Extracted {
                raw_content, length, ..
            } => {
                assert_eq!(raw_content, "a b c");
                assert_eq!(length, 8);
            }
            other => panic!("expected extracted result, got {other:?}"),
        }
    }

    #[test]
    fn test_multiline_json() {
        let out = extract_result("<result>\n{\n  \"score\": 4,\n  \"tags\": [\"x\"]\n}\n</result>");
        assert_eq!(out.result_formatted.type_label(), "json");
        assert_eq!(
            out.result_formatted.content(),
            &json!({"score": 4, "tags": ["x"]})
        );
    }

    #[test]
    fn test_first_section_wins() {
        let out = extract_result("<result>one</result> and <result>two</result>");
        assert_eq!(out.result, "one");
    }

    #[test]
    fn test_missing_tag_preview_truncated() {
        let reply = "word \n\n ".repeat(100);
        let out = extract_result(&reply);
        assert_eq!(out.result, "");
        match &out.result_formatted {
            StructuredResult::Empty {
                original_response_preview,
            } => {
                assert_eq!(original_response_preview.chars().count(), PREVIEW_CHARS);
                assert!(original_response_preview.starts_with("word word"));
                assert!(!original_response_preview.contains('\n'));
            }
            other => panic!("expected empty result, got {other:?}"),
        }
        assert_eq!(out.result_formatted.type_label(), "empty");
    }

    #[test]
    fn test_empty_section_treated_as_missing() {
        let out = extract_result("before <result> \n </result> after");
        assert!(!out.result_formatted.is_extracted());
        assert_eq!(out.result, "");
    }

    #[test]
    fn test_unclosed_tag() {
        let out = extract_result("<result>{\"a\":1}");
        assert!(!out.result_formatted.is_extracted());
    }

    #[test]
    fn test_idempotent_on_raw_content() {
        for reply in [
            "x <result>{\"a\": [1, 2],\n \"b\": \"c\"}</result>",
            "<result>\n plain\n\n text  here </result>",
        ] {
            let first = extract_result(reply);
            let raw = match &first.result_formatted {
                StructuredResult::Extracted { raw_content, .. } => raw_content.clone(),
                other => panic!("expected extracted result, got {other:?}"),
            };
            let second = extract_result(&format!("<result>{raw}</result>"));
            assert_eq!(
                first.result_formatted.content(),
                second.result_formatted.content()
            );
        }
    }

    #[test]
    fn test_serialized_shape() {
        let extracted = serde_json::to_value(extract_result("<result>[1]</result>").result_formatted)
            .unwrap();
        assert_eq!(
            extracted,
            json!({"content": [1], "raw_content": "[1]", "extracted": true, "length": 3, "type": "json"})
        );

        let empty = serde_json::to_value(extract_result("no tags").result_formatted).unwrap();
        assert_eq!(
            empty,
            json!({"content": null, "extracted": false, "original_response_preview": "no tags", "type": "empty"})
        );
    }
}
