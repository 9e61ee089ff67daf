//! Content-kind formatting applied before annotation.
//!
//! JSON fields are pretty-printed once and annotated on the formatted
//! string; everything downstream treats the result as plain text.

use log::debug;
use serde::{Deserialize, Serialize};

/// How raw field content is turned into canonical display text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Displayed verbatim.
    #[default]
    PlainText,
    /// Parsed and pretty-printed with two-space indentation.
    Json,
}

/// Returns the canonical text for `raw` under `kind`.
///
/// Key order of JSON objects is preserved. Content that does not parse as
/// JSON is returned unchanged so the field stays annotatable.
pub fn format_content(raw: &str, kind: ContentKind) -> String {
    match kind {
        ContentKind::PlainText => raw.to_string(),
        ContentKind::Json => match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| raw.to_string()),
            Err(err) => {
                debug!(
                    "event=content_format module=content status=fallback kind=json error_line={} error_column={}",
                    err.line(),
                    err.column()
                );
                raw.to_string()
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{format_content, ContentKind};

    #[test]
    fn plain_text_is_returned_verbatim() {
        let raw = "  keep   spacing\n";
        assert_eq!(format_content(raw, ContentKind::PlainText), raw);
    }

    #[test]
    fn json_is_pretty_printed_in_source_key_order() {
        let raw = r#"{"zeta":1,"alpha":{"items":[true,null]}}"#;
        let formatted = format_content(raw, ContentKind::Json);
        assert_eq!(
            formatted,
            "{\n  \"zeta\": 1,\n  \"alpha\": {\n    \"items\": [\n      true,\n      null\n    ]\n  }\n}"
        );
    }

    #[test]
    fn formatting_is_idempotent() {
        let once = format_content(r#"[1,{"b":"x"}]"#, ContentKind::Json);
        let twice = format_content(&once, ContentKind::Json);
        assert_eq!(once, twice);
    }

    #[test]
    fn invalid_json_falls_back_to_raw_text() {
        let raw = "{not json";
        assert_eq!(format_content(raw, ContentKind::Json), raw);
    }
}
