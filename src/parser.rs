//! Tiered parsing of raw model output.
//!
//! Models are unreliable at strict formatting, so parsing never hard-fails:
//! structured output is recovered through progressively looser tiers, and
//! when everything fails the caller still gets the raw text back with
//! `is_fallback` set. The user always receives something usable.

use serde::Deserialize;
use tracing::{debug, warn};

/// Title used when structured parsing falls back to raw output.
pub const FALLBACK_TITLE: &str = "Generated note";

/// Parsed model output, consumed exactly once by the apply step.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResponse {
    pub title: String,
    pub content: String,
    pub anchor_label: Option<String>,
    /// True iff no structured parse succeeded; `content` then holds the
    /// complete raw model output and `title` is [`FALLBACK_TITLE`].
    pub is_fallback: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StructuredOutput {
    title: String,
    content: String,
    #[serde(default)]
    anchor_label: Option<String>,
}

pub struct ResponseParser;

impl ResponseParser {
    /// Turns raw model output into a [`GenerationResponse`]. Never fails.
    ///
    /// With `expect_structured = false` the raw text is returned verbatim,
    /// minus at most one enclosing code fence of any language tag. With
    /// `expect_structured = true` the tiers of [`parse_structured`] are
    /// tried in order before degrading to the fallback response.
    pub fn parse(raw: &str, expect_structured: bool) -> GenerationResponse {
        if !expect_structured {
            let content = match strip_code_fence(raw) {
                Some((_, inner)) => inner,
                None => raw,
            };
            return GenerationResponse {
                title: String::new(),
                content: content.to_string(),
                anchor_label: None,
                is_fallback: false,
            };
        }

        match parse_structured(raw) {
            Some(response) => response,
            None => {
                warn!("Model output was not parseable as structured data, using raw fallback");
                GenerationResponse {
                    title: FALLBACK_TITLE.to_string(),
                    content: raw.to_string(),
                    anchor_label: None,
                    is_fallback: true,
                }
            }
        }
    }
}

/// Structured tiers, stopping at the first success:
///
/// 1. strip one enclosing fence tagged `json` (or untagged), parse as JSON;
/// 2. parse the substring between the first `{` and the last `}`, which
///    tolerates surrounding commentary the model added anyway;
/// 3. validate: non-empty string `title` and `content`, `anchorLabel`
///    carried through verbatim when present.
fn parse_structured(raw: &str) -> Option<GenerationResponse> {
    let candidate = match strip_code_fence(raw) {
        Some((tag, inner)) if tag.is_empty() || tag.eq_ignore_ascii_case("json") => inner,
        _ => raw.trim(),
    };

    if let Some(response) = parse_and_validate(candidate) {
        debug!("Structured parse succeeded on tier 1");
        return Some(response);
    }

    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    let embedded = &raw[start..=end];
    if let Some(response) = parse_and_validate(embedded) {
        debug!("Structured parse succeeded on tier 2 (embedded object)");
        return Some(response);
    }

    None
}

fn parse_and_validate(candidate: &str) -> Option<GenerationResponse> {
    let parsed: StructuredOutput = serde_json::from_str(candidate).ok()?;
    if parsed.title.trim().is_empty() || parsed.content.is_empty() {
        return None;
    }
    Some(GenerationResponse {
        title: parsed.title,
        content: parsed.content,
        anchor_label: parsed.anchor_label,
        is_fallback: false,
    })
}

/// Strips one enclosing triple-backtick fence.
///
/// Returns `(language_tag, inner_text)` when the trimmed input is a single
/// fenced block, `None` otherwise. The inner text loses only the newline
/// adjoining each fence line.
fn strip_code_fence(text: &str) -> Option<(&str, &str)> {
    let trimmed = text.trim();
    let rest = trimmed.strip_prefix("```")?;
    let newline = rest.find('\n')?;
    let tag = rest[..newline].trim();
    let body = rest[newline + 1..].strip_suffix("```")?;
    let inner = body.strip_suffix('\n').unwrap_or(body);
    Some((tag, inner))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unstructured_passthrough() {
        let response = ResponseParser::parse("plain replacement text", false);
        assert_eq!(response.content, "plain replacement text");
        assert!(response.title.is_empty());
        assert!(!response.is_fallback);
    }

    #[test]
    fn test_unstructured_strips_fence_any_tag() {
        let raw = "```markdown\nSome **bold** text\n```";
        let response = ResponseParser::parse(raw, false);
        assert_eq!(response.content, "Some **bold** text");
        assert!(!response.is_fallback);
    }

    #[test]
    fn test_unstructured_never_flags_fallback() {
        for raw in ["", "just words", "```\nfenced\n```", "{\"not\": \"json mode\"}"] {
            let response = ResponseParser::parse(raw, false);
            assert!(!response.is_fallback, "raw: {:?}", raw);
        }
    }

    #[test]
    fn test_structured_bare_json() {
        let raw = r#"{"title":"Photosynthesis","content":"Plants convert light.","anchorLabel":"energy conversion"}"#;
        let response = ResponseParser::parse(raw, true);
        assert_eq!(response.title, "Photosynthesis");
        assert_eq!(response.content, "Plants convert light.");
        assert_eq!(response.anchor_label.as_deref(), Some("energy conversion"));
        assert!(!response.is_fallback);
    }

    #[test]
    fn test_structured_json_fence() {
        let raw = "```json\n{\"title\":\"T\",\"content\":\"C\"}\n```";
        let response = ResponseParser::parse(raw, true);
        assert_eq!(response.title, "T");
        assert_eq!(response.content, "C");
        assert_eq!(response.anchor_label, None);
        assert!(!response.is_fallback);
    }

    #[test]
    fn test_structured_untagged_fence() {
        let raw = "```\n{\"title\":\"T\",\"content\":\"C\"}\n```";
        let response = ResponseParser::parse(raw, true);
        assert_eq!(response.title, "T");
        assert!(!response.is_fallback);
    }

    #[test]
    fn test_structured_surrounded_by_commentary() {
        let raw = "Sure! Here is the note you asked for:\n\n{\"title\":\"T\",\"content\":\"C\"}\n\nLet me know if you need anything else.";
        let response = ResponseParser::parse(raw, true);
        assert_eq!(response.title, "T");
        assert_eq!(response.content, "C");
        assert!(!response.is_fallback);
    }

    #[test]
    fn test_structured_whitespace_tolerated() {
        let raw = "  \n {\"title\":\"T\",\"content\":\"C\"} \n ";
        let response = ResponseParser::parse(raw, true);
        assert_eq!(response.title, "T");
        assert!(!response.is_fallback);
    }

    #[test]
    fn test_fallback_on_prose() {
        let raw = "I am sorry, I cannot produce JSON today.";
        let response = ResponseParser::parse(raw, true);
        assert!(response.is_fallback);
        assert_eq!(response.title, FALLBACK_TITLE);
        assert_eq!(response.content, raw);
        assert!(response.anchor_label.is_none());
    }

    #[test]
    fn test_fallback_preserves_raw_bytes() {
        let raw = "```json\n{\"title\":\"\",\"content\":\"valid json, empty title\"}\n```";
        let response = ResponseParser::parse(raw, true);
        assert!(response.is_fallback);
        // Fallback returns the untouched raw text, fence included.
        assert_eq!(response.content, raw);
    }

    #[test]
    fn test_fallback_on_wrong_field_types() {
        let raw = r#"{"title": 42, "content": ["not", "a", "string"]}"#;
        let response = ResponseParser::parse(raw, true);
        assert!(response.is_fallback);
        assert_eq!(response.content, raw);
    }

    #[test]
    fn test_fallback_on_missing_content() {
        let raw = r#"{"title": "only a title"}"#;
        let response = ResponseParser::parse(raw, true);
        assert!(response.is_fallback);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let inputs = [
            ("plain", false),
            ("```json\n{\"title\":\"T\",\"content\":\"C\"}\n```", true),
            ("no json here at all", true),
        ];
        for (raw, structured) in inputs {
            let first = ResponseParser::parse(raw, structured);
            let second = ResponseParser::parse(raw, structured);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_fence_with_braces_inside_prose_ignored() {
        // Tier 2 must use the outermost braces, not stop at inner ones.
        let raw = "note: {\"title\":\"T\",\"content\":\"has } inside\"} trailing";
        let response = ResponseParser::parse(raw, true);
        assert_eq!(response.title, "T");
        assert_eq!(response.content, "has } inside");
    }

    #[test]
    fn test_strip_code_fence_requires_both_fences() {
        assert!(strip_code_fence("```json\n{\"a\":1}").is_none());
        assert!(strip_code_fence("{\"a\":1}\n```").is_none());
        assert!(strip_code_fence("no fence").is_none());
    }
}
