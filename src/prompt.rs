//! Dual-mode prompt construction.
//!
//! `build` is a pure function of the request: identical requests always
//! produce identical prompts, which keeps the pipeline deterministic and
//! testable without a live model.

use serde::Serialize;
use serde_json::to_string_pretty;

use crate::config::Settings;
use crate::request::{ContextScope, GenerationRequest, OutputAction};

const STRUCTURED_FORMAT_MANDATE: &str = "CRITICAL: Respond with EXACTLY one JSON object and nothing else. \
No explanations, no surrounding prose, no code fences. \
The object must have exactly three fields: \
\"title\" (a short note title), \
\"content\" (the full note body in Markdown), and \
\"anchorLabel\" (a 2-5 word label describing the selected text, for linking).";

const REFERENCE_ENRICHMENT_MANDATE: &str = "Use the background references for factual enrichment; prefer facts \
found in them over your own assumptions.";

const IN_PLACE_FORMAT_MANDATE: &str = "Match the tense, tone, and formatting of the surrounding text so the \
result reads as a seamless continuation. Respond with the replacement \
text ONLY: no conversational filler, no preamble, no quotation marks \
around the result.";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateNotePayload<'a> {
    user_instruction: &'a str,
    selected_text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_note_content: Option<&'a str>,
    parent_note_title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    background_references: Option<String>,
}

/// Builds provider-ready prompts from a [`GenerationRequest`], branching on
/// the output mode.
pub struct PromptBuilder {
    create_note_preamble: String,
    in_place_preamble: String,
}

impl PromptBuilder {
    pub fn new(settings: &Settings) -> Self {
        Self {
            create_note_preamble: settings.create_note_template.clone(),
            in_place_preamble: settings.in_place_template.clone(),
        }
    }

    pub fn build(&self, request: &GenerationRequest) -> String {
        match request.output_action {
            OutputAction::CreateNote => self.build_create_note(request),
            OutputAction::ReplaceSelection | OutputAction::InsertAfter => {
                self.build_in_place(request)
            }
        }
    }

    /// Create-note mode: fixed purity preamble plus a canonical key-value
    /// payload block. Optional fields are omitted entirely when absent so
    /// the model never sees empty sections.
    fn build_create_note(&self, request: &GenerationRequest) -> String {
        let payload = CreateNotePayload {
            user_instruction: &request.instruction_content,
            selected_text: &request.selected_text,
            parent_note_content: match request.context_scope {
                ContextScope::SelectionAndFullParent => Some(&request.parent_note_content),
                ContextScope::SelectionOnly => None,
            },
            parent_note_title: &request.parent_note_title,
            background_references: concat_references(request),
        };

        let mut preamble = format!("{}\n\n{}", self.create_note_preamble, STRUCTURED_FORMAT_MANDATE);
        if !request.background_references.is_empty() {
            preamble.push(' ');
            preamble.push_str(REFERENCE_ENRICHMENT_MANDATE);
        }

        // Struct serialization keeps field order canonical.
        let block = to_string_pretty(&payload)
            .unwrap_or_else(|_| String::from("{}"));

        format!("{}\n\nINPUT:\n{}", preamble, block)
    }

    /// In-place modes: one fluent prompt with labeled sections in fixed
    /// order, closing with the selected text itself.
    fn build_in_place(&self, request: &GenerationRequest) -> String {
        let mut prompt = format!(
            "{}\n{}\n\n## Task\n{}\n",
            self.in_place_preamble, IN_PLACE_FORMAT_MANDATE, request.instruction_content
        );

        if let Some(references) = concat_references(request) {
            prompt.push_str("\n## Background references\n");
            prompt.push_str(&references);
            prompt.push('\n');
        }

        prompt.push_str("\n## Text before the selection\n");
        prompt.push_str(&request.context_before);
        prompt.push_str("\n\n## Text after the selection\n");
        prompt.push_str(&request.context_after);
        prompt.push_str("\n\n## Selected text\n");
        prompt.push_str(&request.selected_text);
        prompt.push('\n');

        prompt
    }
}

/// Concatenates background references with separators naming each source.
/// `None` when there are no references, so callers can omit the section.
fn concat_references(request: &GenerationRequest) -> Option<String> {
    if request.background_references.is_empty() {
        return None;
    }
    let joined = request
        .background_references
        .iter()
        .map(|r| format!("=== Reference: {} ===\n{}", r.path, r.content))
        .collect::<Vec<_>>()
        .join("\n\n");
    Some(joined)
}
