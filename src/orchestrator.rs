//! Top-level generation pipeline and the safe-apply protocol.
//!
//! The pipeline runs Capturing -> AwaitingResponse -> Reconciling ->
//! Applying. The network call is the sole suspension point and the document
//! stays fully editable while it is in flight, so the selection captured at
//! the start (the anchor) is verified against the live document before
//! anything is written. Writing blindly at the original position corrupts a
//! document the user has moved on from; writing at the current position
//! targets text the user never selected for this request. The anchor is
//! therefore re-applied in place when the live selection still equals it,
//! relocated when it occurs exactly once elsewhere, and diverted to the
//! clipboard whenever neither can be proven.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clipboard::Clipboard;
use crate::config::Settings;
use crate::editor::{EditorHost, LineIndex, Span};
use crate::error::GenerationError;
use crate::notes::{materialize_note, CreatedNote};
use crate::parser::{GenerationResponse, ResponseParser};
use crate::prompt::PromptBuilder;
use crate::request::{
    context_windows, gather_references, ContextScope, GenerationRequest, OutputAction,
    ReferenceFailure,
};
use crate::transport::ModelTransport;

/// Per-invocation parameters, resolved by the caller from CLI arguments and
/// configured defaults.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub instruction_content: String,
    pub output_action: OutputAction,
    pub context_scope: ContextScope,
    pub save_location: String,
    pub reference_paths: Vec<String>,
}

/// Where the generated result ended up.
#[derive(Debug)]
pub enum ApplyOutcome {
    /// The document was edited at the verified target.
    Applied {
        /// True when the anchor was found at a new location first.
        relocated: bool,
        created_note: Option<CreatedNote>,
    },
    /// Reconciliation failed; the result went to the clipboard instead and
    /// no document edit was performed.
    DivertedToClipboard {
        created_note: Option<CreatedNote>,
        warning: String,
    },
}

/// Result of a completed pipeline run.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: ApplyOutcome,
    /// True when structured parsing fell back to raw model output.
    pub degraded: bool,
    /// Background references that could not be read (best-effort, non-fatal).
    pub reference_failures: Vec<ReferenceFailure>,
}

/// Decision of the reconciliation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The live selection still equals the anchor; apply at the cursor.
    InPlace,
    /// The anchor occurs exactly once in the document, at this span.
    Relocate(Span),
    /// Zero or multiple occurrences; applying would be a guess.
    Ambiguous { occurrences: usize },
}

/// Compares the live selection against the anchor and decides where (or
/// whether) to apply.
///
/// The equality check runs first: a selection that verbatim equals the
/// anchor applies in place even when the anchor text also occurs elsewhere.
/// Only afterwards is the document scanned, and relocation happens only on
/// an exact, unique occurrence.
pub fn reconcile(anchor: &str, current_selection: &str, document: &str) -> Reconciliation {
    if current_selection == anchor {
        return Reconciliation::InPlace;
    }

    let occurrences: Vec<usize> = document.match_indices(anchor).map(|(i, _)| i).collect();
    match occurrences.as_slice() {
        [start] => {
            let index = LineIndex::new(document);
            Reconciliation::Relocate(index.span(document, *start, start + anchor.len()))
        }
        _ => Reconciliation::Ambiguous {
            occurrences: occurrences.len(),
        },
    }
}

pub struct GenerationOrchestrator {
    prompt_builder: PromptBuilder,
    transport: Arc<dyn ModelTransport>,
}

impl GenerationOrchestrator {
    pub fn new(settings: &Settings, transport: Arc<dyn ModelTransport>) -> Self {
        Self {
            prompt_builder: PromptBuilder::new(settings),
            transport,
        }
    }

    /// Runs one full generation pipeline against the host.
    ///
    /// Precondition and transport failures return an error before any
    /// document mutation; every mutation that does happen is a single
    /// atomic edit.
    pub async fn run(
        &self,
        host: &mut dyn EditorHost,
        clipboard: &mut dyn Clipboard,
        invocation: Invocation,
    ) -> Result<RunReport> {
        // Capturing: snapshot the anchor before anything else.
        let anchor = host.selection();
        if anchor.trim().is_empty() {
            return Err(GenerationError::Precondition(
                "Nothing is selected. Select the text to work on first.".to_string(),
            )
            .into());
        }
        info!("Captured anchor of {} bytes", anchor.len());

        let (sel_start, sel_end) = host.selection_range();
        let snapshot = host.document_text();
        let (context_before, context_after) = context_windows(&snapshot, sel_start, sel_end);
        let references = gather_references(host, &invocation.reference_paths);

        let request = GenerationRequest {
            instruction_content: invocation.instruction_content,
            context_scope: invocation.context_scope,
            selected_text: anchor.clone(),
            context_before,
            context_after,
            parent_note_content: snapshot,
            parent_note_title: host.note_title(),
            background_references: references.references,
            save_location: invocation.save_location,
            output_action: invocation.output_action,
        };

        // AwaitingResponse: the sole suspension point. The user may edit
        // the document freely while this is in flight.
        let prompt = self.prompt_builder.build(&request);
        let raw = self.transport.send(&prompt).await?;
        let response = ResponseParser::parse(&raw, request.output_action.expects_structured());
        if response.is_fallback {
            warn!("Structured parse degraded to raw output");
        }

        // Reconciling: verify the anchor against the live document.
        let decision = reconcile(&anchor, &host.selection(), &host.document_text());
        info!("Reconciliation decision: {:?}", decision);

        let outcome = match decision {
            Reconciliation::InPlace => {
                let created = self.apply(host, &request, &response, &anchor)?;
                ApplyOutcome::Applied {
                    relocated: false,
                    created_note: created,
                }
            }
            Reconciliation::Relocate(span) => {
                host.set_selection(span)?;
                let created = self.apply(host, &request, &response, &anchor)?;
                ApplyOutcome::Applied {
                    relocated: true,
                    created_note: created,
                }
            }
            Reconciliation::Ambiguous { occurrences } => {
                self.divert(host, clipboard, &request, &response, &anchor, occurrences)?
            }
        };

        Ok(RunReport {
            degraded: response.is_fallback,
            reference_failures: references.failures,
            outcome,
        })
    }

    /// Applying: dispatch by output action. Only reached with a verified,
    /// unambiguous target selection.
    fn apply(
        &self,
        host: &mut dyn EditorHost,
        request: &GenerationRequest,
        response: &GenerationResponse,
        anchor: &str,
    ) -> Result<Option<CreatedNote>> {
        match request.output_action {
            OutputAction::ReplaceSelection => {
                host.replace_selection(&response.content)?;
                Ok(None)
            }
            OutputAction::InsertAfter => {
                // One edit, so undo reverts the whole insertion in one step.
                host.replace_selection(&format!("{}\n\n{}", anchor, response.content))?;
                Ok(None)
            }
            OutputAction::CreateNote => {
                let created = materialize_note(host, request, response)?;
                host.replace_selection(&link_to(&created, response, anchor))?;
                Ok(Some(created))
            }
        }
    }

    /// DivertedToClipboard: the work product is never silently lost. A new
    /// note is still created for CreateNote; in-place content goes to the
    /// clipboard as-is.
    fn divert(
        &self,
        host: &mut dyn EditorHost,
        clipboard: &mut dyn Clipboard,
        request: &GenerationRequest,
        response: &GenerationResponse,
        anchor: &str,
        occurrences: usize,
    ) -> Result<ApplyOutcome> {
        let reason = if occurrences == 0 {
            "the selected text is no longer present in the note".to_string()
        } else {
            format!("the selected text now appears {} times", occurrences)
        };
        warn!("Diverting result to clipboard: {}", reason);

        let (created_note, what) = match request.output_action {
            OutputAction::CreateNote => match materialize_note(host, request, response) {
                Ok(created) => {
                    clipboard.set_text(&link_to(&created, response, anchor))?;
                    (Some(created), "a link to the new note")
                }
                Err(err) if err.downcast_ref::<GenerationError>().map_or(false, |e| {
                    matches!(e, GenerationError::Collision { .. })
                }) =>
                {
                    warn!("Note creation collided during diversion: {}", err);
                    clipboard.set_text(&response.content)?;
                    (None, "the generated content")
                }
                Err(err) => return Err(err),
            },
            OutputAction::ReplaceSelection | OutputAction::InsertAfter => {
                clipboard.set_text(&response.content)?;
                (None, "the generated content")
            }
        };

        Ok(ApplyOutcome::DivertedToClipboard {
            created_note,
            warning: format!(
                "The original selection could not be unambiguously relocated ({}); {} was copied to the clipboard instead.",
                reason, what
            ),
        })
    }
}

/// Wiki-style link to a created note, labeled with the model's anchor label
/// when it gave a usable one, else with the anchor text itself.
fn link_to(created: &CreatedNote, response: &GenerationResponse, anchor: &str) -> String {
    let label = response
        .anchor_label
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(anchor);
    format!("[[{}|{}]]", created.title, label)
}
