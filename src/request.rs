//! Request assembly: the immutable snapshot handed to the rest of the
//! pipeline.
//!
//! A [`GenerationRequest`] is built fresh for every invocation and never
//! cached or shared. In particular `selected_text` is the anchor value the
//! safe-apply protocol verifies against later, so it must never change
//! after capture.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::editor::EditorHost;

/// How much of the source note is disclosed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextScope {
    #[default]
    SelectionOnly,
    SelectionAndFullParent,
}

/// What happens to the model output. Determines both the prompt shape and
/// the apply strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputAction {
    #[default]
    CreateNote,
    ReplaceSelection,
    InsertAfter,
}

impl OutputAction {
    /// CreateNote is the only mode that asks the model for structured output.
    pub fn expects_structured(&self) -> bool {
        matches!(self, OutputAction::CreateNote)
    }
}

/// One user-curated auxiliary document disclosed to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundReference {
    pub path: String,
    pub content: String,
}

/// A reference that could not be read. Recorded, not fatal.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceFailure {
    pub path: String,
    pub reason: String,
}

/// Result of the best-effort reference aggregation.
#[derive(Debug, Default)]
pub struct ReferenceSet {
    pub references: Vec<BackgroundReference>,
    pub failures: Vec<ReferenceFailure>,
}

/// Immutable snapshot of everything the pipeline needs for one invocation.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub instruction_content: String,
    pub context_scope: ContextScope,
    /// The exact text selected when the request started. Anchor value for
    /// reconciliation; never refreshed.
    pub selected_text: String,
    pub context_before: String,
    pub context_after: String,
    pub parent_note_content: String,
    pub parent_note_title: String,
    pub background_references: Vec<BackgroundReference>,
    /// Target folder for CreateNote; empty means "same folder as source".
    pub save_location: String,
    pub output_action: OutputAction,
}

/// Maximum length, in characters, of each surrounding-context window.
pub const CONTEXT_WINDOW_CHARS: usize = 1000;

/// Captures the bounded text windows around a selection.
///
/// `start` and `end` are byte offsets into `document`; the windows are
/// capped at [`CONTEXT_WINDOW_CHARS`] characters each.
pub fn context_windows(document: &str, start: usize, end: usize) -> (String, String) {
    let before = &document[..start];
    let skip = before.chars().count().saturating_sub(CONTEXT_WINDOW_CHARS);
    let before: String = before.chars().skip(skip).collect();
    let after: String = document[end..].chars().take(CONTEXT_WINDOW_CHARS).collect();
    (before, after)
}

/// Reads background references through the host, best-effort.
///
/// A reference that is missing, unreadable, or empty is skipped and
/// recorded in the diagnostics list; one bad file never aborts the others.
/// Order of the surviving references follows the order of `paths`.
pub fn gather_references(host: &dyn EditorHost, paths: &[String]) -> ReferenceSet {
    let mut set = ReferenceSet::default();
    for path in paths {
        match host.read_note(path) {
            Ok(content) if content.trim().is_empty() => {
                warn!("Skipping empty reference '{}'", path);
                set.failures.push(ReferenceFailure {
                    path: path.clone(),
                    reason: "file is empty".to_string(),
                });
            }
            Ok(content) => set.references.push(BackgroundReference {
                path: path.clone(),
                content,
            }),
            Err(err) => {
                warn!("Skipping unreadable reference '{}': {}", path, err);
                set.failures.push(ReferenceFailure {
                    path: path.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::BufferHost;

    #[test]
    fn test_context_windows_around_selection() {
        let doc = "before text SELECTED after text";
        let start = doc.find("SELECTED").unwrap();
        let end = start + "SELECTED".len();

        let (before, after) = context_windows(doc, start, end);
        assert_eq!(before, "before text ");
        assert_eq!(after, " after text");
    }

    #[test]
    fn test_context_windows_capped_at_limit() {
        let long = "x".repeat(3000);
        let doc = format!("{}SEL{}", long, long);
        let start = 3000;
        let end = start + 3;

        let (before, after) = context_windows(&doc, start, end);
        assert_eq!(before.chars().count(), CONTEXT_WINDOW_CHARS);
        assert_eq!(after.chars().count(), CONTEXT_WINDOW_CHARS);
    }

    #[test]
    fn test_context_windows_at_document_edges() {
        let doc = "SELECTED";
        let (before, after) = context_windows(doc, 0, doc.len());
        assert!(before.is_empty());
        assert!(after.is_empty());
    }

    #[test]
    fn test_context_windows_multibyte_boundary() {
        let doc = "héllo wörld SEL çà va";
        let start = doc.find("SEL").unwrap();
        let (before, after) = context_windows(doc, start, start + 3);
        assert_eq!(before, "héllo wörld ");
        assert_eq!(after, " çà va");
    }

    #[test]
    fn test_gather_references_skips_missing_files() {
        let mut host = BufferHost::new("Source", "some text");
        host.add_note("refs/a.md", "alpha content");
        host.add_note("refs/c.md", "gamma content");

        let paths = vec![
            "refs/a.md".to_string(),
            "refs/b.md".to_string(),
            "refs/c.md".to_string(),
        ];
        let set = gather_references(&host, &paths);

        assert_eq!(set.references.len(), 2);
        assert_eq!(set.references[0].path, "refs/a.md");
        assert_eq!(set.references[1].path, "refs/c.md");
        assert_eq!(set.failures.len(), 1);
        assert_eq!(set.failures[0].path, "refs/b.md");
    }

    #[test]
    fn test_gather_references_skips_empty_files() {
        let mut host = BufferHost::new("Source", "some text");
        host.add_note("refs/empty.md", "   \n");

        let set = gather_references(&host, &["refs/empty.md".to_string()]);
        assert!(set.references.is_empty());
        assert_eq!(set.failures.len(), 1);
        assert_eq!(set.failures[0].reason, "file is empty");
    }

    #[test]
    fn test_gather_references_preserves_order() {
        let mut host = BufferHost::new("Source", "some text");
        host.add_note("z.md", "z");
        host.add_note("a.md", "a");

        let set = gather_references(&host, &["z.md".to_string(), "a.md".to_string()]);
        assert_eq!(set.references[0].path, "z.md");
        assert_eq!(set.references[1].path, "a.md");
    }
}
