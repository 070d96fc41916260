//! Materialization of generated notes in the vault.

use anyhow::Result;
use tracing::info;

use crate::editor::EditorHost;
use crate::error::GenerationError;
use crate::parser::GenerationResponse;
use crate::request::GenerationRequest;

const NOTE_EXTENSION: &str = "md";

/// A freshly materialized note.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedNote {
    /// Vault-relative path of the new file.
    pub path: String,
    /// Sanitized title, which is also the link target.
    pub title: String,
}

/// Removes characters that are illegal in file names. Falls back to
/// "Untitled" when nothing printable remains.
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|') && !c.is_control())
        .collect();
    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() {
        "Untitled".to_string()
    } else {
        cleaned
    }
}

/// Creates the generated note in the target folder.
///
/// The folder is the request's explicit save location (created when
/// absent) or the source note's own folder. A note already existing at the
/// target path aborts creation; existing content is never overwritten. The
/// body is prefixed with a backlink line referencing the source note.
pub fn materialize_note(
    host: &mut dyn EditorHost,
    request: &GenerationRequest,
    response: &GenerationResponse,
) -> Result<CreatedNote> {
    let folder = if request.save_location.trim().is_empty() {
        host.note_folder()
    } else {
        let folder = request.save_location.trim().to_string();
        if !host.folder_exists(&folder) {
            info!("Creating save folder '{}'", folder);
            host.create_folder(&folder)?;
        }
        folder
    };

    let title = sanitize_title(&response.title);
    let path = if folder.is_empty() {
        format!("{}.{}", title, NOTE_EXTENSION)
    } else {
        format!("{}/{}.{}", folder, title, NOTE_EXTENSION)
    };

    if host.note_exists(&path) {
        return Err(GenerationError::Collision { path }.into());
    }

    let body = format!(
        "From: [[{}]]\n\n{}",
        host.note_title(),
        response.content
    );
    host.create_note(&path, &body)?;
    info!("Created note '{}'", path);

    Ok(CreatedNote { path, title })
}
