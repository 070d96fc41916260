//! Error taxonomy for the generation pipeline.
//!
//! Only hard failures live here. Parse degradation and reconciliation
//! ambiguity are not errors: the parser always returns a usable response,
//! and an ambiguous reconciliation diverts the result to the clipboard
//! instead of failing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    /// The request could not be attempted at all (empty selection,
    /// missing API key). No network call has been made.
    #[error("{0}")]
    Precondition(String),

    /// The model call failed: network error, HTTP status >= 400, or a
    /// response with no extractable text. No document mutation has occurred.
    #[error("model request failed: {0}")]
    Transport(String),

    /// A note already exists at the target path. Creation is aborted and
    /// existing content is never overwritten.
    #[error("a note already exists at '{path}'")]
    Collision { path: String },
}
