//! Notesmith - AI-assisted note generation library.
//!
//! This library turns a text selection inside a Markdown note into an
//! AI-generation request and applies the result safely back to the note,
//! even when the note changed while the request was in flight. It supports:
//!
//! - **Dual-mode prompts**: structured create-note payloads and fluent
//!   in-place rewrite prompts
//! - **Tiered response parsing** that always yields something usable
//! - **A safe-apply protocol** that relocates or diverts rather than
//!   corrupting a live document
//! - **New-note materialization** with backlinks and collision protection
//! - **Background references** aggregated best-effort into the prompt
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management (API key, host, templates)
//! - [`request`] - The immutable per-invocation request snapshot
//! - [`prompt`] - Dual-mode prompt construction
//! - [`parser`] - Tiered parsing of raw model output
//! - [`transport`] - Managed and custom-host provider transports
//! - [`http_client`] - HTTP client abstraction
//! - [`editor`] - Editor host trait plus buffer and vault implementations
//! - [`notes`] - New-note materialization
//! - [`clipboard`] - Clipboard side channel for diverted results
//! - [`orchestrator`] - The pipeline and safe-apply protocol
//! - [`error`] - Hard-failure taxonomy
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use notesmith::config::Settings;
//! use notesmith::clipboard::SystemClipboard;
//! use notesmith::editor::VaultHost;
//! use notesmith::http_client::ReqwestHttpClient;
//! use notesmith::orchestrator::{GenerationOrchestrator, Invocation};
//! use notesmith::request::{ContextScope, OutputAction};
//! use notesmith::transport::TransportClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let transport = TransportClient::new(&settings, Arc::new(ReqwestHttpClient::new()))?;
//!     let orchestrator = GenerationOrchestrator::new(&settings, Arc::new(transport));
//!
//!     let mut host = VaultHost::open("my-vault", "Biology.md")?;
//!     host.select_str("photosynthesis")?;
//!
//!     let report = orchestrator
//!         .run(&mut host, &mut SystemClipboard, Invocation {
//!             instruction_content: "Write an explainer note.".to_string(),
//!             output_action: OutputAction::CreateNote,
//!             context_scope: ContextScope::SelectionOnly,
//!             save_location: String::new(),
//!             reference_paths: Vec::new(),
//!         })
//!         .await?;
//!     println!("{:?}", report.outcome);
//!     Ok(())
//! }
//! ```

pub mod clipboard;
pub mod config;
pub mod editor;
pub mod error;
pub mod http_client;
pub mod notes;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod request;
pub mod transport;
