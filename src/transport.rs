//! Transport to the model provider: one prompt in, raw text out.
//!
//! Two mutually exclusive paths, selected by whether a custom API host is
//! configured: the managed path talks to the provider's canonical endpoint
//! with just an API key and model identifier; the custom-host path builds
//! the same wire call against a user-supplied base URL. A single attempt
//! per invocation: no retries, no extra timeout, failures surface
//! immediately.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::GenerationError;
use crate::http_client::HttpClient;

/// Canonical provider endpoint used when no custom host is configured.
pub const MANAGED_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// Sends a built prompt to the model and returns the raw response text.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    async fn send(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Production transport speaking the `generateContent` wire contract.
pub struct TransportClient {
    http: Arc<dyn HttpClient>,
    api_key: String,
    /// Trimmed custom host; empty selects the managed path.
    custom_host: String,
    model: String,
}

impl std::fmt::Debug for TransportClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportClient")
            .field("custom_host", &self.custom_host)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl TransportClient {
    /// Builds a transport from settings. A missing API key is a
    /// precondition failure raised here, before any call is attempted.
    pub fn new(settings: &Settings, http: Arc<dyn HttpClient>) -> Result<Self, GenerationError> {
        let api_key = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                GenerationError::Precondition(
                    "No API key configured. Set one with 'quill --set-api-key <key>' \
                     or export NOTESMITH_API_KEY."
                        .to_string(),
                )
            })?
            .to_string();

        Ok(Self {
            http,
            api_key,
            custom_host: settings.api_host.trim().to_string(),
            model: settings.model.clone(),
        })
    }

    fn request_url(&self) -> (String, Vec<(&'static str, String)>) {
        if self.custom_host.is_empty() {
            // Managed path: canonical endpoint, key in a header.
            let url = format!(
                "{}/v1beta/models/{}:generateContent",
                MANAGED_ENDPOINT, self.model
            );
            (url, vec![("x-goog-api-key", self.api_key.clone())])
        } else {
            let host = normalize_host(&self.custom_host);
            let url = format!(
                "{}/v1beta/models/{}:generateContent?key={}",
                host, self.model, self.api_key
            );
            (url, Vec::new())
        }
    }
}

#[async_trait]
impl ModelTransport for TransportClient {
    async fn send(&self, prompt: &str) -> Result<String, GenerationError> {
        let (url, headers) = self.request_url();
        let envelope = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        info!(
            "Sending generation request via {} path",
            if self.custom_host.is_empty() { "managed" } else { "custom-host" }
        );

        let header_refs: Vec<(&str, &str)> =
            headers.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let response = self
            .http
            .post_json(&url, &header_refs, &envelope)
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        if response.status >= 400 {
            return Err(GenerationError::Transport(format!(
                "provider returned HTTP {}: {}",
                response.status,
                snippet(&response.body)
            )));
        }

        match extract_text(&response.body) {
            Some(text) => {
                debug!("Extracted {} bytes of model output", text.len());
                Ok(text)
            }
            None => Err(GenerationError::Transport(
                "provider response contained no text".to_string(),
            )),
        }
    }
}

/// Pulls `candidates[0].content.parts[0].text` out of the response body.
/// `None` when the path is missing or the text is empty.
fn extract_text(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let text = value
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()?;
    if text.is_empty() {
        return None;
    }
    Some(text.to_string())
}

/// Repairs a single malformed scheme slash ("https:/host") and strips one
/// trailing slash. Anything else is passed through untouched.
fn normalize_host(raw: &str) -> String {
    let mut host = raw.trim().to_string();
    for scheme in ["https:/", "http:/"] {
        if let Some(rest) = host.strip_prefix(scheme) {
            if !rest.starts_with('/') {
                host = format!("{}/{}", scheme, rest);
            }
            break;
        }
    }
    if let Some(stripped) = host.strip_suffix('/') {
        host = stripped.to_string();
    }
    host
}

fn snippet(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    &body[..end]
}

// =============================================================================
// Mock transport for mock mode and tests
// =============================================================================

/// Offline transport returning canned output, selected by prompt shape.
///
/// Keyed off the structured-format mandate in the prompt so create-note
/// invocations get parseable JSON and in-place invocations get plain text.
pub struct MockTransport;

impl MockTransport {
    pub const STRUCTURED_REPLY: &'static str =
        r#"{"title":"Mock note","content":"Mock generated body.","anchorLabel":"mock link"}"#;
    pub const IN_PLACE_REPLY: &'static str = "Mock rewritten text.";

    pub fn new() -> Self {
        Self
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelTransport for MockTransport {
    async fn send(&self, prompt: &str) -> Result<String, GenerationError> {
        info!("Using mock transport (NOTESMITH_USE_MOCK=1)");
        if prompt.contains("EXACTLY one JSON object") {
            Ok(Self::STRUCTURED_REPLY.to_string())
        } else {
            Ok(Self::IN_PLACE_REPLY.to_string())
        }
    }
}
