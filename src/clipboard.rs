//! Clipboard side channel for diverted results.
//!
//! Behind a trait so the pipeline and its tests run headless; the real
//! implementation is only touched when a reconciliation actually diverts.

use anyhow::Result;

pub trait Clipboard: Send {
    fn set_text(&mut self, text: &str) -> Result<()>;
}

/// System clipboard backed by arboard.
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        let mut clipboard = arboard::Clipboard::new()?;
        clipboard.set_text(text.to_string())?;
        Ok(())
    }
}

/// Clipboard that captures writes in memory, for tests and dry runs.
#[derive(Default)]
pub struct MemoryClipboard {
    pub contents: Option<String>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clipboard for MemoryClipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        self.contents = Some(text.to_string());
        Ok(())
    }
}
