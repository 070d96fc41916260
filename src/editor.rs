//! Editor host abstraction and position arithmetic.
//!
//! The generation pipeline never touches files or selections directly; it
//! goes through the [`EditorHost`] trait so tests can run against an
//! in-memory buffer and the CLI against a vault directory. This mirrors the
//! selection/range primitives a Markdown editor exposes.

use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// A zero-based line/column position. Columns count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub ch: usize,
}

/// A half-open span between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub from: Position,
    pub to: Position,
}

/// Host-side document and vault operations the pipeline depends on.
///
/// Selections are reported as text plus a byte range into the current
/// document. All note and folder paths are vault-relative with `/`
/// separators.
pub trait EditorHost {
    /// The currently selected text. Empty when nothing is selected.
    fn selection(&self) -> String;

    /// Byte offsets of the current selection within the document.
    fn selection_range(&self) -> (usize, usize);

    /// The whole document text.
    fn document_text(&self) -> String;

    /// Title of the source note, without extension.
    fn note_title(&self) -> String;

    /// Folder of the source note, vault-relative. Empty for the vault root.
    fn note_folder(&self) -> String;

    /// Replaces the current selection with `text` as a single atomic edit.
    fn replace_selection(&mut self, text: &str) -> Result<()>;

    /// Moves the active selection to `span`.
    fn set_selection(&mut self, span: Span) -> Result<()>;

    fn note_exists(&self, path: &str) -> bool;
    fn folder_exists(&self, path: &str) -> bool;
    fn create_folder(&mut self, path: &str) -> Result<()>;
    fn create_note(&mut self, path: &str, content: &str) -> Result<()>;
    fn read_note(&self, path: &str) -> Result<String>;
}

/// Byte offset of each line start, built once per document snapshot.
///
/// Reconciliation computes both endpoints of a relocated span from the same
/// index, so large documents are scanned once rather than per lookup.
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        Self { starts }
    }

    /// Converts a byte offset into a line/column position.
    ///
    /// The column is the number of characters between the line start and
    /// the offset, so multi-byte text maps to editor columns correctly.
    pub fn position(&self, text: &str, offset: usize) -> Position {
        let line = self.starts.partition_point(|&s| s <= offset) - 1;
        let line_start = self.starts[line];
        let ch = text[line_start..offset].chars().count();
        Position { line, ch }
    }

    /// Converts a line/column position back into a byte offset.
    pub fn offset(&self, text: &str, pos: Position) -> usize {
        let line_start = self.starts[pos.line.min(self.starts.len() - 1)];
        text[line_start..]
            .char_indices()
            .nth(pos.ch)
            .map(|(i, _)| line_start + i)
            .unwrap_or(text.len())
    }

    /// Computes the span covering `start..end` byte offsets.
    pub fn span(&self, text: &str, start: usize, end: usize) -> Span {
        Span {
            from: self.position(text, start),
            to: self.position(text, end),
        }
    }
}

// =============================================================================
// In-memory host for tests
// =============================================================================

/// An in-memory editor host: one open document plus a virtual vault.
pub struct BufferHost {
    title: String,
    folder: String,
    text: String,
    sel_start: usize,
    sel_end: usize,
    notes: BTreeMap<String, String>,
    folders: Vec<String>,
}

impl BufferHost {
    pub fn new(title: &str, text: &str) -> Self {
        Self {
            title: title.to_string(),
            folder: String::new(),
            text: text.to_string(),
            sel_start: 0,
            sel_end: 0,
            notes: BTreeMap::new(),
            folders: Vec::new(),
        }
    }

    pub fn with_folder(mut self, folder: &str) -> Self {
        self.folder = folder.to_string();
        self
    }

    /// Selects the first occurrence of `needle` in the document.
    pub fn select_str(&mut self, needle: &str) {
        let start = self
            .text
            .find(needle)
            .unwrap_or_else(|| panic!("'{}' not found in buffer", needle));
        self.sel_start = start;
        self.sel_end = start + needle.len();
    }

    /// Collapses the selection to a caret at `offset`.
    pub fn select_range(&mut self, start: usize, end: usize) {
        self.sel_start = start;
        self.sel_end = end;
    }

    /// Replaces the whole document without touching the selection offsets.
    pub fn overwrite_text(&mut self, text: &str) {
        self.text = text.to_string();
        let len = self.text.len();
        self.sel_start = self.sel_start.min(len);
        self.sel_end = self.sel_end.min(len);
    }

    pub fn add_note(&mut self, path: &str, content: &str) {
        self.notes.insert(path.to_string(), content.to_string());
    }

    pub fn note_content(&self, path: &str) -> Option<&String> {
        self.notes.get(path)
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl EditorHost for BufferHost {
    fn selection(&self) -> String {
        self.text[self.sel_start..self.sel_end].to_string()
    }

    fn selection_range(&self) -> (usize, usize) {
        (self.sel_start, self.sel_end)
    }

    fn document_text(&self) -> String {
        self.text.clone()
    }

    fn note_title(&self) -> String {
        self.title.clone()
    }

    fn note_folder(&self) -> String {
        self.folder.clone()
    }

    fn replace_selection(&mut self, text: &str) -> Result<()> {
        self.text
            .replace_range(self.sel_start..self.sel_end, text);
        self.sel_end = self.sel_start + text.len();
        Ok(())
    }

    fn set_selection(&mut self, span: Span) -> Result<()> {
        let index = LineIndex::new(&self.text);
        self.sel_start = index.offset(&self.text, span.from);
        self.sel_end = index.offset(&self.text, span.to);
        Ok(())
    }

    fn note_exists(&self, path: &str) -> bool {
        self.notes.contains_key(path)
    }

    fn folder_exists(&self, path: &str) -> bool {
        self.folders.iter().any(|f| f == path)
    }

    fn create_folder(&mut self, path: &str) -> Result<()> {
        self.folders.push(path.to_string());
        Ok(())
    }

    fn create_note(&mut self, path: &str, content: &str) -> Result<()> {
        self.notes.insert(path.to_string(), content.to_string());
        Ok(())
    }

    fn read_note(&self, path: &str) -> Result<String> {
        self.notes
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("note '{}' not found", path))
    }
}

// =============================================================================
// Directory-backed host for the CLI
// =============================================================================

/// An editor host over a vault directory with one open note.
///
/// Edits are written back to disk immediately; there is no separate save
/// step, so the on-disk note always reflects the applied result.
pub struct VaultHost {
    root: PathBuf,
    note_path: String,
    text: String,
    sel_start: usize,
    sel_end: usize,
}

impl VaultHost {
    /// Opens `note_path` (vault-relative) under `root`.
    pub fn open(root: impl Into<PathBuf>, note_path: &str) -> Result<Self> {
        let root = root.into();
        let absolute = root.join(note_path);
        let text = fs::read_to_string(&absolute)
            .map_err(|e| anyhow!("could not open note '{}': {}", note_path, e))?;
        debug!("Opened note '{}' ({} bytes)", note_path, text.len());
        Ok(Self {
            root,
            note_path: note_path.to_string(),
            text,
            sel_start: 0,
            sel_end: 0,
        })
    }

    /// Selects the first occurrence of `needle` in the open note.
    pub fn select_str(&mut self, needle: &str) -> Result<()> {
        let start = self
            .text
            .find(needle)
            .ok_or_else(|| anyhow!("'{}' not found in '{}'", needle, self.note_path))?;
        self.sel_start = start;
        self.sel_end = start + needle.len();
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        fs::write(self.root.join(&self.note_path), &self.text)?;
        Ok(())
    }
}

impl EditorHost for VaultHost {
    fn selection(&self) -> String {
        self.text[self.sel_start..self.sel_end].to_string()
    }

    fn selection_range(&self) -> (usize, usize) {
        (self.sel_start, self.sel_end)
    }

    fn document_text(&self) -> String {
        self.text.clone()
    }

    fn note_title(&self) -> String {
        let name = self
            .note_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.note_path);
        name.strip_suffix(".md").unwrap_or(name).to_string()
    }

    fn note_folder(&self) -> String {
        match self.note_path.rsplit_once('/') {
            Some((folder, _)) => folder.to_string(),
            None => String::new(),
        }
    }

    fn replace_selection(&mut self, text: &str) -> Result<()> {
        self.text
            .replace_range(self.sel_start..self.sel_end, text);
        self.sel_end = self.sel_start + text.len();
        self.persist()
    }

    fn set_selection(&mut self, span: Span) -> Result<()> {
        let index = LineIndex::new(&self.text);
        self.sel_start = index.offset(&self.text, span.from);
        self.sel_end = index.offset(&self.text, span.to);
        Ok(())
    }

    fn note_exists(&self, path: &str) -> bool {
        self.root.join(path).exists()
    }

    fn folder_exists(&self, path: &str) -> bool {
        self.root.join(path).is_dir()
    }

    fn create_folder(&mut self, path: &str) -> Result<()> {
        fs::create_dir_all(self.root.join(path))?;
        Ok(())
    }

    fn create_note(&mut self, path: &str, content: &str) -> Result<()> {
        let absolute = self.root.join(path);
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(absolute, content)?;
        Ok(())
    }

    fn read_note(&self, path: &str) -> Result<String> {
        Ok(fs::read_to_string(self.root.join(path))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_index_first_line() {
        let text = "alpha\nbeta\ngamma";
        let index = LineIndex::new(text);
        assert_eq!(index.position(text, 0), Position { line: 0, ch: 0 });
        assert_eq!(index.position(text, 3), Position { line: 0, ch: 3 });
    }

    #[test]
    fn test_line_index_later_lines() {
        let text = "alpha\nbeta\ngamma";
        let index = LineIndex::new(text);
        assert_eq!(index.position(text, 6), Position { line: 1, ch: 0 });
        assert_eq!(index.position(text, 13), Position { line: 2, ch: 2 });
    }

    #[test]
    fn test_line_index_multibyte_columns() {
        let text = "héllo\nwörld";
        let index = LineIndex::new(text);
        // 'ö' is two bytes; the column after it is still 2 characters in.
        let offset = text.find("rld").unwrap();
        assert_eq!(index.position(text, offset), Position { line: 1, ch: 2 });
    }

    #[test]
    fn test_line_index_offset_roundtrip() {
        let text = "one\ntwo three\nfour";
        let index = LineIndex::new(text);
        for offset in [0, 4, 8, 14, text.len()] {
            let pos = index.position(text, offset.min(text.len()));
            assert_eq!(index.offset(text, pos), offset.min(text.len()));
        }
    }

    #[test]
    fn test_line_index_span_substring_matches() {
        let text = "first line\nsecond foo line\nthird";
        let start = text.find("foo").unwrap();
        let index = LineIndex::new(text);
        let span = index.span(text, start, start + 3);

        assert_eq!(span.from, Position { line: 1, ch: 7 });
        assert_eq!(span.to, Position { line: 1, ch: 10 });
    }

    #[test]
    fn test_buffer_host_replace_selection() {
        let mut host = BufferHost::new("Note", "keep THIS keep");
        host.select_str("THIS");
        host.replace_selection("that").unwrap();
        assert_eq!(host.text(), "keep that keep");
    }

    #[test]
    fn test_buffer_host_set_selection_by_span() {
        let mut host = BufferHost::new("Note", "ab\ncdef\ngh");
        let span = Span {
            from: Position { line: 1, ch: 1 },
            to: Position { line: 1, ch: 3 },
        };
        host.set_selection(span).unwrap();
        assert_eq!(host.selection(), "de");
    }

    #[test]
    fn test_vault_host_title_and_folder() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("topics")).unwrap();
        fs::write(dir.path().join("topics/Biology.md"), "cells").unwrap();

        let host = VaultHost::open(dir.path(), "topics/Biology.md").unwrap();
        assert_eq!(host.note_title(), "Biology");
        assert_eq!(host.note_folder(), "topics");
    }

    #[test]
    fn test_vault_host_edits_persist() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("note.md"), "old words here").unwrap();

        let mut host = VaultHost::open(dir.path(), "note.md").unwrap();
        host.select_str("old").unwrap();
        host.replace_selection("new").unwrap();

        let on_disk = fs::read_to_string(dir.path().join("note.md")).unwrap();
        assert_eq!(on_disk, "new words here");
    }
}
