//! Builder for the flat content sequence of a single table cell.

use super::model::ContentItem;
use std::path::PathBuf;

/// Accumulates the fragments of a cell in document order.
///
/// Consecutive text runs are merged into one text item. Any non-text item
/// flushes the pending text first, so the relative order of text, images,
/// and formulas matches the order in the document.
#[derive(Debug, Default)]
pub struct CellContentBuilder {
    items: Vec<ContentItem>,
    text: String,
}

impl CellContentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn push_image(&mut self, path: impl Into<PathBuf>) {
        self.flush_text();
        self.items.push(ContentItem::image(path));
    }

    /// Stands in for content that could not be resolved.
    pub fn push_placeholder(&mut self, token: &str) {
        self.flush_text();
        self.items.push(ContentItem::text(token));
    }

    pub fn push_formula(&mut self, formula_id: impl Into<String>, formula_text: Option<String>) {
        self.flush_text();
        self.items
            .push(ContentItem::formula(formula_id, formula_text));
    }

    pub fn push_line_break(&mut self) {
        self.flush_text();
        self.items.push(ContentItem::line_break());
    }

    pub fn finish_paragraph(&mut self) {
        self.flush_text();
        self.items.push(ContentItem::paragraph_break());
    }

    /// Returns the finished sequence: trailing breaks trimmed, never empty.
    pub fn finish(mut self) -> Vec<ContentItem> {
        self.flush_text();
        while self.items.last().is_some_and(|item| item.kind.is_break()) {
            self.items.pop();
        }
        if self.items.is_empty() {
            self.items.push(ContentItem::text(""));
        }
        self.items
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            let text = std::mem::take(&mut self.text);
            self.items.push(ContentItem::text(text));
        }
    }
}
