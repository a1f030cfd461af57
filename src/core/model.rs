//! In-memory representation of extracted quiz content.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Kind of a content fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Text,
    Image,
    Formula,
    LineBreak,
    ParagraphBreak,
}

impl ItemKind {
    /// Whether this kind separates content rather than carrying it.
    pub fn is_break(self) -> bool {
        matches!(self, ItemKind::LineBreak | ItemKind::ParagraphBreak)
    }
}

/// One fragment of content within a table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub kind: ItemKind,
    /// Raw text for `Text` items.
    #[serde(default)]
    pub value: String,
    /// Correlates a `Formula` item with its rendered image.
    #[serde(default)]
    pub formula_id: Option<String>,
    /// Asset file for `Image` items and rendered `Formula` items.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Linear text of a formula, used when no image is available.
    #[serde(default)]
    pub formula_text: Option<String>,
}

impl ContentItem {
    fn bare(kind: ItemKind) -> Self {
        Self {
            kind,
            value: String::new(),
            formula_id: None,
            path: None,
            formula_text: None,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::bare(ItemKind::Text)
        }
    }

    pub fn image(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::bare(ItemKind::Image)
        }
    }

    pub fn formula(formula_id: impl Into<String>, formula_text: Option<String>) -> Self {
        Self {
            formula_id: Some(formula_id.into()),
            formula_text,
            ..Self::bare(ItemKind::Formula)
        }
    }

    pub fn line_break() -> Self {
        Self::bare(ItemKind::LineBreak)
    }

    pub fn paragraph_break() -> Self {
        Self::bare(ItemKind::ParagraphBreak)
    }

    pub fn is_text(&self) -> bool {
        self.kind == ItemKind::Text
    }
}

/// An answer option of a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOption {
    pub content: Vec<ContentItem>,
    pub is_correct: bool,
}

impl TestOption {
    pub fn new(content: Vec<ContentItem>) -> Self {
        Self {
            content,
            is_correct: false,
        }
    }
}

/// A question extracted from one quiz table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestQuestion {
    pub question: Vec<ContentItem>,
    /// Content of the correct option, duplicated for convenience.
    pub correct: Vec<ContentItem>,
    pub options: Vec<TestOption>,
}

impl TestQuestion {
    /// Returns the first option flagged as correct.
    pub fn correct_option(&self) -> Option<&TestOption> {
        self.options.iter().find(|option| option.is_correct)
    }

    /// Iterates over every content sequence of the question mutably.
    pub fn content_mut(&mut self) -> impl Iterator<Item = &mut Vec<ContentItem>> {
        std::iter::once(&mut self.question)
            .chain(std::iter::once(&mut self.correct))
            .chain(self.options.iter_mut().map(|option| &mut option.content))
    }
}
