//! JSON "blocks" format consumed by the quiz front end.
//!
//! A content sequence becomes a list of paragraph blocks, each an ordered
//! list of typed inlines. Asset paths are written relative to the test's
//! assets directory with `/` separators.

use crate::core::{ContentItem, ItemKind, TestQuestion};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

/// A typed run of content inside a paragraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inline {
    Text {
        text: String,
    },
    Image {
        src: Option<String>,
        alt: String,
    },
    Formula {
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        src: Option<String>,
        /// Linear text, shown when there is no image.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alt: Option<String>,
    },
    LineBreak,
}

impl Inline {
    fn empty_text() -> Self {
        Inline::Text {
            text: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Paragraph { inlines: Vec<Inline> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionPayload {
    pub id: usize,
    pub content: Content,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionPayload {
    pub id: usize,
    pub question: Content,
    pub options: Vec<OptionPayload>,
    pub correct: Content,
}

/// A persisted test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPayload {
    pub id: String,
    pub title: String,
    pub assets_base_url: String,
    pub questions: Vec<QuestionPayload>,
}

/// Summary of a test for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestMetadata {
    pub id: String,
    pub title: String,
    pub question_count: usize,
}

/// Path of an asset relative to `assets_dir`, or its file name when it lies
/// outside of it.
pub fn asset_src(path: &Path, assets_dir: Option<&Path>) -> String {
    let relative = match assets_dir {
        None => path,
        Some(dir) => match path.strip_prefix(dir) {
            Ok(relative) => relative,
            Err(_) => return file_name(path),
        },
    };
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::RootDir => Some(String::new()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Splits a content sequence into paragraph blocks.
///
/// Never returns an empty list, and never a paragraph without inlines.
pub fn content_items_to_blocks(items: &[ContentItem], assets_dir: Option<&Path>) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut inlines = Vec::new();

    fn flush(blocks: &mut Vec<Block>, inlines: &mut Vec<Inline>) {
        let mut paragraph = std::mem::take(inlines);
        if paragraph.is_empty() {
            paragraph.push(Inline::empty_text());
        }
        blocks.push(Block::Paragraph { inlines: paragraph });
    }

    for item in items {
        let src = item.path.as_deref().map(|p| asset_src(p, assets_dir));
        match item.kind {
            ItemKind::ParagraphBreak => flush(&mut blocks, &mut inlines),
            ItemKind::Text => inlines.push(Inline::Text {
                text: item.value.clone(),
            }),
            ItemKind::LineBreak => inlines.push(Inline::LineBreak),
            ItemKind::Image => inlines.push(Inline::Image {
                src,
                alt: String::new(),
            }),
            ItemKind::Formula => inlines.push(Inline::Formula {
                id: item.formula_id.clone(),
                src,
                alt: item.formula_text.clone(),
            }),
        }
    }
    if !inlines.is_empty() || blocks.is_empty() {
        flush(&mut blocks, &mut inlines);
    }
    blocks
}

fn content(items: &[ContentItem], assets_dir: Option<&Path>) -> Content {
    Content {
        blocks: content_items_to_blocks(items, assets_dir),
    }
}

/// Builds the payload of a test. Question and option ids are 1-based.
pub fn serialize_test_payload(
    test_id: &str,
    title: &str,
    questions: &[TestQuestion],
    assets_dir: Option<&Path>,
) -> TestPayload {
    let questions = questions
        .iter()
        .enumerate()
        .map(|(index, question)| QuestionPayload {
            id: index + 1,
            question: content(&question.question, assets_dir),
            options: question
                .options
                .iter()
                .enumerate()
                .map(|(option_index, option)| OptionPayload {
                    id: option_index + 1,
                    content: content(&option.content, assets_dir),
                    is_correct: option.is_correct,
                })
                .collect(),
            correct: content(&question.correct, assets_dir),
        })
        .collect();

    TestPayload {
        id: test_id.to_string(),
        title: title.to_string(),
        assets_base_url: format!("/api/tests/{}/assets", test_id),
        questions,
    }
}

pub fn serialize_metadata(payload: &TestPayload) -> TestMetadata {
    TestMetadata {
        id: payload.id.clone(),
        title: payload.title.clone(),
        question_count: payload.questions.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TestOption;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn test_paragraph_breaks_split_blocks() {
        let items = vec![
            ContentItem::text("a"),
            ContentItem::line_break(),
            ContentItem::text("b"),
            ContentItem::paragraph_break(),
            ContentItem::paragraph_break(),
            ContentItem::text("c"),
        ];
        let blocks = content_items_to_blocks(&items, None);
        assert_eq!(
            serde_json::to_value(&blocks).unwrap(),
            json!([
                {"type": "paragraph", "inlines": [
                    {"type": "text", "text": "a"},
                    {"type": "line_break"},
                    {"type": "text", "text": "b"}
                ]},
                {"type": "paragraph", "inlines": [{"type": "text", "text": ""}]},
                {"type": "paragraph", "inlines": [{"type": "text", "text": "c"}]}
            ])
        );
    }

    #[test]
    fn test_empty_sequence_yields_one_empty_paragraph() {
        assert_eq!(
            content_items_to_blocks(&[], None),
            vec![Block::Paragraph {
                inlines: vec![Inline::empty_text()]
            }]
        );
    }

    #[test]
    fn test_trailing_paragraph_break_adds_no_block() {
        let items = vec![ContentItem::text("a"), ContentItem::paragraph_break()];
        assert_eq!(content_items_to_blocks(&items, None).len(), 1);
    }

    #[test]
    fn test_asset_paths_are_relative() {
        let assets = PathBuf::from("/data/tests/t1/assets");
        let items = vec![
            ContentItem::image(assets.join("rId5.png")),
            ContentItem::image("/elsewhere/rId6.png"),
            ContentItem::formula("omml_000001", None),
            ContentItem {
                path: Some(assets.join("sub").join("omml_000002.png")),
                ..ContentItem::formula("omml_000002", Some("x".into()))
            },
        ];
        let blocks = content_items_to_blocks(&items, Some(assets.as_path()));
        assert_eq!(
            serde_json::to_value(&blocks).unwrap(),
            json!([{"type": "paragraph", "inlines": [
                {"type": "image", "src": "rId5.png", "alt": ""},
                {"type": "image", "src": "rId6.png", "alt": ""},
                {"type": "formula", "id": "omml_000001"},
                {"type": "formula", "id": "omml_000002", "src": "sub/omml_000002.png", "alt": "x"}
            ]}])
        );
    }

    #[test]
    fn test_payload_shape() {
        let mut correct = TestOption::new(vec![ContentItem::text("4")]);
        correct.is_correct = true;
        let question = TestQuestion {
            question: vec![ContentItem::text("2+2?")],
            correct: correct.content.clone(),
            options: vec![correct, TestOption::new(vec![ContentItem::text("5")])],
        };
        let payload = serialize_test_payload("abc", "Math", &[question], None);
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "id": "abc",
                "title": "Math",
                "assetsBaseUrl": "/api/tests/abc/assets",
                "questions": [{
                    "id": 1,
                    "question": {"blocks": [{"type": "paragraph", "inlines": [{"type": "text", "text": "2+2?"}]}]},
                    "options": [
                        {"id": 1, "content": {"blocks": [{"type": "paragraph", "inlines": [{"type": "text", "text": "4"}]}]}, "isCorrect": true},
                        {"id": 2, "content": {"blocks": [{"type": "paragraph", "inlines": [{"type": "text", "text": "5"}]}]}, "isCorrect": false}
                    ],
                    "correct": {"blocks": [{"type": "paragraph", "inlines": [{"type": "text", "text": "4"}]}]}
                }]
            })
        );
        assert_eq!(
            serialize_metadata(&payload),
            TestMetadata {
                id: "abc".into(),
                title: "Math".into(),
                question_count: 1,
            }
        );
    }
}
