mod common;

use common::*;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wordquiz::{
    serialize_test_payload, ContentItem, Error, ExtractOptions, Extraction, ItemKind, ToolConfig,
    WordTestExtractor,
};

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn assets(&self) -> PathBuf {
        self.dir.path().join("assets")
    }

    fn docx(&self, builder: DocxBuilder) -> PathBuf {
        let path = self.dir.path().join("quiz.docx");
        builder.write(&path);
        path
    }

    fn options(&self) -> ExtractOptions {
        ExtractOptions {
            assets_dir: self.assets(),
            render_formulas: false,
            ..Default::default()
        }
    }

    fn extract_with(&self, path: &Path, options: ExtractOptions) -> wordquiz::Result<Extraction> {
        WordTestExtractor::new(path, options, ToolConfig::offline()).extract()
    }

    fn extract(&self, builder: DocxBuilder) -> Extraction {
        let path = self.docx(builder);
        self.extract_with(&path, self.options()).unwrap()
    }
}

fn texts(items: &[ContentItem]) -> Vec<&str> {
    items.iter().map(|item| item.value.as_str()).collect()
}

#[test]
fn test_default_row_is_correct_without_marker() {
    let fixture = Fixture::new();
    let extraction =
        fixture.extract(DocxBuilder::new().body(&text_table(&["What is 2+2?", "4", "5"])));

    assert_eq!(extraction.questions.len(), 1);
    let question = &extraction.questions[0];
    assert_eq!(texts(&question.question), vec!["What is 2+2?"]);
    assert_eq!(question.options.len(), 2);
    assert!(question.options[0].is_correct);
    assert!(!question.options[1].is_correct);
    assert_eq!(texts(&question.options[0].content), vec!["4"]);
    assert_eq!(question.correct, question.options[0].content);
    assert_eq!(
        extraction.logs,
        vec![
            "File: quiz.docx",
            "Images extracted: 0",
            "Tables processed: 1",
            "Questions extracted: 1",
        ]
    );
}

#[test]
fn test_marker_on_other_row_wins() {
    let fixture = Fixture::new();
    let extraction =
        fixture.extract(DocxBuilder::new().body(&text_table(&["What is 2+2?", "4", "*5"])));

    let question = &extraction.questions[0];
    assert!(!question.options[0].is_correct);
    assert!(question.options[1].is_correct);
    assert_eq!(texts(&question.options[1].content), vec!["5"]);
    assert_eq!(texts(&question.correct), vec!["5"]);
}

#[test]
fn test_image_only_cell_yields_one_image() {
    let fixture = Fixture::new();
    let rows = vec![
        row(&[para(&run("Which one is red?"))]),
        row(&[para(&picture("rId5"))]),
        row(&[para(&run("none"))]),
    ];
    let extraction = fixture.extract(
        DocxBuilder::new()
            .body(&table(&rows))
            .media("rId5", "image1.png", png_bytes()),
    );

    let expected = fixture.assets().join("rId5.png");
    assert!(expected.is_file());
    assert_eq!(extraction.logs[1], "Images extracted: 1");
    let option = &extraction.questions[0].options[0];
    assert_eq!(option.content, vec![ContentItem::image(&expected)]);

    let payload = serialize_test_payload(
        "t1",
        "quiz",
        &extraction.questions,
        Some(fixture.assets().as_path()),
    );
    let json = serde_json::to_value(&payload).unwrap();
    assert_eq!(
        json["questions"][0]["options"][0]["content"]["blocks"][0]["inlines"][0],
        serde_json::json!({"type": "image", "src": "rId5.png", "alt": ""})
    );
}

#[test]
fn test_formula_keeps_document_order() {
    let fixture = Fixture::new();
    let question_cell = para(&format!("{}{}{}", run("Solve "), math("x+1=2"), run(" for x")));
    let rows = vec![
        row(&[question_cell]),
        row(&[para(&run("1"))]),
        row(&[para(&run("2"))]),
    ];
    let extraction = fixture.extract(DocxBuilder::new().body(&table(&rows)));

    let question = &extraction.questions[0].question;
    let kinds: Vec<ItemKind> = question.iter().map(|item| item.kind).collect();
    assert_eq!(kinds, vec![ItemKind::Text, ItemKind::Formula, ItemKind::Text]);
    assert_eq!(question[1].formula_id.as_deref(), Some("omml_000001"));
    assert_eq!(question[1].formula_text.as_deref(), Some("x+1=2"));
    assert_eq!(question[1].path, None);

    let payload = serialize_test_payload("t1", "quiz", &extraction.questions, None);
    let json = serde_json::to_value(&payload).unwrap();
    assert_eq!(
        json["questions"][0]["question"]["blocks"][0]["inlines"][1],
        serde_json::json!({"type": "formula", "id": "omml_000001", "alt": "x+1=2"})
    );
}

#[test]
fn test_small_tables_are_skipped_and_logged() {
    let fixture = Fixture::new();
    let path = fixture.docx(
        DocxBuilder::new()
            .body(&text_table(&["Q", "A"]))
            .body(&text_table(&["Q", "A", ""])),
    );
    let options = ExtractOptions {
        log_small_tables: true,
        ..fixture.options()
    };
    let extraction = fixture.extract_with(&path, options).unwrap();

    assert!(extraction.questions.is_empty());
    assert_eq!(
        extraction.logs,
        vec![
            "File: quiz.docx",
            "Images extracted: 0",
            "Table 1: fewer than 3 rows, skipped",
            "Table 2: fewer than 3 rows with content, skipped",
            "Tables processed: 0",
            "Questions extracted: 0",
        ]
    );
}

#[test]
fn test_unconvertible_metafile_keeps_original() {
    let fixture = Fixture::new();
    let rows = vec![
        row(&[para(&run("Diagram?"))]),
        row(&[para(&picture("rId7"))]),
        row(&[para(&run("no"))]),
    ];
    let extraction = fixture.extract(
        DocxBuilder::new()
            .body(&table(&rows))
            .media("rId7", "image2.emf", vec![1, 0, 0, 0, 0x6c, 0, 0, 0]),
    );

    let original = fixture.assets().join("rId7.emf");
    assert!(original.is_file());
    assert!(!fixture.assets().join("rId7.png").exists());
    assert_eq!(
        extraction.questions[0].options[0].content,
        vec![ContentItem::image(&original)]
    );
}

#[test]
fn test_extraction_is_repeatable() {
    let fixture = Fixture::new();
    let path = fixture.docx(DocxBuilder::new().body(&text_table(&["Q", "*a", "b", "c"])));
    let first = fixture.extract_with(&path, fixture.options()).unwrap();
    let second = fixture.extract_with(&path, fixture.options()).unwrap();
    assert_eq!(first.questions, second.questions);
    assert_eq!(first.questions[0].options.len(), 3);
    assert_eq!(
        first.questions[0]
            .options
            .iter()
            .filter(|option| option.is_correct)
            .count(),
        1
    );
}

#[test]
fn test_unsupported_suffix_is_fatal() {
    let fixture = Fixture::new();
    let path = fixture.dir.path().join("quiz.txt");
    fs::write(&path, "not a document").unwrap();
    let err = fixture.extract_with(&path, fixture.options()).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat(_)));
}

#[test]
fn test_corrupt_docx_is_fatal() {
    let fixture = Fixture::new();
    let path = fixture.dir.path().join("broken.docx");
    fs::write(&path, "definitely not a zip archive").unwrap();
    let err = fixture.extract_with(&path, fixture.options()).unwrap_err();
    assert!(matches!(err, Error::DocxParse(_) | Error::Zip(_)));
}
