//! Quiz extraction from Word tables.
//!
//! Every top-level table with at least three rows of content is a question:
//! the first row holds the question, the following rows the options. Images
//! are written to the assets directory up front, formulas are rendered after
//! the tables are parsed.

mod image;
mod marker;
mod table;

pub use self::image::{ImageExtractor, ImageMap};
pub use self::marker::{build_question, strip_marker};
pub use self::table::{Admission, TableParser};

use crate::adapters::docx::{parse_body, DocxPackage};
use crate::config::ToolConfig;
use crate::convert::{legacy, MetafileConverter};
use crate::core::TestQuestion;
use crate::formula::{attach_rendered, FormulaRenderer};
use crate::{ExtractOptions, Result};
use std::path::PathBuf;

/// Result of one extraction run.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub questions: Vec<TestQuestion>,
    /// Short human-readable progress notes.
    pub logs: Vec<String>,
}

/// Extracts the questions of one document.
pub struct WordTestExtractor {
    path: PathBuf,
    options: ExtractOptions,
    tools: ToolConfig,
}

impl WordTestExtractor {
    pub fn new(path: impl Into<PathBuf>, options: ExtractOptions, tools: ToolConfig) -> Self {
        Self {
            path: path.into(),
            options,
            tools,
        }
    }

    /// Runs the extraction.
    ///
    /// Fails only when the document cannot be opened; bad tables, unresolved
    /// images and unrendered formulas are degraded and noted in the logs.
    pub fn extract(&self) -> Result<Extraction> {
        log::info!("=== EXTRACT START: {} ===", self.path.display());
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut logs = vec![format!("File: {}", file_name)];

        let scratch = tempfile::tempdir()?;
        let docx_path = legacy::prepare_document(&self.path, scratch.path(), &self.tools)?;
        let mut package = DocxPackage::open(&docx_path)?;
        let body = parse_body(&package.document_xml()?)?;
        log::info!("Document loaded. Tables: {}", body.tables.len());

        let assets_dir = &self.options.assets_dir;
        let converter = MetafileConverter::from_config(&self.tools);
        let images = ImageExtractor::new(assets_dir, &converter).extract(&mut package)?;
        logs.push(format!("Images extracted: {}", images.count));

        let parser = TableParser::new(&images, &self.options.formula_placeholder);
        let mut questions = Vec::new();
        let mut tables_used = 0;

        for (index, table) in body.tables.iter().enumerate() {
            let number = index + 1;
            log::debug!("Table {}: rows={}", number, table.rows.len());
            let skipped = match Admission::of(table) {
                Admission::Accepted => None,
                Admission::TooFewRows => Some("fewer than 3 rows"),
                Admission::TooFewContentRows => Some("fewer than 3 rows with content"),
            };
            if let Some(reason) = skipped {
                if self.options.log_small_tables {
                    logs.push(format!("Table {}: {}, skipped", number, reason));
                }
                continue;
            }

            tables_used += 1;
            let Some(question) = build_question(parser.rows(table), &self.options.marker) else {
                log::debug!("Table {}: fewer than 2 rows after parsing, skipped", number);
                continue;
            };
            questions.push(question);
            if questions.len() % 25 == 0 {
                log::info!("Extracted questions so far: {}", questions.len());
            }
        }

        log::info!("Tables used: {} / {}", tables_used, body.tables.len());
        log::info!("Total tests extracted: {}", questions.len());
        logs.push(format!("Tables processed: {}", tables_used));
        logs.push(format!("Questions extracted: {}", questions.len()));

        if self.options.render_formulas && !body.formulas.is_empty() {
            let rendered = FormulaRenderer::new(&self.tools, assets_dir)
                .render_all(&docx_path, &body.formulas);
            let attached = attach_rendered(&mut questions, assets_dir, &converter);
            log::info!("Formula items with an image: {}", attached);
            logs.push(format!(
                "Formulas rendered: {} / {}",
                rendered.len(),
                body.formulas.len()
            ));
        }

        log::info!("=== EXTRACT END ===");
        Ok(Extraction { questions, logs })
    }
}
