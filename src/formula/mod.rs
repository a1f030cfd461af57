//! Rendering of OMML formulas to images.
//!
//! Formulas are identified by their 1-based position among all `m:oMath`
//! elements of the document body. Outputs are named `omml_NNNNNN.<ext>` in
//! the assets directory and double as the resume checkpoint, so an
//! interrupted run picks up where it stopped.

pub mod automation;
pub mod checkpoint;
pub mod headless;

use crate::adapters::docx::OmmlFragment;
use crate::config::ToolConfig;
use crate::convert::{is_metafile, is_nonempty_file, MetafileConverter};
use crate::core::{ItemKind, TestQuestion};
use automation::{render_resumable, WordHost};
use headless::HeadlessRenderer;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

pub const FORMULA_PREFIX: &str = "omml_";

/// Extensions looked up when attaching rendered formulas, by preference.
const RENDERED_EXTENSIONS: &[&str] = &["png", "svg", "emf", "wmf"];

/// Stable id of formula `index`, also the stem of its rendered file.
pub fn formula_id(index: usize) -> String {
    format!("{FORMULA_PREFIX}{index:06}")
}

/// Chooses between the automation host and the headless chain.
pub struct FormulaRenderer<'a> {
    tools: &'a ToolConfig,
    out_dir: PathBuf,
}

impl<'a> FormulaRenderer<'a> {
    pub fn new(tools: &'a ToolConfig, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            tools,
            out_dir: out_dir.into(),
        }
    }

    /// Renders the formulas of `docx`, returning the files produced.
    ///
    /// Automation is tried first when available; the headless chain runs
    /// when it is not, or when it produced nothing.
    pub fn render_all(&self, docx: &Path, formulas: &[OmmlFragment]) -> Vec<PathBuf> {
        if formulas.is_empty() {
            return Vec::new();
        }
        if let Err(err) = fs::create_dir_all(&self.out_dir) {
            log::warn!("Cannot create {}: {}", self.out_dir.display(), err);
            return Vec::new();
        }

        let automation = &self.tools.automation;
        if automation.enabled && WordHost::is_available(&self.tools.powershell_program) {
            let rendered = self.render_with_word(docx);
            if !rendered.is_empty() {
                log::info!("Word rendering finished. Total formula images: {}", rendered.len());
                return rendered;
            }
            log::info!("Word rendering produced no images, trying MathJax");
        }

        match HeadlessRenderer::detect(self.tools) {
            Some(renderer) => renderer.render_all(formulas, &self.out_dir),
            None => Vec::new(),
        }
    }

    fn render_with_word(&self, docx: &Path) -> Vec<PathBuf> {
        // Word locks the file it opens; work on a private copy.
        let copy_dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(err) => {
                log::warn!("Cannot create scratch directory: {}", err);
                return Vec::new();
            }
        };
        let file_name = docx
            .file_name()
            .unwrap_or_else(|| OsStr::new("document.docx"));
        let copy = copy_dir.path().join(file_name);
        if let Err(err) = fs::copy(docx, &copy) {
            log::warn!("Cannot copy {}: {}", docx.display(), err);
            return Vec::new();
        }
        let copy = fs::canonicalize(&copy).unwrap_or(copy);

        let mut host = WordHost::new(&self.tools.powershell_program, &copy, self.tools.tool_timeout);
        render_resumable(
            &mut host,
            &self.out_dir,
            &self.tools.automation,
            WordHost::EXTENSION,
        )
    }
}

/// Points formula items at their rendered files in `dir`.
///
/// PNG and SVG are used as is; EMF/WMF go through `converter` and are left
/// unattached when it fails. Returns the number of formula items attached.
pub fn attach_rendered(
    questions: &mut [TestQuestion],
    dir: &Path,
    converter: &MetafileConverter,
) -> usize {
    let mut resolved: HashMap<String, Option<PathBuf>> = HashMap::new();
    let mut attached = 0;

    for question in questions.iter_mut() {
        for content in question.content_mut() {
            for item in content.iter_mut().filter(|i| i.kind == ItemKind::Formula) {
                let Some(id) = item.formula_id.as_deref() else {
                    continue;
                };
                let path = resolved
                    .entry(id.to_string())
                    .or_insert_with(|| find_rendered(id, dir, converter))
                    .clone();
                if path.is_some() {
                    attached += 1;
                }
                item.path = path;
            }
        }
    }
    attached
}

fn find_rendered(id: &str, dir: &Path, converter: &MetafileConverter) -> Option<PathBuf> {
    let path = RENDERED_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{id}.{ext}")))
        .find(|path| is_nonempty_file(path))?;
    if is_metafile(&path) {
        converter.convert(&path, dir)
    } else {
        Some(path)
    }
}
