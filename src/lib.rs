//! # wordquiz
//!
//! Extracts multiple-choice tests from Word documents where every question is
//! a table: the first row holds the question, the following rows the answer
//! options. A marker symbol in front of an option flags it as correct.
//!
//! ## Example
//!
//! ```no_run
//! use wordquiz::{ExtractOptions, ToolConfig, WordTestExtractor};
//!
//! let options = ExtractOptions {
//!     assets_dir: "./assets".into(),
//!     ..Default::default()
//! };
//!
//! let extractor = WordTestExtractor::new("quiz.docx", options, ToolConfig::from_env());
//! let extraction = extractor.extract().unwrap();
//! println!("{} questions", extraction.questions.len());
//! ```

pub mod adapters;
pub mod config;
pub mod convert;
pub mod core;
pub mod error;
pub mod extractor;
pub mod formula;
pub mod process;
pub mod render;

pub use config::{AutomationSettings, ToolConfig, ToolSpec};
pub use crate::core::{ContentItem, ItemKind, TestOption, TestQuestion};
pub use error::{Error, Result};
pub use extractor::{Extraction, WordTestExtractor};
pub use render::{serialize_metadata, serialize_test_payload, TestPayload};

use std::path::PathBuf;

/// Options of one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Prefix flagging the correct option. Empty disables marker detection.
    pub marker: String,
    /// Whether skipped tables are reported in the extraction logs.
    pub log_small_tables: bool,
    /// Directory receiving images and rendered formulas.
    pub assets_dir: PathBuf,
    /// Text standing in for pictures that cannot be resolved.
    pub formula_placeholder: String,
    pub render_formulas: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            marker: "*".to_string(),
            log_small_tables: false,
            assets_dir: PathBuf::from("assets"),
            formula_placeholder: "[formula]".to_string(),
            render_formulas: true,
        }
    }
}

// Python bindings (only when 'python' feature is enabled)
#[cfg(feature = "python")]
mod python_bindings {
    use super::*;
    use pyo3::prelude::*;

    /// Extracts a test and returns its JSON payload.
    #[pyfunction]
    #[pyo3(signature = (path, assets_dir, symbol="*", log_small_tables=false))]
    fn extract_test(
        path: String,
        assets_dir: String,
        symbol: &str,
        log_small_tables: bool,
    ) -> PyResult<String> {
        let options = ExtractOptions {
            marker: symbol.to_string(),
            log_small_tables,
            assets_dir: PathBuf::from(&assets_dir),
            ..Default::default()
        };
        let title = std::path::Path::new(&path)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let to_py = |e: Error| PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(e.to_string());

        let extraction = WordTestExtractor::new(&path, options, ToolConfig::from_env())
            .extract()
            .map_err(to_py)?;
        let test_id = uuid::Uuid::new_v4().simple().to_string();
        let payload = serialize_test_payload(
            &test_id,
            &title,
            &extraction.questions,
            Some(std::path::Path::new(&assets_dir)),
        );
        serde_json::to_string(&payload).map_err(|e| to_py(e.into()))
    }

    /// A Python module implemented in Rust.
    #[pymodule]
    pub fn wordquiz(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(extract_test, m)?)?;
        Ok(())
    }
}
