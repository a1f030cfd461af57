//! Error types for quiz extraction.

use thiserror::Error;

/// Errors that abort an extraction run.
///
/// Anything that can be replaced by a placeholder (a bad table, an unresolved
/// image, a formula no tool could render) is logged instead of surfacing here.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error while reading the document or writing assets.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The document package is not a readable zip archive.
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The document could not be parsed as a Word document.
    #[error("Failed to open Word document: {0}")]
    DocxParse(String),

    /// A mandatory XML part is malformed.
    #[error("XML error: {0}")]
    Xml(String),

    /// The input file type is not handled.
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// A required external tool is not installed.
    #[error("{0}")]
    MissingTool(String),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;
