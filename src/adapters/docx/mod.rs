//! OOXML (`.docx`) package reading.

pub mod body;
pub mod package;

pub use body::{parse_body, Body, Cell, Inline, MathRef, OmmlFragment, Row, Table};
pub use package::{DocxPackage, RelatedPart};
