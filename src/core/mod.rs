//! Content model shared by the extractor and the renderer.

pub mod cell;
pub mod model;

pub use cell::CellContentBuilder;
pub use model::{ContentItem, ItemKind, TestOption, TestQuestion};
