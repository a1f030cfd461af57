//! Source document adapters.

pub mod docx;
