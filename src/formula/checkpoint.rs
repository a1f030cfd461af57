//! Resume bookkeeping for formula rendering.
//!
//! Rendered files are the only checkpoint: a formula counts as done when
//! `<prefix><NNNNNN>.<ext>` exists with non-zero size.

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

/// Output file name of formula `index`.
pub fn file_name(prefix: &str, index: usize, ext: &str) -> String {
    format!("{prefix}{index:06}.{ext}")
}

/// Whether formula `index` already has a non-empty output.
pub fn is_done(dir: &Path, prefix: &str, index: usize, ext: &str) -> bool {
    crate::convert::is_nonempty_file(&dir.join(file_name(prefix, index, ext)))
}

/// Completed outputs in `dir`, sorted by index.
pub fn rendered_files(dir: &Path, prefix: &str, ext: &str) -> Vec<(usize, PathBuf)> {
    let Ok(pattern) = Regex::new(&format!(
        r"^{}(\d+)\.{}$",
        regex::escape(prefix),
        regex::escape(ext)
    )) else {
        return Vec::new();
    };
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<(usize, PathBuf)> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let index = pattern.captures(&name)?.get(1)?.as_str().parse().ok()?;
            let path = entry.path();
            crate::convert::is_nonempty_file(&path).then_some((index, path))
        })
        .collect();
    files.sort();
    files
}

/// Index to resume from: one past the highest completed index, 1 when none.
pub fn next_index(dir: &Path, prefix: &str, ext: &str) -> usize {
    rendered_files(dir, prefix, ext)
        .last()
        .map_or(1, |(index, _)| index + 1)
}
