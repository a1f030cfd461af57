//! Legacy `.doc` input.

use crate::config::ToolConfig;
use crate::process::{describe, run_with_timeout};
use crate::{error::Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const INSTALL_HINT: &str = "Cannot convert .doc file: install LibreOffice (soffice)";

/// Returns a `.docx` path for `path`, converting legacy `.doc` files into
/// `scratch_dir` with the office suite.
///
/// A `.docx` sitting next to the `.doc` is reused as is.
pub fn prepare_document(path: &Path, scratch_dir: &Path, tools: &ToolConfig) -> Result<PathBuf> {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "docx" => Ok(path.to_path_buf()),
        "doc" => {
            let sibling = path.with_extension("docx");
            if sibling.is_file() {
                log::info!("Reusing converted document {}", sibling.display());
                return Ok(sibling);
            }
            convert_doc(path, scratch_dir, tools)
        }
        _ => Err(Error::UnsupportedFormat(format!(
            "{} (expected .docx or .doc)",
            path.display()
        ))),
    }
}

fn convert_doc(path: &Path, scratch_dir: &Path, tools: &ToolConfig) -> Result<PathBuf> {
    let program = which::which(&tools.office_program)
        .map_err(|_| Error::MissingTool(INSTALL_HINT.to_string()))?;
    let out_dir = scratch_dir.join("docx");
    fs::create_dir_all(&out_dir)?;

    let mut command = Command::new(program);
    command
        .args(["--headless", "--convert-to", "docx", "--outdir"])
        .arg(&out_dir)
        .arg(path);
    log::info!("Converting {} with `{}`", path.display(), describe(&command));

    match run_with_timeout(command, None, tools.tool_timeout) {
        Ok(output) if output.status.success() => {}
        Ok(output) => {
            log::warn!(
                "Office conversion failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Err(Error::MissingTool(INSTALL_HINT.to_string()));
        }
        Err(err) => {
            log::warn!("Office conversion failed: {}", err);
            return Err(Error::MissingTool(INSTALL_HINT.to_string()));
        }
    }

    newest_docx(&out_dir)?.ok_or_else(|| {
        Error::UnsupportedFormat(format!(
            "conversion of {} produced no .docx",
            path.display()
        ))
    })
}

fn newest_docx(dir: &Path) -> Result<Option<PathBuf>> {
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_docx = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("docx"));
        if !is_docx {
            continue;
        }
        let modified = fs::metadata(&path)?.modified()?;
        if newest.as_ref().map_or(true, |(time, _)| modified >= *time) {
            newest = Some((modified, path));
        }
    }
    Ok(newest.map(|(_, path)| path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docx_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = Path::new("quiz.DOCX");
        let prepared = prepare_document(path, dir.path(), &ToolConfig::offline()).unwrap();
        assert_eq!(prepared, path);
    }

    #[test]
    fn test_sibling_docx_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("quiz.doc");
        fs::write(&doc, b"legacy").unwrap();
        fs::write(dir.path().join("quiz.docx"), b"converted").unwrap();
        let prepared = prepare_document(&doc, dir.path(), &ToolConfig::offline()).unwrap();
        assert_eq!(prepared, dir.path().join("quiz.docx"));
    }

    #[test]
    fn test_doc_without_office_suite_is_missing_tool() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("quiz.doc");
        fs::write(&doc, b"legacy").unwrap();
        let tools = ToolConfig {
            office_program: "wordquiz-no-such-office".to_string(),
            ..ToolConfig::offline()
        };
        let err = prepare_document(&doc, dir.path(), &tools).unwrap_err();
        assert!(matches!(err, Error::MissingTool(msg) if msg.contains("soffice")));
    }

    #[test]
    fn test_other_suffix_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let err = prepare_document(Path::new("quiz.pdf"), dir.path(), &ToolConfig::offline())
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn test_newest_docx_is_picked() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(newest_docx(dir.path()).unwrap(), None);
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::write(dir.path().join("quiz.docx"), b"x").unwrap();
        assert_eq!(
            newest_docx(dir.path()).unwrap(),
            Some(dir.path().join("quiz.docx"))
        );
    }
}
