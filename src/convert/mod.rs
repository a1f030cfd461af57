//! Best-effort rasterization of vector metafiles.
//!
//! WMF/EMF pictures have no portable renderer, so conversion walks a list of
//! strategies and takes the first one that produces a PNG: GDI+ on Windows,
//! raster re-encode, local command-line tools, then a remote API. Failure of every strategy is not
//! an error for the caller: the original file is kept.

mod cloud;
mod external;
mod gdiplus;
pub mod legacy;
mod raster;

pub use self::cloud::CloudConvert;
pub use self::external::ExternalTool;
pub use self::gdiplus::GdiPlusMetafile;
pub use self::raster::RasterReencode;

use crate::config::ToolConfig;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Extensions routed through the converter.
pub const METAFILE_EXTENSIONS: &[&str] = &["wmf", "emf"];

/// Why a single conversion attempt failed.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("no output produced at {0}")]
    NoOutput(PathBuf),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote conversion failed: {0}")]
    Remote(String),

    #[error("render error: {0}")]
    Render(String),
}

/// One way of turning a metafile into a PNG.
pub trait ConvertStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the strategy can run on this host.
    fn is_available(&self) -> bool;

    /// Converts `input`, writing the PNG to `output`.
    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError>;
}

/// Whether `path` has a metafile extension.
pub fn is_metafile(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| METAFILE_EXTENSIONS.contains(&ext.as_str()))
}

/// Whether `path` is a file with content.
pub fn is_nonempty_file(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|meta| meta.is_file() && meta.len() > 0)
}

/// Ordered list of conversion strategies.
pub struct MetafileConverter {
    strategies: Vec<Box<dyn ConvertStrategy>>,
}

impl MetafileConverter {
    pub fn new(strategies: Vec<Box<dyn ConvertStrategy>>) -> Self {
        Self { strategies }
    }

    /// Builds the strategy list described by `config`.
    pub fn from_config(config: &ToolConfig) -> Self {
        let mut strategies: Vec<Box<dyn ConvertStrategy>> = vec![
            Box::new(GdiPlusMetafile::new(&config.powershell_program, config.tool_timeout)),
            Box::new(RasterReencode),
        ];
        for spec in &config.converters {
            strategies.push(Box::new(ExternalTool::new(spec.clone(), config.tool_timeout)));
        }
        if let Some(key) = &config.cloudconvert_api_key {
            strategies.push(Box::new(CloudConvert::new(
                key.clone(),
                config.cloudconvert_base_url.clone(),
                config.tool_timeout,
            )));
        }
        Self::new(strategies)
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Converts a WMF/EMF file to `<out_dir>/<stem>.png`.
    ///
    /// Returns `None` for other file types and when no strategy succeeds.
    /// An existing non-empty output is reused.
    pub fn convert(&self, path: &Path, out_dir: &Path) -> Option<PathBuf> {
        if !is_metafile(path) {
            return None;
        }
        let stem = path.file_stem()?.to_string_lossy().into_owned();
        let output = out_dir.join(format!("{}.png", stem));
        if is_nonempty_file(&output) {
            return Some(output);
        }
        if let Err(err) = fs::create_dir_all(out_dir) {
            log::warn!("Cannot create {}: {}", out_dir.display(), err);
            return None;
        }

        for strategy in self.strategies.iter().filter(|s| s.is_available()) {
            match strategy.convert(path, &output) {
                Ok(()) if is_nonempty_file(&output) => {
                    log::info!(
                        "Converted metafile {} to {} with {}",
                        path.display(),
                        output.display(),
                        strategy.name()
                    );
                    return Some(output);
                }
                Ok(()) => log::warn!(
                    "{} reported success but wrote nothing for {}",
                    strategy.name(),
                    path.display()
                ),
                Err(err) => log::warn!(
                    "{} could not convert {}: {}",
                    strategy.name(),
                    path.display(),
                    err
                ),
            }
        }

        log::info!("Metafile conversion unavailable for {}", path.display());
        None
    }
}
