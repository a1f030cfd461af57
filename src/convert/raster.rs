use super::{ConvertError, ConvertStrategy};
use image::ImageFormat;
use std::fs;
use std::path::Path;

/// Decodes the picture with the `image` crate and re-encodes it as PNG.
///
/// Succeeds only when the metafile part actually carries a raster payload,
/// which some producers emit under a `.wmf`/`.emf` name.
pub struct RasterReencode;

impl ConvertStrategy for RasterReencode {
    fn name(&self) -> &str {
        "raster"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let data = fs::read(input)?;
        let format = image::guess_format(&data)?;
        let img = image::load_from_memory_with_format(&data, format)?;
        img.save_with_format(output, ImageFormat::Png)?;
        Ok(())
    }
}
