use crate::adapters::docx::DocxPackage;
use crate::convert::MetafileConverter;
use crate::Result;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes the image parts of a package into the assets directory.
pub struct ImageExtractor<'a> {
    assets_dir: &'a Path,
    converter: &'a MetafileConverter,
}

/// Extracted images, keyed by relationship id.
#[derive(Debug, Default)]
pub struct ImageMap {
    pub paths: HashMap<String, PathBuf>,
    /// Number of parts written.
    pub count: usize,
}

impl ImageMap {
    pub fn get(&self, rel_id: &str) -> Option<&Path> {
        self.paths.get(rel_id).map(PathBuf::as_path)
    }
}

impl<'a> ImageExtractor<'a> {
    pub fn new(assets_dir: &'a Path, converter: &'a MetafileConverter) -> Self {
        Self {
            assets_dir,
            converter,
        }
    }

    /// Writes `<assets_dir>/<rId><ext>` for every image relationship.
    ///
    /// WMF/EMF parts are converted to PNG when possible; the original file is
    /// kept otherwise. A part that cannot be read is logged and skipped.
    pub fn extract(&self, package: &mut DocxPackage) -> Result<ImageMap> {
        fs::create_dir_all(self.assets_dir)?;
        let mut map = ImageMap::default();
        // Several relationships may point at one part.
        let mut written: HashMap<String, PathBuf> = HashMap::new();

        for part in package.image_parts() {
            if let Some(path) = written.get(&part.part_name) {
                map.paths.insert(part.rel_id, path.clone());
                continue;
            }

            let data = match package.read_part(&part.part_name) {
                Ok(data) => data,
                Err(err) => {
                    log::warn!("Skipping image {} ({}): {}", part.rel_id, part.part_name, err);
                    continue;
                }
            };
            let ext = Path::new(&part.part_name)
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy()))
                .unwrap_or_default();
            let path = self.assets_dir.join(format!("{}{}", part.rel_id, ext));
            if let Err(err) = fs::write(&path, &data) {
                log::warn!("Cannot write {}: {}", path.display(), err);
                continue;
            }

            let path = self.converter.convert(&path, self.assets_dir).unwrap_or(path);
            written.insert(part.part_name, path.clone());
            map.paths.insert(part.rel_id, path);
            map.count += 1;
        }

        log::info!("Extracted embedded images: {}", map.count);
        Ok(map)
    }
}
