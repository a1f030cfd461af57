//! Access to the parts of a `.docx` package.

use crate::{error::Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use rs_docx::DocxFile;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

const DOCUMENT_PART: &str = "word/document.xml";
const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// A binary part referenced from the main document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedPart {
    pub rel_id: String,
    /// Zip entry name, e.g. `word/media/image1.png`.
    pub part_name: String,
    pub content_type: String,
}

/// An opened Word document package.
pub struct DocxPackage {
    archive: ZipArchive<File>,
    rels: HashMap<String, String>,
    content_types: ContentTypes,
}

impl DocxPackage {
    /// Opens and validates a `.docx` file.
    ///
    /// Fails when the file is not a Word package. The document body itself is
    /// read later by [`parse_body`](super::parse_body), so only the package
    /// structure is checked here.
    pub fn open(path: &Path) -> Result<Self> {
        DocxFile::from_file(path).map_err(|e| Error::DocxParse(format!("{:?}", e)))?;

        let mut archive = ZipArchive::new(File::open(path)?)?;
        let rels = match read_text(&mut archive, DOCUMENT_RELS_PART)? {
            Some(xml) => parse_relationships(&xml)?,
            None => HashMap::new(),
        };
        let content_types = match read_text(&mut archive, CONTENT_TYPES_PART)? {
            Some(xml) => ContentTypes::parse(&xml)?,
            None => ContentTypes::default(),
        };

        Ok(Self {
            archive,
            rels,
            content_types,
        })
    }

    pub fn document_xml(&mut self) -> Result<String> {
        read_text(&mut self.archive, DOCUMENT_PART)?
            .ok_or_else(|| Error::DocxParse(format!("missing {}", DOCUMENT_PART)))
    }

    /// Parts related to the main document whose content type is an image.
    ///
    /// Sorted by relationship id so that extraction order is stable.
    pub fn image_parts(&self) -> Vec<RelatedPart> {
        let mut parts: Vec<RelatedPart> = self
            .rels
            .iter()
            .filter(|(_, target)| !target.contains("://"))
            .filter_map(|(rel_id, target)| {
                let part_name = resolve_target(target);
                let content_type = self.content_types.lookup(&part_name)?;
                content_type.contains("image").then(|| RelatedPart {
                    rel_id: rel_id.clone(),
                    part_name,
                    content_type: content_type.to_string(),
                })
            })
            .collect();
        parts.sort_by(|a, b| a.rel_id.cmp(&b.rel_id));
        parts
    }

    pub fn read_part(&mut self, part_name: &str) -> Result<Vec<u8>> {
        let mut file = self.archive.by_name(part_name)?;
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)?;
        Ok(data)
    }
}

/// Relationship id to target of the internal relationships in a `.rels` part.
fn parse_relationships(xml: &str) -> Result<HashMap<String, String>> {
    let mut rels = HashMap::new();
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut id = None;
                let mut target = None;
                let mut external = false;
                for attr in e.attributes().flatten() {
                    let value = attr
                        .unescape_value()
                        .map(|v| v.into_owned())
                        .unwrap_or_default();
                    match attr.key.as_ref() {
                        b"Id" => id = Some(value),
                        b"Target" => target = Some(value),
                        b"TargetMode" => external = value.eq_ignore_ascii_case("External"),
                        _ => {}
                    }
                }
                if let (Some(id), Some(target), false) = (id, target, external) {
                    rels.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(rels)
}

fn read_text(archive: &mut ZipArchive<File>, name: &str) -> Result<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(f) => f,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(Error::Zip(e)),
    };
    let mut buf = String::new();
    file.read_to_string(&mut buf)?;
    Ok(Some(buf))
}

/// Resolves a document relationship target to a zip entry name.
fn resolve_target(target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("word/{}", target),
    };
    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// `[Content_Types].xml`: defaults by extension, overrides by part name.
#[derive(Debug, Default)]
struct ContentTypes {
    defaults: HashMap<String, String>,
    overrides: HashMap<String, String>,
}

impl ContentTypes {
    fn parse(xml: &str) -> Result<Self> {
        let mut types = Self::default();
        let mut reader = Reader::from_str(xml);
        loop {
            match reader.read_event()? {
                Event::Start(e) | Event::Empty(e) => {
                    let mut key = None;
                    let mut content_type = None;
                    for attr in e.attributes().flatten() {
                        let value = attr
                            .unescape_value()
                            .map(|v| v.into_owned())
                            .unwrap_or_default();
                        match attr.key.as_ref() {
                            b"Extension" | b"PartName" => key = Some(value),
                            b"ContentType" => content_type = Some(value),
                            _ => {}
                        }
                    }
                    let (Some(key), Some(content_type)) = (key, content_type) else {
                        continue;
                    };
                    match e.local_name().as_ref() {
                        b"Default" => {
                            types.defaults.insert(key.to_ascii_lowercase(), content_type);
                        }
                        b"Override" => {
                            let part = key.trim_start_matches('/').to_string();
                            types.overrides.insert(part, content_type);
                        }
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(types)
    }

    fn lookup(&self, part_name: &str) -> Option<&str> {
        if let Some(content_type) = self.overrides.get(part_name) {
            return Some(content_type);
        }
        let extension = Path::new(part_name)
            .extension()?
            .to_string_lossy()
            .to_ascii_lowercase();
        self.defaults.get(&extension).map(String::as_str)
    }
}
