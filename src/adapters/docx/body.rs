//! Document-order walk of `word/document.xml`.
//!
//! Produces the top-level tables of the body as rows of cells of paragraphs,
//! each paragraph an ordered list of [`Inline`] nodes. Formulas are numbered
//! across the main story so that their ids match the formula collection of an
//! office automation host. Text boxes are separate stories and are skipped.

use crate::{error::Error, Result};
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;

const MATH_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/math";
const WORD_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// A content node inside a paragraph, in document order.
#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Text(String),
    Break,
    /// DrawingML picture, by relationship id.
    Blip(String),
    /// VML picture; legacy equation previews may carry no id.
    VmlImage(Option<String>),
    /// Embedded OLE object without a preview picture.
    OleObject,
    Math(MathRef),
}

/// Reference to an `m:oMath` element.
#[derive(Debug, Clone, PartialEq)]
pub struct MathRef {
    /// 1-based position among all formulas of the body.
    pub index: usize,
    /// Concatenated `m:t` text.
    pub linear: String,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Cell {
    pub paragraphs: Vec<Vec<Inline>>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    /// Whether any cell carries text, a picture, a formula, or an OLE object.
    pub fn has_content(&self) -> bool {
        self.cells
            .iter()
            .flat_map(|cell| cell.paragraphs.iter().flatten())
            .any(|inline| match inline {
                Inline::Text(text) => !text.trim().is_empty(),
                Inline::Break => false,
                _ => true,
            })
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Table {
    pub rows: Vec<Row>,
}

/// Raw OMML of one formula.
#[derive(Debug, Clone, PartialEq)]
pub struct OmmlFragment {
    pub index: usize,
    pub xml: String,
}

impl OmmlFragment {
    /// The fragment with the namespace declarations it relies on.
    pub fn standalone(&self) -> String {
        let Some(rest) = self.xml.strip_prefix("<m:oMath") else {
            return self.xml.clone();
        };
        let head_end = rest.find('>').unwrap_or(rest.len());
        if rest[..head_end].contains("xmlns:m=") {
            return self.xml.clone();
        }
        format!("<m:oMath xmlns:m=\"{MATH_NS}\" xmlns:w=\"{WORD_NS}\"{rest}")
    }
}

/// Parsed body of a document.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Body {
    pub tables: Vec<Table>,
    pub formulas: Vec<OmmlFragment>,
}

/// Walks `document.xml` once, collecting tables and formulas.
pub fn parse_body(xml: &str) -> Result<Body> {
    let mut walker = Walker::default();
    let mut reader = Reader::from_str(xml);

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"mc:Fallback" | b"w:txbxContent" => {
                    reader.read_to_end(e.to_end().name())?;
                }
                b"m:oMath" => {
                    let start = tag_start(xml, reader.buffer_position() as usize);
                    let linear = read_math(&mut reader)?;
                    let end = reader.buffer_position() as usize;
                    walker.math(linear, xml.get(start..end).unwrap_or_default());
                }
                _ => walker.start(&e),
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"m:oMath" => {
                    let end = reader.buffer_position() as usize;
                    let start = tag_start(xml, end);
                    walker.math(String::new(), xml.get(start..end).unwrap_or_default());
                }
                _ => {
                    walker.start(&e);
                    walker.end(e.name().as_ref());
                }
            },
            Event::Text(t) => walker.text(&t),
            Event::End(e) => walker.end(e.name().as_ref()),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(walker.body)
}

/// Offset of the `<m:oMath` tag that ends right before `head_end`.
fn tag_start(xml: &str, head_end: usize) -> usize {
    xml.get(..head_end)
        .and_then(|head| head.rfind("<m:oMath"))
        .unwrap_or(head_end)
}

/// Reads an `m:oMath` subtree whose start tag was just consumed.
fn read_math(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut linear = String::new();
    let mut depth = 1usize;
    let mut in_text = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                in_text = e.name().as_ref() == b"m:t";
            }
            Event::End(_) => {
                depth -= 1;
                in_text = false;
                if depth == 0 {
                    return Ok(linear);
                }
            }
            Event::Text(t) if in_text => linear.push_str(&unescape(&t)),
            Event::Eof => return Err(Error::Xml("unterminated m:oMath".into())),
            _ => {}
        }
    }
}

fn unescape(text: &BytesText) -> String {
    match text.unescape() {
        Ok(value) => value.into_owned(),
        Err(_) => String::from_utf8_lossy(text).into_owned(),
    }
}

fn attr(e: &BytesStart, keys: &[&[u8]]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| keys.contains(&a.key.as_ref()))
        .and_then(|a| a.unescape_value().ok())
        .map(|value| value.into_owned())
        .filter(|value| !value.is_empty())
}

#[derive(Default)]
struct Walker {
    body: Body,
    stack: Vec<Vec<u8>>,
    table_depth: usize,
    in_cell: bool,
    /// Stack length at which the active cell paragraph was opened.
    paragraph_level: Option<usize>,
    paragraph: Vec<Inline>,
    /// Index in `paragraph` where the open `w:object` started.
    object_start: Option<usize>,
    text: Option<String>,
    formula_count: usize,
}

impl Walker {
    fn in_paragraph(&self) -> bool {
        self.paragraph_level.is_some()
    }

    fn parent(&self) -> Option<&[u8]> {
        self.stack.last().map(Vec::as_slice)
    }

    fn start(&mut self, e: &BytesStart) {
        let name = e.name();
        let name = name.as_ref();
        match name {
            b"w:tbl" => self.table_depth += 1,
            _ if self.table_depth != 1 => {}
            b"w:tr" => {
                if let Some(table) = self.body.tables.last_mut() {
                    table.rows.push(Row::default());
                }
            }
            b"w:tc" => {
                if let Some(row) = self.body.tables.last_mut().and_then(|t| t.rows.last_mut()) {
                    row.cells.push(Cell::default());
                    self.in_cell = true;
                }
            }
            b"w:p" if self.in_cell && !self.in_paragraph() => {
                self.paragraph_level = Some(self.stack.len() + 1);
                self.paragraph.clear();
            }
            _ if !self.in_paragraph() => {}
            b"w:t" => self.text = Some(String::new()),
            b"w:tab" if self.parent() == Some(b"w:r".as_slice()) => {
                self.push(Inline::Text("\t".into()));
            }
            b"w:br" | b"w:cr" => self.push(Inline::Break),
            b"a:blip" => {
                if let Some(rid) = attr(e, &[b"r:embed"]) {
                    self.push(Inline::Blip(rid));
                }
            }
            b"v:imagedata" => {
                let rid = attr(e, &[b"r:id", b"r:embed"]);
                self.push(Inline::VmlImage(rid));
            }
            b"w:object" => self.object_start = Some(self.paragraph.len()),
            b"o:OLEObject" => {
                let from = self.object_start.unwrap_or(self.paragraph.len());
                let has_preview = self
                    .paragraph
                    .get(from..)
                    .unwrap_or_default()
                    .iter()
                    .any(|inline| matches!(inline, Inline::Blip(_) | Inline::VmlImage(_)));
                if !has_preview {
                    self.push(Inline::OleObject);
                }
            }
            _ => {}
        }

        if name == b"w:tbl" && self.table_depth == 1 {
            self.body.tables.push(Table::default());
        }
        self.stack.push(name.to_vec());
    }

    fn end(&mut self, name: &[u8]) {
        if self.paragraph_level == Some(self.stack.len()) && name == b"w:p" {
            let paragraph = std::mem::take(&mut self.paragraph);
            if let Some(cell) = self.current_cell() {
                cell.paragraphs.push(paragraph);
            }
            self.paragraph_level = None;
            self.object_start = None;
        }
        match name {
            b"w:t" => {
                if let Some(text) = self.text.take() {
                    if !text.is_empty() {
                        self.push(Inline::Text(text));
                    }
                }
            }
            b"w:object" => self.object_start = None,
            b"w:tc" if self.table_depth == 1 => self.in_cell = false,
            b"w:tbl" => self.table_depth = self.table_depth.saturating_sub(1),
            _ => {}
        }
        self.stack.pop();
    }

    fn text(&mut self, t: &BytesText) {
        if let Some(text) = self.text.as_mut() {
            text.push_str(&unescape(t));
        }
    }

    fn math(&mut self, linear: String, raw: &str) {
        self.formula_count += 1;
        let index = self.formula_count;
        self.body.formulas.push(OmmlFragment {
            index,
            xml: raw.to_string(),
        });
        if self.in_paragraph() && self.table_depth == 1 {
            self.push(Inline::Math(MathRef { index, linear }));
        }
    }

    fn push(&mut self, inline: Inline) {
        self.paragraph.push(inline);
    }

    fn current_cell(&mut self) -> Option<&mut Cell> {
        self.body
            .tables
            .last_mut()
            .and_then(|t| t.rows.last_mut())
            .and_then(|r| r.cells.last_mut())
    }
}
