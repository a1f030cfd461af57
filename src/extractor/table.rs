use super::image::ImageMap;
use crate::adapters::docx::{Cell, Inline, Row, Table};
use crate::core::{CellContentBuilder, ContentItem};
use crate::formula::formula_id;

/// Minimum number of rows, and of rows with content, of a quiz table.
pub const MIN_ROWS: usize = 3;

/// Outcome of the table admission filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    TooFewRows,
    TooFewContentRows,
}

impl Admission {
    pub fn of(table: &Table) -> Self {
        if table.rows.len() < MIN_ROWS {
            return Admission::TooFewRows;
        }
        let content_rows = table.rows.iter().filter(|row| row.has_content()).count();
        if content_rows < MIN_ROWS {
            return Admission::TooFewContentRows;
        }
        Admission::Accepted
    }
}

/// Turns parsed table cells into content sequences.
pub struct TableParser<'a> {
    images: &'a ImageMap,
    placeholder: &'a str,
}

impl<'a> TableParser<'a> {
    pub fn new(images: &'a ImageMap, placeholder: &'a str) -> Self {
        Self {
            images,
            placeholder,
        }
    }

    /// Content of every row, in row order.
    pub fn rows(&self, table: &Table) -> Vec<Vec<ContentItem>> {
        table.rows.iter().map(|row| self.row_content(row)).collect()
    }

    /// Concatenated content of the cells of `row`.
    pub fn row_content(&self, row: &Row) -> Vec<ContentItem> {
        row.cells
            .iter()
            .flat_map(|cell| self.cell_content(cell))
            .collect()
    }

    pub fn cell_content(&self, cell: &Cell) -> Vec<ContentItem> {
        let mut builder = CellContentBuilder::new();
        for paragraph in &cell.paragraphs {
            for inline in paragraph {
                match inline {
                    Inline::Text(text) => builder.push_text(text),
                    Inline::Break => builder.push_line_break(),
                    Inline::Blip(rel_id) => self.push_picture(&mut builder, Some(rel_id)),
                    Inline::VmlImage(rel_id) => {
                        self.push_picture(&mut builder, rel_id.as_deref())
                    }
                    Inline::OleObject => builder.push_placeholder(self.placeholder),
                    Inline::Math(math) => {
                        let linear = Some(math.linear.clone()).filter(|s| !s.trim().is_empty());
                        builder.push_formula(formula_id(math.index), linear);
                    }
                }
            }
            builder.finish_paragraph();
        }
        builder.finish()
    }

    fn push_picture(&self, builder: &mut CellContentBuilder, rel_id: Option<&str>) {
        match rel_id.and_then(|id| self.images.get(id)) {
            Some(path) => builder.push_image(path),
            None => builder.push_placeholder(self.placeholder),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::docx::MathRef;
    use crate::core::ItemKind;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn text_cell(text: &str) -> Cell {
        Cell {
            paragraphs: vec![vec![Inline::Text(text.to_string())]],
        }
    }

    fn row(cells: Vec<Cell>) -> Row {
        Row { cells }
    }

    fn images() -> ImageMap {
        let mut map = ImageMap::default();
        map.paths
            .insert("rId5".to_string(), PathBuf::from("/assets/rId5.png"));
        map
    }

    #[test]
    fn test_two_row_table_is_rejected() {
        let table = Table {
            rows: vec![row(vec![text_cell("Q")]), row(vec![text_cell("A")])],
        };
        assert_eq!(Admission::of(&table), Admission::TooFewRows);
    }

    #[test]
    fn test_table_needs_three_content_rows() {
        let table = Table {
            rows: vec![
                row(vec![text_cell("Q")]),
                row(vec![text_cell("A")]),
                row(vec![text_cell("  ")]),
            ],
        };
        assert_eq!(Admission::of(&table), Admission::TooFewContentRows);
    }

    #[test]
    fn test_image_only_row_counts_as_content() {
        let table = Table {
            rows: vec![
                row(vec![text_cell("Q")]),
                row(vec![text_cell("A")]),
                row(vec![Cell {
                    paragraphs: vec![vec![Inline::Blip("rId5".into())]],
                }]),
            ],
        };
        assert_eq!(Admission::of(&table), Admission::Accepted);
    }

    #[test]
    fn test_image_only_cell_yields_one_image() {
        let images = images();
        let parser = TableParser::new(&images, "[formula]");
        let cell = Cell {
            paragraphs: vec![vec![Inline::Blip("rId5".into())]],
        };
        assert_eq!(
            parser.cell_content(&cell),
            vec![ContentItem::image("/assets/rId5.png")]
        );
    }

    #[test]
    fn test_formula_between_runs_keeps_order() {
        let images = ImageMap::default();
        let parser = TableParser::new(&images, "[formula]");
        let cell = Cell {
            paragraphs: vec![vec![
                Inline::Text("Solve ".into()),
                Inline::Math(MathRef {
                    index: 2,
                    linear: "x=1".into(),
                }),
                Inline::Text(" now".into()),
            ]],
        };
        let items = parser.cell_content(&cell);
        let kinds: Vec<ItemKind> = items.iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![ItemKind::Text, ItemKind::Formula, ItemKind::Text]);
        assert_eq!(items[1].formula_id.as_deref(), Some("omml_000002"));
        assert_eq!(items[1].formula_text.as_deref(), Some("x=1"));
    }

    #[test]
    fn test_unresolved_pictures_become_placeholders() {
        let images = images();
        let parser = TableParser::new(&images, "[formula]");
        let cell = Cell {
            paragraphs: vec![vec![
                Inline::Text("a".into()),
                Inline::VmlImage(None),
                Inline::Blip("rId99".into()),
                Inline::OleObject,
            ]],
        };
        assert_eq!(
            parser.cell_content(&cell),
            vec![
                ContentItem::text("a"),
                ContentItem::text("[formula]"),
                ContentItem::text("[formula]"),
                ContentItem::text("[formula]"),
            ]
        );
    }

    #[test]
    fn test_paragraphs_and_breaks() {
        let images = ImageMap::default();
        let parser = TableParser::new(&images, "[formula]");
        let cell = Cell {
            paragraphs: vec![
                vec![
                    Inline::Text("one".into()),
                    Inline::Break,
                    Inline::Text("two".into()),
                ],
                vec![Inline::Text("three".into()), Inline::Break],
                vec![],
            ],
        };
        assert_eq!(
            parser.cell_content(&cell),
            vec![
                ContentItem::text("one"),
                ContentItem::line_break(),
                ContentItem::text("two"),
                ContentItem::paragraph_break(),
                ContentItem::text("three"),
            ]
        );
    }

    #[test]
    fn test_row_concatenates_cells() {
        let images = ImageMap::default();
        let parser = TableParser::new(&images, "[formula]");
        let row = row(vec![text_cell("A"), Cell::default(), text_cell("B")]);
        assert_eq!(
            parser.row_content(&row),
            vec![
                ContentItem::text("A"),
                ContentItem::text(""),
                ContentItem::text("B"),
            ]
        );
    }
}
