//! JSON form of laid-out pages.
//!
//! Mirrors [`Page`] / [`LayoutBlock`] / [`Line`] / glyphs one to one. Text
//! styles, paragraph styles and media are stored once in side tables and
//! referenced by index; media bytes are base64.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::geometry::{Margins, Rect, Size};
use crate::layout::{
    BlockContent, CellLayout, Decoration, FieldItem, InlineItem, InlineKind, LayoutBlock, Line, NoteItem, NoteRef,
    Overlay, OverlayContent, Page, ParagraphLayout, PlacedParagraph, ResolvedBorders, RowLayout, TableLayout,
    TextItem, TextboxLayout,
};
use crate::model::{BorderLine, CellVAlign, FieldKind, ImageData, ParagraphStyle, TextStyle};
use crate::numbering::ResolvedIndent;
use crate::text::Glyph;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayoutSnapshot {
    pub version: u32,
    pub text_styles: Vec<TextStyle>,
    pub paragraph_styles: Vec<ParagraphStyle>,
    pub media: Vec<ImageData>,
    pub pages: Vec<PageRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub number: u32,
    pub size: Size,
    pub margins: Margins,
    pub header_distance: f32,
    pub footer_distance: f32,
    pub header_height: f32,
    pub footer_height: f32,
    pub blocks: Vec<BlockRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub frame: Rect,
    pub page_number: u32,
    pub sequence: usize,
    pub content: ContentRecord,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentRecord {
    Paragraph(ParagraphRecord),
    Table(TableRecord),
    Image { media: usize },
    Textbox(TextboxRecord),
    Header { paragraphs: Vec<PlacedRecord> },
    Footer { paragraphs: Vec<PlacedRecord> },
    Footnotes { paragraphs: Vec<PlacedRecord> },
    Endnotes { paragraphs: Vec<PlacedRecord> },
    Rule { width: f32, color: Option<[u8; 3]> },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParagraphRecord {
    pub style: usize,
    /// left, right, first line
    pub indent: [f32; 3],
    pub lines: Vec<LineRecord>,
    pub space_before: f32,
    pub space_after: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overlays: Vec<OverlayRecord>,
    pub width: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacedRecord {
    pub y: f32,
    pub paragraph: ParagraphRecord,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineRecord {
    pub items: Vec<ItemRecord>,
    pub baseline: f32,
    pub height: f32,
    pub x_start: f32,
    pub available_width: f32,
    pub content_width: f32,
    pub is_last: bool,
    pub hard_break: bool,
    pub tabbed: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub x: f32,
    pub width: f32,
    pub ascent: f32,
    pub descent: f32,
    pub kind: ItemKindRecord,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKindRecord {
    Text(TextRecord),
    Marker(TextRecord),
    Field {
        field: FieldKind,
        format: Option<String>,
        cached: String,
        style: usize,
        font: String,
        hyperlink: Option<String>,
    },
    Note {
        footnote: bool,
        id: u32,
        style: usize,
        font: String,
    },
    Image {
        media: usize,
    },
    Textbox(TextboxRecord),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextRecord {
    pub text: String,
    pub style: usize,
    pub font: String,
    pub glyphs: Vec<Glyph>,
    pub space_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hyperlink: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextboxRecord {
    pub size: Size,
    pub padding: Margins,
    pub border: Option<BorderLine>,
    pub fill: Option<[u8; 3]>,
    pub paragraphs: Vec<PlacedRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlayRecord {
    pub rect: Rect,
    pub content: OverlayContentRecord,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OverlayContentRecord {
    Image { media: usize },
    Textbox(TextboxRecord),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    pub columns: Vec<f32>,
    /// (y, height) per row
    pub rows: Vec<(f32, f32)>,
    pub cells: Vec<CellRecord>,
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    pub row: usize,
    pub col: usize,
    pub col_span: usize,
    pub row_span: usize,
    pub rect: Rect,
    pub margins: Margins,
    /// top, right, bottom, left
    pub borders: [Option<BorderLine>; 4],
    pub shading: Option<[u8; 3]>,
    pub v_align: CellVAlign,
    pub content_offset: f32,
    pub paragraphs: Vec<PlacedRecord>,
}

/// Side table with linear dedup; the styles in one document are few.
struct Table<T> {
    items: Vec<T>,
}

impl<T: PartialEq + Clone> Table<T> {
    fn new() -> Self {
        Self { items: Vec::new() }
    }

    fn intern(&mut self, item: &T) -> usize {
        match self.items.iter().position(|existing| existing == item) {
            Some(index) => index,
            None => {
                self.items.push(item.clone());
                self.items.len() - 1
            }
        }
    }
}

struct Exporter {
    text_styles: Table<TextStyle>,
    paragraph_styles: Table<ParagraphStyle>,
    media: Table<ImageData>,
}

impl Exporter {
    fn page(&mut self, page: &Page) -> PageRecord {
        PageRecord {
            number: page.number,
            size: page.size,
            margins: page.margins,
            header_distance: page.header_distance,
            footer_distance: page.footer_distance,
            header_height: page.header_height,
            footer_height: page.footer_height,
            blocks: page.blocks.iter().map(|b| self.block(b)).collect(),
        }
    }

    fn block(&mut self, block: &LayoutBlock) -> BlockRecord {
        let content = match &block.content {
            BlockContent::Paragraph(p) => ContentRecord::Paragraph(self.paragraph(p)),
            BlockContent::Table(t) => ContentRecord::Table(self.table(t)),
            BlockContent::Image(image) => ContentRecord::Image {
                media: self.media.intern(image),
            },
            BlockContent::Textbox(tb) => ContentRecord::Textbox(self.textbox(tb)),
            BlockContent::Header(ps) => ContentRecord::Header {
                paragraphs: self.stack(ps),
            },
            BlockContent::Footer(ps) => ContentRecord::Footer {
                paragraphs: self.stack(ps),
            },
            BlockContent::Footnotes(ps) => ContentRecord::Footnotes {
                paragraphs: self.stack(ps),
            },
            BlockContent::Endnotes(ps) => ContentRecord::Endnotes {
                paragraphs: self.stack(ps),
            },
            BlockContent::Decorator(Decoration::Rule { width, color }) => ContentRecord::Rule {
                width: *width,
                color: *color,
            },
        };
        BlockRecord {
            frame: block.frame,
            page_number: block.page_number,
            sequence: block.sequence,
            content,
        }
    }

    fn stack(&mut self, paragraphs: &[PlacedParagraph]) -> Vec<PlacedRecord> {
        paragraphs
            .iter()
            .map(|p| PlacedRecord {
                y: p.y,
                paragraph: self.paragraph(&p.layout),
            })
            .collect()
    }

    fn paragraph(&mut self, p: &ParagraphLayout) -> ParagraphRecord {
        ParagraphRecord {
            style: self.paragraph_styles.intern(&p.style),
            indent: [p.indent.left, p.indent.right, p.indent.first_line],
            lines: p.lines.iter().map(|l| self.line(l)).collect(),
            space_before: p.space_before,
            space_after: p.space_after,
            overlays: p
                .overlays
                .iter()
                .map(|o| OverlayRecord {
                    rect: o.rect,
                    content: match &o.content {
                        OverlayContent::Image(image) => OverlayContentRecord::Image {
                            media: self.media.intern(image),
                        },
                        OverlayContent::Textbox(tb) => OverlayContentRecord::Textbox(self.textbox(tb)),
                    },
                })
                .collect(),
            width: p.width,
        }
    }

    fn line(&mut self, line: &Line) -> LineRecord {
        LineRecord {
            items: line.items.iter().map(|i| self.item(i)).collect(),
            baseline: line.baseline,
            height: line.height,
            x_start: line.x_start,
            available_width: line.available_width,
            content_width: line.content_width,
            is_last: line.is_last,
            hard_break: line.hard_break,
            tabbed: line.tabbed,
        }
    }

    fn text(&mut self, t: &TextItem) -> TextRecord {
        TextRecord {
            text: t.text.clone(),
            style: self.text_styles.intern(&t.style),
            font: t.font.clone(),
            glyphs: t.glyphs.clone(),
            space_count: t.space_count,
            hyperlink: t.hyperlink.clone(),
        }
    }

    fn item(&mut self, item: &InlineItem) -> ItemRecord {
        let kind = match &item.kind {
            InlineKind::Text(t) => ItemKindRecord::Text(self.text(t)),
            InlineKind::Marker(t) => ItemKindRecord::Marker(self.text(t)),
            InlineKind::Field(f) => ItemKindRecord::Field {
                field: f.field,
                format: f.format.clone(),
                cached: f.cached.clone(),
                style: self.text_styles.intern(&f.style),
                font: f.font.clone(),
                hyperlink: f.hyperlink.clone(),
            },
            InlineKind::Note(n) => {
                let (footnote, id) = match n.note {
                    NoteRef::Footnote(id) => (true, id),
                    NoteRef::Endnote(id) => (false, id),
                };
                ItemKindRecord::Note {
                    footnote,
                    id,
                    style: self.text_styles.intern(&n.style),
                    font: n.font.clone(),
                }
            }
            InlineKind::Image(image) => ItemKindRecord::Image {
                media: self.media.intern(image),
            },
            InlineKind::Textbox(tb) => ItemKindRecord::Textbox(self.textbox(tb)),
        };
        ItemRecord {
            x: item.x,
            width: item.width,
            ascent: item.ascent,
            descent: item.descent,
            kind,
        }
    }

    fn textbox(&mut self, tb: &TextboxLayout) -> TextboxRecord {
        TextboxRecord {
            size: tb.size,
            padding: tb.padding,
            border: tb.border.clone(),
            fill: tb.fill,
            paragraphs: self.stack(&tb.paragraphs),
        }
    }

    fn table(&mut self, t: &TableLayout) -> TableRecord {
        TableRecord {
            columns: t.columns.clone(),
            rows: t.rows.iter().map(|r| (r.y, r.height)).collect(),
            cells: t
                .cells
                .iter()
                .map(|c| CellRecord {
                    row: c.row,
                    col: c.col,
                    col_span: c.col_span,
                    row_span: c.row_span,
                    rect: c.rect,
                    margins: c.margins,
                    borders: [
                        c.borders.top.clone(),
                        c.borders.right.clone(),
                        c.borders.bottom.clone(),
                        c.borders.left.clone(),
                    ],
                    shading: c.shading,
                    v_align: c.v_align,
                    content_offset: c.content_offset,
                    paragraphs: self.stack(&c.paragraphs),
                })
                .collect(),
            width: t.width,
            height: t.height,
        }
    }
}

fn lookup<'a, T>(items: &'a [T], index: usize, what: &str) -> Result<&'a T, Error> {
    items
        .get(index)
        .ok_or_else(|| Error::Interchange(format!("{what} {index} out of range ({} entries)", items.len())))
}

struct Importer<'a> {
    snapshot: &'a LayoutSnapshot,
}

impl Importer<'_> {
    fn text_style(&self, index: usize) -> Result<TextStyle, Error> {
        lookup(&self.snapshot.text_styles, index, "text style").cloned()
    }

    fn media(&self, index: usize) -> Result<ImageData, Error> {
        lookup(&self.snapshot.media, index, "media").cloned()
    }

    fn page(&self, record: &PageRecord) -> Result<Page, Error> {
        Ok(Page {
            number: record.number,
            size: record.size,
            margins: record.margins,
            header_distance: record.header_distance,
            footer_distance: record.footer_distance,
            header_height: record.header_height,
            footer_height: record.footer_height,
            blocks: record
                .blocks
                .iter()
                .map(|b| self.block(b))
                .collect::<Result<_, _>>()?,
        })
    }

    fn block(&self, record: &BlockRecord) -> Result<LayoutBlock, Error> {
        let content = match &record.content {
            ContentRecord::Paragraph(p) => BlockContent::Paragraph(self.paragraph(p)?),
            ContentRecord::Table(t) => BlockContent::Table(self.table(t)?),
            ContentRecord::Image { media } => BlockContent::Image(self.media(*media)?),
            ContentRecord::Textbox(tb) => BlockContent::Textbox(self.textbox(tb)?),
            ContentRecord::Header { paragraphs } => BlockContent::Header(self.stack(paragraphs)?),
            ContentRecord::Footer { paragraphs } => BlockContent::Footer(self.stack(paragraphs)?),
            ContentRecord::Footnotes { paragraphs } => BlockContent::Footnotes(self.stack(paragraphs)?),
            ContentRecord::Endnotes { paragraphs } => BlockContent::Endnotes(self.stack(paragraphs)?),
            ContentRecord::Rule { width, color } => BlockContent::Decorator(Decoration::Rule {
                width: *width,
                color: *color,
            }),
        };
        Ok(LayoutBlock {
            frame: record.frame,
            content,
            page_number: record.page_number,
            sequence: record.sequence,
        })
    }

    fn stack(&self, records: &[PlacedRecord]) -> Result<Vec<PlacedParagraph>, Error> {
        records
            .iter()
            .map(|r| {
                Ok(PlacedParagraph {
                    y: r.y,
                    layout: self.paragraph(&r.paragraph)?,
                })
            })
            .collect()
    }

    fn paragraph(&self, r: &ParagraphRecord) -> Result<ParagraphLayout, Error> {
        let [left, right, first_line] = r.indent;
        Ok(ParagraphLayout {
            style: lookup(&self.snapshot.paragraph_styles, r.style, "paragraph style")?.clone(),
            indent: ResolvedIndent {
                left,
                right,
                first_line,
            },
            lines: r.lines.iter().map(|l| self.line(l)).collect::<Result<_, _>>()?,
            space_before: r.space_before,
            space_after: r.space_after,
            overlays: r
                .overlays
                .iter()
                .map(|o| {
                    Ok(Overlay {
                        rect: o.rect,
                        content: match &o.content {
                            OverlayContentRecord::Image { media } => OverlayContent::Image(self.media(*media)?),
                            OverlayContentRecord::Textbox(tb) => OverlayContent::Textbox(self.textbox(tb)?),
                        },
                    })
                })
                .collect::<Result<_, Error>>()?,
            width: r.width,
        })
    }

    fn line(&self, r: &LineRecord) -> Result<Line, Error> {
        Ok(Line {
            items: r.items.iter().map(|i| self.item(i)).collect::<Result<_, _>>()?,
            baseline: r.baseline,
            height: r.height,
            x_start: r.x_start,
            available_width: r.available_width,
            content_width: r.content_width,
            is_last: r.is_last,
            hard_break: r.hard_break,
            tabbed: r.tabbed,
        })
    }

    fn text(&self, r: &TextRecord) -> Result<TextItem, Error> {
        Ok(TextItem {
            text: r.text.clone(),
            style: self.text_style(r.style)?,
            font: r.font.clone(),
            glyphs: r.glyphs.clone(),
            space_count: r.space_count,
            hyperlink: r.hyperlink.clone(),
        })
    }

    fn item(&self, r: &ItemRecord) -> Result<InlineItem, Error> {
        let kind = match &r.kind {
            ItemKindRecord::Text(t) => InlineKind::Text(self.text(t)?),
            ItemKindRecord::Marker(t) => InlineKind::Marker(self.text(t)?),
            ItemKindRecord::Field {
                field,
                format,
                cached,
                style,
                font,
                hyperlink,
            } => InlineKind::Field(FieldItem {
                field: *field,
                format: format.clone(),
                cached: cached.clone(),
                style: self.text_style(*style)?,
                font: font.clone(),
                hyperlink: hyperlink.clone(),
            }),
            ItemKindRecord::Note {
                footnote,
                id,
                style,
                font,
            } => InlineKind::Note(NoteItem {
                note: if *footnote {
                    NoteRef::Footnote(*id)
                } else {
                    NoteRef::Endnote(*id)
                },
                style: self.text_style(*style)?,
                font: font.clone(),
            }),
            ItemKindRecord::Image { media } => InlineKind::Image(self.media(*media)?),
            ItemKindRecord::Textbox(tb) => InlineKind::Textbox(Box::new(self.textbox(tb)?)),
        };
        Ok(InlineItem {
            x: r.x,
            width: r.width,
            ascent: r.ascent,
            descent: r.descent,
            kind,
        })
    }

    fn textbox(&self, r: &TextboxRecord) -> Result<TextboxLayout, Error> {
        Ok(TextboxLayout {
            size: r.size,
            padding: r.padding,
            border: r.border.clone(),
            fill: r.fill,
            paragraphs: self.stack(&r.paragraphs)?,
        })
    }

    fn table(&self, r: &TableRecord) -> Result<TableLayout, Error> {
        let cells = r
            .cells
            .iter()
            .map(|c| {
                let [top, right, bottom, left] = c.borders.clone();
                Ok(CellLayout {
                    row: c.row,
                    col: c.col,
                    col_span: c.col_span,
                    row_span: c.row_span,
                    rect: c.rect,
                    margins: c.margins,
                    borders: ResolvedBorders {
                        top,
                        right,
                        bottom,
                        left,
                    },
                    shading: c.shading,
                    v_align: c.v_align,
                    content_offset: c.content_offset,
                    paragraphs: self.stack(&c.paragraphs)?,
                })
            })
            .collect::<Result<_, Error>>()?;
        Ok(TableLayout {
            columns: r.columns.clone(),
            rows: r.rows.iter().map(|&(y, height)| RowLayout { y, height }).collect(),
            cells,
            width: r.width,
            height: r.height,
        })
    }
}

impl LayoutSnapshot {
    pub fn export(pages: &[Page]) -> Self {
        let mut exporter = Exporter {
            text_styles: Table::new(),
            paragraph_styles: Table::new(),
            media: Table::new(),
        };
        let pages = pages.iter().map(|p| exporter.page(p)).collect();
        LayoutSnapshot {
            version: SNAPSHOT_VERSION,
            text_styles: exporter.text_styles.items,
            paragraph_styles: exporter.paragraph_styles.items,
            media: exporter.media.items,
            pages,
        }
    }

    pub fn import(&self) -> Result<Vec<Page>, Error> {
        if self.version != SNAPSHOT_VERSION {
            return Err(Error::Interchange(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                self.version
            )));
        }
        let importer = Importer { snapshot: self };
        self.pages.iter().map(|p| importer.page(p)).collect()
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TypesetConfig;
    use crate::fonts::FontBook;
    use crate::layout::paginate;
    use crate::model::{Block, Document, Paragraph, Run};
    use crate::text::TextMetrics;

    fn sample() -> Vec<Page> {
        let bold = TextStyle {
            bold: true,
            ..TextStyle::sized(11.0)
        };
        let para = Paragraph {
            runs: vec![
                Run::text("plain and ", TextStyle::sized(11.0)),
                Run::text("bold", bold),
                Run::field(FieldKind::Page, TextStyle::sized(11.0)),
            ],
            ..Paragraph::default()
        };
        let doc = Document {
            blocks: vec![Block::Paragraph(para.clone()), Block::Paragraph(para)],
            ..Document::default()
        };
        let fonts = FontBook::builtin();
        let metrics = TextMetrics::new(&fonts);
        paginate(&doc, &metrics, &TypesetConfig::builtin())
    }

    #[test]
    fn styles_are_deduplicated() {
        let snapshot = LayoutSnapshot::export(&sample());
        assert_eq!(snapshot.text_styles.len(), 2);
        assert_eq!(snapshot.paragraph_styles.len(), 1);
    }

    #[test]
    fn round_trip_preserves_pages() {
        let pages = sample();
        let json = LayoutSnapshot::export(&pages).to_json().unwrap();
        let back = LayoutSnapshot::from_json(&json).unwrap().import().unwrap();
        assert_eq!(back, pages);
    }

    #[test]
    fn dangling_style_reference_is_rejected() {
        let mut snapshot = LayoutSnapshot::export(&sample());
        snapshot.text_styles.clear();
        let err = snapshot.import().unwrap_err();
        assert!(matches!(err, Error::Interchange(_)));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut snapshot = LayoutSnapshot::export(&sample());
        snapshot.version = 99;
        assert!(snapshot.import().is_err());
    }
}
