//! Style-resolved document model handed over by the parsing collaborator.
//!
//! Everything here is plain data with serde support so that a parser written
//! elsewhere can hand a document over as JSON. Binary payloads travel as base64.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::geometry::{Length, Margins, Size};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabAlignment {
    #[default]
    Left,
    Center,
    Right,
    Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TabStop {
    pub position: f32,
    #[serde(default)]
    pub alignment: TabAlignment,
    #[serde(default)]
    pub leader: Option<char>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VertAlign {
    #[default]
    Baseline,
    Superscript,
    Subscript,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSpacing {
    Auto(f32),    // multiplier (e.g. 1.0 = single, 1.15 = default)
    Exact(f32),   // fixed height in points
    AtLeast(f32), // minimum height in points
}

impl Default for LineSpacing {
    fn default() -> Self {
        LineSpacing::Auto(1.0)
    }
}

/// Character formatting of a run after style inheritance has been applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    pub color: Option<[u8; 3]>, // None = automatic (black)
    pub highlight: Option<[u8; 3]>,
    pub vertical_align: VertAlign,
    pub char_spacing: f32, // extra points after every character
    pub kerning: Option<bool>,
    pub caps: bool,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: "Helvetica".to_string(),
            font_size: 12.0,
            bold: false,
            italic: false,
            underline: false,
            strike: false,
            color: None,
            highlight: None,
            vertical_align: VertAlign::Baseline,
            char_spacing: 0.0,
            kerning: None,
            caps: false,
        }
    }
}

impl TextStyle {
    pub fn sized(font_size: f32) -> Self {
        Self {
            font_size,
            ..Self::default()
        }
    }

    pub fn is_shifted(&self) -> bool {
        self.vertical_align != VertAlign::Baseline
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderStyle {
    #[default]
    Single,
    Dashed,
    Dotted,
    Double,
    /// Explicitly no border; overrides inherited table borders.
    None,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BorderLine {
    #[serde(default = "default_border_width")]
    pub width: f32,
    #[serde(default)]
    pub color: Option<[u8; 3]>,
    #[serde(default)]
    pub style: BorderStyle,
    #[serde(default)]
    pub space: f32, // gap between content and border
}

fn default_border_width() -> f32 {
    0.5
}

impl BorderLine {
    pub fn single(width: f32) -> Self {
        Self {
            width,
            color: None,
            style: BorderStyle::Single,
            space: 0.0,
        }
    }

    pub fn none() -> Self {
        Self {
            width: 0.0,
            color: None,
            style: BorderStyle::None,
            space: 0.0,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.style != BorderStyle::None && self.width > 0.0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParagraphBorders {
    pub top: Option<BorderLine>,
    pub bottom: Option<BorderLine>,
    pub left: Option<BorderLine>,
    pub right: Option<BorderLine>,
}

impl ParagraphBorders {
    pub fn is_empty(&self) -> bool {
        self.top.is_none() && self.bottom.is_none() && self.left.is_none() && self.right.is_none()
    }
}

/// Indentation in points. `None` means "not specified at this level".
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Indent {
    pub left: Option<f32>,
    pub right: Option<f32>,
    pub first_line: Option<f32>,
    pub hanging: Option<f32>,
}

impl Indent {
    pub fn is_empty(&self) -> bool {
        self.left.is_none() && self.right.is_none() && self.first_line.is_none() && self.hanging.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParagraphStyle {
    /// Name of the paragraph style this formatting came from ("List Paragraph", ...).
    pub name: Option<String>,
    /// The named style itself carries a numbering reference.
    pub numbered: bool,
    pub alignment: Alignment,
    pub line_spacing: Option<LineSpacing>,
    pub space_before: f32,
    pub space_after: f32,
    pub indent: Indent,
    pub borders: ParagraphBorders,
    pub shading: Option<[u8; 3]>,
    pub page_break_before: bool,
    pub tab_stops: Vec<TabStop>,
}

impl Default for ParagraphStyle {
    fn default() -> Self {
        Self {
            name: None,
            numbered: false,
            alignment: Alignment::Left,
            line_spacing: None,
            space_before: 0.0,
            space_after: 0.0,
            indent: Indent::default(),
            borders: ParagraphBorders::default(),
            shading: None,
            page_break_before: false,
            tab_stops: Vec::new(),
        }
    }
}

impl ParagraphStyle {
    pub fn is_list_like(&self) -> bool {
        self.numbered
            || self
                .name
                .as_deref()
                .is_some_and(|n| n.to_ascii_lowercase().contains("list"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NumberingRef {
    pub num_id: String,
    #[serde(default)]
    pub level: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberFormat {
    #[default]
    Decimal,
    DecimalZero,
    LowerRoman,
    UpperRoman,
    LowerLetter,
    UpperLetter,
    Bullet,
    None,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelDefinition {
    #[serde(default)]
    pub format: NumberFormat,
    /// Level text template, `%1` .. `%9` refer to the counters of levels 1..9.
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_start")]
    pub start: u32,
    /// Restart when a shallower level advances (the usual behaviour).
    #[serde(default = "default_true")]
    pub restart_after_higher: bool,
    #[serde(default)]
    pub indent_left: Option<f32>,
    #[serde(default)]
    pub hanging: Option<f32>,
    #[serde(default)]
    pub first_line: Option<f32>,
    #[serde(default)]
    pub tab: Option<f32>,
    #[serde(default)]
    pub marker_style: Option<TextStyle>,
}

fn default_start() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AbstractNumbering {
    pub levels: BTreeMap<u8, LevelDefinition>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelOverride {
    #[serde(default)]
    pub start: Option<u32>,
}

/// A concrete numbering instance (`numId`) pointing at an abstract definition.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NumberingInstance {
    pub abstract_id: String,
    #[serde(default)]
    pub overrides: BTreeMap<u8, LevelOverride>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberingDefinitions {
    pub abstracts: HashMap<String, AbstractNumbering>,
    pub instances: HashMap<String, NumberingInstance>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    Page,
    NumPages,
    Date,
    Time,
    /// Any field code we do not evaluate; its cached result is shown.
    Other,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub width: f32,  // display width, points
    pub height: f32, // display height, points
}

impl ImageData {
    /// Image bytes, reading `path` when the parser did not inline them.
    pub fn bytes(&self) -> std::io::Result<Vec<u8>> {
        if !self.data.is_empty() {
            return Ok(self.data.clone());
        }
        match &self.path {
            Some(path) => std::fs::read(path),
            None => Ok(Vec::new()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunContent {
    Text {
        text: String,
    },
    Tab,
    LineBreak,
    Field {
        field: FieldKind,
        #[serde(default)]
        format: Option<String>,
        #[serde(default)]
        cached: String,
    },
    FootnoteRef {
        id: u32,
    },
    EndnoteRef {
        id: u32,
    },
    Image {
        image: ImageData,
    },
    Textbox {
        textbox: Textbox,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Run {
    #[serde(default)]
    pub style: TextStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hyperlink: Option<String>,
    #[serde(flatten)]
    pub content: RunContent,
}

impl Run {
    pub fn text(text: impl Into<String>, style: TextStyle) -> Self {
        Self {
            style,
            hyperlink: None,
            content: RunContent::Text { text: text.into() },
        }
    }

    pub fn field(field: FieldKind, style: TextStyle) -> Self {
        Self {
            style,
            hyperlink: None,
            content: RunContent::Field {
                field,
                format: None,
                cached: String::new(),
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            RunContent::Text { text } => Some(text),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FloatingContent {
    Image { image: ImageData },
    Textbox { textbox: Textbox },
}

/// Absolutely positioned object anchored to a paragraph (offsets from the paragraph frame).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloatingObject {
    pub offset_x: f32,
    pub offset_y: f32,
    #[serde(flatten)]
    pub content: FloatingContent,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    #[serde(default)]
    pub style: ParagraphStyle,
    /// Direct indentation on the paragraph, highest precedence.
    #[serde(default)]
    pub indent: Indent,
    #[serde(default)]
    pub runs: Vec<Run>,
    #[serde(default)]
    pub numbering: Option<NumberingRef>,
    #[serde(default)]
    pub floats: Vec<FloatingObject>,
}

impl Paragraph {
    pub fn plain(text: impl Into<String>, style: TextStyle) -> Self {
        Self {
            runs: vec![Run::text(text, style)],
            ..Self::default()
        }
    }

    /// Concatenated text of all text runs.
    pub fn text(&self) -> String {
        self.runs.iter().filter_map(Run::as_text).collect()
    }

    pub fn first_style(&self) -> TextStyle {
        self.runs
            .first()
            .map(|r| r.style.clone())
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Textbox {
    pub width: f32,
    #[serde(default)]
    pub height: Option<f32>,
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
    #[serde(default = "default_textbox_padding")]
    pub padding: Margins,
    #[serde(default)]
    pub border: Option<BorderLine>,
    #[serde(default)]
    pub fill: Option<[u8; 3]>,
}

fn default_textbox_padding() -> Margins {
    Margins::new(3.6, 7.2, 3.6, 7.2)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VMerge {
    #[default]
    None,
    Restart,
    Continue,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellVAlign {
    #[default]
    Top,
    Center,
    Bottom,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellMargins {
    pub top: Length,
    pub left: Length,
    pub bottom: Length,
    pub right: Length,
}

impl Default for CellMargins {
    fn default() -> Self {
        Self {
            top: Length::pt(0.0),
            left: Length::pt(5.4),
            bottom: Length::pt(0.0),
            right: Length::pt(5.4),
        }
    }
}

impl CellMargins {
    pub fn to_margins(&self) -> Margins {
        Margins::new(
            self.top.to_pts(),
            self.right.to_pts(),
            self.bottom.to_pts(),
            self.left.to_pts(),
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellBorders {
    pub top: Option<BorderLine>,
    pub bottom: Option<BorderLine>,
    pub left: Option<BorderLine>,
    pub right: Option<BorderLine>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableBorders {
    pub top: Option<BorderLine>,
    pub bottom: Option<BorderLine>,
    pub left: Option<BorderLine>,
    pub right: Option<BorderLine>,
    pub inside_h: Option<BorderLine>,
    pub inside_v: Option<BorderLine>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    #[serde(default = "default_span")]
    pub grid_span: u16,
    #[serde(default)]
    pub v_merge: VMerge,
    #[serde(default)]
    pub margins: Option<CellMargins>,
    #[serde(default)]
    pub borders: CellBorders,
    #[serde(default)]
    pub shading: Option<[u8; 3]>,
    #[serde(default)]
    pub v_align: CellVAlign,
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
}

fn default_span() -> u16 {
    1
}

impl Default for TableCell {
    fn default() -> Self {
        Self {
            grid_span: 1,
            v_merge: VMerge::None,
            margins: None,
            borders: CellBorders::default(),
            shading: None,
            v_align: CellVAlign::Top,
            paragraphs: Vec::new(),
        }
    }
}

impl TableCell {
    pub fn span(&self) -> usize {
        self.grid_span.max(1) as usize
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
    #[serde(default)]
    pub height: Option<f32>,
    #[serde(default)]
    pub height_exact: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Authoritative column grid in points; empty when the source had none.
    #[serde(default)]
    pub grid: Vec<f32>,
    /// Preferred total width; the available width is used when absent.
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub indent: f32,
    pub rows: Vec<TableRow>,
    #[serde(default)]
    pub cell_margins: CellMargins,
    #[serde(default)]
    pub borders: TableBorders,
    #[serde(default)]
    pub space_after: f32,
}

impl Table {
    pub fn column_count(&self) -> usize {
        if !self.grid.is_empty() {
            return self.grid.len();
        }
        self.rows
            .iter()
            .map(|r| r.cells.iter().map(TableCell::span).sum::<usize>())
            .max()
            .unwrap_or(0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageBlock {
    pub image: ImageData,
    #[serde(default)]
    pub alignment: Alignment,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HeaderFooter {
    /// Applies to the first page of the document only (title page variant).
    #[serde(default)]
    pub first_page: bool,
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
    Image(ImageBlock),
    Textbox(Textbox),
    Header(HeaderFooter),
    Footer(HeaderFooter),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageSetup {
    pub size: Size,
    pub margins: Margins,
    #[serde(default = "default_hf_distance")]
    pub header_distance: f32,
    #[serde(default = "default_hf_distance")]
    pub footer_distance: f32,
}

fn default_hf_distance() -> f32 {
    36.0
}

impl Default for PageSetup {
    fn default() -> Self {
        Self {
            size: Size::letter(),
            margins: Margins::uniform(72.0),
            header_distance: 36.0,
            footer_distance: 36.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedFont {
    pub family: String,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    pub page: PageSetup,
    pub blocks: Vec<Block>,
    pub footnotes: BTreeMap<u32, Vec<Paragraph>>,
    pub endnotes: BTreeMap<u32, Vec<Paragraph>>,
    pub numbering: NumberingDefinitions,
    pub embedded_fonts: Vec<EmbeddedFont>,
    pub line_spacing: LineSpacing,
}

impl Document {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Body paragraphs in document order, descending into table cells row by row.
    pub fn paragraphs_in_order(&self) -> Vec<&Paragraph> {
        let mut out = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Paragraph(p) => out.push(p),
                Block::Table(t) => out.extend(
                    t.rows
                        .iter()
                        .flat_map(|row| row.cells.iter())
                        .flat_map(|cell| cell.paragraphs.iter()),
                ),
                Block::Textbox(tb) => out.extend(tb.paragraphs.iter()),
                Block::Image(_) | Block::Header(_) | Block::Footer(_) => {}
            }
        }
        out
    }
}

pub(crate) mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraph_runs_deserialize_from_tagged_json() {
        let json = r#"{
            "style": {"alignment": "justify"},
            "runs": [
                {"type": "text", "text": "Hello ", "style": {"bold": true}},
                {"type": "field", "field": "page"},
                {"type": "footnote_ref", "id": 3, "hyperlink": "https://example.com"}
            ]
        }"#;
        let para: Paragraph = serde_json::from_str(json).unwrap();
        assert_eq!(para.style.alignment, Alignment::Justify);
        assert_eq!(para.runs.len(), 3);
        assert!(para.runs[0].style.bold);
        assert_eq!(para.runs[0].style.font_size, 12.0);
        assert!(matches!(
            para.runs[1].content,
            RunContent::Field {
                field: FieldKind::Page,
                ..
            }
        ));
        assert_eq!(para.runs[2].hyperlink.as_deref(), Some("https://example.com"));
        assert_eq!(para.text(), "Hello ");
    }

    #[test]
    fn document_blocks_use_type_discriminant() {
        let json = r#"{
            "blocks": [
                {"type": "paragraph", "runs": [{"type": "text", "text": "x"}]},
                {"type": "table", "rows": [{"cells": [{"grid_span": 2}]}]}
            ]
        }"#;
        let doc = Document::from_json(json).unwrap();
        assert_eq!(doc.blocks.len(), 2);
        assert!(matches!(doc.blocks[1], Block::Table(ref t) if t.column_count() == 2));
        assert_eq!(doc.page, PageSetup::default());
    }

    #[test]
    fn image_bytes_roundtrip_as_base64() {
        let img = ImageData {
            data: vec![1, 2, 3, 250],
            path: None,
            width: 10.0,
            height: 5.0,
        };
        let json = serde_json::to_string(&img).unwrap();
        assert!(json.contains("AQID+g=="));
        let back: ImageData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, img);
    }

    #[test]
    fn list_like_styles_are_detected_by_name_or_numbering() {
        let mut style = ParagraphStyle::default();
        assert!(!style.is_list_like());
        style.name = Some("List Paragraph".into());
        assert!(style.is_list_like());
        style.name = Some("Body Text".into());
        style.numbered = true;
        assert!(style.is_list_like());
    }
}
