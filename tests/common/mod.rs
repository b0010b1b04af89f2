#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use docxide_typeset::geometry::{Margins, Size};
use docxide_typeset::model::{
    AbstractNumbering, Alignment, Block, Document, FieldKind, HeaderFooter, ImageBlock, ImageData,
    LevelDefinition, NumberFormat, NumberingDefinitions, NumberingInstance, NumberingRef, PageSetup,
    Paragraph, ParagraphStyle, Run, RunContent, Table, TableCell, TableRow, TextStyle, VMerge,
};

pub const WORDS: &str = "The quick brown fox jumps over the lazy dog while a patient typesetter \
    measures every glyph twice and breaks each line exactly once";

pub fn style(size: f32) -> TextStyle {
    TextStyle::sized(size)
}

pub fn para(text: &str) -> Paragraph {
    Paragraph::plain(text, style(11.0))
}

pub fn justified(text: &str) -> Paragraph {
    Paragraph {
        style: ParagraphStyle {
            alignment: Alignment::Justify,
            space_after: 6.0,
            ..ParagraphStyle::default()
        },
        ..para(text)
    }
}

pub fn document(blocks: Vec<Block>) -> Document {
    Document {
        page: PageSetup {
            size: Size::letter(),
            margins: Margins::uniform(72.0),
            header_distance: 36.0,
            footer_distance: 36.0,
        },
        blocks,
        ..Document::default()
    }
}

/// Footer that prints "Page N of M".
pub fn page_footer() -> Block {
    let s = style(9.0);
    Block::Footer(HeaderFooter {
        first_page: false,
        paragraphs: vec![Paragraph {
            runs: vec![
                Run::text("Page ", s.clone()),
                Run::field(FieldKind::Page, s.clone()),
                Run::text(" of ", s.clone()),
                Run::field(FieldKind::NumPages, s),
            ],
            ..Paragraph::default()
        }],
    })
}

/// A multi-page document: footer with page fields, justified body text and a
/// footnote reference on the first paragraph.
pub fn long_document(paragraphs: usize) -> Document {
    let mut blocks = vec![page_footer()];
    for i in 0..paragraphs {
        let mut p = justified(&format!("{i}. {WORDS} {WORDS}"));
        if i == 0 {
            p.runs.push(Run {
                style: style(11.0),
                hyperlink: None,
                content: RunContent::FootnoteRef { id: 7 },
            });
        }
        blocks.push(Block::Paragraph(p));
    }
    let mut doc = document(blocks);
    doc.footnotes.insert(7, vec![Paragraph::plain("A note at the foot.", style(9.0))]);
    doc
}

pub fn cell(text: &str) -> TableCell {
    TableCell {
        paragraphs: vec![para(text)],
        ..TableCell::default()
    }
}

pub fn merged(text: &str, v_merge: VMerge) -> TableCell {
    TableCell {
        v_merge,
        ..cell(text)
    }
}

pub fn spanning(text: &str, grid_span: u16) -> TableCell {
    TableCell {
        grid_span,
        ..cell(text)
    }
}

pub fn row(cells: Vec<TableCell>) -> TableRow {
    TableRow {
        cells,
        ..TableRow::default()
    }
}

pub fn exact_row(cells: Vec<TableCell>, height: f32) -> TableRow {
    TableRow {
        cells,
        height: Some(height),
        height_exact: true,
    }
}

pub fn table(grid: Vec<f32>, rows: Vec<TableRow>) -> Table {
    Table {
        grid,
        rows,
        ..Table::default()
    }
}

pub fn decimal_numbering(num_id: &str) -> NumberingDefinitions {
    let level = LevelDefinition {
        format: NumberFormat::Decimal,
        text: "%1.".to_string(),
        start: 1,
        restart_after_higher: true,
        indent_left: Some(36.0),
        hanging: Some(18.0),
        first_line: None,
        tab: None,
        marker_style: None,
    };
    NumberingDefinitions {
        abstracts: HashMap::from([(
            "0".to_string(),
            AbstractNumbering {
                levels: BTreeMap::from([(0, level)]),
            },
        )]),
        instances: HashMap::from([(
            num_id.to_string(),
            NumberingInstance {
                abstract_id: "0".to_string(),
                ..NumberingInstance::default()
            },
        )]),
    }
}

pub fn numbered(text: &str, num_id: &str) -> Paragraph {
    Paragraph {
        numbering: Some(NumberingRef {
            num_id: num_id.to_string(),
            level: 0,
        }),
        ..para(text)
    }
}

/// 3x2 RGBA PNG with one transparent pixel.
pub fn png_bytes() -> Vec<u8> {
    let mut img = image::RgbaImage::from_pixel(3, 2, image::Rgba([200, 30, 30, 255]));
    img.put_pixel(0, 0, image::Rgba([0, 0, 0, 0]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

pub fn image_block() -> Block {
    Block::Image(ImageBlock {
        image: ImageData {
            data: png_bytes(),
            path: None,
            width: 90.0,
            height: 60.0,
        },
        alignment: Alignment::Center,
    })
}

pub fn fixed_clock() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2024-03-05 14:30:00", "%Y-%m-%d %H:%M:%S").expect("clock")
}

/// Unique scratch path under the system temp dir.
pub fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("docxide-typeset-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir.join(name)
}
