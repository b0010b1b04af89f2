mod common;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use docxide_typeset::model::{Block, Document, VMerge};
use docxide_typeset::numbering::FirstReferenceNotes;
use docxide_typeset::{Error, LayoutSnapshot, Page, PageCompiler, PageRenderer, ParallelMode, RecordingFactory};
use docxide_typeset::{TypesetConfig, layout_document};

use common::*;

fn mixed_document() -> Document {
    let mut doc = long_document(4);
    doc.blocks.push(Block::Table(table(
        vec![120.0, 120.0, 120.0],
        vec![
            row(vec![merged("merged", VMerge::Restart), spanning("two columns", 2)]),
            row(vec![merged("", VMerge::Continue), cell("b"), cell("c")]),
        ],
    )));
    doc.blocks.push(image_block());
    doc.blocks.push(Block::Paragraph(para("after the picture")));
    doc
}

fn pages_of(doc: &Document) -> Vec<Page> {
    let config = TypesetConfig::builtin();
    let fonts = config.font_book(&[]);
    layout_document(doc, &fonts, &config)
}

#[test]
fn layout_survives_a_json_round_trip() {
    let pages = pages_of(&mixed_document());
    let json = LayoutSnapshot::export(&pages).to_json().unwrap();
    let back = LayoutSnapshot::from_json(&json).unwrap().import().unwrap();
    assert_eq!(back, pages);
}

#[test]
fn media_is_stored_once_as_base64() {
    let mut doc = mixed_document();
    doc.blocks.push(image_block());
    let pages = pages_of(&doc);
    let snapshot = LayoutSnapshot::export(&pages);
    assert_eq!(snapshot.media.len(), 1);
    let json = snapshot.to_json().unwrap();
    assert!(json.contains(&STANDARD.encode(png_bytes())));
}

#[test]
fn imported_layout_renders_like_the_original() {
    let doc = mixed_document();
    let pages = pages_of(&doc);
    let json = LayoutSnapshot::export(&pages).to_json().unwrap();
    let imported = LayoutSnapshot::from_json(&json).unwrap().import().unwrap();

    let render = |pages: &[Page], notes: &FirstReferenceNotes| {
        let renderer = PageRenderer::new(notes, pages.len() as u32).with_clock(fixed_clock());
        PageCompiler::new(renderer, ParallelMode::Sequential)
            .compile(pages, &RecordingFactory)
            .pages
    };
    let original = render(&pages, &FirstReferenceNotes::from_document(&doc));
    let replayed = render(&imported, &FirstReferenceNotes::from_pages(&imported));
    assert_eq!(replayed, original);
}

#[test]
fn malformed_input_is_reported() {
    assert!(matches!(LayoutSnapshot::from_json("{\"pages\": 3}"), Err(Error::Json(_))));

    let pages = pages_of(&mixed_document());
    let mut snapshot = LayoutSnapshot::export(&pages);
    snapshot.paragraph_styles.clear();
    assert!(matches!(snapshot.import(), Err(Error::Interchange(_))));
}
