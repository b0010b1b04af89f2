mod common;

use docxide_typeset::model::Block;
use docxide_typeset::{ParallelMode, TypesetConfig, document_to_pdf};

use common::*;

fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

#[test]
fn document_becomes_a_pdf_with_every_page() {
    let doc = long_document(20);
    let config = TypesetConfig::builtin();
    let pages = docxide_typeset::layout_document(&doc, &config.font_book(&[]), &config).len();
    let (bytes, diagnostics) = document_to_pdf(&doc, &config).unwrap();
    assert!(diagnostics.is_empty());
    assert!(bytes.starts_with(b"%PDF-"));
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains(&format!("/Count {pages}")));
    assert!(text.contains("/Helvetica"));
    assert!(text.contains("/WinAnsiEncoding"));
}

#[test]
fn parallel_output_is_byte_identical() {
    let doc = long_document(20);
    let (sequential, _) = document_to_pdf(&doc, &TypesetConfig::builtin()).unwrap();
    let chunked_config = TypesetConfig::builtin().with_parallel(ParallelMode::Chunked { workers: 3 });
    let (chunked, _) = document_to_pdf(&doc, &chunked_config).unwrap();
    assert_eq!(chunked, sequential);
}

#[test]
fn images_are_embedded_with_their_alpha() {
    let doc = document(vec![Block::Paragraph(para("picture below")), image_block()]);
    let (bytes, _) = document_to_pdf(&doc, &TypesetConfig::builtin()).unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert_eq!(count(&text, "/Subtype /Image"), 2, "colour image plus soft mask");
    assert!(text.contains("/SMask"));
    assert!(text.contains("/FlateDecode"));
}

#[test]
fn broken_image_becomes_a_placeholder() {
    let mut doc = document(vec![image_block()]);
    if let Block::Image(img) = &mut doc.blocks[0] {
        img.image.data.clear();
        img.image.path = Some("/nonexistent/figure.png".into());
    }
    let (bytes, diagnostics) = document_to_pdf(&doc, &TypesetConfig::builtin()).unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert!(bytes.starts_with(b"%PDF-"));
}

#[test]
fn files_convert_from_document_and_from_layout() {
    let config = TypesetConfig::builtin();
    let input = scratch("doc.json");
    let layout = scratch("doc.layout.json");
    let from_doc = scratch("from-doc.pdf");
    let from_layout = scratch("from-layout.pdf");

    let json = serde_json::to_string(&long_document(6)).unwrap();
    std::fs::write(&input, json).unwrap();

    docxide_typeset::convert_document_to_pdf(&input, &from_doc, &config).unwrap();
    let pages = docxide_typeset::export_layout(&input, &layout, &config).unwrap();
    assert!(pages >= 1);
    docxide_typeset::convert_layout_to_pdf(&layout, &from_layout, &config).unwrap();

    let a = std::fs::read(&from_doc).unwrap();
    let b = std::fs::read(&from_layout).unwrap();
    assert!(a.starts_with(b"%PDF-") && b.starts_with(b"%PDF-"));
    let pages_marker = format!("/Count {pages}");
    assert!(String::from_utf8_lossy(&a).contains(&pages_marker));
    assert!(String::from_utf8_lossy(&b).contains(&pages_marker));
}

#[test]
fn missing_input_is_an_io_error() {
    let err = docxide_typeset::convert_document_to_pdf(
        &scratch("does-not-exist.json"),
        &scratch("never.pdf"),
        &TypesetConfig::builtin(),
    )
    .unwrap_err();
    assert!(matches!(err, docxide_typeset::Error::Io(_)));
}
