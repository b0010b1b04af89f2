mod common;

use docxide_typeset::canvas::{CanvasOp, RecordedPage, RecordingCanvas, RecordingFactory, SurfaceFactory};
use docxide_typeset::layout::BlockType;
use docxide_typeset::numbering::FirstReferenceNotes;
use docxide_typeset::{Page, PageCompiler, PageRenderer, ParallelMode, TypesetConfig, layout_document};

use common::*;

fn laid_out(paragraphs: usize) -> (Vec<Page>, FirstReferenceNotes) {
    let doc = long_document(paragraphs);
    let config = TypesetConfig::builtin();
    let fonts = config.font_book(&[]);
    let pages = layout_document(&doc, &fonts, &config);
    (pages, FirstReferenceNotes::from_document(&doc))
}

fn compile<F: SurfaceFactory>(
    pages: &[Page],
    notes: &FirstReferenceNotes,
    mode: ParallelMode,
    factory: &F,
) -> docxide_typeset::RenderOutput<F::Page> {
    let renderer = PageRenderer::new(notes, pages.len() as u32).with_clock(fixed_clock());
    PageCompiler::new(renderer, mode).compile(pages, factory)
}

#[test]
fn chunked_matches_sequential() {
    let (pages, notes) = laid_out(30);
    assert!(pages.len() >= 4, "only {} pages", pages.len());
    let sequential = compile(&pages, &notes, ParallelMode::Sequential, &RecordingFactory);
    let chunked = compile(&pages, &notes, ParallelMode::Chunked { workers: 3 }, &RecordingFactory);
    assert_eq!(chunked.mode, ParallelMode::Chunked { workers: 3 });
    assert_eq!(chunked.pages.len(), pages.len());
    assert_eq!(chunked.pages, sequential.pages);
}

#[test]
fn threaded_matches_sequential() {
    let (pages, notes) = laid_out(30);
    let sequential = compile(&pages, &notes, ParallelMode::Sequential, &RecordingFactory);
    let threaded = compile(&pages, &notes, ParallelMode::Threaded { workers: 4 }, &RecordingFactory);
    assert_eq!(threaded.mode, ParallelMode::Threaded { workers: 4 });
    assert_eq!(threaded.pages, sequential.pages);
}

#[test]
fn block_order_is_preserved_per_page() {
    let (pages, notes) = laid_out(25);
    let chunked = compile(&pages, &notes, ParallelMode::Chunked { workers: 8 }, &RecordingFactory);
    for (page, recorded) in pages.iter().zip(&chunked.pages) {
        assert_eq!(recorded.size, page.size);
        let footer = page
            .blocks
            .iter()
            .find(|b| b.block_type() == BlockType::Footer)
            .expect("footer on every page");
        assert_eq!(footer.page_number, page.number);
    }
}

#[test]
fn page_fields_follow_absolute_page_numbers() {
    let (pages, notes) = laid_out(30);
    let total = pages.len();
    let chunked = compile(&pages, &notes, ParallelMode::Chunked { workers: 3 }, &RecordingFactory);
    for (i, recorded) in chunked.pages.iter().enumerate() {
        let text = recorded.text();
        let expected = format!("Page {} of {}", i + 1, total);
        assert!(
            squash(&text).contains(&squash(&expected)),
            "page {}: {text}",
            i + 1
        );
    }
}

fn squash(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Panics whenever a surface is requested from a pool thread.
struct MainThreadOnly;

impl SurfaceFactory for MainThreadOnly {
    type Surface = RecordingCanvas;
    type Page = RecordedPage;

    fn create(&self) -> RecordingCanvas {
        if rayon::current_thread_index().is_some() {
            panic!("surfaces are only available on the main thread");
        }
        RecordingCanvas::new()
    }

    fn finish(&self, surface: RecordingCanvas) -> Vec<RecordedPage> {
        surface.into_pages()
    }
}

#[test]
fn worker_failure_falls_back_to_sequential() {
    let (pages, notes) = laid_out(12);
    let expected = compile(&pages, &notes, ParallelMode::Sequential, &RecordingFactory);
    for mode in [ParallelMode::Chunked { workers: 2 }, ParallelMode::Threaded { workers: 2 }] {
        let output = compile(&pages, &notes, mode, &MainThreadOnly);
        assert_eq!(output.mode, ParallelMode::Sequential);
        assert_eq!(output.pages, expected.pages);
    }
}

#[test]
fn footnote_marker_is_numbered_by_first_reference() {
    let (pages, notes) = laid_out(3);
    let output = compile(&pages, &notes, ParallelMode::Sequential, &RecordingFactory);
    let first = &output.pages[0];
    assert!(first.texts().contains(&"1"));
    assert!(!first.texts().contains(&"7"));
    let rules = first
        .ops
        .iter()
        .filter(|op| matches!(op, CanvasOp::Line { .. }))
        .count();
    assert!(rules >= 1, "footnote separator missing");
}
