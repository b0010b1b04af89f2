pub mod canvas;
pub mod config;
pub mod error;
pub mod fonts;
pub mod geometry;
pub mod interchange;
pub mod layout;
pub mod model;
pub mod numbering;
pub mod pdf;
pub mod render;
pub mod text;

pub use canvas::{Canvas, RecordedPage, RecordingCanvas, RecordingFactory, SurfaceFactory};
pub use config::{ParallelMode, TypesetConfig};
pub use error::Error;
pub use fonts::FontBook;
pub use interchange::LayoutSnapshot;
pub use layout::Page;
pub use model::Document;
pub use render::{Diagnostics, PageCompiler, PageRenderer, RenderOutput};

use std::path::Path;
use std::time::Instant;

use numbering::{FirstReferenceNotes, NoteNumbering};
use text::TextMetrics;

/// Lay out `doc` with faces from `fonts`.
pub fn layout_document(doc: &Document, fonts: &FontBook, config: &TypesetConfig) -> Vec<Page> {
    let metrics = TextMetrics::new(fonts).with_config(config);
    layout::paginate(doc, &metrics, config)
}

/// Render laid-out pages onto surfaces from `factory` using the configured
/// parallel mode. `notes` supplies the numbers printed for note references.
pub fn render_pages<F: SurfaceFactory>(
    pages: &[Page],
    notes: &dyn NoteNumbering,
    config: &TypesetConfig,
    factory: &F,
) -> RenderOutput<F::Page> {
    let renderer = PageRenderer::new(notes, pages.len() as u32);
    PageCompiler::new(renderer, config.parallel).compile(pages, factory)
}

fn write_output(output: &Path, bytes: &[u8]) -> Result<(), Error> {
    std::fs::write(output, bytes).map_err(Error::Io)
}

fn pages_to_pdf(
    pages: &[Page],
    notes: &dyn NoteNumbering,
    fonts: &FontBook,
    config: &TypesetConfig,
) -> Result<(Vec<u8>, Diagnostics), Error> {
    let rendered = render_pages(pages, notes, config, &RecordingFactory);
    let bytes = pdf::write_pdf(&rendered.pages, fonts)?;
    Ok((bytes, rendered.diagnostics))
}

/// Document JSON in, PDF bytes out.
pub fn document_to_pdf(doc: &Document, config: &TypesetConfig) -> Result<(Vec<u8>, Diagnostics), Error> {
    let t0 = Instant::now();
    let fonts = config.font_book(&doc.embedded_fonts);
    let pages = layout_document(doc, &fonts, config);
    let t_layout = t0.elapsed();

    let notes = FirstReferenceNotes::from_document(doc);
    let (bytes, diagnostics) = pages_to_pdf(&pages, &notes, &fonts, config)?;
    let t_render = t0.elapsed();

    log::info!(
        "Timing: layout={:.1}ms render={:.1}ms total={:.1}ms ({} pages, {} diagnostics, output {} bytes)",
        t_layout.as_secs_f64() * 1000.0,
        (t_render - t_layout).as_secs_f64() * 1000.0,
        t_render.as_secs_f64() * 1000.0,
        pages.len(),
        diagnostics.len(),
        bytes.len(),
    );
    Ok((bytes, diagnostics))
}

pub fn convert_document_to_pdf(input: &Path, output: &Path, config: &TypesetConfig) -> Result<Diagnostics, Error> {
    let json = std::fs::read_to_string(input)?;
    let doc = Document::from_json(&json)?;
    let (bytes, diagnostics) = document_to_pdf(&doc, config)?;
    write_output(output, &bytes)?;
    Ok(diagnostics)
}

/// Render a layout previously exported with [`export_layout`].
pub fn convert_layout_to_pdf(input: &Path, output: &Path, config: &TypesetConfig) -> Result<Diagnostics, Error> {
    let t0 = Instant::now();
    let json = std::fs::read_to_string(input)?;
    let pages = LayoutSnapshot::from_json(&json)?.import()?;
    let t_import = t0.elapsed();

    let fonts = config.font_book(&[]);
    let notes = FirstReferenceNotes::from_pages(&pages);
    let (bytes, diagnostics) = pages_to_pdf(&pages, &notes, &fonts, config)?;
    write_output(output, &bytes)?;

    log::info!(
        "Timing: import={:.1}ms render={:.1}ms ({} pages)",
        t_import.as_secs_f64() * 1000.0,
        (t0.elapsed() - t_import).as_secs_f64() * 1000.0,
        pages.len(),
    );
    Ok(diagnostics)
}

/// Lay out a document JSON file and write the interchange form of its pages.
pub fn export_layout(input: &Path, output: &Path, config: &TypesetConfig) -> Result<usize, Error> {
    let json = std::fs::read_to_string(input)?;
    let doc = Document::from_json(&json)?;
    let fonts = config.font_book(&doc.embedded_fonts);
    let pages = layout_document(&doc, &fonts, config);
    let snapshot = LayoutSnapshot::export(&pages).to_json()?;
    write_output(output, snapshot.as_bytes())?;
    Ok(pages.len())
}
