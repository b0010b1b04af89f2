//! Error types. Only [`Error`] is ever returned to callers of the public
//! entry points; the others describe failures that the pipeline recovers from
//! locally (fallback metrics, placeholder boxes, sequential re-render).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid layout snapshot: {0}")]
    Interchange(String),
    #[error("PDF generation error: {0}")]
    Pdf(String),
}

/// Shaping could not produce glyphs for a string.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeasurementError {
    #[error("no shaper available for font {0}")]
    Unavailable(String),
    #[error("font data for {family} could not be parsed")]
    BadFont { family: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("font {family} (bold={bold}, italic={italic}) is not registered")]
pub struct FontResolutionError {
    pub family: String,
    pub bold: bool,
    pub italic: bool,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("table has no columns")]
    EmptyGrid,
    #[error("row {row} has no cells")]
    EmptyRow { row: usize },
    #[error("row {row} spans {spanned} columns but the grid has {columns}")]
    SpanOverflow {
        row: usize,
        spanned: usize,
        columns: usize,
    },
    #[error("non-finite geometry: {0}")]
    NonFinite(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("image could not be decoded: {0}")]
    Image(String),
    #[error("block frame is invalid: {0}")]
    Frame(String),
    #[error("unsupported content: {0}")]
    Unsupported(String),
    #[error("canvas backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParallelRenderError {
    #[error("worker pool could not be created: {0}")]
    Pool(String),
    #[error("chunk {chunk} could not be transferred to its worker: {reason}")]
    Transfer { chunk: usize, reason: String },
    #[error("worker for chunk {chunk} panicked: {reason}")]
    WorkerPanic { chunk: usize, reason: String },
    #[error("merged output has {got} pages, expected {expected}")]
    PageCount { expected: usize, got: usize },
}
