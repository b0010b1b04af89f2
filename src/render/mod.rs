//! Painting laid-out pages onto a [`Canvas`].

pub mod parallel;
pub mod paragraph;
pub mod table;

use std::sync::Arc;

use chrono::NaiveDateTime;
use chrono::format::{Item, StrftimeItems};

use crate::canvas::{BLACK, Canvas, Rgb};
use crate::error::RenderError;
use crate::fonts::BUILTIN_FAMILY;
use crate::geometry::Rect;
use crate::layout::{BlockContent, BlockType, Decoration, LayoutBlock, Page, PlacedParagraph, TextboxLayout};
use crate::model::{BorderLine, BorderStyle, FieldKind, ImageData};
use crate::numbering::NoteNumbering;

pub use parallel::{PageCompiler, RenderOutput};
pub use paragraph::paint_paragraph;
pub use table::paint_table;

const PLACEHOLDER_FILL: Rgb = [255, 235, 235];
const PLACEHOLDER_STROKE: Rgb = [200, 0, 0];

/// Per-page values fields resolve against.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    pub page_number: u32,
    pub page_total: u32,
    pub now: NaiveDateTime,
    pub notes: &'a dyn NoteNumbering,
}

impl RenderContext<'_> {
    /// Text of a field as painted on this page.
    pub fn field_text(&self, field: FieldKind, format: Option<&str>, cached: &str) -> String {
        match field {
            FieldKind::Page => self.page_number.to_string(),
            FieldKind::NumPages => self.page_total.to_string(),
            FieldKind::Date => self.format_clock(format, "%m/%d/%Y"),
            FieldKind::Time => self.format_clock(format, "%H:%M"),
            FieldKind::Other => cached.to_string(),
        }
    }

    fn format_clock(&self, format: Option<&str>, default: &str) -> String {
        let format = format
            .filter(|f| f.contains('%'))
            .filter(|f| !StrftimeItems::new(f).any(|item| matches!(item, Item::Error)))
            .unwrap_or(default);
        self.now.format(format).to_string()
    }
}

/// One block that could not be painted.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub page: u32,
    pub sequence: usize,
    pub block_type: BlockType,
    pub error: RenderError,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Diagnostics {
    pub entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }
}

/// Paints pages block by block. A block that fails is replaced by a
/// placeholder box; the rest of the page is still painted.
#[derive(Clone, Copy)]
pub struct PageRenderer<'a> {
    notes: &'a dyn NoteNumbering,
    page_total: u32,
    now: NaiveDateTime,
}

impl<'a> PageRenderer<'a> {
    pub fn new(notes: &'a dyn NoteNumbering, page_total: u32) -> Self {
        Self {
            notes,
            page_total,
            now: chrono::Local::now().naive_local(),
        }
    }

    /// Fix the clock used by DATE and TIME fields.
    pub fn with_clock(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    pub fn page_total(&self) -> u32 {
        self.page_total
    }

    pub fn context(&self, page_number: u32) -> RenderContext<'a> {
        RenderContext {
            page_number,
            page_total: self.page_total,
            now: self.now,
            notes: self.notes,
        }
    }

    pub fn render_page(&self, page: &Page, canvas: &mut dyn Canvas, diagnostics: &mut Diagnostics) {
        canvas.begin_page(page.size);
        for block in page.blocks_in_order() {
            // Fields resolve against the block's own page number.
            let ctx = self.context(block.page_number);
            if let Err(error) = render_block(block, canvas, &ctx) {
                log::warn!(
                    "page {}: {:?} block {} failed: {error}",
                    page.number,
                    block.block_type(),
                    block.sequence
                );
                paint_placeholder(canvas, block.frame, &error);
                diagnostics.entries.push(Diagnostic {
                    page: page.number,
                    sequence: block.sequence,
                    block_type: block.block_type(),
                    error,
                });
            }
        }
        canvas.end_page();
    }

    pub fn render_pages(&self, pages: &[Page], canvas: &mut dyn Canvas) -> Diagnostics {
        let mut diagnostics = Diagnostics::default();
        for page in pages {
            self.render_page(page, canvas, &mut diagnostics);
        }
        diagnostics
    }
}

pub fn render_block(block: &LayoutBlock, canvas: &mut dyn Canvas, ctx: &RenderContext) -> Result<(), RenderError> {
    let frame = block.frame;
    if !frame.is_finite() {
        return Err(RenderError::Frame(format!("{frame:?}")));
    }
    match &block.content {
        BlockContent::Paragraph(layout) => paint_paragraph(canvas, layout, frame.x, frame.y, ctx),
        BlockContent::Table(layout) => paint_table(canvas, layout, frame.x, frame.y, ctx),
        BlockContent::Image(image) => paint_image(canvas, image, frame),
        BlockContent::Textbox(tb) => paint_textbox(canvas, tb, frame.x, frame.y, ctx),
        BlockContent::Header(paragraphs)
        | BlockContent::Footer(paragraphs)
        | BlockContent::Footnotes(paragraphs)
        | BlockContent::Endnotes(paragraphs) => paint_stack(canvas, paragraphs, frame.x, frame.y, ctx),
        BlockContent::Decorator(Decoration::Rule { width, color }) => {
            canvas.save_state();
            canvas.set_stroke_color(color.unwrap_or(BLACK));
            canvas.set_line_width(*width);
            let y = frame.y + frame.height / 2.0;
            canvas.line(frame.x, y, frame.right(), y);
            canvas.restore_state();
            Ok(())
        }
    }
}

/// Paragraphs stacked from (x, y).
pub fn paint_stack(
    canvas: &mut dyn Canvas,
    paragraphs: &[PlacedParagraph],
    x: f32,
    y: f32,
    ctx: &RenderContext,
) -> Result<(), RenderError> {
    for placed in paragraphs {
        paint_paragraph(canvas, &placed.layout, x, y + placed.y, ctx)?;
    }
    Ok(())
}

pub fn paint_image(canvas: &mut dyn Canvas, image: &ImageData, rect: Rect) -> Result<(), RenderError> {
    let bytes = image.bytes().map_err(|e| RenderError::Image(e.to_string()))?;
    canvas.draw_image(rect, Arc::new(bytes))
}

pub fn paint_textbox(
    canvas: &mut dyn Canvas,
    tb: &TextboxLayout,
    x: f32,
    y: f32,
    ctx: &RenderContext,
) -> Result<(), RenderError> {
    let rect = Rect::new(x, y, tb.size.width, tb.size.height);
    if let Some(fill) = tb.fill {
        canvas.save_state();
        canvas.set_fill_color(fill);
        canvas.rect(rect, true, false);
        canvas.restore_state();
    }
    if let Some(border) = tb.border.as_ref().filter(|b| b.is_visible()) {
        canvas.save_state();
        apply_border(canvas, border);
        canvas.rect(rect, false, true);
        canvas.restore_state();
    }
    paint_stack(canvas, &tb.paragraphs, x + tb.padding.left, y + tb.padding.top, ctx)
}

/// Stroke settings for a border line.
pub(crate) fn apply_border(canvas: &mut dyn Canvas, border: &BorderLine) {
    canvas.set_stroke_color(border.color.unwrap_or(BLACK));
    canvas.set_line_width(border.width);
    let w = border.width.max(0.5);
    match border.style {
        BorderStyle::Dashed => canvas.set_dash(&[3.0 * w, 2.0 * w]),
        BorderStyle::Dotted => canvas.set_dash(&[w, w]),
        BorderStyle::Single | BorderStyle::Double | BorderStyle::None => canvas.set_dash(&[]),
    }
}

/// Draw one border edge; double borders get a second line `offset` inwards.
pub(crate) fn stroke_edge(canvas: &mut dyn Canvas, border: &BorderLine, from: (f32, f32), to: (f32, f32), inward: (f32, f32)) {
    if !border.is_visible() {
        return;
    }
    canvas.save_state();
    apply_border(canvas, border);
    canvas.line(from.0, from.1, to.0, to.1);
    if border.style == BorderStyle::Double {
        let gap = border.width * 2.0;
        canvas.line(
            from.0 + inward.0 * gap,
            from.1 + inward.1 * gap,
            to.0 + inward.0 * gap,
            to.1 + inward.1 * gap,
        );
    }
    canvas.restore_state();
}

/// Visible stand-in for a block that failed to paint.
pub fn paint_placeholder(canvas: &mut dyn Canvas, frame: Rect, error: &RenderError) {
    let frame = if frame.is_finite() { frame } else { Rect::default() };
    let rect = Rect::new(frame.x, frame.y, frame.width.max(24.0), frame.height.max(12.0));
    canvas.save_state();
    canvas.set_fill_color(PLACEHOLDER_FILL);
    canvas.set_stroke_color(PLACEHOLDER_STROKE);
    canvas.set_line_width(0.5);
    canvas.set_dash(&[]);
    canvas.rect(rect, true, true);
    canvas.set_fill_color(PLACEHOLDER_STROKE);
    canvas.set_font(BUILTIN_FAMILY, 8.0);
    canvas.draw_string(rect.x + 2.0, rect.y + 9.0, &format!("[render error: {error}]"));
    canvas.restore_state();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{CanvasOp, RecordingCanvas};
    use crate::geometry::{Margins, Size};
    use crate::numbering::FirstReferenceNotes;
    use chrono::NaiveDate;

    fn clock() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(14, 5, 0))
            .unwrap()
    }

    fn page(blocks: Vec<LayoutBlock>) -> Page {
        Page {
            number: 1,
            size: Size::letter(),
            margins: Margins::uniform(72.0),
            header_distance: 36.0,
            footer_distance: 36.0,
            header_height: 0.0,
            footer_height: 0.0,
            blocks,
        }
    }

    #[test]
    fn fields_resolve_per_page() {
        let notes = FirstReferenceNotes::default();
        let renderer = PageRenderer::new(&notes, 12).with_clock(clock());
        let ctx = renderer.context(3);
        assert_eq!(ctx.field_text(FieldKind::Page, None, ""), "3");
        assert_eq!(ctx.field_text(FieldKind::NumPages, None, ""), "12");
        assert_eq!(ctx.field_text(FieldKind::Date, None, ""), "03/09/2024");
        assert_eq!(ctx.field_text(FieldKind::Date, Some("%Y-%m-%d"), ""), "2024-03-09");
        assert_eq!(ctx.field_text(FieldKind::Time, None, ""), "14:05");
        assert_eq!(ctx.field_text(FieldKind::Other, None, "cached"), "cached");
        // malformed format strings fall back to the default
        assert_eq!(ctx.field_text(FieldKind::Date, Some("%Q"), ""), "03/09/2024");
    }

    #[test]
    fn failing_block_becomes_placeholder() {
        let broken = LayoutBlock {
            frame: Rect::new(72.0, 72.0, 100.0, 50.0),
            content: BlockContent::Image(ImageData {
                data: Vec::new(),
                path: Some("/nonexistent/picture.png".into()),
                width: 100.0,
                height: 50.0,
            }),
            page_number: 1,
            sequence: 0,
        };
        let rule = LayoutBlock {
            frame: Rect::new(72.0, 200.0, 144.0, 0.5),
            content: BlockContent::Decorator(Decoration::Rule {
                width: 0.5,
                color: None,
            }),
            page_number: 1,
            sequence: 1,
        };
        let notes = FirstReferenceNotes::default();
        let renderer = PageRenderer::new(&notes, 1);
        let mut canvas = RecordingCanvas::new();
        let diagnostics = renderer.render_pages(&[page(vec![broken, rule])], &mut canvas);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics.entries[0].block_type, BlockType::Image);
        let pages = canvas.into_pages();
        assert!(pages[0].text().contains("render error"));
        assert!(pages[0].ops.iter().any(|op| matches!(op, CanvasOp::Line { .. })));
    }
}
