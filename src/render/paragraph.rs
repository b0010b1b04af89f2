use crate::canvas::{BLACK, Canvas};
use crate::error::RenderError;
use crate::geometry::Rect;
use crate::layout::{InlineItem, InlineKind, Line, OverlayContent, ParagraphLayout, TextItem};
use crate::model::{Alignment, TextStyle};
use crate::text::align::{justify_extra, line_offset};
use crate::text::breaker::is_break_space;
use crate::text::{baseline_shift, effective_font_size};

use super::{RenderContext, paint_image, paint_textbox, stroke_edge};

/// Paint a paragraph whose frame's top-left corner is at (x, y).
pub fn paint_paragraph(
    canvas: &mut dyn Canvas,
    layout: &ParagraphLayout,
    x: f32,
    y: f32,
    ctx: &RenderContext,
) -> Result<(), RenderError> {
    paint_box(canvas, layout, x, y);
    let top = y + layout.content_top();
    for line in &layout.lines {
        paint_line(canvas, layout.style.alignment, line, x, top, ctx)?;
    }
    for overlay in &layout.overlays {
        let rect = Rect::new(x + overlay.rect.x, y + overlay.rect.y, overlay.rect.width, overlay.rect.height);
        match &overlay.content {
            OverlayContent::Image(image) => paint_image(canvas, image, rect)?,
            OverlayContent::Textbox(tb) => paint_textbox(canvas, tb, rect.x, rect.y, ctx)?,
        }
    }
    Ok(())
}

/// Shading and borders behind the paragraph's text.
fn paint_box(canvas: &mut dyn Canvas, layout: &ParagraphLayout, x: f32, y: f32) {
    let borders = &layout.style.borders;
    if layout.style.shading.is_none() && borders.is_empty() {
        return;
    }
    let left = x + layout.indent.left.min(layout.indent.first_line).max(0.0);
    let right = x + layout.width - layout.indent.right.max(0.0);
    let top = y + layout.space_before;
    let bottom = y + layout.height() - layout.space_after;
    if let Some(fill) = layout.style.shading {
        canvas.save_state();
        canvas.set_fill_color(fill);
        canvas.rect(Rect::new(left, top, right - left, bottom - top), true, false);
        canvas.restore_state();
    }
    if let Some(b) = &borders.top {
        stroke_edge(canvas, b, (left, top), (right, top), (0.0, 1.0));
    }
    if let Some(b) = &borders.bottom {
        stroke_edge(canvas, b, (left, bottom), (right, bottom), (0.0, -1.0));
    }
    if let Some(b) = &borders.left {
        stroke_edge(canvas, b, (left, top), (left, bottom), (1.0, 0.0));
    }
    if let Some(b) = &borders.right {
        stroke_edge(canvas, b, (right, top), (right, bottom), (-1.0, 0.0));
    }
}

fn paint_line(
    canvas: &mut dyn Canvas,
    alignment: Alignment,
    line: &Line,
    x: f32,
    top: f32,
    ctx: &RenderContext,
) -> Result<(), RenderError> {
    let justify = alignment == Alignment::Justify && line.can_justify();
    let extra = if justify {
        justify_extra(line.available_width, line.content_width, line.space_count())
    } else {
        0.0
    };
    let origin = x + line.x_start + line_offset(alignment, line.available_width, line.content_width);
    let baseline = top + line.baseline;

    // Justification shifts everything after each gap.
    let mut shift = 0.0;
    for item in &line.items {
        let ix = origin + item.x + shift;
        match &item.kind {
            InlineKind::Text(text) | InlineKind::Marker(text) => {
                paint_text(canvas, text, item, ix, baseline, extra);
                shift += extra * text.space_count as f32;
            }
            InlineKind::Field(field) => {
                let shown = ctx.field_text(field.field, field.format.as_deref(), &field.cached);
                paint_run(canvas, &shown, &field.style, &field.font, item, ix, baseline, item.width);
                if let Some(url) = &field.hyperlink {
                    canvas.register_link(url, item_rect(item, ix, baseline, item.width));
                }
            }
            InlineKind::Note(note) => {
                let number = match note.note {
                    crate::layout::NoteRef::Footnote(id) => ctx.notes.footnote_number(id),
                    crate::layout::NoteRef::Endnote(id) => ctx.notes.endnote_number(id),
                };
                paint_run(canvas, &number.to_string(), &note.style, &note.font, item, ix, baseline, item.width);
            }
            InlineKind::Image(image) => {
                paint_image(canvas, image, item_rect(item, ix, baseline, item.width))?;
            }
            InlineKind::Textbox(tb) => {
                paint_textbox(canvas, tb, ix, baseline - item.ascent, ctx)?;
            }
        }
    }
    Ok(())
}

fn item_rect(item: &InlineItem, x: f32, baseline: f32, width: f32) -> Rect {
    Rect::new(x, baseline - item.ascent, width, item.ascent + item.descent)
}

/// Paint a text item. With `extra` > 0 each word is placed separately so the
/// gaps absorb the justification space.
fn paint_text(canvas: &mut dyn Canvas, text: &TextItem, item: &InlineItem, x: f32, baseline: f32, extra: f32) {
    let width = item.width + extra * text.space_count as f32;
    if extra == 0.0 {
        paint_run(canvas, &text.text, &text.style, &text.font, item, x, baseline, width);
    } else {
        with_style(canvas, &text.style, &text.font, item, x, baseline, width, |canvas, y| {
            for (start, word) in words(&text.text) {
                let spaces = text.text[..start].chars().filter(|&c| is_break_space(c)).count();
                let gx = text
                    .glyphs
                    .iter()
                    .find(|g| g.cluster == start)
                    .map(|g| g.x)
                    .unwrap_or(0.0);
                canvas.draw_string(x + gx + extra * spaces as f32, y, word);
            }
        });
    }
    if let Some(url) = &text.hyperlink {
        canvas.register_link(url, item_rect(item, x, baseline, width));
    }
}

/// Words of `text` with their byte offsets.
fn words(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (is_break_space(c), start) {
            (true, Some(s)) => {
                out.push((s, &text[s..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push((s, &text[s..]));
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn paint_run(
    canvas: &mut dyn Canvas,
    shown: &str,
    style: &TextStyle,
    font: &str,
    item: &InlineItem,
    x: f32,
    baseline: f32,
    width: f32,
) {
    if shown.is_empty() {
        return;
    }
    with_style(canvas, style, font, item, x, baseline, width, |canvas, y| {
        canvas.draw_string(x, y, shown);
    });
}

/// Set up font and colour, run `draw` at the shifted baseline, then add
/// highlight, underline and strike-through.
#[allow(clippy::too_many_arguments)]
fn with_style(
    canvas: &mut dyn Canvas,
    style: &TextStyle,
    font: &str,
    item: &InlineItem,
    x: f32,
    baseline: f32,
    width: f32,
    draw: impl FnOnce(&mut dyn Canvas, f32),
) {
    let size = effective_font_size(style);
    let y = baseline + baseline_shift(style);
    let color = style.color.unwrap_or(BLACK);
    canvas.save_state();
    if let Some(highlight) = style.highlight {
        canvas.set_fill_color(highlight);
        canvas.rect(item_rect(item, x, baseline, width), true, false);
    }
    canvas.set_fill_color(color);
    canvas.set_font(font, size);
    if style.char_spacing != 0.0 {
        canvas.set_char_spacing(style.char_spacing);
    }
    draw(&mut *canvas, y);
    if style.underline || style.strike {
        canvas.set_stroke_color(color);
        canvas.set_line_width((size * 0.05).max(0.5));
        canvas.set_dash(&[]);
        if style.underline {
            let uy = y + size * 0.12;
            canvas.line(x, uy, x + width, uy);
        }
        if style.strike {
            let sy = y - size * 0.3;
            canvas.line(x, sy, x + width, sy);
        }
    }
    canvas.restore_state();
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::canvas::{CanvasOp, RecordingCanvas};
    use crate::fonts::FontBook;
    use crate::geometry::Size;
    use crate::layout::{LayoutContext, layout_paragraph};
    use crate::model::{FieldKind, Paragraph, ParagraphStyle, Run, VertAlign};
    use crate::numbering::FirstReferenceNotes;
    use crate::text::TextMetrics;

    fn paint(para: &Paragraph, width: f32, page_number: u32) -> Vec<CanvasOp> {
        let fonts = FontBook::builtin();
        let metrics = TextMetrics::new(&fonts);
        let layout = layout_paragraph(&LayoutContext::plain(&metrics), para, None, width);
        let notes = FirstReferenceNotes::default();
        let ctx = RenderContext {
            page_number,
            page_total: 9,
            now: NaiveDate::from_ymd_opt(2024, 1, 2)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap(),
            notes: &notes,
        };
        let mut canvas = RecordingCanvas::new();
        canvas.begin_page(Size::letter());
        paint_paragraph(&mut canvas, &layout, 0.0, 0.0, &ctx).unwrap();
        canvas.into_pages().remove(0).ops
    }

    fn texts(ops: &[CanvasOp]) -> Vec<(f32, f32, String)> {
        ops.iter()
            .filter_map(|op| match op {
                CanvasOp::Text { x, y, text } => Some((*x, *y, text.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn right_alignment_uses_leftover_width() {
        let para = Paragraph {
            style: ParagraphStyle {
                alignment: Alignment::Right,
                ..ParagraphStyle::default()
            },
            ..Paragraph::plain("mm", TextStyle::sized(10.0))
        };
        let drawn = texts(&paint(&para, 100.0, 1));
        assert_eq!(drawn.len(), 1);
        assert!((drawn[0].0 - (100.0 - 16.66)).abs() < 1e-3);
    }

    #[test]
    fn justified_lines_fill_available_width() {
        let para = Paragraph {
            style: ParagraphStyle {
                alignment: Alignment::Justify,
                ..ParagraphStyle::default()
            },
            ..Paragraph::plain("aa bb cc dd ee ff gg hh ii jj kk ll", TextStyle::sized(10.0))
        };
        let ops = paint(&para, 60.0, 1);
        let drawn = texts(&ops);
        let first_line_y = drawn[0].1;
        let first: Vec<_> = drawn.iter().filter(|t| t.1 == first_line_y).collect();
        assert!(first.len() > 1);
        let last = first[first.len() - 1];
        // last word of a justified line ends at the right edge
        assert!((last.0 + 11.12 - 60.0).abs() < 0.01, "{last:?}");
    }

    #[test]
    fn superscript_is_raised_and_shrunk() {
        let style = TextStyle {
            vertical_align: VertAlign::Superscript,
            ..TextStyle::sized(10.0)
        };
        let para = Paragraph {
            runs: vec![Run::text("x", TextStyle::sized(10.0)), Run::text("2", style)],
            ..Paragraph::default()
        };
        let ops = paint(&para, 200.0, 1);
        let drawn = texts(&ops);
        assert_eq!(drawn.len(), 2);
        assert!((drawn[0].1 - drawn[1].1 - 3.3).abs() < 1e-3);
        assert!(ops.iter().any(|op| matches!(op, CanvasOp::Font { size, .. } if (*size - 5.8).abs() < 1e-4)));
    }

    #[test]
    fn page_field_resolves_at_paint_time() {
        let para = Paragraph {
            runs: vec![
                Run::text("Page ", TextStyle::sized(10.0)),
                Run::field(FieldKind::Page, TextStyle::sized(10.0)),
            ],
            ..Paragraph::default()
        };
        let on_four: Vec<String> = texts(&paint(&para, 200.0, 4)).into_iter().map(|t| t.2).collect();
        let on_seven: Vec<String> = texts(&paint(&para, 200.0, 7)).into_iter().map(|t| t.2).collect();
        assert_eq!(on_four, vec!["Page ", "4"]);
        assert_eq!(on_seven, vec!["Page ", "7"]);
    }

    #[test]
    fn hyperlink_registers_region_of_run() {
        let fonts = FontBook::builtin();
        let metrics = TextMetrics::new(&fonts);
        let mut run = Run::text("link", TextStyle::sized(10.0));
        run.hyperlink = Some("https://example.com".to_string());
        let para = Paragraph {
            runs: vec![run],
            ..Paragraph::default()
        };
        let layout = layout_paragraph(&LayoutContext::plain(&metrics), &para, None, 200.0);
        let notes = FirstReferenceNotes::default();
        let ctx = RenderContext {
            page_number: 1,
            page_total: 1,
            now: chrono::NaiveDateTime::default(),
            notes: &notes,
        };
        let mut canvas = RecordingCanvas::new();
        canvas.begin_page(Size::letter());
        paint_paragraph(&mut canvas, &layout, 10.0, 20.0, &ctx).unwrap();
        let page = canvas.into_pages().remove(0);
        assert_eq!(page.links.len(), 1);
        let rect = page.links[0].rect;
        assert_eq!(rect.x, 10.0);
        assert!((rect.width - metrics.width("link", &TextStyle::sized(10.0))).abs() < 1e-4);
    }

    #[test]
    fn words_split_on_breaking_spaces_only() {
        assert_eq!(words("a b\u{a0}c  d"), vec![(0, "a"), (2, "b\u{a0}c"), (8, "d")]);
    }
}
