use crate::geometry::{Rect, Size};
use crate::model::{BorderLine, FloatingContent, LineSpacing, Paragraph, Textbox};
use crate::numbering::{ListPlan, NoteNumbering, resolve_indent};
use crate::text::{BreakOptions, ListMarker, TextMetrics};

use super::{Overlay, OverlayContent, ParagraphLayout, PlacedParagraph, TextboxLayout, layout_stack, stack_height};

/// Shared inputs of one layout pass.
#[derive(Clone, Copy)]
pub struct LayoutContext<'a> {
    pub metrics: &'a TextMetrics<'a>,
    /// Numbering decisions indexed by paragraph ordinal.
    pub lists: Option<&'a ListPlan>,
    pub notes: Option<&'a dyn NoteNumbering>,
    /// Document default, used when a paragraph has no spacing of its own.
    pub line_spacing: LineSpacing,
    pub min_row_height: f32,
}

impl<'a> LayoutContext<'a> {
    /// Context without lists or notes, for self-contained content like textboxes.
    pub fn plain(metrics: &'a TextMetrics<'a>) -> Self {
        Self {
            metrics,
            lists: None,
            notes: None,
            line_spacing: LineSpacing::default(),
            min_row_height: 0.0,
        }
    }
}

fn side_inset(border: &Option<BorderLine>) -> f32 {
    border
        .as_ref()
        .filter(|b| b.is_visible())
        .map(|b| b.width + b.space)
        .unwrap_or(0.0)
}

/// Break a paragraph into lines for a column `width` points wide.
///
/// `ordinal` is the paragraph's position in document order and selects its
/// list entry; paragraphs outside the numbered flow pass `None`.
pub fn layout_paragraph(ctx: &LayoutContext, para: &Paragraph, ordinal: Option<usize>, width: f32) -> ParagraphLayout {
    let entry = ordinal.and_then(|o| ctx.lists.and_then(|plan| plan.entry(o)));
    let indent = match entry {
        Some(entry) => entry.indent(para),
        None => resolve_indent(&para.indent, None, &para.style.indent, false),
    };
    let marker = entry.and_then(|e| {
        e.marker.as_ref().map(|text| ListMarker {
            text: text.clone(),
            style: e.marker_style.clone().unwrap_or_else(|| para.first_style()),
            tab: e.tab,
        })
    });

    let border_left = side_inset(&para.style.borders.left);
    let border_right = side_inset(&para.style.borders.right);
    let opts = BreakOptions {
        first_line: indent.first_line + border_left,
        left: indent.left + border_left,
        right: (width - indent.right - border_right).max(indent.left + border_left),
        spacing: para.style.line_spacing.unwrap_or(ctx.line_spacing),
        tab_stops: &para.style.tab_stops,
        marker: marker.as_ref(),
        notes: ctx.notes,
    };
    let lines = ctx.metrics.layout_runs(&para.runs, &opts);

    let overlays = para
        .floats
        .iter()
        .map(|float| match &float.content {
            FloatingContent::Image { image } => Overlay {
                rect: Rect::new(float.offset_x, float.offset_y, image.width, image.height),
                content: OverlayContent::Image(image.clone()),
            },
            FloatingContent::Textbox { textbox } => {
                let layout = layout_textbox(ctx.metrics, textbox);
                Overlay {
                    rect: Rect::new(float.offset_x, float.offset_y, layout.size.width, layout.size.height),
                    content: OverlayContent::Textbox(layout),
                }
            }
        })
        .collect();

    ParagraphLayout {
        style: para.style.clone(),
        indent,
        lines,
        space_before: para.style.space_before,
        space_after: para.style.space_after,
        overlays,
        width,
    }
}

/// Lay out a self-contained textbox's content, without lists or notes.
pub fn layout_textbox(metrics: &TextMetrics, tb: &Textbox) -> TextboxLayout {
    layout_textbox_with(&LayoutContext::plain(metrics), tb, None)
}

/// Lay out a textbox inside the document flow. `ordinal_base` is the
/// document-order position of its first paragraph, so numbered paragraphs
/// pick up their list markers. Without a fixed height the box grows to fit.
pub fn layout_textbox_with(ctx: &LayoutContext, tb: &Textbox, ordinal_base: Option<usize>) -> TextboxLayout {
    let inner = (tb.width - tb.padding.horizontal()).max(0.0);
    let paragraphs: Vec<PlacedParagraph> = layout_stack(ctx, &tb.paragraphs, ordinal_base, inner);
    let height = tb
        .height
        .unwrap_or_else(|| stack_height(&paragraphs) + tb.padding.vertical());
    TextboxLayout {
        size: Size::new(tb.width, height),
        padding: tb.padding,
        border: tb.border.clone(),
        fill: tb.fill,
        paragraphs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::FontBook;
    use crate::model::{
        AbstractNumbering, Alignment, Indent, LevelDefinition, NumberFormat, NumberingDefinitions,
        NumberingInstance, NumberingRef, ParagraphBorders, ParagraphStyle, TextStyle,
    };
    use std::collections::{BTreeMap, HashMap};

    fn numbered(num_id: &str, text: &str) -> Paragraph {
        Paragraph {
            numbering: Some(NumberingRef {
                num_id: num_id.to_string(),
                level: 0,
            }),
            ..Paragraph::plain(text, TextStyle::sized(10.0))
        }
    }

    fn definitions() -> NumberingDefinitions {
        let mut levels = BTreeMap::new();
        levels.insert(
            0,
            LevelDefinition {
                format: NumberFormat::Decimal,
                text: "%1.".to_string(),
                start: 1,
                restart_after_higher: true,
                indent_left: Some(36.0),
                hanging: Some(18.0),
                first_line: None,
                tab: None,
                marker_style: None,
            },
        );
        let mut abstracts = HashMap::new();
        abstracts.insert("a".to_string(), AbstractNumbering { levels });
        let mut instances = HashMap::new();
        instances.insert(
            "1".to_string(),
            NumberingInstance {
                abstract_id: "a".to_string(),
                overrides: BTreeMap::new(),
            },
        );
        NumberingDefinitions { abstracts, instances }
    }

    #[test]
    fn paragraph_height_adds_spacing_and_lines() {
        let fonts = FontBook::builtin();
        let metrics = TextMetrics::new(&fonts);
        let ctx = LayoutContext::plain(&metrics);
        let mut para = Paragraph::plain("one two three", TextStyle::sized(10.0));
        para.style.space_before = 6.0;
        para.style.space_after = 4.0;
        let layout = layout_paragraph(&ctx, &para, None, 400.0);
        assert_eq!(layout.lines.len(), 1);
        assert!((layout.height() - (6.0 + 10.0 + 4.0)).abs() < 1e-3);
    }

    #[test]
    fn indents_shift_lines() {
        let fonts = FontBook::builtin();
        let metrics = TextMetrics::new(&fonts);
        let ctx = LayoutContext::plain(&metrics);
        let mut para = Paragraph::plain("word ".repeat(40), TextStyle::sized(10.0));
        para.indent = Indent {
            left: Some(20.0),
            first_line: Some(15.0),
            ..Indent::default()
        };
        let layout = layout_paragraph(&ctx, &para, None, 300.0);
        assert!(layout.lines.len() > 1);
        assert_eq!(layout.lines[0].x_start, 35.0);
        assert_eq!(layout.lines[1].x_start, 20.0);
        assert!(layout.lines[1].available_width <= 280.0);
    }

    #[test]
    fn list_entry_adds_marker_in_hanging_area() {
        let fonts = FontBook::builtin();
        let metrics = TextMetrics::new(&fonts);
        let defs = definitions();
        let paras = [numbered("1", "first"), numbered("1", "second")];
        let refs: Vec<&Paragraph> = paras.iter().collect();
        let plan = ListPlan::build_with(&refs, &defs);
        let ctx = LayoutContext {
            lists: Some(&plan),
            ..LayoutContext::plain(&metrics)
        };
        let layout = layout_paragraph(&ctx, &paras[1], Some(1), 300.0);
        let line = &layout.lines[0];
        assert_eq!(line.x_start, 18.0);
        match &line.items[0].kind {
            super::super::InlineKind::Marker(m) => assert_eq!(m.text, "2."),
            other => panic!("expected marker, got {other:?}"),
        }
    }

    #[test]
    fn visible_borders_inset_text() {
        let fonts = FontBook::builtin();
        let metrics = TextMetrics::new(&fonts);
        let ctx = LayoutContext::plain(&metrics);
        let para = Paragraph {
            style: ParagraphStyle {
                alignment: Alignment::Left,
                borders: ParagraphBorders {
                    left: Some(BorderLine::single(1.0)),
                    top: Some(BorderLine::single(1.0)),
                    ..ParagraphBorders::default()
                },
                ..ParagraphStyle::default()
            },
            ..Paragraph::plain("boxed", TextStyle::sized(10.0))
        };
        let layout = layout_paragraph(&ctx, &para, None, 200.0);
        assert_eq!(layout.lines[0].x_start, 1.0);
        assert_eq!(layout.content_top(), 1.0);
    }

    #[test]
    fn textbox_grows_to_content() {
        let fonts = FontBook::builtin();
        let metrics = TextMetrics::new(&fonts);
        let tb = Textbox {
            width: 100.0,
            height: None,
            paragraphs: vec![Paragraph::plain("a", TextStyle::sized(10.0)); 2],
            padding: crate::geometry::Margins::uniform(5.0),
            border: None,
            fill: None,
        };
        let layout = layout_textbox(&metrics, &tb);
        assert_eq!(layout.size.width, 100.0);
        assert!((layout.size.height - 30.0).abs() < 1e-3);
        assert_eq!(layout.paragraphs[1].y, 10.0);
    }
}
