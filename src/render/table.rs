use crate::canvas::Canvas;
use crate::error::RenderError;
use crate::layout::{CellLayout, TableLayout};

use super::{RenderContext, paint_stack, stroke_edge};

/// Paint a table whose top-left corner is at (x, y). Shading first, then
/// content, then borders so that borders are never covered.
pub fn paint_table(
    canvas: &mut dyn Canvas,
    layout: &TableLayout,
    x: f32,
    y: f32,
    ctx: &RenderContext,
) -> Result<(), RenderError> {
    for cell in &layout.cells {
        if let Some(fill) = cell.shading {
            canvas.save_state();
            canvas.set_fill_color(fill);
            canvas.rect(offset(cell, x, y), true, false);
            canvas.restore_state();
        }
    }
    for cell in &layout.cells {
        let content = cell.content_rect();
        paint_stack(
            canvas,
            &cell.paragraphs,
            x + content.x,
            y + content.y + cell.content_offset,
            ctx,
        )?;
    }
    for cell in &layout.cells {
        paint_borders(canvas, cell, x, y);
    }
    Ok(())
}

fn offset(cell: &CellLayout, x: f32, y: f32) -> crate::geometry::Rect {
    crate::geometry::Rect::new(x + cell.rect.x, y + cell.rect.y, cell.rect.width, cell.rect.height)
}

fn paint_borders(canvas: &mut dyn Canvas, cell: &CellLayout, x: f32, y: f32) {
    let r = offset(cell, x, y);
    let b = &cell.borders;
    if let Some(top) = &b.top {
        stroke_edge(canvas, top, (r.x, r.y), (r.right(), r.y), (0.0, 1.0));
    }
    if let Some(bottom) = &b.bottom {
        stroke_edge(canvas, bottom, (r.x, r.bottom()), (r.right(), r.bottom()), (0.0, -1.0));
    }
    if let Some(left) = &b.left {
        stroke_edge(canvas, left, (r.x, r.y), (r.x, r.bottom()), (1.0, 0.0));
    }
    if let Some(right) = &b.right {
        stroke_edge(canvas, right, (r.right(), r.y), (r.right(), r.bottom()), (-1.0, 0.0));
    }
}
