//! Table geometry: column widths, row heights, merged cells and borders.

use std::ops::Range;

use crate::error::GeometryError;
use crate::geometry::{Margins, Rect};
use crate::model::{BorderLine, CellVAlign, Table, TableCell, VMerge};

use super::paragraph::LayoutContext;
use super::{Line, PlacedParagraph, layout_stack, stack_height};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RowLayout {
    pub y: f32,
    pub height: f32,
}

/// Borders that actually paint around one cell, after precedence.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedBorders {
    pub top: Option<BorderLine>,
    pub right: Option<BorderLine>,
    pub bottom: Option<BorderLine>,
    pub left: Option<BorderLine>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CellLayout {
    pub row: usize,
    pub col: usize,
    pub col_span: usize,
    pub row_span: usize,
    /// Relative to the table's top-left corner, covering every spanned row and column.
    pub rect: Rect,
    pub margins: Margins,
    pub borders: ResolvedBorders,
    pub shading: Option<[u8; 3]>,
    pub v_align: CellVAlign,
    /// Vertical offset of the content inside the cell's inner box.
    pub content_offset: f32,
    pub paragraphs: Vec<PlacedParagraph>,
}

impl CellLayout {
    pub fn content_rect(&self) -> Rect {
        self.rect.inset(&self.margins)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableLayout {
    pub columns: Vec<f32>,
    pub rows: Vec<RowLayout>,
    /// Painted cells only; `continue` cells of a vertical merge have no entry.
    pub cells: Vec<CellLayout>,
    pub width: f32,
    pub height: f32,
}

impl TableLayout {
    pub fn row_bottom(&self, row: usize) -> f32 {
        self.rows.get(row).map(|r| r.y + r.height).unwrap_or(self.height)
    }

    /// Row indices `b` such that a page break before row `b` crosses no
    /// vertical merge. Always ends with the row count.
    pub fn break_points(&self) -> Vec<usize> {
        (1..=self.rows.len())
            .filter(|&b| {
                !self
                    .cells
                    .iter()
                    .any(|c| c.row < b && b < c.row + c.row_span)
            })
            .collect()
    }

    pub fn lines_in_rows(&self, rows: Range<usize>) -> impl Iterator<Item = &Line> {
        self.cells
            .iter()
            .filter(move |c| rows.contains(&c.row))
            .flat_map(|c| c.paragraphs.iter())
            .flat_map(|p| p.layout.lines.iter())
    }

    /// Rows `range` as a table of their own, rebased to y = 0. Cells crossing
    /// the slice edge are clipped; a clipped continuation keeps no content.
    pub fn slice(&self, range: Range<usize>) -> TableLayout {
        let end = range.end.min(self.rows.len());
        let start = range.start.min(end);
        if start == end {
            return TableLayout {
                columns: self.columns.clone(),
                width: self.width,
                ..TableLayout::default()
            };
        }
        let top = self.rows[start].y;
        let bottom = self.row_bottom(end - 1);
        let rows = self.rows[start..end]
            .iter()
            .map(|r| RowLayout {
                y: r.y - top,
                height: r.height,
            })
            .collect();
        let cells = self
            .cells
            .iter()
            .filter(|c| c.row < end && c.row + c.row_span > start)
            .map(|c| {
                let mut cell = c.clone();
                let first = c.row.max(start);
                let last = (c.row + c.row_span).min(end);
                let y = self.rows[first].y;
                let h = self.row_bottom(last - 1) - y;
                cell.rect = Rect::new(c.rect.x, y - top, c.rect.width, h);
                cell.row = first - start;
                cell.row_span = last - first;
                if c.row < start {
                    cell.paragraphs.clear();
                }
                cell
            })
            .collect();
        TableLayout {
            columns: self.columns.clone(),
            rows,
            cells,
            width: self.width,
            height: bottom - top,
        }
    }
}

/// Rescale `widths` so they sum to `target`; the last column absorbs rounding.
pub fn fit_columns(widths: &[f32], target: f32) -> Vec<f32> {
    let n = widths.len();
    if n == 0 {
        return Vec::new();
    }
    let sum: f32 = widths.iter().sum();
    let mut out: Vec<f32> = if sum > 0.0 && sum.is_finite() {
        widths.iter().map(|w| w * target / sum).collect()
    } else {
        vec![target / n as f32; n]
    };
    let head: f32 = out[..n - 1].iter().sum();
    out[n - 1] = target - head;
    out
}

fn cell_margins(table: &Table, cell: &TableCell) -> Margins {
    cell.margins.unwrap_or(table.cell_margins).to_margins()
}

/// Minimum (longest word) and preferred (unwrapped) content widths per column.
fn measure_columns(ctx: &LayoutContext, table: &Table, ncols: usize) -> (Vec<f32>, Vec<f32>) {
    let mut min = vec![0.0f32; ncols];
    let mut pref = vec![0.0f32; ncols];
    for row in &table.rows {
        let mut col = 0;
        for cell in &row.cells {
            let span = cell.span();
            if span == 1 && col < ncols && cell.v_merge != VMerge::Continue {
                let pad = cell_margins(table, cell).horizontal();
                for para in &cell.paragraphs {
                    let mut line = 0.0f32;
                    for run in &para.runs {
                        let Some(text) = run.as_text() else { continue };
                        for word in text.split_whitespace() {
                            min[col] = min[col].max(ctx.metrics.width(word, &run.style) + pad);
                        }
                        line += ctx.metrics.width(text, &run.style);
                    }
                    pref[col] = pref[col].max(line + pad);
                }
                min[col] = min[col].max(pad);
                pref[col] = pref[col].max(min[col]);
            }
            col += span;
        }
    }
    (min, pref)
}

fn column_widths(ctx: &LayoutContext, table: &Table, ncols: usize, target: f32) -> Vec<f32> {
    if table.grid.len() >= ncols && table.grid.iter().all(|w| w.is_finite() && *w >= 0.0) {
        return fit_columns(&table.grid[..ncols], target);
    }
    let (min, pref) = measure_columns(ctx, table, ncols);
    let min_sum: f32 = min.iter().sum();
    let pref_sum: f32 = pref.iter().sum();
    let widths: Vec<f32> = if pref_sum <= target || pref_sum <= min_sum {
        pref
    } else if min_sum <= target {
        let factor = (target - min_sum) / (pref_sum - min_sum);
        min.iter().zip(&pref).map(|(lo, hi)| lo + (hi - lo) * factor).collect()
    } else {
        min
    };
    fit_columns(&widths, target)
}

fn pick(cell: &Option<BorderLine>, fallback: Option<&Option<BorderLine>>) -> Option<BorderLine> {
    cell.as_ref()
        .or_else(|| fallback.and_then(Option::as_ref))
        .filter(|b| b.is_visible())
        .cloned()
}

/// Cell border > table inside border (top and left internal edges) > table outer border.
fn resolve_borders(table: &Table, cell: &TableCell, row: usize, col: usize, rows: usize, cols: usize) -> ResolvedBorders {
    let tb = &table.borders;
    ResolvedBorders {
        top: pick(&cell.borders.top, Some(if row == 0 { &tb.top } else { &tb.inside_h })),
        left: pick(&cell.borders.left, Some(if col == 0 { &tb.left } else { &tb.inside_v })),
        bottom: pick(&cell.borders.bottom, (row + 1 >= rows).then_some(&tb.bottom)),
        right: pick(&cell.borders.right, (col + 1 >= cols).then_some(&tb.right)),
    }
}

struct Placed {
    row: usize,
    col: usize,
    col_span: usize,
    row_span: usize,
    cell: usize,
    margins: Margins,
    paragraphs: Vec<PlacedParagraph>,
    content_height: f32,
}

/// Compute the geometry of `table` in a column `available` points wide.
///
/// `ordinal_base` is the document-order ordinal of the first cell paragraph;
/// cell paragraphs are numbered row by row, including `continue` cells.
pub fn layout_table(
    ctx: &LayoutContext,
    table: &Table,
    available: f32,
    ordinal_base: Option<usize>,
) -> TableLayout {
    let ncols = table.column_count();
    if ncols == 0 {
        log::warn!("{}, table skipped", GeometryError::EmptyGrid);
        return TableLayout::default();
    }
    let mut target = table
        .width
        .or_else(|| (!table.grid.is_empty()).then(|| table.grid.iter().sum()))
        .unwrap_or(available)
        .min(available);
    if !target.is_finite() || target <= 0.0 {
        log::warn!("{}, using the column width", GeometryError::NonFinite(format!("table width {target}")));
        target = available.max(0.0);
    }
    let columns = column_widths(ctx, table, ncols, target);
    let col_x: Vec<f32> = columns
        .iter()
        .scan(0.0, |x, w| {
            let start = *x;
            *x += w;
            Some(start)
        })
        .collect();
    let span_width = |col: usize, span: usize| columns[col..col + span].iter().sum::<f32>();

    let nrows = table.rows.len();
    let mut placed: Vec<Placed> = Vec::new();
    let mut ordinal = ordinal_base;

    for (r, row) in table.rows.iter().enumerate() {
        if row.cells.is_empty() {
            log::warn!("{}", GeometryError::EmptyRow { row: r });
        }
        let spanned: usize = row.cells.iter().map(TableCell::span).sum();
        if spanned > ncols {
            log::warn!(
                "{}, clipping",
                GeometryError::SpanOverflow {
                    row: r,
                    spanned,
                    columns: ncols
                }
            );
        }
        let mut col = 0;
        for (i, cell) in row.cells.iter().enumerate() {
            let base = ordinal;
            if let Some(o) = ordinal.as_mut() {
                *o += cell.paragraphs.len();
            }
            let span = cell.span().min(ncols.saturating_sub(col));
            if span == 0 || cell.v_merge == VMerge::Continue {
                col += cell.span();
                continue;
            }
            let row_span = if cell.v_merge == VMerge::Restart {
                1 + merged_rows_below(table, r, col)
            } else {
                1
            };
            let margins = cell_margins(table, cell);
            let inner = (span_width(col, span) - margins.horizontal()).max(0.0);
            let paragraphs = layout_stack(ctx, &cell.paragraphs, base, inner);
            let content_height = stack_height(&paragraphs) + margins.vertical();
            placed.push(Placed {
                row: r,
                col,
                col_span: span,
                row_span: row_span.min(nrows - r),
                cell: i,
                margins,
                paragraphs,
                content_height,
            });
            col += cell.span();
        }
    }

    // Row heights from single-row cells, then grow for merged content.
    let mut heights: Vec<f32> = table
        .rows
        .iter()
        .enumerate()
        .map(|(r, row)| {
            let content = placed
                .iter()
                .filter(|p| p.row == r && p.row_span == 1)
                .map(|p| p.content_height)
                .fold(0.0f32, f32::max);
            let natural = content.max(ctx.min_row_height);
            match (row.height, row.height_exact) {
                (Some(h), true) => h,
                (Some(h), false) => natural.max(h),
                (None, _) => natural,
            }
        })
        .collect();
    for p in placed.iter().filter(|p| p.row_span > 1) {
        let spanned: f32 = heights[p.row..p.row + p.row_span].iter().sum();
        let deficit = p.content_height - spanned;
        if deficit > 0.0 {
            let last = p.row + p.row_span - 1;
            if table.rows[last].height_exact {
                log::debug!("merged cell at row {} overflows exact row {last}", p.row);
            } else {
                heights[last] += deficit;
            }
        }
    }

    let mut y = 0.0;
    let rows: Vec<RowLayout> = heights
        .iter()
        .enumerate()
        .map(|(r, &height)| {
            log::debug!("table row {r}: y={y:.1} height={height:.1}");
            let row = RowLayout { y, height };
            y += height;
            row
        })
        .collect();
    let height = y;

    let cells = placed
        .into_iter()
        .map(|p| {
            let cell = &table.rows[p.row].cells[p.cell];
            let top = rows[p.row].y;
            let h: f32 = rows[p.row..p.row + p.row_span].iter().map(|r| r.height).sum();
            let rect = Rect::new(col_x[p.col], top, span_width(p.col, p.col_span), h);
            let inner = (h - p.margins.vertical()).max(0.0);
            let slack = (inner - stack_height(&p.paragraphs)).max(0.0);
            let v_align = if p.row_span > 1 { CellVAlign::Center } else { cell.v_align };
            let content_offset = match v_align {
                CellVAlign::Top => 0.0,
                CellVAlign::Center => slack / 2.0,
                CellVAlign::Bottom => slack,
            };
            CellLayout {
                row: p.row,
                col: p.col,
                col_span: p.col_span,
                row_span: p.row_span,
                rect,
                margins: p.margins,
                borders: resolve_borders(table, cell, p.row + p.row_span - 1, p.col + p.col_span - 1, nrows, ncols)
                    .with_top_left(resolve_borders(table, cell, p.row, p.col, nrows, ncols)),
                shading: cell.shading,
                v_align,
                content_offset,
                paragraphs: p.paragraphs,
            }
        })
        .collect();

    TableLayout {
        columns,
        rows,
        cells,
        width: target,
        height,
    }
}

impl ResolvedBorders {
    /// Bottom/right edges from `self`, top/left edges from `origin`.
    fn with_top_left(mut self, origin: ResolvedBorders) -> Self {
        self.top = origin.top;
        self.left = origin.left;
        self
    }
}

/// Count `continue` cells directly below the cell starting at grid column `col` of `row`.
fn merged_rows_below(table: &Table, row: usize, col: usize) -> usize {
    table.rows[row + 1..]
        .iter()
        .take_while(|next| {
            let mut x = 0;
            next.cells.iter().any(|c| {
                let here = x == col;
                x += c.span();
                here && c.v_merge == VMerge::Continue
            })
        })
        .count()
}
