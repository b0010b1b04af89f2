//! Greedy line breaking over mixed runs.
//!
//! Words may span runs ("bold" + ","), so breaks only happen at whitespace,
//! tabs, explicit breaks and around inline objects. Whitespace belongs to the
//! run that contains it; whitespace at a break is dropped, so every space that
//! ends up in a line is a gap between two words.

use crate::layout::paragraph::layout_textbox;
use crate::layout::{FieldItem, InlineItem, InlineKind, Line, NoteItem, NoteRef, TextItem};
use crate::model::{FieldKind, LineSpacing, Run, RunContent, TabAlignment, TabStop, TextStyle, VertAlign};
use crate::numbering::NoteNumbering;

use super::{TextMetrics, display_text};

/// Marker painted in front of the first line of a list item.
#[derive(Clone, Debug, PartialEq)]
pub struct ListMarker {
    pub text: String,
    pub style: TextStyle,
    /// Absolute tab position after the marker.
    pub tab: Option<f32>,
}

/// Geometry of the text area, all x values measured from the paragraph frame's left edge.
#[derive(Clone, Copy)]
pub struct BreakOptions<'a> {
    pub first_line: f32,
    pub left: f32,
    pub right: f32,
    pub spacing: LineSpacing,
    pub tab_stops: &'a [TabStop],
    pub marker: Option<&'a ListMarker>,
    pub notes: Option<&'a dyn NoteNumbering>,
}

impl Default for BreakOptions<'_> {
    fn default() -> Self {
        Self {
            first_line: 0.0,
            left: 0.0,
            right: f32::INFINITY,
            spacing: LineSpacing::Auto(1.0),
            tab_stops: &[],
            marker: None,
            notes: None,
        }
    }
}

pub(crate) fn is_break_space(c: char) -> bool {
    c.is_whitespace() && c != '\u{a0}'
}

enum Atom {
    Word { run: usize, text: String },
    Space { run: usize, text: String },
    /// Field or note reference; glued to neighbouring words.
    Inline { run: usize },
    Object { run: usize },
    Tab { run: usize },
    Break { run: usize },
}

fn atoms(runs: &[Run]) -> Vec<Atom> {
    let mut out = Vec::new();
    for (run, r) in runs.iter().enumerate() {
        match &r.content {
            RunContent::Text { text } => {
                let shown = display_text(text, &r.style);
                let mut current = String::new();
                let mut in_space = false;
                for c in shown.chars() {
                    let space = is_break_space(c);
                    if space != in_space && !current.is_empty() {
                        let text = std::mem::take(&mut current);
                        out.push(if in_space {
                            Atom::Space { run, text }
                        } else {
                            Atom::Word { run, text }
                        });
                    }
                    in_space = space;
                    current.push(c);
                }
                if !current.is_empty() {
                    out.push(if in_space {
                        Atom::Space { run, text: current }
                    } else {
                        Atom::Word { run, text: current }
                    });
                }
            }
            RunContent::Tab => out.push(Atom::Tab { run }),
            RunContent::LineBreak => out.push(Atom::Break { run }),
            RunContent::Field { .. } | RunContent::FootnoteRef { .. } | RunContent::EndnoteRef { .. } => {
                out.push(Atom::Inline { run })
            }
            RunContent::Image { .. } | RunContent::Textbox { .. } => out.push(Atom::Object { run }),
        }
    }
    out
}

/// Width reserved for a field whose value is only known at paint time.
pub fn field_placeholder(field: FieldKind, cached: &str) -> &str {
    if !cached.is_empty() {
        return cached;
    }
    match field {
        FieldKind::Page | FieldKind::NumPages => "99",
        FieldKind::Date => "00/00/0000",
        FieldKind::Time => "00:00",
        FieldKind::Other => "",
    }
}

pub fn note_style(style: &TextStyle) -> TextStyle {
    TextStyle {
        vertical_align: VertAlign::Superscript,
        ..style.clone()
    }
}

fn next_tab_stop(abs_x: f32, stops: &[TabStop], interval: f32) -> TabStop {
    if let Some(stop) = stops.iter().find(|s| s.position > abs_x + 0.5) {
        return stop.clone();
    }
    let interval = if interval > 0.0 { interval } else { 36.0 };
    TabStop {
        position: ((abs_x / interval).floor() + 1.0) * interval,
        alignment: TabAlignment::Left,
        leader: None,
    }
}

struct Prepared {
    item: InlineItem,
    /// Text from this run may merge into the previous item.
    merge_run: Option<usize>,
    height: f32,
}

struct LineBuilder {
    items: Vec<InlineItem>,
    cursor: f32,
    has_content: bool,
    /// Only the list marker is on the line; leading spaces are dropped.
    after_marker: bool,
    tabbed: bool,
    last_run: Option<usize>,
    text_height: f32,
    ascent: f32,
    descent: f32,
}

impl LineBuilder {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            cursor: 0.0,
            has_content: false,
            after_marker: false,
            tabbed: false,
            last_run: None,
            text_height: 0.0,
            ascent: 0.0,
            descent: 0.0,
        }
    }

    fn push(&mut self, prepared: Prepared) {
        let Prepared {
            mut item,
            merge_run,
            height,
        } = prepared;
        self.text_height = self.text_height.max(height);
        self.ascent = self.ascent.max(item.ascent);
        self.descent = self.descent.max(item.descent);
        let width = item.width;

        let merged = match (self.items.last_mut(), &item.kind) {
            (Some(last), InlineKind::Text(next)) if merge_run.is_some() && merge_run == self.last_run => {
                if let InlineKind::Text(prev) = &mut last.kind {
                    let dx = last.width;
                    let dc = prev.text.len();
                    prev.glyphs.extend(next.glyphs.iter().map(|g| super::Glyph {
                        x: g.x + dx,
                        cluster: g.cluster + dc,
                        ..*g
                    }));
                    prev.text.push_str(&next.text);
                    prev.space_count += next.space_count;
                    last.width += width;
                    true
                } else {
                    false
                }
            }
            _ => false,
        };
        if !merged {
            item.x = self.cursor;
            self.items.push(item);
        }
        self.cursor += width;
        self.has_content = true;
        self.last_run = merge_run;
    }
}

impl TextMetrics<'_> {
    fn prepare_text(&self, run: &Run, run_idx: usize, text: &str, spaces: usize, spacing: LineSpacing) -> Prepared {
        let shaped = self.shape(text, &run.style);
        let (ascent, descent) = self.extents(&run.style);
        Prepared {
            item: InlineItem {
                x: 0.0,
                width: shaped.width,
                ascent,
                descent,
                kind: InlineKind::Text(TextItem {
                    text: text.to_string(),
                    font: self.fonts().resolve_style(&run.style).key.clone(),
                    style: run.style.clone(),
                    glyphs: shaped.glyphs,
                    space_count: spaces,
                    hyperlink: run.hyperlink.clone(),
                }),
            },
            merge_run: Some(run_idx),
            height: self.line_height(&run.style, spacing),
        }
    }

    fn prepare_inline(&self, run: &Run, opts: &BreakOptions) -> Option<Prepared> {
        let height = self.line_height(&run.style, opts.spacing);
        let kind_and_style = match &run.content {
            RunContent::Field {
                field,
                format,
                cached,
            } => {
                let width = self.width(field_placeholder(*field, cached), &run.style);
                let item = InlineKind::Field(FieldItem {
                    field: *field,
                    format: format.clone(),
                    cached: cached.clone(),
                    font: self.fonts().resolve_style(&run.style).key.clone(),
                    style: run.style.clone(),
                    hyperlink: run.hyperlink.clone(),
                });
                (item, run.style.clone(), width)
            }
            RunContent::FootnoteRef { id } | RunContent::EndnoteRef { id } => {
                let note = match run.content {
                    RunContent::FootnoteRef { .. } => NoteRef::Footnote(*id),
                    _ => NoteRef::Endnote(*id),
                };
                let number = match (opts.notes, note) {
                    (Some(n), NoteRef::Footnote(id)) => n.footnote_number(id),
                    (Some(n), NoteRef::Endnote(id)) => n.endnote_number(id),
                    (None, _) => *id,
                };
                let style = note_style(&run.style);
                let width = self.width(&number.to_string(), &style);
                let item = InlineKind::Note(NoteItem {
                    note,
                    font: self.fonts().resolve_style(&style).key.clone(),
                    style: style.clone(),
                });
                (item, style, width)
            }
            _ => return None,
        };
        let (kind, style, width) = kind_and_style;
        let (ascent, descent) = self.extents(&style);
        Some(Prepared {
            item: InlineItem {
                x: 0.0,
                width,
                ascent,
                descent,
                kind,
            },
            merge_run: None,
            height,
        })
    }

    fn prepare_object(&self, run: &Run) -> Option<Prepared> {
        let (kind, width, height) = match &run.content {
            RunContent::Image { image } => (InlineKind::Image(image.clone()), image.width, image.height),
            RunContent::Textbox { textbox } => {
                let layout = layout_textbox(self, textbox);
                let (w, h) = (layout.size.width, layout.size.height);
                (InlineKind::Textbox(Box::new(layout)), w, h)
            }
            _ => return None,
        };
        Some(Prepared {
            item: InlineItem {
                x: 0.0,
                width,
                ascent: height,
                descent: 0.0,
                kind,
            },
            merge_run: None,
            height: 0.0,
        })
    }

    fn atom_width(&self, runs: &[Run], atom: &Atom, opts: &BreakOptions) -> f32 {
        match atom {
            Atom::Word { run, text } | Atom::Space { run, text } => self.width(text, &runs[*run].style),
            Atom::Inline { run } => self
                .prepare_inline(&runs[*run], opts)
                .map(|p| p.item.width)
                .unwrap_or(0.0),
            Atom::Object { run } => match &runs[*run].content {
                RunContent::Image { image } => image.width,
                RunContent::Textbox { textbox } => textbox.width,
                _ => 0.0,
            },
            Atom::Tab { .. } | Atom::Break { .. } => 0.0,
        }
    }

    /// Width the text after a tab occupies before the stop's alignment point.
    fn tab_segment_width(&self, runs: &[Run], rest: &[Atom], alignment: TabAlignment, opts: &BreakOptions) -> f32 {
        let mut width = 0.0;
        for atom in rest {
            if matches!(atom, Atom::Tab { .. } | Atom::Break { .. }) {
                break;
            }
            if alignment == TabAlignment::Decimal
                && let Atom::Word { run, text } = atom
                && let Some(dot) = text.find('.')
            {
                return width + self.width(&text[..dot], &runs[*run].style);
            }
            width += self.atom_width(runs, atom, opts);
        }
        match alignment {
            TabAlignment::Left => 0.0,
            TabAlignment::Center => width / 2.0,
            TabAlignment::Right | TabAlignment::Decimal => width,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_line(
        &self,
        builder: &mut LineBuilder,
        lines: &mut Vec<Line>,
        y: &mut f32,
        x_start: f32,
        available: f32,
        hard_break: bool,
        fallback: &TextStyle,
        spacing: LineSpacing,
    ) {
        let b = std::mem::replace(builder, LineBuilder::new());
        let (ascent, descent, natural) = if b.items.is_empty() {
            let (a, d) = self.extents(fallback);
            (a, d, self.line_height(fallback, spacing))
        } else {
            (b.ascent, b.descent, b.text_height.max(b.ascent + b.descent))
        };
        let height = match spacing {
            LineSpacing::Exact(h) => h,
            _ => natural,
        };
        let leading = height - ascent - descent;
        let baseline = *y + ascent + leading.min(0.0);
        let mut content_width = b.items.iter().map(|i| i.x + i.width).fold(0.0, f32::max);
        if b.tabbed {
            content_width = content_width.max(b.cursor);
        }
        lines.push(Line {
            items: b.items,
            baseline,
            height,
            x_start,
            available_width: if available.is_finite() { available } else { content_width },
            content_width,
            is_last: false,
            hard_break,
            tabbed: b.tabbed,
        });
        *y += height;
    }

    /// Lay out a paragraph's runs into lines.
    pub fn layout_runs(&self, runs: &[Run], opts: &BreakOptions) -> Vec<Line> {
        let atoms = atoms(runs);
        let mut lines: Vec<Line> = Vec::new();
        let mut builder = LineBuilder::new();
        let mut pending: Vec<usize> = Vec::new(); // indices of Space atoms
        let mut y = 0.0f32;
        let mut last_style = runs.first().map(|r| r.style.clone()).unwrap_or_default();
        let mut ended_with_break = false;

        let geometry = |line_idx: usize| -> (f32, f32) {
            let x = if line_idx == 0 { opts.first_line } else { opts.left };
            (x, opts.right - x)
        };

        if let Some(marker) = opts.marker {
            let shaped = self.shape(&marker.text, &marker.style);
            let (ascent, descent) = self.extents(&marker.style);
            builder.push(Prepared {
                item: InlineItem {
                    x: 0.0,
                    width: shaped.width,
                    ascent,
                    descent,
                    kind: InlineKind::Marker(TextItem {
                        text: marker.text.clone(),
                        font: self.fonts().resolve_style(&marker.style).key.clone(),
                        style: marker.style.clone(),
                        glyphs: shaped.glyphs,
                        space_count: 0,
                        hyperlink: None,
                    }),
                },
                merge_run: None,
                height: self.line_height(&marker.style, opts.spacing),
            });
            let first = opts.first_line;
            let marker_end = first + shaped.width;
            let target = marker
                .tab
                .filter(|t| *t > marker_end)
                .or_else(|| (opts.left > marker_end).then_some(opts.left))
                .unwrap_or_else(|| next_tab_stop(marker_end, &[], self.tab_interval()).position);
            builder.cursor = target - first;
            builder.last_run = None;
            builder.after_marker = true;
        }

        let mut i = 0;
        while i < atoms.len() {
            match &atoms[i] {
                Atom::Space { .. } => {
                    pending.push(i);
                    i += 1;
                }
                Atom::Break { run } => {
                    last_style = runs[*run].style.clone();
                    pending.clear();
                    let (x, avail) = geometry(lines.len());
                    self.finish_line(&mut builder, &mut lines, &mut y, x, avail, true, &last_style, opts.spacing);
                    ended_with_break = true;
                    i += 1;
                }
                Atom::Tab { run } => {
                    pending.clear();
                    let run_ref = &runs[*run];
                    last_style = run_ref.style.clone();
                    let rest = &atoms[i + 1..];
                    let resolve = |cursor: f32, x_start: f32| {
                        let stop = next_tab_stop(x_start + cursor, opts.tab_stops, self.tab_interval());
                        let shift = self.tab_segment_width(runs, rest, stop.alignment, opts);
                        let target = (stop.position - x_start - shift).max(cursor);
                        (stop, target)
                    };
                    let (mut x_start, mut avail) = geometry(lines.len());
                    let (mut stop, mut target) = resolve(builder.cursor, x_start);
                    if target > avail && builder.has_content {
                        self.finish_line(&mut builder, &mut lines, &mut y, x_start, avail, false, &last_style, opts.spacing);
                        (x_start, avail) = geometry(lines.len());
                        (stop, target) = resolve(builder.cursor, x_start);
                    }
                    log::trace!("tab to {:.1} (line at {x_start:.1}, {avail:.1} wide)", stop.position);
                    self.push_leader(&mut builder, run_ref, &stop, target, opts.spacing);
                    builder.cursor = target;
                    builder.tabbed = true;
                    builder.has_content = true;
                    builder.after_marker = false;
                    builder.last_run = None;
                    ended_with_break = false;
                    i += 1;
                }
                Atom::Object { run } => {
                    let Some(prepared) = self.prepare_object(&runs[*run]) else {
                        i += 1;
                        continue;
                    };
                    self.place_unit(&mut builder, &mut lines, &mut y, &mut pending, runs, &atoms, vec![prepared], &last_style, opts);
                    ended_with_break = false;
                    i += 1;
                }
                Atom::Word { .. } | Atom::Inline { .. } => {
                    let mut unit = Vec::new();
                    while i < atoms.len() {
                        match &atoms[i] {
                            Atom::Word { run, text } => {
                                last_style = runs[*run].style.clone();
                                unit.push(self.prepare_text(&runs[*run], *run, text, 0, opts.spacing));
                            }
                            Atom::Inline { run } => {
                                last_style = runs[*run].style.clone();
                                unit.extend(self.prepare_inline(&runs[*run], opts));
                            }
                            _ => break,
                        }
                        i += 1;
                    }
                    self.place_unit(&mut builder, &mut lines, &mut y, &mut pending, runs, &atoms, unit, &last_style, opts);
                    ended_with_break = false;
                }
            }
        }

        if builder.has_content || lines.is_empty() || ended_with_break {
            let (x, avail) = geometry(lines.len());
            self.finish_line(&mut builder, &mut lines, &mut y, x, avail, false, &last_style, opts.spacing);
        }
        if let Some(last) = lines.last_mut() {
            last.is_last = true;
        }
        lines
    }

    #[allow(clippy::too_many_arguments)]
    fn place_unit(
        &self,
        builder: &mut LineBuilder,
        lines: &mut Vec<Line>,
        y: &mut f32,
        pending: &mut Vec<usize>,
        runs: &[Run],
        atoms: &[Atom],
        unit: Vec<Prepared>,
        fallback: &TextStyle,
        opts: &BreakOptions,
    ) {
        let unit_width: f32 = unit.iter().map(|p| p.item.width).sum();
        let started = builder.has_content && !builder.after_marker;
        let spaces: Vec<Prepared> = if started {
            pending
                .iter()
                .filter_map(|&idx| match &atoms[idx] {
                    Atom::Space { run, text } => {
                        let count = text.chars().count();
                        Some(self.prepare_text(&runs[*run], *run, text, count, opts.spacing))
                    }
                    _ => None,
                })
                .collect()
        } else {
            Vec::new()
        };
        pending.clear();
        let space_width: f32 = spaces.iter().map(|p| p.item.width).sum();

        let line_idx = lines.len();
        let (x_start, available) = if line_idx == 0 {
            (opts.first_line, opts.right - opts.first_line)
        } else {
            (opts.left, opts.right - opts.left)
        };

        if started && builder.cursor + space_width + unit_width > available {
            self.finish_line(builder, lines, y, x_start, available, false, fallback, opts.spacing);
        } else {
            for space in spaces {
                builder.push(space);
            }
        }
        for prepared in unit {
            builder.push(prepared);
        }
        builder.after_marker = false;
    }

    fn push_leader(&self, builder: &mut LineBuilder, run: &Run, stop: &TabStop, target: f32, spacing: LineSpacing) {
        let Some(leader) = stop.leader.filter(|c| !c.is_whitespace()) else {
            return;
        };
        let char_w = self.width(&leader.to_string(), &run.style);
        let gap = target - builder.cursor;
        if char_w <= 0.0 || gap <= char_w * 2.0 {
            return;
        }
        let count = ((gap - char_w) / char_w).floor() as usize;
        if count == 0 {
            return;
        }
        let text: String = std::iter::repeat_n(leader, count).collect();
        let mut prepared = self.prepare_text(run, usize::MAX, &text, 0, spacing);
        prepared.merge_run = None;
        builder.cursor = target - prepared.item.width;
        builder.last_run = None;
        builder.push(prepared);
    }
}
