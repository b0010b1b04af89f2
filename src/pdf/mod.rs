//! PDF output: replays recorded canvas pages into a PDF document.
//!
//! Canvas coordinates are top-down; every y is flipped against the page
//! height here and transforms are conjugated with the same flip.

mod fonts;
mod images;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use pdf_writer::types::{ActionType, AnnotationType};
use pdf_writer::{Content, Filter, Name, Pdf, Rect as PdfRect, Ref, Str};

use crate::canvas::{CanvasOp, RecordedPage};
use crate::error::Error;
use crate::fonts::{BUILTIN_FAMILY, FontBook, font_key};
use crate::geometry::{Affine, Rect};

use fonts::{PdfFont, register_font};

/// Bezier approximation factor for quarter circles.
const KAPPA: f32 = 0.552_284_8;

struct Resources {
    fonts: HashMap<String, PdfFont>,
    /// Image bytes and their XObject, `None` when the data could not be decoded.
    images: Vec<(Arc<Vec<u8>>, Option<(String, Ref)>)>,
    states: Vec<(u32, String, Ref)>,
}

impl Resources {
    fn image(&self, data: &Arc<Vec<u8>>) -> Option<&(String, Ref)> {
        self.images
            .iter()
            .find(|(bytes, _)| Arc::ptr_eq(bytes, data) || bytes == data)
            .and_then(|(_, xobj)| xobj.as_ref())
    }

    fn state(&self, alpha: f32) -> Option<&str> {
        self.states
            .iter()
            .find(|(bits, _, _)| *bits == alpha.to_bits())
            .map(|(_, name, _)| name.as_str())
    }
}

#[derive(Default)]
struct Usage {
    chars: BTreeMap<String, BTreeSet<char>>,
    images: Vec<Arc<Vec<u8>>>,
    alphas: Vec<f32>,
}

fn default_font() -> String {
    font_key(BUILTIN_FAMILY, false, false)
}

/// Walk every page once to find the characters drawn per font, the distinct
/// images and the opacities in use.
fn collect_usage(pages: &[RecordedPage]) -> Usage {
    let mut usage = Usage::default();
    for page in pages {
        let mut font: Option<String> = None;
        let mut stack: Vec<Option<String>> = Vec::new();
        for op in &page.ops {
            match op {
                CanvasOp::SaveState => stack.push(font.clone()),
                CanvasOp::RestoreState => font = stack.pop().unwrap_or(None),
                CanvasOp::Font { name, .. } => font = Some(name.clone()),
                CanvasOp::Text { text, .. } => {
                    let key = font.clone().unwrap_or_else(default_font);
                    let chars = usage.chars.entry(key).or_default();
                    chars.extend(text.chars());
                    chars.insert(' ');
                }
                CanvasOp::Image { data, .. } => {
                    if !usage.images.iter().any(|d| Arc::ptr_eq(d, data) || d == data) {
                        usage.images.push(Arc::clone(data));
                    }
                }
                CanvasOp::Opacity(alpha) => {
                    if !usage.alphas.iter().any(|a| a.to_bits() == alpha.to_bits()) {
                        usage.alphas.push(*alpha);
                    }
                }
                _ => {}
            }
        }
    }
    usage
}

/// Same transform expressed in PDF space for a page of height `h`.
fn flip_transform(m: &Affine, h: f32) -> [f32; 6] {
    let [a, b, c, d, e, f] = m.0;
    [a, -b, -c, d, c * h + e, h - d * h - f]
}

fn pdf_rect(rect: &Rect, page_height: f32) -> PdfRect {
    PdfRect::new(rect.x, page_height - rect.bottom(), rect.right(), page_height - rect.y)
}

struct PageWriter<'a> {
    content: Content,
    height: f32,
    resources: &'a Resources,
    font: Option<(String, f32)>,
    stack: Vec<Option<(String, f32)>>,
}

impl<'a> PageWriter<'a> {
    fn new(height: f32, resources: &'a Resources) -> Self {
        Self {
            content: Content::new(),
            height,
            resources,
            font: None,
            stack: Vec::new(),
        }
    }

    fn y(&self, y: f32) -> f32 {
        self.height - y
    }

    fn path(&mut self, rect: &Rect, radius: Option<f32>) {
        let x = rect.x;
        let top = self.y(rect.y);
        let bottom = self.y(rect.bottom());
        let r = radius.unwrap_or(0.0).clamp(0.0, rect.width.min(rect.height) / 2.0);
        if r <= 0.0 {
            self.content.rect(x, bottom, rect.width, rect.height);
            return;
        }
        let right = rect.right();
        let k = r * KAPPA;
        let c = &mut self.content;
        c.move_to(x + r, bottom);
        c.line_to(right - r, bottom);
        c.cubic_to(right - r + k, bottom, right, bottom + r - k, right, bottom + r);
        c.line_to(right, top - r);
        c.cubic_to(right, top - r + k, right - r + k, top, right - r, top);
        c.line_to(x + r, top);
        c.cubic_to(x + r - k, top, x, top - r + k, x, top - r);
        c.line_to(x, bottom + r);
        c.cubic_to(x, bottom + r - k, x + r - k, bottom, x + r, bottom);
        c.close_path();
    }

    fn text(&mut self, x: f32, y: f32, text: &str) {
        let (key, size) = self.font.clone().unwrap_or_else(|| (default_font(), 12.0));
        let Some(font) = self.resources.fonts.get(&key) else {
            log::warn!("no font registered for {key}; text dropped");
            return;
        };
        let baseline = self.y(y);
        self.content.begin_text();
        self.content.set_font(Name(font.name.as_bytes()), size);
        self.content.set_text_matrix([1.0, 0.0, 0.0, 1.0, x, baseline]);
        self.content.show(Str(&font.encode(text)));
        self.content.end_text();
    }

    fn op(&mut self, op: &CanvasOp) {
        match op {
            CanvasOp::SaveState => {
                self.stack.push(self.font.clone());
                self.content.save_state();
            }
            CanvasOp::RestoreState => {
                self.font = self.stack.pop().unwrap_or(None);
                self.content.restore_state();
            }
            CanvasOp::FillColor([r, g, b]) => {
                self.content
                    .set_fill_rgb(*r as f32 / 255.0, *g as f32 / 255.0, *b as f32 / 255.0);
            }
            CanvasOp::StrokeColor([r, g, b]) => {
                self.content
                    .set_stroke_rgb(*r as f32 / 255.0, *g as f32 / 255.0, *b as f32 / 255.0);
            }
            CanvasOp::LineWidth(width) => {
                self.content.set_line_width(*width);
            }
            CanvasOp::Dash(pattern) => {
                self.content.set_dash_pattern(pattern.iter().copied(), 0.0);
            }
            CanvasOp::Font { name, size } => self.font = Some((name.clone(), *size)),
            CanvasOp::Opacity(alpha) => {
                if let Some(name) = self.resources.state(*alpha) {
                    self.content.set_parameters(Name(name.as_bytes()));
                }
            }
            CanvasOp::CharSpacing(spacing) => {
                self.content.set_char_spacing(*spacing);
            }
            CanvasOp::Rect {
                rect,
                radius,
                fill,
                stroke,
            } => {
                if !fill && !stroke {
                    return;
                }
                self.path(rect, *radius);
                match (fill, stroke) {
                    (true, true) => self.content.fill_nonzero_and_stroke(),
                    (true, false) => self.content.fill_nonzero(),
                    _ => self.content.stroke(),
                };
            }
            CanvasOp::Line { x1, y1, x2, y2 } => {
                let (y1, y2) = (self.y(*y1), self.y(*y2));
                self.content.move_to(*x1, y1);
                self.content.line_to(*x2, y2);
                self.content.stroke();
            }
            CanvasOp::Text { x, y, text } => self.text(*x, *y, text),
            CanvasOp::Image { rect, data } => {
                let Some((name, _)) = self.resources.image(data) else {
                    return;
                };
                let bottom = self.y(rect.bottom());
                self.content.save_state();
                self.content
                    .transform([rect.width, 0.0, 0.0, rect.height, rect.x, bottom]);
                self.content.x_object(Name(name.as_bytes()));
                self.content.restore_state();
            }
            CanvasOp::Transform(m) => {
                self.content.transform(flip_transform(m, self.height));
            }
        }
    }
}

/// Serialize recorded pages into a complete PDF file.
pub fn write_pdf(pages: &[RecordedPage], book: &FontBook) -> Result<Vec<u8>, Error> {
    if pages.is_empty() {
        return Err(Error::Pdf("document has no pages".into()));
    }
    let t0 = std::time::Instant::now();
    let mut pdf = Pdf::new();
    let mut next_id = 1i32;
    let mut alloc = || {
        let r = Ref::new(next_id);
        next_id += 1;
        r
    };

    let catalog_id = alloc();
    let pages_id = alloc();

    let usage = collect_usage(pages);
    let t_collect = t0.elapsed();

    let mut fonts = HashMap::new();
    for (i, (key, chars)) in usage.chars.iter().enumerate() {
        let face = book.get(key);
        let entry = register_font(&mut pdf, &face, format!("F{}", i + 1), chars, &mut alloc);
        fonts.insert(key.clone(), entry);
    }
    let t_fonts = t0.elapsed();

    let mut images = Vec::with_capacity(usage.images.len());
    let mut image_count = 0;
    for data in usage.images {
        let xobj_ref = alloc();
        let xobj = match images::embed_image(&mut pdf, xobj_ref, &data, &mut alloc) {
            Ok(()) => {
                image_count += 1;
                Some((format!("Im{image_count}"), xobj_ref))
            }
            Err(e) => {
                log::warn!("Image skipped: {e}");
                None
            }
        };
        images.push((data, xobj));
    }
    let t_images = t0.elapsed();

    let mut states = Vec::with_capacity(usage.alphas.len());
    for (i, alpha) in usage.alphas.iter().enumerate() {
        let state_ref = alloc();
        let alpha = alpha.clamp(0.0, 1.0);
        pdf.ext_graphics(state_ref)
            .non_stroking_alpha(alpha)
            .stroking_alpha(alpha);
        states.push((usage.alphas[i].to_bits(), format!("GS{}", i + 1), state_ref));
    }

    let resources = Resources { fonts, images, states };

    let n = pages.len();
    let page_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();
    let content_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();

    for (page, &content_id) in pages.iter().zip(&content_ids) {
        let mut writer = PageWriter::new(page.size.height, &resources);
        for op in &page.ops {
            writer.op(op);
        }
        let raw = writer.content.finish();
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), 6);
        pdf.stream(content_id, &compressed).filter(Filter::FlateDecode);
    }
    let t_content = t0.elapsed();

    let annot_refs: Vec<Vec<Ref>> = pages
        .iter()
        .map(|page| {
            page.links
                .iter()
                .map(|link| {
                    let annot_ref = alloc();
                    let mut annot = pdf.annotation(annot_ref);
                    annot
                        .subtype(AnnotationType::Link)
                        .rect(pdf_rect(&link.rect, page.size.height))
                        .border(0.0, 0.0, 0.0, None);
                    annot
                        .action()
                        .action_type(ActionType::Uri)
                        .uri(Str(link.url.as_bytes()));
                    annot_ref
                })
                .collect()
        })
        .collect();

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id).kids(page_ids.iter().copied()).count(n as i32);

    let mut font_pairs: Vec<(&str, Ref)> = resources
        .fonts
        .values()
        .map(|f| (f.name.as_str(), f.font_ref))
        .collect();
    font_pairs.sort_by(|a, b| a.0.cmp(b.0));

    for (i, page) in pages.iter().enumerate() {
        let mut pdf_page = pdf.page(page_ids[i]);
        pdf_page
            .media_box(PdfRect::new(0.0, 0.0, page.size.width, page.size.height))
            .parent(pages_id)
            .contents(content_ids[i]);
        if !annot_refs[i].is_empty() {
            pdf_page.annotations(annot_refs[i].iter().copied());
        }
        let mut res = pdf_page.resources();
        {
            let mut fonts = res.fonts();
            for (name, font_ref) in &font_pairs {
                fonts.pair(Name(name.as_bytes()), *font_ref);
            }
        }
        if image_count > 0 {
            let mut xobjects = res.x_objects();
            for (name, xobj_ref) in resources.images.iter().filter_map(|(_, x)| x.as_ref()) {
                xobjects.pair(Name(name.as_bytes()), *xobj_ref);
            }
        }
        if !resources.states.is_empty() {
            let mut gs = res.ext_g_states();
            for (_, name, state_ref) in &resources.states {
                gs.pair(Name(name.as_bytes()), *state_ref);
            }
        }
    }

    let t_assembly = t0.elapsed();
    log::info!(
        "PDF phases: collect={:.1}ms, fonts={:.1}ms, images={:.1}ms, content={:.1}ms, assembly={:.1}ms",
        t_collect.as_secs_f64() * 1000.0,
        (t_fonts - t_collect).as_secs_f64() * 1000.0,
        (t_images - t_fonts).as_secs_f64() * 1000.0,
        (t_content - t_images).as_secs_f64() * 1000.0,
        (t_assembly - t_content).as_secs_f64() * 1000.0,
    );

    Ok(pdf.finish())
}
