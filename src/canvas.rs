//! Drawing surface the renderers paint onto.
//!
//! Coordinates are points, origin at the top-left of the page, y down.
//! Backends may batch calls but must apply them in order and flush on
//! [`Canvas::end_page`].

use std::sync::Arc;

use crate::error::RenderError;
use crate::geometry::{Affine, Rect, Size};

pub type Rgb = [u8; 3];

pub const BLACK: Rgb = [0, 0, 0];

pub trait Canvas {
    fn begin_page(&mut self, size: Size);
    fn end_page(&mut self);

    fn save_state(&mut self);
    fn restore_state(&mut self);

    fn set_fill_color(&mut self, rgb: Rgb);
    fn set_stroke_color(&mut self, rgb: Rgb);
    fn set_line_width(&mut self, width: f32);
    /// Empty pattern means solid.
    fn set_dash(&mut self, pattern: &[f32]);
    /// `name` is a font key as produced by [`crate::fonts::font_key`].
    fn set_font(&mut self, name: &str, size: f32);
    fn set_opacity(&mut self, alpha: f32);
    /// Extra advance after every character of subsequent strings.
    fn set_char_spacing(&mut self, _spacing: f32) {}

    fn round_rect(&mut self, rect: Rect, radius: Option<f32>, fill: bool, stroke: bool);

    fn rect(&mut self, rect: Rect, fill: bool, stroke: bool) {
        self.round_rect(rect, None, fill, stroke);
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32);

    /// Draw `text` with its baseline starting at (x, y).
    fn draw_string(&mut self, x: f32, y: f32, text: &str);

    fn draw_image(&mut self, rect: Rect, bytes: Arc<Vec<u8>>) -> Result<(), RenderError>;

    fn translate(&mut self, dx: f32, dy: f32);
    fn rotate(&mut self, degrees: f32);
    fn scale(&mut self, sx: f32, sy: f32);

    fn register_link(&mut self, url: &str, rect: Rect);
}

/// Creates independent surfaces and turns finished ones into pages.
pub trait SurfaceFactory: Sync {
    type Surface: Canvas + Send;
    type Page: Send;

    fn create(&self) -> Self::Surface;
    fn finish(&self, surface: Self::Surface) -> Vec<Self::Page>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum CanvasOp {
    SaveState,
    RestoreState,
    FillColor(Rgb),
    StrokeColor(Rgb),
    LineWidth(f32),
    Dash(Vec<f32>),
    Font { name: String, size: f32 },
    Opacity(f32),
    CharSpacing(f32),
    Rect { rect: Rect, radius: Option<f32>, fill: bool, stroke: bool },
    Line { x1: f32, y1: f32, x2: f32, y2: f32 },
    Text { x: f32, y: f32, text: String },
    Image { rect: Rect, data: Arc<Vec<u8>> },
    Transform(Affine),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Link {
    pub url: String,
    /// Page coordinates, after the transform in effect when registered.
    pub rect: Rect,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordedPage {
    pub size: Size,
    pub ops: Vec<CanvasOp>,
    pub links: Vec<Link>,
}

impl RecordedPage {
    /// Strings drawn on the page, in paint order.
    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                CanvasOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn text(&self) -> String {
        self.texts().join(" ")
    }

    pub fn image_count(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, CanvasOp::Image { .. })).count()
    }
}

/// Canvas that keeps every call, one [`RecordedPage`] per page. Used by the
/// PDF backend and by tests.
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    pages: Vec<RecordedPage>,
    current: Option<RecordedPage>,
    transform: Affine,
    stack: Vec<Affine>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self {
            transform: Affine::IDENTITY,
            ..Self::default()
        }
    }

    pub fn pages(&self) -> &[RecordedPage] {
        &self.pages
    }

    pub fn into_pages(mut self) -> Vec<RecordedPage> {
        if self.current.is_some() {
            self.end_page();
        }
        self.pages
    }

    fn push(&mut self, op: CanvasOp) {
        match self.current.as_mut() {
            Some(page) => page.ops.push(op),
            None => log::debug!("canvas call outside a page dropped: {op:?}"),
        }
    }

    fn concat(&mut self, m: Affine) {
        self.transform = m.then(&self.transform);
        self.push(CanvasOp::Transform(m));
    }
}

impl Canvas for RecordingCanvas {
    fn begin_page(&mut self, size: Size) {
        if self.current.is_some() {
            self.end_page();
        }
        self.transform = Affine::IDENTITY;
        self.stack.clear();
        self.current = Some(RecordedPage {
            size,
            ..RecordedPage::default()
        });
    }

    fn end_page(&mut self) {
        if let Some(page) = self.current.take() {
            self.pages.push(page);
        }
    }

    fn save_state(&mut self) {
        self.stack.push(self.transform);
        self.push(CanvasOp::SaveState);
    }

    fn restore_state(&mut self) {
        self.transform = self.stack.pop().unwrap_or(Affine::IDENTITY);
        self.push(CanvasOp::RestoreState);
    }

    fn set_fill_color(&mut self, rgb: Rgb) {
        self.push(CanvasOp::FillColor(rgb));
    }

    fn set_stroke_color(&mut self, rgb: Rgb) {
        self.push(CanvasOp::StrokeColor(rgb));
    }

    fn set_line_width(&mut self, width: f32) {
        self.push(CanvasOp::LineWidth(width));
    }

    fn set_dash(&mut self, pattern: &[f32]) {
        self.push(CanvasOp::Dash(pattern.to_vec()));
    }

    fn set_font(&mut self, name: &str, size: f32) {
        self.push(CanvasOp::Font {
            name: name.to_string(),
            size,
        });
    }

    fn set_opacity(&mut self, alpha: f32) {
        self.push(CanvasOp::Opacity(alpha.clamp(0.0, 1.0)));
    }

    fn set_char_spacing(&mut self, spacing: f32) {
        self.push(CanvasOp::CharSpacing(spacing));
    }

    fn round_rect(&mut self, rect: Rect, radius: Option<f32>, fill: bool, stroke: bool) {
        self.push(CanvasOp::Rect {
            rect,
            radius,
            fill,
            stroke,
        });
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
        self.push(CanvasOp::Line { x1, y1, x2, y2 });
    }

    fn draw_string(&mut self, x: f32, y: f32, text: &str) {
        self.push(CanvasOp::Text {
            x,
            y,
            text: text.to_string(),
        });
    }

    fn draw_image(&mut self, rect: Rect, bytes: Arc<Vec<u8>>) -> Result<(), RenderError> {
        if bytes.is_empty() {
            return Err(RenderError::Image("empty image data".to_string()));
        }
        if !rect.is_finite() {
            return Err(RenderError::Frame(format!("{rect:?}")));
        }
        self.push(CanvasOp::Image { rect, data: bytes });
        Ok(())
    }

    fn translate(&mut self, dx: f32, dy: f32) {
        self.concat(Affine::translate(dx, dy));
    }

    fn rotate(&mut self, degrees: f32) {
        self.concat(Affine::rotate(degrees));
    }

    fn scale(&mut self, sx: f32, sy: f32) {
        self.concat(Affine::scale(sx, sy));
    }

    fn register_link(&mut self, url: &str, rect: Rect) {
        let rect = self.transform.map_rect(&rect);
        match self.current.as_mut() {
            Some(page) => page.links.push(Link {
                url: url.to_string(),
                rect,
            }),
            None => log::debug!("link outside a page dropped: {url}"),
        }
    }
}

/// Factory for [`RecordingCanvas`] surfaces.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecordingFactory;

impl SurfaceFactory for RecordingFactory {
    type Surface = RecordingCanvas;
    type Page = RecordedPage;

    fn create(&self) -> RecordingCanvas {
        RecordingCanvas::new()
    }

    fn finish(&self, surface: RecordingCanvas) -> Vec<RecordedPage> {
        surface.into_pages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_calls_per_page_in_order() {
        let mut canvas = RecordingCanvas::new();
        canvas.begin_page(Size::letter());
        canvas.set_font("Helvetica", 12.0);
        canvas.draw_string(10.0, 20.0, "hello");
        canvas.end_page();
        canvas.begin_page(Size::a4());
        canvas.rect(Rect::new(0.0, 0.0, 5.0, 5.0), true, false);
        let pages = canvas.into_pages();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].texts(), vec!["hello"]);
        assert_eq!(pages[1].size, Size::a4());
        assert!(matches!(pages[1].ops[0], CanvasOp::Rect { radius: None, .. }));
    }

    #[test]
    fn links_follow_the_current_transform() {
        let mut canvas = RecordingCanvas::new();
        canvas.begin_page(Size::letter());
        canvas.save_state();
        canvas.translate(100.0, 50.0);
        canvas.register_link("https://example.com", Rect::new(0.0, 0.0, 10.0, 10.0));
        canvas.restore_state();
        canvas.register_link("https://example.org", Rect::new(0.0, 0.0, 10.0, 10.0));
        let pages = canvas.into_pages();
        assert_eq!(pages[0].links[0].rect, Rect::new(100.0, 50.0, 10.0, 10.0));
        assert_eq!(pages[0].links[1].rect, Rect::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn empty_image_is_an_error() {
        let mut canvas = RecordingCanvas::new();
        canvas.begin_page(Size::letter());
        let err = canvas.draw_image(Rect::new(0.0, 0.0, 1.0, 1.0), Arc::new(Vec::new()));
        assert!(matches!(err, Err(RenderError::Image(_))));
    }
}
