//! Text measurement: shaping runs into positioned glyphs, line heights, and
//! the greedy line breaker (see [`breaker`]).

pub mod align;
pub mod breaker;
pub mod tracking;

use serde::{Deserialize, Serialize};
use ttf_parser::{Face, GlyphId};

use crate::config::TypesetConfig;
use crate::error::MeasurementError;
use crate::fonts::{FontBook, FontSource, ResolvedFont, builtin_char_width, char_to_winansi};
use crate::geometry::Size;
use crate::layout::Line;
use crate::model::{LineSpacing, TextStyle, VertAlign};

pub use breaker::{BreakOptions, ListMarker};
pub use tracking::apply_tracking;

/// Scale applied to super/subscript runs.
pub const SHIFTED_SCALE: f32 = 0.58;
/// Baseline raise of a superscript, as a fraction of the unscaled size.
pub const SUPERSCRIPT_RISE: f32 = 0.33;
/// Baseline drop of a subscript, as a fraction of the unscaled size.
pub const SUBSCRIPT_DROP: f32 = 0.25;

/// One positioned glyph. `x` is relative to the start of the shaped string,
/// `cluster` is the byte offset of the source character.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    pub id: u16,
    pub cluster: usize,
    pub x: f32,
    pub y: f32,
    pub x_advance: f32,
    pub y_advance: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShapedText {
    pub glyphs: Vec<Glyph>,
    pub width: f32,
}

impl ShapedText {
    pub fn from_glyphs(glyphs: Vec<Glyph>) -> Self {
        let width = glyphs.last().map(|g| g.x + g.x_advance).unwrap_or(0.0);
        Self { glyphs, width }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShapeFeatures {
    pub kerning: bool,
}

/// Turns a string into positioned glyphs for one face at one size.
pub trait Shaper: Send + Sync {
    fn shape(
        &self,
        text: &str,
        font: &ResolvedFont,
        size: f32,
        features: ShapeFeatures,
    ) -> Result<Vec<Glyph>, MeasurementError>;
}

/// Advance-width shaper over the font's `hmtx` and `kern` tables.
/// No ligatures or contextual forms.
pub struct TtfShaper;

impl Shaper for TtfShaper {
    fn shape(
        &self,
        text: &str,
        font: &ResolvedFont,
        size: f32,
        features: ShapeFeatures,
    ) -> Result<Vec<Glyph>, MeasurementError> {
        let FontSource::Face { data, index } = &font.source else {
            return Err(MeasurementError::Unavailable(font.key.clone()));
        };
        let face = Face::parse(data, *index).map_err(|_| MeasurementError::BadFont {
            family: font.family.clone(),
        })?;
        let scale = size / face.units_per_em() as f32;
        let kern = if features.kerning {
            face.tables().kern
        } else {
            None
        };

        let mut glyphs: Vec<Glyph> = Vec::with_capacity(text.len());
        let mut prev: Option<GlyphId> = None;
        let mut pen = 0.0f32;
        for (cluster, ch) in text.char_indices() {
            let gid = face.glyph_index(ch).unwrap_or(GlyphId(0));
            if let (Some(kern), Some(left), Some(last)) = (kern, prev, glyphs.last_mut()) {
                let adjust = kern
                    .subtables
                    .into_iter()
                    .filter(|st| st.horizontal && !st.variable)
                    .find_map(|st| st.glyphs_kerning(left, gid))
                    .unwrap_or(0);
                if adjust != 0 {
                    let delta = adjust as f32 * scale;
                    last.x_advance += delta;
                    pen += delta;
                }
            }
            let advance = face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale;
            glyphs.push(Glyph {
                id: gid.0,
                cluster,
                x: pen,
                y: 0.0,
                x_advance: advance,
                y_advance: 0.0,
            });
            pen += advance;
            prev = Some(gid);
        }
        Ok(glyphs)
    }
}

/// Per-character estimate from Helvetica class widths.
pub fn estimate_glyphs(text: &str, size: f32) -> Vec<Glyph> {
    let mut pen = 0.0f32;
    text.char_indices()
        .map(|(cluster, ch)| {
            let advance = builtin_char_width(ch) * size / 1000.0;
            let glyph = Glyph {
                id: char_to_winansi(ch) as u16,
                cluster,
                x: pen,
                y: 0.0,
                x_advance: advance,
                y_advance: 0.0,
            };
            pen += advance;
            glyph
        })
        .collect()
}

pub fn effective_font_size(style: &TextStyle) -> f32 {
    match style.vertical_align {
        VertAlign::Superscript | VertAlign::Subscript => style.font_size * SHIFTED_SCALE,
        VertAlign::Baseline => style.font_size,
    }
}

/// Baseline shift in top-down coordinates (negative moves up).
pub fn baseline_shift(style: &TextStyle) -> f32 {
    match style.vertical_align {
        VertAlign::Superscript => -style.font_size * SUPERSCRIPT_RISE,
        VertAlign::Subscript => style.font_size * SUBSCRIPT_DROP,
        VertAlign::Baseline => 0.0,
    }
}

pub fn display_text(text: &str, style: &TextStyle) -> String {
    if style.caps {
        text.to_uppercase()
    } else {
        text.to_string()
    }
}

pub struct TextMetrics<'a> {
    fonts: &'a FontBook,
    shaper: &'a dyn Shaper,
    kerning: bool,
    tab_interval: f32,
}

impl<'a> TextMetrics<'a> {
    pub fn new(fonts: &'a FontBook) -> Self {
        Self {
            fonts,
            shaper: &TtfShaper,
            kerning: true,
            tab_interval: 36.0,
        }
    }

    pub fn with_config(mut self, config: &TypesetConfig) -> Self {
        self.kerning = config.kerning;
        self.tab_interval = config.tab_interval;
        self
    }

    pub fn with_shaper(mut self, shaper: &'a dyn Shaper) -> Self {
        self.shaper = shaper;
        self
    }

    pub fn fonts(&self) -> &'a FontBook {
        self.fonts
    }

    pub fn tab_interval(&self) -> f32 {
        self.tab_interval
    }

    /// Shape `text` at the style's effective size with kerning and tracking applied.
    /// `text` is taken as displayed (caps already applied).
    pub fn shape(&self, text: &str, style: &TextStyle) -> ShapedText {
        let font = self.fonts.resolve_style(style);
        let size = effective_font_size(style);
        let features = ShapeFeatures {
            kerning: style.kerning.unwrap_or(self.kerning),
        };
        let glyphs = match self.shaper.shape(text, &font, size, features) {
            Ok(glyphs) => glyphs,
            Err(MeasurementError::Unavailable(_)) => estimate_glyphs(text, size),
            Err(err) => {
                log::warn!("{err}; estimating widths for {:?}", truncate(text, 24));
                estimate_glyphs(text, size)
            }
        };
        if style.char_spacing != 0.0 {
            apply_tracking(glyphs, style.char_spacing)
        } else {
            ShapedText::from_glyphs(glyphs)
        }
    }

    pub fn width(&self, text: &str, style: &TextStyle) -> f32 {
        self.shape(text, style).width
    }

    /// Width of the text and the height of one single-spaced line.
    pub fn measure(&self, text: &str, style: &TextStyle) -> Size {
        let shown = display_text(text, style);
        Size::new(
            self.shape(&shown, style).width,
            self.line_height(style, LineSpacing::Auto(1.0)),
        )
    }

    /// Height of a line set in `style` under the given spacing rule.
    pub fn line_height(&self, style: &TextStyle, spacing: LineSpacing) -> f32 {
        let font = self.fonts.resolve_style(style);
        let natural = style.font_size * font.line_h_ratio.unwrap_or(1.0);
        match spacing {
            LineSpacing::Auto(multiplier) => natural * multiplier,
            LineSpacing::Exact(height) => height,
            LineSpacing::AtLeast(height) => natural.max(height),
        }
    }

    /// (ascent, descent) of text set in `style`, including any baseline shift.
    pub fn extents(&self, style: &TextStyle) -> (f32, f32) {
        let font = self.fonts.resolve_style(style);
        let size = effective_font_size(style);
        let shift = baseline_shift(style);
        (
            size * font.ascender_ratio - shift.min(0.0),
            size * font.descender_ratio + shift.max(0.0),
        )
    }

    /// Break a single-style string into lines no wider than `max_width`.
    pub fn layout(
        &self,
        text: &str,
        style: &TextStyle,
        spacing: LineSpacing,
        max_width: Option<f32>,
    ) -> Vec<Line> {
        let runs = [crate::model::Run::text(text, style.clone())];
        let opts = BreakOptions {
            right: max_width.unwrap_or(f32::INFINITY),
            spacing,
            ..BreakOptions::default()
        };
        self.layout_runs(&runs, &opts)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
