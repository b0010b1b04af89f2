use super::{Glyph, ShapedText};

/// Add `extra_per_char` after every glyph and re-position the run.
/// Kerning already folded into the advances is kept, so the two compose additively.
pub fn apply_tracking(mut glyphs: Vec<Glyph>, extra_per_char: f32) -> ShapedText {
    let mut pen = glyphs.first().map(|g| g.x).unwrap_or(0.0);
    for glyph in &mut glyphs {
        glyph.x = pen;
        glyph.x_advance += extra_per_char;
        pen += glyph.x_advance;
    }
    ShapedText::from_glyphs(glyphs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::estimate_glyphs;

    #[test]
    fn width_grows_by_extra_per_glyph() {
        let glyphs = estimate_glyphs("tracking", 10.0);
        let base = ShapedText::from_glyphs(glyphs.clone()).width;
        let tracked = apply_tracking(glyphs, 0.5);
        assert!((tracked.width - base - 8.0 * 0.5).abs() < 1e-4);
        let last = tracked.glyphs.last().unwrap();
        assert_eq!(tracked.width, last.x + last.x_advance);
    }

    #[test]
    fn negative_tracking_condenses() {
        let glyphs = estimate_glyphs("ab", 10.0);
        let tracked = apply_tracking(glyphs, -1.0);
        assert!((tracked.width - (5.56 + 5.56 - 2.0)).abs() < 1e-4);
        assert!((tracked.glyphs[1].x - 4.56).abs() < 1e-4);
    }

    #[test]
    fn empty_run_has_zero_width() {
        assert_eq!(apply_tracking(Vec::new(), 3.0).width, 0.0);
    }
}
