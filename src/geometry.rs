use serde::{Deserialize, Serialize};

pub const TWIPS_PER_POINT: f32 = 20.0;
pub const EMU_PER_POINT: f32 = 12_700.0;

/// Bare lengths above this are assumed to be twips rather than points.
const TWIPS_MAGNITUDE_THRESHOLD: f32 = 50.0;

pub fn twips_to_pts(twips: f32) -> f32 {
    twips / TWIPS_PER_POINT
}

pub fn emu_to_pts(emu: f32) -> f32 {
    emu / EMU_PER_POINT
}

pub fn inches_to_pts(inches: f32) -> f32 {
    inches * 72.0
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// US Letter, the default page when the source omits one.
    pub fn letter() -> Self {
        Self::new(612.0, 792.0)
    }

    pub fn a4() -> Self {
        Self::new(595.3, 841.9)
    }
}

/// Axis-aligned rectangle in top-down page coordinates (points).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    pub fn contains(&self, other: &Rect) -> bool {
        const EPS: f32 = 0.01;
        other.x >= self.x - EPS
            && other.y >= self.y - EPS
            && other.right() <= self.right() + EPS
            && other.bottom() <= self.bottom() + EPS
    }

    /// Shrink `self` so it lies inside `bounds`. Degenerate results collapse to zero size.
    pub fn clamp_to(&self, bounds: &Rect) -> Rect {
        let x = self.x.clamp(bounds.x, bounds.right());
        let y = self.y.clamp(bounds.y, bounds.bottom());
        let right = self.right().clamp(x, bounds.right());
        let bottom = self.bottom().clamp(y, bounds.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }

    pub fn inset(&self, margins: &Margins) -> Rect {
        Rect::new(
            self.x + margins.left,
            self.y + margins.top,
            (self.width - margins.left - margins.right).max(0.0),
            (self.height - margins.top - margins.bottom).max(0.0),
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Margins {
    pub fn new(top: f32, right: f32, bottom: f32, left: f32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    pub fn uniform(v: f32) -> Self {
        Self::new(v, v, v, v)
    }

    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    Points,
    Twips,
    Emu,
}

/// A length as found in source data. When `unit` is missing the unit is guessed
/// from the magnitude, which misreads legitimately large point values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "LengthRepr", into = "LengthRepr")]
pub struct Length {
    pub value: f32,
    pub unit: Option<LengthUnit>,
}

impl Length {
    pub fn pt(value: f32) -> Self {
        Self {
            value,
            unit: Some(LengthUnit::Points),
        }
    }

    pub fn twips(value: f32) -> Self {
        Self {
            value,
            unit: Some(LengthUnit::Twips),
        }
    }

    pub fn bare(value: f32) -> Self {
        Self { value, unit: None }
    }

    pub fn to_pts(&self) -> f32 {
        match self.unit {
            Some(LengthUnit::Points) => self.value,
            Some(LengthUnit::Twips) => twips_to_pts(self.value),
            Some(LengthUnit::Emu) => emu_to_pts(self.value),
            None if self.value.abs() > TWIPS_MAGNITUDE_THRESHOLD => twips_to_pts(self.value),
            None => self.value,
        }
    }
}

impl Default for Length {
    fn default() -> Self {
        Self::pt(0.0)
    }
}

/// JSON accepts either a bare number or `{"value": .., "unit": ..}`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum LengthRepr {
    Bare(f32),
    Tagged {
        value: f32,
        #[serde(default)]
        unit: Option<LengthUnit>,
    },
}

impl From<LengthRepr> for Length {
    fn from(repr: LengthRepr) -> Self {
        match repr {
            LengthRepr::Bare(value) => Length::bare(value),
            LengthRepr::Tagged { value, unit } => Length { value, unit },
        }
    }
}

impl From<Length> for LengthRepr {
    fn from(len: Length) -> Self {
        match len.unit {
            None => LengthRepr::Bare(len.value),
            unit => LengthRepr::Tagged {
                value: len.value,
                unit,
            },
        }
    }
}

/// A 2D affine transform `[a b c d e f]` as used by PDF content streams.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine(pub [f32; 6]);

impl Affine {
    pub const IDENTITY: Affine = Affine([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    pub fn translate(dx: f32, dy: f32) -> Self {
        Affine([1.0, 0.0, 0.0, 1.0, dx, dy])
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Affine([sx, 0.0, 0.0, sy, 0.0, 0.0])
    }

    /// Clockwise rotation in degrees (y axis points down).
    pub fn rotate(degrees: f32) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Affine([cos, sin, -sin, cos, 0.0, 0.0])
    }

    /// `self` followed by `outer`: p' = outer(self(p)).
    pub fn then(&self, outer: &Affine) -> Affine {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = outer.0;
        Affine([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    /// Bounding box of `rect` after transformation.
    pub fn map_rect(&self, rect: &Rect) -> Rect {
        let corners = [
            self.apply(rect.x, rect.y),
            self.apply(rect.right(), rect.y),
            self.apply(rect.x, rect.bottom()),
            self.apply(rect.right(), rect.bottom()),
        ];
        let min_x = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min);
        let min_y = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min);
        let max_x = corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max);
        let max_y = corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max);
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

impl Default for Affine {
    fn default() -> Self {
        Affine::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_unit_wins_over_magnitude() {
        assert_eq!(Length::pt(108.0).to_pts(), 108.0);
        assert_eq!(Length::twips(20.0).to_pts(), 1.0);
    }

    #[test]
    fn bare_length_unit_is_guessed_from_magnitude() {
        assert_eq!(Length::bare(5.4).to_pts(), 5.4);
        assert_eq!(Length::bare(108.0).to_pts(), 5.4);
    }

    #[test]
    fn length_deserializes_from_number_or_object() {
        let bare: Length = serde_json::from_str("108").unwrap();
        assert_eq!(bare.unit, None);
        let tagged: Length = serde_json::from_str(r#"{"value": 108, "unit": "points"}"#).unwrap();
        assert_eq!(tagged.to_pts(), 108.0);
    }

    #[test]
    fn clamp_keeps_rect_inside_bounds() {
        let bounds = Rect::new(72.0, 72.0, 468.0, 648.0);
        let r = Rect::new(60.0, 700.0, 600.0, 100.0).clamp_to(&bounds);
        assert!(bounds.contains(&r));
        assert_eq!(r.x, 72.0);
        assert_eq!(r.bottom(), 720.0);
    }

    #[test]
    fn translate_then_scale_maps_points() {
        let m = Affine::translate(10.0, 20.0).then(&Affine::scale(2.0, 2.0));
        assert_eq!(m.apply(1.0, 1.0), (22.0, 42.0));
    }
}
