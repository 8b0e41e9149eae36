//! Sequential colour ramp for the capacity map.

use std::fmt;

/// Simple RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    pub fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl fmt::Display for Rgb {
    /// Format as CSS: rgb(r,g,b)
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({},{},{})", self.r, self.g, self.b)
    }
}

pub const WHITE: Rgb = Rgb::new(255, 255, 255);
/// Polygon edges, 0.8 grey
pub const EDGE_GREY: Rgb = Rgb::new(204, 204, 204);
pub const OUTLINE: Rgb = Rgb::new(0, 0, 0);

/// Nine-class "Blues" ramp, lightest first
pub const BLUES: [Rgb; 9] = [
    Rgb::new(247, 251, 255),
    Rgb::new(222, 235, 247),
    Rgb::new(198, 219, 239),
    Rgb::new(158, 202, 225),
    Rgb::new(107, 174, 214),
    Rgb::new(66, 146, 198),
    Rgb::new(33, 113, 181),
    Rgb::new(8, 81, 156),
    Rgb::new(8, 48, 107),
];

/// Colour at `t` in [0, 1], linearly interpolated between ramp stops.
/// Out-of-range values clamp; NaN falls back to the lightest colour.
pub fn blues(t: f64) -> Rgb {
    if !t.is_finite() {
        return BLUES[0];
    }
    let t = t.clamp(0.0, 1.0);
    let position = t * (BLUES.len() - 1) as f64;
    let lower = position.floor() as usize;
    if lower >= BLUES.len() - 1 {
        return BLUES[BLUES.len() - 1];
    }
    let frac = position - lower as f64;
    let (a, b) = (BLUES[lower], BLUES[lower + 1]);
    let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * frac).round() as u8;
    Rgb::new(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b))
}

/// Linear min/max normalisation of a data column
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Normalize {
    pub min: f64,
    pub max: f64,
}

impl Normalize {
    /// Observed range of the finite values; None when there are none
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut finite = values.iter().copied().filter(|v| v.is_finite());
        let first = finite.next()?;
        let (min, max) = finite.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        Some(Normalize { min, max })
    }

    /// Position of `value` in the range; a zero-width range maps to 0
    pub fn apply(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.0;
        }
        (value - self.min) / span
    }
}
