//! Small strongly-typed primitives shared by the geometry core.
//!
//! - `Range`: a validated, normalized scale value domain
//! - `BBox`: axis-aligned bounding box over `DVec2`
//! - `Color`: stroke/fill colour handed to the rendering backend

use std::fmt;

use glam::{DVec2, dvec2};

use crate::errors::ConfigError;

/// Error type for invalid numeric values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericError {
    /// Value is NaN
    NaN,
    /// Value is infinite
    Infinite,
    /// Value is zero when non-zero required
    Zero,
    /// Value is negative when positive required
    Negative,
}

impl fmt::Display for NumericError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericError::NaN => write!(f, "value is NaN"),
            NumericError::Infinite => write!(f, "value is infinite"),
            NumericError::Zero => write!(f, "value is zero"),
            NumericError::Negative => write!(f, "value is negative"),
        }
    }
}

impl std::error::Error for NumericError {}

/// Check that a user-supplied number is finite and strictly positive.
pub fn positive(val: f64) -> Result<f64, NumericError> {
    if val.is_nan() {
        Err(NumericError::NaN)
    } else if val.is_infinite() {
        Err(NumericError::Infinite)
    } else if val == 0.0 {
        Err(NumericError::Zero)
    } else if val < 0.0 {
        Err(NumericError::Negative)
    } else {
        Ok(val)
    }
}

/// Closed value domain of a scale.
///
/// Scales may be configured with reversed bounds (`u_min > u_max`); the
/// range always stores them ascending and remembers the original order
/// in `reversed`, so callers never rely on bound order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
    pub reversed: bool,
}

impl Range {
    /// Normalize two bounds in either order.
    pub fn new(a: f64, b: f64) -> Result<Range, ConfigError> {
        Self::named("scale", a, b)
    }

    /// Like [`Range::new`], naming the scale in the error.
    pub fn named(name: &str, a: f64, b: f64) -> Result<Range, ConfigError> {
        if !a.is_finite() || !b.is_finite() {
            return Err(ConfigError::NonFiniteBound {
                name: name.to_string(),
            });
        }
        Ok(Range {
            min: a.min(b),
            max: a.max(b),
            reversed: a > b,
        })
    }

    /// Strict constructor: `max < min` is a configuration error.
    pub fn ordered(name: &str, min: f64, max: f64) -> Result<Range, ConfigError> {
        let range = Self::named(name, min, max)?;
        if range.reversed {
            return Err(ConfigError::InvertedRange {
                name: name.to_string(),
                min,
                max,
            });
        }
        Ok(range)
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Value at fraction `t` of the domain (0 → min, 1 → max).
    pub fn lerp(&self, t: f64) -> f64 {
        self.min + t * self.span()
    }

    /// Fraction of the domain at which `value` lies.
    pub fn fraction(&self, value: f64) -> f64 {
        if self.span() == 0.0 {
            0.0
        } else {
            (value - self.min) / self.span()
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn mid(&self) -> f64 {
        0.5 * (self.min + self.max)
    }
}

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    pub min: DVec2,
    pub max: DVec2,
}

impl Default for BBox {
    fn default() -> Self {
        Self::new()
    }
}

impl BBox {
    /// Create an empty bounding box (will expand on first point)
    pub fn new() -> Self {
        BBox {
            min: dvec2(f64::MAX, f64::MAX),
            max: dvec2(f64::MIN, f64::MIN),
        }
    }

    /// Bounding box of a point set
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a DVec2>) -> Self {
        let mut bb = BBox::new();
        for p in points {
            bb.expand_point(*p);
        }
        bb
    }

    /// Check if the bbox is empty (never expanded)
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    /// Expand to include a point
    pub fn expand_point(&mut self, p: DVec2) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Expand to include another box
    pub fn union(&mut self, other: &BBox) {
        if !other.is_empty() {
            self.expand_point(other.min);
            self.expand_point(other.max);
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }

    pub fn diagonal(&self) -> f64 {
        (self.max - self.min).length()
    }

    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// Simple color model handed straight to the backend.
#[derive(Clone, Debug, PartialEq)]
pub enum Color {
    Named(String),
    Rgb(u8, u8, u8),
}

impl Color {
    pub fn black() -> Color {
        Color::Rgb(0, 0, 0)
    }

    pub fn named(name: &str) -> Color {
        Color::Named(name.to_string())
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::black()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Named(s) => write!(f, "{}", s),
            Color::Rgb(r, g, b) => write!(f, "rgb({},{},{})", r, g, b),
        }
    }
}

/// 2-D cross product (z component of the 3-D cross product)
#[inline]
pub fn cross(a: DVec2, b: DVec2) -> f64 {
    a.x * b.y - a.y * b.x
}
