//! Scale shape types.
//!
//! Each shape is its own small value object holding the parameters it was
//! built from, and knows how to produce the homogeneous local point
//! `(f, g, h)` for a scale value. The Block's transform stack acts on that
//! triple; the divide happens once, when a world point is requested.

use std::fmt;
use std::sync::Arc;

use enum_dispatch::enum_dispatch;
use glam::{DVec2, DVec3, dvec3};

use crate::chebyshev::Interpolant;

/// Caller-supplied function of one scale value.
pub type Func1 = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// Caller-supplied function of two values (grid rows, contour surfaces).
pub type Func2 = Arc<dyn Fn(f64, f64) -> f64 + Send + Sync>;

/// Wrap a closure as a [`Func1`].
pub fn func1(f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Func1 {
    Arc::new(f)
}

/// Wrap a closure as a [`Func2`].
pub fn func2(f: impl Fn(f64, f64) -> f64 + Send + Sync + 'static) -> Func2 {
    Arc::new(f)
}

/// Common behavior for all scale shapes
#[enum_dispatch]
pub trait ScaleShape {
    /// Homogeneous local point for scale value `u`.
    fn point(&self, u: f64) -> DVec3;

    /// Whether the shape is a straight line in the local frame.
    fn is_straight(&self) -> bool {
        false
    }
}

/// Point moving along a fixed line: `origin + direction · F(u)`.
///
/// Sum, ladder, angle and multi-sum scales are all of this form.
#[derive(Clone)]
pub struct LinearScale {
    pub origin: DVec2,
    pub direction: DVec2,
    pub func: Func1,
}

impl ScaleShape for LinearScale {
    fn point(&self, u: f64) -> DVec3 {
        let p = self.origin + self.direction * (self.func)(u);
        dvec3(p.x, p.y, 1.0)
    }

    fn is_straight(&self) -> bool {
        true
    }
}

/// One row `(f(u), g(u), h(u))` of a determinant.
#[derive(Clone)]
pub struct DeterminantScale {
    pub f: Func1,
    pub g: Func1,
    pub h: Func1,
}

impl ScaleShape for DeterminantScale {
    fn point(&self, u: f64) -> DVec3 {
        dvec3((self.f)(u), (self.g)(u), (self.h)(u))
    }
}

/// Which parameter of a grid surface is held fixed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GridAxis {
    /// Iso-u line: u fixed, the curve runs over v.
    U(f64),
    /// Iso-v line: v fixed, the curve runs over u.
    V(f64),
}

/// One iso-line of a 2-variable grid surface `(f, g, h)(u, v)`.
#[derive(Clone)]
pub struct GridScale {
    pub f: Func2,
    pub g: Func2,
    pub h: Func2,
    pub fixed: GridAxis,
}

impl GridScale {
    pub fn at(&self, u: f64, v: f64) -> DVec3 {
        dvec3((self.f)(u, v), (self.g)(u, v), (self.h)(u, v))
    }
}

impl ScaleShape for GridScale {
    fn point(&self, t: f64) -> DVec3 {
        match self.fixed {
            GridAxis::U(u) => self.at(u, t),
            GridAxis::V(v) => self.at(t, v),
        }
    }
}

/// Maps a scale value to the normalized parameter `s ∈ [0, 1]` the
/// generator fits in (optionally through `ln`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValueMap {
    pub log: bool,
    pub start: f64,
    pub span: f64,
}

impl ValueMap {
    pub fn new(min: f64, max: f64, log: bool) -> Self {
        let (a, b) = if log { (min.ln(), max.ln()) } else { (min, max) };
        Self {
            log,
            start: a,
            span: b - a,
        }
    }

    pub fn to_unit(&self, value: f64) -> f64 {
        let phi = if self.log { value.ln() } else { value };
        (phi - self.start) / self.span
    }

    pub fn from_unit(&self, s: f64) -> f64 {
        let phi = self.start + s * self.span;
        if self.log { phi.exp() } else { phi }
    }
}

/// Free-form curve fitted by the nomogram generator: barycentric
/// interpolants of the homogeneous `x`, `y` and `h` over Chebyshev nodes in
/// normalized value space, scaled to paper units.
#[derive(Clone, Debug, PartialEq)]
pub struct FittedScale {
    pub x: Interpolant,
    pub y: Interpolant,
    pub h: Interpolant,
    pub map: ValueMap,
    pub paper: DVec2,
}

impl ScaleShape for FittedScale {
    fn point(&self, u: f64) -> DVec3 {
        let s = self.map.to_unit(u);
        dvec3(self.x.eval(s) * self.paper.x, self.y.eval(s) * self.paper.y, self.h.eval(s))
    }
}

/// Any scale shape.
#[enum_dispatch(ScaleShape)]
#[derive(Clone)]
pub enum Shape {
    Linear(LinearScale),
    Determinant(DeterminantScale),
    Grid(GridScale),
    Fitted(FittedScale),
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Linear(s) => f
                .debug_struct("Linear")
                .field("origin", &s.origin)
                .field("direction", &s.direction)
                .finish_non_exhaustive(),
            Shape::Determinant(_) => f.write_str("Determinant"),
            Shape::Grid(s) => f
                .debug_struct("Grid")
                .field("fixed", &s.fixed)
                .finish_non_exhaustive(),
            Shape::Fitted(s) => f
                .debug_struct("Fitted")
                .field("map", &s.map)
                .finish_non_exhaustive(),
        }
    }
}
