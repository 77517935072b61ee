//! Blocks: self-consistent chart units, one algebraic relation each.
//!
//! Every relation kind has its own constructor module. They all produce a
//! [`Block`]: local scale curves (and grid surfaces), the member list the
//! isopleth engine indexes into, the relation used to solve isopleths, and
//! the transform stack the composer mutates.

mod angle;
mod contour;
mod determinant;
mod generated;
mod ladder;
mod mixed;
mod multi_sum;
mod product;
mod proportion;
mod single;
mod sum;

pub use angle::AngleBlock;
pub use contour::ContourBlock;
pub use determinant::{DetRow, DeterminantBlock};
pub use generated::GeneratedBlock;
pub use ladder::LadderBlock;
pub use mixed::MixedBlock;
pub use multi_sum::MultiSumBlock;
pub use product::ProductBlock;
pub use proportion::ProportionBlock;
pub use single::SingleBlock;
pub use sum::SumBlock;

use glam::{DVec2, DVec3, dvec2};

use crate::errors::{ConfigError, GeometryError};
use crate::isopleth::Entry;
use crate::scale::{Func1, Func2, GridAxis, GridScale, LinearScale, ScaleCurve, Shape, func1};
use crate::transform::{ProjectiveTransform, TransformStack, dehomogenize};
use crate::types::{BBox, Color, Range};

/// Relation family of a Block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Sum,
    Product,
    MultiSum,
    Proportion,
    Contour,
    Ladder,
    Angle,
    Single,
    Determinant,
    Mixed,
    Generated,
}

impl BlockKind {
    pub fn name(&self) -> &'static str {
        match self {
            BlockKind::Sum => "sum",
            BlockKind::Product => "product",
            BlockKind::MultiSum => "multi-sum",
            BlockKind::Proportion => "proportion",
            BlockKind::Contour => "contour",
            BlockKind::Ladder => "ladder",
            BlockKind::Angle => "angle",
            BlockKind::Single => "single",
            BlockKind::Determinant => "determinant",
            BlockKind::Mixed => "mixed",
            BlockKind::Generated => "generated",
        }
    }
}

/// A position in a Block's member list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Member {
    Curve(usize),
    Grid(usize),
}

/// How isopleths are solved inside a Block.
#[derive(Clone)]
pub enum Relation {
    /// Member triples that must be collinear. Chains (multi-sum,
    /// proportion) share reference members between triples.
    Collinear(Vec<[usize; 3]>),
    /// `F1(u) = F2(F3(w), v)`; members are `[u, v-grid, w]`.
    Contour { f1: Func1, f2: Func2, f3: Func1 },
    /// `F1(u) = F2(v)`; members are `[u, v]`.
    Ladder { f1: Func1, f2: Func1 },
    /// A lone scale: values map to points, nothing to solve.
    Single,
}

impl std::fmt::Debug for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Relation::Collinear(t) => f.debug_tuple("Collinear").field(t).finish(),
            Relation::Contour { .. } => f.write_str("Contour"),
            Relation::Ladder { .. } => f.write_str("Ladder"),
            Relation::Single => f.write_str("Single"),
        }
    }
}

/// 2-variable coordinate surface drawn as iso-u and iso-v lines.
#[derive(Clone)]
pub struct GridSurface {
    pub f: Func2,
    pub g: Func2,
    pub h: Func2,
    pub u_range: Range,
    pub v_range: Range,
    /// Values at which iso-u lines are drawn.
    pub u_lines: Vec<f64>,
    /// Values at which iso-v lines are drawn.
    pub v_lines: Vec<f64>,
    pub title: String,
    pub color: Color,
}

impl std::fmt::Debug for GridSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridSurface")
            .field("u_range", &self.u_range)
            .field("v_range", &self.v_range)
            .field("u_lines", &self.u_lines)
            .field("v_lines", &self.v_lines)
            .finish_non_exhaustive()
    }
}

impl GridSurface {
    pub fn at(&self, u: f64, v: f64) -> DVec3 {
        DVec3::new((self.f)(u, v), (self.g)(u, v), (self.h)(u, v))
    }

    pub fn world_xy(
        &self,
        u: f64,
        v: f64,
        transform: &ProjectiveTransform,
    ) -> Result<DVec2, GeometryError> {
        dehomogenize(transform.apply_homogeneous(self.at(u, v)), || {
            format!("grid \"{}\" at ({u}, {v})", self.title)
        })
    }

    /// All iso-lines as drawable curves.
    pub fn iso_lines(&self) -> Vec<ScaleCurve> {
        let iso = |fixed: GridAxis, range: Range| {
            ScaleCurve::new(
                GridScale {
                    f: self.f.clone(),
                    g: self.g.clone(),
                    h: self.h.clone(),
                    fixed,
                },
                range,
            )
            .with_title(self.title.clone())
        };
        let mut out: Vec<ScaleCurve> =
            self.u_lines.iter().map(|&u| iso(GridAxis::U(u), self.v_range)).collect();
        out.extend(self.v_lines.iter().map(|&v| iso(GridAxis::V(v), self.u_range)));
        out
    }
}

/// One self-consistent chart unit.
#[derive(Clone, Debug)]
pub struct Block {
    pub kind: BlockKind,
    pub curves: Vec<ScaleCurve>,
    pub grids: Vec<GridSurface>,
    /// Isopleth-addressable members first (`inputs` of them), reference
    /// members after.
    pub members: Vec<Member>,
    pub inputs: usize,
    pub relation: Relation,
    pub stack: TransformStack,
    pub isopleths: Vec<Vec<Entry>>,
}

impl Block {
    pub(crate) fn new(kind: BlockKind, curves: Vec<ScaleCurve>, relation: Relation) -> Self {
        let members = (0..curves.len()).map(Member::Curve).collect::<Vec<_>>();
        let inputs = curves.iter().filter(|c| !c.reference).count();
        Self {
            kind,
            curves,
            grids: Vec::new(),
            members,
            inputs,
            relation,
            stack: TransformStack::new(),
            isopleths: Vec::new(),
        }
    }

    pub fn with_isopleths(mut self, rows: Vec<Vec<Entry>>) -> Result<Self, ConfigError> {
        self.set_isopleths(rows, 0)?;
        Ok(self)
    }

    /// Validate row widths against the member count.
    pub fn set_isopleths(
        &mut self,
        rows: Vec<Vec<Entry>>,
        block: usize,
    ) -> Result<(), ConfigError> {
        for (row, entries) in rows.iter().enumerate() {
            if entries.len() != self.inputs {
                return Err(ConfigError::IsoplethWidth {
                    block,
                    row,
                    expected: self.inputs,
                    got: entries.len(),
                });
            }
        }
        self.isopleths = rows;
        Ok(())
    }

    /// Effective transform: global fit ∘ alignment.
    pub fn transform(&self) -> ProjectiveTransform {
        self.stack.effective()
    }

    /// Scale curves that carry values (not reference lines).
    pub fn scales(&self) -> impl Iterator<Item = (usize, &ScaleCurve)> {
        self.curves.iter().enumerate().filter(|(_, c)| !c.reference)
    }

    /// Collinear member triples, empty for non-collinear relations.
    pub fn relation_triples(&self) -> Vec<[usize; 3]> {
        match &self.relation {
            Relation::Collinear(t) => t.clone(),
            _ => Vec::new(),
        }
    }

    pub fn find_tag(&self, tag: &str) -> Option<usize> {
        self.curves.iter().position(|c| c.tag.as_deref() == Some(tag))
    }

    pub fn find_dtag(&self, tag: &str) -> Option<usize> {
        self.curves.iter().position(|c| c.dtag.as_deref() == Some(tag))
    }

    /// Curve index behind isopleth entry `i`, if that member is a curve.
    pub fn member_curve(&self, i: usize) -> Option<usize> {
        match self.members.get(i) {
            Some(Member::Curve(c)) => Some(*c),
            _ => None,
        }
    }

    /// Bounding box of every non-reference curve and grid line through
    /// `transform`.
    pub fn bbox(&self, transform: &ProjectiveTransform) -> Result<BBox, GeometryError> {
        let mut bb = BBox::new();
        for (_, curve) in self.scales() {
            let line = curve.view(*transform).sample(None)?;
            for s in &line.samples {
                bb.expand_point(s.p);
            }
        }
        for grid in &self.grids {
            for curve in grid.iso_lines() {
                let line = curve.view(*transform).sample(None)?;
                for s in &line.samples {
                    bb.expand_point(s.p);
                }
            }
        }
        Ok(bb)
    }

    /// Give every straight reference curve the parameter interval that
    /// spans the Block's local bounding box.
    pub(crate) fn derive_reference_ranges(&mut self) -> Result<(), GeometryError> {
        let bb = self.bbox(&ProjectiveTransform::identity())?;
        if bb.is_empty() {
            return Ok(());
        }
        // Pad so chords near the box edge still cross.
        let pad = 0.05 * bb.diagonal().max(1e-9);
        let bb = BBox {
            min: bb.min - dvec2(pad, pad),
            max: bb.max + dvec2(pad, pad),
        };
        for curve in self.curves.iter_mut().filter(|c| c.reference) {
            if let Shape::Linear(line) = &curve.shape {
                let f0 = (line.func)(0.0);
                let f1 = (line.func)(1.0);
                let dir = line.direction * (f1 - f0);
                let origin = line.origin + line.direction * f0;
                if let Some((t0, t1)) = clip_line(origin, dir, &bb) {
                    // Linear func: parameter = f0 + t (f1 - f0) inverts to u = t.
                    curve.range = Range {
                        min: t0,
                        max: t1,
                        reversed: false,
                    };
                }
            }
        }
        Ok(())
    }
}

/// Parameter interval of `origin + t·dir` inside `bb` (Liang–Barsky).
fn clip_line(origin: DVec2, dir: DVec2, bb: &BBox) -> Option<(f64, f64)> {
    let mut t0 = f64::NEG_INFINITY;
    let mut t1 = f64::INFINITY;
    for (o, d, lo, hi) in [
        (origin.x, dir.x, bb.min.x, bb.max.x),
        (origin.y, dir.y, bb.min.y, bb.max.y),
    ] {
        if d == 0.0 {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }
        let (a, b) = ((lo - o) / d, (hi - o) / d);
        t0 = t0.max(a.min(b));
        t1 = t1.min(a.max(b));
    }
    (t0 < t1 && t0.is_finite() && t1.is_finite()).then_some((t0, t1))
}

/// Smallest and largest value of a monotonic `f` over `range`.
pub(crate) fn func_bounds(f: &Func1, range: &Range) -> (f64, f64) {
    let (a, b) = (f(range.min), f(range.max));
    (a.min(b), a.max(b))
}

/// Spread of `f` over `range`; zero spread cannot be laid out.
pub(crate) fn func_span(
    f: &Func1,
    range: &Range,
    name: &'static str,
) -> Result<(f64, f64), ConfigError> {
    let (lo, hi) = func_bounds(f, range);
    if !(hi - lo).is_finite() || hi - lo <= 0.0 {
        return Err(ConfigError::Layout { name, value: hi - lo });
    }
    Ok((lo, hi))
}

pub(crate) fn positive_layout(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    crate::types::positive(value).map_err(|_| ConfigError::Layout { name, value })
}

/// Vertical line scale `(x, μ·value + c)`; the building block of the sum
/// constructions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct VLine {
    pub x: f64,
    pub mu: f64,
    pub c: f64,
}

impl VLine {
    /// Line carrying `a + b` for a chord through `a` and `b`.
    ///
    /// With `t = μa/(μa+μb)` the middle sits at `xa + t (xb - xa)` with
    /// multiplier `μa μb/(μa+μb)` and offset `(μb ca + μa cb)/(μa+μb)`.
    pub fn combine(a: VLine, b: VLine) -> VLine {
        let total = a.mu + b.mu;
        let t = a.mu / total;
        VLine {
            x: a.x + t * (b.x - a.x),
            mu: a.mu * b.mu / total,
            c: (b.mu * a.c + a.mu * b.c) / total,
        }
    }

    /// Scale shape along this line for `value = func(u)`.
    pub fn shape(&self, func: Func1) -> LinearScale {
        LinearScale {
            origin: dvec2(self.x, self.c),
            direction: dvec2(0.0, self.mu),
            func,
        }
    }

    /// Reference curve whose parameter is the carried value itself.
    pub fn reference(&self) -> ScaleCurve {
        ScaleCurve::reference(self.shape(func1(|u| u)))
    }

    /// Same line carrying the negated value.
    pub fn negated(&self) -> VLine {
        VLine {
            mu: -self.mu,
            ..*self
        }
    }
}
