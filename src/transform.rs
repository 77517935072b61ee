//! Projective (homogeneous 3x3) transforms of the page plane.
//!
//! ```text
//! x' = (α1 x + β1 y + γ1) / (α3 x + β3 y + γ3)
//! y' = (α2 x + β2 y + γ2) / (α3 x + β3 y + γ3)
//! ```
//!
//! Points travel through the pipeline in homogeneous form (`DVec3`) and are
//! divided exactly once, in [`dehomogenize`], which refuses to divide by a
//! vanishing third coordinate.

use glam::{DVec2, DVec3, dvec2, dvec3};
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

use crate::errors::GeometryError;

/// Relative size below which a homogeneous weight counts as zero.
const DIVIDE_EPS: f64 = 1e-12;

/// Tolerance used to accept the solution of the 8x8 correspondence system.
const FIT_TOLERANCE: f64 = 1e-7;

/// Divide a homogeneous point, failing on points at (or near) infinity.
pub fn dehomogenize(p: DVec3, context: impl FnOnce() -> String) -> Result<DVec2, GeometryError> {
    let scale = p.x.abs().max(p.y.abs()).max(f64::MIN_POSITIVE);
    if !p.is_finite() || p.z.abs() <= DIVIDE_EPS * scale {
        return Err(GeometryError::DivisionByZero { context: context() });
    }
    Ok(dvec2(p.x / p.z, p.y / p.z))
}

/// Lift a page point to homogeneous coordinates.
#[inline]
pub fn lift(p: DVec2) -> DVec3 {
    dvec3(p.x, p.y, 1.0)
}

/// 3x3 homogeneous transform
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectiveTransform {
    m: Matrix3<f64>,
}

impl Default for ProjectiveTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl ProjectiveTransform {
    pub fn identity() -> Self {
        Self {
            m: Matrix3::identity(),
        }
    }

    /// Build from the nine coefficients, row-major
    /// (`α1 β1 γ1 / α2 β2 γ2 / α3 β3 γ3`).
    pub fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        Self {
            m: Matrix3::new(
                rows[0][0], rows[0][1], rows[0][2], //
                rows[1][0], rows[1][1], rows[1][2], //
                rows[2][0], rows[2][1], rows[2][2],
            ),
        }
    }

    /// The nine coefficients, row-major.
    pub fn rows(&self) -> [[f64; 3]; 3] {
        let m = &self.m;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.m
    }

    pub fn translation(d: DVec2) -> Self {
        Self::from_rows([[1.0, 0.0, d.x], [0.0, 1.0, d.y], [0.0, 0.0, 1.0]])
    }

    pub fn scaling(sx: f64, sy: f64) -> Self {
        Self::from_rows([[sx, 0.0, 0.0], [0.0, sy, 0.0], [0.0, 0.0, 1.0]])
    }

    /// Counter-clockwise rotation about the origin.
    pub fn rotation_degrees(degrees: f64) -> Self {
        let (s, c) = degrees.to_radians().sin_cos();
        Self::from_rows([[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]])
    }

    /// Matrix product `self · other`: applies `other` first, then `self`.
    pub fn compose(&self, other: &ProjectiveTransform) -> Self {
        Self { m: self.m * other.m }
    }

    /// Applies `self` first, then `next`.
    pub fn then(&self, next: &ProjectiveTransform) -> Self {
        next.compose(self)
    }

    pub fn inverse(&self) -> Result<Self, GeometryError> {
        self.m
            .try_inverse()
            .map(|m| Self { m })
            .ok_or(GeometryError::Singular)
    }

    pub fn apply_homogeneous(&self, p: DVec3) -> DVec3 {
        let v = self.m * Vector3::new(p.x, p.y, p.z);
        dvec3(v.x, v.y, v.z)
    }

    pub fn apply(&self, p: DVec2) -> Result<DVec2, GeometryError> {
        dehomogenize(self.apply_homogeneous(lift(p)), || {
            format!("transform of point ({}, {})", p.x, p.y)
        })
    }

    pub fn apply_all(&self, points: &[DVec2]) -> Result<Vec<DVec2>, GeometryError> {
        points.iter().map(|p| self.apply(*p)).collect()
    }

    /// Whether the transform has no perspective component.
    pub fn is_affine(&self) -> bool {
        self.m[(2, 0)] == 0.0 && self.m[(2, 1)] == 0.0 && self.m[(2, 2)] != 0.0
    }

    /// Maximum element-wise difference after normalizing both matrices.
    pub fn distance(&self, other: &ProjectiveTransform) -> f64 {
        let a = normalized(&self.m);
        let b = normalized(&other.m);
        (a - b).abs().max()
    }

    /// Unique affine transform sending triangle `src` onto triangle `dst`.
    ///
    /// Fails with `DegenerateTriangle` when either triangle has zero area.
    pub fn solve_three_point(
        src: [DVec2; 3],
        dst: [DVec2; 3],
        tag: &str,
    ) -> Result<Self, GeometryError> {
        let area_src = crate::types::cross(src[1] - src[0], src[2] - src[0]);
        let area_dst = crate::types::cross(dst[1] - dst[0], dst[2] - dst[0]);
        let size = (src[1] - src[0]).length_squared().max((src[2] - src[0]).length_squared());
        if area_src.abs() <= 1e-12 * size || area_dst.abs() <= f64::MIN_POSITIVE {
            return Err(GeometryError::DegenerateTriangle {
                tag: tag.to_string(),
            });
        }
        // Columns are the homogeneous triangle vertices: M_dst = T · M_src.
        let columns = |p: [DVec2; 3]| p.map(|v| to_na(lift(v)));
        let s = Matrix3::from_columns(&columns(src));
        let d = Matrix3::from_columns(&columns(dst));
        let s_inv = s.try_inverse().ok_or_else(|| GeometryError::DegenerateTriangle {
            tag: tag.to_string(),
        })?;
        Ok(Self { m: d * s_inv })
    }

    /// Unique projective transform sending four points onto four points.
    ///
    /// Solves the classic 8x8 system with `γ3 = 1`. When that normalization
    /// is impossible (the source origin maps to infinity, e.g. when two
    /// polygon edges are parallel after mapping) the solve falls back to the
    /// homogeneous basis construction, which represents such points with a
    /// zero last coordinate instead of dividing by zero.
    pub fn solve_four_point(src: [DVec2; 4], dst: [DVec2; 4]) -> Result<Self, GeometryError> {
        if let Some(t) = Self::solve_eight(&src, &dst) {
            return Ok(t);
        }
        Self::solve_four_point_homogeneous(src.map(lift), dst.map(lift))
    }

    fn solve_eight(src: &[DVec2; 4], dst: &[DVec2; 4]) -> Option<Self> {
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();
        for i in 0..4 {
            let (x, y) = (src[i].x, src[i].y);
            let (xp, yp) = (dst[i].x, dst[i].y);
            let r = 2 * i;
            a[(r, 0)] = x;
            a[(r, 1)] = y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -x * xp;
            a[(r, 7)] = -y * xp;
            b[r] = xp;
            a[(r + 1, 3)] = x;
            a[(r + 1, 4)] = y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -x * yp;
            a[(r + 1, 7)] = -y * yp;
            b[r + 1] = yp;
        }
        let h = a.lu().solve(&b)?;
        if h.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let t = Self::from_rows([[h[0], h[1], h[2]], [h[3], h[4], h[5]], [h[6], h[7], 1.0]]);
        // Reject near-singular solves that do not actually reproduce the quad.
        let scale = dst.iter().map(|p| p.length()).fold(1.0, f64::max);
        for i in 0..4 {
            let mapped = t.apply(src[i]).ok()?;
            if (mapped - dst[i]).length() > FIT_TOLERANCE * scale {
                return None;
            }
        }
        Some(t)
    }

    /// Four-point correspondence on homogeneous points; vertices may lie at
    /// infinity (`z == 0`).
    pub fn solve_four_point_homogeneous(
        src: [DVec3; 4],
        dst: [DVec3; 4],
    ) -> Result<Self, GeometryError> {
        let a = basis_map(&src).ok_or_else(|| GeometryError::DegenerateQuad {
            context: "source quadrilateral".to_string(),
        })?;
        let b = basis_map(&dst).ok_or_else(|| GeometryError::DegenerateQuad {
            context: "target quadrilateral".to_string(),
        })?;
        let a_inv = a.try_inverse().ok_or(GeometryError::Singular)?;
        Ok(Self { m: b * a_inv })
    }
}

/// Matrix sending e1, e2, e3, (1,1,1) to the four given homogeneous points.
fn basis_map(p: &[DVec3; 4]) -> Option<Matrix3<f64>> {
    let m = Matrix3::from_columns(&[to_na(p[0]), to_na(p[1]), to_na(p[2])]);
    let lambda = m.lu().solve(&to_na(p[3]))?;
    let size = lambda.abs().max();
    if lambda.iter().any(|l| !l.is_finite() || l.abs() <= 1e-12 * size) {
        return None;
    }
    Some(Matrix3::from_columns(&[
        to_na(p[0]) * lambda[0],
        to_na(p[1]) * lambda[1],
        to_na(p[2]) * lambda[2],
    ]))
}

fn to_na(p: DVec3) -> Vector3<f64> {
    Vector3::new(p.x, p.y, p.z)
}

fn normalized(m: &Matrix3<f64>) -> Matrix3<f64> {
    let norm = m.norm();
    if norm == 0.0 {
        return *m;
    }
    // Fix the sign using the largest-magnitude element.
    let pivot = m.iter().copied().fold(0.0_f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
    m / (norm * pivot.signum())
}

/// Ordered transform stack of a block.
///
/// Alignment entries are append-only; the final global-fit entry is
/// replaced in place whenever the composer refits the page.
#[derive(Clone, Debug, Default)]
pub struct TransformStack {
    entries: Vec<ProjectiveTransform>,
    global: Option<ProjectiveTransform>,
}

impl TransformStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, t: ProjectiveTransform) {
        self.entries.push(t);
    }

    pub fn set_global(&mut self, t: ProjectiveTransform) {
        self.global = Some(t);
    }

    pub fn global(&self) -> Option<&ProjectiveTransform> {
        self.global.as_ref()
    }

    pub fn len(&self) -> usize {
        self.entries.len() + usize::from(self.global.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Product of the alignment entries (first pushed is applied first).
    pub fn alignment(&self) -> ProjectiveTransform {
        self.entries
            .iter()
            .fold(ProjectiveTransform::identity(), |acc, t| t.compose(&acc))
    }

    /// Collapse the whole stack: global ∘ alignment.
    pub fn effective(&self) -> ProjectiveTransform {
        let align = self.alignment();
        match &self.global {
            Some(g) => g.compose(&align),
            None => align,
        }
    }
}
