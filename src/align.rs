//! Alignment transforms between scales of different Blocks.
//!
//! A moving scale B is brought onto a fixed scale A. The two-point path
//! matches B's points at 30% and 70% of its domain with the points of
//! equal value on A and completes both into right isosceles triangles, so
//! the solved affine map is a similarity. The double-tag path matches two
//! points on each of two scale pairs and solves the full projective map.

use glam::DVec2;

use crate::errors::GeometryError;
use crate::scale::ScaleCurve;
use crate::transform::ProjectiveTransform;

/// Fractions of the moving scale's domain used as anchors.
pub const ANCHORS: [f64; 2] = [0.3, 0.7];

/// A scale as currently placed in the world.
#[derive(Clone, Copy, Debug)]
pub struct Placed<'a> {
    pub curve: &'a ScaleCurve,
    pub transform: ProjectiveTransform,
}

impl<'a> Placed<'a> {
    pub fn new(curve: &'a ScaleCurve, transform: ProjectiveTransform) -> Self {
        Self { curve, transform }
    }
}

/// Anchor points of `moving` and the points of equal value on `fixed`.
fn matching_points(
    fixed: Placed<'_>,
    moving: Placed<'_>,
    tag: &str,
) -> Result<([DVec2; 2], [DVec2; 2]), GeometryError> {
    let mut src = [DVec2::ZERO; 2];
    let mut dst = [DVec2::ZERO; 2];
    for (k, &t) in ANCHORS.iter().enumerate() {
        let u = moving.curve.range.lerp(t);
        let canonical = moving.curve.aligned_value(u);
        let Some(a) = fixed.curve.from_aligned(canonical)? else {
            return Err(GeometryError::DegenerateTriangle { tag: tag.to_string() });
        };
        src[k] = moving.curve.world_xy(u, &moving.transform)?;
        dst[k] = fixed.curve.world_xy(a, &fixed.transform)?;
    }
    Ok((src, dst))
}

/// Third triangle vertex: `p0` plus `p1 - p0` turned by 90°.
fn right_angle(p: [DVec2; 2]) -> [DVec2; 3] {
    [p[0], p[1], p[0] + (p[1] - p[0]).perp()]
}

/// Similarity moving `moving` onto `fixed` (applied after the moving
/// Block's current transform).
pub fn two_point(
    fixed: Placed<'_>,
    moving: Placed<'_>,
    tag: &str,
) -> Result<ProjectiveTransform, GeometryError> {
    let (src, dst) = matching_points(fixed, moving, tag)?;
    ProjectiveTransform::solve_three_point(right_angle(src), right_angle(dst), tag)
}

/// Projective map matching two scale pairs at once.
pub fn double_tag(
    fixed: [Placed<'_>; 2],
    moving: [Placed<'_>; 2],
    tags: [&str; 2],
) -> Result<ProjectiveTransform, GeometryError> {
    let (s0, d0) = matching_points(fixed[0], moving[0], tags[0])?;
    let (s1, d1) = matching_points(fixed[1], moving[1], tags[1])?;
    ProjectiveTransform::solve_four_point(
        [s0[0], s0[1], s1[0], s1[1]],
        [d0[0], d0[1], d1[0], d1[1]],
    )
}
