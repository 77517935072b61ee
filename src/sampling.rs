//! Adaptive arc-length sampling of parametric curves, plus the small
//! numeric helpers built on top of it (section intersection, bracketed
//! root finding).
//!
//! The same sampler serves grid construction, main-line rendering,
//! `arc_length` and the isopleth engine's section lists.

use glam::DVec2;

use crate::errors::GeometryError;
use crate::types::{Range, cross};

/// Segments longer than `SHRINK_ABOVE × target` shrink the step.
pub const SHRINK_ABOVE: f64 = 5.0;
/// Segments shorter than `GROW_BELOW × target` grow the step.
pub const GROW_BELOW: f64 = 0.2;
/// Multiplicative step correction (0.1%).
pub const STEP_FACTOR: f64 = 1.001;
/// Correction attempts per segment before taking the extreme point as is.
pub const MAX_CORRECTIONS: usize = 1000;
/// Default number of segments a curve is cut into when no target is given.
pub const DEFAULT_SEGMENTS: f64 = 200.0;

const MAX_SAMPLES: usize = 200_000;
const COARSE_SAMPLES: usize = 24;

/// One sampled curve point and its parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub u: f64,
    pub p: DVec2,
}

/// Sampled curve: parameters ascending, consecutive points roughly
/// `target` apart.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Polyline {
    pub samples: Vec<Sample>,
}

impl Polyline {
    pub fn points(&self) -> Vec<DVec2> {
        self.samples.iter().map(|s| s.p).collect()
    }

    pub fn length(&self) -> f64 {
        self.samples
            .windows(2)
            .map(|w| (w[1].p - w[0].p).length())
            .sum()
    }

    /// Consecutive sample pairs.
    pub fn sections(&self) -> impl Iterator<Item = (&Sample, &Sample)> {
        self.samples.windows(2).map(|w| (&w[0], &w[1]))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Sample `f` over `range` with a target segment length.
///
/// `target = None` picks `length / DEFAULT_SEGMENTS` from a coarse pass.
pub fn sample_adaptive<F>(
    mut f: F,
    range: Range,
    target: Option<f64>,
) -> Result<Polyline, GeometryError>
where
    F: FnMut(f64) -> Result<DVec2, GeometryError>,
{
    let (u0, u1) = (range.min, range.max);
    let first = f(u0)?;
    let mut samples = vec![Sample { u: u0, p: first }];
    let span = u1 - u0;
    if span <= 0.0 {
        return Ok(Polyline { samples });
    }

    // Coarse pass: estimate the total length to seed the step size.
    let mut coarse_len = 0.0;
    let mut prev = first;
    for i in 1..=COARSE_SAMPLES {
        let q = f(u0 + span * i as f64 / COARSE_SAMPLES as f64)?;
        coarse_len += (q - prev).length();
        prev = q;
    }
    let target = match target {
        Some(t) if t > 0.0 => t,
        _ => coarse_len / DEFAULT_SEGMENTS,
    };
    if coarse_len <= 0.0 || target <= 0.0 {
        samples.push(Sample { u: u1, p: f(u1)? });
        return Ok(samples_into(samples));
    }

    let min_step = span * 1e-12;
    let mut step = (span * target / coarse_len).clamp(min_step, span);
    let mut u = u0;
    let mut p = first;
    while u < u1 && samples.len() < MAX_SAMPLES {
        let mut next = (u + step).min(u1);
        let mut q = f(next)?;
        let mut corrections = 0;
        while corrections < MAX_CORRECTIONS {
            let d = (q - p).length();
            if d > SHRINK_ABOVE * target && step > min_step {
                step = (step / STEP_FACTOR).max(min_step);
            } else if d < GROW_BELOW * target && next < u1 {
                step *= STEP_FACTOR;
            } else {
                break;
            }
            corrections += 1;
            next = (u + step).min(u1);
            q = f(next)?;
        }
        samples.push(Sample { u: next, p: q });
        u = next;
        p = q;
    }
    Ok(samples_into(samples))
}

fn samples_into(samples: Vec<Sample>) -> Polyline {
    Polyline { samples }
}

/// Arc length of `f` between `u0` and `u1` (either order).
pub fn arc_length<F>(f: F, u0: f64, u1: f64, target: Option<f64>) -> Result<f64, GeometryError>
where
    F: FnMut(f64) -> Result<DVec2, GeometryError>,
{
    let range = Range {
        min: u0.min(u1),
        max: u0.max(u1),
        reversed: u0 > u1,
    };
    Ok(sample_adaptive(f, range, target)?.length())
}

/// Intersection of the infinite lines `a0-a1` and `b0-b1`.
///
/// Returns the point with its parameters `t` along `a` and `s` along `b`
/// (0 at the first point, 1 at the second), or `None` for parallel lines.
pub fn line_intersection(a0: DVec2, a1: DVec2, b0: DVec2, b1: DVec2) -> Option<(DVec2, f64, f64)> {
    let da = a1 - a0;
    let db = b1 - b0;
    let denom = cross(da, db);
    let scale = da.length() * db.length();
    if denom.abs() <= 1e-14 * scale || scale == 0.0 {
        return None;
    }
    let w = b0 - a0;
    let t = cross(w, db) / denom;
    let s = cross(w, da) / denom;
    Some((a0 + da * t, t, s))
}

/// Signed distance-like collinearity measure of `p` against line `a-b`.
#[inline]
pub fn side(a: DVec2, b: DVec2, p: DVec2) -> f64 {
    cross(b - a, p - a)
}

/// Refine a sign change of `f` inside `[a, b]` (Illinois regula falsi with
/// a bisection safeguard). `fa` and `fb` must have opposite signs or be zero.
pub fn refine_root<F>(
    mut f: F,
    mut a: f64,
    mut b: f64,
    mut fa: f64,
    mut fb: f64,
) -> Result<f64, GeometryError>
where
    F: FnMut(f64) -> Result<f64, GeometryError>,
{
    if fa == 0.0 {
        return Ok(a);
    }
    if fb == 0.0 {
        return Ok(b);
    }
    let tol = 1e-15 * a.abs().max(b.abs()).max(1e-300);
    let mut side_kept = 0i8;
    for _ in 0..200 {
        if (b - a).abs() <= tol {
            break;
        }
        let mut c = (a * fb - b * fa) / (fb - fa);
        if !c.is_finite() || c <= a.min(b) || c >= a.max(b) {
            c = 0.5 * (a + b);
        }
        let fc = f(c)?;
        if fc == 0.0 {
            return Ok(c);
        }
        if (fc < 0.0) == (fa < 0.0) {
            a = c;
            fa = fc;
            if side_kept == -1 {
                fb *= 0.5;
            }
            side_kept = -1;
        } else {
            b = c;
            fb = fc;
            if side_kept == 1 {
                fa *= 0.5;
            }
            side_kept = 1;
        }
    }
    Ok(if fa.abs() < fb.abs() { a } else { b })
}

/// All roots of `f` over `range`, found by scanning `steps` intervals for
/// sign changes and refining each bracket.
///
/// A root exactly on an interior scan point belongs to the interval that
/// starts there (half-open `[start, end)`); the last interval is closed.
pub fn scan_roots<F>(mut f: F, range: Range, steps: usize) -> Result<Vec<f64>, GeometryError>
where
    F: FnMut(f64) -> Result<f64, GeometryError>,
{
    let steps = steps.max(1);
    let mut roots = Vec::new();
    let mut a = range.min;
    let mut fa = f(a)?;
    for i in 1..=steps {
        let b = range.lerp(i as f64 / steps as f64);
        let fb = f(b)?;
        if fa == 0.0 {
            roots.push(a);
        } else if fb == 0.0 {
            if i == steps {
                roots.push(b);
            }
        } else if (fa < 0.0) != (fb < 0.0) {
            roots.push(refine_root(&mut f, a, b, fa, fb)?);
        }
        a = b;
        fa = fb;
    }
    Ok(roots)
}
