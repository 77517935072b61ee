//! Post-fit checks: the differential identity on a regular grid and an
//! independent millimetre re-walk of the published curves.

use glam::{DVec2, dvec2, dvec3};

use crate::chebyshev::Interpolant;
use crate::scale::{FittedScale, Func2, ScaleShape};
use crate::types::cross;

use super::Axes;
use super::cost::{CurveNodes, Curves, project};

const GRID: usize = 20;
/// Re-walk step on paper, millimetres.
const STEP_MM: f64 = 1.0;
const MAX_STEPS: usize = 200;
const LENGTH_SAMPLES: usize = 200;

/// Homogeneous coordinates and their derivatives.
struct Smooth {
    values: [Interpolant; 3],
    slopes: [Interpolant; 3],
}

impl Smooth {
    fn new(nodes: &[f64], c: &CurveNodes) -> Self {
        let values = [&c.x, &c.y, &c.h].map(|v| Interpolant::new(nodes.to_vec(), v.clone()));
        let slopes = [0, 1, 2].map(|k| values[k].derivative());
        Self { values, slopes }
    }

    /// Page point and page derivative at `s`.
    fn at(&self, s: f64) -> (DVec2, DVec2) {
        let [x, y, h] = &self.values;
        let [dx, dy, dh] = &self.slopes;
        project(dvec3(x.eval(s), y.eval(s), h.eval(s)), dvec3(dx.eval(s), dy.eval(s), dh.eval(s)))
    }
}

/// Worst of `|D|`, `|∂D/∂su|` and `|∂D/∂sv|` over a 20×20 grid, where
/// `D = (Q - P) × (R - P)`.
pub(crate) fn identity_residual(curves: &Curves, nodes: &[f64], func: &Func2, axes: &Axes) -> f64 {
    let u = Smooth::new(nodes, &curves.u);
    let v = Smooth::new(nodes, &curves.v);
    let w = Smooth::new(nodes, &curves.w);
    let mut worst = 0.0f64;
    for a in 0..GRID {
        let su = a as f64 / (GRID - 1) as f64;
        let (p, p_s) = u.at(su);
        for b in 0..GRID {
            let sv = b as f64 / (GRID - 1) as f64;
            let sw = axes.sw(func, su, sv);
            let grad = axes.sw_gradient(func, su, sv);
            if !sw.is_finite() || !grad.is_finite() {
                continue;
            }
            let (q, q_s) = v.at(sv);
            let (r, r_s) = w.at(sw);
            let chord = q - p;
            let turn = cross(chord, r_s);
            let d = cross(chord, r - p);
            let d_su = cross(p_s, q - r) + grad.x * turn;
            let d_sv = cross(q_s, r - p) + grad.y * turn;
            worst = worst.max(d.abs()).max(d_su.abs()).max(d_sv.abs());
        }
    }
    worst
}

fn page(scale: &FittedScale, value: f64) -> DVec2 {
    let p = scale.point(value);
    dvec2(p.x / p.z, p.y / p.z)
}

/// Number of roughly millimetre-long steps along a published scale.
fn steps(scale: &FittedScale) -> usize {
    let length: f64 = (0..LENGTH_SAMPLES)
        .map(|k| {
            let s0 = k as f64 / LENGTH_SAMPLES as f64;
            let s1 = (k + 1) as f64 / LENGTH_SAMPLES as f64;
            (page(scale, scale.map.from_unit(s1)) - page(scale, scale.map.from_unit(s0))).length()
        })
        .sum();
    ((length / STEP_MM).ceil() as usize).clamp(2, MAX_STEPS)
}

/// Worst perpendicular distance of the `w` point from the `(u, v)` chord,
/// millimetres, walking both domains at about one millimetre per step.
/// Chords shorter than `resolution` are skipped.
pub(crate) fn rewalk_mm(
    scales: [&FittedScale; 3],
    func: &Func2,
    axes: &Axes,
    resolution: f64,
) -> f64 {
    let [u_scale, v_scale, w_scale] = scales;
    let (nu, nv) = (steps(u_scale), steps(v_scale));
    let mut worst = 0.0f64;
    for a in 0..nu {
        let u = axes.u.from_unit(a as f64 / (nu - 1) as f64);
        let p = page(u_scale, u);
        for b in 0..nv {
            let v = axes.v.from_unit(b as f64 / (nv - 1) as f64);
            let w = func(u, v);
            if !w.is_finite() {
                continue;
            }
            let q = page(v_scale, v);
            let r = page(w_scale, w);
            let gap = (q - p).length();
            if gap < resolution {
                continue;
            }
            let err = cross(q - p, r - p).abs() / gap;
            if err.is_finite() {
                worst = worst.max(err);
            }
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::cost::Layout;
    use crate::scale::{ValueMap, func2};

    fn sum_setup() -> (Layout, Axes, Func2) {
        let axes = Axes {
            u: ValueMap::new(0.0, 1.0, false),
            v: ValueMap::new(0.0, 1.0, false),
            w: ValueMap::new(0.0, 2.0, false),
        };
        (Layout::new(9, false), axes, func2(|u, v| u + v))
    }

    #[test]
    fn exact_layout_has_no_identity_residual() {
        let (layout, axes, f) = sum_setup();
        let curves = layout.unpack(&layout.seed(&f, &axes));
        assert!(identity_residual(&curves, &layout.nodes, &f, &axes) < 1e-9);
    }

    #[test]
    fn rewalk_sees_a_displaced_w_scale() {
        let (layout, axes, f) = sum_setup();
        let mut curves = layout.unpack(&layout.seed(&f, &axes));
        let fitted = |c: &CurveNodes, map: ValueMap| FittedScale {
            x: Interpolant::new(layout.nodes.clone(), c.x.clone()),
            y: Interpolant::new(layout.nodes.clone(), c.y.clone()),
            h: Interpolant::new(layout.nodes.clone(), c.h.clone()),
            map,
            paper: dvec2(100.0, 100.0),
        };
        let (u, v) = (fitted(&curves.u, axes.u), fitted(&curves.v, axes.v));
        let good = rewalk_mm([&u, &v, &fitted(&curves.w, axes.w)], &f, &axes, 0.1);
        assert!(good < 1e-9);

        for y in curves.w.y.iter_mut() {
            *y += 0.01;
        }
        let bad = rewalk_mm([&u, &v, &fitted(&curves.w, axes.w)], &f, &axes, 0.1);
        // One millimetre up on a 100 mm page, chords never steeper than 45°.
        assert!(bad > 0.7 && bad <= 1.0 + 1e-9, "bad = {bad}");
    }
}
