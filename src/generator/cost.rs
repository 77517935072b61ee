//! Free-variable layout, initial guess and cost function of the fit.

use glam::{DVec2, DVec3, dvec2, dvec3};

use crate::chebyshev::{differentiate, evaluate_weighted, weights};
use crate::log::debug;
use crate::scale::Func2;
use crate::types::cross;

use super::{Axes, unit_nodes};

/// Cost returned for candidates that evaluate to NaN or infinity, or that
/// put a node at or beyond the line at infinity, so the line search backs
/// off instead of failing.
pub(crate) const PENALTY: f64 = 1e10;

/// Below this spread of the two seed anchors the `w` guess turns quadratic.
const QUADRATIC_BELOW: f64 = 0.1;

/// Steepness of the page-edge barrier of the shape term.
const BARRIER: f64 = 40.0;

/// Homogeneous node coordinates of one scale, unit-square frame. The page
/// point of node `k` is `(x[k] / h[k], y[k] / h[k])`.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct CurveNodes {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub h: Vec<f64>,
}

impl CurveNodes {
    fn straight(x: Vec<f64>, y: Vec<f64>) -> Self {
        let h = vec![1.0; x.len()];
        Self { x, y, h }
    }

    fn weights_positive(&self) -> bool {
        self.h.iter().all(|&h| h > 0.0)
    }

    /// Page point of node `k`.
    pub fn page(&self, k: usize) -> DVec2 {
        dvec2(self.x[k], self.y[k]) / self.h[k]
    }
}

/// Page point and page derivative from a homogeneous point and its
/// derivative.
pub(crate) fn project(p: DVec3, dp: DVec3) -> (DVec2, DVec2) {
    let at = dvec2(p.x, p.y) / p.z;
    (at, (dvec2(dp.x, dp.y) - at * dp.z) / p.z)
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Curves {
    pub u: CurveNodes,
    pub v: CurveNodes,
    pub w: CurveNodes,
}

impl Curves {
    fn weights_positive(&self) -> bool {
        self.u.weights_positive() && self.v.weights_positive() && self.w.weights_positive()
    }
}

/// Packing of node coordinates into the minimizer's vector.
///
/// The end nodes of `u` and `v` are pinned on the page but keep a free
/// weight at the high end; the weight of every scale's first node is 1.
/// Order: `u` inner x, y, h and last h; the same for `v`; all `w` x and
/// y, then `w` h from the second node on.
#[derive(Clone, Debug)]
pub(crate) struct Layout {
    pub n: usize,
    pub nodes: Vec<f64>,
    pub flip_v: bool,
}

impl Layout {
    pub fn new(n: usize, flip_v: bool) -> Self {
        Self {
            n,
            nodes: unit_nodes(n),
            flip_v,
        }
    }

    /// Free variables for `n` nodes.
    pub fn var_count(&self) -> usize {
        9 * self.n - 11
    }

    /// Height of the `v` scale's straight seed at normalized `s`.
    fn v_height(&self, s: f64) -> f64 {
        if self.flip_v { 1.0 - s } else { s }
    }

    fn pinned(&self, vars: &mut impl Iterator<Item = f64>, x: f64, y0: f64, y1: f64) -> CurveNodes {
        let m = self.n - 2;
        let mut take = |count: usize| vars.by_ref().take(count).collect::<Vec<_>>();
        let (xs, ys, hs) = (take(m), take(m), take(m));
        let last = take(1).first().copied().unwrap_or(1.0);
        let with_ends = |first: f64, inner: Vec<f64>, end: f64| {
            let mut out = Vec::with_capacity(m + 2);
            out.push(first);
            out.extend(inner);
            out.push(end);
            out
        };
        CurveNodes {
            x: with_ends(x, xs, x * last),
            y: with_ends(y0, ys, y1 * last),
            h: with_ends(1.0, hs, last),
        }
    }

    pub fn unpack(&self, vars: &[f64]) -> Curves {
        let n = self.n;
        let mut it = vars.iter().copied();
        let u = self.pinned(&mut it, 0.0, 0.0, 1.0);
        let v = self.pinned(&mut it, 1.0, self.v_height(0.0), self.v_height(1.0));
        let x: Vec<f64> = it.by_ref().take(n).collect();
        let y: Vec<f64> = it.by_ref().take(n).collect();
        let mut h = Vec::with_capacity(n);
        h.push(1.0);
        h.extend(it.take(n - 1));
        Curves { u, v, w: CurveNodes { x, y, h } }
    }

    pub fn pack(&self, curves: &Curves) -> Vec<f64> {
        let n = self.n;
        let inner = |v: &[f64]| v[1..n - 1].to_vec();
        let mut out = Vec::with_capacity(self.var_count());
        for c in [&curves.u, &curves.v] {
            out.extend(inner(&c.x));
            out.extend(inner(&c.y));
            out.extend(inner(&c.h));
            out.push(c.h[n - 1]);
        }
        out.extend_from_slice(&curves.w.x);
        out.extend_from_slice(&curves.w.y);
        out.extend_from_slice(&curves.w.h[1..]);
        out
    }

    /// Straight `u` and `v` edges and a `w` line at `x = 0.5`, all with
    /// unit weights.
    ///
    /// The `w` heights come from the two corners whose chords sit at
    /// `y = 0` and `y = 1`. When those corners give nearly the same `w`,
    /// a quadratic through the three most spread of nine boundary and
    /// centre readings is used instead.
    pub fn seed(&self, func: &Func2, axes: &Axes) -> Vec<f64> {
        let anchors = self.seed_anchors(func, axes);
        let curves = Curves {
            u: CurveNodes::straight(vec![0.0; self.n], self.nodes.clone()),
            v: CurveNodes::straight(
                vec![1.0; self.n],
                self.nodes.iter().map(|&s| self.v_height(s)).collect(),
            ),
            w: CurveNodes::straight(
                vec![0.5; self.n],
                self.nodes.iter().map(|&s| lagrange(&anchors, s)).collect(),
            ),
        };
        self.pack(&curves)
    }

    fn seed_anchors(&self, func: &Func2, axes: &Axes) -> Vec<(f64, f64)> {
        let low = axes.sw(func, 0.0, if self.flip_v { 1.0 } else { 0.0 });
        let high = axes.sw(func, 1.0, if self.flip_v { 0.0 } else { 1.0 });
        if (high - low).abs() >= QUADRATIC_BELOW {
            return vec![(low, 0.0), (high, 1.0)];
        }

        let mut readings: Vec<(f64, f64)> = [0.0, 0.5, 1.0]
            .iter()
            .flat_map(|&su| [0.0, 0.5, 1.0].map(|sv| (su, sv)))
            .map(|(su, sv)| (axes.sw(func, su, sv), 0.5 * (su + self.v_height(sv))))
            .filter(|(sw, _)| sw.is_finite())
            .collect();
        readings.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (Some(&lo), Some(&hi)) = (readings.first(), readings.last()) else {
            return vec![(low, 0.0), (high, 1.0)];
        };
        let gap = |r: &(f64, f64)| (r.0 - lo.0).min(hi.0 - r.0);
        let mid = readings.iter().copied().max_by(|a, b| gap(a).total_cmp(&gap(b)));
        debug!("generator: anchors {low} and {high} too close, seeding w quadratically");
        match mid {
            Some(mid) if gap(&mid) > 1e-9 => vec![lo, mid, hi],
            _ => vec![lo, hi],
        }
    }
}

/// Polynomial through `points` at `x`.
fn lagrange(points: &[(f64, f64)], x: f64) -> f64 {
    points
        .iter()
        .enumerate()
        .map(|(i, &(xi, yi))| {
            points
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .fold(yi, |acc, (_, &(xj, _))| acc * (x - xj) / (xi - xj))
        })
        .sum()
}

/// One `(u node, v node)` pair and its constant `w` data.
#[derive(Clone, Copy, Debug)]
struct PairSample {
    i: usize,
    j: usize,
    sw: f64,
    /// `(∂sw/∂su, ∂sw/∂sv)`
    grad: DVec2,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct CostTerms {
    pub accuracy: f64,
    pub derivative: f64,
    pub shape: f64,
}

impl CostTerms {
    pub fn total(&self) -> f64 {
        self.accuracy + self.derivative + self.shape
    }
}

/// Alignment cost over every pair of `u` and `v` nodes.
pub(crate) struct CostModel<'a> {
    layout: &'a Layout,
    weights: Vec<f64>,
    samples: Vec<PairSample>,
    /// Chords shorter than this (unit square) skip the accuracy term.
    min_gap: f64,
    mu_shape: Option<f64>,
}

impl<'a> CostModel<'a> {
    pub fn new(
        layout: &'a Layout,
        func: &Func2,
        axes: &Axes,
        min_gap: f64,
        mu_shape: Option<f64>,
    ) -> Self {
        let mut samples = Vec::with_capacity(layout.n * layout.n);
        let mut skipped = 0usize;
        for (i, &su) in layout.nodes.iter().enumerate() {
            for (j, &sv) in layout.nodes.iter().enumerate() {
                let sw = axes.sw(func, su, sv);
                let grad = axes.sw_gradient(func, su, sv);
                if sw.is_finite() && grad.is_finite() {
                    samples.push(PairSample { i, j, sw, grad });
                } else {
                    skipped += 1;
                }
            }
        }
        if skipped > 0 {
            debug!("generator: {skipped} node pairs give non-finite w and are left out");
        }
        Self {
            layout,
            weights: weights(layout.n),
            samples,
            min_gap,
            mu_shape,
        }
    }

    pub fn cost(&self, vars: &[f64]) -> f64 {
        let curves = self.layout.unpack(vars);
        if !curves.weights_positive() {
            return PENALTY;
        }
        let total = self.terms(&curves).total();
        if total.is_finite() { total } else { PENALTY }
    }

    pub fn terms(&self, c: &Curves) -> CostTerms {
        let nodes = &self.layout.nodes;
        let slopes = |c: &CurveNodes| [&c.x, &c.y, &c.h].map(|values| differentiate(nodes, values));
        let at_node = |c: &CurveNodes, d: &[Vec<f64>; 3], k: usize| {
            project(dvec3(c.x[k], c.y[k], c.h[k]), dvec3(d[0][k], d[1][k], d[2][k]))
        };
        let (du, dv, dw) = (slopes(&c.u), slopes(&c.v), slopes(&c.w));
        let u: Vec<(DVec2, DVec2)> = (0..self.layout.n).map(|k| at_node(&c.u, &du, k)).collect();
        let v: Vec<(DVec2, DVec2)> = (0..self.layout.n).map(|k| at_node(&c.v, &dv, k)).collect();
        let eval = |values: &[f64], s: f64| evaluate_weighted(s, nodes, &self.weights, values);
        let along_w = |s: f64| {
            project(
                dvec3(eval(&c.w.x, s), eval(&c.w.y, s), eval(&c.w.h, s)),
                dvec3(eval(&dw[0], s), eval(&dw[1], s), eval(&dw[2], s)),
            )
        };

        let mut terms = CostTerms::default();
        for s in &self.samples {
            let (p, p_s) = u[s.i];
            let (q, q_s) = v[s.j];
            let (r, r_s) = along_w(s.sw);

            let chord = q - p;
            let gap = chord.length();
            if gap >= self.min_gap {
                let d = cross(chord, r - p) / gap;
                terms.accuracy += d * d;
            }
            let turn = cross(chord, r_s);
            let d_su = cross(p_s, q - r) + s.grad.x * turn;
            let d_sv = cross(q_s, r - p) + s.grad.y * turn;
            terms.derivative += d_su * d_su + d_sv * d_sv;
        }
        let pairs = self.samples.len().max(1) as f64;
        terms.accuracy /= pairs;
        terms.derivative /= pairs;

        if let Some(mu) = self.mu_shape {
            terms.shape = mu * shape_penalty(&c.w);
        }
        terms
    }
}

/// Edge barrier on the `w` nodes minus the `w` scale's polygon length.
fn shape_penalty(w: &CurveNodes) -> f64 {
    let points: Vec<DVec2> = (0..w.x.len()).map(|k| w.page(k)).collect();
    let barrier: f64 = points
        .iter()
        .map(|p| {
            let edge = p.x.min(1.0 - p.x).min(p.y).min(1.0 - p.y);
            (-BARRIER * edge).exp()
        })
        .sum::<f64>()
        / points.len() as f64;
    let length: f64 = points.windows(2).map(|pair| (pair[1] - pair[0]).length()).sum();
    barrier - length
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::{ValueMap, func2};

    fn axes(log: bool, u: (f64, f64), v: (f64, f64), w: (f64, f64)) -> Axes {
        Axes {
            u: ValueMap::new(u.0, u.1, log),
            v: ValueMap::new(v.0, v.1, log),
            w: ValueMap::new(w.0, w.1, log),
        }
    }

    #[test]
    fn straight_seed_is_exact_for_a_sum() {
        let f = func2(|u, v| u + v);
        let a = axes(false, (0.0, 1.0), (0.0, 1.0), (0.0, 2.0));
        let layout = Layout::new(9, false);
        let seed = layout.seed(&f, &a);
        assert_eq!(seed.len(), layout.var_count());
        assert_eq!(layout.unpack(&seed), layout.unpack(&layout.pack(&layout.unpack(&seed))));
        let model = CostModel::new(&layout, &f, &a, 1e-3, None);
        assert!(model.cost(&seed) < 1e-16, "cost {}", model.cost(&seed));
    }

    #[test]
    fn unpack_pins_scale_endpoints() {
        let layout = Layout::new(5, true);
        let c = layout.unpack(&vec![0.3; layout.var_count()]);
        assert_eq!((c.u.page(0), c.u.page(4)), (dvec2(0.0, 0.0), dvec2(0.0, 1.0)));
        assert_eq!((c.v.page(0), c.v.page(4)), (dvec2(1.0, 1.0), dvec2(1.0, 0.0)));
        // The high ends keep their place whatever their weight.
        assert_eq!((c.u.h[0], c.u.h[4]), (1.0, 0.3));
        assert_eq!(c.w.h, vec![1.0, 0.3, 0.3, 0.3, 0.3]);
    }

    #[test]
    fn moving_a_w_node_costs() {
        let f = func2(|u, v| u * v);
        let a = axes(true, (1.0, 10.0), (1.0, 10.0), (1.0, 100.0));
        let layout = Layout::new(7, false);
        let mut vars = layout.seed(&f, &a);
        let model = CostModel::new(&layout, &f, &a, 1e-3, None);
        let before = model.cost(&vars);
        // Second to last `w` y coordinate.
        let w_y = 2 * (3 * (layout.n - 2) + 1) + layout.n;
        vars[w_y + layout.n - 2] += 0.05;
        let after = model.terms(&layout.unpack(&vars));
        assert!(after.accuracy > 0.0);
        assert!(after.derivative > 0.0);
        assert!(after.total() > before);
    }

    #[test]
    fn symmetric_product_seeds_quadratically() {
        // Corners (-1,-1) and (1,1) both give w = 1.
        let f = func2(|u, v| u * v);
        let a = axes(false, (-1.0, 1.0), (-1.0, 1.0), (-1.0, 1.0));
        let layout = Layout::new(5, false);
        let anchors = layout.seed_anchors(&f, &a);
        assert_eq!(anchors.len(), 3);
        assert!(layout.seed(&f, &a).iter().all(|v| v.is_finite()));
    }

    #[test]
    fn quadratic_through_three_points() {
        let pts = [(0.0, 1.0), (1.0, 0.0), (2.0, 1.0)];
        assert!((lagrange(&pts, 3.0) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn shape_term_only_when_enabled() {
        let f = func2(|u, v| u + v);
        let a = axes(false, (0.0, 1.0), (0.0, 1.0), (0.0, 2.0));
        let layout = Layout::new(5, false);
        let seed = layout.seed(&f, &a);
        let plain = CostModel::new(&layout, &f, &a, 1e-3, None).terms(&layout.unpack(&seed));
        let shaped = CostModel::new(&layout, &f, &a, 1e-3, Some(0.1)).terms(&layout.unpack(&seed));
        assert_eq!(plain.shape, 0.0);
        assert!(shaped.shape != 0.0);
    }

    #[test]
    fn projected_derivative_follows_the_quotient_rule() {
        // (t, t², 1 + t) at t = 1.
        let (at, d) = project(dvec3(1.0, 1.0, 2.0), dvec3(1.0, 2.0, 1.0));
        assert_eq!(at, dvec2(0.5, 0.5));
        assert_eq!(d, dvec2(0.25, 0.75));
    }

    #[test]
    fn non_positive_weight_is_penalized() {
        let f = func2(|u, v| u + v);
        let a = axes(false, (0.0, 1.0), (0.0, 1.0), (0.0, 2.0));
        let layout = Layout::new(5, false);
        let mut vars = layout.seed(&f, &a);
        let model = CostModel::new(&layout, &f, &a, 1e-3, None);
        let last = vars.len() - 1;
        vars[last] = -0.5;
        assert_eq!(model.cost(&vars), PENALTY);
    }

    #[test]
    fn rational_layout_of_a_product_is_exact() {
        // u·v on linear axes: u and w rational, v straight and even.
        let f = func2(|u, v| u * v);
        let a = axes(false, (1.0, 10.0), (1.0, 10.0), (1.0, 100.0));
        let layout = Layout::new(5, false);
        let homogeneous = |value: &dyn Fn(f64) -> f64, point: &dyn Fn(f64) -> DVec3| {
            let (mut x, mut y, mut h) = (Vec::new(), Vec::new(), Vec::new());
            for &s in &layout.nodes {
                let p = point(value(s));
                x.push(p.x);
                y.push(p.y);
                h.push(p.z);
            }
            CurveNodes { x, y, h }
        };
        let curves = Curves {
            u: homogeneous(&|s| a.u.from_unit(s), &|u| dvec3(0.0, (u - 1.0) / 0.9, u)),
            v: homogeneous(&|s| a.v.from_unit(s), &|v| dvec3(1.0, (v - 1.0) / 9.0, 1.0)),
            w: homogeneous(&|s| a.w.from_unit(s), &|w| {
                dvec3(1.0, (w - 1.0) / 9.0, 1.0 + 0.1 * w) / 1.1
            }),
        };
        let vars = layout.pack(&curves);
        assert_eq!(layout.unpack(&vars).u.page(4), dvec2(0.0, 1.0));
        let model = CostModel::new(&layout, &f, &a, 1e-3, None);
        assert!(model.cost(&vars) < 1e-20, "cost {}", model.cost(&vars));
    }
}
