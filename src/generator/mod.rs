//! Nomogram Generator: fits three free-form scales to an arbitrary
//! `w = f(u, v)`.
//!
//! Every scale is a homogeneous triple of barycentric interpolants over
//! Chebyshev nodes in normalized value space `s ∈ [0, 1]`, so projective
//! layouts such as the N-chart of a product are polynomial. The `u` scale
//! runs up the left edge of the unit square and `v` up (or down) the right
//! edge with both endpoints pinned on the page; every node of `w` is free.
//! BFGS minimizes the alignment error plus the error of the differential
//! collinearity identity, after which the fit is validated twice:
//! algebraically on a 20×20 grid and geometrically by re-walking the
//! published curves at about one millimetre per step.

mod cost;
mod validate;

use glam::{DVec2, dvec2};

use crate::chebyshev::{self, Interpolant};
use crate::errors::{ConfigError, Error, GeneratorError};
use crate::log::{debug, info, warn};
use crate::minimize::{BfgsOptions, Progress, bfgs, numerical_gradient};
use crate::scale::{FittedScale, Func2, ValueMap};
use crate::types::Range;

use cost::{CostModel, CurveNodes, Layout};

/// Options of the generator. Paper and resolution are millimetres.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratorConfig {
    /// Chebyshev nodes per scale (default 9). Even counts are bumped to the
    /// next odd number so the domain midpoint is a node.
    pub nodes: usize,
    pub log_u: bool,
    pub log_v: bool,
    pub log_w: bool,
    /// Weight of the measurability/shape term (default off).
    pub mu_shape: Option<f64>,
    /// Default 100 × 100 mm.
    pub paper: DVec2,
    /// Smallest meaningful distance on paper (default 0.1 mm).
    pub resolution: f64,
    /// Default 2000.
    pub max_iter: usize,
    /// Default 1e-12.
    pub gtol: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            nodes: 9,
            log_u: false,
            log_v: false,
            log_w: false,
            mu_shape: None,
            paper: dvec2(100.0, 100.0),
            resolution: 0.1,
            max_iter: 2000,
            gtol: 1e-12,
        }
    }
}

impl GeneratorConfig {
    /// Effective (odd) node count.
    pub fn node_count(&self) -> Result<usize, ConfigError> {
        if self.nodes < 3 {
            return Err(ConfigError::NodeCount { count: self.nodes });
        }
        Ok(self.nodes | 1)
    }
}

/// Outcome of a fit. Non-convergence is reported here, not raised.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratorReport {
    pub iterations: usize,
    /// The largest gradient component fell below the configured tolerance.
    pub converged: bool,
    pub cost: f64,
    /// Largest gradient component at the published point.
    pub gradient: f64,
    /// Worst residual of the collinearity identity and its two partial
    /// derivatives on a 20×20 grid, unit-square coordinates.
    pub identity_residual: f64,
    /// Worst chord misalignment of the published curves, millimetres.
    pub max_error_mm: f64,
    pub resolution_mm: f64,
    /// The `v` scale runs downward (`w` falls in `v` while rising in `u`,
    /// or the reverse).
    pub flipped_v: bool,
}

impl GeneratorReport {
    pub fn within_resolution(&self) -> bool {
        self.max_error_mm <= self.resolution_mm
    }
}

/// The three fitted scales, in paper millimetres.
#[derive(Clone, Debug)]
pub struct FittedNomogram {
    pub u: FittedScale,
    pub v: FittedScale,
    pub w: FittedScale,
    /// `w` domain taken from the four corners.
    pub w_range: Range,
    pub report: GeneratorReport,
}

/// Normalized value axes of the three variables.
#[derive(Clone, Debug)]
pub(crate) struct Axes {
    pub u: ValueMap,
    pub v: ValueMap,
    pub w: ValueMap,
}

impl Axes {
    /// `w` at normalized `(su, sv)`, normalized.
    pub fn sw(&self, func: &Func2, su: f64, sv: f64) -> f64 {
        self.w.to_unit(func(self.u.from_unit(su), self.v.from_unit(sv)))
    }

    /// `(∂sw/∂su, ∂sw/∂sv)` by second-order differences that never leave
    /// the unit square.
    pub fn sw_gradient(&self, func: &Func2, su: f64, sv: f64) -> DVec2 {
        dvec2(
            derivative(|s| self.sw(func, s, sv), su),
            derivative(|s| self.sw(func, su, s), sv),
        )
    }
}

fn derivative(f: impl Fn(f64) -> f64, s: f64) -> f64 {
    const H: f64 = 1e-4;
    if s - H < 0.0 {
        (-3.0 * f(s) + 4.0 * f(s + H) - f(s + 2.0 * H)) / (2.0 * H)
    } else if s + H > 1.0 {
        (3.0 * f(s) - 4.0 * f(s - H) + f(s - 2.0 * H)) / (2.0 * H)
    } else {
        (f(s + H) - f(s - H)) / (2.0 * H)
    }
}

fn log_axis(name: &str, range: &Range, log: bool) -> Result<ValueMap, ConfigError> {
    if log && range.min <= 0.0 {
        return Err(ConfigError::LogNonPositive {
            name: name.to_string(),
            min: range.min,
        });
    }
    Ok(ValueMap::new(range.min, range.max, log))
}

/// Fit `func` over `u × v`.
pub fn generate(
    func: &Func2,
    u: Range,
    v: Range,
    config: &GeneratorConfig,
    progress: &mut dyn Progress,
) -> Result<FittedNomogram, Error> {
    let n = config.node_count()?;
    let paper = dvec2(
        crate::block::positive_layout("generator paper width", config.paper.x)?,
        crate::block::positive_layout("generator paper height", config.paper.y)?,
    );
    let resolution = crate::block::positive_layout("generator resolution", config.resolution)?;

    let corners = [(u.min, v.min), (u.min, v.max), (u.max, v.min), (u.max, v.max)];
    let mut values = [0.0; 4];
    for (slot, &(cu, cv)) in values.iter_mut().zip(&corners) {
        let w = func(cu, cv);
        if !w.is_finite() {
            return Err(GeneratorError::CornerNotFinite { u: cu, v: cv }.into());
        }
        *slot = w;
    }
    let w_min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let w_max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if w_max - w_min <= 0.0 {
        return Err(GeneratorError::FlatFunction.into());
    }
    if config.log_w && w_min <= 0.0 {
        return Err(GeneratorError::LogWNonPositive { w: w_min }.into());
    }
    let w_range = Range::new(w_min, w_max)?;
    let axes = Axes {
        u: log_axis("u", &u, config.log_u)?,
        v: log_axis("v", &v, config.log_v)?,
        w: ValueMap::new(w_min, w_max, config.log_w),
    };

    // Orientation: `v` runs against `u` when w moves oppositely in them.
    let [w00, w01, w10, w11] = values;
    let along_u = (w10 + w11) - (w00 + w01);
    let along_v = (w01 + w11) - (w00 + w10);
    let flip_v = along_u * along_v < 0.0;

    let layout = Layout::new(n, flip_v);
    let seed = layout.seed(func, &axes);
    let scale = resolution / paper.x.min(paper.y);
    let model = CostModel::new(&layout, func, &axes, scale, config.mu_shape);
    debug!(
        "generator: {n} nodes, {} free variables, initial cost {}",
        seed.len(),
        model.cost(&seed)
    );

    let options = BfgsOptions {
        max_iter: config.max_iter,
        gtol: config.gtol,
    };
    let result = bfgs(|x| model.cost(x), seed, options, progress);
    let gradient = numerical_gradient(&mut |x: &[f64]| model.cost(x), &result.x)
        .iter()
        .fold(0.0f64, |worst, g| worst.max(g.abs()));
    let curves = layout.unpack(&result.x);

    let nodes = layout.nodes.clone();
    let fitted = |c: &CurveNodes, map: &ValueMap| {
        let interpolant = |values: &[f64]| Interpolant::new(nodes.clone(), values.to_vec());
        FittedScale {
            x: interpolant(&c.x),
            y: interpolant(&c.y),
            h: interpolant(&c.h),
            map: *map,
            paper,
        }
    };
    let u_scale = fitted(&curves.u, &axes.u);
    let v_scale = fitted(&curves.v, &axes.v);
    let w_scale = fitted(&curves.w, &axes.w);

    let identity_residual = validate::identity_residual(&curves, &layout.nodes, func, &axes);
    let max_error_mm = validate::rewalk_mm([&u_scale, &v_scale, &w_scale], func, &axes, resolution);
    let report = GeneratorReport {
        iterations: result.iterations,
        converged: result.converged,
        cost: result.cost,
        gradient,
        identity_residual,
        max_error_mm,
        resolution_mm: resolution,
        flipped_v: flip_v,
    };
    info!(
        "generator: {} iterations, cost {:e}, gradient {:e}, identity residual {:e}, \
         worst error {:.4} mm",
        report.iterations,
        report.cost,
        report.gradient,
        report.identity_residual,
        report.max_error_mm
    );
    if !report.within_resolution() {
        warn!(
            "generator: worst error {:.4} mm exceeds the {} mm resolution",
            report.max_error_mm,
            resolution
        );
    }

    Ok(FittedNomogram {
        u: u_scale,
        v: v_scale,
        w: w_scale,
        w_range,
        report,
    })
}

/// Chebyshev nodes of the normalized axis.
pub(crate) fn unit_nodes(n: usize) -> Vec<f64> {
    chebyshev::nodes(n, 0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minimize::NoProgress;
    use crate::scale::{ScaleShape, func2};
    use crate::types::cross;

    fn range(a: f64, b: f64) -> Range {
        Range::new(a, b).unwrap()
    }

    fn on_unit_square(f: &Func2) -> Result<FittedNomogram, Error> {
        let cfg = GeneratorConfig::default();
        generate(f, range(0.0, 1.0), range(0.0, 1.0), &cfg, &mut NoProgress)
    }

    #[test]
    fn node_count_is_forced_odd() {
        let cfg = GeneratorConfig {
            nodes: 10,
            ..GeneratorConfig::default()
        };
        assert_eq!(cfg.node_count().unwrap(), 11);
        let cfg = GeneratorConfig {
            nodes: 2,
            ..GeneratorConfig::default()
        };
        assert_eq!(cfg.node_count(), Err(ConfigError::NodeCount { count: 2 }));
    }

    #[test]
    fn product_on_log_axes_meets_both_tolerances() {
        let cfg = GeneratorConfig {
            log_u: true,
            log_v: true,
            log_w: true,
            ..GeneratorConfig::default()
        };
        let f = func2(|u, v| u * v);
        let fit = generate(&f, range(1.0, 10.0), range(1.0, 10.0), &cfg, &mut NoProgress).unwrap();
        assert!(fit.report.identity_residual < 1e-6, "{:?}", fit.report);
        assert!(fit.report.within_resolution(), "{:?}", fit.report);
        assert!(!fit.report.flipped_v);
        assert_eq!((fit.w_range.min, fit.w_range.max), (1.0, 100.0));

        // An off-node reading lines up.
        let (u, v) = (2.5, 3.3);
        let to = |p: glam::DVec3| dvec2(p.x / p.z, p.y / p.z);
        let p = to(fit.u.point(u));
        let q = to(fit.v.point(v));
        let r = to(fit.w.point(u * v));
        assert!(cross(q - p, r - p).abs() / (q - p).length() < 0.1);
    }

    fn assert_fit(fit: &FittedNomogram, cfg: &GeneratorConfig) {
        let r = &fit.report;
        assert!(r.identity_residual < 1e-6, "{r:?}");
        assert!(r.within_resolution(), "{r:?}");
        assert_eq!(r.converged, r.gradient < cfg.gtol, "{r:?}");
    }

    #[test]
    fn product_on_linear_axes_meets_both_tolerances() {
        let cfg = GeneratorConfig::default();
        let f = func2(|u, v| u * v);
        let fit = generate(&f, range(1.0, 10.0), range(1.0, 10.0), &cfg, &mut NoProgress).unwrap();
        assert_fit(&fit, &cfg);

        let page = |p: glam::DVec3| dvec2(p.x / p.z, p.y / p.z);
        for (u, v) in [(2.0, 3.0), (7.5, 1.2), (9.0, 9.0)] {
            let p = page(fit.u.point(u));
            let q = page(fit.v.point(v));
            let r = page(fit.w.point(u * v));
            // Millimetres off the chord.
            assert!(cross(q - p, r - p).abs() / (q - p).length() < 0.1, "({u}, {v})");
        }
    }

    #[test]
    fn hypotenuse_meets_both_tolerances() {
        let cfg = GeneratorConfig::default();
        let f = func2(|u: f64, v: f64| u.hypot(v));
        let fit = generate(&f, range(1.0, 4.0), range(1.0, 4.0), &cfg, &mut NoProgress).unwrap();
        assert_fit(&fit, &cfg);
        assert!((fit.w_range.min - 2f64.sqrt()).abs() < 1e-12);
        assert!((fit.w_range.max - 32f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn difference_flips_the_v_scale() {
        let f = func2(|u, v| u - v);
        let fit = on_unit_square(&f).unwrap();
        assert!(fit.report.flipped_v);
        assert!(fit.report.within_resolution(), "{:?}", fit.report);
    }

    #[test]
    fn non_finite_corner_is_fatal() {
        let f = func2(|u, v| (u - v).ln());
        let err = on_unit_square(&f).unwrap_err();
        assert!(matches!(err, Error::Generator(GeneratorError::CornerNotFinite { .. })));
    }

    #[test]
    fn constant_function_is_rejected() {
        let f = func2(|_, _| 4.0);
        let err = on_unit_square(&f).unwrap_err();
        assert!(matches!(err, Error::Generator(GeneratorError::FlatFunction)));
    }

    #[test]
    fn log_axis_needs_positive_values() {
        let cfg = GeneratorConfig {
            log_u: true,
            ..GeneratorConfig::default()
        };
        let f = func2(|u, v| u + v);
        let err =
            generate(&f, range(0.0, 1.0), range(1.0, 2.0), &cfg, &mut NoProgress).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::LogNonPositive { .. })));
    }
}
