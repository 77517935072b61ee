//! Unconstrained minimizers: BFGS on numerical gradients for the
//! generator, Nelder–Mead for the low-dimensional perspective search.

use nalgebra::{DMatrix, DVector};

use crate::log::debug;

/// Observer called once per iteration. Returning `false` stops the run.
pub trait Progress {
    fn iteration(&mut self, iteration: usize, cost: f64) -> bool;
}

/// Progress sink that never interrupts.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn iteration(&mut self, _iteration: usize, _cost: f64) -> bool {
        true
    }
}

impl<F: FnMut(usize, f64) -> bool> Progress for F {
    fn iteration(&mut self, iteration: usize, cost: f64) -> bool {
        self(iteration, cost)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MinimizeResult {
    pub x: Vec<f64>,
    pub cost: f64,
    pub iterations: usize,
    /// Gradient or simplex tolerance reached at the returned point (as
    /// opposed to the iteration cap, a stalled line search or an
    /// interrupt).
    pub converged: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BfgsOptions {
    pub max_iter: usize,
    /// Stop when the largest gradient component falls below this.
    pub gtol: f64,
}

impl Default for BfgsOptions {
    fn default() -> Self {
        Self {
            max_iter: 2000,
            gtol: 1e-12,
        }
    }
}

const ARMIJO_C1: f64 = 1e-4;
const MIN_STEP: f64 = 1e-20;

/// Central-difference gradient.
pub fn numerical_gradient<F: FnMut(&[f64]) -> f64>(f: &mut F, x: &[f64]) -> Vec<f64> {
    let mut shifted = x.to_vec();
    (0..x.len())
        .map(|i| {
            let h = 6e-6 * x[i].abs().max(1.0);
            shifted[i] = x[i] + h;
            let fp = f(&shifted);
            shifted[i] = x[i] - h;
            let fm = f(&shifted);
            shifted[i] = x[i];
            (fp - fm) / (2.0 * h)
        })
        .collect()
}

/// Quasi-Newton descent with an Armijo backtracking line search.
pub fn bfgs<F>(
    mut f: F,
    x0: Vec<f64>,
    options: BfgsOptions,
    progress: &mut dyn Progress,
) -> MinimizeResult
where
    F: FnMut(&[f64]) -> f64,
{
    let n = x0.len();
    let mut x = DVector::from_vec(x0);
    let mut fx = f(x.as_slice());
    let mut g = DVector::from_vec(numerical_gradient(&mut f, x.as_slice()));
    let mut h = DMatrix::<f64>::identity(n, n);
    // Set while `h` is the identity.
    let mut fresh = true;
    let mut iterations = 0;

    while iterations < options.max_iter {
        if g.amax() < options.gtol {
            break;
        }
        let mut p = -(&h * &g);
        let mut slope = p.dot(&g);
        if slope >= 0.0 {
            h = DMatrix::identity(n, n);
            fresh = true;
            p = -g.clone();
            slope = p.dot(&g);
        }

        let mut alpha = 1.0;
        let step = loop {
            let candidate = &x + alpha * &p;
            let fc = f(candidate.as_slice());
            if fc.is_finite() && fc <= fx + ARMIJO_C1 * alpha * slope {
                break Some((candidate, fc));
            }
            alpha *= 0.5;
            if alpha < MIN_STEP {
                break None;
            }
        };
        let Some((x_next, f_next)) = step else {
            if fresh {
                debug!("bfgs: line search stalled at iteration {iterations}, cost {fx}");
                break;
            }
            debug!("bfgs: line search stalled at iteration {iterations}, restarting");
            h = DMatrix::identity(n, n);
            fresh = true;
            continue;
        };

        let g_next = DVector::from_vec(numerical_gradient(&mut f, x_next.as_slice()));
        let s = &x_next - &x;
        let y = &g_next - &g;
        let sy = s.dot(&y);
        if sy > 1e-12 * s.norm() * y.norm() {
            let rho = 1.0 / sy;
            let eye = DMatrix::<f64>::identity(n, n);
            let left = &eye - rho * &s * y.transpose();
            let right = &eye - rho * &y * s.transpose();
            h = left * h * right + rho * &s * s.transpose();
            fresh = false;
        }
        x = x_next;
        fx = f_next;
        g = g_next;
        iterations += 1;
        if !progress.iteration(iterations, fx) {
            break;
        }
    }

    MinimizeResult {
        x: x.as_slice().to_vec(),
        cost: fx,
        iterations,
        converged: g.amax() < options.gtol,
    }
}

/// Downhill simplex. `step` sizes the initial simplex along each axis.
pub fn nelder_mead<F>(mut f: F, x0: &[f64], step: f64, max_iter: usize, tol: f64) -> MinimizeResult
where
    F: FnMut(&[f64]) -> f64,
{
    let n = x0.len();
    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
    simplex.push((x0.to_vec(), f(x0)));
    for i in 0..n {
        let mut v = x0.to_vec();
        v[i] += step;
        let fv = f(&v);
        simplex.push((v, fv));
    }

    let along = |a: &[f64], b: &[f64], t: f64| -> Vec<f64> {
        a.iter().zip(b).map(|(a, b)| a + t * (b - a)).collect()
    };
    let mut iterations = 0;
    let mut converged = false;
    while iterations < max_iter {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let (best, worst) = (simplex[0].1, simplex[n].1);
        if (worst - best).abs() <= tol * (best.abs() + worst.abs()).max(tol) {
            converged = true;
            break;
        }
        iterations += 1;

        let mut centroid = vec![0.0; n];
        for (v, _) in &simplex[..n] {
            for (c, x) in centroid.iter_mut().zip(v) {
                *c += x / n as f64;
            }
        }
        let worst_point = simplex[n].0.clone();
        let reflected = along(&centroid, &worst_point, -1.0);
        let fr = f(&reflected);
        if fr < simplex[0].1 {
            let expanded = along(&centroid, &worst_point, -2.0);
            let fe = f(&expanded);
            simplex[n] = if fe < fr { (expanded, fe) } else { (reflected, fr) };
        } else if fr < simplex[n - 1].1 {
            simplex[n] = (reflected, fr);
        } else {
            let contracted = if fr < worst {
                along(&centroid, &reflected, 0.5)
            } else {
                along(&centroid, &worst_point, 0.5)
            };
            let fc = f(&contracted);
            if fc < worst.min(fr) {
                simplex[n] = (contracted, fc);
            } else {
                let best_point = simplex[0].0.clone();
                for entry in simplex.iter_mut().skip(1) {
                    let v = along(&best_point, &entry.0, 0.5);
                    let fv = f(&v);
                    *entry = (v, fv);
                }
            }
        }
    }
    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (x, cost) = simplex.swap_remove(0);
    MinimizeResult {
        x,
        cost,
        iterations,
        converged,
    }
}
