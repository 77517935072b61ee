//! Chebyshev nodes and barycentric interpolation.
//!
//! Uses the second-kind barycentric formula with weights `(-1)^i`, halved at
//! both endpoints (Berrut & Trefethen, "Barycentric Lagrange Interpolation",
//! SIAM Review 46, 2004). Stable for large node counts, unlike the plain
//! Lagrange form.

/// `n` Chebyshev points of the second kind on `[a, b]`, ascending.
///
/// `x_i = a + (b - a)/2 · (1 - cos(iπ/(n-1)))`
pub fn nodes(n: usize, a: f64, b: f64) -> Vec<f64> {
    if n == 1 {
        return vec![0.5 * (a + b)];
    }
    let last = (n - 1) as f64;
    (0..n)
        .map(|i| {
            // Symmetric form keeps the midpoint exact for odd n.
            let theta = std::f64::consts::PI * i as f64 / last;
            let c = -theta.cos();
            if 2 * i + 1 == n {
                0.5 * (a + b)
            } else {
                0.5 * (a + b) + 0.5 * (b - a) * c
            }
        })
        .collect()
}

/// Barycentric weights for second-kind Chebyshev points.
pub fn weights(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            if i == 0 || i + 1 == n { 0.5 * sign } else { sign }
        })
        .collect()
}

/// Evaluate the interpolant through `(nodes[i], values[i])` at `x`.
///
/// Exactly reproduces `values[i]` when `x == nodes[i]`.
pub fn evaluate(x: f64, nodes: &[f64], values: &[f64]) -> f64 {
    let w = weights(nodes.len());
    evaluate_weighted(x, nodes, &w, values)
}

/// [`evaluate`] with precomputed weights.
pub fn evaluate_weighted(x: f64, nodes: &[f64], weights: &[f64], values: &[f64]) -> f64 {
    let mut num = 0.0;
    let mut den = 0.0;
    for ((&xi, &wi), &fi) in nodes.iter().zip(weights).zip(values) {
        let d = x - xi;
        if d == 0.0 {
            return fi;
        }
        let t = wi / d;
        num += t * fi;
        den += t;
    }
    num / den
}

/// Derivative of the interpolant at every node.
///
/// Uses the barycentric differentiation matrix
/// `D_ij = (w_j / w_i) / (x_i - x_j)`, `D_ii = -Σ_{j≠i} D_ij`.
pub fn differentiate(nodes: &[f64], values: &[f64]) -> Vec<f64> {
    let n = nodes.len();
    let w = weights(n);
    let mut out = vec![0.0; n];
    for i in 0..n {
        let mut acc = 0.0;
        let mut diag = 0.0;
        for j in 0..n {
            if i == j {
                continue;
            }
            let dij = (w[j] / w[i]) / (nodes[i] - nodes[j]);
            acc += dij * values[j];
            diag -= dij;
        }
        out[i] = acc + diag * values[i];
    }
    out
}

/// A frozen interpolant: nodes, weights and sampled values.
#[derive(Clone, Debug, PartialEq)]
pub struct Interpolant {
    nodes: Vec<f64>,
    weights: Vec<f64>,
    values: Vec<f64>,
}

impl Interpolant {
    pub fn new(nodes: Vec<f64>, values: Vec<f64>) -> Self {
        let weights = weights(nodes.len());
        Self {
            nodes,
            weights,
            values,
        }
    }

    pub fn eval(&self, x: f64) -> f64 {
        evaluate_weighted(x, &self.nodes, &self.weights, &self.values)
    }

    /// Interpolant of the derivative.
    pub fn derivative(&self) -> Interpolant {
        let d = differentiate(&self.nodes, &self.values);
        Interpolant {
            nodes: self.nodes.clone(),
            weights: self.weights.clone(),
            values: d,
        }
    }

    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodes_are_ascending_and_hit_the_ends() {
        let x = nodes(9, 1.0, 10.0);
        assert_eq!(x.len(), 9);
        assert_eq!(x[0], 1.0);
        assert_eq!(x[8], 10.0);
        assert_eq!(x[4], 5.5);
        assert!(x.windows(2).all(|w| w[0] < w[1]));
        // Denser near the ends.
        assert!(x[1] - x[0] < x[4] - x[3]);
    }

    #[test]
    fn weights_halve_endpoints() {
        assert_eq!(weights(5), vec![0.5, -1.0, 1.0, -1.0, 0.5]);
    }

    #[test]
    fn evaluate_is_exact_at_nodes() {
        let x = nodes(21, -2.0, 3.0);
        let f: Vec<f64> = x.iter().map(|v| (3.0 * v).sin() + v * v).collect();
        for i in 0..x.len() {
            assert_eq!(evaluate(x[i], &x, &f), f[i]);
        }
    }

    #[test]
    fn evaluate_reproduces_polynomials() {
        let x = nodes(7, 0.0, 2.0);
        let p = |t: f64| 1.0 - 2.0 * t + 0.5 * t.powi(3) - 0.1 * t.powi(6);
        let f: Vec<f64> = x.iter().map(|&t| p(t)).collect();
        for k in 0..50 {
            let t = 2.0 * k as f64 / 49.0 + 1e-3;
            assert!((evaluate(t, &x, &f) - p(t)).abs() < 1e-10);
        }
    }

    #[test]
    fn differentiate_is_exact_for_polynomials() {
        let n = 11;
        let x = nodes(n, -1.0, 4.0);
        let p = |t: f64| 0.3 - t + 2.0 * t.powi(2) - 0.001 * t.powi(10);
        let dp = |t: f64| -1.0 + 4.0 * t - 0.01 * t.powi(9);
        let f: Vec<f64> = x.iter().map(|&t| p(t)).collect();
        let d = differentiate(&x, &f);
        for i in 0..n {
            let rel = (d[i] - dp(x[i])).abs() / dp(x[i]).abs().max(1.0);
            assert!(rel < 1e-8, "node {i}: {} vs {}", d[i], dp(x[i]));
        }
    }

    #[test]
    fn large_node_count_stays_stable() {
        let x = nodes(61, 0.0, 1.0);
        let f: Vec<f64> = x.iter().map(|v| (10.0 * v).exp() / 1e4).collect();
        let y = Interpolant::new(x, f);
        let t = 0.123_456;
        assert!((y.eval(t) - (10.0 * t).exp() / 1e4).abs() < 1e-9);
    }

    #[test]
    fn interpolant_derivative_of_quadratic() {
        let x = nodes(5, 0.0, 1.0);
        let f: Vec<f64> = x.iter().map(|v| v * v).collect();
        let d = Interpolant::new(x, f).derivative();
        assert!((d.eval(0.3) - 0.6).abs() < 1e-12);
    }
}
