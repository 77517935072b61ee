//! `F1 + F2 + … + FN = 0` as a chain of sum constructions joined by
//! reference lines.

use crate::config::ScaleParams;
use crate::errors::{ConfigError, Error};
use crate::isopleth::Entry;
use crate::scale::Func1;

use super::{Block, BlockKind, Relation, VLine, func_span, positive_layout};

/// The first `N-1` scales stand on evenly spaced verticals. Each step of the
/// chain combines the running reference line with the next scale; the last
/// combination carries `-FN` and becomes the N-th scale.
#[derive(Clone)]
pub struct MultiSumBlock {
    pub funcs: Vec<Func1>,
    pub scales: Vec<ScaleParams>,
    pub width: f64,
    pub height: f64,
    pub isopleths: Vec<Vec<Entry>>,
}

impl MultiSumBlock {
    pub fn new(funcs: Vec<Func1>, scales: Vec<ScaleParams>) -> Self {
        Self {
            funcs,
            scales,
            width: 10.0,
            height: 10.0,
            isopleths: Vec::new(),
        }
    }

    pub fn build(&self) -> Result<Block, Error> {
        let n = self.funcs.len();
        if n < 3 || self.scales.len() != n {
            return Err(ConfigError::ScaleCount {
                kind: "multi-sum",
                expected: n.max(3),
                got: self.scales.len().min(n),
            }
            .into());
        }
        let width = positive_layout("width", self.width)?;
        let height = positive_layout("height", self.height)?;

        let mut lines = Vec::with_capacity(n - 1);
        for k in 0..n - 1 {
            let (lo, hi) = func_span(&self.funcs[k], &self.scales[k].range()?, "function span")?;
            let mu = height / (hi - lo);
            lines.push(VLine {
                x: width * k as f64 / (n - 2) as f64,
                mu,
                c: -mu * lo,
            });
        }

        let mut refs = Vec::new();
        let mut triples = Vec::new();
        let mut running = VLine::combine(lines[0], lines[1]);
        let mut prev = 0;
        for k in 1..n - 1 {
            if k > 1 {
                running = VLine::combine(running, lines[k]);
            }
            let target = if k < n - 2 { n + k - 1 } else { n - 1 };
            triples.push([prev, k, target]);
            if k < n - 2 {
                refs.push(running.reference());
            }
            prev = target;
        }

        let mut curves = Vec::with_capacity(2 * n - 3);
        for k in 0..n - 1 {
            curves.push(self.scales[k].curve(lines[k].shape(self.funcs[k].clone()))?);
        }
        curves.push(self.scales[n - 1].curve(running.negated().shape(self.funcs[n - 1].clone()))?);
        curves.extend(refs);

        let mut block = Block::new(BlockKind::MultiSum, curves, Relation::Collinear(triples));
        block.derive_reference_ranges()?;
        Ok(block.with_isopleths(self.isopleths.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::func1;
    use crate::types::cross;

    fn four() -> Block {
        MultiSumBlock::new(
            vec![func1(|u| u), func1(|u| u), func1(|u| u), func1(|u| u)],
            vec![
                ScaleParams::new(0.0, 1.0),
                ScaleParams::new(0.0, 2.0),
                ScaleParams::new(0.0, 3.0),
                ScaleParams::new(-6.0, 0.0),
            ],
        )
        .build()
        .unwrap()
    }

    #[test]
    fn chain_has_reference_lines() {
        let b = four();
        assert_eq!(b.curves.len(), 5);
        assert_eq!(b.inputs, 4);
        assert!(b.curves[4].reference);
        assert_eq!(b.relation_triples(), vec![[0, 1, 4], [4, 2, 3]]);
    }

    #[test]
    fn chain_is_collinear_through_reference() {
        let b = four();
        let (a, c, d) = (0.4, 1.5, 2.2);
        let total = -(a + c + d);
        let pa = b.curves[0].local_xy(a).unwrap();
        let pb = b.curves[1].local_xy(c).unwrap();
        let pr = b.curves[4].local_xy(a + c).unwrap();
        assert!(cross(pb - pa, pr - pa).abs() < 1e-9);
        let pc = b.curves[2].local_xy(d).unwrap();
        let pd = b.curves[3].local_xy(total).unwrap();
        assert!(cross(pc - pr, pd - pr).abs() < 1e-9);
    }

    #[test]
    fn reference_domain_spans_the_chart() {
        let b = four();
        let r = &b.curves[4];
        assert!(r.range.min < 0.0);
        assert!(r.range.max > 3.0);
    }

    #[test]
    fn needs_three_scales() {
        let cfg = MultiSumBlock::new(
            vec![func1(|u| u), func1(|u| u)],
            vec![ScaleParams::new(0.0, 1.0), ScaleParams::new(0.0, 1.0)],
        );
        assert!(cfg.build().is_err());
    }
}
