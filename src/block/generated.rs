//! `w = f(u, v)` laid out by the Nomogram Generator.

use crate::config::ScaleParams;
use crate::errors::Error;
use crate::generator::{GeneratorConfig, GeneratorReport, generate};
use crate::isopleth::Entry;
use crate::log::debug;
use crate::scale::Func2;

use super::{Block, BlockKind, Relation};

/// Free-form three-scale chart fitted to an arbitrary function.
///
/// `u` and `v` must be ascending. The `w` domain comes from the four
/// corners of `u × v`; the bounds in `w` are ignored, its tag, title and
/// axis style are kept.
#[derive(Clone)]
pub struct GeneratedBlock {
    pub func: Func2,
    pub u: ScaleParams,
    pub v: ScaleParams,
    pub w: ScaleParams,
    pub generator: GeneratorConfig,
    pub isopleths: Vec<Vec<Entry>>,
}

impl GeneratedBlock {
    pub fn new(func: Func2, u: ScaleParams, v: ScaleParams, w: ScaleParams) -> Self {
        Self {
            func,
            u,
            v,
            w,
            generator: GeneratorConfig::default(),
            isopleths: Vec::new(),
        }
    }

    pub fn build(&self) -> Result<(Block, GeneratorReport), Error> {
        let (ur, vr) = (self.u.ordered_range()?, self.v.ordered_range()?);
        let mut progress = |iteration: usize, cost: f64| {
            if iteration % 100 == 0 {
                debug!("generator: iteration {iteration}, cost {cost:e}");
            }
            true
        };
        let fit = generate(&self.func, ur, vr, &self.generator, &mut progress)?;

        let mut w = self.w.clone();
        w.u_min = fit.w_range.min;
        w.u_max = fit.w_range.max;
        let curves = vec![self.u.curve(fit.u)?, self.v.curve(fit.v)?, w.curve(fit.w)?];
        let block = Block::new(BlockKind::Generated, curves, Relation::Collinear(vec![[0, 1, 2]]));
        Ok((block.with_isopleths(self.isopleths.clone())?, fit.report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isopleth::IsoplethEngine;
    use crate::scale::func2;

    #[test]
    fn fitted_sum_answers_isopleths() {
        let mut cfg = GeneratedBlock::new(
            func2(|u, v| u + v),
            ScaleParams::new(0.0, 4.0),
            ScaleParams::new(0.0, 6.0),
            ScaleParams::new(0.0, 0.0).tag("total"),
        );
        cfg.isopleths = vec![vec![Entry::Value(1.5), Entry::Value(2.5), Entry::Unknown]];
        let (block, report) = cfg.build().unwrap();
        assert!(report.within_resolution(), "{report:?}");
        assert_eq!(block.curves[2].tag.as_deref(), Some("total"));
        assert_eq!((block.curves[2].range.min, block.curves[2].range.max), (0.0, 10.0));

        let blocks = vec![block];
        let solved = IsoplethEngine::new(&blocks).unwrap().solve().unwrap();
        let w = solved.value(0, 0, 2).unwrap();
        assert!((w - 4.0).abs() < 1e-3, "w = {w}");
    }

    #[test]
    fn descending_u_domain_is_rejected() {
        let cfg = GeneratedBlock::new(
            func2(|u, v| u + v),
            ScaleParams::new(4.0, 0.0),
            ScaleParams::new(0.0, 6.0),
            ScaleParams::default(),
        );
        assert!(matches!(cfg.build(), Err(Error::Config(_))));
    }
}
