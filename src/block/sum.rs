//! `F1(u) + F2(v) + F3(w) = 0` on three parallel lines.

use crate::config::ScaleParams;
use crate::errors::Error;
use crate::isopleth::Entry;
use crate::scale::Func1;

use super::{Block, BlockKind, Relation, VLine, func_span, positive_layout};

/// Three-scale sum chart.
///
/// `u` sits on `x = 0`, `w` on `x = width`, and `v` in between at
/// `x = width·μ1/(μ1+μ3)` with multiplier `-(H/2)` where
/// `H = 2μ1μ3/(μ1+μ3)`. `μ1` stretches `u` over `height`; `μ3` stretches
/// `w` over `proportion · height`.
#[derive(Clone)]
pub struct SumBlock {
    pub f1: Func1,
    pub f2: Func1,
    pub f3: Func1,
    pub u: ScaleParams,
    pub v: ScaleParams,
    pub w: ScaleParams,
    /// Default 10.
    pub width: f64,
    /// Default 10.
    pub height: f64,
    /// Height of the `w` scale relative to the `u` scale (default 1).
    pub proportion: f64,
    pub isopleths: Vec<Vec<Entry>>,
}

impl SumBlock {
    pub fn new(
        f1: Func1,
        f2: Func1,
        f3: Func1,
        u: ScaleParams,
        v: ScaleParams,
        w: ScaleParams,
    ) -> Self {
        Self {
            f1,
            f2,
            f3,
            u,
            v,
            w,
            width: 10.0,
            height: 10.0,
            proportion: 1.0,
            isopleths: Vec::new(),
        }
    }

    pub fn build(&self) -> Result<Block, Error> {
        let width = positive_layout("width", self.width)?;
        let height = positive_layout("height", self.height)?;
        let proportion = positive_layout("proportion", self.proportion)?;

        let (ur, wr) = (self.u.range()?, self.w.range()?);
        let (lo1, hi1) = func_span(&self.f1, &ur, "u function span")?;
        let (lo3, hi3) = func_span(&self.f3, &wr, "w function span")?;
        let mu1 = height / (hi1 - lo1);
        let mu3 = proportion * height / (hi3 - lo3);

        let left = VLine { x: 0.0, mu: mu1, c: -mu1 * lo1 };
        let right = VLine { x: width, mu: mu3, c: -mu3 * lo3 };
        // The middle line carries F1 + F3 = -F2.
        let middle = VLine::combine(left, right).negated();

        let curves = vec![
            self.u.curve(left.shape(self.f1.clone()))?,
            self.v.curve(middle.shape(self.f2.clone()))?,
            self.w.curve(right.shape(self.f3.clone()))?,
        ];
        let block = Block::new(BlockKind::Sum, curves, Relation::Collinear(vec![[0, 1, 2]]));
        Ok(block.with_isopleths(self.isopleths.clone())?)
    }
}
