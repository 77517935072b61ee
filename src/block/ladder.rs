//! Ladder chart: `F1(u) = F2(v)` read across horizontal rungs.

use glam::dvec2;

use crate::config::ScaleParams;
use crate::errors::Error;
use crate::isopleth::Entry;
use crate::scale::{Func1, LinearScale};

use super::{Block, BlockKind, Relation, func_span, positive_layout};

/// Both scales share one affine map `y = μ(F - lo)` so equal values sit at
/// equal heights; `u` on `x = 0`, `v` on `x = width`.
#[derive(Clone)]
pub struct LadderBlock {
    pub f1: Func1,
    pub f2: Func1,
    pub u: ScaleParams,
    pub v: ScaleParams,
    pub width: f64,
    pub height: f64,
    pub isopleths: Vec<Vec<Entry>>,
}

impl LadderBlock {
    pub fn new(f1: Func1, f2: Func1, u: ScaleParams, v: ScaleParams) -> Self {
        Self {
            f1,
            f2,
            u,
            v,
            width: 2.0,
            height: 10.0,
            isopleths: Vec::new(),
        }
    }

    pub fn build(&self) -> Result<Block, Error> {
        let width = positive_layout("width", self.width)?;
        let height = positive_layout("height", self.height)?;
        let (lo1, hi1) = func_span(&self.f1, &self.u.range()?, "u function span")?;
        let (lo2, hi2) = func_span(&self.f2, &self.v.range()?, "v function span")?;
        let (lo, hi) = (lo1.min(lo2), hi1.max(hi2));
        let mu = height / (hi - lo);

        let side = |x: f64, func: &Func1| LinearScale {
            origin: dvec2(x, -mu * lo),
            direction: dvec2(0.0, mu),
            func: func.clone(),
        };
        let curves = vec![
            self.u.curve(side(0.0, &self.f1))?,
            self.v.curve(side(width, &self.f2))?,
        ];
        let relation = Relation::Ladder {
            f1: self.f1.clone(),
            f2: self.f2.clone(),
        };
        let block = Block::new(BlockKind::Ladder, curves, relation);
        Ok(block.with_isopleths(self.isopleths.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::func1;

    #[test]
    fn equal_values_share_a_rung() {
        // Celsius to Fahrenheit.
        let b = LadderBlock::new(
            func1(|c| c),
            func1(|f| (f - 32.0) / 1.8),
            ScaleParams::new(-40.0, 100.0),
            ScaleParams::new(-40.0, 212.0),
        )
        .build()
        .unwrap();
        let c = b.curves[0].local_xy(37.0).unwrap();
        let f = b.curves[1].local_xy(98.6).unwrap();
        assert!((c.y - f.y).abs() < 1e-9);
        assert_eq!(f.x, 2.0);
    }
}
