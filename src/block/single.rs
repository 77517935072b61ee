//! A lone scale, for conversions and display.

use glam::dvec2;

use crate::config::ScaleParams;
use crate::errors::Error;
use crate::isopleth::Entry;
use crate::scale::{Func1, LinearScale};

use super::{Block, BlockKind, Relation, func_span, positive_layout};

#[derive(Clone)]
pub struct SingleBlock {
    pub f: Func1,
    pub u: ScaleParams,
    pub height: f64,
    pub isopleths: Vec<Vec<Entry>>,
}

impl SingleBlock {
    pub fn new(f: Func1, u: ScaleParams) -> Self {
        Self {
            f,
            u,
            height: 10.0,
            isopleths: Vec::new(),
        }
    }

    pub fn build(&self) -> Result<Block, Error> {
        let height = positive_layout("height", self.height)?;
        let (lo, hi) = func_span(&self.f, &self.u.range()?, "function span")?;
        let mu = height / (hi - lo);
        let curve = self.u.curve(LinearScale {
            origin: dvec2(0.0, -mu * lo),
            direction: dvec2(0.0, mu),
            func: self.f.clone(),
        })?;
        let block = Block::new(BlockKind::Single, vec![curve], Relation::Single);
        Ok(block.with_isopleths(self.isopleths.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::func1;

    #[test]
    fn spans_the_height() {
        let b = SingleBlock::new(func1(|u| u.ln()), ScaleParams::new(1.0, 100.0))
            .build()
            .unwrap();
        assert!((b.curves[0].local_xy(1.0).unwrap().y).abs() < 1e-12);
        assert!((b.curves[0].local_xy(100.0).unwrap().y - 10.0).abs() < 1e-12);
        assert!((b.curves[0].local_xy(10.0).unwrap().y - 5.0).abs() < 1e-12);
    }
}
