//! `F1(u) + F2(v)·F3(w) + F4(w) = 0`.

use glam::dvec2;

use crate::config::ScaleParams;
use crate::errors::Error;
use crate::isopleth::Entry;
use crate::scale::{DeterminantScale, Func1, LinearScale, func1};

use super::{Block, BlockKind, Relation, func_span, positive_layout};

/// `u` on `x = 0` as `a·F1`, `v` on `x = width` as `b·F2`, and `w` on the
/// curve `(a·F3·width, -a·b·F4, b + a·F3)`. Expanding the determinant of
/// the three rows gives `-a·b·(F1 + F2·F3 + F4)`.
#[derive(Clone)]
pub struct MixedBlock {
    pub f1: Func1,
    pub f2: Func1,
    pub f3: Func1,
    pub f4: Func1,
    pub u: ScaleParams,
    pub v: ScaleParams,
    pub w: ScaleParams,
    pub width: f64,
    pub height: f64,
    pub isopleths: Vec<Vec<Entry>>,
}

impl MixedBlock {
    pub fn new(
        f1: Func1,
        f2: Func1,
        f3: Func1,
        f4: Func1,
        u: ScaleParams,
        v: ScaleParams,
        w: ScaleParams,
    ) -> Self {
        Self {
            f1,
            f2,
            f3,
            f4,
            u,
            v,
            w,
            width: 10.0,
            height: 10.0,
            isopleths: Vec::new(),
        }
    }

    pub fn build(&self) -> Result<Block, Error> {
        let width = positive_layout("width", self.width)?;
        let height = positive_layout("height", self.height)?;
        let (lo1, hi1) = func_span(&self.f1, &self.u.range()?, "u function span")?;
        let (lo2, hi2) = func_span(&self.f2, &self.v.range()?, "v function span")?;
        let a = height / (hi1 - lo1);
        let b = height / (hi2 - lo2);

        let (f3x, f3h, f4) = (self.f3.clone(), self.f3.clone(), self.f4.clone());
        let w_shape = DeterminantScale {
            f: func1(move |w| a * f3x(w) * width),
            g: func1(move |w| -a * b * f4(w)),
            h: func1(move |w| b + a * f3h(w)),
        };
        let curves = vec![
            self.u.curve(LinearScale {
                origin: dvec2(0.0, 0.0),
                direction: dvec2(0.0, a),
                func: self.f1.clone(),
            })?,
            self.v.curve(LinearScale {
                origin: dvec2(width, 0.0),
                direction: dvec2(0.0, b),
                func: self.f2.clone(),
            })?,
            self.w.curve(w_shape)?,
        ];
        let block = Block::new(BlockKind::Mixed, curves, Relation::Collinear(vec![[0, 1, 2]]));
        Ok(block.with_isopleths(self.isopleths.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::cross;

    #[test]
    fn mixed_relation_is_collinear() {
        // u = v·w + w²  →  F1 = -u, F2 = v, F3 = w, F4 = w²
        let b = MixedBlock::new(
            func1(|u| -u),
            func1(|v| v),
            func1(|w| w),
            func1(|w| w * w),
            ScaleParams::new(0.0, 50.0),
            ScaleParams::new(0.0, 5.0),
            ScaleParams::new(0.5, 5.0),
        )
        .build()
        .unwrap();
        for (v, w) in [(1.0, 2.0), (4.0, 0.5), (2.5, 3.0)] {
            let u = v * w + w * w;
            let p = b.curves[0].local_xy(u).unwrap();
            let q = b.curves[1].local_xy(v).unwrap();
            let r = b.curves[2].local_xy(w).unwrap();
            let scale = (q - p).length() * (r - p).length();
            assert!(cross(q - p, r - p).abs() < 1e-12 * scale.max(1.0));
        }
    }
}
