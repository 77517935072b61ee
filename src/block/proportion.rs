//! `F1(u) / F2(v) = F3(w) / F4(x)` through a shared pivot line.

use glam::dvec2;

use crate::config::ScaleParams;
use crate::errors::{ConfigError, Error};
use crate::isopleth::Entry;
use crate::scale::{Func1, LinearScale, ScaleCurve, func1};

use super::{Block, BlockKind, Relation, func_bounds, positive_layout};

/// The pivot is the horizontal line `y = 0` between `x = 0` and
/// `x = width`. `u` rises and `w` falls on the left edge (`±a·F`), `x`
/// rises and `v` falls on the right edge (`±b·F`). The chord `u–v` meets the
/// pivot at `width·aF1/(aF1 + bF2)`, which depends only on `F1/F2`; the
/// chord `w–x` crosses the pivot at the same point exactly when the
/// proportion holds.
#[derive(Clone)]
pub struct ProportionBlock {
    pub f1: Func1,
    pub f2: Func1,
    pub f3: Func1,
    pub f4: Func1,
    pub u: ScaleParams,
    pub v: ScaleParams,
    pub w: ScaleParams,
    pub x: ScaleParams,
    pub width: f64,
    pub height: f64,
    pub isopleths: Vec<Vec<Entry>>,
}

impl ProportionBlock {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        f1: Func1,
        f2: Func1,
        f3: Func1,
        f4: Func1,
        u: ScaleParams,
        v: ScaleParams,
        w: ScaleParams,
        x: ScaleParams,
    ) -> Self {
        Self {
            f1,
            f2,
            f3,
            f4,
            u,
            v,
            w,
            x,
            width: 10.0,
            height: 10.0,
            isopleths: Vec::new(),
        }
    }

    pub fn build(&self) -> Result<Block, Error> {
        let width = positive_layout("width", self.width)?;
        let height = positive_layout("height", self.height)?;
        let left = largest(&[(&self.f1, &self.u), (&self.f3, &self.w)])?;
        let right = largest(&[(&self.f2, &self.v), (&self.f4, &self.x)])?;
        let a = 0.5 * height / left;
        let b = 0.5 * height / right;

        let edge = |x: f64, slope: f64, func: &Func1| LinearScale {
            origin: dvec2(x, 0.0),
            direction: dvec2(0.0, slope),
            func: func.clone(),
        };
        let curves = vec![
            self.u.curve(edge(0.0, a, &self.f1))?,
            self.v.curve(edge(width, -b, &self.f2))?,
            self.w.curve(edge(0.0, -a, &self.f3))?,
            self.x.curve(edge(width, b, &self.f4))?,
            ScaleCurve::reference(LinearScale {
                origin: dvec2(0.0, 0.0),
                direction: dvec2(width, 0.0),
                func: func1(|s| s),
            }),
        ];
        let relation = Relation::Collinear(vec![[0, 1, 4], [2, 3, 4]]);
        let mut block = Block::new(BlockKind::Proportion, curves, relation);
        block.derive_reference_ranges()?;
        Ok(block.with_isopleths(self.isopleths.clone())?)
    }
}

fn largest(scales: &[(&Func1, &ScaleParams)]) -> Result<f64, ConfigError> {
    let mut m: f64 = 0.0;
    for (f, params) in scales {
        let (lo, hi) = func_bounds(f, &params.range()?);
        m = m.max(lo.abs()).max(hi.abs());
    }
    if !m.is_finite() || m == 0.0 {
        return Err(ConfigError::Layout {
            name: "proportion magnitude",
            value: m,
        });
    }
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::line_intersection;

    #[test]
    fn chords_meet_on_the_pivot() {
        let b = ProportionBlock::new(
            func1(|u| u),
            func1(|v| v),
            func1(|w| w),
            func1(|x| x),
            ScaleParams::new(1.0, 10.0),
            ScaleParams::new(1.0, 10.0),
            ScaleParams::new(1.0, 10.0),
            ScaleParams::new(1.0, 10.0),
        )
        .build()
        .unwrap();
        // 2 / 8 = 1.5 / 6
        let pu = b.curves[0].local_xy(2.0).unwrap();
        let pv = b.curves[1].local_xy(8.0).unwrap();
        let pw = b.curves[2].local_xy(1.5).unwrap();
        let px = b.curves[3].local_xy(6.0).unwrap();
        let (hit1, t1, s1) = line_intersection(dvec2(0.0, 0.0), dvec2(10.0, 0.0), pu, pv).unwrap();
        let (hit2, t2, s2) = line_intersection(dvec2(0.0, 0.0), dvec2(10.0, 0.0), pw, px).unwrap();
        assert!((hit1 - hit2).length() < 1e-12);
        assert!((t1 - t2).abs() < 1e-12);
        assert!((0.0..=1.0).contains(&s1) && (0.0..=1.0).contains(&s2));
        let pivot = b.curves[4].local_xy(t1).unwrap();
        assert!((pivot - hit1).length() < 1e-12);
    }

    #[test]
    fn pivot_domain_covers_the_width() {
        let b = ProportionBlock::new(
            func1(|u| u),
            func1(|v| v),
            func1(|w| w),
            func1(|x| x),
            ScaleParams::new(1.0, 10.0),
            ScaleParams::new(1.0, 10.0),
            ScaleParams::new(1.0, 10.0),
            ScaleParams::new(1.0, 10.0),
        )
        .build()
        .unwrap();
        let r = b.curves[4].range;
        assert!(r.min < 0.0 && r.max > 1.0);
    }
}
