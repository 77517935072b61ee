//! N-chart for `F1(u) = F2(v) · F3(w)`.

use glam::dvec2;

use crate::config::ScaleParams;
use crate::errors::{ConfigError, Error};
use crate::isopleth::Entry;
use crate::scale::{DeterminantScale, Func1, LinearScale, func1};

use super::{Block, BlockKind, Relation, func_bounds, positive_layout};

/// `u` rises on `x = 0` as `a·F1`, `v` falls on `x = width` as `-b·F2`, and
/// `w` runs along the zero line at `x = a·F3·width / (a·F3 + b)`.
#[derive(Clone)]
pub struct ProductBlock {
    pub f1: Func1,
    pub f2: Func1,
    pub f3: Func1,
    pub u: ScaleParams,
    pub v: ScaleParams,
    pub w: ScaleParams,
    pub width: f64,
    pub height: f64,
    pub isopleths: Vec<Vec<Entry>>,
}

impl ProductBlock {
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
            isopleths: Vec::new(),
        }
    }

    pub fn build(&self) -> Result<Block, Error> {
        let width = positive_layout("width", self.width)?;
        let height = positive_layout("height", self.height)?;
        let a = height / magnitude(&self.f1, &self.u, "u function magnitude")?;
        let b = height / magnitude(&self.f2, &self.v, "v function magnitude")?;

        let f3 = self.f3.clone();
        let f3_den = self.f3.clone();
        let w_shape = DeterminantScale {
            f: func1(move |w| a * f3(w) * width),
            g: func1(|_| 0.0),
            h: func1(move |w| a * f3_den(w) + b),
        };
        let curves = vec![
            self.u.curve(LinearScale {
                origin: dvec2(0.0, 0.0),
                direction: dvec2(0.0, a),
                func: self.f1.clone(),
            })?,
            self.v.curve(LinearScale {
                origin: dvec2(width, 0.0),
                direction: dvec2(0.0, -b),
                func: self.f2.clone(),
            })?,
            self.w.curve(w_shape)?,
        ];
        let block = Block::new(BlockKind::Product, curves, Relation::Collinear(vec![[0, 1, 2]]));
        Ok(block.with_isopleths(self.isopleths.clone())?)
    }
}

/// Largest `|F|` over the scale's domain.
fn magnitude(f: &Func1, params: &ScaleParams, name: &'static str) -> Result<f64, ConfigError> {
    let (lo, hi) = func_bounds(f, &params.range()?);
    let m = lo.abs().max(hi.abs());
    if !m.is_finite() || m == 0.0 {
        return Err(ConfigError::Layout { name, value: m });
    }
    Ok(m)
}
