//! `1/F1(u) + 1/F2(v) + 1/F3(w) = 0` on three concurrent lines.

use glam::{DVec2, dvec2};

use crate::config::ScaleParams;
use crate::errors::{ConfigError, Error};
use crate::isopleth::Entry;
use crate::scale::{Func1, LinearScale};

use super::{Block, BlockKind, Relation, func_bounds, positive_layout};

/// All three lines pass through the origin. `w` is vertical, `u` leans
/// `angle_u` degrees to the left of it and `v` leans `angle_v` degrees to
/// the right. Radii are `k·sin(av)·F1`, `k·sin(au)·F2` and
/// `-k·sin(au+av)·F3`, which turns the collinearity condition
/// `sin(θ3-θ2)/r1 + sin(θ1-θ3)/r2 + sin(θ2-θ1)/r3 = 0` into the relation.
#[derive(Clone)]
pub struct AngleBlock {
    pub f1: Func1,
    pub f2: Func1,
    pub f3: Func1,
    pub u: ScaleParams,
    pub v: ScaleParams,
    pub w: ScaleParams,
    /// Degrees between `w` and `u` (default 45).
    pub angle_u: f64,
    /// Degrees between `w` and `v` (default 45).
    pub angle_v: f64,
    pub height: f64,
    pub isopleths: Vec<Vec<Entry>>,
}

impl AngleBlock {
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
            angle_u: 45.0,
            angle_v: 45.0,
            height: 10.0,
            isopleths: Vec::new(),
        }
    }

    pub fn build(&self) -> Result<Block, Error> {
        let height = positive_layout("height", self.height)?;
        let au = self.angle_u.to_radians();
        let av = self.angle_v.to_radians();
        if !(au > 0.0 && av > 0.0 && au + av < std::f64::consts::PI) {
            return Err(ConfigError::Layout {
                name: "angle",
                value: self.angle_u + self.angle_v,
            }
            .into());
        }
        let dirs = [
            unit(90.0 + self.angle_u),
            unit(90.0 - self.angle_v),
            unit(90.0),
        ];
        let factors = [av.sin(), au.sin(), -(au + av).sin()];
        let funcs = [&self.f1, &self.f2, &self.f3];
        let params = [&self.u, &self.v, &self.w];

        let mut reach: f64 = 0.0;
        for i in 0..3 {
            let (lo, hi) = func_bounds(funcs[i], &params[i].range()?);
            reach = reach.max(factors[i].abs() * lo.abs().max(hi.abs()));
        }
        if !reach.is_finite() || reach == 0.0 {
            return Err(ConfigError::Layout {
                name: "angle radius",
                value: reach,
            }
            .into());
        }
        let k = height / reach;

        let mut curves = Vec::with_capacity(3);
        for i in 0..3 {
            curves.push(params[i].curve(LinearScale {
                origin: dvec2(0.0, 0.0),
                direction: dirs[i] * (k * factors[i]),
                func: funcs[i].clone(),
            })?);
        }
        let block = Block::new(BlockKind::Angle, curves, Relation::Collinear(vec![[0, 1, 2]]));
        Ok(block.with_isopleths(self.isopleths.clone())?)
    }
}

fn unit(degrees: f64) -> DVec2 {
    let (s, c) = degrees.to_radians().sin_cos();
    dvec2(c, s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::func1;
    use crate::types::cross;

    #[test]
    fn parallel_resistors_are_collinear() {
        // 1/R = 1/R1 + 1/R2  →  1/R1 + 1/R2 + 1/(-R) = 0
        let mut cfg = AngleBlock::new(
            func1(|r| r),
            func1(|r| r),
            func1(|r| -r),
            ScaleParams::new(1.0, 10.0),
            ScaleParams::new(1.0, 10.0),
            ScaleParams::new(0.5, 5.0),
        );
        cfg.angle_u = 60.0;
        cfg.angle_v = 30.0;
        let b = cfg.build().unwrap();
        for (r1, r2) in [(2.0, 3.0), (4.0, 4.0), (1.5, 9.0)] {
            let r = 1.0 / (1.0 / r1 + 1.0 / r2);
            let p = b.curves[0].local_xy(r1).unwrap();
            let q = b.curves[1].local_xy(r2).unwrap();
            let s = b.curves[2].local_xy(r).unwrap();
            assert!(cross(q - p, s - p).abs() < 1e-9);
        }
    }

    #[test]
    fn rejects_flat_angles() {
        let mut cfg = AngleBlock::new(
            func1(|r| r),
            func1(|r| r),
            func1(|r| -r),
            ScaleParams::new(1.0, 10.0),
            ScaleParams::new(1.0, 10.0),
            ScaleParams::new(0.5, 5.0),
        );
        cfg.angle_u = 120.0;
        cfg.angle_v = 90.0;
        assert!(cfg.build().is_err());
    }
}
