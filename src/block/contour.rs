//! Contour chart for `F1(u) = F2(x, v)` with `x = F3(w)`.

use glam::dvec2;

use crate::config::ScaleParams;
use crate::errors::{ConfigError, Error};
use crate::isopleth::Entry;
use crate::scale::{Func1, Func2, LinearScale, func2};
use crate::types::{Color, Range};

use super::{Block, BlockKind, GridSurface, Member, Relation, func_span, positive_layout};

/// `u` stands on the left edge (`y = μy·F1`), `w` lies along the bottom
/// edge (`x = μx·F3`) and every iso-`v` curve is drawn as
/// `(μx·t, μy·F2(t, v))` for `t` over the `F3` interval. A reading goes
/// horizontally from `u` to the `v` curve, then vertically down to `w`.
#[derive(Clone)]
pub struct ContourBlock {
    pub f1: Func1,
    pub f2: Func2,
    pub f3: Func1,
    pub u: ScaleParams,
    pub v: ScaleParams,
    pub w: ScaleParams,
    /// Values of the drawn iso-`v` curves; empty picks 7 evenly spaced ones.
    pub v_lines: Vec<f64>,
    pub width: f64,
    pub height: f64,
    pub isopleths: Vec<Vec<Entry>>,
}

impl ContourBlock {
    pub fn new(
        f1: Func1,
        f2: Func2,
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
            v_lines: Vec::new(),
            width: 10.0,
            height: 10.0,
            isopleths: Vec::new(),
        }
    }

    pub fn build(&self) -> Result<Block, Error> {
        let width = positive_layout("width", self.width)?;
        let height = positive_layout("height", self.height)?;
        let (ur, vr, wr) = (self.u.range()?, self.v.range()?, self.w.range()?);
        let (lo1, hi1) = func_span(&self.f1, &ur, "u function span")?;
        let (lo3, hi3) = func_span(&self.f3, &wr, "w function span")?;
        let mu_x = width / (hi3 - lo3);
        let mu_y = height / (hi1 - lo1);

        let u_curve = self.u.curve(LinearScale {
            origin: dvec2(mu_x * lo3, 0.0),
            direction: dvec2(0.0, mu_y),
            func: self.f1.clone(),
        })?;
        let w_curve = self.w.curve(LinearScale {
            origin: dvec2(0.0, mu_y * lo1),
            direction: dvec2(mu_x, 0.0),
            func: self.f3.clone(),
        })?;

        let f2 = self.f2.clone();
        let v_lines = if self.v_lines.is_empty() {
            (0..7).map(|i| vr.lerp(i as f64 / 6.0)).collect()
        } else {
            self.v_lines.clone()
        };
        let grid = GridSurface {
            f: func2(move |t, _| mu_x * t),
            g: func2(move |t, v| mu_y * f2(t, v)),
            h: func2(|_, _| 1.0),
            u_range: Range::named("contour x", lo3, hi3)?,
            v_range: vr,
            u_lines: Vec::new(),
            v_lines,
            title: self.v.title.clone(),
            color: Color::black(),
        };
        if grid.v_range.span() == 0.0 {
            return Err(ConfigError::Layout {
                name: "v range",
                value: 0.0,
            }
            .into());
        }

        let mut block = Block::new(
            BlockKind::Contour,
            vec![u_curve, w_curve],
            Relation::Contour {
                f1: self.f1.clone(),
                f2: self.f2.clone(),
                f3: self.f3.clone(),
            },
        );
        block.grids.push(grid);
        block.members = vec![Member::Curve(0), Member::Grid(0), Member::Curve(1)];
        block.inputs = 3;
        Ok(block.with_isopleths(self.isopleths.clone())?)
    }
}

/// Residual of the contour relation; zero on every valid reading.
pub(crate) fn contour_residual(f1: &Func1, f2: &Func2, f3: &Func1, u: f64, v: f64, w: f64) -> f64 {
    f2(f3(w), v) - f1(u)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::func1;

    fn block() -> Block {
        ContourBlock::new(
            func1(|u| u),
            func2(|x, v| x * v),
            func1(|w| w),
            ScaleParams::new(0.0, 20.0),
            ScaleParams::new(1.0, 2.0),
            ScaleParams::new(0.0, 10.0),
        )
        .build()
        .unwrap()
    }

    #[test]
    fn members_interleave_grid() {
        let b = block();
        assert_eq!(b.members, vec![Member::Curve(0), Member::Grid(0), Member::Curve(1)]);
        assert_eq!(b.grids[0].v_lines.len(), 7);
    }

    #[test]
    fn reading_turns_on_the_v_curve() {
        let b = block();
        let grid = &b.grids[0];
        let t = crate::transform::ProjectiveTransform::identity();
        // u = 12, v = 1.5 → x = 8 → w = 8.
        let pu = b.curves[0].world_xy(12.0, &t).unwrap();
        let pg = grid.world_xy(8.0, 1.5, &t).unwrap();
        let pw = b.curves[1].world_xy(8.0, &t).unwrap();
        assert!((pu.y - pg.y).abs() < 1e-12);
        assert!((pw.x - pg.x).abs() < 1e-12);
    }
}
