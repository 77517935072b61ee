//! General determinant form: `det[(f, g, h)_i] = 0` over three rows.
//!
//! Rows are either ordinary scales `(f(u), g(u), h(u))` or 2-variable grids
//! `(f(u,v), g(u,v), h(u,v))`. The page point of a row is `(f/h, g/h)`.

use glam::dvec3;

use crate::config::ScaleParams;
use crate::errors::{ConfigError, Error};
use crate::isopleth::Entry;
use crate::log::debug;
use crate::scale::{DeterminantScale, Func1, Func2};
use crate::transform::ProjectiveTransform;
use crate::types::{Color, Range};

use super::{Block, BlockKind, GridSurface, Member, Relation};

/// One row of the determinant.
#[derive(Clone)]
pub enum DetRow {
    Scale {
        f: Func1,
        g: Func1,
        h: Func1,
        params: ScaleParams,
    },
    Grid {
        f: Func2,
        g: Func2,
        h: Func2,
        u: ScaleParams,
        v: ScaleParams,
        /// Iso-u line values; empty picks 7 evenly spaced ones.
        u_lines: Vec<f64>,
        /// Iso-v line values; empty picks 7 evenly spaced ones.
        v_lines: Vec<f64>,
    },
}

#[derive(Clone)]
pub struct DeterminantBlock {
    pub rows: [DetRow; 3],
    /// Map the endpoints of the first two scale rows onto the unit square
    /// before anything else. Needed whenever `h` vanishes inside a domain.
    pub transform_ini: bool,
    pub isopleths: Vec<Vec<Entry>>,
}

impl DeterminantBlock {
    pub fn new(rows: [DetRow; 3]) -> Self {
        Self {
            rows,
            transform_ini: false,
            isopleths: Vec::new(),
        }
    }

    pub fn build(&self) -> Result<Block, Error> {
        let mut curves = Vec::new();
        let mut grids = Vec::new();
        let mut members = Vec::new();
        for row in &self.rows {
            match row {
                DetRow::Scale { f, g, h, params } => {
                    members.push(Member::Curve(curves.len()));
                    curves.push(params.curve(DeterminantScale {
                        f: f.clone(),
                        g: g.clone(),
                        h: h.clone(),
                    })?);
                }
                DetRow::Grid {
                    f,
                    g,
                    h,
                    u,
                    v,
                    u_lines,
                    v_lines,
                } => {
                    let (ur, vr) = (u.range()?, v.range()?);
                    members.push(Member::Grid(grids.len()));
                    grids.push(GridSurface {
                        f: f.clone(),
                        g: g.clone(),
                        h: h.clone(),
                        u_range: ur,
                        v_range: vr,
                        u_lines: default_lines(u_lines, &ur),
                        v_lines: default_lines(v_lines, &vr),
                        title: u.title.clone(),
                        color: Color::black(),
                    });
                }
            }
        }

        let relation = Relation::Collinear(vec![[0, 1, 2]]);
        let mut block = Block::new(BlockKind::Determinant, curves, relation);
        block.grids = grids;
        block.members = members;
        block.inputs = 3;

        if self.transform_ini {
            let t = self.initial_transform(&block)?;
            debug!("determinant block: initial transform {:?}", t.rows());
            block.stack.push(t);
        }
        Ok(block.with_isopleths(self.isopleths.clone())?)
    }

    /// Homogeneous endpoints of the first two scale rows onto
    /// `(0,0) (0,1) (1,0) (1,1)`. Endpoints at infinity are allowed.
    fn initial_transform(&self, block: &Block) -> Result<ProjectiveTransform, Error> {
        let scales: Vec<_> = block.curves.iter().take(2).collect();
        if scales.len() < 2 {
            return Err(ConfigError::ScaleCount {
                kind: "determinant initial transform",
                expected: 2,
                got: scales.len(),
            }
            .into());
        }
        let src = [
            scales[0].homogeneous(scales[0].range.min),
            scales[0].homogeneous(scales[0].range.max),
            scales[1].homogeneous(scales[1].range.min),
            scales[1].homogeneous(scales[1].range.max),
        ];
        let dst = [
            dvec3(0.0, 0.0, 1.0),
            dvec3(0.0, 1.0, 1.0),
            dvec3(1.0, 0.0, 1.0),
            dvec3(1.0, 1.0, 1.0),
        ];
        Ok(ProjectiveTransform::solve_four_point_homogeneous(src, dst)?)
    }
}

fn default_lines(lines: &[f64], range: &Range) -> Vec<f64> {
    if lines.is_empty() {
        (0..7).map(|i| range.lerp(i as f64 / 6.0)).collect()
    } else {
        lines.to_vec()
    }
}
