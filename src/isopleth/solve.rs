//! Per-relation solvers for one row of one Block.

use glam::DVec2;

use crate::block::{Block, Member, Relation};
use crate::errors::GeometryError;
use crate::sampling::{Polyline, line_intersection, refine_root, scan_roots, side};
use crate::scale::{Func1, Func2, TransformedCurve};
use crate::transform::ProjectiveTransform;
use crate::types::Range;

use super::RowState;

/// Slack below a section's start so a hit exactly on a sample point is
/// never lost to roundoff between two neighbouring sections.
const SECTION_SLACK: f64 = 1e-9;

/// Scan resolution for the algebraic (contour, ladder) solvers.
const ROOT_SCAN_STEPS: usize = 400;

/// A Block frozen in its final frame, with world polylines per curve.
pub(crate) struct BlockGeometry<'a> {
    pub block: &'a Block,
    pub transform: ProjectiveTransform,
    pub lines: Vec<Polyline>,
}

impl<'a> BlockGeometry<'a> {
    pub fn new(block: &'a Block) -> Result<Self, GeometryError> {
        let transform = block.transform();
        let lines = block
            .curves
            .iter()
            .map(|c| c.view(transform).sample(None))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            block,
            transform,
            lines,
        })
    }

    fn view(&self, curve: usize) -> TransformedCurve<'a> {
        self.block.curves[curve].view(self.transform)
    }
}

/// Resolve whatever this row allows. Returns whether anything changed.
pub(crate) fn solve_row(
    geo: &BlockGeometry<'_>,
    state: &mut RowState,
) -> Result<bool, GeometryError> {
    let mut changed = fill_points(geo, state)?;
    changed |= match &geo.block.relation {
        Relation::Collinear(triples) => solve_collinear(geo, triples, state)?,
        Relation::Contour { f1, f2, f3 } => solve_contour(geo, f1, f2, f3, state)?,
        Relation::Ladder { f1, f2 } => solve_ladder(geo, f1, f2, state)?,
        Relation::Single => false,
    };
    changed |= fill_points(geo, state)?;
    Ok(changed)
}

/// Points for members whose value or grid pair is known.
fn fill_points(geo: &BlockGeometry<'_>, state: &mut RowState) -> Result<bool, GeometryError> {
    let mut changed = false;
    for (i, member) in geo.block.members.iter().enumerate() {
        if state.points[i].is_some() {
            continue;
        }
        match *member {
            Member::Curve(c) => {
                if let Some(v) = state.values[i] {
                    state.points[i] = Some(geo.view(c).world_xy(v)?);
                    changed = true;
                }
            }
            Member::Grid(g) => {
                if let Some((u, v)) = state.pairs[i] {
                    state.points[i] = Some(geo.block.grids[g].world_xy(u, v, &geo.transform)?);
                    changed = true;
                }
            }
        }
    }
    Ok(changed)
}

/// Propagate through member triples until no triple has exactly one
/// unknown point left.
fn solve_collinear(
    geo: &BlockGeometry<'_>,
    triples: &[[usize; 3]],
    state: &mut RowState,
) -> Result<bool, GeometryError> {
    let mut changed = false;
    loop {
        let mut progress = false;
        for triple in triples {
            let known: Vec<usize> =
                triple.iter().copied().filter(|&m| state.points[m].is_some()).collect();
            if known.len() != 2 {
                continue;
            }
            let Some(&missing) = triple.iter().find(|&&m| state.points[m].is_none()) else {
                continue;
            };
            let Member::Curve(c) = geo.block.members[missing] else {
                continue;
            };
            let (Some(a), Some(b)) = (state.points[known[0]], state.points[known[1]]) else {
                continue;
            };
            if let Some((u, hit)) = intersect_chord(geo.view(c), &geo.lines[c], a, b)? {
                state.points[missing] = Some(hit);
                state.values[missing] = Some(u);
                progress = true;
            }
        }
        if !progress {
            break;
        }
        changed = true;
    }
    Ok(changed)
}

/// Where the chord through `a` and `b` crosses a sampled curve.
///
/// Sections are half-open `[start, end)`, the last one closed. When the
/// chord crosses several sections the hit nearest the midpoint of `a` and
/// `b` wins. The section hit is refined on the real curve by bracketing
/// the sign of the chord's side function.
pub(crate) fn intersect_chord(
    curve: TransformedCurve<'_>,
    line: &Polyline,
    a: DVec2,
    b: DVec2,
) -> Result<Option<(f64, DVec2)>, GeometryError> {
    if (b - a).length_squared() == 0.0 {
        return Ok(None);
    }
    let mid = 0.5 * (a + b);
    let count = line.len().saturating_sub(1);
    let mut best: Option<(f64, usize, f64)> = None;
    for (i, (s0, s1)) in line.sections().enumerate() {
        let Some((hit, t, _)) = line_intersection(s0.p, s1.p, a, b) else {
            continue;
        };
        let last = i + 1 == count;
        let inside = t >= -SECTION_SLACK && (t < 1.0 || (last && t <= 1.0 + SECTION_SLACK));
        if !inside {
            continue;
        }
        let d = (hit - mid).length();
        if best.is_none_or(|(bd, _, _)| d < bd) {
            best = Some((d, i, t.clamp(0.0, 1.0)));
        }
    }
    let Some((_, i, t)) = best else {
        return Ok(None);
    };

    let (s0, s1) = (line.samples[i], line.samples[i + 1]);
    let f0 = side(a, b, s0.p);
    let f1 = side(a, b, s1.p);
    let u = if f0 == 0.0 || f1 == 0.0 || (f0 < 0.0) != (f1 < 0.0) {
        refine_root(|u| Ok(side(a, b, curve.world_xy(u)?)), s0.u, s1.u, f0, f1)?
    } else {
        // Roundoff put both ends on one side; the section hit is as good
        // as it gets.
        s0.u + t * (s1.u - s0.u)
    };
    Ok(Some((u, curve.world_xy(u)?)))
}

fn checked(value: f64, context: &str, at: f64) -> Result<f64, GeometryError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(GeometryError::NonFinite {
            context: context.to_string(),
            value: at,
        })
    }
}

/// First root of `f` over `range`, if any.
fn first_root(
    f: impl FnMut(f64) -> Result<f64, GeometryError>,
    range: Range,
) -> Result<Option<f64>, GeometryError> {
    Ok(scan_roots(f, range, ROOT_SCAN_STEPS)?.into_iter().next())
}

fn solve_contour(
    geo: &BlockGeometry<'_>,
    f1: &Func1,
    f2: &Func2,
    f3: &Func1,
    state: &mut RowState,
) -> Result<bool, GeometryError> {
    let block = geo.block;
    let grid = &block.grids[0];
    let residual = |u: f64, v: f64, w: f64| checked(f2(f3(w), v) - f1(u), "contour relation", u);
    let mut changed = false;
    let [u, v, w] = [state.values[0], state.values[1], state.values[2]];
    let (u_range, v_range, w_range) = (block.curves[0].range, grid.v_range, block.curves[1].range);
    let solved = match (u, v, w) {
        (None, Some(v), Some(w)) => first_root(|x| residual(x, v, w), u_range)?.map(|x| (0, x)),
        (Some(u), None, Some(w)) => first_root(|x| residual(u, x, w), v_range)?.map(|x| (1, x)),
        (Some(u), Some(v), None) => first_root(|x| residual(u, v, x), w_range)?.map(|x| (2, x)),
        _ => None,
    };
    if let Some((i, x)) = solved {
        state.values[i] = Some(x);
        changed = true;
    }
    if let (Some(v), Some(w), None) = (state.values[1], state.values[2], state.points[1]) {
        let x = checked(f3(w), "contour w function", w)?;
        state.points[1] = Some(grid.world_xy(x, v, &geo.transform)?);
        changed = true;
    }
    Ok(changed)
}

fn solve_ladder(
    geo: &BlockGeometry<'_>,
    f1: &Func1,
    f2: &Func1,
    state: &mut RowState,
) -> Result<bool, GeometryError> {
    let residual = |u: f64, v: f64| checked(f1(u) - f2(v), "ladder relation", u);
    let curves = &geo.block.curves;
    let solved = match (state.values[0], state.values[1]) {
        (None, Some(v)) => first_root(|x| residual(x, v), curves[0].range)?.map(|x| (0, x)),
        (Some(u), None) => first_root(|x| residual(u, x), curves[1].range)?.map(|x| (1, x)),
        _ => None,
    };
    Ok(match solved {
        Some((i, x)) => {
            state.values[i] = Some(x);
            true
        }
        None => false,
    })
}

/// Drawable index lines of a row, world frame.
pub(crate) fn index_lines(block: &Block, state: &RowState) -> Vec<Vec<DVec2>> {
    match &block.relation {
        Relation::Collinear(triples) => triples
            .iter()
            .filter_map(|t| {
                let pts = [state.points[t[0]]?, state.points[t[1]]?, state.points[t[2]]?];
                Some(farthest_pair(&pts))
            })
            .collect(),
        Relation::Contour { .. } => match (state.points[0], state.points[1], state.points[2]) {
            (Some(a), Some(b), Some(c)) => vec![vec![a, b, c]],
            _ => Vec::new(),
        },
        Relation::Ladder { .. } => match (state.points[0], state.points[1]) {
            (Some(a), Some(b)) => vec![vec![a, b]],
            _ => Vec::new(),
        },
        Relation::Single => Vec::new(),
    }
}

fn farthest_pair(pts: &[DVec2; 3]) -> Vec<DVec2> {
    let pairs = [(0, 1), (0, 2), (1, 2)];
    let (i, j) = pairs
        .into_iter()
        .max_by(|&(a, b), &(c, d)| {
            let l = (pts[a] - pts[b]).length_squared();
            let r = (pts[c] - pts[d]).length_squared();
            l.total_cmp(&r)
        })
        .unwrap_or((0, 2));
    vec![pts[i], pts[j]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::sample_adaptive;
    use crate::scale::{LinearScale, ScaleCurve, func1};
    use glam::dvec2;

    fn parabola() -> ScaleCurve {
        ScaleCurve::new(
            crate::scale::DeterminantScale {
                f: func1(|u| u),
                g: func1(|u| u * u),
                h: func1(|_| 1.0),
            },
            Range::new(-2.0, 2.0).unwrap(),
        )
    }

    #[test]
    fn chord_hits_curve_inside_a_section() {
        let c = parabola();
        let view = c.view(ProjectiveTransform::identity());
        let line = view.sample(None).unwrap();
        // y = 1 crosses the parabola at u = ±1; the midpoint picks +1.
        let hit = intersect_chord(view, &line, dvec2(0.5, 1.0), dvec2(1.5, 1.0)).unwrap();
        let (u, p) = hit.unwrap();
        assert!((u - 1.0).abs() < 1e-12);
        assert!((p - dvec2(1.0, 1.0)).length() < 1e-12);
    }

    #[test]
    fn chord_missing_the_curve_is_none() {
        let c = parabola();
        let view = c.view(ProjectiveTransform::identity());
        let line = view.sample(None).unwrap();
        let hit = intersect_chord(view, &line, dvec2(0.0, -1.0), dvec2(1.0, -1.0)).unwrap();
        assert!(hit.is_none());
    }

    #[test]
    fn hit_on_a_sample_point_is_kept() {
        let c = ScaleCurve::new(
            LinearScale {
                origin: dvec2(0.0, 0.0),
                direction: dvec2(0.0, 1.0),
                func: func1(|u| u),
            },
            Range::new(0.0, 1.0).unwrap(),
        );
        let view = c.view(ProjectiveTransform::identity());
        let line = sample_adaptive(|u| view.world_xy(u), c.range, Some(0.25)).unwrap();
        let at = line.samples[2].p;
        let hit = intersect_chord(view, &line, dvec2(-1.0, at.y), dvec2(1.0, at.y)).unwrap();
        let (_, p) = hit.unwrap();
        assert!((p - at).length() < 1e-12);
        // Last endpoint is closed.
        let hit = intersect_chord(view, &line, dvec2(-1.0, 1.0), dvec2(1.0, 1.0)).unwrap();
        let (u, _) = hit.unwrap();
        assert!((u - 1.0).abs() < 1e-12);
    }

    #[test]
    fn farthest_pair_spans_the_triple() {
        let seg = farthest_pair(&[dvec2(1.0, 0.0), dvec2(0.0, 0.0), dvec2(3.0, 0.0)]);
        assert_eq!(seg, vec![dvec2(0.0, 0.0), dvec2(3.0, 0.0)]);
    }
}
