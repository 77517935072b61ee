//! Block Composer: aligns Blocks on shared tags and fits the composite
//! chart to the paper.
//!
//! Every Block keeps its own alignment entries; the composer owns one
//! global transform that it composes new page steps onto and installs as
//! the final entry of every Block's stack.

use std::collections::BTreeMap;

use glam::{DVec2, DVec3, dvec2, dvec3};

use crate::align::{self, Placed};
use crate::block::Block;
use crate::config::Transformation;
use crate::errors::{ConfigError, Error, GeometryError};
use crate::isopleth::{IsoplethEngine, IsoplethReport};
use crate::log::{debug, info, warn};
use crate::minimize::nelder_mead;
use crate::scale::TransformedCurve;
use crate::transform::ProjectiveTransform;
use crate::types::BBox;

/// Largest ratio between the homogeneous weights of any two chart points
/// the perspective search may produce.
pub const MAX_PERSPECTIVE_RATIO: f64 = 4.0;

const PENALTY: f64 = 1e10;
const POLYGON_SWEEPS: usize = 10_000;

/// World-frame sample geometry of the whole chart.
#[derive(Clone, Debug, Default)]
pub struct AxesWrapper {
    /// One polyline per value-carrying scale.
    pub scales: Vec<Vec<DVec2>>,
    /// One polyline per grid iso-line.
    pub grids: Vec<Vec<DVec2>>,
}

impl AxesWrapper {
    pub fn points(&self) -> impl Iterator<Item = DVec2> + '_ {
        self.scales.iter().chain(&self.grids).flatten().copied()
    }

    pub fn bbox(&self) -> BBox {
        let mut bb = BBox::new();
        for p in self.points() {
            bb.expand_point(p);
        }
        bb
    }
}

/// A tag that joins two Blocks without being used to align them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnalignedTag {
    pub tag: String,
    /// The Block carrying the tag that was aligned onto something else.
    pub block: usize,
    /// The earlier Block on the other end of the tag.
    pub other: usize,
}

/// The composite chart.
#[derive(Clone, Debug)]
pub struct Wrapper {
    pub blocks: Vec<Block>,
    paper: DVec2,
    global: ProjectiveTransform,
    aligned: Vec<bool>,
    unaligned: Vec<UnalignedTag>,
}

impl Wrapper {
    pub fn new(blocks: Vec<Block>, paper: DVec2) -> Self {
        let aligned = vec![false; blocks.len()];
        Self {
            blocks,
            paper,
            global: ProjectiveTransform::identity(),
            aligned,
            unaligned: Vec::new(),
        }
    }

    pub fn paper(&self) -> DVec2 {
        self.paper
    }

    /// Product of every page step applied so far.
    pub fn global(&self) -> ProjectiveTransform {
        self.global
    }

    /// Every tag and dtag must join exactly two Blocks.
    pub fn check_tags(&self) -> Result<(), ConfigError> {
        let mut owners: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (b, block) in self.blocks.iter().enumerate() {
            for curve in &block.curves {
                for tag in curve.tag.iter().chain(&curve.dtag) {
                    let list = owners.entry(tag.as_str()).or_default();
                    if !list.contains(&b) {
                        list.push(b);
                    }
                }
            }
        }
        for (tag, blocks) in owners {
            match blocks.len() {
                1 => {
                    return Err(ConfigError::LonelyTag {
                        tag: tag.to_string(),
                        block: blocks[0],
                    });
                }
                2 => {}
                count => {
                    return Err(ConfigError::CrowdedTag {
                        tag: tag.to_string(),
                        count,
                    });
                }
            }
        }
        Ok(())
    }

    /// Align each Block onto the first earlier Block it shares a tag with.
    /// A Block is aligned at most once; tags it shares with any other
    /// earlier Block are left unaligned and reported.
    pub fn align_blocks(&mut self) -> Result<(), Error> {
        self.check_tags()?;
        self.unaligned.clear();
        for j in 1..self.blocks.len() {
            if self.aligned[j] {
                continue;
            }
            for i in 0..j {
                let Some((t, used)) = self.alignment_between(i, j)? else {
                    continue;
                };
                self.blocks[j].stack.push(t);
                self.aligned[j] = true;
                for k in 0..j {
                    for tag in self.shared_tags(k, j) {
                        if k == i && used.contains(&tag) {
                            continue;
                        }
                        warn!(
                            "block {j}: tag `{tag}` shared with block {k} is left unaligned; \
                             block {j} was aligned onto block {i}"
                        );
                        self.unaligned.push(UnalignedTag { tag, block: j, other: k });
                    }
                }
                break;
            }
        }
        Ok(())
    }

    /// Tags skipped by the last [`Wrapper::align_blocks`].
    pub fn unaligned_tags(&self) -> &[UnalignedTag] {
        &self.unaligned
    }

    /// Tags and dtags of Block `j` that Block `i` carries too.
    fn shared_tags(&self, i: usize, j: usize) -> Vec<String> {
        let (a, b) = (&self.blocks[i], &self.blocks[j]);
        let mut out = Vec::new();
        for c in &b.curves {
            if let Some(tag) = c.tag.as_deref().filter(|t| a.find_tag(t).is_some()) {
                out.push(tag.to_string());
            }
            if let Some(tag) = c.dtag.as_deref().filter(|t| a.find_dtag(t).is_some()) {
                out.push(tag.to_string());
            }
        }
        out
    }

    /// Transform moving Block `j` onto Block `i` and the tags it used, if
    /// they share one.
    fn alignment_between(
        &self,
        i: usize,
        j: usize,
    ) -> Result<Option<(ProjectiveTransform, Vec<String>)>, GeometryError> {
        let (a, b) = (&self.blocks[i], &self.blocks[j]);
        let (ta, tb) = (a.stack.alignment(), b.stack.alignment());
        let tagged = b.curves.iter().enumerate().find_map(|(k, c)| {
            let tag = c.tag.as_deref()?;
            Some((a.find_tag(tag)?, k, tag))
        });
        let dtagged = b.curves.iter().enumerate().find_map(|(k, c)| {
            let tag = c.dtag.as_deref()?;
            Some((a.find_dtag(tag)?, k, tag))
        });
        let placed = |ai: usize, bi: usize| {
            (Placed::new(&a.curves[ai], ta), Placed::new(&b.curves[bi], tb))
        };

        let aligned = match (tagged, dtagged) {
            (Some((ai, bi, tag)), Some((adi, bdi, dtag))) if (ai, bi) != (adi, bdi) => {
                debug!("align block {j} onto block {i}: tags `{tag}` and `{dtag}`, four points");
                let (f0, m0) = placed(ai, bi);
                let (f1, m1) = placed(adi, bdi);
                let t = align::double_tag([f0, f1], [m0, m1], [tag, dtag])?;
                (t, vec![tag.to_string(), dtag.to_string()])
            }
            (Some((ai, bi, tag)), _) | (None, Some((ai, bi, tag))) => {
                debug!("align block {j} onto block {i}: tag `{tag}`, two points");
                let (fixed, moving) = placed(ai, bi);
                (align::two_point(fixed, moving, tag)?, vec![tag.to_string()])
            }
            (None, None) => return Ok(None),
        };
        Ok(Some(aligned))
    }

    /// World polylines of every scale and grid line.
    pub fn build_axes_wrapper(&self) -> Result<AxesWrapper, GeometryError> {
        let mut out = AxesWrapper::default();
        for block in &self.blocks {
            let t = block.transform();
            for (_, curve) in block.scales() {
                out.scales.push(curve.view(t).sample(None)?.points());
            }
            for grid in &block.grids {
                for line in grid.iso_lines() {
                    out.grids.push(line.view(t).sample(None)?.points());
                }
            }
        }
        Ok(out)
    }

    /// Apply one page step.
    pub fn do_transformation(&mut self, step: Transformation) -> Result<(), Error> {
        match step {
            Transformation::ScalePaper => {
                let t = paper_box(&self.build_axes_wrapper()?.bbox(), self.paper)?;
                self.apply_global(t);
            }
            Transformation::Rotate(degrees) => {
                self.apply_global(ProjectiveTransform::rotation_degrees(degrees))
            }
            Transformation::Polygon => {
                let t = polygon_fit(&self.build_axes_wrapper()?, self.paper)?;
                self.apply_global(t);
            }
            Transformation::Optimize => {
                let t = perspective_search(&self.build_axes_wrapper()?)?;
                self.apply_global(t);
                let t = paper_box(&self.build_axes_wrapper()?.bbox(), self.paper)?;
                self.apply_global(t);
            }
        }
        info!("page transformation {step:?}: global {:?}", self.global.rows());
        Ok(())
    }

    fn apply_global(&mut self, step: ProjectiveTransform) {
        self.global = step.compose(&self.global);
        for block in &mut self.blocks {
            block.stack.set_global(self.global);
        }
    }

    /// Value-carrying scales as placed on the page.
    pub fn transformed_curves(&self) -> Vec<TransformedCurve<'_>> {
        self.blocks
            .iter()
            .flat_map(|b| {
                let t = b.transform();
                b.scales().map(move |(_, c)| c.view(t))
            })
            .collect()
    }

    /// Bounding box of everything drawn, page frame.
    pub fn world_bbox(&self) -> Result<BBox, GeometryError> {
        let mut bb = BBox::new();
        for block in &self.blocks {
            bb.union(&block.bbox(&block.transform())?);
        }
        Ok(bb)
    }

    pub fn solve_isopleths(&self) -> Result<IsoplethReport, GeometryError> {
        IsoplethEngine::new(&self.blocks)?.solve()
    }
}

/// Axis-aligned fit of `bb` onto `[0, W] × [0, H]`.
fn paper_box(bb: &BBox, paper: DVec2) -> Result<ProjectiveTransform, GeometryError> {
    if bb.is_empty() {
        return Err(GeometryError::Empty);
    }
    let (w, h) = (bb.width(), bb.height());
    if !(w > 0.0 && h > 0.0) {
        return Err(GeometryError::DivisionByZero {
            context: format!("paper fit of a {w} × {h} chart"),
        });
    }
    let scale = ProjectiveTransform::scaling(paper.x / w, paper.y / h);
    Ok(scale.compose(&ProjectiveTransform::translation(-bb.min)))
}

/// Counter-clockwise convex hull (monotone chain).
pub(crate) fn convex_hull(points: &[DVec2]) -> Vec<DVec2> {
    let mut pts: Vec<DVec2> = points.iter().copied().filter(|p| p.is_finite()).collect();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }
    let turn = |o: DVec2, a: DVec2, b: DVec2| crate::types::cross(a - o, b - o);
    let mut hull: Vec<DVec2> = Vec::with_capacity(2 * pts.len());
    for &p in &pts {
        while hull.len() >= 2 && turn(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower = hull.len() + 1;
    for &p in pts.iter().rev().skip(1) {
        while hull.len() >= lower && turn(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}

/// Support line `n·p = c` with outward normal at `degrees`, as the
/// homogeneous line `(n.x, n.y, -c)`.
fn support_line(hull: &[DVec2], degrees: f64) -> DVec3 {
    let n = DVec2::from_angle(degrees.to_radians());
    let c = hull.iter().map(|p| n.dot(*p)).fold(f64::NEG_INFINITY, f64::max);
    dvec3(n.x, n.y, -c)
}

/// Corners of the quad cut by bottom, right, top and left lines:
/// bottom∩left, bottom∩right, right∩top, top∩left.
fn quad_corners(lines: &[DVec3; 4]) -> [DVec3; 4] {
    let [bottom, right, top, left] = *lines;
    [bottom.cross(left), bottom.cross(right), right.cross(top), top.cross(left)]
}

fn quad_area(corners: &[DVec3; 4]) -> f64 {
    let mut pts = [DVec2::ZERO; 4];
    for (p, c) in pts.iter_mut().zip(corners) {
        if c.z.abs() <= 1e-12 * c.truncate().length() {
            return f64::INFINITY;
        }
        *p = c.truncate() / c.z;
    }
    let twice: f64 = (0..4).map(|i| crate::types::cross(pts[i], pts[(i + 1) % 4])).sum();
    0.5 * twice.abs()
}

/// Smallest quad of support lines whose normals stay within 45° of
/// straight down, right, up and left; its corners go to the paper corners.
fn polygon_fit(axes: &AxesWrapper, paper: DVec2) -> Result<ProjectiveTransform, GeometryError> {
    let points: Vec<DVec2> = axes.points().collect();
    let hull = convex_hull(&points);
    if hull.len() < 3 {
        return Err(GeometryError::Empty);
    }
    let base = [270.0, 0.0, 90.0, 180.0];
    let area_of = |angles: &[f64; 4]| {
        let lines = angles.map(|a| support_line(&hull, a));
        quad_area(&quad_corners(&lines))
    };
    let mut angles = base;
    let mut area = area_of(&angles);
    let mut step = 8.0;
    let mut sweeps = 0;
    while step > 1e-4 && sweeps < POLYGON_SWEEPS {
        sweeps += 1;
        let mut improved = false;
        for k in 0..4 {
            for dir in [-1.0, 1.0] {
                let mut trial = angles;
                trial[k] += dir * step;
                if (trial[k] - base[k]).abs() > 45.0 {
                    continue;
                }
                let a = area_of(&trial);
                if a < area * (1.0 - 1e-12) {
                    angles = trial;
                    area = a;
                    improved = true;
                }
            }
        }
        if !improved {
            step *= 0.5;
        }
    }
    debug!("polygon fit: angles {angles:?}, area {area} after {sweeps} sweeps");
    let corners = quad_corners(&angles.map(|a| support_line(&hull, a)));
    let page = [
        dvec3(0.0, 0.0, 1.0),
        dvec3(paper.x, 0.0, 1.0),
        dvec3(paper.x, paper.y, 1.0),
        dvec3(0.0, paper.y, 1.0),
    ];
    ProjectiveTransform::solve_four_point_homogeneous(corners, page)
}

/// Perspective `[[1,0,0],[0,1,0],[p,q,1]]` about the chart centre that
/// minimizes bounding-box area over the summed squared scale lengths.
fn perspective_search(axes: &AxesWrapper) -> Result<ProjectiveTransform, GeometryError> {
    let bb = axes.bbox();
    if bb.is_empty() {
        return Err(GeometryError::Empty);
    }
    let center = bb.center();
    let diag = bb.diagonal().max(f64::MIN_POSITIVE);
    let shift = |line: &Vec<DVec2>| line.iter().map(|p| *p - center).collect::<Vec<_>>();
    let scales: Vec<Vec<DVec2>> = axes.scales.iter().map(shift).collect();
    let grids: Vec<Vec<DVec2>> = axes.grids.iter().map(shift).collect();

    let objective = |x: &[f64]| {
        let (p, q) = (x[0], x[1]);
        let weight = |v: DVec2| 1.0 + p * v.x + q * v.y;
        let (mut lo, mut hi) = (f64::INFINITY, 0.0f64);
        for v in scales.iter().chain(&grids).flatten() {
            let w = weight(*v);
            lo = lo.min(w);
            hi = hi.max(w);
        }
        if !(lo > 0.0) || hi / lo > MAX_PERSPECTIVE_RATIO {
            return PENALTY;
        }
        let map = |v: DVec2| v / weight(v);
        let mut bb = BBox::new();
        for v in scales.iter().chain(&grids).flatten() {
            bb.expand_point(map(*v));
        }
        let lengths: f64 = scales
            .iter()
            .map(|line| {
                let l: f64 = line.windows(2).map(|s| (map(s[1]) - map(s[0])).length()).sum();
                l * l
            })
            .sum();
        let cost = bb.width() * bb.height() / lengths;
        if cost.is_finite() { cost } else { PENALTY }
    };
    let result = nelder_mead(objective, &[0.0, 0.0], 0.1 / diag, 400, 1e-10);
    debug!("perspective search: p = {}, q = {}, cost {}", result.x[0], result.x[1], result.cost);
    let (p, q) = (result.x[0], result.x[1]);
    let perspective =
        ProjectiveTransform::from_rows([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [p, q, 1.0]]);
    Ok(perspective.compose(&ProjectiveTransform::translation(-center)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{ProductBlock, SumBlock};
    use crate::config::ScaleParams;
    use crate::scale::func1;

    fn adder(u: ScaleParams, w: ScaleParams) -> Block {
        SumBlock::new(func1(|u| u), func1(|v| v), func1(|w| -w), u, ScaleParams::new(0.0, 10.0), w)
            .build()
            .unwrap()
    }

    fn plain() -> Block {
        adder(ScaleParams::new(0.0, 10.0), ScaleParams::new(0.0, 20.0))
    }

    fn paper() -> DVec2 {
        dvec2(10.0, 10.0)
    }

    #[test]
    fn aligned_blocks_share_tag_points() {
        let first = adder(ScaleParams::new(0.0, 10.0), ScaleParams::new(0.0, 20.0).tag("t"));
        let second = adder(ScaleParams::new(0.0, 20.0).tag("t"), ScaleParams::new(0.0, 30.0));
        let mut w = Wrapper::new(vec![first, second], paper());
        w.align_blocks().unwrap();
        let (a, b) = (&w.blocks[0], &w.blocks[1]);
        for u in [0.0, 4.5, 13.0, 20.0] {
            let p = a.curves[2].world_xy(u, &a.transform()).unwrap();
            let q = b.curves[0].world_xy(u, &b.transform()).unwrap();
            assert!((p - q).length() < 1e-9);
        }
    }

    #[test]
    fn second_tag_pair_is_reported_unaligned() {
        let a = adder(ScaleParams::new(0.0, 10.0), ScaleParams::new(0.0, 20.0).tag("s"));
        let b = adder(ScaleParams::new(0.0, 10.0), ScaleParams::new(0.0, 20.0).tag("t"));
        let c = adder(ScaleParams::new(0.0, 20.0).tag("s"), ScaleParams::new(0.0, 30.0).tag("t"));
        let mut w = Wrapper::new(vec![a, b, c], paper());
        w.align_blocks().unwrap();
        assert_eq!(
            w.unaligned_tags(),
            [UnalignedTag {
                tag: "t".to_string(),
                block: 2,
                other: 1
            }]
        );

        let (a, c) = (&w.blocks[0], &w.blocks[2]);
        for u in [0.0, 7.0, 20.0] {
            let p = a.curves[2].world_xy(u, &a.transform()).unwrap();
            let q = c.curves[0].world_xy(u, &c.transform()).unwrap();
            assert!((p - q).length() < 1e-9);
        }
    }

    #[test]
    fn single_tag_chain_leaves_nothing_unaligned() {
        let first = adder(ScaleParams::new(0.0, 10.0), ScaleParams::new(0.0, 20.0).tag("t"));
        let second = adder(ScaleParams::new(0.0, 20.0).tag("t"), ScaleParams::new(0.0, 30.0));
        let mut w = Wrapper::new(vec![first, second], paper());
        w.align_blocks().unwrap();
        assert!(w.unaligned_tags().is_empty());
    }

    #[test]
    fn tags_must_join_exactly_two_blocks() {
        let tagged = || adder(ScaleParams::new(0.0, 1.0).tag("a"), ScaleParams::new(0.0, 2.0));
        let lonely = Wrapper::new(vec![tagged()], paper());
        assert_eq!(
            lonely.check_tags(),
            Err(ConfigError::LonelyTag {
                tag: "a".to_string(),
                block: 0
            })
        );
        let crowded = Wrapper::new(vec![tagged(), tagged(), tagged()], paper());
        assert_eq!(
            crowded.check_tags(),
            Err(ConfigError::CrowdedTag {
                tag: "a".to_string(),
                count: 3
            })
        );
    }

    #[test]
    fn scale_paper_fills_the_page() {
        let mut w = Wrapper::new(vec![plain()], dvec2(12.0, 8.0));
        w.do_transformation(Transformation::ScalePaper).unwrap();
        let bb = w.world_bbox().unwrap();
        assert!(bb.min.length() < 1e-9, "{bb:?}");
        assert!((bb.max - dvec2(12.0, 8.0)).length() < 1e-9, "{bb:?}");
    }

    #[test]
    fn steps_compose_into_one_transform() {
        let mut w = Wrapper::new(vec![plain()], paper());
        w.do_transformation(Transformation::Rotate(30.0)).unwrap();
        w.do_transformation(Transformation::ScalePaper).unwrap();
        let b = &w.blocks[0];
        let local = b.curves[1].local_xy(4.0).unwrap();
        let direct = w.global().apply(b.stack.alignment().apply(local).unwrap()).unwrap();
        assert!((b.curves[1].world_xy(4.0, &b.transform()).unwrap() - direct).length() < 1e-12);
    }

    #[test]
    fn polygon_fit_keeps_a_rotated_chart_on_the_page() {
        let mut w = Wrapper::new(vec![plain()], paper());
        w.do_transformation(Transformation::Rotate(30.0)).unwrap();
        w.do_transformation(Transformation::Polygon).unwrap();
        let bb = w.build_axes_wrapper().unwrap().bbox();
        assert!(bb.min.x > -1e-6 && bb.min.y > -1e-6, "{bb:?}");
        assert!(bb.max.x < 10.0 + 1e-6 && bb.max.y < 10.0 + 1e-6, "{bb:?}");
        assert!(bb.min.length() < 1e-6 && (bb.max - paper()).length() < 1e-6, "{bb:?}");
    }

    #[test]
    fn optimize_ends_on_the_page() {
        let n = ProductBlock::new(
            func1(|u| u),
            func1(|v| v),
            func1(|w| w),
            ScaleParams::new(1.0, 10.0),
            ScaleParams::new(1.0, 10.0),
            ScaleParams::new(0.1, 10.0),
        )
        .build()
        .unwrap();
        let mut w = Wrapper::new(vec![n], paper());
        w.do_transformation(Transformation::Optimize).unwrap();
        let bb = w.build_axes_wrapper().unwrap().bbox();
        assert!(bb.min.length() < 1e-9 && (bb.max - paper()).length() < 1e-9, "{bb:?}");
    }

    #[test]
    fn hull_of_square_with_inner_points() {
        let pts = [
            dvec2(0.0, 0.0),
            dvec2(1.0, 0.0),
            dvec2(0.5, 0.5),
            dvec2(1.0, 1.0),
            dvec2(0.0, 1.0),
            dvec2(0.5, 0.0),
        ];
        let hull = convex_hull(&pts);
        assert_eq!(hull, vec![dvec2(0.0, 0.0), dvec2(1.0, 0.0), dvec2(1.0, 1.0), dvec2(0.0, 1.0)]);
    }
}
