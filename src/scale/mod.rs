//! Scale curves: one variable of the governing equation laid out along a
//! curve.
//!
//! A [`ScaleCurve`] is the immutable local stage (shape, domain, tags,
//! axis style). A [`TransformedCurve`] is a cheap view pairing it with the
//! owning Block's effective transform; world coordinates only ever come
//! from the view.

pub mod shapes;

use glam::{DVec2, DVec3};

use crate::errors::GeometryError;
use crate::sampling::{self, Polyline};
use crate::transform::{ProjectiveTransform, dehomogenize};
use crate::types::{Color, Range};

pub use shapes::{
    DeterminantScale, FittedScale, Func1, Func2, GridAxis, GridScale, LinearScale, ScaleShape,
    Shape, ValueMap, func1, func2,
};

const ALIGN_INVERT_STEPS: usize = 200;

/// Tick placement mode of the axis decorator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScaleType {
    #[default]
    Linear,
    Log,
    /// Ticks only at the manual label values, drawn as dots.
    ManualPoint,
    /// Ticks only at the manual label values, drawn as tick lines.
    ManualLine,
}

/// Which side of the scale line ticks and labels go.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Side {
    #[default]
    Left,
    Right,
}

/// Tick/label configuration handed to the axis decorator.
#[derive(Clone, Debug, PartialEq)]
pub struct AxisStyle {
    /// Number of tick size levels (default 3).
    pub tick_levels: usize,
    /// Number of tick levels that carry labels (default 2).
    pub tick_text_levels: usize,
    pub scale_type: ScaleType,
    /// Manual `value → label` overrides.
    pub manual_labels: Vec<(f64, String)>,
    pub side: Side,
    pub color: Color,
    pub line_width: f64,
    /// Tick length of the major level, page units.
    pub tick_length: f64,
    pub text_size: f64,
}

impl Default for AxisStyle {
    fn default() -> Self {
        Self {
            tick_levels: 3,
            tick_text_levels: 2,
            scale_type: ScaleType::Linear,
            manual_labels: Vec::new(),
            side: Side::Left,
            color: Color::black(),
            line_width: 0.02,
            tick_length: 0.2,
            text_size: 0.25,
        }
    }
}

/// One scale in its Block's local frame.
#[derive(Clone, Debug)]
pub struct ScaleCurve {
    pub shape: Shape,
    pub range: Range,
    /// Alignment / value-sharing key; `None` means not aligned.
    pub tag: Option<String>,
    /// Secondary tag for double-point alignment.
    pub dtag: Option<String>,
    /// Maps this scale's parameter onto the parameter of the scale it is
    /// aligned to (unit conversion).
    pub align_func: Option<AlignFunc>,
    /// Pivot line with no quantitative meaning; its domain is derived from
    /// the Block's bounding box.
    pub reference: bool,
    pub title: String,
    pub axis: AxisStyle,
}

/// Newtype so `ScaleCurve` can derive `Debug`.
#[derive(Clone)]
pub struct AlignFunc(pub Func1);

impl std::fmt::Debug for AlignFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AlignFunc")
    }
}

impl ScaleCurve {
    pub fn new(shape: impl Into<Shape>, range: Range) -> Self {
        Self {
            shape: shape.into(),
            range,
            tag: None,
            dtag: None,
            align_func: None,
            reference: false,
            title: String::new(),
            axis: AxisStyle::default(),
        }
    }

    /// A reference (pivot) line; the domain is replaced later.
    pub fn reference(shape: impl Into<Shape>) -> Self {
        Self {
            reference: true,
            ..Self::new(shape, Range { min: 0.0, max: 1.0, reversed: false })
        }
    }

    pub fn with_tag(mut self, tag: Option<String>) -> Self {
        self.tag = tag.filter(|t| t != "none");
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Parameter value in the aligned-to scale's units.
    pub fn aligned_value(&self, u: f64) -> f64 {
        match &self.align_func {
            Some(AlignFunc(f)) => f(u),
            None => u,
        }
    }

    /// Own parameter whose aligned value is `canonical`: the first root
    /// over the domain, `None` if there is none.
    pub fn from_aligned(&self, canonical: f64) -> Result<Option<f64>, GeometryError> {
        if self.align_func.is_none() {
            return Ok(Some(canonical));
        }
        let roots = sampling::scan_roots(
            |u| {
                let d = self.aligned_value(u) - canonical;
                if d.is_finite() {
                    Ok(d)
                } else {
                    Err(GeometryError::NonFinite {
                        context: format!("align function of {}", self.describe(u)),
                        value: u,
                    })
                }
            },
            self.range,
            ALIGN_INVERT_STEPS,
        )?;
        Ok(roots.into_iter().next())
    }

    /// Homogeneous local point.
    pub fn homogeneous(&self, u: f64) -> DVec3 {
        self.shape.point(u)
    }

    /// Local `(x, y)` for scale value `u`.
    pub fn local_xy(&self, u: f64) -> Result<DVec2, GeometryError> {
        dehomogenize(self.homogeneous(u), || self.describe(u))
    }

    /// Local `(x, y)` at fraction `t` of the value domain.
    pub fn value_at_fraction(&self, t: f64) -> Result<DVec2, GeometryError> {
        self.local_xy(self.range.lerp(t))
    }

    /// World `(x, y)` through `transform`.
    pub fn world_xy(
        &self,
        u: f64,
        transform: &ProjectiveTransform,
    ) -> Result<DVec2, GeometryError> {
        self.view(*transform).world_xy(u)
    }

    /// Arc length between two values in the world frame.
    pub fn arc_length(
        &self,
        u0: f64,
        u1: f64,
        transform: &ProjectiveTransform,
    ) -> Result<f64, GeometryError> {
        self.view(*transform).arc_length(u0, u1)
    }

    pub fn view(&self, transform: ProjectiveTransform) -> TransformedCurve<'_> {
        TransformedCurve {
            curve: self,
            transform,
        }
    }

    fn describe(&self, u: f64) -> String {
        match (&self.tag, self.title.is_empty()) {
            (Some(tag), _) => format!("scale `{tag}` at {u}"),
            (None, false) => format!("scale \"{}\" at {u}", self.title),
            (None, true) => format!("scale at {u}"),
        }
    }
}

/// A scale curve seen through a transform.
#[derive(Clone, Copy, Debug)]
pub struct TransformedCurve<'a> {
    pub curve: &'a ScaleCurve,
    pub transform: ProjectiveTransform,
}

impl TransformedCurve<'_> {
    pub fn homogeneous(&self, u: f64) -> DVec3 {
        self.transform.apply_homogeneous(self.curve.homogeneous(u))
    }

    pub fn world_xy(&self, u: f64) -> Result<DVec2, GeometryError> {
        let p = dehomogenize(self.homogeneous(u), || self.curve.describe(u))?;
        if !p.is_finite() {
            return Err(GeometryError::NonFinite {
                context: self.curve.describe(u),
                value: u,
            });
        }
        Ok(p)
    }

    /// Adaptive world-frame polyline over the whole domain.
    pub fn sample(&self, target: Option<f64>) -> Result<Polyline, GeometryError> {
        sampling::sample_adaptive(|u| self.world_xy(u), self.curve.range, target)
    }

    pub fn arc_length(&self, u0: f64, u1: f64) -> Result<f64, GeometryError> {
        sampling::arc_length(|u| self.world_xy(u), u0, u1, None)
    }

    /// World length of the whole scale.
    pub fn length(&self) -> Result<f64, GeometryError> {
        self.arc_length(self.curve.range.min, self.curve.range.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::dvec2;

    fn vertical(x: f64) -> ScaleCurve {
        ScaleCurve::new(
            LinearScale {
                origin: dvec2(x, 0.0),
                direction: dvec2(0.0, 1.0),
                func: func1(|u| u),
            },
            Range::new(0.0, 10.0).unwrap(),
        )
    }

    #[test]
    fn fraction_walks_the_domain() {
        let c = vertical(2.0);
        assert_eq!(c.value_at_fraction(0.25).unwrap(), dvec2(2.0, 2.5));
    }

    #[test]
    fn view_applies_transform_without_mutation() {
        let c = vertical(0.0);
        let t = ProjectiveTransform::translation(dvec2(5.0, 1.0));
        assert_eq!(c.world_xy(3.0, &t).unwrap(), dvec2(5.0, 4.0));
        assert_eq!(c.local_xy(3.0).unwrap(), dvec2(0.0, 3.0));
    }

    #[test]
    fn arc_length_of_straight_scale() {
        let c = vertical(0.0);
        let t = ProjectiveTransform::scaling(1.0, 2.0);
        assert!((c.arc_length(1.0, 4.0, &t).unwrap() - 6.0).abs() < 1e-9);
        assert!((c.view(t).length().unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn aligned_value_inverts() {
        let mut c = vertical(0.0);
        c.align_func = Some(AlignFunc(func1(|u| 2.2046 * u)));
        let u = c.from_aligned(2.2046 * 3.0).unwrap().unwrap();
        assert!((u - 3.0).abs() < 1e-12);
        assert_eq!(c.from_aligned(1e6).unwrap(), None);
        assert_eq!(vertical(0.0).from_aligned(42.0).unwrap(), Some(42.0));
    }

    #[test]
    fn none_tag_means_untagged() {
        let c = vertical(0.0).with_tag(Some("none".to_string()));
        assert_eq!(c.tag, None);
        let c = vertical(0.0).with_tag(Some("p".to_string()));
        assert_eq!(c.tag.as_deref(), Some("p"));
    }

    #[test]
    fn infinite_point_names_the_tag() {
        let c = ScaleCurve::new(
            DeterminantScale {
                f: func1(|u| u),
                g: func1(|_| 0.0),
                h: func1(|u| u - 1.0),
            },
            Range::new(0.0, 2.0).unwrap(),
        )
        .with_tag(Some("t".to_string()));
        let err = c.local_xy(1.0).unwrap_err();
        assert_eq!(
            err,
            GeometryError::DivisionByZero {
                context: "scale `t` at 1".to_string()
            }
        );
    }
}
