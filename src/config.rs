//! Typed configuration surface.
//!
//! Every option is a named field with a documented default. Optional
//! settings are merged from the defaults with struct-update syntax or the
//! builder methods; there are no free-form keys to misspell.

use std::str::FromStr;

use glam::{DVec2, dvec2};

use crate::block::{
    AngleBlock, Block, ContourBlock, DeterminantBlock, GeneratedBlock, LadderBlock, MixedBlock,
    MultiSumBlock, ProductBlock, ProportionBlock, SingleBlock, SumBlock,
};
use crate::errors::{ConfigError, Error};
use crate::generator::GeneratorReport;
use crate::scale::{AlignFunc, AxisStyle, Func1, ScaleCurve, Shape};
use crate::types::{Color, Range};

/// Per-scale options shared by every relation kind.
#[derive(Clone, Debug)]
pub struct ScaleParams {
    pub u_min: f64,
    pub u_max: f64,
    /// Alignment / value-sharing key (default `"none"`).
    pub tag: String,
    /// Secondary tag for double alignment (default none).
    pub dtag: Option<String>,
    /// This scale's parameter → aligned-to scale's parameter.
    pub align_func: Option<AlignFunc>,
    /// Derive the domain from the Block's bounding box (default false).
    pub reference: bool,
    pub title: String,
    pub axis: AxisStyle,
}

impl Default for ScaleParams {
    fn default() -> Self {
        Self {
            u_min: 0.0,
            u_max: 1.0,
            tag: "none".to_string(),
            dtag: None,
            align_func: None,
            reference: false,
            title: String::new(),
            axis: AxisStyle::default(),
        }
    }
}

impl ScaleParams {
    pub fn new(u_min: f64, u_max: f64) -> Self {
        Self {
            u_min,
            u_max,
            ..Self::default()
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn dtag(mut self, tag: impl Into<String>) -> Self {
        self.dtag = Some(tag.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn axis(mut self, axis: AxisStyle) -> Self {
        self.axis = axis;
        self
    }

    pub fn align_func(mut self, f: Func1) -> Self {
        self.align_func = Some(AlignFunc(f));
        self
    }

    pub fn reference(mut self, reference: bool) -> Self {
        self.reference = reference;
        self
    }

    fn name(&self) -> &str {
        if self.title.is_empty() {
            if self.tag == "none" { "scale" } else { &self.tag }
        } else {
            &self.title
        }
    }

    /// Value domain; bounds may come in either order.
    pub fn range(&self) -> Result<Range, ConfigError> {
        Range::named(self.name(), self.u_min, self.u_max)
    }

    /// Value domain that must be ascending.
    pub fn ordered_range(&self) -> Result<Range, ConfigError> {
        Range::ordered(self.name(), self.u_min, self.u_max)
    }

    /// Local scale curve with these options.
    pub fn curve(&self, shape: impl Into<Shape>) -> Result<ScaleCurve, ConfigError> {
        let mut curve = ScaleCurve::new(shape, self.range()?)
            .with_tag(Some(self.tag.clone()))
            .with_title(self.title.clone());
        curve.dtag = self.dtag.clone().filter(|t| t != "none");
        curve.align_func = self.align_func.clone();
        curve.reference = self.reference;
        curve.axis = self.axis.clone();
        Ok(curve)
    }
}

/// Global page transformation step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Transformation {
    /// Axis-aligned bounding-box fit to the paper.
    ScalePaper,
    /// Rotation about the origin, degrees.
    Rotate(f64),
    /// Four support lines of the convex hull mapped onto the paper corners.
    Polygon,
    /// Perspective search minimizing page area over squared scale length.
    Optimize,
}

impl FromStr for Transformation {
    type Err = ConfigError;

    /// Accepts `scale paper`, `polygon`, `optimize` and `rotate [degrees]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let unknown = || ConfigError::UnknownTransformation { name: s.clone() };
        let mut words = s.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some("scale"), Some("paper"), None) => Ok(Transformation::ScalePaper),
            (Some("polygon"), None, None) => Ok(Transformation::Polygon),
            (Some("optimize"), None, None) => Ok(Transformation::Optimize),
            (Some("rotate"), None, None) => Ok(Transformation::Rotate(0.0)),
            (Some("rotate"), Some(deg), None) => deg
                .parse::<f64>()
                .ok()
                .filter(|d| d.is_finite())
                .map(Transformation::Rotate)
                .ok_or_else(unknown),
            _ => Err(unknown()),
        }
    }
}

/// Style of one isopleth row.
#[derive(Clone, Debug, PartialEq)]
pub struct IsoplethStyle {
    pub color: Color,
    pub line_width: f64,
    /// Dash pattern in page units; empty is solid.
    pub dash: Vec<f64>,
    pub opacity: f64,
    /// Radius of the dots marking solved points (0 draws none).
    pub circle_radius: f64,
}

impl Default for IsoplethStyle {
    fn default() -> Self {
        Self {
            color: Color::named("red"),
            line_width: 0.02,
            dash: Vec::new(),
            opacity: 1.0,
            circle_radius: 0.05,
        }
    }
}

/// Title text placed on the page.
#[derive(Clone, Debug, PartialEq)]
pub struct Title {
    pub text: String,
    /// Page position, centimetres from the lower-left corner.
    pub position: DVec2,
    pub size: f64,
}

/// One Block of the nomogram.
#[derive(Clone)]
pub enum BlockConfig {
    Sum(SumBlock),
    Product(ProductBlock),
    MultiSum(MultiSumBlock),
    Proportion(ProportionBlock),
    Contour(ContourBlock),
    Ladder(LadderBlock),
    Angle(AngleBlock),
    Single(SingleBlock),
    Determinant(DeterminantBlock),
    Mixed(MixedBlock),
    Generated(GeneratedBlock),
}

impl BlockConfig {
    /// Build the Block; generated Blocks also return the fit report.
    pub fn build(&self) -> Result<(Block, Option<GeneratorReport>), Error> {
        let block = match self {
            BlockConfig::Sum(b) => b.build()?,
            BlockConfig::Product(b) => b.build()?,
            BlockConfig::MultiSum(b) => b.build()?,
            BlockConfig::Proportion(b) => b.build()?,
            BlockConfig::Contour(b) => b.build()?,
            BlockConfig::Ladder(b) => b.build()?,
            BlockConfig::Angle(b) => b.build()?,
            BlockConfig::Single(b) => b.build()?,
            BlockConfig::Determinant(b) => b.build()?,
            BlockConfig::Mixed(b) => b.build()?,
            BlockConfig::Generated(b) => {
                let (block, report) = b.build()?;
                return Ok((block, Some(report)));
            }
        };
        Ok((block, None))
    }
}

/// Top-level nomogram options.
#[derive(Clone)]
pub struct NomogramConfig {
    /// Output file; the extension picks the backend (default
    /// `nomogram.svg`).
    pub filename: String,
    /// Paper width in centimetres (default 10).
    pub paper_width: f64,
    /// Paper height in centimetres (default 10).
    pub paper_height: f64,
    /// Global transformation steps, applied in order (default
    /// `[ScalePaper]`).
    pub transformations: Vec<Transformation>,
    pub title: Option<Title>,
    /// Cycled per isopleth row (default one red solid style).
    pub isopleth_styles: Vec<IsoplethStyle>,
    pub blocks: Vec<BlockConfig>,
}

impl Default for NomogramConfig {
    fn default() -> Self {
        Self {
            filename: "nomogram.svg".to_string(),
            paper_width: 10.0,
            paper_height: 10.0,
            transformations: vec![Transformation::ScalePaper],
            title: None,
            isopleth_styles: vec![IsoplethStyle::default()],
            blocks: Vec::new(),
        }
    }
}

impl NomogramConfig {
    pub fn paper(&self) -> Result<DVec2, ConfigError> {
        let sides = [("paper width", self.paper_width), ("paper height", self.paper_height)];
        for (name, value) in sides {
            crate::types::positive(value).map_err(|_| ConfigError::Layout { name, value })?;
        }
        Ok(dvec2(self.paper_width, self.paper_height))
    }

    /// Style for isopleth row `row`.
    pub fn isopleth_style(&self, row: usize) -> IsoplethStyle {
        if self.isopleth_styles.is_empty() {
            IsoplethStyle::default()
        } else {
            self.isopleth_styles[row % self.isopleth_styles.len()].clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_classic_method_names() {
        assert_eq!("scale paper".parse::<Transformation>().unwrap(), Transformation::ScalePaper);
        assert_eq!("Polygon".parse::<Transformation>().unwrap(), Transformation::Polygon);
        assert_eq!("optimize".parse::<Transformation>().unwrap(), Transformation::Optimize);
        assert_eq!("rotate 30".parse::<Transformation>().unwrap(), Transformation::Rotate(30.0));
    }

    #[test]
    fn unknown_method_is_a_config_error() {
        let err = "shear".parse::<Transformation>().unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownTransformation {
                name: "shear".to_string()
            }
        );
        assert!("rotate lots".parse::<Transformation>().is_err());
    }

    #[test]
    fn defaults_are_documented_values() {
        let cfg = NomogramConfig::default();
        assert_eq!(cfg.paper().unwrap(), dvec2(10.0, 10.0));
        assert_eq!(cfg.transformations, vec![Transformation::ScalePaper]);
        let s = ScaleParams::default();
        assert_eq!(s.tag, "none");
        assert_eq!(s.axis.tick_levels, 3);
        assert_eq!(s.axis.tick_text_levels, 2);
    }

    #[test]
    fn styles_cycle_per_row() {
        let cfg = NomogramConfig {
            isopleth_styles: vec![
                IsoplethStyle::default(),
                IsoplethStyle {
                    color: Color::named("blue"),
                    ..IsoplethStyle::default()
                },
            ],
            ..NomogramConfig::default()
        };
        assert_eq!(cfg.isopleth_style(3).color, Color::named("blue"));
        assert_eq!(cfg.isopleth_style(4).color, Color::named("red"));
    }

    #[test]
    fn curve_carries_tags() {
        let c = ScaleParams::new(1.0, 0.0)
            .tag("p")
            .dtag("none")
            .curve(crate::scale::LinearScale {
                origin: dvec2(0.0, 0.0),
                direction: dvec2(0.0, 1.0),
                func: crate::scale::func1(|u| u),
            })
            .unwrap();
        assert_eq!(c.tag.as_deref(), Some("p"));
        assert_eq!(c.dtag, None);
        assert!(c.range.reversed);
    }

    #[test]
    fn ordered_range_rejects_reversed_bounds() {
        assert!(ScaleParams::new(2.0, 1.0).ordered_range().is_err());
    }
}
