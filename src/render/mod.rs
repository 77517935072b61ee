//! Drawing the finished chart.
//!
//! The geometry is final before anything is drawn. Layers go out in a
//! fixed order: grid surfaces, chart lines with their axis decoration,
//! isopleths, then the title.

pub mod axis;
pub mod svg;

use std::path::Path;

use glam::DVec2;

use crate::Nomogram;
use crate::errors::{ConfigError, Error, RenderError};
use crate::log::debug;
use crate::scale::TransformedCurve;
use crate::types::Color;

pub use svg::SvgCanvas;

/// Space around the paper for labels, centimetres.
pub const MARGIN: f64 = 1.0;
const GRID_WIDTH: f64 = 0.01;
const REFERENCE_WIDTH: f64 = 0.005;

/// Horizontal text alignment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Anchor {
    Start,
    #[default]
    Middle,
    End,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LineStyle {
    pub color: Color,
    pub width: f64,
    /// Dash pattern; empty is solid.
    pub dash: Vec<f64>,
    pub opacity: f64,
}

impl LineStyle {
    pub fn solid(color: Color, width: f64) -> Self {
        Self {
            color,
            width,
            dash: Vec::new(),
            opacity: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextStyle {
    pub size: f64,
    pub anchor: Anchor,
    /// Counter-clockwise, degrees.
    pub rotation: f64,
    pub color: Color,
}

impl TextStyle {
    pub fn new(size: f64, anchor: Anchor) -> Self {
        Self {
            size,
            anchor,
            rotation: 0.0,
            color: Color::black(),
        }
    }
}

/// Backend receiving drawing primitives in page coordinates.
pub trait Canvas {
    fn polyline(&mut self, points: &[DVec2], style: &LineStyle) -> Result<(), RenderError>;
    fn circle(&mut self, center: DVec2, radius: f64, color: &Color) -> Result<(), RenderError>;
    fn text(&mut self, at: DVec2, text: &str, style: &TextStyle) -> Result<(), RenderError>;
}

/// Output format picked from the file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "svg" => Ok(OutputFormat::Svg),
            _ => Err(ConfigError::OutputFormat { extension }),
        }
    }
}

/// Where a scale's title goes: just past the high end, along the scale.
fn title_position(curve: &TransformedCurve<'_>, size: f64) -> Result<DVec2, Error> {
    let range = curve.curve.range;
    let end = curve.world_xy(range.max)?;
    let before = curve.world_xy(range.max - range.span() * 1e-3)?;
    let along = (end - before).try_normalize().unwrap_or(DVec2::Y);
    Ok(end + along * size * 1.5)
}

fn draw_scale(curve: &TransformedCurve<'_>, canvas: &mut dyn Canvas) -> Result<(), Error> {
    let style = &curve.curve.axis;
    let line = curve.sample(None)?;
    canvas.polyline(&line.points(), &LineStyle::solid(style.color.clone(), style.line_width))?;

    let deco = axis::decorate(curve, style)?;
    let tick_style = LineStyle::solid(style.color.clone(), style.line_width * 0.75);
    for tick in &deco.ticks {
        canvas.polyline(&[tick.base, tick.tip], &tick_style)?;
    }
    for dot in &deco.dots {
        canvas.circle(*dot, style.line_width * 2.0, &style.color)?;
    }
    for label in &deco.labels {
        let text = TextStyle {
            color: style.color.clone(),
            ..TextStyle::new(style.text_size, label.anchor)
        };
        canvas.text(label.at, &label.text, &text)?;
    }
    if !curve.curve.title.is_empty() {
        let at = title_position(curve, style.text_size)?;
        let title = TextStyle::new(style.text_size * 1.2, Anchor::Middle);
        canvas.text(at, &curve.curve.title, &title)?;
    }
    Ok(())
}

/// Draw the whole chart in layer order.
pub fn draw(nomogram: &Nomogram, canvas: &mut dyn Canvas) -> Result<(), Error> {
    let blocks = &nomogram.wrapper.blocks;

    for block in blocks {
        let t = block.transform();
        for grid in &block.grids {
            let style = LineStyle::solid(grid.color.clone(), GRID_WIDTH);
            for line in grid.iso_lines() {
                canvas.polyline(&line.view(t).sample(None)?.points(), &style)?;
            }
        }
    }

    for block in blocks {
        let t = block.transform();
        for curve in &block.curves {
            let view = curve.view(t);
            if curve.reference {
                let style = LineStyle::solid(curve.axis.color.clone(), REFERENCE_WIDTH);
                canvas.polyline(&view.sample(None)?.points(), &style)?;
            } else {
                draw_scale(&view, canvas)?;
            }
        }
    }

    for (row, solutions) in nomogram.isopleths.rows.iter().enumerate() {
        let style = nomogram.isopleth_style(row);
        let line = LineStyle {
            color: style.color.clone(),
            width: style.line_width,
            dash: style.dash.clone(),
            opacity: style.opacity,
        };
        for solution in solutions {
            for points in &solution.lines {
                canvas.polyline(points, &line)?;
            }
            if style.circle_radius > 0.0 {
                for p in solution.points.iter().flatten() {
                    canvas.circle(*p, style.circle_radius, &style.color)?;
                }
            }
        }
    }

    if let Some(title) = &nomogram.title {
        canvas.text(title.position, &title.text, &TextStyle::new(title.size, Anchor::Middle))?;
    }
    Ok(())
}

/// The chart as an SVG document.
pub fn to_svg(nomogram: &Nomogram) -> Result<String, Error> {
    let mut canvas = SvgCanvas::new(nomogram.wrapper.paper(), MARGIN);
    draw(nomogram, &mut canvas)?;
    Ok(canvas.finish()?)
}

/// Render to `path`; the extension selects the backend.
pub fn write(nomogram: &Nomogram, path: &Path) -> Result<(), Error> {
    let document = match OutputFormat::from_path(path)? {
        OutputFormat::Svg => to_svg(nomogram)?,
    };
    std::fs::write(path, document).map_err(|source| RenderError::Io {
        path: path.display().to_string(),
        source,
    })?;
    debug!("wrote {}", path.display());
    Ok(())
}
