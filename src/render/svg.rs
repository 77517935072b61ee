//! SVG backend

use facet_svg::facet_xml::SerializeOptions;
use facet_svg::{Circle as SvgCircle, Path, PathData, Svg, SvgNode, SvgStyle, Text, facet_xml};
use glam::{DVec2, dvec2};

use crate::errors::RenderError;
use crate::types::Color;

use super::{Anchor, Canvas, LineStyle, TextStyle};

/// Collects drawing primitives into one SVG document.
///
/// Page coordinates are centimetres with `y` pointing up; the document is
/// sized in centimetres and flips `y` on output.
#[derive(Debug)]
pub struct SvgCanvas {
    paper: DVec2,
    margin: f64,
    nodes: Vec<SvgNode>,
}

impl SvgCanvas {
    pub fn new(paper: DVec2, margin: f64) -> Self {
        Self {
            paper,
            margin,
            nodes: Vec::new(),
        }
    }

    fn to_svg(&self, p: DVec2) -> Result<DVec2, RenderError> {
        if !p.is_finite() {
            return Err(RenderError::InvalidCoordinate);
        }
        Ok(dvec2(p.x, self.paper.y - p.y))
    }

    /// Serialize the document.
    pub fn finish(self) -> Result<String, RenderError> {
        let size = self.paper + 2.0 * self.margin;
        let svg = Svg {
            width: Some(format!("{}cm", fmt_num(size.x))),
            height: Some(format!("{}cm", fmt_num(size.y))),
            view_box: Some(format!(
                "{m} {m} {} {}",
                fmt_num(size.x),
                fmt_num(size.y),
                m = fmt_num(-self.margin)
            )),
            children: self.nodes,
        };

        fn format_float(value: f64, writer: &mut dyn std::io::Write) -> Result<(), std::io::Error> {
            write!(writer, "{}", fmt_num(value))
        }

        let options = SerializeOptions {
            float_formatter: Some(format_float),
            ..Default::default()
        };
        facet_xml::to_string_with_options(&svg, &options).map_err(|e| RenderError::Serialize {
            message: e.to_string(),
        })
    }
}

fn line_style(style: &LineStyle) -> SvgStyle {
    let mut svg_style = SvgStyle::new()
        .add("fill", "none")
        .add("stroke", &style.color.to_string())
        .add("stroke-width", &fmt_num(style.width));
    if !style.dash.is_empty() {
        let dash: Vec<String> = style.dash.iter().map(|d| fmt_num(*d)).collect();
        svg_style = svg_style.add("stroke-dasharray", &dash.join(","));
    }
    if style.opacity < 1.0 {
        svg_style = svg_style.add("stroke-opacity", &fmt_num(style.opacity));
    }
    svg_style
}

impl Canvas for SvgCanvas {
    fn polyline(&mut self, points: &[DVec2], style: &LineStyle) -> Result<(), RenderError> {
        let [first, rest @ ..] = points else {
            return Ok(());
        };
        if rest.is_empty() {
            return Ok(());
        }
        let start = self.to_svg(*first)?;
        let mut path_data = PathData::new().m(start.x, start.y);
        for p in rest {
            let p = self.to_svg(*p)?;
            path_data = path_data.l(p.x, p.y);
        }
        self.nodes.push(SvgNode::Path(Path {
            d: Some(path_data),
            fill: None,
            stroke: None,
            stroke_width: None,
            stroke_dasharray: None,
            style: line_style(style),
        }));
        Ok(())
    }

    fn circle(&mut self, center: DVec2, radius: f64, color: &Color) -> Result<(), RenderError> {
        let c = self.to_svg(center)?;
        self.nodes.push(SvgNode::Circle(SvgCircle {
            cx: Some(c.x),
            cy: Some(c.y),
            r: Some(radius),
            fill: None,
            stroke: None,
            stroke_width: None,
            stroke_dasharray: None,
            style: SvgStyle::new().add("fill", &color.to_string()),
        }));
        Ok(())
    }

    fn text(&mut self, at: DVec2, text: &str, style: &TextStyle) -> Result<(), RenderError> {
        let p = self.to_svg(at)?;
        let anchor = match style.anchor {
            Anchor::Start => "start",
            Anchor::Middle => "middle",
            Anchor::End => "end",
        };
        // Page angles are counter-clockwise; SVG's y axis points down.
        let transform = (style.rotation != 0.0).then(|| {
            format!("rotate({} {} {})", fmt_num(-style.rotation), fmt_num(p.x), fmt_num(p.y))
        });
        self.nodes.push(SvgNode::Text(Text {
            x: Some(p.x),
            y: Some(p.y),
            transform,
            fill: Some(style.color.to_string()),
            stroke: None,
            stroke_width: None,
            style: String::new(),
            font_family: None,
            font_style: None,
            font_weight: None,
            font_size: Some(fmt_num(style.size)),
            text_anchor: Some(anchor.to_string()),
            dominant_baseline: None,
            content: text.to_string(),
        }));
        Ok(())
    }
}

/// Six significant figures, trailing zeros trimmed.
pub(crate) fn fmt_num(value: f64) -> String {
    fmt_num_precision(value, 6)
}

fn fmt_num_precision(value: f64, sig_figs: i32) -> String {
    if value == 0.0 || !value.is_finite() {
        return "0".to_string();
    }
    let magnitude = value.abs().log10().floor() as i32;
    let scale = 10_f64.powi(sig_figs - 1 - magnitude);
    let rounded = (value * scale).round() / scale;
    if rounded == 0.0 {
        return "0".to_string();
    }
    let decimals = (sig_figs - 1 - magnitude).max(0) as usize;
    let s = format!("{:.prec$}", rounded, prec = decimals);
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_are_short() {
        assert_eq!(fmt_num(0.30000000000000004), "0.3");
        assert_eq!(fmt_num(100000.0), "100000");
        assert_eq!(fmt_num(-2.5), "-2.5");
        assert_eq!(fmt_num(1e-12), "0.000000000001");
        assert_eq!(fmt_num(-1e-300 * 1e-300), "0");
    }

    fn sample() -> SvgCanvas {
        let mut c = SvgCanvas::new(dvec2(10.0, 8.0), 1.0);
        c.polyline(&[dvec2(0.0, 0.0), dvec2(10.0, 8.0)], &LineStyle::solid(Color::black(), 0.02))
            .unwrap();
        let dashed = LineStyle {
            color: Color::named("red"),
            width: 0.05,
            dash: vec![0.2, 0.1],
            opacity: 0.5,
        };
        c.polyline(&[dvec2(1.0, 1.0), dvec2(2.0, 1.5)], &dashed).unwrap();
        c.circle(dvec2(5.0, 2.0), 0.05, &Color::named("red")).unwrap();
        let style = TextStyle {
            size: 0.3,
            anchor: Anchor::Middle,
            rotation: 90.0,
            color: Color::black(),
        };
        c.text(dvec2(3.0, 4.0), "a < b & c", &style).unwrap();
        c
    }

    #[test]
    fn document_is_sized_in_centimetres() {
        let svg = sample().finish().unwrap();
        assert!(svg.contains("<svg"), "{svg}");
        assert!(svg.contains(r#"width="12cm""#), "{svg}");
        assert!(svg.contains(r#"height="10cm""#), "{svg}");
        assert!(svg.contains(r#"viewBox="-1 -1 12 10""#), "{svg}");
    }

    #[test]
    fn primitives_flip_y() {
        let svg = sample().finish().unwrap();
        assert_eq!(svg.matches("<path").count(), 2, "{svg}");
        assert!(svg.contains("stroke-dasharray") && svg.contains("0.2,0.1"), "{svg}");
        assert!(svg.contains("stroke-opacity"), "{svg}");
        assert!(svg.contains(r#"cx="5""#) && svg.contains(r#"cy="6""#), "{svg}");
        assert!(svg.contains(r#"transform="rotate(-90 3 4)""#), "{svg}");
        assert!(svg.contains(r#"text-anchor="middle""#), "{svg}");
    }

    #[test]
    fn text_content_is_escaped() {
        let svg = sample().finish().unwrap();
        assert!(svg.contains("a &lt; b &amp; c"), "{svg}");
        assert!(!svg.contains("a < b"), "{svg}");
    }

    #[test]
    fn single_point_draws_nothing() {
        let mut c = SvgCanvas::new(dvec2(1.0, 1.0), 0.0);
        c.polyline(&[dvec2(0.5, 0.5)], &LineStyle::solid(Color::black(), 0.01))
            .unwrap();
        assert!(!c.finish().unwrap().contains("<path"));
    }

    #[test]
    fn non_finite_points_are_rejected() {
        let mut c = SvgCanvas::new(dvec2(1.0, 1.0), 0.0);
        let err = c.circle(dvec2(f64::NAN, 0.0), 1.0, &Color::black()).unwrap_err();
        assert!(matches!(err, RenderError::InvalidCoordinate));
    }
}
