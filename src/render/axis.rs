//! Axis decoration: tick marks and labels along a placed scale.

use glam::DVec2;

use crate::errors::GeometryError;
use crate::scale::{AxisStyle, ScaleType, Side, TransformedCurve};
use crate::types::Range;

use super::Anchor;
use super::svg::fmt_num;

/// Ticks enumerated per level before a level is dropped as too dense.
const MAX_TICKS: i64 = 400;
/// Each finer tick level is this fraction of the previous length.
const LEVEL_SHRINK: f64 = 0.6;
/// Subdivision of the major step at each tick level.
const LINEAR_DIVISORS: [f64; 6] = [1.0, 2.0, 10.0, 20.0, 100.0, 200.0];
/// Decade mantissas per tick level.
const LOG_MANTISSAS: [&[f64]; 3] = [&[1.0], &[2.0, 5.0], &[3.0, 4.0, 6.0, 7.0, 8.0, 9.0]];

#[derive(Clone, Debug, PartialEq)]
pub struct Label {
    pub at: DVec2,
    pub text: String,
    pub anchor: Anchor,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tick {
    pub value: f64,
    pub level: usize,
    pub base: DVec2,
    pub tip: DVec2,
}

/// Drawing primitives produced for one scale.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Decoration {
    pub ticks: Vec<Tick>,
    pub dots: Vec<DVec2>,
    pub labels: Vec<Label>,
}

/// Tick values with their level, ascending.
pub fn tick_values(range: Range, style: &AxisStyle) -> Vec<(f64, usize)> {
    match style.scale_type {
        ScaleType::Linear => linear_ticks(range, style.tick_levels),
        ScaleType::Log => {
            let ticks = log_ticks(range, style.tick_levels);
            // Less than a decade with no inner mantissa: fall back.
            if ticks.iter().filter(|(_, level)| *level < 2).count() < 2 {
                linear_ticks(range, style.tick_levels)
            } else {
                ticks
            }
        }
        ScaleType::ManualPoint | ScaleType::ManualLine => {
            let mut out: Vec<(f64, usize)> = style
                .manual_labels
                .iter()
                .map(|(v, _)| *v)
                .filter(|v| range.contains(*v))
                .map(|v| (v, 0))
                .collect();
            out.sort_by(|a, b| a.0.total_cmp(&b.0));
            out
        }
    }
}

fn linear_ticks(range: Range, levels: usize) -> Vec<(f64, usize)> {
    let span = range.span();
    if !(span > 0.0) || !span.is_finite() {
        return Vec::new();
    }
    let mut major = 10f64.powf(span.log10().floor());
    if span / major < 3.0 {
        major /= 2.0;
    }
    let mut out: Vec<(f64, usize)> = Vec::new();
    for (level, divisor) in LINEAR_DIVISORS.iter().enumerate().take(levels) {
        let step = major / divisor;
        let first = (range.min / step - 1e-9).ceil() as i64;
        let last = (range.max / step + 1e-9).floor() as i64;
        if last - first > MAX_TICKS {
            break;
        }
        for k in first..=last {
            let v = k as f64 * step;
            if !out.iter().any(|(o, _)| (o - v).abs() < step * 1e-6) {
                out.push((v, level));
            }
        }
    }
    out.sort_by(|a, b| a.0.total_cmp(&b.0));
    out
}

fn log_ticks(range: Range, levels: usize) -> Vec<(f64, usize)> {
    if !(range.min > 0.0) {
        return Vec::new();
    }
    let (lo, hi) = (range.min * (1.0 - 1e-9), range.max * (1.0 + 1e-9));
    let (e0, e1) = (range.min.log10().floor() as i32, range.max.log10().ceil() as i32);
    let mut out = Vec::new();
    for (level, mantissas) in LOG_MANTISSAS.iter().enumerate().take(levels) {
        for e in e0..=e1 {
            for m in mantissas.iter() {
                let v = m * 10f64.powi(e);
                if v >= lo && v <= hi {
                    out.push((v, level));
                }
            }
        }
    }
    out.sort_by(|a, b| a.0.total_cmp(&b.0));
    out
}

/// Unit normal on the tick side at `u`.
fn normal(curve: &TransformedCurve<'_>, u: f64, side: Side) -> Result<DVec2, GeometryError> {
    let range = curve.curve.range;
    let h = range.span() * 1e-5;
    let (a, b) = ((u - h).max(range.min), (u + h).min(range.max));
    let tangent = curve.world_xy(b)? - curve.world_xy(a)?;
    let n = tangent.perp().try_normalize().unwrap_or(DVec2::X);
    Ok(match side {
        Side::Left => n,
        Side::Right => -n,
    })
}

fn anchor_for(n: DVec2) -> Anchor {
    if n.x > 0.3 {
        Anchor::Start
    } else if n.x < -0.3 {
        Anchor::End
    } else {
        Anchor::Middle
    }
}

fn label_text(value: f64, style: &AxisStyle) -> String {
    style
        .manual_labels
        .iter()
        .find(|(v, _)| (v - value).abs() <= 1e-9 * v.abs().max(1.0))
        .map(|(_, text)| text.clone())
        .unwrap_or_else(|| fmt_num(value))
}

/// Ticks, dots and labels for `curve` under `style`.
pub fn decorate(
    curve: &TransformedCurve<'_>,
    style: &AxisStyle,
) -> Result<Decoration, GeometryError> {
    let mut out = Decoration::default();
    let manual = matches!(style.scale_type, ScaleType::ManualPoint | ScaleType::ManualLine);
    for (value, level) in tick_values(curve.curve.range, style) {
        let base = curve.world_xy(value)?;
        let n = normal(curve, value, style.side)?;
        let length = style.tick_length * LEVEL_SHRINK.powi(level as i32);
        let tip = if style.scale_type == ScaleType::ManualPoint {
            out.dots.push(base);
            base + n * style.tick_length * 0.5
        } else {
            out.ticks.push(Tick { value, level, base, tip: base + n * length });
            base + n * length
        };
        if manual || level < style.tick_text_levels {
            out.labels.push(Label {
                at: tip + n * style.text_size * 0.6,
                text: label_text(value, style),
                anchor: anchor_for(n),
            });
        }
    }
    Ok(out)
}
