//! Nomogram construction.
//!
//! A nomogram is built from Blocks, each laying out one algebraic relation
//! as scale curves in its own frame. Blocks sharing a tagged scale are
//! aligned onto each other, the composite is fitted to the paper, isopleth
//! requests are solved by geometric intersection, and the result is drawn
//! through a [`render::Canvas`] backend.
//!
//! ```no_run
//! use nomoru::{NomogramConfig, block::SumBlock, config::{BlockConfig, ScaleParams}, scale::func1};
//!
//! let sum = SumBlock::new(
//!     func1(|u| u),
//!     func1(|v| v),
//!     func1(|w| -w),
//!     ScaleParams::new(0.0, 10.0).title("u"),
//!     ScaleParams::new(0.0, 10.0).title("v"),
//!     ScaleParams::new(0.0, 20.0).title("u + v"),
//! );
//! let config = NomogramConfig {
//!     filename: "sum.svg".to_string(),
//!     blocks: vec![BlockConfig::Sum(sum)],
//!     ..NomogramConfig::default()
//! };
//! nomoru::nomogram(&config)?;
//! # Ok::<(), nomoru::Error>(())
//! ```

pub mod align;
pub mod block;
pub mod chebyshev;
pub mod config;
pub mod errors;
pub mod generator;
pub mod isopleth;
mod log;
pub mod minimize;
pub mod render;
pub mod sampling;
pub mod scale;
pub mod transform;
pub mod types;
pub mod wrapper;

use std::path::Path;

pub use config::{BlockConfig, IsoplethStyle, NomogramConfig, Title, Transformation};
pub use errors::{ConfigError, Error, GeneratorError, GeometryError, RenderError, Result};
pub use generator::GeneratorReport;
pub use isopleth::{Entry, IsoplethReport};
pub use transform::ProjectiveTransform;
pub use wrapper::{UnalignedTag, Wrapper};

/// A finished chart: placed Blocks, solved isopleths and fit reports.
#[derive(Clone, Debug)]
pub struct Nomogram {
    pub wrapper: Wrapper,
    pub isopleths: IsoplethReport,
    /// `(block index, report)` for every generated Block.
    pub generator_reports: Vec<(usize, GeneratorReport)>,
    pub title: Option<Title>,
    pub isopleth_styles: Vec<IsoplethStyle>,
    pub filename: String,
}

impl Nomogram {
    /// Style for isopleth row `row`, cycling through the configured list.
    pub fn isopleth_style(&self, row: usize) -> IsoplethStyle {
        if self.isopleth_styles.is_empty() {
            IsoplethStyle::default()
        } else {
            self.isopleth_styles[row % self.isopleth_styles.len()].clone()
        }
    }

    pub fn to_svg(&self) -> Result<String> {
        render::to_svg(self)
    }

    /// Write to the configured filename.
    pub fn write(&self) -> Result<()> {
        render::write(self, Path::new(&self.filename))
    }
}

/// Put the real Block index into errors raised while building Block `block`.
fn at_block(err: Error, block: usize) -> Error {
    match err {
        Error::Config(ConfigError::IsoplethWidth { row, expected, got, .. }) => {
            ConfigError::IsoplethWidth {
                block,
                row,
                expected,
                got,
            }
            .into()
        }
        err => err,
    }
}

/// Build every Block, align, fit the page and solve the isopleths.
///
/// Fatal conditions abort before anything is drawn. Unresolved isopleths
/// are left in the report.
pub fn build(config: &NomogramConfig) -> Result<Nomogram> {
    let paper = config.paper()?;
    let mut blocks = Vec::with_capacity(config.blocks.len());
    let mut generator_reports = Vec::new();
    for (i, cfg) in config.blocks.iter().enumerate() {
        let (block, report) = cfg.build().map_err(|e| at_block(e, i))?;
        crate::log::debug!(
            "built block {i}: {} with {} curves",
            block.kind.name(),
            block.curves.len()
        );
        if let Some(report) = report {
            generator_reports.push((i, report));
        }
        blocks.push(block);
    }

    let mut wrapper = Wrapper::new(blocks, paper);
    wrapper.align_blocks()?;
    for step in &config.transformations {
        wrapper.do_transformation(*step)?;
    }

    let isopleths = wrapper.solve_isopleths()?;
    let unresolved = isopleths.unresolved_rows();
    if !unresolved.is_empty() {
        crate::log::info!("{} isopleth rows unresolved: {unresolved:?}", unresolved.len());
    }
    Ok(Nomogram {
        wrapper,
        isopleths,
        generator_reports,
        title: config.title.clone(),
        isopleth_styles: config.isopleth_styles.clone(),
        filename: config.filename.clone(),
    })
}

/// [`build`], then write the chart to `config.filename`.
pub fn nomogram(config: &NomogramConfig) -> Result<Nomogram> {
    let chart = build(config)?;
    chart.write()?;
    Ok(chart)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::SumBlock;
    use crate::config::ScaleParams;
    use crate::scale::func1;

    fn sum(rows: Vec<Vec<Entry>>) -> BlockConfig {
        let mut b = SumBlock::new(
            func1(|u| u),
            func1(|v| v),
            func1(|w| -w),
            ScaleParams::new(0.0, 10.0),
            ScaleParams::new(0.0, 10.0),
            ScaleParams::new(0.0, 20.0),
        );
        b.isopleths = rows;
        BlockConfig::Sum(b)
    }

    #[test]
    fn isopleth_width_error_names_the_block() {
        let config = NomogramConfig {
            blocks: vec![sum(Vec::new()), sum(vec![vec![Entry::Value(1.0)]])],
            ..NomogramConfig::default()
        };
        let err = build(&config).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::IsoplethWidth {
                block: 1,
                row: 0,
                expected: 3,
                got: 1
            })
        ));
    }

    #[test]
    fn styles_cycle_per_row() {
        let red = IsoplethStyle::default();
        let blue = IsoplethStyle {
            color: crate::types::Color::named("blue"),
            ..IsoplethStyle::default()
        };
        let config = NomogramConfig {
            isopleth_styles: vec![red.clone(), blue.clone()],
            blocks: vec![sum(vec![vec![Entry::Value(1.0), Entry::Value(2.0), Entry::Unknown]])],
            ..NomogramConfig::default()
        };
        let chart = build(&config).unwrap();
        assert_eq!(chart.isopleth_style(0), red);
        assert_eq!(chart.isopleth_style(3), blue);
        let w = chart.isopleths.value(0, 0, 2).unwrap();
        assert!((w - 3.0).abs() < 1e-6);
    }
}
