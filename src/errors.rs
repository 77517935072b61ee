//! Error types with rich diagnostics using miette
//!
//! Fatal conditions only. Under-determined isopleths and optimizer
//! non-convergence are reported through `IsoplethReport` and
//! `GeneratorReport` instead.

use miette::Diagnostic;
use thiserror::Error;

// ============================================================================
// Configuration Errors
// ============================================================================

/// Errors in the caller-supplied configuration
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid range for {name}: max {max} is below min {min}")]
    #[diagnostic(
        code(nomoru::config::inverted_range),
        help("swap the bounds or check the units of `{name}`")
    )]
    InvertedRange { name: String, min: f64, max: f64 },

    #[error("non-finite bound for {name}")]
    #[diagnostic(code(nomoru::config::non_finite_bound))]
    NonFiniteBound { name: String },

    #[error("logarithmic axis {name} needs a positive range, got min {min}")]
    #[diagnostic(
        code(nomoru::config::log_non_positive),
        help("a log scale cannot contain zero or negative values")
    )]
    LogNonPositive { name: String, min: f64 },

    #[error("{kind} block expects {expected} scales, got {got}")]
    #[diagnostic(code(nomoru::config::scale_count))]
    ScaleCount {
        kind: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("isopleth row {row} of block {block} has {got} entries, expected {expected}")]
    #[diagnostic(code(nomoru::config::isopleth_width))]
    IsoplethWidth {
        block: usize,
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("tag `{tag}` appears only in block {block}")]
    #[diagnostic(
        code(nomoru::config::lonely_tag),
        help("a tag aligns two blocks; use \"none\" for scales that are not shared")
    )]
    LonelyTag { tag: String, block: usize },

    #[error("tag `{tag}` appears in {count} blocks")]
    #[diagnostic(
        code(nomoru::config::crowded_tag),
        help("a tag may join exactly two blocks; chain blocks with distinct tags")
    )]
    CrowdedTag { tag: String, count: usize },

    #[error("unknown transformation `{name}`")]
    #[diagnostic(
        code(nomoru::config::unknown_transformation),
        help("expected one of: scale paper, rotate, polygon, optimize")
    )]
    UnknownTransformation { name: String },

    #[error("node count {count} is too small")]
    #[diagnostic(
        code(nomoru::config::node_count),
        help("the generator needs at least 3 Chebyshev nodes")
    )]
    NodeCount { count: usize },

    #[error("invalid layout parameter {name}: {value}")]
    #[diagnostic(code(nomoru::config::layout))]
    Layout { name: &'static str, value: f64 },

    #[error("unsupported output format `{extension}`")]
    #[diagnostic(
        code(nomoru::config::output_format),
        help("only .svg output is built in; implement `Canvas` for other formats")
    )]
    OutputFormat { extension: String },
}

// ============================================================================
// Geometry Errors
// ============================================================================

/// Degenerate geometry hit while building or solving the chart
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("projective divide by zero in {context}")]
    #[diagnostic(
        code(nomoru::geometry::division_by_zero),
        help("the scale crosses the line at infinity; narrow the range or use an initial transform")
    )]
    DivisionByZero { context: String },

    #[error("singular transform matrix")]
    #[diagnostic(code(nomoru::geometry::singular))]
    Singular,

    #[error("degenerate alignment triangle for tag `{tag}`")]
    #[diagnostic(
        code(nomoru::geometry::degenerate_triangle),
        help("the aligned scale has zero length; check its range and functions")
    )]
    DegenerateTriangle { tag: String },

    #[error("degenerate quadrilateral for {context}")]
    #[diagnostic(
        code(nomoru::geometry::degenerate_quad),
        help("three of the four corner points are collinear")
    )]
    DegenerateQuad { context: String },

    #[error("non-finite value while evaluating {context} at {value}")]
    #[diagnostic(code(nomoru::geometry::non_finite))]
    NonFinite { context: String, value: f64 },

    #[error("nothing to fit: the chart has no scales")]
    #[diagnostic(code(nomoru::geometry::empty))]
    Empty,
}

// ============================================================================
// Generator Errors
// ============================================================================

/// Fatal errors of the automatic nomogram generator
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum GeneratorError {
    #[error("w(u, v) is not finite at corner ({u}, {v})")]
    #[diagnostic(
        code(nomoru::generator::corner_not_finite),
        help("the w range is taken from the four domain corners; every corner must evaluate")
    )]
    CornerNotFinite { u: f64, v: f64 },

    #[error("w(u, v) is constant over the domain corners")]
    #[diagnostic(code(nomoru::generator::flat_function))]
    FlatFunction,

    #[error("logarithmic w scale needs positive values, corner gives {w}")]
    #[diagnostic(code(nomoru::generator::log_w_non_positive))]
    LogWNonPositive { w: f64 },
}

// ============================================================================
// Render Errors
// ============================================================================

/// Errors raised by rendering backends
#[derive(Error, Diagnostic, Debug)]
pub enum RenderError {
    #[error("failed to write {path}")]
    #[diagnostic(code(nomoru::render::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("infinite or NaN coordinate in drawing")]
    #[diagnostic(code(nomoru::render::invalid_coordinate))]
    InvalidCoordinate,

    #[error("XML serialization error: {message}")]
    #[diagnostic(code(nomoru::render::serialize))]
    Serialize { message: String },
}

// ============================================================================
// Umbrella
// ============================================================================

/// Any fatal error of the nomogram pipeline
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Generator(#[from] GeneratorError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Render(#[from] RenderError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
