use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use glam::dvec2;
use miette::{IntoDiagnostic, miette};
use nomoru::block::{ContourBlock, GeneratedBlock, LadderBlock, ProductBlock, SumBlock};
use nomoru::config::ScaleParams;
use nomoru::generator::GeneratorConfig;
use nomoru::scale::{AxisStyle, ScaleType, Side, func1, func2};
use nomoru::{BlockConfig, Entry, Nomogram, NomogramConfig, Title};
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;

type Demo = fn() -> NomogramConfig;

const DEMOS: &[(&str, Demo)] = &[
    ("sum", sum),
    ("n-chart", n_chart),
    ("ladder", ladder),
    ("contour", contour),
    ("aligned", aligned),
    ("generated", generated),
];

fn main() -> miette::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("demos") => demos(),
        Some("check") => check(),
        Some(other) => Err(miette!("unknown command `{other}`")),
        None => {
            eprintln!("Usage: cargo xtask <command>");
            eprintln!("Commands:");
            eprintln!("  demos    Render the demo nomograms to target/demos/");
            eprintln!("  check    Check the library with and without the tracing feature");
            std::process::exit(1);
        }
    }
}

fn workspace_root() -> miette::Result<&'static Utf8Path> {
    Utf8Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .ok_or_else(|| miette!("xtask has no parent directory"))
}

/// The log macros are swapped for no-ops without `tracing`, so both
/// configurations have to build.
fn check() -> miette::Result<()> {
    let root = workspace_root()?;
    let cargo = std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());
    for features in [&["--no-default-features"][..], &["--features", "tracing"][..]] {
        eprintln!("cargo check -p nomoru --all-targets {}", features.join(" "));
        let status = Command::new(&cargo)
            .current_dir(root)
            .args(["check", "-p", "nomoru", "--all-targets"])
            .args(features)
            .status()
            .into_diagnostic()?;
        if !status.success() {
            return Err(miette!("cargo check {} failed: {status}", features.join(" ")));
        }
    }
    Ok(())
}

fn demos() -> miette::Result<()> {
    let root = workspace_root()?;
    let out_dir: Utf8PathBuf = root.join("target").join("demos");
    std::fs::create_dir_all(&out_dir).into_diagnostic()?;

    let results: Vec<(&str, Utf8PathBuf, nomoru::Result<Nomogram>)> = DEMOS
        .par_iter()
        .map(|(name, make)| {
            let path = out_dir.join(format!("{name}.svg"));
            let config = NomogramConfig {
                filename: path.to_string(),
                ..make()
            };
            (*name, path, nomoru::nomogram(&config))
        })
        .collect();

    for (name, path, result) in results {
        let chart = result.map_err(|e| miette::Report::new(e).wrap_err(format!("demo `{name}`")))?;
        let unresolved = chart.isopleths.unresolved_rows();
        eprintln!(
            "{name}: {path} ({} isopleth rows, {} unresolved)",
            chart.isopleths.rows.len(),
            unresolved.len()
        );
        for (block, report) in &chart.generator_reports {
            eprintln!(
                "  block {block}: {} iterations, gradient {:.2e}, identity residual {:.2e}, \
                 worst error {:.3} mm of {} mm",
                report.iterations,
                report.gradient,
                report.identity_residual,
                report.max_error_mm,
                report.resolution_mm
            );
        }
    }
    Ok(())
}

fn title(text: &str) -> Option<Title> {
    Some(Title {
        text: text.to_string(),
        position: dvec2(5.0, 10.5),
        size: 0.4,
    })
}

fn log_axis() -> AxisStyle {
    AxisStyle {
        scale_type: ScaleType::Log,
        ..AxisStyle::default()
    }
}

fn right_axis() -> AxisStyle {
    AxisStyle {
        side: Side::Right,
        ..AxisStyle::default()
    }
}

fn sum() -> NomogramConfig {
    let mut block = SumBlock::new(
        func1(|u| u),
        func1(|v| v),
        func1(|w| -w),
        ScaleParams::new(0.0, 10.0).title("u"),
        ScaleParams::new(0.0, 10.0).title("v"),
        ScaleParams::new(0.0, 20.0).title("u + v").axis(right_axis()),
    );
    block.isopleths = vec![vec![Entry::Value(5.0), Entry::Value(3.0), Entry::Unknown]];
    NomogramConfig {
        title: title("u + v = w"),
        blocks: vec![BlockConfig::Sum(block)],
        ..NomogramConfig::default()
    }
}

fn n_chart() -> NomogramConfig {
    let mut block = ProductBlock::new(
        func1(|u| u),
        func1(|v| v),
        func1(|w| w),
        ScaleParams::new(1.0, 100.0).title("u").axis(log_axis()),
        ScaleParams::new(1.0, 10.0).title("v").axis(right_axis()),
        ScaleParams::new(1.0, 10.0).title("w"),
    );
    block.isopleths = vec![
        vec![Entry::Unknown, Entry::Value(4.0), Entry::Value(5.0)],
        vec![Entry::Value(30.0), Entry::Value(6.0), Entry::Unknown],
    ];
    NomogramConfig {
        title: title("u = v · w"),
        blocks: vec![BlockConfig::Product(block)],
        ..NomogramConfig::default()
    }
}

fn ladder() -> NomogramConfig {
    let mut block = LadderBlock::new(
        func1(|c| c),
        func1(|f| (f - 32.0) / 1.8),
        ScaleParams::new(-40.0, 100.0).title("°C"),
        ScaleParams::new(-40.0, 212.0).title("°F").axis(right_axis()),
    );
    block.isopleths = vec![vec![Entry::Value(37.0), Entry::Unknown]];
    NomogramConfig {
        title: title("Celsius to Fahrenheit"),
        blocks: vec![BlockConfig::Ladder(block)],
        ..NomogramConfig::default()
    }
}

fn contour() -> NomogramConfig {
    let mut block = ContourBlock::new(
        func1(|u| u),
        func2(|x, v| x * v),
        func1(|w| w),
        ScaleParams::new(0.0, 20.0).title("u"),
        ScaleParams::new(1.0, 2.0).title("v"),
        ScaleParams::new(0.0, 10.0).title("w"),
    );
    block.isopleths = vec![vec![Entry::Value(12.0), Entry::Value(1.5), Entry::Unknown]];
    NomogramConfig {
        title: title("u = w · v"),
        blocks: vec![BlockConfig::Contour(block)],
        ..NomogramConfig::default()
    }
}

/// A sum whose result is read off in centimetres on a second Block.
fn aligned() -> NomogramConfig {
    let mut sum = SumBlock::new(
        func1(|u| u),
        func1(|v| v),
        func1(|w| -w),
        ScaleParams::new(0.0, 10.0).title("a [in]"),
        ScaleParams::new(0.0, 10.0).title("b [in]"),
        ScaleParams::new(0.0, 20.0).tag("total"),
    );
    sum.isopleths = vec![vec![Entry::Value(4.0), Entry::Value(7.5), Entry::Unknown]];
    let mut convert = LadderBlock::new(
        func1(|inch| inch),
        func1(|cm| cm / 2.54),
        ScaleParams::new(0.0, 20.0).tag("total").title("a + b [in]"),
        ScaleParams::new(0.0, 50.8).title("a + b [cm]").axis(right_axis()),
    );
    convert.isopleths = vec![vec![Entry::Unknown, Entry::Unknown]];
    NomogramConfig {
        title: title("Sum in two units"),
        blocks: vec![BlockConfig::Sum(sum), BlockConfig::Ladder(convert)],
        ..NomogramConfig::default()
    }
}

fn generated() -> NomogramConfig {
    let mut block = GeneratedBlock::new(
        func2(|u, v| u * v.sqrt()),
        ScaleParams::new(1.0, 10.0).title("u").axis(log_axis()),
        ScaleParams::new(1.0, 10.0).title("v").axis(log_axis()),
        ScaleParams::default().title("u √v").axis(log_axis()),
    );
    block.generator = GeneratorConfig {
        log_u: true,
        log_v: true,
        log_w: true,
        ..GeneratorConfig::default()
    };
    block.isopleths = vec![vec![Entry::Value(3.0), Entry::Value(4.0), Entry::Unknown]];
    NomogramConfig {
        title: title("w = u √v (fitted)"),
        blocks: vec![BlockConfig::Generated(block)],
        ..NomogramConfig::default()
    }
}
