//! End-to-end properties of the build pipeline: configuration in, placed
//! and solved chart out.

use glam::DVec2;
use nomoru::align::{Placed, two_point};
use nomoru::block::{DetRow, DeterminantBlock, GeneratedBlock, LadderBlock, SumBlock};
use nomoru::config::ScaleParams;
use nomoru::generator::GeneratorConfig;
use nomoru::scale::{func1, func2};
use nomoru::types::cross;
use nomoru::{
    BlockConfig, ConfigError, Entry, Error, NomogramConfig, ProjectiveTransform, Transformation,
    build,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn adder(u: ScaleParams, v: ScaleParams, w: ScaleParams, rows: Vec<Vec<Entry>>) -> BlockConfig {
    let mut b = SumBlock::new(func1(|u| u), func1(|v| v), func1(|w| -w), u, v, w);
    b.isopleths = rows;
    BlockConfig::Sum(b)
}

fn config(blocks: Vec<BlockConfig>) -> NomogramConfig {
    NomogramConfig {
        blocks,
        ..NomogramConfig::default()
    }
}

/// Per-process file name in the system temp directory.
fn temp_path(name: &str, ext: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("nomoru-{name}-{}.{ext}", std::process::id()))
}

#[test]
fn aligned_tag_points_coincide() {
    let first = adder(
        ScaleParams::new(0.0, 10.0),
        ScaleParams::new(0.0, 10.0),
        ScaleParams::new(0.0, 20.0).tag("s"),
        Vec::new(),
    );
    let second = BlockConfig::Ladder(LadderBlock::new(
        func1(|s| s),
        func1(|cm| cm / 2.54),
        ScaleParams::new(0.0, 20.0).tag("s"),
        ScaleParams::new(0.0, 50.8),
    ));
    let mut cfg = config(vec![first, second]);
    cfg.transformations = vec![Transformation::Rotate(25.0), Transformation::ScalePaper];
    let chart = build(&cfg).unwrap();

    let [a, b] = [&chart.wrapper.blocks[0], &chart.wrapper.blocks[1]];
    let (ta, tb) = (a.transform(), b.transform());
    for s in [0.0, 1.0, 6.5, 13.25, 20.0] {
        let p = a.curves[2].world_xy(s, &ta).unwrap();
        let q = b.curves[0].world_xy(s, &tb).unwrap();
        assert!((p - q).length() < 1e-9, "s = {s}: {p} vs {q}");
    }

    // Aligning again changes nothing.
    let (fixed, moving) = (Placed::new(&a.curves[2], ta), Placed::new(&b.curves[0], tb));
    let again = two_point(fixed, moving, "s").unwrap();
    assert!(again.distance(&ProjectiveTransform::identity()) < 1e-9);
}

#[test]
fn sum_round_trip_through_the_pipeline() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let pairs: Vec<(f64, f64)> = (0..50)
        .map(|_| (rng.random_range(0.0..10.0), rng.random_range(0.0..10.0)))
        .collect();
    let rows = pairs
        .iter()
        .map(|&(u, v)| vec![Entry::Value(u), Entry::Value(v), Entry::Unknown])
        .collect();
    let mut b = SumBlock::new(
        func1(|u| u),
        func1(|v| v),
        func1(|w| w),
        ScaleParams::new(0.0, 10.0),
        ScaleParams::new(0.0, 10.0),
        ScaleParams::new(-20.0, 0.0),
    );
    b.isopleths = rows;
    let mut cfg = config(vec![BlockConfig::Sum(b)]);
    cfg.transformations = vec![Transformation::Rotate(40.0), Transformation::Polygon];
    let chart = build(&cfg).unwrap();

    assert!(chart.isopleths.unresolved_rows().is_empty());
    for (row, (u, v)) in pairs.iter().enumerate() {
        let w = chart.isopleths.value(row, 0, 2).unwrap();
        assert!((w + (u + v)).abs() < 1e-6, "row {row}: w = {w}, expected {}", -(u + v));
    }
}

#[test]
fn determinant_points_stay_collinear_on_the_page() {
    // Rows (0, u, 1), (1, v, 1), (w, 0, 1 + w): collinear when w = -u / v.
    let rows = [
        DetRow::Scale {
            f: func1(|_| 0.0),
            g: func1(|u| u),
            h: func1(|_| 1.0),
            params: ScaleParams::new(1.0, 2.0),
        },
        DetRow::Scale {
            f: func1(|_| 1.0),
            g: func1(|v| v),
            h: func1(|_| 1.0),
            params: ScaleParams::new(-2.0, -1.0),
        },
        DetRow::Scale {
            f: func1(|w| w),
            g: func1(|_| 0.0),
            h: func1(|w| 1.0 + w),
            params: ScaleParams::new(0.5, 2.0),
        },
    ];
    let mut rng = StdRng::seed_from_u64(9);
    let triples: Vec<(f64, f64)> = (0..20)
        .map(|_| (rng.random_range(1.0..2.0), rng.random_range(-2.0..-1.0)))
        .collect();
    let mut det = DeterminantBlock::new(rows);
    det.isopleths = triples
        .iter()
        .map(|&(u, v)| vec![Entry::Value(u), Entry::Value(v), Entry::Unknown])
        .collect();
    let chart = build(&config(vec![BlockConfig::Determinant(det)])).unwrap();

    let block = &chart.wrapper.blocks[0];
    let t = block.transform();
    for (row, &(u, v)) in triples.iter().enumerate() {
        let w = -u / v;
        let p = block.curves[0].world_xy(u, &t).unwrap();
        let q = block.curves[1].world_xy(v, &t).unwrap();
        let r = block.curves[2].world_xy(w, &t).unwrap();
        assert!(cross(q - p, r - p).abs() < 1e-9, "({u}, {v}, {w})");

        let solved = chart.isopleths.value(row, 0, 2).unwrap();
        assert!((solved - w).abs() < 1e-6, "row {row}: {solved} vs {w}");
    }
}

#[test]
fn generated_product_meets_its_thresholds() {
    let mut g = GeneratedBlock::new(
        func2(|u, v| u * v),
        ScaleParams::new(1.0, 10.0),
        ScaleParams::new(1.0, 10.0),
        ScaleParams::default(),
    );
    g.generator = GeneratorConfig {
        log_u: true,
        log_v: true,
        log_w: true,
        ..GeneratorConfig::default()
    };
    g.isopleths = vec![vec![Entry::Value(2.0), Entry::Value(3.0), Entry::Unknown]];
    let chart = build(&config(vec![BlockConfig::Generated(g)])).unwrap();

    let (block, report) = &chart.generator_reports[0];
    assert_eq!(*block, 0);
    assert!(report.identity_residual < 1e-6, "{report:?}");
    assert!(report.within_resolution(), "{report:?}");
    let w = chart.isopleths.value(0, 0, 2).unwrap();
    assert!((w / 6.0 - 1.0).abs() < 0.02, "w = {w}");
}

#[test]
fn chained_tags_settle_within_the_block_count() {
    let blocks = vec![
        adder(
            ScaleParams::new(0.0, 10.0),
            ScaleParams::new(0.0, 10.0),
            ScaleParams::new(0.0, 20.0).tag("s"),
            vec![vec![Entry::Value(1.0), Entry::Value(2.0), Entry::Unknown]],
        ),
        adder(
            ScaleParams::new(0.0, 20.0).tag("s"),
            ScaleParams::new(0.0, 10.0),
            ScaleParams::new(0.0, 30.0).tag("t"),
            vec![vec![Entry::Unknown, Entry::Value(3.0), Entry::Unknown]],
        ),
        BlockConfig::Ladder({
            let mut l = LadderBlock::new(
                func1(|t| t),
                func1(|x| x / 2.0),
                ScaleParams::new(0.0, 30.0).tag("t"),
                ScaleParams::new(0.0, 60.0),
            );
            l.isopleths = vec![vec![Entry::Unknown, Entry::Unknown]];
            l
        }),
    ];
    let chart = build(&config(blocks)).unwrap();
    let report = &chart.isopleths;
    assert!(report.rounds <= 3, "{} rounds", report.rounds);
    assert!(report.unresolved_rows().is_empty());
    let x = report.value(0, 2, 1).unwrap();
    assert!((x - 12.0).abs() < 1e-6, "x = {x}");
}

#[test]
fn under_determined_row_still_writes_output() {
    let rows = vec![
        vec![Entry::Value(4.0), Entry::Unknown, Entry::Unknown],
        vec![Entry::Value(4.0), Entry::Value(5.0), Entry::Unknown],
    ];
    let path = temp_path("under-determined", "svg");
    let mut cfg = config(vec![adder(
        ScaleParams::new(0.0, 10.0),
        ScaleParams::new(0.0, 10.0),
        ScaleParams::new(0.0, 20.0),
        rows,
    )]);
    cfg.filename = path.display().to_string();

    let chart = nomoru::nomogram(&cfg).unwrap();
    assert_eq!(chart.isopleths.unresolved_rows(), vec![0]);
    assert!(chart.isopleths.value(1, 0, 2).is_some_and(|w| (w - 9.0).abs() < 1e-6));
    assert!(chart.isopleths.rows[0][0].lines.is_empty());

    let svg = std::fs::read_to_string(&path).unwrap();
    assert!(svg.starts_with("<svg"));
    assert!(svg.contains("<polyline"));
    std::fs::remove_file(&path).ok();
}

#[test]
fn tag_in_one_block_is_fatal() {
    let cfg = config(vec![adder(
        ScaleParams::new(0.0, 10.0).tag("lonely"),
        ScaleParams::new(0.0, 10.0),
        ScaleParams::new(0.0, 20.0),
        Vec::new(),
    )]);
    let err = build(&cfg).unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::LonelyTag { ref tag, block: 0 }) if tag == "lonely"
    ));
}

#[test]
fn unknown_output_extension_is_fatal_before_writing() {
    let mut cfg = config(vec![adder(
        ScaleParams::new(0.0, 10.0),
        ScaleParams::new(0.0, 10.0),
        ScaleParams::new(0.0, 20.0),
        Vec::new(),
    )]);
    let path = temp_path("bad-ext", "xyz");
    cfg.filename = path.to_string_lossy().into_owned();
    let err = nomoru::nomogram(&cfg).unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::OutputFormat { .. })));
    assert!(!path.exists());
}

#[test]
fn page_fit_lands_on_the_paper() {
    let mut cfg = config(vec![adder(
        ScaleParams::new(0.0, 10.0),
        ScaleParams::new(0.0, 10.0),
        ScaleParams::new(0.0, 20.0),
        Vec::new(),
    )]);
    cfg.paper_width = 21.0;
    cfg.paper_height = 29.7;
    let chart = build(&cfg).unwrap();
    let bb = chart.wrapper.build_axes_wrapper().unwrap().bbox();
    assert!(bb.min.length() < 1e-9);
    assert!((bb.max - DVec2::new(21.0, 29.7)).length() < 1e-9);
}
