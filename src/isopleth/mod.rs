//! Isopleth (index line) solving.
//!
//! Each Block carries an isopleth table: row `i` of every Block belongs to
//! the same reading. Entries start as values, points, grid pairs or
//! unknowns; the engine resolves unknowns by geometric intersection and
//! shares tagged values between Blocks until a full pass changes nothing.

mod engine;
mod solve;

pub use engine::IsoplethEngine;

use glam::DVec2;

/// One cell of an isopleth row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Entry {
    /// Known scale value.
    Value(f64),
    /// Known page point (world frame); the value stays unknown.
    Point(DVec2),
    /// Known grid coordinate `(u, v)` of a 2-variable row.
    Pair(f64, f64),
    Unknown,
}

/// Solving state of one row of one Block, indexed by member.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowState {
    pub values: Vec<Option<f64>>,
    pub pairs: Vec<Option<(f64, f64)>>,
    pub points: Vec<Option<DVec2>>,
}

impl RowState {
    pub(crate) fn new(members: usize) -> Self {
        Self {
            values: vec![None; members],
            pairs: vec![None; members],
            points: vec![None; members],
        }
    }

    pub(crate) fn seed(&mut self, entries: &[Entry]) {
        for (i, entry) in entries.iter().enumerate() {
            match *entry {
                Entry::Value(v) => self.values[i] = Some(v),
                Entry::Point(p) => self.points[i] = Some(p),
                Entry::Pair(u, v) => self.pairs[i] = Some((u, v)),
                Entry::Unknown => {}
            }
        }
    }

    fn known_points(&self) -> usize {
        self.points.iter().filter(|p| p.is_some()).count()
    }
}

/// Solved reading of one Block in one row.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockSolution {
    /// Values of the isopleth-addressable members.
    pub values: Vec<Option<f64>>,
    /// World points of the isopleth-addressable members.
    pub points: Vec<Option<DVec2>>,
    /// Drawable index-line polylines, world frame.
    pub lines: Vec<Vec<DVec2>>,
    pub complete: bool,
}

/// Outcome of the fixed-point solve. Unresolved rows are reported here,
/// never raised.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IsoplethReport {
    /// Passes that changed something.
    pub rounds: usize,
    /// `rows[row][block]`
    pub rows: Vec<Vec<BlockSolution>>,
}

impl IsoplethReport {
    /// Rows in which some Block still has unresolved entries.
    pub fn unresolved_rows(&self) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, blocks)| blocks.iter().any(|b| !b.complete))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn value(&self, row: usize, block: usize, member: usize) -> Option<f64> {
        self.rows.get(row)?.get(block)?.values.get(member).copied().flatten()
    }
}
