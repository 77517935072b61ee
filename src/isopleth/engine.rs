//! Fixed-point iteration over every row of every Block.

use std::collections::HashMap;

use crate::block::{Block, Member};
use crate::errors::GeometryError;
use crate::log::{debug, warn};
use crate::scale::ScaleCurve;

use super::solve::{BlockGeometry, index_lines, solve_row};
use super::{BlockSolution, IsoplethReport, RowState};

/// Upper bound on update passes. Every productive pass resolves at least
/// one unknown, so this only trips on a pathological tag cycle.
pub const MAX_ROUNDS: usize = 100;

/// Resolves isopleth tables of Blocks in their final frame.
pub struct IsoplethEngine<'a> {
    geometry: Vec<BlockGeometry<'a>>,
    /// `states[row][block]`
    states: Vec<Vec<RowState>>,
    /// Per row: tag → value in the aligned-to scale's units.
    tags: Vec<HashMap<String, f64>>,
    rounds: usize,
}

impl<'a> IsoplethEngine<'a> {
    /// Sample every Block's curves and seed row states from the tables.
    pub fn new(blocks: &'a [Block]) -> Result<Self, GeometryError> {
        let geometry = blocks.iter().map(BlockGeometry::new).collect::<Result<Vec<_>, _>>()?;
        let rows = blocks.iter().map(|b| b.isopleths.len()).max().unwrap_or(0);
        let states = (0..rows)
            .map(|row| {
                blocks
                    .iter()
                    .map(|b| {
                        let mut state = RowState::new(b.members.len());
                        if let Some(entries) = b.isopleths.get(row) {
                            state.seed(entries);
                        }
                        state
                    })
                    .collect()
            })
            .collect();
        debug!("isopleth engine: {} blocks, {rows} rows", blocks.len());
        Ok(Self {
            geometry,
            states,
            tags: vec![HashMap::new(); rows],
            rounds: 0,
        })
    }

    /// Solve each Block on its own entries, then publish tagged values.
    pub fn find_initial_solutions(&mut self) -> Result<bool, GeometryError> {
        let mut changed = false;
        for row in 0..self.states.len() {
            for block in 0..self.geometry.len() {
                changed |= solve_row(&self.geometry[block], &mut self.states[row][block])?;
                self.publish(row, block);
            }
        }
        Ok(changed)
    }

    /// One pass: pull shared values in, solve, publish. Returns whether
    /// anything changed.
    pub fn update_solutions(&mut self) -> Result<bool, GeometryError> {
        let mut changed = false;
        for row in 0..self.states.len() {
            for block in 0..self.geometry.len() {
                changed |= self.pull(row, block)?;
                changed |= solve_row(&self.geometry[block], &mut self.states[row][block])?;
                self.publish(row, block);
            }
        }
        Ok(changed)
    }

    /// Iterate to the fixed point and collect the report.
    pub fn solve(mut self) -> Result<IsoplethReport, GeometryError> {
        self.find_initial_solutions()?;
        while self.update_solutions()? {
            self.rounds += 1;
            debug!("isopleth round {}: {} rows complete", self.rounds, self.complete_rows());
            if self.rounds >= MAX_ROUNDS {
                warn!("isopleth engine: stopped after {MAX_ROUNDS} rounds");
                break;
            }
        }
        let report = self.report();
        for row in report.unresolved_rows() {
            warn!("isopleth row {row} is under-determined; drawing what is known");
        }
        Ok(report)
    }

    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    fn complete_rows(&self) -> usize {
        self.states
            .iter()
            .filter(|blocks| {
                blocks
                    .iter()
                    .zip(&self.geometry)
                    .all(|(state, geo)| {
                        state.points[..geo.block.inputs].iter().all(Option::is_some)
                    })
            })
            .count()
    }

    fn tagged(&self, block: usize) -> impl Iterator<Item = (usize, &'a ScaleCurve)> + '_ {
        let b = self.geometry[block].block;
        b.members[..b.inputs].iter().enumerate().filter_map(move |(i, m)| match *m {
            Member::Curve(c) if b.curves[c].tag.is_some() || b.curves[c].dtag.is_some() => {
                Some((i, &b.curves[c]))
            }
            _ => None,
        })
    }

    fn publish(&mut self, row: usize, block: usize) {
        let found: Vec<(String, f64)> = self
            .tagged(block)
            .filter_map(|(i, curve)| {
                let v = self.states[row][block].values[i]?;
                let canonical = curve.aligned_value(v);
                Some(tag_keys(curve).map(move |t| (t, canonical)))
            })
            .flatten()
            .collect();
        let tags = &mut self.tags[row];
        for (tag, value) in found {
            tags.entry(tag).or_insert(value);
        }
    }

    fn pull(&mut self, row: usize, block: usize) -> Result<bool, GeometryError> {
        let wanted: Vec<(usize, &'a ScaleCurve, f64)> = self
            .tagged(block)
            .filter(|(i, _)| self.states[row][block].values[*i].is_none())
            .filter_map(|(i, curve)| {
                let value = tag_keys(curve).find_map(|t| self.tags[row].get(&t).copied())?;
                Some((i, curve, value))
            })
            .collect();
        let mut changed = false;
        for (i, curve, canonical) in wanted {
            match curve.from_aligned(canonical)? {
                Some(v) => {
                    self.states[row][block].values[i] = Some(v);
                    changed = true;
                }
                None => {
                    warn!(
                        "isopleth row {row}: shared value {canonical} is outside \
                         block {block}'s scale"
                    );
                }
            }
        }
        Ok(changed)
    }

    fn report(&self) -> IsoplethReport {
        let rows = self
            .states
            .iter()
            .map(|blocks| {
                blocks
                    .iter()
                    .zip(&self.geometry)
                    .map(|(state, geo)| {
                        let n = geo.block.inputs;
                        let points = state.points[..n].to_vec();
                        BlockSolution {
                            values: state.values[..n].to_vec(),
                            complete: points.iter().all(Option::is_some),
                            points,
                            lines: index_lines(geo.block, state),
                        }
                    })
                    .collect()
            })
            .collect();
        IsoplethReport {
            rounds: self.rounds,
            rows,
        }
    }
}

fn tag_keys(curve: &ScaleCurve) -> impl Iterator<Item = String> + '_ {
    curve.tag.iter().chain(curve.dtag.iter()).cloned()
}
