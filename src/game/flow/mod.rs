//! Adaptive multigrid Poisson solver producing the per-population flow field.
//!
//! The potential `phi` satisfies a discrete Poisson equation whose right-hand
//! side is the source grid (negative = attraction, positive = repulsion) and
//! whose walls carry a Neumann inflow condition. Particles move along `+grad phi`.
//!
//! # Solve
//!
//! One V-cycle per tick over a flat stack of levels `0..=L`:
//!
//! 1. Restrict the finest source down to level 0 (2x2 averages)
//! 2. Relax level 0 with many passes, then subtract its mean
//! 3. For each finer level: prolongate (copy coarse to children), relax a few passes
//!
//! Relaxation above level 0 only touches base cells whose desired level
//! reaches that level, so full-resolution work is paid only where particles are.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::game::grid::Grid2;
use crate::game::maze::{BoundaryField, Direction, WallChange};

mod boundary;
mod level;
#[cfg(test)]
mod tests;

pub use boundary::{Edge, FlowBlock, WallBoundary};
pub use level::FlowLevel;

/// Fixed relaxation budget of the solver.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverParams {
    /// Relaxation passes on the coarsest level.
    pub coarse_passes: usize,
    /// Relaxation passes on each finer level after prolongation.
    pub fine_passes: usize,
    /// Inflow rate assigned to every closed wall.
    pub wall_inflow: f32,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            coarse_passes: 24,
            fine_passes: 3,
            wall_inflow: 0.5,
        }
    }
}

/// Multigrid hierarchy for one population.
#[derive(Clone, Debug)]
pub struct Flow {
    blocks: Grid2<FlowBlock>,
    levels: Vec<FlowLevel>,
    params: SolverParams,
    raise_scratch: Vec<(usize, usize)>,
}

impl Flow {
    /// Allocate levels `0..=max_level` over a `base_width`x`base_height` grid with every
    /// interior edge open and the outer border closed.
    pub fn new(base_width: usize, base_height: usize, max_level: usize, params: SolverParams) -> Self {
        assert!(base_width > 0 && base_height > 0, "flow grid must have at least one cell");
        let levels = (0..=max_level)
            .map(|level| FlowLevel::new(level, base_width, base_height))
            .collect();
        let mut flow = Self {
            blocks: Grid2::new(base_width, base_height),
            levels,
            params,
            raise_scratch: Vec::new(),
        };
        let closed = flow.closed_edge();
        for y in 0..base_height {
            for x in 0..base_width {
                for dir in Direction::ALL {
                    let (dx, dy) = dir.offset();
                    if !flow.blocks.contains(x as isize + dx, y as isize + dy) {
                        flow.blocks[(x, y)].boundary.set_edge(dir, closed);
                    }
                }
            }
        }
        flow
    }

    pub fn from_boundary(field: &dyn BoundaryField, max_level: usize, params: SolverParams) -> Self {
        let mut flow = Self::new(field.width(), field.height(), max_level, params);
        flow.sync_boundary(field);
        flow
    }

    fn closed_edge(&self) -> Edge {
        Edge::Closed { inflow: self.params.wall_inflow }
    }

    fn edge_for(&self, open: bool) -> Edge {
        if open {
            Edge::Open
        } else {
            self.closed_edge()
        }
    }

    /// Rebuild every block's boundary from `field`.
    pub fn sync_boundary(&mut self, field: &dyn BoundaryField) {
        assert_eq!(
            (field.width(), field.height()),
            (self.base_width(), self.base_height()),
            "boundary field does not match the flow grid"
        );
        for y in 0..self.base_height() {
            for x in 0..self.base_width() {
                for dir in Direction::ALL {
                    let edge = self.edge_for(field.wall_open(x, y, dir));
                    self.blocks[(x, y)].boundary.set_edge(dir, edge);
                }
            }
        }
        debug!("[FLOW] Boundary synced for {}x{} blocks", self.base_width(), self.base_height());
    }

    /// Apply a single wall toggle to both blocks sharing the edge.
    pub fn apply_wall_change(&mut self, change: WallChange) {
        let Some((nx, ny)) = change.neighbor(self.base_width(), self.base_height()) else {
            warn!("[FLOW] Ignoring wall change on the outer border at ({}, {})", change.x, change.y);
            return;
        };
        let edge = self.edge_for(change.open);
        self.blocks[(change.x, change.y)].boundary.set_edge(change.dir, edge);
        self.blocks[(nx, ny)].boundary.set_edge(change.dir.opposite(), edge);
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    pub fn base_width(&self) -> usize {
        self.blocks.width()
    }

    pub fn base_height(&self) -> usize {
        self.blocks.height()
    }

    pub fn max_level(&self) -> usize {
        self.levels.len() - 1
    }

    /// Sub-cells per base cell on the finest level.
    pub fn refinement(&self) -> usize {
        self.finest().refinement()
    }

    pub fn block(&self, x: usize, y: usize) -> &FlowBlock {
        &self.blocks[(x, y)]
    }

    pub fn blocks(&self) -> &Grid2<FlowBlock> {
        &self.blocks
    }

    pub fn set_desired_level(&mut self, x: usize, y: usize, level: u8) {
        self.blocks[(x, y)].desired_level = level.min(self.max_level() as u8);
    }

    pub fn level(&self, level: usize) -> &FlowLevel {
        &self.levels[level]
    }

    pub fn level_mut(&mut self, level: usize) -> &mut FlowLevel {
        &mut self.levels[level]
    }

    pub fn finest(&self) -> &FlowLevel {
        &self.levels[self.levels.len() - 1]
    }

    pub fn finest_mut(&mut self) -> &mut FlowLevel {
        let last = self.levels.len() - 1;
        &mut self.levels[last]
    }

    /// Finest-level source grid that contributors write into this tick.
    pub fn source_mut(&mut self) -> &mut Grid2<f32> {
        self.finest_mut().source_mut()
    }

    pub fn clear_source(&mut self) {
        for level in &mut self.levels {
            level.clear_source();
        }
    }

    /// Refresh the level-of-detail hints from per-base-cell particle counts.
    ///
    /// Occupied cells get the finest level; empty cells decay by one level per
    /// call. Each occupied cell then raises its open neighbours to the finest
    /// level so sampling near a cell edge sees a consistently refined field.
    pub fn update_desired_levels(&mut self, occupancy: &Grid2<u16>) {
        debug_assert_eq!(occupancy.width(), self.base_width());
        debug_assert_eq!(occupancy.height(), self.base_height());
        let finest = self.max_level() as u8;
        let (width, height) = (self.base_width(), self.base_height());

        self.raise_scratch.clear();
        for y in 0..height {
            for x in 0..width {
                let block = &mut self.blocks[(x, y)];
                if occupancy[(x, y)] == 0 {
                    block.desired_level = block.desired_level.saturating_sub(1);
                    continue;
                }
                block.desired_level = finest;
                for dir in Direction::ALL {
                    let (nx, ny) = (x as isize + dir.offset().0, y as isize + dir.offset().1);
                    let inside = nx >= 0 && ny >= 0 && (nx as usize) < width && (ny as usize) < height;
                    if inside && block.boundary.is_open(dir) {
                        self.raise_scratch.push((nx as usize, ny as usize));
                    }
                }
            }
        }
        for &(x, y) in &self.raise_scratch {
            self.blocks[(x, y)].desired_level = finest;
        }
    }

    /// Run one V-cycle.
    pub fn solve(&mut self) {
        let params = self.params;
        for level in (1..self.levels.len()).rev() {
            let (coarser, finer) = self.levels.split_at_mut(level);
            finer[0].restrict_source_into(&mut coarser[level - 1]);
        }

        let blocks = &self.blocks;
        self.levels[0].smooth(blocks, params.coarse_passes);
        self.levels[0].normalize();

        for level in 1..self.levels.len() {
            let (coarser, finer) = self.levels.split_at_mut(level);
            finer[0].prolongate_from(&coarser[level - 1]);
            finer[0].smooth(blocks, params.fine_passes);
        }
    }

    /// Finest sub-cell containing `pos` (base-grid units).
    #[inline]
    pub fn fine_cell(&self, pos: Vec2) -> (usize, usize) {
        let fine = self.finest();
        let r = fine.refinement() as f32;
        let fx = ((pos.x * r).max(0.0) as usize).min(fine.width() - 1);
        let fy = ((pos.y * r).max(0.0) as usize).min(fine.height() - 1);
        (fx, fy)
    }

    /// Flow velocity at `pos`, the finest-level gradient of the potential.
    ///
    /// Uses a centred difference across the neighbouring sub-cells. Across a
    /// closed wall the missing neighbour is the synthesized ghost value, which
    /// reduces to `0.5 * (one-sided difference - inflow)` along that axis.
    pub fn velocity(&self, pos: Vec2) -> Vec2 {
        let (fx, fy) = self.fine_cell(pos);
        self.velocity_at_cell(fx, fy)
    }

    pub fn velocity_at_cell(&self, fx: usize, fy: usize) -> Vec2 {
        let fine = self.finest();
        let blocks = &self.blocks;
        let phi = fine.potential()[(fx, fy)];
        let east = fine.neighbor_value(blocks, fx, fy, Direction::East, phi);
        let west = fine.neighbor_value(blocks, fx, fy, Direction::West, phi);
        let south = fine.neighbor_value(blocks, fx, fy, Direction::South, phi);
        let north = fine.neighbor_value(blocks, fx, fy, Direction::North, phi);
        let two_delta = 2.0 * fine.delta();
        Vec2::new((east - west) / two_delta, (south - north) / two_delta)
    }
}
