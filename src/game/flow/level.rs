use crate::game::grid::Grid2;
use crate::game::maze::Direction;

use super::boundary::{Edge, FlowBlock};

/// One level of the multigrid hierarchy.
///
/// Level `l` splits every base cell into `2^l x 2^l` sub-cells, so its grids are
/// `(2^l * base_width) x (2^l * base_height)` and its cell size is `1 / 2^l`
/// in base-grid units.
#[derive(Clone, Debug)]
pub struct FlowLevel {
    level: usize,
    refinement: usize,
    potential: Grid2<f32>,
    source: Grid2<f32>,
}

impl FlowLevel {
    pub fn new(level: usize, base_width: usize, base_height: usize) -> Self {
        let refinement = 1 << level;
        let width = base_width * refinement;
        let height = base_height * refinement;
        Self {
            level,
            refinement,
            potential: Grid2::new(width, height),
            source: Grid2::new(width, height),
        }
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// Sub-cells per base cell along each axis.
    pub fn refinement(&self) -> usize {
        self.refinement
    }

    /// Cell size in base-grid units.
    #[inline]
    pub fn delta(&self) -> f32 {
        1.0 / self.refinement as f32
    }

    pub fn width(&self) -> usize {
        self.potential.width()
    }

    pub fn height(&self) -> usize {
        self.potential.height()
    }

    pub fn potential(&self) -> &Grid2<f32> {
        &self.potential
    }

    pub fn potential_mut(&mut self) -> &mut Grid2<f32> {
        &mut self.potential
    }

    pub fn source(&self) -> &Grid2<f32> {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut Grid2<f32> {
        &mut self.source
    }

    /// Boundary condition on the `dir` edge of sub-cell `(x, y)`.
    ///
    /// Edges inside a base cell are always open; edges on a base cell boundary
    /// take the block's wall. An open edge that leads off the grid is treated
    /// as a wall with no inflow.
    #[inline]
    pub fn edge(&self, blocks: &Grid2<FlowBlock>, x: usize, y: usize, dir: Direction) -> Edge {
        let r = self.refinement;
        let on_block_edge = match dir {
            Direction::North => y % r == 0,
            Direction::South => y % r == r - 1,
            Direction::East => x % r == r - 1,
            Direction::West => x % r == 0,
        };
        if !on_block_edge {
            return Edge::Open;
        }
        let edge = blocks[(x / r, y / r)].boundary.edge(dir);
        let (dx, dy) = dir.offset();
        if edge.is_open() && !self.potential.contains(x as isize + dx, y as isize + dy) {
            return Edge::Closed { inflow: 0.0 };
        }
        edge
    }

    /// Potential seen across the `dir` edge of `(x, y)`.
    ///
    /// Across a closed wall the neighbour is synthesized as `phi - delta * inflow`,
    /// which pins the normal gradient at the wall to the configured inflow.
    #[inline]
    pub fn neighbor_value(&self, blocks: &Grid2<FlowBlock>, x: usize, y: usize, dir: Direction, phi: f32) -> f32 {
        match self.edge(blocks, x, y, dir) {
            Edge::Open => {
                let (dx, dy) = dir.offset();
                self.potential[((x as isize + dx) as usize, (y as isize + dy) as usize)]
            }
            Edge::Closed { inflow } => phi - self.delta() * inflow,
        }
    }

    /// Red-black Gauss-Seidel relaxation.
    ///
    /// On levels above 0, sub-cells of blocks whose desired level is below this
    /// level are left untouched.
    pub fn smooth(&mut self, blocks: &Grid2<FlowBlock>, passes: usize) {
        let r = self.refinement;
        let level = self.level as u8;
        let h2 = self.delta() * self.delta() * 0.25;
        let (width, height) = (self.width(), self.height());

        for _ in 0..passes {
            for parity in 0..2 {
                for y in 0..height {
                    let start = (y + parity) % 2;
                    for x in (start..width).step_by(2) {
                        if level > 0 && blocks[(x / r, y / r)].desired_level < level {
                            continue;
                        }
                        let phi = self.potential[(x, y)];
                        let sum: f32 = Direction::ALL
                            .iter()
                            .map(|&dir| self.neighbor_value(blocks, x, y, dir, phi))
                            .sum();
                        self.potential[(x, y)] = sum * 0.25 - h2 * self.source[(x, y)];
                    }
                }
            }
        }
    }

    /// Average each 2x2 block of this level's source into `coarser`'s source.
    pub fn restrict_source_into(&self, coarser: &mut FlowLevel) {
        debug_assert_eq!(coarser.level + 1, self.level, "restriction must target the next coarser level");
        for cy in 0..coarser.height() {
            for cx in 0..coarser.width() {
                let (fx, fy) = (cx * 2, cy * 2);
                let sum = self.source[(fx, fy)]
                    + self.source[(fx + 1, fy)]
                    + self.source[(fx, fy + 1)]
                    + self.source[(fx + 1, fy + 1)];
                coarser.source[(cx, cy)] = sum * 0.25;
            }
        }
    }

    /// Copy each coarse potential into its four children.
    pub fn prolongate_from(&mut self, coarser: &FlowLevel) {
        debug_assert_eq!(coarser.level + 1, self.level, "prolongation must come from the next coarser level");
        for y in 0..self.height() {
            for x in 0..self.width() {
                self.potential[(x, y)] = coarser.potential[(x / 2, y / 2)];
            }
        }
    }

    /// Remove the free additive constant by zeroing the mean potential.
    pub fn normalize(&mut self) {
        let mean = self.potential.mean();
        for value in self.potential.as_mut_slice() {
            *value -= mean;
        }
    }

    pub fn clear_source(&mut self) {
        self.source.fill(0.0);
    }
}
