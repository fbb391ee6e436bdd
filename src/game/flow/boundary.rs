use serde::{Deserialize, Serialize};

use crate::game::maze::Direction;

/// Boundary condition on one edge of a base cell.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Edge {
    Open,
    /// Solid wall with a Neumann condition: flow of `inflow` drawn in through the wall.
    Closed { inflow: f32 },
}

impl Edge {
    #[inline]
    pub fn is_open(self) -> bool {
        matches!(self, Edge::Open)
    }
}

/// The four edge conditions of one base cell, indexed by [`Direction`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WallBoundary {
    edges: [Edge; 4],
}

impl WallBoundary {
    pub const OPEN: WallBoundary = WallBoundary { edges: [Edge::Open; 4] };

    #[inline]
    pub fn edge(&self, dir: Direction) -> Edge {
        self.edges[dir.as_index()]
    }

    #[inline]
    pub fn is_open(&self, dir: Direction) -> bool {
        self.edge(dir).is_open()
    }

    pub fn set_edge(&mut self, dir: Direction, edge: Edge) {
        self.edges[dir.as_index()] = edge;
    }
}

impl Default for WallBoundary {
    fn default() -> Self {
        Self::OPEN
    }
}

/// Solver record for one base cell: its walls and how fine to solve it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowBlock {
    pub boundary: WallBoundary,
    /// Finest level at which this cell is relaxed (0 = coarse only).
    pub desired_level: u8,
}
