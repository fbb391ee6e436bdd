//! Maze wall geometry: the boundary collaborator of the flow solver.
//!
//! - **Maze**: per-cell wall flags with shared edges kept consistent
//! - **WallChange**: a single wall toggle delta, invertible
//! - **MazeMorph**: shuffled, delayed application of the deltas between two mazes
//! - **io**: compressed maze snapshots

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

mod io;
mod morph;
#[cfg(test)]
mod tests;

pub use io::{load_maze, read_maze, save_maze, write_maze, MazeData, MAZE_VERSION};
pub use morph::MazeMorph;

/// Cardinal directions of a maze cell edge. North is `-y`.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North = 0,
    South = 1,
    East = 2,
    West = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    #[inline]
    pub fn as_index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn offset(self) -> (isize, isize) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    #[inline]
    fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Read access to per-cell wall presence.
///
/// The flow solver, the clustering pass and particle integration all consult
/// walls through this trait. Edges on the outer border of the domain must
/// always report closed.
pub trait BoundaryField {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn wall_open(&self, x: usize, y: usize, dir: Direction) -> bool;
}

/// A single wall toggle between two adjacent cells.
///
/// `open` is the state the edge ends up in once the change is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WallChange {
    pub x: usize,
    pub y: usize,
    pub dir: Direction,
    pub open: bool,
}

impl WallChange {
    pub fn inverse(self) -> Self {
        Self { open: !self.open, ..self }
    }

    /// The cell on the other side of the edge, if it is inside a `width`x`height` maze.
    pub fn neighbor(self, width: usize, height: usize) -> Option<(usize, usize)> {
        let (dx, dy) = self.dir.offset();
        let nx = self.x as isize + dx;
        let ny = self.y as isize + dy;
        if nx < 0 || ny < 0 || nx as usize >= width || ny as usize >= height {
            return None;
        }
        Some((nx as usize, ny as usize))
    }
}

/// Rectangular maze of unit cells with walls on cell edges.
///
/// Each cell stores a bitmask of closed edges. Interior edges are stored twice
/// (once per adjacent cell) and every mutation keeps both copies in sync.
/// The outer border is closed and cannot be opened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maze {
    width: usize,
    height: usize,
    walls: Vec<u8>,
}

impl Maze {
    /// A maze with no interior walls; only the outer border is closed.
    pub fn open(width: usize, height: usize) -> Self {
        assert!(width > 0 && height > 0, "maze must have at least one cell");
        let mut walls = vec![0u8; width * height];
        for y in 0..height {
            for x in 0..width {
                let cell = &mut walls[y * width + x];
                if y == 0 {
                    *cell |= Direction::North.bit();
                }
                if y == height - 1 {
                    *cell |= Direction::South.bit();
                }
                if x == width - 1 {
                    *cell |= Direction::East.bit();
                }
                if x == 0 {
                    *cell |= Direction::West.bit();
                }
            }
        }
        Self { width, height, walls }
    }

    /// A maze with every edge closed.
    pub fn closed(width: usize, height: usize) -> Self {
        assert!(width > 0 && height > 0, "maze must have at least one cell");
        let all = Direction::ALL.iter().fold(0u8, |bits, dir| bits | dir.bit());
        Self {
            width,
            height,
            walls: vec![all; width * height],
        }
    }

    /// Random perfect maze (depth-first backtracker) with an extra fraction
    /// `openness` of the remaining interior walls knocked out to form loops.
    pub fn generate<R: Rng + ?Sized>(width: usize, height: usize, openness: f32, rng: &mut R) -> Self {
        let mut maze = Self::closed(width, height);
        let mut visited = vec![false; width * height];
        let mut stack = vec![(0usize, 0usize)];
        visited[0] = true;

        while let Some(&(x, y)) = stack.last() {
            let mut dirs = Direction::ALL;
            dirs.shuffle(rng);
            let next = dirs.into_iter().find_map(|dir| {
                let change = WallChange { x, y, dir, open: true };
                let (nx, ny) = change.neighbor(width, height)?;
                (!visited[ny * width + nx]).then_some((change, nx, ny))
            });
            match next {
                Some((change, nx, ny)) => {
                    maze.apply(change);
                    visited[ny * width + nx] = true;
                    stack.push((nx, ny));
                }
                None => {
                    stack.pop();
                }
            }
        }

        for change in maze.diff(&Self::open(width, height)) {
            if rng.random::<f32>() < openness {
                maze.apply(change);
            }
        }
        maze
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_closed(&self, x: usize, y: usize, dir: Direction) -> bool {
        self.walls[y * self.width + x] & dir.bit() != 0
    }

    /// Set the wall on one edge, mirroring the change onto the neighbouring cell.
    ///
    /// Returns `true` if anything changed. Border edges stay closed.
    pub fn set_wall(&mut self, x: usize, y: usize, dir: Direction, closed: bool) -> bool {
        self.apply(WallChange { x, y, dir, open: !closed })
    }

    pub fn apply(&mut self, change: WallChange) -> bool {
        let Some((nx, ny)) = change.neighbor(self.width, self.height) else {
            return false;
        };
        if self.is_closed(change.x, change.y, change.dir) != change.open {
            return false;
        }

        let here = change.y * self.width + change.x;
        let there = ny * self.width + nx;
        let back = change.dir.opposite();
        if change.open {
            self.walls[here] &= !change.dir.bit();
            self.walls[there] &= !back.bit();
        } else {
            self.walls[here] |= change.dir.bit();
            self.walls[there] |= back.bit();
        }
        true
    }

    /// Check the structural invariants: non-empty, one wall mask per cell,
    /// closed outer border and both copies of every interior edge in agreement.
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("empty maze {}x{}", self.width, self.height));
        }
        if self.walls.len() != self.width * self.height {
            return Err(format!(
                "{} wall masks for a {}x{} maze",
                self.walls.len(),
                self.width,
                self.height
            ));
        }
        for y in 0..self.height {
            for x in 0..self.width {
                for dir in Direction::ALL {
                    let change = WallChange { x, y, dir, open: false };
                    match change.neighbor(self.width, self.height) {
                        None if !self.is_closed(x, y, dir) => {
                            return Err(format!("border edge {dir:?} of ({x}, {y}) is open"));
                        }
                        Some((nx, ny)) if self.is_closed(x, y, dir) != self.is_closed(nx, ny, dir.opposite()) => {
                            return Err(format!("edge {dir:?} of ({x}, {y}) disagrees with ({nx}, {ny})"));
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    /// The interior edges whose state differs from `target`.
    ///
    /// Each edge appears once (reported from its west or north cell).
    pub fn diff(&self, target: &Maze) -> Vec<WallChange> {
        assert_eq!(
            (self.width, self.height),
            (target.width, target.height),
            "cannot diff mazes of different size"
        );
        let mut changes = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                for dir in [Direction::East, Direction::South] {
                    let change = WallChange { x, y, dir, open: !target.is_closed(x, y, dir) };
                    if change.neighbor(self.width, self.height).is_none() {
                        continue;
                    }
                    if self.is_closed(x, y, dir) != target.is_closed(x, y, dir) {
                        changes.push(change);
                    }
                }
            }
        }
        changes
    }
}

impl BoundaryField for Maze {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn wall_open(&self, x: usize, y: usize, dir: Direction) -> bool {
        !self.is_closed(x, y, dir)
    }
}
