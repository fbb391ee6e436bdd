//! Per-tick density clustering of one population.
//!
//! Particles are binned into a subdivided occupancy grid (independent of the
//! solver's refinement), connected occupied cells are merged with a union-find
//! pass in row-major order, and every occupied cell is scored by the
//! log-compressed size of its cluster.
//!
//! Usage per tick: [`Clusters::reset`], any number of [`Clusters::add_point`],
//! one [`Clusters::build`], then score queries.

use bevy::prelude::*;
use fixedbitset::FixedBitSet;

use crate::game::grid::Grid2;
use crate::game::maze::{BoundaryField, Direction};

mod arena;
#[cfg(test)]
mod tests;

pub use arena::{ClusterArena, ClusterId};

pub const MAX_SCORE: u8 = 100;

/// Share of the whole population whose cluster maps to [`MAX_SCORE`].
pub const FULL_SCORE_FRACTION: f32 = 0.8;

/// Already-visited neighbours examined during the row-major scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScanLink {
    West,
    North,
    NorthWest,
    NorthEast,
}

impl ScanLink {
    const ALL: [ScanLink; 4] = [ScanLink::West, ScanLink::North, ScanLink::NorthWest, ScanLink::NorthEast];

    fn offset(self) -> (isize, isize) {
        match self {
            ScanLink::West => (-1, 0),
            ScanLink::North => (0, -1),
            ScanLink::NorthWest => (-1, -1),
            ScanLink::NorthEast => (1, -1),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Clusters {
    subdivision: usize,
    counts: Grid2<u16>,
    labels: Grid2<Option<ClusterId>>,
    sizes: Grid2<u32>,
    occupied: FixedBitSet,
    arena: ClusterArena,
    total: u32,
    scale: f32,
    built: bool,
}

impl Clusters {
    /// Clustering grid over a `base_width`x`base_height` maze with `subdivision`
    /// cells per base cell along each axis.
    pub fn new(base_width: usize, base_height: usize, subdivision: usize) -> Self {
        assert!(subdivision > 0, "cluster subdivision must be at least 1");
        let width = base_width * subdivision;
        let height = base_height * subdivision;
        Self {
            subdivision,
            counts: Grid2::new(width, height),
            labels: Grid2::new(width, height),
            sizes: Grid2::new(width, height),
            occupied: FixedBitSet::with_capacity(width * height),
            arena: ClusterArena::with_capacity(width * height / 4),
            total: 0,
            scale: 0.0,
            built: false,
        }
    }

    pub fn subdivision(&self) -> usize {
        self.subdivision
    }

    /// Number of points added since the last reset.
    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Clear occupancy and union-find state. Only touched cells are visited.
    pub fn reset(&mut self) {
        for idx in self.occupied.ones() {
            self.counts.as_mut_slice()[idx] = 0;
            self.labels.as_mut_slice()[idx] = None;
            self.sizes.as_mut_slice()[idx] = 0;
        }
        self.occupied.clear();
        self.arena.clear();
        self.total = 0;
        self.scale = 0.0;
        self.built = false;
    }

    #[inline]
    fn cell_of(&self, pos: Vec2) -> (usize, usize) {
        let s = self.subdivision as f32;
        let cx = ((pos.x * s).max(0.0) as usize).min(self.counts.width() - 1);
        let cy = ((pos.y * s).max(0.0) as usize).min(self.counts.height() - 1);
        (cx, cy)
    }

    pub fn add_point(&mut self, pos: Vec2) {
        debug_assert!(!self.built, "add_point called after build; reset first");
        let (cx, cy) = self.cell_of(pos);
        let idx = self.counts.index_of(cx, cy);
        let count = &mut self.counts.as_mut_slice()[idx];
        *count = count.saturating_add(1);
        self.occupied.insert(idx);
        self.total += 1;
    }

    /// Merge connected occupied cells and resolve every cell's cluster size.
    pub fn build(&mut self, boundary: &dyn BoundaryField) {
        debug_assert!(!self.built, "build called twice without reset");
        let Self {
            subdivision,
            counts,
            labels,
            sizes,
            occupied,
            arena,
            ..
        } = self;
        let subdivision = *subdivision;
        let width = counts.width();

        for idx in occupied.ones() {
            let (cx, cy) = (idx % width, idx / width);
            let mut label: Option<ClusterId> = None;

            for link in ScanLink::ALL {
                let (dx, dy) = link.offset();
                let (nx, ny) = (cx as isize + dx, cy as isize + dy);
                if !counts.contains(nx, ny) {
                    continue;
                }
                let neighbor = counts.index_of(nx as usize, ny as usize);
                if !occupied.contains(neighbor) || !linked(boundary, subdivision, cx, cy, link) {
                    continue;
                }
                let Some(neighbor_label) = labels.as_slice()[neighbor] else {
                    continue;
                };
                label = Some(match label {
                    None => arena.find(neighbor_label),
                    Some(current) => arena.union(current, neighbor_label),
                });
            }

            let count = counts.as_slice()[idx] as u32;
            let id = match label {
                Some(id) => {
                    arena.add_size(id, count);
                    id
                }
                None => arena.create(count),
            };
            labels.as_mut_slice()[idx] = Some(id);
        }

        for idx in occupied.ones() {
            if let Some(id) = labels.as_slice()[idx] {
                sizes.as_mut_slice()[idx] = arena.size(id);
            }
        }

        let full = self.total as f32 * FULL_SCORE_FRACTION;
        self.scale = if full > 1.0 { MAX_SCORE as f32 / full.ln() } else { 0.0 };
        self.built = true;
    }

    /// Resolved size of the cluster owning the cell at `pos` (0 if the cell is empty).
    pub fn cluster_size_at(&self, pos: Vec2) -> u32 {
        debug_assert!(self.built, "cluster queries are only valid after build");
        let (cx, cy) = self.cell_of(pos);
        self.sizes[(cx, cy)]
    }

    /// Crowding score of the cell at `pos`.
    pub fn score_at(&self, pos: Vec2) -> u8 {
        self.score_for_size(self.cluster_size_at(pos))
    }

    /// `round(scale * ln(size))` clipped to `0..=100`.
    pub fn score_for_size(&self, size: u32) -> u8 {
        if size <= 1 {
            return 0;
        }
        (self.scale * (size as f32).ln()).round().clamp(0.0, MAX_SCORE as f32) as u8
    }

    /// Number of distinct clusters after build.
    pub fn cluster_count(&mut self) -> usize {
        debug_assert!(self.built, "cluster queries are only valid after build");
        let mut roots: Vec<ClusterId> = self
            .occupied
            .ones()
            .filter_map(|idx| self.labels.as_slice()[idx])
            .collect();
        for root in &mut roots {
            *root = self.arena.find(*root);
        }
        roots.sort_unstable();
        roots.dedup();
        roots.len()
    }
}

/// Whether the edge of cluster cell `(cx, cy)` toward `dir` is passable.
///
/// Edges inside one base cell are always passable; edges on a base cell
/// boundary follow the maze wall.
fn passable(boundary: &dyn BoundaryField, subdivision: usize, cx: usize, cy: usize, dir: Direction) -> bool {
    let s = subdivision;
    let crosses_block = match dir {
        Direction::North => cy % s == 0,
        Direction::South => cy % s == s - 1,
        Direction::East => cx % s == s - 1,
        Direction::West => cx % s == 0,
    };
    !crosses_block || boundary.wall_open(cx / s, cy / s, dir)
}

/// Connectivity between `(cx, cy)` and its already-scanned neighbour along `link`.
///
/// A diagonal link needs an open L-shaped path through one of the two
/// orthogonal neighbours, so a solid corner never joins two clusters.
fn linked(boundary: &dyn BoundaryField, s: usize, cx: usize, cy: usize, link: ScanLink) -> bool {
    match link {
        ScanLink::West => passable(boundary, s, cx, cy, Direction::West),
        ScanLink::North => passable(boundary, s, cx, cy, Direction::North),
        ScanLink::NorthWest => {
            let via_west = passable(boundary, s, cx, cy, Direction::West)
                && passable(boundary, s, cx - 1, cy, Direction::North);
            let via_north = passable(boundary, s, cx, cy, Direction::North)
                && passable(boundary, s, cx, cy - 1, Direction::West);
            via_west || via_north
        }
        ScanLink::NorthEast => {
            let via_east = passable(boundary, s, cx, cy, Direction::East)
                && passable(boundary, s, cx + 1, cy, Direction::North);
            let via_north = passable(boundary, s, cx, cy, Direction::North)
                && passable(boundary, s, cx, cy - 1, Direction::East);
            via_east || via_north
        }
    }
}
