use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Dense row-major 2D array.
///
/// Every layer of the simulation stores its per-cell data in one of these:
/// solver potential and source grids, per-population occupancy counts,
/// cluster occupancy, and the combat kill grid. Indexing is `(x, y)` with
/// `x` the column and `y` the row; row 0 is the north edge of the maze.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Grid2<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T: Copy + Default> Grid2<T> {
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, T::default())
    }
}

impl<T: Copy> Grid2<T> {
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn index_of(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.width && y < self.height, "grid index ({x}, {y}) out of {}x{}", self.width, self.height);
        y * self.width + x
    }

    /// Whether a signed coordinate falls inside the grid.
    #[inline]
    pub fn contains(&self, x: isize, y: isize) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T: Copy> Index<(usize, usize)> for Grid2<T> {
    type Output = T;

    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &T {
        &self.data[self.index_of(x, y)]
    }
}

impl<T: Copy> IndexMut<(usize, usize)> for Grid2<T> {
    #[inline]
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut T {
        let idx = self.index_of(x, y);
        &mut self.data[idx]
    }
}

impl Grid2<f32> {
    pub fn sum(&self) -> f32 {
        self.data.iter().sum()
    }

    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.sum() / self.data.len() as f32
    }

    /// Add `value` to a cell given signed coordinates, ignoring cells outside the grid.
    #[inline]
    pub fn add_clipped(&mut self, x: isize, y: isize, value: f32) {
        if self.contains(x, y) {
            self[(x as usize, y as usize)] += value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_layout() {
        let mut grid = Grid2::<u16>::new(3, 2);
        grid[(2, 1)] = 7;
        assert_eq!(grid.as_slice()[5], 7, "(2, 1) should be the last element of a 3x2 grid");
        assert_eq!(grid[(2, 1)], 7);
        assert_eq!(grid.len(), 6);
    }

    #[test]
    fn test_add_clipped_ignores_outside_cells() {
        let mut grid = Grid2::<f32>::new(2, 2);
        grid.add_clipped(-1, 0, 5.0);
        grid.add_clipped(0, 2, 5.0);
        grid.add_clipped(1, 1, 2.5);
        assert_eq!(grid.sum(), 2.5);
        assert!(!grid.contains(2, 0));
        assert!(grid.contains(1, 1));
    }
}
