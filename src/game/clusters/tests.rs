use super::*;
use crate::game::maze::Maze;

/// Centre of cluster cell `(cx, cy)` with subdivision 2.
fn cell_center(cx: usize, cy: usize) -> Vec2 {
    Vec2::new(cx as f32 * 0.5 + 0.25, cy as f32 * 0.5 + 0.25)
}

fn build_with(maze: &Maze, cells: &[(usize, usize)]) -> Clusters {
    let mut clusters = Clusters::new(maze.width(), maze.height(), 2);
    for &(cx, cy) in cells {
        clusters.add_point(cell_center(cx, cy));
    }
    clusters.build(maze);
    clusters
}

#[test]
fn test_isolated_particle_scores_zero() {
    let maze = Maze::open(6, 6);
    let clusters = build_with(&maze, &[(0, 0), (5, 5), (5, 6), (6, 5), (6, 6)]);
    assert_eq!(clusters.cluster_size_at(cell_center(0, 0)), 1);
    assert_eq!(clusters.score_at(cell_center(0, 0)), 0, "an isolated particle always scores 0");
    assert_eq!(clusters.cluster_size_at(cell_center(6, 6)), 4);
    assert!(clusters.score_at(cell_center(6, 6)) > 0);
}

#[test]
fn test_orthogonal_neighbors_merge_inside_open_maze() {
    let maze = Maze::open(4, 4);
    let mut clusters = build_with(&maze, &[(1, 1), (2, 1), (2, 2), (5, 5)]);
    assert_eq!(clusters.cluster_size_at(cell_center(1, 1)), 3);
    assert_eq!(clusters.cluster_size_at(cell_center(2, 2)), 3);
    assert_eq!(clusters.cluster_size_at(cell_center(5, 5)), 1);
    assert_eq!(clusters.cluster_count(), 2);
}

#[test]
fn test_wall_separates_adjacent_cells() {
    let mut maze = Maze::open(4, 4);
    // Cluster cells (1, 2) and (2, 2) sit in base cells (0, 1) and (1, 1).
    maze.set_wall(0, 1, Direction::East, true);
    let clusters = build_with(&maze, &[(1, 2), (2, 2)]);
    assert_eq!(clusters.cluster_size_at(cell_center(1, 2)), 1);
    assert_eq!(clusters.cluster_size_at(cell_center(2, 2)), 1);

    // Cells inside one base cell are never separated.
    let clusters = build_with(&maze, &[(0, 2), (1, 2)]);
    assert_eq!(clusters.cluster_size_at(cell_center(0, 2)), 2);
}

#[test]
fn test_diagonal_needs_an_open_path_around_the_corner() {
    // Cluster cells (1, 1) and (2, 2) touch at the corner shared by base cells
    // (0, 0), (1, 0), (0, 1), (1, 1).
    let mut maze = Maze::open(2, 2);
    let open = build_with(&maze, &[(1, 1), (2, 2)]);
    assert_eq!(open.cluster_size_at(cell_center(2, 2)), 2, "open corner joins diagonals");

    // One wall on the corner still leaves an L-shaped path.
    maze.set_wall(0, 0, Direction::East, true);
    let one_wall = build_with(&maze, &[(1, 1), (2, 2)]);
    assert_eq!(one_wall.cluster_size_at(cell_center(2, 2)), 2);

    // A straight wall through the corner pinches it shut.
    maze.set_wall(0, 1, Direction::East, true);
    let pinched = build_with(&maze, &[(1, 1), (2, 2)]);
    assert_eq!(pinched.cluster_size_at(cell_center(2, 2)), 1);
    assert_eq!(pinched.cluster_size_at(cell_center(1, 1)), 1);
}

#[test]
fn test_north_east_diagonal_merges_separate_labels() {
    let maze = Maze::open(4, 4);
    // (3, 0) and (1, 0) are only joined once (2, 1) links them through NE and NW.
    let clusters = build_with(&maze, &[(1, 0), (3, 0), (2, 1)]);
    assert_eq!(clusters.cluster_size_at(cell_center(1, 0)), 3);
    assert_eq!(clusters.cluster_size_at(cell_center(3, 0)), 3);
}

#[test]
fn test_long_chain_resolves_without_recursion() {
    let maze = Maze::open(400, 1);
    let cells: Vec<(usize, usize)> = (0..800).rev().map(|cx| (cx, 1)).collect();
    let clusters = build_with(&maze, &cells);
    assert_eq!(clusters.cluster_size_at(cell_center(0, 1)), 800);
    assert_eq!(clusters.cluster_size_at(cell_center(799, 1)), 800);
}

#[test]
fn test_size_grows_monotonically_as_connected_cells_are_added() {
    let maze = Maze::open(8, 8);
    let mut rng = fastrand::Rng::with_seed(3);
    let anchor = (8, 8);
    let mut cells = vec![anchor];
    let mut previous = 0;

    for _ in 0..60 {
        // Grow by a random step from a random existing cell.
        let (bx, by) = cells[rng.usize(..cells.len())];
        let nx = (bx as isize + rng.isize(-1..=1)).clamp(0, 15) as usize;
        let ny = (by as isize + rng.isize(-1..=1)).clamp(0, 15) as usize;
        cells.push((nx, ny));

        let clusters = build_with(&maze, &cells);
        let size = clusters.cluster_size_at(cell_center(anchor.0, anchor.1));
        assert!(size >= previous, "size shrank from {previous} to {size}");
        assert_eq!(size as usize, cells.len(), "every added cell touches the cluster");
        previous = size;
    }
}

#[test]
fn test_score_is_monotonic_in_size_and_saturates() {
    let maze = Maze::open(10, 10);
    let mut clusters = Clusters::new(10, 10, 2);
    for i in 0..100 {
        clusters.add_point(cell_center(i % 20, i / 20));
    }
    clusters.build(&maze);

    let mut previous = 0;
    for size in 1..=100 {
        let score = clusters.score_for_size(size);
        assert!(score >= previous, "score dropped at size {size}");
        previous = score;
    }
    assert_eq!(clusters.score_for_size(80), MAX_SCORE, "80% of the population maps to the top score");
    assert_eq!(clusters.score_for_size(100), MAX_SCORE);
    assert!(clusters.score_for_size(10) < MAX_SCORE);
}

#[test]
fn test_reset_clears_previous_tick() {
    let maze = Maze::open(4, 4);
    let mut clusters = build_with(&maze, &[(1, 1), (1, 2)]);
    assert_eq!(clusters.total(), 2);

    clusters.reset();
    assert_eq!(clusters.total(), 0);
    assert!(!clusters.is_built());
    clusters.add_point(cell_center(6, 6));
    clusters.build(&maze);
    assert_eq!(clusters.cluster_size_at(cell_center(1, 1)), 0);
    assert_eq!(clusters.cluster_size_at(cell_center(6, 6)), 1);
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "only valid after build")]
fn test_querying_before_build_is_a_contract_violation() {
    let mut clusters = Clusters::new(2, 2, 2);
    clusters.add_point(Vec2::new(0.5, 0.5));
    clusters.score_at(Vec2::new(0.5, 0.5));
}
