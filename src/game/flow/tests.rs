use super::*;
use crate::game::maze::Maze;

fn open_flow(width: usize, height: usize, max_level: usize) -> Flow {
    Flow::from_boundary(&Maze::open(width, height), max_level, SolverParams::default())
}

fn refine_everywhere(flow: &mut Flow) {
    let finest = flow.max_level() as u8;
    for y in 0..flow.base_height() {
        for x in 0..flow.base_width() {
            flow.set_desired_level(x, y, finest);
        }
    }
}

#[test]
fn test_coarsest_mean_is_zero_after_solve() {
    let mut flow = open_flow(6, 4, 2);
    refine_everywhere(&mut flow);
    let mut rng = fastrand::Rng::with_seed(11);
    for _ in 0..40 {
        let source = flow.source_mut();
        let x = rng.usize(..source.width());
        let y = rng.usize(..source.height());
        source[(x, y)] += rng.f32() * 20.0 - 10.0;
    }

    for _ in 0..3 {
        flow.solve();
        let mean = flow.level(0).potential().mean();
        assert!(mean.abs() < 1e-4, "coarsest mean should be ~0, got {mean}");
    }
}

#[test]
fn test_restriction_averages_children() {
    let mut flow = open_flow(2, 2, 1);
    {
        let source = flow.source_mut();
        source[(0, 0)] = 4.0;
        source[(1, 0)] = 2.0;
        source[(0, 1)] = 1.0;
        source[(1, 1)] = 1.0;
    }
    flow.solve();
    assert_eq!(flow.level(0).source()[(0, 0)], 2.0);
    assert_eq!(flow.level(0).source()[(1, 1)], 0.0);
}

#[test]
fn test_velocity_next_to_wall_uses_one_sided_inflow_formula() {
    let mut maze = Maze::open(3, 3);
    maze.set_wall(1, 1, Direction::East, true);
    let mut flow = Flow::from_boundary(&maze, 1, SolverParams { wall_inflow: 0.8, ..Default::default() });

    // Arbitrary non-trivial potential on the finest level.
    {
        let fine = flow.finest_mut().potential_mut();
        for y in 0..fine.height() {
            for x in 0..fine.width() {
                fine[(x, y)] = (x * x) as f32 * 0.3 + y as f32 * 0.1;
            }
        }
    }

    // Sub-cell (3, 2) is the east half of base cell (1, 1): its east edge is the wall.
    let (fx, fy) = (3, 2);
    let delta = 0.5;
    let fine = flow.finest().potential();
    let phi = fine[(fx, fy)];
    let phi_west = fine[(fx - 1, fy)];
    let phi_east = fine[(fx + 1, fy)];

    let velocity = flow.velocity_at_cell(fx, fy);
    let one_sided = 0.5 * ((phi - phi_west) / delta - 0.8);
    let symmetric = (phi_east - phi_west) / (2.0 * delta);

    assert!((velocity.x - one_sided).abs() < 1e-5, "expected {one_sided}, got {}", velocity.x);
    assert!((velocity.x - symmetric).abs() > 1e-3, "wall cell must not use the symmetric difference");

    // The vertical component away from walls stays symmetric.
    let expected_y = (fine[(fx, fy + 1)] - fine[(fx, fy - 1)]) / (2.0 * delta);
    assert!((velocity.y - expected_y).abs() < 1e-5);
}

#[test]
fn test_wall_inflow_pushes_away_from_border() {
    let mut flow = open_flow(5, 5, 2);
    refine_everywhere(&mut flow);
    for _ in 0..10 {
        flow.solve();
    }

    let near_west = flow.velocity(Vec2::new(0.05, 2.5));
    let near_east = flow.velocity(Vec2::new(4.95, 2.5));
    let near_north = flow.velocity(Vec2::new(2.5, 0.05));
    let near_south = flow.velocity(Vec2::new(2.5, 4.95));
    assert!(near_west.x > 0.0, "flow at the west border should point east, got {near_west:?}");
    assert!(near_east.x < 0.0, "flow at the east border should point west, got {near_east:?}");
    assert!(near_north.y > 0.0, "flow at the north border should point south, got {near_north:?}");
    assert!(near_south.y < 0.0, "flow at the south border should point north, got {near_south:?}");
}

#[test]
fn test_attraction_source_pulls_flow_toward_it() {
    let mut flow = open_flow(8, 8, 1);
    refine_everywhere(&mut flow);
    for _ in 0..30 {
        flow.clear_source();
        let (fx, fy) = flow.fine_cell(Vec2::new(4.25, 4.25));
        flow.source_mut()[(fx, fy)] = -400.0;
        flow.solve();
    }

    let left = flow.velocity(Vec2::new(2.75, 4.25));
    let right = flow.velocity(Vec2::new(5.75, 4.25));
    assert!(left.x > 0.0, "left of the attractor flow should point right, got {left:?}");
    assert!(right.x < 0.0, "right of the attractor flow should point left, got {right:?}");
}

#[test]
fn test_unrefined_blocks_keep_prolongated_values() {
    let mut flow = open_flow(4, 4, 1);
    flow.set_desired_level(1, 1, 1);
    {
        let source = flow.source_mut();
        source[(2, 2)] = 50.0;
        source[(6, 6)] = -50.0;
    }
    flow.solve();

    let coarse = flow.level(0).potential();
    let fine = flow.finest().potential();
    // Block (3, 3) was never refined: its children equal the coarse value.
    for (fx, fy) in [(6, 6), (7, 6), (6, 7), (7, 7)] {
        assert_eq!(fine[(fx, fy)], coarse[(3, 3)]);
    }
    // Block (1, 1) was relaxed at the fine level.
    let refined_differs = [(2, 2), (3, 2), (2, 3), (3, 3)]
        .iter()
        .any(|&(fx, fy)| fine[(fx, fy)] != coarse[(1, 1)]);
    assert!(refined_differs, "refined block should have been smoothed");
}

#[test]
fn test_desired_levels_propagate_through_open_edges_only() {
    let mut maze = Maze::open(3, 3);
    maze.set_wall(1, 1, Direction::East, true);
    let mut flow = Flow::from_boundary(&maze, 2, SolverParams::default());

    let mut occupancy = Grid2::<u16>::new(3, 3);
    occupancy[(1, 1)] = 4;
    flow.update_desired_levels(&occupancy);

    assert_eq!(flow.block(1, 1).desired_level, 2);
    assert_eq!(flow.block(0, 1).desired_level, 2, "west neighbour is open");
    assert_eq!(flow.block(1, 0).desired_level, 2, "north neighbour is open");
    assert_eq!(flow.block(2, 1).desired_level, 0, "east neighbour is behind a wall");
    assert_eq!(flow.block(0, 0).desired_level, 0, "diagonals are not raised");

    occupancy[(1, 1)] = 0;
    flow.update_desired_levels(&occupancy);
    assert_eq!(flow.block(1, 1).desired_level, 1, "empty cells decay one level per update");
}

#[test]
fn test_wall_change_and_inverse_restore_boundaries() {
    let maze = Maze::open(4, 4);
    let mut flow = Flow::from_boundary(&maze, 1, SolverParams { wall_inflow: 0.3, ..Default::default() });
    let before: Vec<FlowBlock> = flow.blocks().as_slice().to_vec();

    let change = WallChange { x: 2, y: 1, dir: Direction::South, open: false };
    flow.apply_wall_change(change);
    assert_eq!(flow.block(2, 1).boundary.edge(Direction::South), Edge::Closed { inflow: 0.3 });
    assert_eq!(flow.block(2, 2).boundary.edge(Direction::North), Edge::Closed { inflow: 0.3 });

    flow.apply_wall_change(change.inverse());
    assert_eq!(flow.blocks().as_slice(), before.as_slice());
}

#[test]
fn test_border_wall_change_is_ignored() {
    let mut flow = open_flow(2, 2, 0);
    let before: Vec<FlowBlock> = flow.blocks().as_slice().to_vec();
    flow.apply_wall_change(WallChange { x: 0, y: 0, dir: Direction::West, open: true });
    assert_eq!(flow.blocks().as_slice(), before.as_slice());
}
