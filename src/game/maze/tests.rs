use super::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn test_open_maze_has_closed_border_only() {
    let maze = Maze::open(3, 2);
    assert!(maze.is_closed(0, 0, Direction::North));
    assert!(maze.is_closed(0, 0, Direction::West));
    assert!(maze.is_closed(2, 1, Direction::East));
    assert!(maze.is_closed(2, 1, Direction::South));
    assert!(maze.wall_open(0, 0, Direction::East));
    assert!(maze.wall_open(1, 0, Direction::South));
}

#[test]
fn test_set_wall_mirrors_onto_neighbor() {
    let mut maze = Maze::open(3, 3);
    assert!(maze.set_wall(1, 1, Direction::East, true));
    assert!(maze.is_closed(2, 1, Direction::West), "neighbour should see the same wall");

    assert!(!maze.set_wall(1, 1, Direction::East, true), "closing a closed wall is not a change");
    assert!(maze.set_wall(2, 1, Direction::West, false));
    assert!(maze.wall_open(1, 1, Direction::East));
}

#[test]
fn test_border_cannot_be_opened() {
    let mut maze = Maze::open(2, 2);
    let changed = maze.apply(WallChange { x: 0, y: 0, dir: Direction::North, open: true });
    assert!(!changed);
    assert!(maze.is_closed(0, 0, Direction::North));
}

#[test]
fn test_change_then_inverse_restores_maze() {
    let original = Maze::open(4, 4);
    let mut maze = original.clone();
    let change = WallChange { x: 1, y: 2, dir: Direction::South, open: false };

    assert!(maze.apply(change));
    assert_ne!(maze, original);
    assert!(maze.apply(change.inverse()));
    assert_eq!(maze, original);
}

#[test]
fn test_diff_reports_each_edge_once() {
    let current = Maze::open(4, 4);
    let mut target = current.clone();
    target.set_wall(1, 1, Direction::East, true);
    target.set_wall(2, 2, Direction::North, true);

    let changes = current.diff(&target);
    assert_eq!(changes.len(), 2);
    assert!(changes.iter().all(|c| !c.open));

    let mut replayed = current.clone();
    for change in changes {
        assert!(replayed.apply(change));
    }
    assert_eq!(replayed, target);
}

#[test]
fn test_morph_applies_one_change_per_delay() {
    let current = Maze::open(4, 4);
    let mut target = current.clone();
    target.set_wall(0, 0, Direction::East, true);
    target.set_wall(0, 1, Direction::East, true);
    target.set_wall(0, 2, Direction::East, true);

    let mut rng = StdRng::seed_from_u64(7);
    let mut morph = MazeMorph::new(&current, &target, 2, &mut rng);
    let mut maze = current.clone();
    let mut applied_at = Vec::new();
    for step in 0..20 {
        if let Some(change) = morph.step() {
            assert!(maze.apply(change));
            applied_at.push(step);
        }
    }

    assert!(morph.is_done());
    assert_eq!(maze, target);
    assert_eq!(applied_at, vec![0, 3, 6], "changes should be spaced by the delay");
}

#[test]
fn test_snapshot_survives_write_and_read() {
    let mut maze = Maze::open(5, 3);
    maze.set_wall(2, 1, Direction::South, true);
    let data = MazeData::new(maze, 0.75);

    let mut bytes = Vec::new();
    write_maze(&mut bytes, &data).expect("write should succeed");
    let loaded = read_maze(bytes.as_slice()).expect("read should succeed");

    assert_eq!(loaded, data);
}

#[test]
fn test_snapshot_rejects_unknown_version() {
    let mut data = MazeData::new(Maze::open(2, 2), 0.5);
    data.version = MAZE_VERSION + 1;

    let mut bytes = Vec::new();
    write_maze(&mut bytes, &data).expect("write should succeed");
    assert!(read_maze(bytes.as_slice()).is_err());
}

#[test]
fn test_generated_maze_is_connected_with_closed_border() {
    let mut rng = StdRng::seed_from_u64(42);
    let maze = Maze::generate(9, 6, 0.1, &mut rng);

    for x in 0..9 {
        assert!(maze.is_closed(x, 0, Direction::North));
        assert!(maze.is_closed(x, 5, Direction::South));
    }
    for y in 0..6 {
        assert!(maze.is_closed(0, y, Direction::West));
        assert!(maze.is_closed(8, y, Direction::East));
    }

    let mut seen = vec![false; 9 * 6];
    let mut queue = vec![(0usize, 0usize)];
    seen[0] = true;
    while let Some((x, y)) = queue.pop() {
        for dir in Direction::ALL {
            let Some((nx, ny)) = (WallChange { x, y, dir, open: true }).neighbor(9, 6) else {
                continue;
            };
            if maze.wall_open(x, y, dir) && !seen[ny * 9 + nx] {
                seen[ny * 9 + nx] = true;
                queue.push((nx, ny));
            }
        }
    }
    assert!(seen.iter().all(|&s| s), "every cell should be reachable from the origin");
}

fn encode(maze: Maze) -> Vec<u8> {
    let mut bytes = Vec::new();
    write_maze(&mut bytes, &MazeData::new(maze, 0.5)).expect("write should succeed");
    bytes
}

#[test]
fn test_snapshot_rejects_truncated_walls() {
    let broken = Maze { width: 5, height: 5, walls: vec![0; 3] };
    let err = read_maze(encode(broken).as_slice()).expect_err("truncated walls must not load");
    assert!(err.to_string().contains("corrupt maze snapshot"), "unexpected error: {err}");
}

#[test]
fn test_validate_rejects_open_border_and_one_sided_edges() {
    let mut open_border = Maze::open(3, 3);
    open_border.walls[0] &= !Direction::North.bit();
    assert!(open_border.validate().is_err());
    assert!(read_maze(encode(open_border).as_slice()).is_err());

    let mut one_sided = Maze::open(3, 3);
    one_sided.walls[4] |= Direction::East.bit();
    assert!(one_sided.validate().is_err(), "(1, 1) East closed but (2, 1) West open");

    let empty = Maze { width: 0, height: 4, walls: Vec::new() };
    assert!(empty.validate().is_err());
}

#[test]
fn test_well_formed_mazes_validate() {
    let mut rng = StdRng::seed_from_u64(8);
    assert!(Maze::open(4, 2).validate().is_ok());
    assert!(Maze::closed(3, 3).validate().is_ok());
    assert!(Maze::generate(7, 5, 0.3, &mut rng).validate().is_ok());
}
