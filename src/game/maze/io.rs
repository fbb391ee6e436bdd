use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::Maze;

pub const MAZE_VERSION: u32 = 1;

/// On-disk maze snapshot: wall layout plus the inflow rate its walls were solved with.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MazeData {
    pub version: u32,
    pub maze: Maze,
    pub wall_inflow: f32,
}

impl MazeData {
    pub fn new(maze: Maze, wall_inflow: f32) -> Self {
        Self {
            version: MAZE_VERSION,
            maze,
            wall_inflow,
        }
    }
}

pub fn write_maze<W: Write>(writer: W, data: &MazeData) -> Result<(), Box<dyn std::error::Error>> {
    let mut encoder = ZlibEncoder::new(writer, Compression::default());
    bincode::serialize_into(&mut encoder, data)?;
    encoder.finish()?;
    Ok(())
}

pub fn read_maze<R: Read>(reader: R) -> Result<MazeData, Box<dyn std::error::Error>> {
    let mut decoder = ZlibDecoder::new(reader);
    let data: MazeData = bincode::deserialize_from(&mut decoder)?;
    if data.version != MAZE_VERSION {
        return Err(format!("unsupported maze version {} (expected {})", data.version, MAZE_VERSION).into());
    }
    data.maze.validate().map_err(|e| format!("corrupt maze snapshot: {e}"))?;
    Ok(data)
}

pub fn save_maze(path: impl AsRef<Path>, data: &MazeData) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::create(path)?;
    write_maze(BufWriter::new(file), data)
}

pub fn load_maze(path: impl AsRef<Path>) -> Result<MazeData, Box<dyn std::error::Error>> {
    let file = File::open(path)?;
    read_maze(BufReader::new(file))
}
