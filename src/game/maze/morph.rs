use bevy::prelude::*;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::VecDeque;

use super::{Maze, WallChange};

/// Incremental transition from one maze layout to another.
///
/// The wall deltas between the two layouts are shuffled once and then released
/// one at a time, with `delay_ticks` sub-steps between consecutive changes, so
/// the flow solver never sees more than one topology change per step.
#[derive(Debug, Clone, Default)]
pub struct MazeMorph {
    pending: VecDeque<WallChange>,
    delay_ticks: u32,
    countdown: u32,
}

impl MazeMorph {
    pub fn new<R: Rng + ?Sized>(current: &Maze, target: &Maze, delay_ticks: u32, rng: &mut R) -> Self {
        let mut changes = current.diff(target);
        changes.shuffle(rng);
        info!("[MAZE] Morph scheduled: {} wall changes, {} ticks apart", changes.len(), delay_ticks);
        Self {
            pending: changes.into(),
            delay_ticks,
            countdown: 0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Advance one sub-step, returning the change to apply now if the delay elapsed.
    pub fn step(&mut self) -> Option<WallChange> {
        if self.pending.is_empty() {
            return None;
        }
        if self.countdown > 0 {
            self.countdown -= 1;
            return None;
        }
        self.countdown = self.delay_ticks;
        let change = self.pending.pop_front();
        if self.pending.is_empty() {
            debug!("[MAZE] Morph complete");
        }
        change
    }
}
