//! Roaming memory and next-step selection.
//!
//! Roamers wander without a destination. They remember a bounded FIFO of
//! recently visited points and prefer unvisited neighbours, only walking
//! back the way they came when nothing else is open.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::grid::Point;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoamingMemory {
    capacity: usize,
    visited: VecDeque<Point>,
}

impl RoamingMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            visited: VecDeque::with_capacity(capacity),
        }
    }

    /// Record a visit; an already-remembered point moves to the newest slot
    pub fn remember(&mut self, point: Point) {
        if self.capacity == 0 {
            return;
        }
        if let Some(pos) = self.visited.iter().position(|p| *p == point) {
            self.visited.remove(pos);
        }
        self.visited.push_back(point);
        while self.visited.len() > self.capacity {
            self.visited.pop_front();
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        self.visited.contains(&point)
    }

    /// 0 for the oldest remembered point
    pub fn age_rank(&self, point: Point) -> Option<usize> {
        self.visited.iter().position(|p| *p == point)
    }

    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }

    pub fn clear(&mut self) {
        self.visited.clear();
    }
}

/// Pick the next point for a roamer standing on `current`.
///
/// Order of preference:
/// 1. walkable neighbours not in memory and not `previous` (chosen with `roll`)
/// 2. remembered neighbours other than `previous`, least recently visited first
/// 3. `previous` (dead end)
///
/// `roll(n)` must return an index in `0..n`.
pub fn choose_next_step(
    current: Point,
    previous: Option<Point>,
    memory: &RoamingMemory,
    walkable: impl Fn(Point) -> bool,
    mut roll: impl FnMut(usize) -> usize,
) -> Option<Point> {
    let candidates: Vec<Point> = current
        .neighbors()
        .into_iter()
        .filter(|p| walkable(*p))
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let fresh: Vec<Point> = candidates
        .iter()
        .copied()
        .filter(|p| Some(*p) != previous && !memory.contains(*p))
        .collect();
    if !fresh.is_empty() {
        let pick = roll(fresh.len()).min(fresh.len() - 1);
        return Some(fresh[pick]);
    }

    let stale = candidates
        .iter()
        .copied()
        .filter(|p| Some(*p) != previous)
        .min_by_key(|p| memory.age_rank(*p).unwrap_or(0));
    stale.or(previous.filter(|p| candidates.contains(p)))
}
