//! Grid primitives: points, map bounds, level masks and the map query capability.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Integer grid coordinate
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ZERO: Self = Self { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Grid (taxicab) distance, used for cheap range rejection
    pub fn manhattan(&self, other: &Point) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }

    /// Straight-line distance
    pub fn distance(&self, other: &Point) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    /// The four orthogonal neighbours, in a fixed order (E, N, W, S)
    pub fn neighbors(&self) -> [Point; 4] {
        [
            Point::new(self.x + 1, self.y),
            Point::new(self.x, self.y + 1),
            Point::new(self.x - 1, self.y),
            Point::new(self.x, self.y - 1),
        ]
    }

    /// All points of a `width` x `height` rectangle with this point as its minimum corner
    pub fn rect(&self, width: i32, height: i32) -> Vec<Point> {
        let mut points = Vec::with_capacity((width.max(0) * height.max(0)) as usize);
        for dy in 0..height {
            for dx in 0..width {
                points.push(Point::new(self.x + dx, self.y + dy));
            }
        }
        points
    }
}

impl std::ops::Add for Point {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

/// Two level masks interact iff either is zero (wildcard) or they share a bit.
pub fn check_levels(a: u32, b: u32) -> bool {
    a == 0 || b == 0 || a & b != 0
}

/// Map extents; points are valid in `[0, width) x [0, height)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapBounds {
    pub width: i32,
    pub height: i32,
}

impl MapBounds {
    pub fn new(width: i32, height: i32) -> Self {
        debug_assert!(width >= 0 && height >= 0, "negative map size");
        Self { width, height }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= 0 && point.y >= 0 && point.x < self.width && point.y < self.height
    }
}

/// Traversal rules a walker uses when asking for a path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathType {
    /// Any passable cell not covered by a blocking structure
    #[default]
    Map,
    /// Only cells carrying a road structure
    Road,
}

/// Spatial capability supplied by whatever hosts the simulation.
///
/// The core never owns terrain; it only asks whether a cell exists,
/// whether the ground itself can be walked, and where it sits in world space.
pub trait MapQuery {
    fn bounds(&self) -> MapBounds;

    /// Terrain-level passability, ignoring structures
    fn is_passable(&self, point: Point) -> bool;

    /// Cell centre in world units
    fn to_world(&self, point: Point) -> (f32, f32);

    fn contains(&self, point: Point) -> bool {
        self.bounds().contains(point)
    }
}

/// Plain rectangular tile map with impassable terrain cells (water, cliffs)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileMap {
    pub bounds: MapBounds,
    pub cell_size: f32,
    pub blocked: BTreeSet<Point>,
}

impl TileMap {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            bounds: MapBounds::new(width, height),
            cell_size: 1.0,
            blocked: BTreeSet::new(),
        }
    }

    pub fn with_cell_size(mut self, cell_size: f32) -> Self {
        self.cell_size = cell_size;
        self
    }

    pub fn block(&mut self, point: Point) {
        self.blocked.insert(point);
    }

    pub fn unblock(&mut self, point: Point) {
        self.blocked.remove(&point);
    }
}

impl MapQuery for TileMap {
    fn bounds(&self) -> MapBounds {
        self.bounds
    }

    fn is_passable(&self, point: Point) -> bool {
        self.bounds.contains(point) && !self.blocked.contains(&point)
    }

    fn to_world(&self, point: Point) -> (f32, f32) {
        (
            (point.x as f32 + 0.5) * self.cell_size,
            (point.y as f32 + 0.5) * self.cell_size,
        )
    }
}
