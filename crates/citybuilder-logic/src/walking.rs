//! Walking paths and incremental progress along them.
//!
//! A [`WalkingPath`] is immutable once computed. A walker owns a
//! [`PathProgress`] and feeds it distance every tick; the point index
//! advances once the accumulated distance crosses a segment's length.

use serde::{Deserialize, Serialize};

use crate::grid::{MapQuery, Point};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkingPath {
    points: Vec<Point>,
    length: f32,
}

impl WalkingPath {
    /// Build a path from an ordered point list. Panics in debug on an empty list.
    pub fn new(points: Vec<Point>) -> Self {
        debug_assert!(!points.is_empty(), "walking path needs at least one point");
        let length = points.windows(2).map(|w| w[0].distance(&w[1])).sum();
        Self { points, length }
    }

    /// Zero-length path for a walker already standing at its goal
    pub fn single(point: Point) -> Self {
        Self {
            points: vec![point],
            length: 0.0,
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Total length in grid units
    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn start(&self) -> Point {
        self.points.first().copied().unwrap_or_default()
    }

    pub fn end(&self) -> Point {
        self.points.last().copied().unwrap_or_default()
    }

    pub fn segment_length(&self, index: usize) -> f32 {
        match (self.points.get(index), self.points.get(index + 1)) {
            (Some(a), Some(b)) => a.distance(b),
            _ => 0.0,
        }
    }

    /// Nearest grid cell `offset` units into segment `index`
    pub fn point_along(&self, index: usize, offset: f32) -> Point {
        let (Some(a), Some(b)) = (self.points.get(index), self.points.get(index + 1)) else {
            return self.end();
        };
        let length = a.distance(b);
        if length <= 0.0 {
            return *a;
        }
        let t = (offset / length).clamp(0.0, 1.0);
        Point::new(
            a.x + ((b.x - a.x) as f32 * t).round() as i32,
            a.y + ((b.y - a.y) as f32 * t).round() as i32,
        )
    }

    /// Same points walked backwards (the way home)
    pub fn reversed(&self) -> Self {
        let mut points = self.points.clone();
        points.reverse();
        Self {
            points,
            length: self.length,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Moving,
    Arrived,
}

/// How far a walker has come along its current path
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PathProgress {
    /// Index of the last point passed
    pub index: usize,
    /// Distance covered inside the current segment
    pub segment_walked: f32,
    /// Total distance covered; never exceeds the path length
    pub walked: f32,
}

impl PathProgress {
    pub fn is_finished(&self, path: &WalkingPath) -> bool {
        self.index + 1 >= path.len()
    }

    /// Consume `distance` along the path
    pub fn advance(&mut self, path: &WalkingPath, distance: f32) -> StepOutcome {
        self.advance_through(path, distance, |_| {})
    }

    /// Like [`advance`](Self::advance), calling `reached` with every grid
    /// cell reached on the way, in order. Long segments report the whole
    /// cells crossed between their end points.
    pub fn advance_through(
        &mut self,
        path: &WalkingPath,
        distance: f32,
        mut reached: impl FnMut(Point),
    ) -> StepOutcome {
        let mut remaining = distance.max(0.0);
        while remaining > 0.0 && !self.is_finished(path) {
            let length = path.segment_length(self.index);
            let left = length - self.segment_walked;
            let crosses = remaining >= left;
            let to = if crosses {
                length
            } else {
                self.segment_walked + remaining
            };
            let mut cell = self.segment_walked.floor() + 1.0;
            while cell <= to && cell < length {
                reached(path.point_along(self.index, cell));
                cell += 1.0;
            }

            if crosses {
                remaining -= left;
                self.walked += left;
                self.index += 1;
                self.segment_walked = 0.0;
                reached(self.current_point(path));
            } else {
                self.walked += remaining;
                self.segment_walked = to;
                remaining = 0.0;
            }
        }
        self.walked = self.walked.min(path.length());
        if self.is_finished(path) {
            StepOutcome::Arrived
        } else {
            StepOutcome::Moving
        }
    }

    /// The grid point the walker currently occupies
    pub fn current_point(&self, path: &WalkingPath) -> Point {
        path.points()
            .get(self.index)
            .copied()
            .unwrap_or_else(|| path.end())
    }

    pub fn next_point(&self, path: &WalkingPath) -> Option<Point> {
        path.points().get(self.index + 1).copied()
    }

    /// Interpolated world position, for visuals only
    pub fn world_position(&self, path: &WalkingPath, map: &impl MapQuery) -> (f32, f32) {
        let from = map.to_world(self.current_point(path));
        let Some(next) = self.next_point(path) else {
            return from;
        };
        let to = map.to_world(next);
        let segment = path.segment_length(self.index);
        let t = if segment > 0.0 {
            (self.segment_walked / segment).clamp(0.0, 1.0)
        } else {
            0.0
        };
        (from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TileMap;

    fn three_point_path() -> WalkingPath {
        WalkingPath::new(vec![Point::new(0, 0), Point::new(3, 0), Point::new(3, 3)])
    }

    #[test]
    fn test_length() {
        assert!((three_point_path().length() - 6.0).abs() < f32::EPSILON);
        assert_eq!(WalkingPath::single(Point::new(2, 2)).length(), 0.0);
    }

    #[test]
    fn test_reaches_end_on_third_tick() {
        let path = three_point_path();
        let mut progress = PathProgress::default();

        assert_eq!(progress.advance(&path, 2.0), StepOutcome::Moving);
        assert_eq!(progress.current_point(&path), Point::new(0, 0));
        assert_eq!(progress.advance(&path, 2.0), StepOutcome::Moving);
        assert_eq!(progress.current_point(&path), Point::new(3, 0));
        assert_eq!(progress.advance(&path, 2.0), StepOutcome::Arrived);
        assert_eq!(progress.current_point(&path), Point::new(3, 3));
        assert!((progress.walked - 6.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_walked_never_exceeds_length() {
        let path = three_point_path();
        let mut progress = PathProgress::default();
        for _ in 0..10 {
            progress.advance(&path, 2.5);
            assert!(progress.walked <= path.length() + 2.5);
            assert!(progress.walked <= path.length());
        }
        assert!(progress.is_finished(&path));
    }

    #[test]
    fn test_advance_through_reports_every_point() {
        let path = WalkingPath::new((0..7).map(|x| Point::new(x, 0)).collect());
        let mut progress = PathProgress::default();
        let mut reached = Vec::new();

        progress.advance_through(&path, 3.0, |p| reached.push(p));
        assert_eq!(reached, vec![Point::new(1, 0), Point::new(2, 0), Point::new(3, 0)]);

        reached.clear();
        progress.advance_through(&path, 0.5, |p| reached.push(p));
        assert!(reached.is_empty());
        progress.advance_through(&path, 10.0, |p| reached.push(p));
        assert_eq!(reached.first(), Some(&Point::new(4, 0)));
        assert_eq!(reached.last(), Some(&Point::new(6, 0)));
        assert_eq!(reached.len(), 3);
    }

    #[test]
    fn test_advance_through_long_segment() {
        let path = WalkingPath::new(vec![Point::new(0, 0), Point::new(6, 0)]);
        let mut progress = PathProgress::default();
        let mut reached = Vec::new();

        progress.advance_through(&path, 3.0, |p| reached.push(p));
        assert_eq!(reached, vec![Point::new(1, 0), Point::new(2, 0), Point::new(3, 0)]);
        assert_eq!(progress.current_point(&path), Point::new(0, 0));

        reached.clear();
        assert_eq!(
            progress.advance_through(&path, 3.0, |p| reached.push(p)),
            StepOutcome::Arrived
        );
        assert_eq!(
            reached,
            vec![Point::new(4, 0), Point::new(5, 0), Point::new(6, 0)]
        );
    }

    #[test]
    fn test_single_point_path_is_finished() {
        let path = WalkingPath::single(Point::new(1, 1));
        let mut progress = PathProgress::default();
        assert!(progress.is_finished(&path));
        assert_eq!(progress.advance(&path, 1.0), StepOutcome::Arrived);
    }

    #[test]
    fn test_world_position_interpolates() {
        let map = TileMap::new(10, 10);
        let path = WalkingPath::new(vec![Point::new(0, 0), Point::new(1, 0)]);
        let mut progress = PathProgress::default();
        progress.advance(&path, 0.5);
        let (x, y) = progress.world_position(&path, &map);
        assert!((x - 1.0).abs() < 0.001);
        assert!((y - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_reversed() {
        let path = three_point_path().reversed();
        assert_eq!(path.start(), Point::new(3, 3));
        assert_eq!(path.end(), Point::new(0, 0));
    }
}
