//! Distance-bounded A* over walkable grid cells.
//!
//! The search is confined to the Manhattan diamond of radius `max_distance`
//! around the start, so an unreachable goal costs at most that area.

use ::pathfinding::prelude::astar;

use crate::grid::{MapQuery, PathType, Point};
use crate::structures::StructureIndex;
use crate::walking::WalkingPath;

/// Find a 4-connected path from `start` to `goal` of at most `max_distance` steps.
///
/// `start` itself does not need to be walkable (walkers leave through
/// building entrances); every other cell, including `goal`, does.
/// Returns `None` when no such path exists.
pub fn find_path(
    start: Point,
    goal: Point,
    max_distance: u32,
    walkable: impl Fn(Point) -> bool,
) -> Option<WalkingPath> {
    if start == goal {
        return Some(WalkingPath::single(start));
    }
    if start.manhattan(&goal) > max_distance {
        return None;
    }

    let (points, cost) = astar(
        &start,
        |p| {
            p.neighbors()
                .into_iter()
                .filter(|n| start.manhattan(n) <= max_distance && walkable(*n))
                .map(|n| (n, 1u32))
                .collect::<Vec<_>>()
        },
        |p| p.manhattan(&goal),
        |p| *p == goal,
    )?;

    if cost > max_distance {
        return None;
    }
    Some(WalkingPath::new(points))
}

/// [`find_path`] using structure walkability for the given path type
pub fn find_grid_path(
    map: &impl MapQuery,
    index: &StructureIndex,
    start: Point,
    goal: Point,
    max_distance: u32,
    path_type: PathType,
) -> Option<WalkingPath> {
    find_path(start, goal, max_distance, |p| {
        index.is_walkable(map, p, path_type)
    })
}

/// Walkable orthogonal neighbours of `point`
pub fn walkable_neighbors(point: Point, walkable: impl Fn(Point) -> bool) -> Vec<Point> {
    point
        .neighbors()
        .into_iter()
        .filter(|n| walkable(*n))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{MapBounds, TileMap};
    use crate::structures::{StructureRegistry, StructureSpec};

    fn open(map: &TileMap) -> impl Fn(Point) -> bool + '_ {
        move |p| map.is_passable(p)
    }

    #[test]
    fn test_same_point() {
        let map = TileMap::new(5, 5);
        let path = find_path(Point::new(1, 1), Point::new(1, 1), 0, open(&map)).unwrap();
        assert_eq!(path.len(), 1);
    }

    #[test]
    fn test_straight_line() {
        let map = TileMap::new(10, 10);
        let path = find_path(Point::new(0, 0), Point::new(4, 0), 10, open(&map)).unwrap();
        assert_eq!(path.len(), 5);
        assert!((path.length() - 4.0).abs() < 0.001);
    }

    #[test]
    fn test_detour_around_wall() {
        let mut map = TileMap::new(10, 10);
        for y in 0..4 {
            map.block(Point::new(2, y));
        }
        let path = find_path(Point::new(0, 0), Point::new(4, 0), 20, open(&map)).unwrap();
        assert!(path.points().iter().all(|p| p.x != 2 || p.y >= 4));
        assert_eq!(path.len(), 13);
    }

    #[test]
    fn test_max_distance_limits_detour() {
        let mut map = TileMap::new(10, 10);
        for y in 0..4 {
            map.block(Point::new(2, y));
        }
        assert!(find_path(Point::new(0, 0), Point::new(4, 0), 8, open(&map)).is_none());
        assert!(find_path(Point::new(0, 0), Point::new(9, 9), 5, open(&map)).is_none());
    }

    #[test]
    fn test_unreachable_goal() {
        let mut map = TileMap::new(5, 5);
        map.block(Point::new(4, 4));
        assert!(find_path(Point::new(0, 0), Point::new(4, 4), 20, open(&map)).is_none());
    }

    #[test]
    fn test_road_only_paths() {
        let map = TileMap::new(10, 10);
        let mut reg = StructureRegistry::new(MapBounds::new(10, 10));
        reg.add(StructureSpec::road(
            (0..5).map(|x| Point::new(x, 0)).collect(),
        ));

        let path = find_grid_path(
            &map,
            reg.index(),
            Point::new(0, 0),
            Point::new(4, 0),
            10,
            PathType::Road,
        );
        assert!(path.is_some());

        let off_road = find_grid_path(
            &map,
            reg.index(),
            Point::new(0, 0),
            Point::new(4, 1),
            10,
            PathType::Road,
        );
        assert!(off_road.is_none());
    }

    #[test]
    fn test_walkable_neighbors() {
        let mut map = TileMap::new(3, 3);
        map.block(Point::new(1, 2));
        let neighbors = walkable_neighbors(Point::new(1, 1), open(&map));
        assert_eq!(neighbors.len(), 3);
        assert!(!neighbors.contains(&Point::new(1, 2)));
    }
}
