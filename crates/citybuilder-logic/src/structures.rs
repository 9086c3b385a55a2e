//! Structures occupying grid cells, the point index, and the registry that owns them.
//!
//! The [`StructureIndex`] only holds back-references (id, level, walkability)
//! per point. Ownership lives in [`StructureRegistry`], which keeps the index
//! in sync on add, partial removal and reload.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::grid::{check_levels, MapBounds, MapQuery, PathType, Point};

/// Stable structure identifier
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct StructureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructureKind {
    Building,
    Road,
    /// Terrain features such as rocks or trees
    Obstacle,
    Decoration,
}

/// Anything that occupies grid cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub id: StructureId,
    pub key: String,
    pub kind: StructureKind,
    pub points: BTreeSet<Point>,
    pub destructible: bool,
    pub walkable: bool,
    /// Level bitmask; 0 collides with everything
    pub level: u32,
}

impl Structure {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn contains(&self, point: Point) -> bool {
        self.points.contains(&point)
    }

    /// Remove the given points, returning how many were actually part of the structure
    pub fn remove_points(&mut self, points: &[Point]) -> usize {
        points.iter().filter(|p| self.points.remove(p)).count()
    }
}

/// Parameters for a new structure; the registry assigns the id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureSpec {
    pub key: String,
    pub kind: StructureKind,
    pub points: Vec<Point>,
    pub destructible: bool,
    pub walkable: bool,
    pub level: u32,
}

impl StructureSpec {
    pub fn building(key: impl Into<String>, points: Vec<Point>) -> Self {
        Self {
            key: key.into(),
            kind: StructureKind::Building,
            points,
            destructible: true,
            walkable: false,
            level: 1,
        }
    }

    pub fn road(points: Vec<Point>) -> Self {
        Self {
            key: "road".to_string(),
            kind: StructureKind::Road,
            points,
            destructible: true,
            walkable: true,
            level: 1,
        }
    }

    pub fn obstacle(key: impl Into<String>, points: Vec<Point>) -> Self {
        Self {
            key: key.into(),
            kind: StructureKind::Obstacle,
            points,
            destructible: false,
            walkable: false,
            level: 1,
        }
    }

    pub fn decoration(key: impl Into<String>, points: Vec<Point>) -> Self {
        Self {
            key: key.into(),
            kind: StructureKind::Decoration,
            points,
            destructible: true,
            walkable: true,
            level: 2,
        }
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn with_destructible(mut self, destructible: bool) -> Self {
        self.destructible = destructible;
        self
    }

    pub fn with_walkable(mut self, walkable: bool) -> Self {
        self.walkable = walkable;
        self
    }
}

/// Back-reference stored per point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub id: StructureId,
    pub kind: StructureKind,
    pub level: u32,
    pub walkable: bool,
    pub destructible: bool,
}

/// Point -> structures present. Owns no structures.
#[derive(Debug, Clone)]
pub struct StructureIndex {
    bounds: MapBounds,
    cells: HashMap<Point, Vec<IndexEntry>>,
}

impl Default for StructureIndex {
    fn default() -> Self {
        Self::new(MapBounds::new(0, 0))
    }
}

impl StructureIndex {
    pub fn new(bounds: MapBounds) -> Self {
        Self {
            bounds,
            cells: HashMap::new(),
        }
    }

    pub fn bounds(&self) -> MapBounds {
        self.bounds
    }

    /// Insert the structure's current points. No dedup: registering twice
    /// without deregistering leaves two entries per point.
    pub fn register(&mut self, structure: &Structure) {
        let entry = IndexEntry {
            id: structure.id,
            kind: structure.kind,
            level: structure.level,
            walkable: structure.walkable,
            destructible: structure.destructible,
        };
        for point in &structure.points {
            self.cells.entry(*point).or_default().push(entry);
        }
    }

    /// Remove every entry of this structure at its current points
    pub fn deregister(&mut self, structure: &Structure) {
        for point in &structure.points {
            if let Some(entries) = self.cells.get_mut(point) {
                entries.retain(|e| e.id != structure.id);
                if entries.is_empty() {
                    self.cells.remove(point);
                }
            }
        }
    }

    fn entries(&self, point: Point) -> &[IndexEntry] {
        self.cells.get(&point).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// True iff the point is on the map and nothing there collides with `mask`
    pub fn check_availability(&self, point: Point, mask: u32) -> bool {
        self.bounds.contains(point)
            && !self
                .entries(point)
                .iter()
                .any(|e| check_levels(e.level, mask))
    }

    pub fn has_structure(&self, point: Point, mask: u32) -> bool {
        self.bounds.contains(point)
            && self
                .entries(point)
                .iter()
                .any(|e| check_levels(e.level, mask))
    }

    /// Structures at `point` colliding with `mask`, in registration order
    pub fn get_structures(&self, point: Point, mask: u32) -> Vec<StructureId> {
        if !self.bounds.contains(point) {
            return Vec::new();
        }
        self.entries(point)
            .iter()
            .filter(|e| check_levels(e.level, mask))
            .map(|e| e.id)
            .collect()
    }

    pub fn entries_at(&self, point: Point) -> &[IndexEntry] {
        if self.bounds.contains(point) {
            self.entries(point)
        } else {
            &[]
        }
    }

    /// Whether a walker using `path_type` may stand on `point`
    pub fn is_walkable(&self, map: &impl MapQuery, point: Point, path_type: PathType) -> bool {
        if !map.is_passable(point) {
            return false;
        }
        let entries = self.entries(point);
        if entries.iter().any(|e| !e.walkable) {
            return false;
        }
        match path_type {
            PathType::Map => true,
            PathType::Road => entries.iter().any(|e| e.kind == StructureKind::Road),
        }
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }
}

/// Outcome of a partial removal
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemovalReport {
    /// Structures that lost points but still exist
    pub shrunk: Vec<StructureId>,
    /// Structures whose point set became empty, in their final state
    pub destroyed: Vec<Structure>,
}

impl RemovalReport {
    pub fn is_empty(&self) -> bool {
        self.shrunk.is_empty() && self.destroyed.is_empty()
    }
}

/// Owns every structure on the map and keeps the index in sync
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureRegistry {
    bounds: MapBounds,
    structures: BTreeMap<StructureId, Structure>,
    next_id: u32,
    /// Rebuilt from `structures` after deserialization
    #[serde(skip)]
    index: StructureIndex,
}

impl StructureRegistry {
    pub fn new(bounds: MapBounds) -> Self {
        Self {
            bounds,
            structures: BTreeMap::new(),
            next_id: 1,
            index: StructureIndex::new(bounds),
        }
    }

    pub fn index(&self) -> &StructureIndex {
        &self.index
    }

    pub fn get(&self, id: StructureId) -> Option<&Structure> {
        self.structures.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Structure> {
        self.structures.values()
    }

    pub fn len(&self) -> usize {
        self.structures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    /// Every point is on the map and free for `mask`
    pub fn check_area(&self, points: &[Point], mask: u32) -> bool {
        points
            .iter()
            .all(|p| self.index.check_availability(*p, mask))
    }

    /// Add a structure without checking availability; callers check first
    pub fn add(&mut self, spec: StructureSpec) -> StructureId {
        let id = StructureId(self.next_id);
        self.next_id += 1;
        let structure = Structure {
            id,
            key: spec.key,
            kind: spec.kind,
            points: spec.points.into_iter().collect(),
            destructible: spec.destructible,
            walkable: spec.walkable,
            level: spec.level,
        };
        self.index.register(&structure);
        self.structures.insert(id, structure);
        id
    }

    /// Remove a whole structure regardless of destructibility
    pub fn remove(&mut self, id: StructureId) -> Option<Structure> {
        let structure = self.structures.remove(&id)?;
        self.index.deregister(&structure);
        Some(structure)
    }

    /// Clear `points` from every destructible structure colliding with `mask`.
    /// Structures left without points are destroyed.
    pub fn remove_points(&mut self, points: &[Point], mask: u32) -> RemovalReport {
        let mut affected: BTreeSet<StructureId> = BTreeSet::new();
        for point in points {
            for entry in self.index.entries_at(*point) {
                if entry.destructible && check_levels(entry.level, mask) {
                    affected.insert(entry.id);
                }
            }
        }

        let mut report = RemovalReport::default();
        for id in affected {
            let Some(mut structure) = self.structures.remove(&id) else {
                continue;
            };
            self.index.deregister(&structure);
            structure.remove_points(points);
            if structure.is_empty() {
                report.destroyed.push(structure);
            } else {
                self.index.register(&structure);
                self.structures.insert(id, structure);
                report.shrunk.push(id);
            }
        }
        report
    }

    /// Recreate the index from owned structures (after load)
    pub fn rebuild_index(&mut self) {
        self.index = StructureIndex::new(self.bounds);
        for structure in self.structures.values() {
            self.index.register(structure);
        }
    }
}
