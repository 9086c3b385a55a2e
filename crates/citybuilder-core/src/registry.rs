//! Id -> entity lookup tables.
//!
//! Buildings and walkers refer to each other by id. These maps are derived
//! state: they are never saved and are rebuilt from the world after a load.

use std::collections::HashMap;

use citybuilder_logic::structures::StructureId;
use hecs::{Entity, World};

use crate::components::{Building, BuildingId, Walker, WalkerId};

#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    buildings: HashMap<BuildingId, Entity>,
    walkers: HashMap<WalkerId, Entity>,
    structure_owners: HashMap<StructureId, BuildingId>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_building(&mut self, id: BuildingId, entity: Entity, structure: StructureId) {
        self.buildings.insert(id, entity);
        self.structure_owners.insert(structure, id);
    }

    pub fn remove_building(&mut self, id: BuildingId) -> Option<Entity> {
        self.structure_owners.retain(|_, owner| *owner != id);
        self.buildings.remove(&id)
    }

    pub fn building(&self, id: BuildingId) -> Option<Entity> {
        self.buildings.get(&id).copied()
    }

    /// Building occupying a structure, if any
    pub fn owner_of(&self, structure: StructureId) -> Option<BuildingId> {
        self.structure_owners.get(&structure).copied()
    }

    pub fn building_ids(&self) -> impl Iterator<Item = BuildingId> + '_ {
        self.buildings.keys().copied()
    }

    pub fn building_count(&self) -> usize {
        self.buildings.len()
    }

    pub fn insert_walker(&mut self, id: WalkerId, entity: Entity) {
        self.walkers.insert(id, entity);
    }

    pub fn remove_walker(&mut self, id: WalkerId) -> Option<Entity> {
        self.walkers.remove(&id)
    }

    pub fn walker(&self, id: WalkerId) -> Option<Entity> {
        self.walkers.get(&id).copied()
    }

    pub fn walker_count(&self) -> usize {
        self.walkers.len()
    }

    /// Recreate every table from the components in `world`
    pub fn rebuild(&mut self, world: &World) {
        self.buildings.clear();
        self.walkers.clear();
        self.structure_owners.clear();
        for (entity, building) in world.query::<&Building>().iter() {
            self.insert_building(building.id, entity, building.structure);
        }
        for (entity, walker) in world.query::<&Walker>().iter() {
            self.insert_walker(walker.id, entity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citybuilder_logic::grid::Point;

    #[test]
    fn test_rebuild_from_world() {
        let mut world = World::new();
        let entity = world.spawn((Building {
            id: BuildingId(5),
            key: "hut".to_string(),
            structure: StructureId(9),
            entrance: Point::new(1, 1),
            efficiency: 1.0,
        },));

        let mut registry = EntityRegistry::new();
        registry.rebuild(&world);

        assert_eq!(registry.building(BuildingId(5)), Some(entity));
        assert_eq!(registry.owner_of(StructureId(9)), Some(BuildingId(5)));
        assert_eq!(registry.walker_count(), 0);

        registry.remove_building(BuildingId(5));
        assert_eq!(registry.owner_of(StructureId(9)), None);
    }
}
