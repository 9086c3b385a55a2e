//! Simulation engine - main entry point for running the simulation

use std::io::{Read, Write};

use citybuilder_logic::config::{validate_config, SimConfig};
use citybuilder_logic::grid::{MapQuery, Point, TileMap};
use citybuilder_logic::items::ItemStorage;
use citybuilder_logic::structures::{RemovalReport, StructureId, StructureRegistry, StructureSpec};
use hecs::{Component, World};

use crate::blueprint::{BuildingBlueprint, PlacementError};
use crate::components::*;
use crate::events::{EventQueue, SimEvent};
use crate::persistence::{self, LoadedSimulation, SaveError, SimState};
use crate::registry::EntityRegistry;
use crate::rng::{self, RngState, SimRng};
use crate::systems::*;

/// Main simulation engine
pub struct SimulationEngine {
    /// ECS world containing buildings and walkers
    pub world: World,
    /// Simulated seconds since start
    pub sim_time: f64,
    /// Updates run since start
    pub tick: u64,
    pub config: SimConfig,
    pub map: TileMap,
    /// Every structure on the map and the point index over them
    pub structures: StructureRegistry,
    /// Id -> entity lookups
    pub registry: EntityRegistry,
    /// Events raised since the last drain
    pub events: EventQueue,

    rng: SimRng,
    next_building_id: u32,
    next_walker_id: u32,
    time_scale: f32,
}

impl SimulationEngine {
    /// Create an empty simulation on `map`
    pub fn new(config: SimConfig, map: TileMap) -> Self {
        for problem in validate_config(&config) {
            log::warn!("config: {}", problem);
        }
        Self {
            world: World::new(),
            sim_time: 0.0,
            tick: 0,
            rng: rng::seeded(config.seed),
            structures: StructureRegistry::new(map.bounds),
            registry: EntityRegistry::new(),
            events: EventQueue::new(),
            config,
            map,
            next_building_id: 1,
            next_walker_id: 1,
            time_scale: 1.0,
        }
    }

    /// Place a building from a blueprint
    pub fn place_building(
        &mut self,
        blueprint: &BuildingBlueprint,
    ) -> Result<BuildingId, PlacementError> {
        let points = blueprint.footprint();
        self.check_placement(&points, blueprint.level)?;
        if !self.map.contains(blueprint.entrance) {
            return Err(PlacementError::OutOfBounds(blueprint.entrance));
        }

        let structure = self.structures.add(
            StructureSpec::building(blueprint.key.clone(), points).with_level(blueprint.level),
        );
        let id = BuildingId(self.next_building_id);
        self.next_building_id += 1;
        let entity = self.world.spawn(blueprint.build(id, structure).build());
        self.registry.insert_building(id, entity, structure);

        log::info!(
            "placed {} '{}' at ({}, {})",
            id,
            blueprint.key,
            blueprint.origin.x,
            blueprint.origin.y
        );
        self.events.push(SimEvent::BuildingPlaced {
            building: id,
            key: blueprint.key.clone(),
        });
        Ok(id)
    }

    /// Place a non-building structure (road, obstacle, decoration)
    pub fn place_structure(&mut self, spec: StructureSpec) -> Result<StructureId, PlacementError> {
        self.check_placement(&spec.points, spec.level)?;
        Ok(self.structures.add(spec))
    }

    pub fn place_road(&mut self, points: Vec<Point>) -> Result<StructureId, PlacementError> {
        self.place_structure(StructureSpec::road(points))
    }

    fn check_placement(&self, points: &[Point], level: u32) -> Result<(), PlacementError> {
        if points.is_empty() {
            return Err(PlacementError::EmptyFootprint);
        }
        if let Some(p) = points.iter().find(|p| !self.map.contains(**p)) {
            return Err(PlacementError::OutOfBounds(*p));
        }
        if let Some(p) = points
            .iter()
            .find(|p| !self.structures.index().check_availability(**p, level))
        {
            return Err(PlacementError::Blocked(*p));
        }
        Ok(())
    }

    /// Clear points from destructible structures colliding with `mask`.
    /// Buildings whose structure disappears entirely are removed.
    pub fn remove_points(&mut self, points: &[Point], mask: u32) -> RemovalReport {
        let report = self.structures.remove_points(points, mask);
        for structure in &report.destroyed {
            if let Some(building) = self.registry.owner_of(structure.id) {
                self.despawn_building(building);
            }
        }
        report
    }

    /// Remove a building and its structure
    pub fn remove_building(&mut self, id: BuildingId) -> bool {
        let Some(building) = self.despawn_building(id) else {
            return false;
        };
        self.structures.remove(building.structure);
        true
    }

    fn despawn_building(&mut self, id: BuildingId) -> Option<Building> {
        let entity = self.registry.remove_building(id)?;
        let building = self.component::<Building>(entity);
        let _ = self.world.despawn(entity);
        log::info!("removed {}", id);
        let building = building?;
        self.events.push(SimEvent::BuildingRemoved {
            building: id,
            key: building.key.clone(),
        });
        Some(building)
    }

    /// Swap a building for a bare one with another key on the same structure.
    /// The old building's components (and any promises made by them) are gone.
    pub fn replace_building(&mut self, id: BuildingId, key: &str) -> Option<BuildingId> {
        let entity = self.registry.building(id)?;
        let old = self.component::<Building>(entity)?;
        self.registry.remove_building(id);
        let _ = self.world.despawn(entity);

        let new_id = BuildingId(self.next_building_id);
        self.next_building_id += 1;
        let building = Building {
            id: new_id,
            key: key.to_string(),
            ..old
        };
        let structure = building.structure;
        let entity = self.world.spawn((building, Addons::default()));
        self.registry.insert_building(new_id, entity, structure);

        log::info!("replaced {} with {} '{}'", id, new_id, key);
        self.events.push(SimEvent::BuildingReplaced {
            old: id,
            new: new_id,
            key: key.to_string(),
        });
        Some(new_id)
    }

    fn apply_action(&mut self, action: BuildingAction) {
        match action {
            BuildingAction::Replace { building, key } => {
                self.replace_building(building, &key);
            }
            BuildingAction::Terminate { building } => {
                self.remove_building(building);
            }
        }
    }

    /// Send a walker out of `home`. Delivery walkers load goods first and
    /// are not spawned when there is nothing to carry.
    pub fn spawn_walker(&mut self, home: BuildingId, kind: WalkerKind) -> Option<WalkerId> {
        let entity = self.registry.building(home)?;
        let entrance = self.component::<Building>(entity)?.entrance;
        let id = WalkerId(self.next_walker_id);
        let mut walker = Walker::new(
            id,
            kind.clone(),
            Some(home),
            entrance,
            self.config.walker_speed,
            self.config.carry_capacity,
        );

        if kind == WalkerKind::Delivery {
            let giver = self.world.get::<&ItemGiver>(entity).ok()?;
            let mut storage = self.world.get::<&mut ItemStorage>(entity).ok()?;
            let stack = giver.first_available(&storage)?;
            let quantity = stack.quantity.min(self.config.carry_capacity);
            if storage.move_item_to(&stack.item, quantity, &mut walker.carried) == 0 {
                return None;
            }
        }

        self.next_walker_id += 1;
        let walker_entity = self.world.spawn((walker,));
        self.registry.insert_walker(id, walker_entity);
        log::debug!("{} spawned {} ({})", home, id, kind.label());
        self.events.push(SimEvent::WalkerSpawned {
            walker: id,
            home: Some(home),
            kind: kind.label(),
        });
        Some(id)
    }

    fn spawn_requested(&mut self, request: SpawnRequest) {
        let Some(id) = self.spawn_walker(request.home, request.kind) else {
            return;
        };
        let Some(entity) = self.registry.building(request.home) else {
            return;
        };
        if let Ok(mut spawners) = self.world.get::<&mut Spawners>(entity) {
            if let Some(spawner) = spawners.0.get_mut(request.spawner) {
                spawner.active.push(id);
            }
        }
    }

    /// Stop a walker; it is cleaned up at the end of the next update
    pub fn terminate_walker(&mut self, id: WalkerId) -> bool {
        let Some(entity) = self.registry.walker(id) else {
            return false;
        };
        match self.world.get::<&mut Walker>(entity) {
            Ok(mut walker) => {
                walker.state = WalkerState::Terminated;
                true
            }
            Err(_) => false,
        }
    }

    /// Update the simulation by delta_seconds
    pub fn update(&mut self, delta_seconds: f32) {
        let dt = delta_seconds * self.time_scale;
        self.sim_time += dt as f64;
        self.tick += 1;

        production_system(&mut self.world, dt, &mut self.events);

        let mut requests = spawner_system(&mut self.world, dt);
        requests.sort_by_key(|r| (r.home, r.spawner));
        for request in requests {
            self.spawn_requested(request);
        }

        {
            let mut ctx = WalkerContext {
                map: &self.map,
                structures: &self.structures,
                registry: &self.registry,
                config: &self.config,
                rng: &mut self.rng,
                events: &mut self.events,
            };
            walker_system(&self.world, &mut ctx, dt);
        }

        let lost = service_system(
            &mut self.world,
            self.config.service_multiplier,
            dt,
            &mut self.events,
        );
        area_effect_system(&mut self.world, &self.config, dt, &mut self.events);

        let actions = risk_system(
            &mut self.world,
            &self.config,
            &mut self.rng,
            dt,
            &mut self.events,
        );
        for action in actions {
            self.apply_action(action);
        }

        for house in housing_system(&mut self.world, &lost, &mut self.events) {
            self.spawn_walker(house, WalkerKind::Emigrant);
        }

        self.cleanup_walkers();
    }

    /// Despawn terminated walkers, releasing whatever they still hold
    fn cleanup_walkers(&mut self) {
        let finished: Vec<(hecs::Entity, Walker)> = self
            .world
            .query::<&Walker>()
            .iter()
            .filter(|(_, walker)| walker.is_terminated())
            .map(|(entity, walker)| (entity, walker.clone()))
            .collect();

        for (entity, walker) in finished {
            for reservation in &walker.reservations {
                release_reservation(&self.world, &self.registry, reservation);
            }
            if let Some(home) = walker.home.and_then(|h| self.registry.building(h)) {
                if let Ok(mut spawners) = self.world.get::<&mut Spawners>(home) {
                    for spawner in spawners.0.iter_mut() {
                        spawner.reclaim(walker.id);
                    }
                }
            }
            let _ = self.world.despawn(entity);
            self.registry.remove_walker(walker.id);
            log::debug!("{} finished", walker.id);
            self.events.push(SimEvent::WalkerFinished { walker: walker.id });
        }
    }

    /// Take every event raised since the last call
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        self.events.drain()
    }

    fn component<T: Component + Clone>(&self, entity: hecs::Entity) -> Option<T> {
        self.world.get::<&T>(entity).ok().map(|c| (*c).clone())
    }

    fn building_component<T: Component + Clone>(&self, id: BuildingId) -> Option<T> {
        self.registry
            .building(id)
            .and_then(|entity| self.component::<T>(entity))
    }

    pub fn building(&self, id: BuildingId) -> Option<Building> {
        self.building_component(id)
    }

    /// Ids of all buildings, ascending
    pub fn building_ids(&self) -> Vec<BuildingId> {
        let mut ids: Vec<BuildingId> = self.registry.building_ids().collect();
        ids.sort();
        ids
    }

    pub fn storage(&self, id: BuildingId) -> Option<ItemStorage> {
        self.building_component(id)
    }

    pub fn service_value(&self, id: BuildingId, service: &str) -> Option<f32> {
        self.building_component::<ServiceRecipients>(id)?
            .get(service)
            .map(|s| s.value)
    }

    pub fn risk_value(&self, id: BuildingId, risk: &str) -> Option<f32> {
        self.building_component::<RiskRecipients>(id)?
            .get(risk)
            .map(|r| r.value)
    }

    pub fn has_addon(&self, id: BuildingId, addon: &str) -> bool {
        self.building_component::<Addons>(id)
            .map(|a| a.has(addon))
            .unwrap_or(false)
    }

    pub fn population(&self, id: BuildingId) -> Option<u32> {
        self.building_component::<Housing>(id).map(|h| h.population)
    }

    pub fn walker(&self, id: WalkerId) -> Option<Walker> {
        self.registry
            .walker(id)
            .and_then(|entity| self.component::<Walker>(entity))
    }

    /// Every walker, ordered by id
    pub fn walkers(&self) -> Vec<Walker> {
        let mut walkers: Vec<Walker> = self
            .world
            .query::<&Walker>()
            .iter()
            .map(|(_, w)| w.clone())
            .collect();
        walkers.sort_by_key(|w| w.id);
        walkers
    }

    pub fn building_count(&self) -> usize {
        self.registry.building_count()
    }

    pub fn walker_count(&self) -> usize {
        self.registry.walker_count()
    }

    /// Outgoing plus incoming reservations held across all storages
    pub fn total_reservations(&self) -> u32 {
        total_reservations(&self.world)
    }

    /// Set time scale (1.0 = real-time, 2.0 = 2x speed, etc.)
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    fn state(&self) -> SimState {
        SimState {
            sim_time: self.sim_time,
            tick: self.tick,
            time_scale: self.time_scale,
            config: self.config.clone(),
            map: self.map.clone(),
            structures: self.structures.clone(),
            next_building_id: self.next_building_id,
            next_walker_id: self.next_walker_id,
            rng: RngState::capture(&self.rng),
        }
    }

    fn restore(&mut self, loaded: LoadedSimulation) {
        let LoadedSimulation { world, state } = loaded;
        self.world = world;
        self.sim_time = state.sim_time;
        self.tick = state.tick;
        self.time_scale = state.time_scale;
        self.rng = state.rng.resume();
        self.config = state.config;
        self.map = state.map;
        self.structures = state.structures;
        self.structures.rebuild_index();
        self.next_building_id = state.next_building_id;
        self.next_walker_id = state.next_walker_id;
        self.registry.rebuild(&self.world);
        self.events = EventQueue::new();
        log::info!(
            "loaded simulation at tick {} ({} buildings, {} walkers)",
            self.tick,
            self.registry.building_count(),
            self.registry.walker_count()
        );
    }

    /// Save the simulation to a writer (bincode)
    pub fn save<W: Write>(&self, writer: W) -> Result<(), SaveError> {
        persistence::save_simulation(writer, &self.world, &self.state())?;
        log::info!("saved simulation at tick {}", self.tick);
        Ok(())
    }

    /// Load a simulation from a reader (bincode), replacing the current state
    pub fn load<R: Read>(&mut self, reader: R) -> Result<(), SaveError> {
        let loaded = persistence::load_simulation(reader)?;
        self.restore(loaded);
        Ok(())
    }

    /// Save as human-readable JSON
    pub fn save_json<W: Write>(&self, writer: W) -> Result<(), SaveError> {
        persistence::save_simulation_json(writer, &self.world, &self.state())?;
        log::info!("saved simulation as JSON at tick {}", self.tick);
        Ok(())
    }

    pub fn load_json<R: Read>(&mut self, reader: R) -> Result<(), SaveError> {
        let loaded = persistence::load_simulation_json(reader)?;
        self.restore(loaded);
        Ok(())
    }
}

impl Default for SimulationEngine {
    fn default() -> Self {
        Self::new(SimConfig::default(), TileMap::new(32, 32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citybuilder_logic::items::{Item, ItemFilter};

    #[test]
    fn test_placement_errors() {
        let mut engine = SimulationEngine::new(SimConfig::default(), TileMap::new(10, 10));
        let hut = BuildingBlueprint::new("hut", Point::new(1, 1), 2, 2, Point::new(1, 3));
        assert!(engine.place_building(&hut).is_ok());
        assert_eq!(
            engine.place_building(&hut),
            Err(PlacementError::Blocked(Point::new(1, 1)))
        );

        let edge = BuildingBlueprint::new("hut", Point::new(9, 9), 2, 1, Point::new(8, 9));
        assert_eq!(
            engine.place_building(&edge),
            Err(PlacementError::OutOfBounds(Point::new(10, 9)))
        );

        let flat = BuildingBlueprint::new("hut", Point::new(5, 5), 0, 1, Point::new(5, 6));
        assert_eq!(engine.place_building(&flat), Err(PlacementError::EmptyFootprint));

        assert_eq!(
            engine.place_road(vec![Point::new(2, 2)]),
            Err(PlacementError::Blocked(Point::new(2, 2)))
        );
        assert_eq!(engine.building_count(), 1);
    }

    #[test]
    fn test_remove_points_destroys_building() {
        let mut engine = SimulationEngine::default();
        let id = engine
            .place_building(&BuildingBlueprint::new("shed", Point::new(4, 4), 1, 2, Point::new(5, 4)))
            .unwrap();

        let report = engine.remove_points(&[Point::new(4, 4)], 0);
        assert_eq!(report.shrunk.len(), 1);
        assert!(engine.building(id).is_some());

        let report = engine.remove_points(&[Point::new(4, 5)], 0);
        assert_eq!(report.destroyed.len(), 1);
        assert!(engine.building(id).is_none());
        assert!(engine
            .drain_events()
            .iter()
            .any(|e| matches!(e, SimEvent::BuildingRemoved { .. })));
    }

    #[test]
    fn test_delivery_spawn_loads_goods() {
        let mut engine = SimulationEngine::default();
        let farm = engine
            .place_building(
                &BuildingBlueprint::new("farm", Point::new(0, 0), 2, 2, Point::new(2, 0))
                    .with_storage(ItemStorage::total(40).with_items("wheat", 14))
                    .with_giver(ItemGiver::new(ItemFilter::All)),
            )
            .unwrap();

        let walker = engine.spawn_walker(farm, WalkerKind::Delivery).unwrap();
        let walker = engine.walker(walker).unwrap();
        assert_eq!(walker.carried.quantity(&Item::new("wheat")), 10);
        assert_eq!(walker.position, Point::new(2, 0));
        assert_eq!(engine.storage(farm).unwrap().quantity(&Item::new("wheat")), 4);
    }

    #[test]
    fn test_terminated_walker_is_cleaned_up() {
        let mut engine = SimulationEngine::default();
        let well = engine
            .place_building(&BuildingBlueprint::new("well", Point::new(3, 3), 1, 1, Point::new(3, 4)))
            .unwrap();
        let walker = engine
            .spawn_walker(
                well,
                WalkerKind::Service {
                    service: "water".to_string(),
                },
            )
            .unwrap();
        assert!(engine.terminate_walker(walker));
        engine.update(0.1);
        assert_eq!(engine.walker_count(), 0);
        assert!(!engine.terminate_walker(walker));
    }
}
