//! Save/Load functionality for persisting simulation state
//!
//! Uses bincode for compact binary saves and serde_json for readable ones.
//! Components are serialized individually then reconstructed on load; the
//! structure index and id lookups are derived data and rebuilt by the engine.

use citybuilder_logic::config::SimConfig;
use citybuilder_logic::grid::TileMap;
use citybuilder_logic::items::ItemStorage;
use citybuilder_logic::structures::StructureRegistry;
use hecs::{EntityRef, World};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use crate::components::*;
use crate::rng::RngState;

/// Version number for save file format (increment when format changes)
pub const SAVE_VERSION: u32 = 2;

/// Engine state that lives outside the ECS world
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimState {
    pub sim_time: f64,
    pub tick: u64,
    pub time_scale: f32,
    pub config: SimConfig,
    pub map: TileMap,
    pub structures: StructureRegistry,
    pub next_building_id: u32,
    pub next_walker_id: u32,
    pub rng: RngState,
}

/// Serializable snapshot of the simulation state
#[derive(Serialize, Deserialize)]
pub struct SaveData {
    /// Save format version
    pub version: u32,
    pub state: SimState,
    /// All entities with their components
    pub entities: Vec<SerializableEntity>,
}

/// All possible components for an entity, serialized as optionals
#[derive(Serialize, Deserialize, Default)]
pub struct SerializableEntity {
    // Building
    pub building: Option<Building>,
    pub addons: Option<Addons>,
    pub storage: Option<ItemStorage>,
    pub giver: Option<ItemGiver>,
    pub receiver: Option<ItemReceiver>,
    pub producer: Option<Producer>,
    pub spawners: Option<Spawners>,
    pub services: Option<ServiceRecipients>,
    pub risks: Option<RiskRecipients>,
    pub housing: Option<Housing>,
    pub area_effect: Option<AreaEffect>,

    // Walker
    pub walker: Option<Walker>,
}

fn cloned<T: hecs::Component + Clone>(entity: &EntityRef<'_>) -> Option<T> {
    entity.get::<&T>().map(|c| (*c).clone())
}

/// Extract all entities from a world into serializable form
fn serialize_entities(world: &World) -> Vec<SerializableEntity> {
    world
        .iter()
        .map(|entity| SerializableEntity {
            building: cloned(&entity),
            addons: cloned(&entity),
            storage: cloned(&entity),
            giver: cloned(&entity),
            receiver: cloned(&entity),
            producer: cloned(&entity),
            spawners: cloned(&entity),
            services: cloned(&entity),
            risks: cloned(&entity),
            housing: cloned(&entity),
            area_effect: cloned(&entity),
            walker: cloned(&entity),
        })
        .collect()
}

/// Spawn an entity with all its components
fn spawn_entity(world: &mut World, se: SerializableEntity) {
    let entity = world.spawn(());

    if let Some(c) = se.building {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.addons {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.storage {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.giver {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.receiver {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.producer {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.spawners {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.services {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.risks {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.housing {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.area_effect {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.walker {
        let _ = world.insert_one(entity, c);
    }
}

fn snapshot(world: &World, state: &SimState) -> SaveData {
    SaveData {
        version: SAVE_VERSION,
        state: state.clone(),
        entities: serialize_entities(world),
    }
}

fn restore(save_data: SaveData) -> Result<LoadedSimulation, SaveError> {
    if save_data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save_data.version,
        });
    }

    let mut world = World::new();
    for se in save_data.entities {
        spawn_entity(&mut world, se);
    }

    Ok(LoadedSimulation {
        world,
        state: save_data.state,
    })
}

/// Save the complete simulation to a writer
pub fn save_simulation<W: Write>(
    writer: W,
    world: &World,
    state: &SimState,
) -> Result<(), SaveError> {
    bincode::serialize_into(writer, &snapshot(world, state))?;
    Ok(())
}

/// Load a simulation from a reader
pub fn load_simulation<R: Read>(reader: R) -> Result<LoadedSimulation, SaveError> {
    let save_data: SaveData = bincode::deserialize_from(reader)?;
    restore(save_data)
}

pub fn save_simulation_json<W: Write>(
    writer: W,
    world: &World,
    state: &SimState,
) -> Result<(), SaveError> {
    serde_json::to_writer_pretty(writer, &snapshot(world, state))?;
    Ok(())
}

pub fn load_simulation_json<R: Read>(reader: R) -> Result<LoadedSimulation, SaveError> {
    let save_data: SaveData = serde_json::from_reader(reader)?;
    restore(save_data)
}

/// Result of loading a simulation
pub struct LoadedSimulation {
    pub world: World,
    pub state: SimState,
}

/// Errors that can occur during save/load
#[derive(Debug)]
pub enum SaveError {
    Io(std::io::Error),
    Bincode(Box<bincode::ErrorKind>),
    Json(serde_json::Error),
    VersionMismatch { expected: u32, found: u32 },
}

impl From<std::io::Error> for SaveError {
    fn from(e: std::io::Error) -> Self {
        SaveError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for SaveError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        SaveError::Bincode(e)
    }
}

impl From<serde_json::Error> for SaveError {
    fn from(e: serde_json::Error) -> Self {
        SaveError::Json(e)
    }
}

impl std::fmt::Display for SaveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveError::Io(e) => write!(f, "IO error: {}", e),
            SaveError::Bincode(e) => write!(f, "Serialization error: {}", e),
            SaveError::Json(e) => write!(f, "JSON error: {}", e),
            SaveError::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Save version mismatch: expected {}, found {}",
                    expected, found
                )
            }
        }
    }
}

impl std::error::Error for SaveError {}
