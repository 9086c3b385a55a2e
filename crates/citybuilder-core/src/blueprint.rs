//! Building blueprints: what to place, where, and with which components.

use citybuilder_logic::grid::Point;
use citybuilder_logic::items::ItemStorage;
use citybuilder_logic::risk::RiskRecipient;
use citybuilder_logic::service::ServiceRecipient;
use citybuilder_logic::structures::StructureId;
use hecs::EntityBuilder;
use serde::{Deserialize, Serialize};

use crate::components::*;

fn default_level() -> u32 {
    1
}

fn default_efficiency() -> f32 {
    1.0
}

/// Description of a building before placement. Deserializable so scenarios
/// can be written as data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingBlueprint {
    pub key: String,
    /// Top-left corner of the footprint
    pub origin: Point,
    pub width: i32,
    pub height: i32,
    pub entrance: Point,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default = "default_efficiency")]
    pub efficiency: f32,
    #[serde(default)]
    pub storage: Option<ItemStorage>,
    #[serde(default)]
    pub giver: Option<ItemGiver>,
    #[serde(default)]
    pub receiver: Option<ItemReceiver>,
    #[serde(default)]
    pub producer: Option<Producer>,
    #[serde(default)]
    pub spawners: Vec<WalkerSpawner>,
    #[serde(default)]
    pub services: Vec<ServiceRecipient>,
    /// Keys of risks this building is exposed to
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub housing: Option<Housing>,
    #[serde(default)]
    pub area_effect: Option<AreaEffect>,
}

impl BuildingBlueprint {
    pub fn new(key: impl Into<String>, origin: Point, width: i32, height: i32, entrance: Point) -> Self {
        Self {
            key: key.into(),
            origin,
            width,
            height,
            entrance,
            level: default_level(),
            efficiency: default_efficiency(),
            storage: None,
            giver: None,
            receiver: None,
            producer: None,
            spawners: Vec::new(),
            services: Vec::new(),
            risks: Vec::new(),
            housing: None,
            area_effect: None,
        }
    }

    pub fn footprint(&self) -> Vec<Point> {
        self.origin.rect(self.width, self.height)
    }

    pub fn with_storage(mut self, storage: ItemStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_giver(mut self, giver: ItemGiver) -> Self {
        self.giver = Some(giver);
        self
    }

    pub fn with_receiver(mut self, receiver: ItemReceiver) -> Self {
        self.receiver = Some(receiver);
        self
    }

    pub fn with_producer(mut self, producer: Producer) -> Self {
        self.producer = Some(producer);
        self
    }

    pub fn with_spawner(mut self, spawner: WalkerSpawner) -> Self {
        self.spawners.push(spawner);
        self
    }

    pub fn with_service(mut self, service: ServiceRecipient) -> Self {
        self.services.push(service);
        self
    }

    pub fn with_risk(mut self, risk: impl Into<String>) -> Self {
        self.risks.push(risk.into());
        self
    }

    pub fn with_housing(mut self, housing: Housing) -> Self {
        self.housing = Some(housing);
        self
    }

    pub fn with_area_effect(mut self, effect: AreaEffect) -> Self {
        self.area_effect = Some(effect);
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn with_efficiency(mut self, efficiency: f32) -> Self {
        self.efficiency = efficiency;
        self
    }

    /// Components for a placed instance. Logistics components always come
    /// with a storage, and every building can carry addons.
    pub fn build(&self, id: BuildingId, structure: StructureId) -> EntityBuilder {
        let mut builder = EntityBuilder::new();
        builder.add(Building {
            id,
            key: self.key.clone(),
            structure,
            entrance: self.entrance,
            efficiency: self.efficiency,
        });
        builder.add(Addons::default());

        let needs_storage =
            self.giver.is_some() || self.receiver.is_some() || self.producer.is_some();
        match &self.storage {
            Some(storage) => {
                builder.add(storage.clone());
            }
            None if needs_storage => {
                builder.add(ItemStorage::default());
            }
            None => {}
        }
        if let Some(giver) = &self.giver {
            builder.add(giver.clone());
        }
        if let Some(receiver) = &self.receiver {
            builder.add(receiver.clone());
        }
        if let Some(producer) = &self.producer {
            builder.add(producer.clone());
        }
        if !self.spawners.is_empty() {
            builder.add(Spawners(self.spawners.clone()));
        }
        if !self.services.is_empty() {
            builder.add(ServiceRecipients(self.services.clone()));
        }
        if !self.risks.is_empty() {
            builder.add(RiskRecipients(
                self.risks.iter().map(RiskRecipient::new).collect(),
            ));
        }
        if let Some(housing) = &self.housing {
            builder.add(housing.clone());
        }
        if let Some(effect) = &self.area_effect {
            builder.add(effect.clone());
        }
        builder
    }
}

/// Why a building or structure could not be placed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementError {
    EmptyFootprint,
    OutOfBounds(Point),
    Blocked(Point),
}

impl std::fmt::Display for PlacementError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlacementError::EmptyFootprint => write!(f, "Footprint has no points"),
            PlacementError::OutOfBounds(p) => write!(f, "Point ({}, {}) is off the map", p.x, p.y),
            PlacementError::Blocked(p) => write!(f, "Point ({}, {}) is occupied", p.x, p.y),
        }
    }
}

impl std::error::Error for PlacementError {}
