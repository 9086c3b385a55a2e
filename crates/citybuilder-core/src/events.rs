//! Simulation events.
//!
//! Systems never call back into game code. Everything observable happens
//! through events pushed here during `update` and drained by the host.

use citybuilder_logic::items::Item;
use serde::{Deserialize, Serialize};

use crate::components::{BuildingId, WalkerId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    BuildingPlaced { building: BuildingId, key: String },
    BuildingRemoved { building: BuildingId, key: String },
    BuildingReplaced { old: BuildingId, new: BuildingId, key: String },
    WalkerSpawned { walker: WalkerId, home: Option<BuildingId>, kind: String },
    WalkerFinished { walker: WalkerId },
    Produced { building: BuildingId, item: Item, quantity: u32 },
    ItemsCollected { walker: WalkerId, building: BuildingId, item: Item, quantity: u32 },
    ItemsDelivered { walker: WalkerId, building: BuildingId, item: Item, quantity: u32 },
    ServiceGained { building: BuildingId, service: String },
    ServiceLost { building: BuildingId, service: String },
    RiskExecuted { building: BuildingId, risk: String },
    RiskResolved { building: BuildingId, risk: String },
    ResidentLeft { building: BuildingId, remaining: u32 },
}

/// Events raised since the last drain, in the order they happened
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Vec<SimEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: SimEvent) {
        log::trace!("event: {:?}", event);
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
