//! Building components: identity, logistics capabilities, production,
//! spawners, services, risks and housing.
//!
//! A building is an entity carrying `Building` plus whichever capability
//! components it needs; there is no building type hierarchy.

use citybuilder_logic::grid::Point;
use citybuilder_logic::items::{Item, ItemFilter, ItemQuantity, ItemStorage};
use citybuilder_logic::progress::Progress;
use citybuilder_logic::risk::RiskRecipient;
use citybuilder_logic::service::ServiceRecipient;
use citybuilder_logic::structures::StructureId;
use serde::{Deserialize, Serialize};

use super::common::{BuildingId, WalkerId};
use super::walker::WalkerKind;

/// Identity and placement of a building
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    pub key: String,
    pub structure: StructureId,
    /// Walkable cell where walkers leave and arrive
    pub entrance: Point,
    /// Scales production speed and the speed of walkers spawned here
    pub efficiency: f32,
}

/// Offers stored items to walkers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemGiver {
    pub items: ItemFilter,
}

impl ItemGiver {
    pub fn new(items: ItemFilter) -> Self {
        Self { items }
    }

    /// Stock that may still be promised (excludes reservations)
    pub fn available(&self, storage: &ItemStorage, item: &Item) -> u32 {
        if self.items.accepts(item) {
            storage.available(item)
        } else {
            0
        }
    }

    /// First item (key order) with unreserved stock
    pub fn first_available(&self, storage: &ItemStorage) -> Option<ItemQuantity> {
        storage
            .items()
            .filter(|iq| self.items.accepts(&iq.item))
            .map(|iq| {
                let available = storage.available(&iq.item);
                ItemQuantity::new(iq.item, available)
            })
            .find(|iq| iq.quantity > 0)
    }
}

/// Accepts deliveries. Lower priority numbers are served first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemReceiver {
    pub items: ItemFilter,
    pub priority: u8,
}

impl ItemReceiver {
    pub fn new(items: ItemFilter, priority: u8) -> Self {
        Self { items, priority }
    }

    /// Capacity that may still be promised (excludes reservations)
    pub fn capacity(&self, storage: &ItemStorage, item: &Item) -> u32 {
        if self.items.accepts(item) {
            storage.remaining_capacity(item)
        } else {
            0
        }
    }
}

/// Turns inputs from the building's storage into outputs over a cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Producer {
    pub consumes: Vec<ItemQuantity>,
    pub produces: Vec<ItemQuantity>,
    pub progress: Progress,
    /// Inputs have been taken and the cycle is running
    #[serde(default)]
    pub working: bool,
}

impl Producer {
    pub fn new(consumes: Vec<ItemQuantity>, produces: Vec<ItemQuantity>, interval: f32) -> Self {
        Self {
            consumes,
            produces,
            progress: Progress::new(interval),
            working: false,
        }
    }
}

/// Emits walkers of one kind on a fixed cycle, up to a cap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkerSpawner {
    pub kind: WalkerKind,
    pub max_walkers: u32,
    /// Seconds between spawns
    pub interval: f32,
    #[serde(default)]
    pub cooldown: f32,
    /// Walkers out in the world; reclaimed when they finish
    #[serde(default)]
    pub active: Vec<WalkerId>,
}

impl WalkerSpawner {
    pub fn new(kind: WalkerKind, max_walkers: u32, interval: f32) -> Self {
        Self {
            kind,
            max_walkers,
            interval,
            cooldown: 0.0,
            active: Vec::new(),
        }
    }

    pub fn has_room(&self) -> bool {
        (self.active.len() as u32) < self.max_walkers
    }

    pub fn reclaim(&mut self, walker: WalkerId) -> bool {
        let before = self.active.len();
        self.active.retain(|w| *w != walker);
        self.active.len() != before
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Spawners(pub Vec<WalkerSpawner>);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceRecipients(pub Vec<ServiceRecipient>);

impl ServiceRecipients {
    pub fn get(&self, service: &str) -> Option<&ServiceRecipient> {
        self.0.iter().find(|s| s.service == service)
    }

    pub fn get_mut(&mut self, service: &str) -> Option<&mut ServiceRecipient> {
        self.0.iter_mut().find(|s| s.service == service)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskRecipients(pub Vec<RiskRecipient>);

impl RiskRecipients {
    pub fn get(&self, risk: &str) -> Option<&RiskRecipient> {
        self.0.iter().find(|r| r.risk == risk)
    }

    pub fn get_mut(&mut self, risk: &str) -> Option<&mut RiskRecipient> {
        self.0.iter_mut().find(|r| r.risk == risk)
    }
}

/// Residents; they leave when a required service is lost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Housing {
    pub population: u32,
    pub capacity: u32,
    #[serde(default)]
    pub required_services: Vec<String>,
}

/// Markers attached by risks (e.g. "disease")
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Addons(pub Vec<String>);

impl Addons {
    pub fn has(&self, key: &str) -> bool {
        self.0.iter().any(|a| a == key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AreaEffectKind {
    Service { service: String, fill_per_second: f32 },
    Risk { risk: String, mitigation_per_second: f32 },
}

/// Influence on every building whose entrance lies within `radius`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaEffect {
    pub radius: u32,
    pub kind: AreaEffectKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_giver_respects_filter_and_reservations() {
        let giver = ItemGiver::new(ItemFilter::only(&["bread"]));
        let mut storage = ItemStorage::default()
            .with_items("bread", 8)
            .with_items("ale", 4);
        storage.reserve(&Item::new("bread"), 3);

        assert_eq!(giver.available(&storage, &Item::new("bread")), 5);
        assert_eq!(giver.available(&storage, &Item::new("ale")), 0);
        assert_eq!(
            giver.first_available(&storage),
            Some(ItemQuantity::new("bread", 5))
        );
    }

    #[test]
    fn test_receiver_capacity() {
        let receiver = ItemReceiver::new(ItemFilter::only(&["wood"]), 1);
        let storage = ItemStorage::total(20).with_items("wood", 5);
        assert_eq!(receiver.capacity(&storage, &Item::new("wood")), 15);
        assert_eq!(receiver.capacity(&storage, &Item::new("iron")), 0);
    }

    #[test]
    fn test_spawner_reclaim() {
        let mut spawner = WalkerSpawner::new(WalkerKind::Delivery, 1, 5.0);
        assert!(spawner.has_room());
        spawner.active.push(WalkerId(4));
        assert!(!spawner.has_room());
        assert!(spawner.reclaim(WalkerId(4)));
        assert!(!spawner.reclaim(WalkerId(4)));
        assert!(spawner.has_room());
    }
}
