//! Walker components: kind, state machine, task and carried goods.

use std::collections::BTreeSet;

use citybuilder_logic::grid::Point;
use citybuilder_logic::items::{Item, ItemStorage};
use citybuilder_logic::roaming::RoamingMemory;
use citybuilder_logic::walking::{PathProgress, WalkingPath};
use serde::{Deserialize, Serialize};

use super::common::{BuildingId, WalkerId};

/// What a walker is for. Determines how it picks work while idle and
/// what it does to buildings it passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalkerKind {
    /// Carries goods from its home to the best receiver
    Delivery,
    /// Collects an item from a giver and brings it home
    Fetch { item: Item },
    /// Roams and fills a service at buildings in range
    Service { service: String },
    /// Roams and lowers a risk at buildings in range
    RiskMitigation { risk: String },
    /// Leaves the map through the exit point
    Emigrant,
}

impl WalkerKind {
    pub fn label(&self) -> String {
        match self {
            WalkerKind::Delivery => "delivery".to_string(),
            WalkerKind::Fetch { item } => format!("fetch:{}", item),
            WalkerKind::Service { service } => format!("service:{}", service),
            WalkerKind::RiskMitigation { risk } => format!("risk:{}", risk),
            WalkerKind::Emigrant => "emigrant".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationKind {
    /// Outgoing stock promised by a giver
    Stock,
    /// Incoming capacity promised by a receiver
    Capacity,
}

/// A promise held against a building's storage. Released exactly once,
/// either by completing the transfer or by [`crate::systems::release_reservation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub building: BuildingId,
    pub item: Item,
    pub quantity: u32,
    pub kind: ReservationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalkerTask {
    Deliver {
        target: BuildingId,
        item: Item,
        quantity: u32,
    },
    Fetch {
        source: BuildingId,
        item: Item,
        quantity: u32,
    },
    ReturnHome,
    Patrol,
    Emigrate,
}

impl WalkerTask {
    /// Building the walker is heading for, when it must still exist on arrival
    pub fn destination(&self) -> Option<BuildingId> {
        match self {
            WalkerTask::Deliver { target, .. } => Some(*target),
            WalkerTask::Fetch { source, .. } => Some(*source),
            _ => None,
        }
    }
}

/// A path being followed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Walk {
    pub path: WalkingPath,
    pub progress: PathProgress,
}

impl Walk {
    pub fn new(path: WalkingPath) -> Self {
        Self {
            path,
            progress: PathProgress::default(),
        }
    }
}

/// Destination-free wandering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roam {
    pub memory: RoamingMemory,
    pub current: Point,
    pub previous: Option<Point>,
    pub next: Option<Point>,
    /// Distance covered towards `next`
    pub step_walked: f32,
    pub steps: u32,
}

impl Roam {
    pub fn new(start: Point, memory_size: usize) -> Self {
        let mut memory = RoamingMemory::new(memory_size);
        memory.remember(start);
        Self {
            memory,
            current: start,
            previous: None,
            next: None,
            step_walked: 0.0,
            steps: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WalkerState {
    Idle,
    Walking(Walk),
    Waiting { remaining: f32 },
    Roaming(Roam),
    Emigrating(Walk),
    Terminated,
}

impl WalkerState {
    pub fn name(&self) -> &'static str {
        match self {
            WalkerState::Idle => "idle",
            WalkerState::Walking(_) => "walking",
            WalkerState::Waiting { .. } => "waiting",
            WalkerState::Roaming(_) => "roaming",
            WalkerState::Emigrating(_) => "emigrating",
            WalkerState::Terminated => "terminated",
        }
    }

    /// States in which the walker moves and visits buildings
    pub fn is_moving(&self) -> bool {
        matches!(
            self,
            WalkerState::Walking(_) | WalkerState::Roaming(_) | WalkerState::Emigrating(_)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Walker {
    pub id: WalkerId,
    pub kind: WalkerKind,
    /// Building that spawned the walker; `None` once it is gone
    pub home: Option<BuildingId>,
    pub state: WalkerState,
    pub task: Option<WalkerTask>,
    pub position: Point,
    /// Cells per second before efficiency
    pub speed: f32,
    pub carried: ItemStorage,
    pub reservations: Vec<Reservation>,
    /// Buildings in visit range after the last move
    pub in_range: BTreeSet<BuildingId>,
    /// Consecutive failed resolver attempts
    pub retries: u32,
    /// The errand is over; only the way home is left
    pub finished_errand: bool,
}

impl Walker {
    pub fn new(
        id: WalkerId,
        kind: WalkerKind,
        home: Option<BuildingId>,
        position: Point,
        speed: f32,
        carry_capacity: u32,
    ) -> Self {
        Self {
            id,
            kind,
            home,
            state: WalkerState::Idle,
            task: None,
            position,
            speed,
            carried: ItemStorage::total(carry_capacity),
            reservations: Vec::new(),
            in_range: BTreeSet::new(),
            retries: 0,
            finished_errand: false,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.state == WalkerState::Terminated
    }

    /// Drop the bookkeeping entry for a reservation that has been completed
    pub fn forget_reservation(&mut self, building: BuildingId, item: &Item, kind: ReservationKind) {
        if let Some(pos) = self
            .reservations
            .iter()
            .position(|r| r.building == building && r.item == *item && r.kind == kind)
        {
            self.reservations.remove(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_walker_is_idle() {
        let walker = Walker::new(
            WalkerId(1),
            WalkerKind::Delivery,
            Some(BuildingId(2)),
            Point::new(3, 3),
            2.0,
            10,
        );
        assert_eq!(walker.state, WalkerState::Idle);
        assert!(!walker.state.is_moving());
        assert!(walker.carried.is_empty());
        assert_eq!(walker.carried.remaining_capacity(&Item::new("wood")), 10);
    }

    #[test]
    fn test_forget_reservation() {
        let mut walker = Walker::new(
            WalkerId(1),
            WalkerKind::Delivery,
            None,
            Point::ZERO,
            1.0,
            5,
        );
        walker.reservations.push(Reservation {
            building: BuildingId(7),
            item: Item::new("wood"),
            quantity: 5,
            kind: ReservationKind::Capacity,
        });
        walker.forget_reservation(BuildingId(7), &Item::new("wood"), ReservationKind::Stock);
        assert_eq!(walker.reservations.len(), 1);
        walker.forget_reservation(BuildingId(7), &Item::new("wood"), ReservationKind::Capacity);
        assert!(walker.reservations.is_empty());
    }

    #[test]
    fn test_task_destination() {
        let task = WalkerTask::Deliver {
            target: BuildingId(3),
            item: Item::new("wood"),
            quantity: 1,
        };
        assert_eq!(task.destination(), Some(BuildingId(3)));
        assert_eq!(WalkerTask::ReturnHome.destination(), None);
        assert_eq!(WalkerKind::Emigrant.label(), "emigrant");
    }
}
