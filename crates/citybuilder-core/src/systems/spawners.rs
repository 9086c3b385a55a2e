//! Cyclic walker spawners.

use citybuilder_logic::items::ItemStorage;
use hecs::World;

use crate::components::*;

/// A spawner that is ready and has a reason to send a walker out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    pub home: BuildingId,
    /// Index into the home's [`Spawners`]
    pub spawner: usize,
    pub kind: WalkerKind,
}

/// Tick spawner cooldowns and collect spawn requests.
///
/// A spawner fires when its cooldown has run out, it is below its walker
/// cap, and its building has work for that kind of walker. The cooldown
/// only restarts when it fires, so a spawner with nothing to do fires as
/// soon as work appears.
pub fn spawner_system(world: &mut World, delta_seconds: f32) -> Vec<SpawnRequest> {
    let mut requests = Vec::new();
    for (_, (building, spawners, storage, giver, receiver)) in world.query_mut::<(
        &Building,
        &mut Spawners,
        Option<&ItemStorage>,
        Option<&ItemGiver>,
        Option<&ItemReceiver>,
    )>() {
        for (index, spawner) in spawners.0.iter_mut().enumerate() {
            spawner.cooldown = (spawner.cooldown - delta_seconds).max(0.0);
            if spawner.cooldown > 0.0 || !spawner.has_room() {
                continue;
            }
            if !has_work(&spawner.kind, storage, giver, receiver) {
                continue;
            }
            spawner.cooldown = spawner.interval;
            requests.push(SpawnRequest {
                home: building.id,
                spawner: index,
                kind: spawner.kind.clone(),
            });
        }
    }
    requests
}

fn has_work(
    kind: &WalkerKind,
    storage: Option<&ItemStorage>,
    giver: Option<&ItemGiver>,
    receiver: Option<&ItemReceiver>,
) -> bool {
    match kind {
        WalkerKind::Delivery => match (storage, giver) {
            (Some(storage), Some(giver)) => giver.first_available(storage).is_some(),
            _ => false,
        },
        WalkerKind::Fetch { item } => match (storage, receiver) {
            (Some(storage), Some(receiver)) => receiver.capacity(storage, item) > 0,
            _ => false,
        },
        WalkerKind::Service { .. } | WalkerKind::RiskMitigation { .. } => true,
        WalkerKind::Emigrant => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citybuilder_logic::grid::Point;
    use citybuilder_logic::items::{Item, ItemFilter};
    use citybuilder_logic::structures::StructureId;

    fn building() -> Building {
        Building {
            id: BuildingId(1),
            key: "farm".to_string(),
            structure: StructureId(1),
            entrance: Point::ZERO,
            efficiency: 1.0,
        }
    }

    #[test]
    fn test_delivery_waits_for_goods() {
        let mut world = World::new();
        let entity = world.spawn((
            building(),
            Spawners(vec![WalkerSpawner::new(WalkerKind::Delivery, 1, 5.0)]),
            ItemStorage::total(10),
            ItemGiver::new(ItemFilter::All),
        ));

        assert!(spawner_system(&mut world, 1.0).is_empty());
        world
            .get::<&mut ItemStorage>(entity)
            .unwrap()
            .add_items(&Item::new("wheat"), 4);
        let requests = spawner_system(&mut world, 1.0);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].kind, WalkerKind::Delivery);

        // cooling down
        assert!(spawner_system(&mut world, 1.0).is_empty());
    }

    #[test]
    fn test_respects_walker_cap() {
        let mut world = World::new();
        let mut spawner = WalkerSpawner::new(
            WalkerKind::Service {
                service: "water".to_string(),
            },
            1,
            0.0,
        );
        spawner.active.push(WalkerId(9));
        let entity = world.spawn((building(), Spawners(vec![spawner])));

        assert!(spawner_system(&mut world, 1.0).is_empty());
        world.get::<&mut Spawners>(entity).unwrap().0[0].reclaim(WalkerId(9));
        assert_eq!(spawner_system(&mut world, 1.0).len(), 1);
    }

    #[test]
    fn test_fetch_needs_room() {
        let mut world = World::new();
        world.spawn((
            building(),
            Spawners(vec![WalkerSpawner::new(
                WalkerKind::Fetch {
                    item: Item::new("flour"),
                },
                2,
                1.0,
            )]),
            ItemStorage::total(5).with_items("flour", 5),
            ItemReceiver::new(ItemFilter::only(&["flour"]), 0),
        ));
        assert!(spawner_system(&mut world, 1.0).is_empty());
    }
}
