//! Production cycles: take inputs, wait, put outputs.

use hecs::World;

use crate::components::*;
use crate::events::{EventQueue, SimEvent};
use citybuilder_logic::items::ItemStorage;

/// Advance every producer. A finished cycle whose outputs do not fit
/// stays finished until the storage has room for all of them.
pub fn production_system(world: &mut World, delta_seconds: f32, events: &mut EventQueue) {
    for (_, (building, producer, storage)) in
        world.query_mut::<(&Building, &mut Producer, &mut ItemStorage)>()
    {
        if !producer.working {
            let has_inputs = producer
                .consumes
                .iter()
                .all(|input| storage.available(&input.item) >= input.quantity);
            if !has_inputs {
                continue;
            }
            for input in &producer.consumes {
                storage.remove_items(&input.item, input.quantity);
            }
            producer.working = true;
        }

        if !producer
            .progress
            .advance(delta_seconds * building.efficiency)
        {
            continue;
        }

        let mut trial = storage.clone();
        let fits = producer
            .produces
            .iter()
            .all(|output| trial.add_items(&output.item, output.quantity) == output.quantity);
        if !fits {
            log::trace!("{} is blocked, no room for output", building.id);
            continue;
        }
        *storage = trial;
        for output in &producer.produces {
            events.push(SimEvent::Produced {
                building: building.id,
                item: output.item.clone(),
                quantity: output.quantity,
            });
        }
        producer.progress.reset();
        producer.working = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citybuilder_logic::grid::Point;
    use citybuilder_logic::items::{Item, ItemQuantity};
    use citybuilder_logic::structures::StructureId;

    fn building() -> Building {
        Building {
            id: BuildingId(1),
            key: "bakery".to_string(),
            structure: StructureId(1),
            entrance: Point::ZERO,
            efficiency: 1.0,
        }
    }

    #[test]
    fn test_consumes_then_produces() {
        let mut world = World::new();
        let entity = world.spawn((
            building(),
            Producer::new(
                vec![ItemQuantity::new("flour", 2)],
                vec![ItemQuantity::new("bread", 1)],
                2.0,
            ),
            ItemStorage::total(10).with_items("flour", 3),
        ));
        let mut events = EventQueue::new();

        production_system(&mut world, 1.0, &mut events);
        {
            let storage = world.get::<&ItemStorage>(entity).unwrap();
            assert_eq!(storage.quantity(&Item::new("flour")), 1);
            assert_eq!(storage.quantity(&Item::new("bread")), 0);
        }
        production_system(&mut world, 1.0, &mut events);
        {
            let storage = world.get::<&ItemStorage>(entity).unwrap();
            assert_eq!(storage.quantity(&Item::new("bread")), 1);
        }
        assert_eq!(events.len(), 1);

        // one flour left, not enough for another cycle
        production_system(&mut world, 1.0, &mut events);
        assert!(!world.get::<&Producer>(entity).unwrap().working);
    }

    #[test]
    fn test_blocked_when_full() {
        let mut world = World::new();
        let entity = world.spawn((
            building(),
            Producer::new(vec![], vec![ItemQuantity::new("wood", 5)], 1.0),
            ItemStorage::total(8),
        ));
        let mut events = EventQueue::new();

        production_system(&mut world, 1.0, &mut events);
        production_system(&mut world, 1.0, &mut events);
        let storage = world.get::<&ItemStorage>(entity).unwrap();
        assert_eq!(storage.quantity(&Item::new("wood")), 5);
        assert!(world.get::<&Producer>(entity).unwrap().progress.is_done());
        assert_eq!(events.len(), 1);
    }
}
