//! Logistics resolver: matches walkers with item givers and receivers.
//!
//! Both searches run synchronously when a walker needs work. Candidates are
//! filtered by Manhattan distance first, ordered, then the first one with a
//! walkable path inside the distance budget wins. The winning storage is
//! reserved before returning; nothing is reserved on a miss.
//!
//! Receiver order: priority ascending (lower number = more important),
//! then Manhattan distance, then building id. Candidates whose priority is
//! worse than the requester's `current_priority` are skipped.
//!
//! Giver order: Manhattan distance, then building id, among givers whose
//! unreserved stock covers the whole quantity.

use citybuilder_logic::grid::{MapQuery, PathType, Point};
use citybuilder_logic::items::{Item, ItemStorage};
use citybuilder_logic::pathfinding::find_grid_path;
use citybuilder_logic::structures::StructureIndex;
use citybuilder_logic::walking::WalkingPath;
use hecs::{Entity, World};

use crate::components::*;
use crate::registry::EntityRegistry;

/// What a walker is looking for
#[derive(Debug, Clone)]
pub struct LogisticsRequest<'a> {
    /// Building asking; never matched with itself
    pub requester: Option<BuildingId>,
    pub start: Point,
    pub item: &'a Item,
    pub quantity: u32,
    /// Receivers with a larger priority number than this are skipped
    pub current_priority: u8,
    pub max_distance: u32,
    pub path_type: PathType,
}

/// A matched building together with the path to its entrance and the
/// reservation taken on the caller's behalf
#[derive(Debug, Clone)]
pub struct BuildingComponentPath {
    pub building: BuildingId,
    pub entity: Entity,
    pub path: WalkingPath,
    pub reservation: Reservation,
}

struct Candidate {
    priority: u8,
    distance: u32,
    id: BuildingId,
    entity: Entity,
    entrance: Point,
    quantity: u32,
}

/// Find the best receiver for `request.item` and reserve capacity there.
///
/// The reserved quantity may be smaller than requested when the receiver
/// has less room; the walker delivers what fits and looks again.
pub fn find_receiver<M: MapQuery>(
    world: &World,
    map: &M,
    index: &StructureIndex,
    request: &LogisticsRequest,
) -> Option<BuildingComponentPath> {
    if request.quantity == 0 {
        return None;
    }

    let mut candidates: Vec<Candidate> = world
        .query::<(&Building, &ItemReceiver, &ItemStorage)>()
        .iter()
        .filter(|(_, (building, receiver, _))| {
            Some(building.id) != request.requester
                && receiver.priority <= request.current_priority
        })
        .filter_map(|(entity, (building, receiver, storage))| {
            let distance = request.start.manhattan(&building.entrance);
            let capacity = receiver.capacity(storage, request.item);
            (distance <= request.max_distance && capacity > 0).then(|| Candidate {
                priority: receiver.priority,
                distance,
                id: building.id,
                entity,
                entrance: building.entrance,
                quantity: capacity.min(request.quantity),
            })
        })
        .collect();
    candidates.sort_by_key(|c| (c.priority, c.distance, c.id));

    let (candidate, path) = first_reachable(map, index, request, candidates)?;
    let mut storage = world.get::<&mut ItemStorage>(candidate.entity).ok()?;
    let quantity = storage.reserve_capacity(request.item, candidate.quantity);
    log::debug!(
        "receiver {} reserved {} {} (priority {}, {} cells)",
        candidate.id,
        quantity,
        request.item,
        candidate.priority,
        candidate.distance
    );
    Some(BuildingComponentPath {
        building: candidate.id,
        entity: candidate.entity,
        path,
        reservation: Reservation {
            building: candidate.id,
            item: request.item.clone(),
            quantity,
            kind: ReservationKind::Capacity,
        },
    })
}

/// Find the nearest giver holding the full quantity and reserve its stock
pub fn find_giver<M: MapQuery>(
    world: &World,
    map: &M,
    index: &StructureIndex,
    request: &LogisticsRequest,
) -> Option<BuildingComponentPath> {
    if request.quantity == 0 {
        return None;
    }

    let mut candidates: Vec<Candidate> = world
        .query::<(&Building, &ItemGiver, &ItemStorage)>()
        .iter()
        .filter(|(_, (building, _, _))| Some(building.id) != request.requester)
        .filter_map(|(entity, (building, giver, storage))| {
            let distance = request.start.manhattan(&building.entrance);
            let available = giver.available(storage, request.item);
            (distance <= request.max_distance && available >= request.quantity).then(|| {
                Candidate {
                    priority: 0,
                    distance,
                    id: building.id,
                    entity,
                    entrance: building.entrance,
                    quantity: request.quantity,
                }
            })
        })
        .collect();
    candidates.sort_by_key(|c| (c.distance, c.id));

    let (candidate, path) = first_reachable(map, index, request, candidates)?;
    let mut storage = world.get::<&mut ItemStorage>(candidate.entity).ok()?;
    let quantity = storage.reserve(request.item, candidate.quantity);
    log::debug!(
        "giver {} reserved {} {} ({} cells)",
        candidate.id,
        quantity,
        request.item,
        candidate.distance
    );
    Some(BuildingComponentPath {
        building: candidate.id,
        entity: candidate.entity,
        path,
        reservation: Reservation {
            building: candidate.id,
            item: request.item.clone(),
            quantity,
            kind: ReservationKind::Stock,
        },
    })
}

fn first_reachable<M: MapQuery>(
    map: &M,
    index: &StructureIndex,
    request: &LogisticsRequest,
    candidates: Vec<Candidate>,
) -> Option<(Candidate, WalkingPath)> {
    candidates.into_iter().find_map(|candidate| {
        find_grid_path(
            map,
            index,
            request.start,
            candidate.entrance,
            request.max_distance,
            request.path_type,
        )
        .filter(|path| path.length() <= request.max_distance as f32)
        .map(|path| (candidate, path))
    })
}

/// Give back a promise that will not be completed.
///
/// Safe to call for buildings that no longer exist and for reservations
/// already partly consumed: the release is clamped to what is still held.
pub fn release_reservation(world: &World, registry: &EntityRegistry, reservation: &Reservation) {
    let Some(entity) = registry.building(reservation.building) else {
        return;
    };
    let Ok(mut storage) = world.get::<&mut ItemStorage>(entity) else {
        return;
    };
    match reservation.kind {
        ReservationKind::Stock => {
            let held = storage.reserved(&reservation.item);
            storage.unreserve(&reservation.item, reservation.quantity.min(held));
        }
        ReservationKind::Capacity => {
            let held = storage.reserved_capacity(&reservation.item);
            storage.unreserve_capacity(&reservation.item, reservation.quantity.min(held));
        }
    }
}

/// Sum of outgoing and incoming reservations across every building
pub fn total_reservations(world: &World) -> u32 {
    world
        .query::<(&Building, &ItemStorage)>()
        .iter()
        .map(|(_, (_, storage))| storage.total_reserved() + storage.total_reserved_capacity())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use citybuilder_logic::grid::TileMap;
    use citybuilder_logic::items::ItemFilter;
    use citybuilder_logic::structures::StructureId;

    fn building(id: u32, entrance: Point) -> Building {
        Building {
            id: BuildingId(id),
            key: format!("b{}", id),
            structure: StructureId(id),
            entrance,
            efficiency: 1.0,
        }
    }

    fn request(item: &Item, quantity: u32, current_priority: u8) -> LogisticsRequest<'_> {
        LogisticsRequest {
            requester: None,
            start: Point::new(0, 0),
            item,
            quantity,
            current_priority,
            max_distance: 40,
            path_type: PathType::Map,
        }
    }

    #[test]
    fn test_priority_beats_distance() {
        let map = TileMap::new(30, 5);
        let index = StructureIndex::new(map.bounds);
        let mut world = World::new();
        let item = Item::new("b");

        let near = world.spawn((
            building(1, Point::new(3, 0)),
            ItemReceiver::new(ItemFilter::All, 1),
            ItemStorage::total(10),
        ));
        let far = world.spawn((
            building(2, Point::new(20, 0)),
            ItemReceiver::new(ItemFilter::All, 0),
            ItemStorage::total(10),
        ));

        let found = find_receiver(&world, &map, &index, &request(&item, 5, 1)).unwrap();
        assert_eq!(found.building, BuildingId(2));
        assert_eq!(found.reservation.quantity, 5);
        assert_eq!(found.path.end(), Point::new(20, 0));

        assert_eq!(
            world.get::<&ItemStorage>(far).unwrap().reserved_capacity(&item),
            5
        );
        assert_eq!(
            world.get::<&ItemStorage>(near).unwrap().reserved_capacity(&item),
            0
        );
    }

    #[test]
    fn test_worse_priority_skipped() {
        let map = TileMap::new(10, 5);
        let index = StructureIndex::new(map.bounds);
        let mut world = World::new();
        let item = Item::new("b");
        world.spawn((
            building(1, Point::new(3, 0)),
            ItemReceiver::new(ItemFilter::All, 3),
            ItemStorage::total(10),
        ));
        assert!(find_receiver(&world, &map, &index, &request(&item, 5, 2)).is_none());
    }

    #[test]
    fn test_equal_priority_storage_is_a_valid_receiver() {
        let map = TileMap::new(10, 5);
        let index = StructureIndex::new(map.bounds);
        let mut world = World::new();
        let item = Item::new("b");
        for (id, entrance) in [(1, Point::new(1, 0)), (2, Point::new(6, 0))] {
            world.spawn((
                building(id, entrance),
                ItemReceiver::new(ItemFilter::All, 2),
                ItemStorage::total(10),
            ));
        }

        // two equal storages hand goods to each other, never to themselves
        let from_first = LogisticsRequest {
            requester: Some(BuildingId(1)),
            start: Point::new(1, 0),
            ..request(&item, 5, 2)
        };
        assert_eq!(
            find_receiver(&world, &map, &index, &from_first).unwrap().building,
            BuildingId(2)
        );
        let from_second = LogisticsRequest {
            requester: Some(BuildingId(2)),
            start: Point::new(6, 0),
            ..request(&item, 5, 2)
        };
        assert_eq!(
            find_receiver(&world, &map, &index, &from_second).unwrap().building,
            BuildingId(1)
        );
    }

    #[test]
    fn test_equal_priority_prefers_nearest_then_id() {
        let map = TileMap::new(10, 10);
        let index = StructureIndex::new(map.bounds);
        let mut world = World::new();
        let item = Item::new("b");
        for (id, entrance) in [(4, Point::new(0, 3)), (3, Point::new(3, 0)), (5, Point::new(1, 0))] {
            world.spawn((
                building(id, entrance),
                ItemReceiver::new(ItemFilter::All, 0),
                ItemStorage::total(10),
            ));
        }

        let first = find_receiver(&world, &map, &index, &request(&item, 10, 0)).unwrap();
        assert_eq!(first.building, BuildingId(5));
        // 3 and 4 are both 3 cells away
        let second = find_receiver(&world, &map, &index, &request(&item, 10, 0)).unwrap();
        assert_eq!(second.building, BuildingId(3));
    }

    #[test]
    fn test_unreachable_candidate_falls_through_without_reserving() {
        let mut map = TileMap::new(10, 10);
        // wall off (2, 2), which is nearer than the open receiver
        for p in Point::new(2, 2).neighbors() {
            map.block(p);
        }
        let index = StructureIndex::new(map.bounds);
        let mut world = World::new();
        let item = Item::new("b");
        let walled = world.spawn((
            building(1, Point::new(2, 2)),
            ItemReceiver::new(ItemFilter::All, 0),
            ItemStorage::total(10),
        ));
        world.spawn((
            building(2, Point::new(0, 9)),
            ItemReceiver::new(ItemFilter::All, 0),
            ItemStorage::total(10),
        ));

        let found = find_receiver(&world, &map, &index, &request(&item, 2, 0)).unwrap();
        assert_eq!(found.building, BuildingId(2));
        assert!(!world.get::<&ItemStorage>(walled).unwrap().has_reservations());
    }

    #[test]
    fn test_no_match_reserves_nothing() {
        let map = TileMap::new(10, 10);
        let index = StructureIndex::new(map.bounds);
        let mut world = World::new();
        let item = Item::new("b");
        world.spawn((
            building(1, Point::new(9, 9)),
            ItemReceiver::new(ItemFilter::All, 0),
            ItemStorage::total(10),
        ));
        let mut req = request(&item, 2, 0);
        req.max_distance = 5;
        assert!(find_receiver(&world, &map, &index, &req).is_none());
        assert_eq!(total_reservations(&world), 0);
    }

    #[test]
    fn test_giver_needs_full_quantity() {
        let map = TileMap::new(10, 10);
        let index = StructureIndex::new(map.bounds);
        let mut world = World::new();
        let item = Item::new("wood");
        world.spawn((
            building(1, Point::new(1, 0)),
            ItemGiver::new(ItemFilter::All),
            ItemStorage::default().with_items("wood", 3),
        ));
        let rich = world.spawn((
            building(2, Point::new(6, 0)),
            ItemGiver::new(ItemFilter::All),
            ItemStorage::default().with_items("wood", 20),
        ));

        let found = find_giver(&world, &map, &index, &request(&item, 5, 0)).unwrap();
        assert_eq!(found.building, BuildingId(2));
        assert_eq!(found.reservation.kind, ReservationKind::Stock);
        assert_eq!(world.get::<&ItemStorage>(rich).unwrap().available(&item), 15);
    }

    #[test]
    fn test_release_is_clamped() {
        let mut world = World::new();
        let item = Item::new("wood");
        let entity = world.spawn((
            building(1, Point::new(1, 0)),
            ItemStorage::default().with_items("wood", 10),
        ));
        let mut registry = EntityRegistry::new();
        registry.rebuild(&world);
        world
            .get::<&mut ItemStorage>(entity)
            .unwrap()
            .reserve(&item, 4);

        let reservation = Reservation {
            building: BuildingId(1),
            item: item.clone(),
            quantity: 4,
            kind: ReservationKind::Stock,
        };
        release_reservation(&world, &registry, &reservation);
        release_reservation(&world, &registry, &reservation);
        assert_eq!(total_reservations(&world), 0);

        let gone = Reservation {
            building: BuildingId(99),
            ..reservation
        };
        release_reservation(&world, &registry, &gone);
    }
}
