//! Walker state machine.
//!
//! Walkers are processed one at a time in id order. Each walker is copied
//! out of the world, stepped, and written back, so a step may freely borrow
//! other entities' storages (one at a time) without aliasing its own.
//!
//! ```text
//! Idle ──match──▶ Walking ──arrive──▶ Idle / Waiting ──▶ ...
//!   │                 └── target gone ──▶ Walking(home) ──▶ Terminated
//!   ├──roam──▶ Roaming ──steps done──▶ Idle ──▶ Walking(home)
//!   ├──no match──▶ Waiting(retry) ──▶ Idle (bounded retries)
//!   └──emigrate──▶ Emigrating ──exit──▶ Terminated
//! ```

use std::collections::BTreeSet;

use citybuilder_logic::config::SimConfig;
use citybuilder_logic::grid::{MapQuery, PathType, Point};
use citybuilder_logic::items::{Item, ItemStorage};
use citybuilder_logic::pathfinding::find_grid_path;
use citybuilder_logic::risk::RiskTransition;
use citybuilder_logic::roaming::choose_next_step;
use citybuilder_logic::service::ServiceTransition;
use citybuilder_logic::structures::StructureRegistry;
use citybuilder_logic::walking::StepOutcome;
use hecs::{Entity, World};
use rand::Rng;

use super::logistics::{find_giver, find_receiver, release_reservation, LogisticsRequest};
use super::risks::on_risk_resolved;
use crate::components::*;
use crate::events::{EventQueue, SimEvent};
use crate::registry::EntityRegistry;
use crate::rng::SimRng;

/// Everything a walker step may read or touch besides the world
pub struct WalkerContext<'a, M: MapQuery> {
    pub map: &'a M,
    pub structures: &'a StructureRegistry,
    pub registry: &'a EntityRegistry,
    pub config: &'a SimConfig,
    pub rng: &'a mut SimRng,
    pub events: &'a mut EventQueue,
}

/// Step every walker once
pub fn walker_system<M: MapQuery>(world: &World, ctx: &mut WalkerContext<M>, delta_seconds: f32) {
    let mut order: Vec<(WalkerId, Entity)> = world
        .query::<&Walker>()
        .iter()
        .map(|(entity, walker)| (walker.id, entity))
        .collect();
    order.sort_by_key(|(id, _)| *id);

    for (_, entity) in order {
        let Some(mut walker) = world.get::<&Walker>(entity).ok().map(|w| (*w).clone()) else {
            continue;
        };
        step_walker(world, ctx, &mut walker, delta_seconds);
        if let Ok(mut slot) = world.get::<&mut Walker>(entity) {
            *slot = walker;
        }
    }
}

/// Advance one walker by `delta_seconds`. A terminated walker is never touched.
pub fn step_walker<M: MapQuery>(
    world: &World,
    ctx: &mut WalkerContext<M>,
    walker: &mut Walker,
    delta_seconds: f32,
) {
    let state = std::mem::replace(&mut walker.state, WalkerState::Idle);
    match state {
        WalkerState::Terminated => walker.state = WalkerState::Terminated,
        WalkerState::Idle => decide(world, ctx, walker),
        WalkerState::Waiting { remaining } => {
            let remaining = remaining - delta_seconds;
            walker.state = if remaining > 0.0 {
                WalkerState::Waiting { remaining }
            } else {
                WalkerState::Idle
            };
        }
        WalkerState::Walking(mut walk) => {
            if let Some(target) = walker.task.as_ref().and_then(|t| t.destination()) {
                if ctx.registry.building(target).is_none() {
                    log::debug!("{} lost its destination {}", walker.id, target);
                    abandon(world, ctx, walker);
                    return;
                }
            }
            if walker.task == Some(WalkerTask::ReturnHome) && home_entity(ctx, walker).is_none() {
                log::debug!("{} has no home to return to", walker.id);
                give_up(world, ctx, walker);
                return;
            }
            match advance_walk(world, ctx, walker, &mut walk, delta_seconds) {
                StepOutcome::Arrived => arrive(world, ctx, walker),
                StepOutcome::Moving => walker.state = WalkerState::Walking(walk),
            }
        }
        WalkerState::Emigrating(mut walk) => {
            match advance_walk(world, ctx, walker, &mut walk, delta_seconds) {
                StepOutcome::Arrived => {
                    log::debug!("{} left the map at {:?}", walker.id, walker.position);
                    walker.state = WalkerState::Terminated;
                }
                StepOutcome::Moving => walker.state = WalkerState::Emigrating(walk),
            }
        }
        WalkerState::Roaming(mut roam) => {
            if advance_roam(world, ctx, walker, &mut roam, delta_seconds) {
                walker.in_range.clear();
                walker.task = None;
                walker.finished_errand = true;
                settle(ctx.config, walker);
            } else {
                walker.state = WalkerState::Roaming(roam);
            }
        }
    }
}

fn home_entity<M: MapQuery>(ctx: &WalkerContext<M>, walker: &Walker) -> Option<Entity> {
    walker.home.and_then(|home| ctx.registry.building(home))
}

fn efficiency<M: MapQuery>(world: &World, ctx: &WalkerContext<M>, walker: &Walker) -> f32 {
    home_entity(ctx, walker)
        .and_then(|entity| world.get::<&Building>(entity).ok().map(|b| b.efficiency))
        .unwrap_or(1.0)
}

/// After an arrival: wait if dwelling is configured, otherwise idle
fn settle(config: &SimConfig, walker: &mut Walker) {
    walker.state = if config.dwell_seconds > 0.0 {
        WalkerState::Waiting {
            remaining: config.dwell_seconds,
        }
    } else {
        WalkerState::Idle
    };
}

fn decide<M: MapQuery>(world: &World, ctx: &mut WalkerContext<M>, walker: &mut Walker) {
    if walker.finished_errand {
        head_home(world, ctx, walker);
        return;
    }
    match walker.kind.clone() {
        WalkerKind::Delivery => {
            if walker.carried.is_empty() {
                walker.finished_errand = true;
                head_home(world, ctx, walker);
            } else {
                seek_receiver(world, ctx, walker);
            }
        }
        WalkerKind::Fetch { item } => seek_giver(world, ctx, walker, item),
        WalkerKind::Service { .. } | WalkerKind::RiskMitigation { .. } => {
            walker.task = Some(WalkerTask::Patrol);
            walker.state =
                WalkerState::Roaming(Roam::new(walker.position, ctx.config.roam_memory));
        }
        WalkerKind::Emigrant => start_emigration(ctx, walker),
    }
}

fn seek_receiver<M: MapQuery>(world: &World, ctx: &mut WalkerContext<M>, walker: &mut Walker) {
    let Some(stack) = walker.carried.items().next() else {
        return;
    };
    // a storage building only passes goods on to receivers at least as important
    let current_priority = home_entity(ctx, walker)
        .and_then(|entity| world.get::<&ItemReceiver>(entity).ok().map(|r| r.priority))
        .unwrap_or(u8::MAX);
    let request = LogisticsRequest {
        requester: walker.home,
        start: walker.position,
        item: &stack.item,
        quantity: stack.quantity,
        current_priority,
        max_distance: ctx.config.max_search_distance,
        path_type: ctx.config.path_type,
    };

    match find_receiver(world, ctx.map, ctx.structures.index(), &request) {
        Some(found) => {
            log::debug!(
                "{} delivers {} {} to {}",
                walker.id,
                found.reservation.quantity,
                stack.item,
                found.building
            );
            walker.task = Some(WalkerTask::Deliver {
                target: found.building,
                item: stack.item.clone(),
                quantity: found.reservation.quantity,
            });
            walker.reservations.push(found.reservation);
            walker.retries = 0;
            walker.state = WalkerState::Walking(Walk::new(found.path));
        }
        None => retry_later(world, ctx, walker),
    }
}

fn seek_giver<M: MapQuery>(
    world: &World,
    ctx: &mut WalkerContext<M>,
    walker: &mut Walker,
    item: Item,
) {
    let (Some(home), Some(entity)) = (walker.home, home_entity(ctx, walker)) else {
        give_up(world, ctx, walker);
        return;
    };
    let room = match (
        world.get::<&ItemReceiver>(entity),
        world.get::<&ItemStorage>(entity),
    ) {
        (Ok(receiver), Ok(storage)) => receiver.capacity(&storage, &item),
        _ => 0,
    };
    let quantity = room.min(walker.carried.remaining_capacity(&item));
    if quantity == 0 {
        walker.finished_errand = true;
        head_home(world, ctx, walker);
        return;
    }

    let request = LogisticsRequest {
        requester: walker.home,
        start: walker.position,
        item: &item,
        quantity,
        current_priority: u8::MAX,
        max_distance: ctx.config.max_search_distance,
        path_type: ctx.config.path_type,
    };
    let Some(found) = find_giver(world, ctx.map, ctx.structures.index(), &request) else {
        retry_later(world, ctx, walker);
        return;
    };

    let promised = found.reservation.quantity;
    let capacity = world
        .get::<&mut ItemStorage>(entity)
        .map(|mut storage| storage.reserve_capacity(&item, promised))
        .unwrap_or(0);
    log::debug!(
        "{} fetches {} {} from {}",
        walker.id,
        promised,
        item,
        found.building
    );
    walker.reservations.push(Reservation {
        building: home,
        item: item.clone(),
        quantity: capacity,
        kind: ReservationKind::Capacity,
    });
    walker.reservations.push(found.reservation);
    walker.task = Some(WalkerTask::Fetch {
        source: found.building,
        item,
        quantity: promised,
    });
    walker.retries = 0;
    walker.state = WalkerState::Walking(Walk::new(found.path));
}

/// Bounded retry after the resolver found nothing
fn retry_later<M: MapQuery>(world: &World, ctx: &mut WalkerContext<M>, walker: &mut Walker) {
    walker.retries += 1;
    if walker.retries > ctx.config.max_idle_retries {
        log::debug!("{} gave up after {} attempts", walker.id, walker.retries - 1);
        walker.finished_errand = true;
        head_home(world, ctx, walker);
    } else {
        walker.state = WalkerState::Waiting {
            remaining: ctx.config.idle_retry_seconds,
        };
    }
}

/// Max path length for walking back home or off the map
fn wander_budget(config: &SimConfig) -> u32 {
    config
        .max_search_distance
        .max(config.roam_steps)
        .saturating_mul(2)
}

fn head_home<M: MapQuery>(world: &World, ctx: &mut WalkerContext<M>, walker: &mut Walker) {
    walker.task = None;
    let entrance = home_entity(ctx, walker)
        .and_then(|entity| world.get::<&Building>(entity).ok().map(|b| b.entrance));
    let Some(entrance) = entrance else {
        give_up(world, ctx, walker);
        return;
    };
    if entrance == walker.position {
        unload_at_home(world, ctx, walker);
        walker.state = WalkerState::Terminated;
        return;
    }

    match find_grid_path(
        ctx.map,
        ctx.structures.index(),
        walker.position,
        entrance,
        wander_budget(ctx.config),
        ctx.config.path_type,
    ) {
        Some(path) => {
            walker.task = Some(WalkerTask::ReturnHome);
            walker.state = WalkerState::Walking(Walk::new(path));
        }
        None => {
            log::warn!("{} cannot find its way home from {:?}", walker.id, walker.position);
            give_up(world, ctx, walker);
        }
    }
}

fn start_emigration<M: MapQuery>(ctx: &mut WalkerContext<M>, walker: &mut Walker) {
    walker.task = Some(WalkerTask::Emigrate);
    let path = find_grid_path(
        ctx.map,
        ctx.structures.index(),
        walker.position,
        ctx.config.exit_point,
        wander_budget(ctx.config),
        PathType::Map,
    );
    walker.state = match path {
        Some(path) => WalkerState::Emigrating(Walk::new(path)),
        None => {
            log::debug!("{} has no way off the map", walker.id);
            WalkerState::Terminated
        }
    };
}

/// Drop the current errand and go home
fn abandon<M: MapQuery>(world: &World, ctx: &mut WalkerContext<M>, walker: &mut Walker) {
    release_all(world, ctx, walker);
    walker.finished_errand = true;
    walker.in_range.clear();
    head_home(world, ctx, walker);
}

fn release_all<M: MapQuery>(world: &World, ctx: &WalkerContext<M>, walker: &mut Walker) {
    for reservation in walker.reservations.drain(..) {
        release_reservation(world, ctx.registry, &reservation);
    }
}

/// Release every promise, drop whatever is still carried and terminate
fn give_up<M: MapQuery>(world: &World, ctx: &WalkerContext<M>, walker: &mut Walker) {
    release_all(world, ctx, walker);
    drop_carried(walker);
    walker.state = WalkerState::Terminated;
}

fn drop_carried(walker: &mut Walker) {
    if !walker.carried.is_empty() {
        log::warn!(
            "{} dropped {} units it could not return",
            walker.id,
            walker.carried.total_quantity()
        );
        walker.carried.clear();
    }
}

fn advance_walk<M: MapQuery>(
    world: &World,
    ctx: &mut WalkerContext<M>,
    walker: &mut Walker,
    walk: &mut Walk,
    delta_seconds: f32,
) -> StepOutcome {
    let distance = walker.speed * delta_seconds * efficiency(world, ctx, walker);
    let mut passed = Vec::new();
    let outcome = walk
        .progress
        .advance_through(&walk.path, distance, |point| passed.push(point));
    walker.position = walk.progress.current_point(&walk.path);
    visit(world, ctx, walker, &passed, delta_seconds);
    outcome
}

/// Returns true once the roam is over (step budget spent or nowhere to go)
fn advance_roam<M: MapQuery>(
    world: &World,
    ctx: &mut WalkerContext<M>,
    walker: &mut Walker,
    roam: &mut Roam,
    delta_seconds: f32,
) -> bool {
    let mut distance = walker.speed * delta_seconds * efficiency(world, ctx, walker);
    let map = ctx.map;
    let structures = ctx.structures;
    let index = structures.index();
    let path_type = ctx.config.path_type;
    let mut finished = false;
    let mut passed = Vec::new();

    while distance > 0.0 {
        let next = match roam.next {
            Some(next) => next,
            None => {
                let rng = &mut *ctx.rng;
                let choice = choose_next_step(
                    roam.current,
                    roam.previous,
                    &roam.memory,
                    |p| index.is_walkable(map, p, path_type),
                    |n| rng.gen_range(0..n),
                );
                match choice {
                    Some(next) => {
                        roam.next = Some(next);
                        next
                    }
                    None => {
                        finished = true;
                        break;
                    }
                }
            }
        };

        let left = 1.0 - roam.step_walked;
        if distance >= left {
            distance -= left;
            roam.previous = Some(roam.current);
            roam.current = next;
            roam.next = None;
            roam.step_walked = 0.0;
            roam.steps += 1;
            roam.memory.remember(next);
            walker.position = next;
            passed.push(next);
            if roam.steps >= ctx.config.roam_steps {
                finished = true;
                break;
            }
        } else {
            roam.step_walked += distance;
            distance = 0.0;
        }
    }

    visit(world, ctx, walker, &passed, delta_seconds);
    finished
}

fn arrive<M: MapQuery>(world: &World, ctx: &mut WalkerContext<M>, walker: &mut Walker) {
    walker.in_range.clear();
    match walker.task.take() {
        Some(WalkerTask::Deliver {
            target,
            item,
            quantity,
        }) => {
            let delivered = match ctx.registry.building(target) {
                Some(entity) => world
                    .get::<&mut ItemStorage>(entity)
                    .map(|mut storage| {
                        storage.deliver_reserved(&item, quantity, &mut walker.carried)
                    })
                    .unwrap_or(0),
                None => 0,
            };
            walker.forget_reservation(target, &item, ReservationKind::Capacity);
            if delivered > 0 {
                ctx.events.push(SimEvent::ItemsDelivered {
                    walker: walker.id,
                    building: target,
                    item,
                    quantity: delivered,
                });
            }
            if walker.carried.is_empty() {
                walker.finished_errand = true;
            }
            settle(ctx.config, walker);
        }
        Some(WalkerTask::Fetch {
            source,
            item,
            quantity,
        }) => {
            let collected = match ctx.registry.building(source) {
                Some(entity) => world
                    .get::<&mut ItemStorage>(entity)
                    .map(|mut storage| storage.take_reserved(&item, quantity, &mut walker.carried))
                    .unwrap_or(0),
                None => 0,
            };
            walker.forget_reservation(source, &item, ReservationKind::Stock);
            if collected > 0 {
                ctx.events.push(SimEvent::ItemsCollected {
                    walker: walker.id,
                    building: source,
                    item,
                    quantity: collected,
                });
                walker.finished_errand = true;
                head_home(world, ctx, walker);
            } else {
                release_all(world, ctx, walker);
                settle(ctx.config, walker);
            }
        }
        Some(WalkerTask::ReturnHome) => {
            unload_at_home(world, ctx, walker);
            walker.state = WalkerState::Terminated;
        }
        _ => settle(ctx.config, walker),
    }
}

/// Hand everything carried back to the home building
fn unload_at_home<M: MapQuery>(world: &World, ctx: &mut WalkerContext<M>, walker: &mut Walker) {
    let home = walker.home.zip(home_entity(ctx, walker));
    if let Some((home, entity)) = home {
        if let Ok(mut storage) = world.get::<&mut ItemStorage>(entity) {
            let promised: Vec<Reservation> = walker
                .reservations
                .iter()
                .filter(|r| r.building == home && r.kind == ReservationKind::Capacity)
                .cloned()
                .collect();
            for reservation in promised {
                let moved =
                    storage.deliver_reserved(&reservation.item, reservation.quantity, &mut walker.carried);
                walker.forget_reservation(home, &reservation.item, ReservationKind::Capacity);
                if moved > 0 {
                    ctx.events.push(SimEvent::ItemsDelivered {
                        walker: walker.id,
                        building: home,
                        item: reservation.item,
                        quantity: moved,
                    });
                }
            }
            walker.carried.move_items_to(&mut storage);
        }
    }
    release_all(world, ctx, walker);
    drop_carried(walker);
}

/// Buildings with a structure point within Manhattan `range` of `center`
pub fn buildings_in_range(
    structures: &StructureRegistry,
    registry: &EntityRegistry,
    center: Point,
    range: u32,
) -> BTreeSet<BuildingId> {
    let range = range as i32;
    let mut found = BTreeSet::new();
    for dx in -range..=range {
        let span = range - dx.abs();
        for dy in -span..=span {
            let point = Point::new(center.x + dx, center.y + dy);
            for structure in structures.index().get_structures(point, 0) {
                if let Some(building) = registry.owner_of(structure) {
                    found.insert(building);
                }
            }
        }
    }
    found
}

/// Apply the walker's effect to buildings in range of any cell `passed`
/// this tick or of where it stands now. Entering a building's range fires
/// once; staying in range fires every tick.
fn visit<M: MapQuery>(
    world: &World,
    ctx: &mut WalkerContext<M>,
    walker: &mut Walker,
    passed: &[Point],
    delta_seconds: f32,
) {
    if !matches!(
        walker.kind,
        WalkerKind::Service { .. } | WalkerKind::RiskMitigation { .. }
    ) {
        return;
    }
    let mut now = buildings_in_range(
        ctx.structures,
        ctx.registry,
        walker.position,
        ctx.config.visit_range,
    );
    for point in passed {
        now.extend(buildings_in_range(
            ctx.structures,
            ctx.registry,
            *point,
            ctx.config.visit_range,
        ));
    }

    for building in &now {
        let entered = !walker.in_range.contains(building);
        let Some(entity) = ctx.registry.building(*building) else {
            continue;
        };
        match &walker.kind {
            WalkerKind::Service { service } if entered => {
                let transition = match world.get::<&mut ServiceRecipients>(entity) {
                    Ok(mut services) => services
                        .get_mut(service)
                        .and_then(|recipient| recipient.fill(ctx.config.service_fill)),
                    Err(_) => None,
                };
                if transition == Some(ServiceTransition::Gained) {
                    ctx.events.push(SimEvent::ServiceGained {
                        building: *building,
                        service: service.clone(),
                    });
                }
            }
            WalkerKind::RiskMitigation { risk } => {
                let amount = ctx.config.risk_mitigation_per_second * delta_seconds;
                let transition = match world.get::<&mut RiskRecipients>(entity) {
                    Ok(mut risks) => risks
                        .get_mut(risk)
                        .and_then(|recipient| recipient.mitigate(amount)),
                    Err(_) => None,
                };
                if transition == Some(RiskTransition::Resolved) {
                    on_risk_resolved(world, ctx.config, ctx.events, *building, entity, risk);
                }
            }
            _ => {}
        }
    }
    walker.in_range = now;
}
