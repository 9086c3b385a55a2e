//! Service decay, area effects and housing reactions.

use citybuilder_logic::config::SimConfig;
use citybuilder_logic::grid::Point;
use citybuilder_logic::risk::RiskTransition;
use citybuilder_logic::service::ServiceTransition;
use hecs::{Entity, World};

use super::risks::on_risk_resolved;
use crate::components::*;
use crate::events::{EventQueue, SimEvent};

/// Decay every service value. Returns the services lost this tick.
pub fn service_system(
    world: &mut World,
    multiplier: f32,
    delta_seconds: f32,
    events: &mut EventQueue,
) -> Vec<(BuildingId, String)> {
    let mut lost = Vec::new();
    for (_, (building, services)) in world.query_mut::<(&Building, &mut ServiceRecipients)>() {
        for recipient in services.0.iter_mut() {
            if recipient.update(multiplier, delta_seconds) == Some(ServiceTransition::Lost) {
                log::debug!("{} lost {}", building.id, recipient.service);
                events.push(SimEvent::ServiceLost {
                    building: building.id,
                    service: recipient.service.clone(),
                });
                lost.push((building.id, recipient.service.clone()));
            }
        }
    }
    lost
}

/// Apply every area effect to the buildings whose entrance lies in its radius
pub fn area_effect_system(
    world: &mut World,
    config: &SimConfig,
    delta_seconds: f32,
    events: &mut EventQueue,
) {
    let sources: Vec<(Point, AreaEffect)> = world
        .query::<(&Building, &AreaEffect)>()
        .iter()
        .map(|(_, (building, effect))| (building.entrance, effect.clone()))
        .collect();
    if sources.is_empty() {
        return;
    }

    let mut resolved: Vec<(BuildingId, Entity, String)> = Vec::new();
    for (entity, (building, mut services, mut risks)) in world.query_mut::<(
        &Building,
        Option<&mut ServiceRecipients>,
        Option<&mut RiskRecipients>,
    )>() {
        for (origin, effect) in &sources {
            if origin.manhattan(&building.entrance) > effect.radius {
                continue;
            }
            match &effect.kind {
                AreaEffectKind::Service {
                    service,
                    fill_per_second,
                } => {
                    let transition = services
                        .as_deref_mut()
                        .and_then(|s| s.get_mut(service))
                        .and_then(|r| r.fill(fill_per_second * delta_seconds));
                    if transition == Some(ServiceTransition::Gained) {
                        events.push(SimEvent::ServiceGained {
                            building: building.id,
                            service: service.clone(),
                        });
                    }
                }
                AreaEffectKind::Risk {
                    risk,
                    mitigation_per_second,
                } => {
                    let transition = risks
                        .as_deref_mut()
                        .and_then(|r| r.get_mut(risk))
                        .and_then(|r| r.mitigate(mitigation_per_second * delta_seconds));
                    if transition == Some(RiskTransition::Resolved) {
                        resolved.push((building.id, entity, risk.clone()));
                    }
                }
            }
        }
    }

    for (building, entity, risk) in resolved {
        on_risk_resolved(world, config, events, building, entity, &risk);
    }
}

/// Residents leave houses that lost a required service, one per loss.
/// Returns the houses that should send an emigrant.
pub fn housing_system(
    world: &mut World,
    lost: &[(BuildingId, String)],
    events: &mut EventQueue,
) -> Vec<BuildingId> {
    if lost.is_empty() {
        return Vec::new();
    }
    let mut emigrants = Vec::new();
    for (_, (building, housing)) in world.query_mut::<(&Building, &mut Housing)>() {
        for (_, service) in lost.iter().filter(|(id, _)| *id == building.id) {
            if housing.population == 0 || !housing.required_services.contains(service) {
                continue;
            }
            housing.population -= 1;
            log::info!(
                "a resident left {} after losing {} ({} remain)",
                building.id,
                service,
                housing.population
            );
            events.push(SimEvent::ResidentLeft {
                building: building.id,
                remaining: housing.population,
            });
            emigrants.push(building.id);
        }
    }
    emigrants
}

#[cfg(test)]
mod tests {
    use super::*;
    use citybuilder_logic::risk::{RiskDefinition, RiskEffect, RiskRecipient};
    use citybuilder_logic::service::ServiceRecipient;
    use citybuilder_logic::structures::StructureId;

    fn building(id: u32, entrance: Point) -> Building {
        Building {
            id: BuildingId(id),
            key: "b".to_string(),
            structure: StructureId(id),
            entrance,
            efficiency: 1.0,
        }
    }

    #[test]
    fn test_decay_reports_loss_once() {
        let mut world = World::new();
        let mut recipient = ServiceRecipient::new("water", 10.0);
        recipient.fill(15.0);
        world.spawn((building(1, Point::ZERO), ServiceRecipients(vec![recipient])));
        let mut events = EventQueue::new();

        assert!(service_system(&mut world, 1.0, 1.0, &mut events).is_empty());
        let lost = service_system(&mut world, 1.0, 1.0, &mut events);
        assert_eq!(lost, vec![(BuildingId(1), "water".to_string())]);
        assert!(service_system(&mut world, 1.0, 1.0, &mut events).is_empty());
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_area_service_reaches_radius_only() {
        let mut world = World::new();
        world.spawn((
            building(1, Point::new(5, 5)),
            AreaEffect {
                radius: 2,
                kind: AreaEffectKind::Service {
                    service: "religion".to_string(),
                    fill_per_second: 10.0,
                },
            },
        ));
        let near = world.spawn((
            building(2, Point::new(6, 6)),
            ServiceRecipients(vec![ServiceRecipient::new("religion", 0.0)]),
        ));
        let far = world.spawn((
            building(3, Point::new(9, 5)),
            ServiceRecipients(vec![ServiceRecipient::new("religion", 0.0)]),
        ));
        let mut events = EventQueue::new();

        area_effect_system(&mut world, &SimConfig::default(), 0.5, &mut events);
        area_effect_system(&mut world, &SimConfig::default(), 0.5, &mut events);

        let value = |e| world.get::<&ServiceRecipients>(e).unwrap().get("religion").unwrap().value;
        assert_eq!(value(near), 10.0);
        assert_eq!(value(far), 0.0);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_area_risk_mitigation_resolves() {
        let config = SimConfig {
            risks: vec![RiskDefinition::new(
                "disease",
                10.0,
                RiskEffect::AddAddon("sick".to_string()),
            )],
            ..Default::default()
        };
        let mut world = World::new();
        world.spawn((
            building(1, Point::new(0, 0)),
            AreaEffect {
                radius: 3,
                kind: AreaEffectKind::Risk {
                    risk: "disease".to_string(),
                    mitigation_per_second: 60.0,
                },
            },
        ));
        let mut recipient = RiskRecipient::new("disease");
        recipient.value = 100.0;
        recipient.executed = true;
        let house = world.spawn((
            building(2, Point::new(1, 1)),
            RiskRecipients(vec![recipient]),
            Addons(vec!["sick".to_string()]),
        ));
        let mut events = EventQueue::new();

        area_effect_system(&mut world, &config, 1.0, &mut events);
        assert!(world.get::<&Addons>(house).unwrap().has("sick"));
        area_effect_system(&mut world, &config, 1.0, &mut events);
        assert!(!world.get::<&Addons>(house).unwrap().has("sick"));
        assert!(!world.get::<&RiskRecipients>(house).unwrap().get("disease").unwrap().executed);
    }

    #[test]
    fn test_housing_loses_resident_on_required_service() {
        let mut world = World::new();
        world.spawn((
            building(1, Point::ZERO),
            Housing {
                population: 1,
                capacity: 4,
                required_services: vec!["water".to_string()],
            },
        ));
        let mut events = EventQueue::new();

        let lost = vec![
            (BuildingId(1), "religion".to_string()),
            (BuildingId(1), "water".to_string()),
        ];
        assert_eq!(housing_system(&mut world, &lost, &mut events), vec![BuildingId(1)]);
        // nobody left to leave
        assert!(housing_system(&mut world, &lost, &mut events).is_empty());
        assert_eq!(events.len(), 1);
    }
}
