//! Risk accumulation and the effects of executed or resolved risks.
//!
//! Adding or removing an addon happens in place. Replacing or removing a
//! building changes the engine's lookup tables, so those come back as
//! [`BuildingAction`]s for the engine to apply after the system runs.

use citybuilder_logic::config::SimConfig;
use citybuilder_logic::risk::{RiskEffect, RiskTransition};
use hecs::{Entity, World};
use rand::Rng;

use crate::components::*;
use crate::events::{EventQueue, SimEvent};
use crate::rng::SimRng;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildingAction {
    Replace { building: BuildingId, key: String },
    Terminate { building: BuildingId },
}

/// Grow every risk recipient's exposure and execute full ones
pub fn risk_system(
    world: &mut World,
    config: &SimConfig,
    rng: &mut SimRng,
    delta_seconds: f32,
    events: &mut EventQueue,
) -> Vec<BuildingAction> {
    // building id order keeps the roll sequence independent of archetype layout
    let mut targets: Vec<(BuildingId, Entity)> = world
        .query::<(&Building, &RiskRecipients)>()
        .iter()
        .map(|(entity, (building, _))| (building.id, entity))
        .collect();
    targets.sort_by_key(|(id, _)| *id);

    let mut executed: Vec<(BuildingId, Entity, String)> = Vec::new();
    for (building, entity) in targets {
        let Ok(mut risks) = world.get::<&mut RiskRecipients>(entity) else {
            continue;
        };
        for recipient in risks.0.iter_mut() {
            let Some(definition) = config.risk(&recipient.risk) else {
                continue;
            };
            let roll: f32 = rng.gen();
            let transition =
                recipient.update(definition, config.risk_multiplier, delta_seconds, roll);
            if transition == Some(RiskTransition::Executed) {
                executed.push((building, entity, recipient.risk.clone()));
            }
        }
    }

    executed
        .into_iter()
        .filter_map(|(building, entity, risk)| {
            on_risk_executed(world, config, events, building, entity, &risk)
        })
        .collect()
}

pub fn on_risk_executed(
    world: &World,
    config: &SimConfig,
    events: &mut EventQueue,
    building: BuildingId,
    entity: Entity,
    risk: &str,
) -> Option<BuildingAction> {
    log::info!("risk '{}' executed on {}", risk, building);
    events.push(SimEvent::RiskExecuted {
        building,
        risk: risk.to_string(),
    });
    match &config.risk(risk)?.effect {
        RiskEffect::AddAddon(addon) => {
            if let Ok(mut addons) = world.get::<&mut Addons>(entity) {
                if !addons.has(addon) {
                    addons.0.push(addon.clone());
                }
            }
            None
        }
        RiskEffect::ReplaceBuilding(key) => Some(BuildingAction::Replace {
            building,
            key: key.clone(),
        }),
        RiskEffect::Terminate => Some(BuildingAction::Terminate { building }),
    }
}

/// Undo what can be undone: addons are removed, replaced or removed
/// buildings stay as they are
pub fn on_risk_resolved(
    world: &World,
    config: &SimConfig,
    events: &mut EventQueue,
    building: BuildingId,
    entity: Entity,
    risk: &str,
) {
    log::info!("risk '{}' resolved on {}", risk, building);
    events.push(SimEvent::RiskResolved {
        building,
        risk: risk.to_string(),
    });
    if let Some(RiskEffect::AddAddon(addon)) = config.risk(risk).map(|d| &d.effect) {
        if let Ok(mut addons) = world.get::<&mut Addons>(entity) {
            addons.0.retain(|a| a != addon);
        }
    }
}
