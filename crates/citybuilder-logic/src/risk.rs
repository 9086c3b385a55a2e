//! Risk definitions and per-building risk exposure.
//!
//! Exposure rises over time. Once it is full and the chance roll succeeds
//! the risk executes (at most once per occurrence); mitigation lowers the
//! exposure and resolves an executed risk when it reaches zero.

use serde::{Deserialize, Serialize};

pub const RISK_MAX: f32 = 100.0;

/// What happens to a building when a risk executes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskEffect {
    /// Attach an addon (e.g. a disease marker); removed again on resolve
    AddAddon(String),
    /// Swap the building for another one on the same footprint (e.g. ruins)
    ReplaceBuilding(String),
    /// Remove the building
    Terminate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskDefinition {
    pub key: String,
    pub increase_per_second: f32,
    /// Probability per update that full exposure turns into an execution
    pub chance: f32,
    pub effect: RiskEffect,
}

impl RiskDefinition {
    pub fn new(key: impl Into<String>, increase_per_second: f32, effect: RiskEffect) -> Self {
        Self {
            key: key.into(),
            increase_per_second,
            chance: 1.0,
            effect,
        }
    }

    pub fn with_chance(mut self, chance: f32) -> Self {
        self.chance = chance.clamp(0.0, 1.0);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskTransition {
    Executed,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRecipient {
    pub risk: String,
    /// Exposure in [0, 100]
    pub value: f32,
    pub executed: bool,
}

impl RiskRecipient {
    pub fn new(risk: impl Into<String>) -> Self {
        Self {
            risk: risk.into(),
            value: 0.0,
            executed: false,
        }
    }

    /// Accumulate exposure. `roll` is a uniform sample in [0, 1).
    pub fn update(
        &mut self,
        definition: &RiskDefinition,
        multiplier: f32,
        delta_seconds: f32,
        roll: f32,
    ) -> Option<RiskTransition> {
        if self.executed {
            return None;
        }
        let increase = definition.increase_per_second * multiplier * delta_seconds;
        self.value = (self.value + increase.max(0.0)).min(RISK_MAX);
        if self.value >= RISK_MAX && roll < definition.chance {
            self.executed = true;
            return Some(RiskTransition::Executed);
        }
        None
    }

    /// Lower exposure; resolves an executed risk once exposure reaches zero
    pub fn mitigate(&mut self, amount: f32) -> Option<RiskTransition> {
        self.value = (self.value - amount.max(0.0)).max(0.0);
        if self.executed && self.value <= 0.0 {
            return self.resolve();
        }
        None
    }

    /// Clear an executed risk. Safe to call when nothing was executed.
    pub fn resolve(&mut self) -> Option<RiskTransition> {
        if !self.executed {
            return None;
        }
        self.executed = false;
        self.value = 0.0;
        Some(RiskTransition::Resolved)
    }
}
