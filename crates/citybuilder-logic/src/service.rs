//! Decaying per-building service values.
//!
//! A building "has access" to a service while its value is above zero.
//! Decay and fills report the access transitions instead of firing callbacks,
//! so the caller decides what to do with them.

use serde::{Deserialize, Serialize};

pub const SERVICE_MAX: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceTransition {
    /// Value rose from zero
    Gained,
    /// Value decayed to zero
    Lost,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecipient {
    pub service: String,
    /// Current value in [0, 100]
    pub value: f32,
    pub loss_per_second: f32,
}

impl ServiceRecipient {
    pub fn new(service: impl Into<String>, loss_per_second: f32) -> Self {
        Self {
            service: service.into(),
            value: 0.0,
            loss_per_second,
        }
    }

    pub fn has_access(&self) -> bool {
        self.value > 0.0
    }

    /// Decay by `loss_per_second * multiplier * delta_seconds`, clamped at zero
    pub fn update(&mut self, multiplier: f32, delta_seconds: f32) -> Option<ServiceTransition> {
        let had_access = self.has_access();
        let loss = self.loss_per_second * multiplier * delta_seconds;
        self.value = (self.value - loss.max(0.0)).max(0.0);
        (had_access && !self.has_access()).then_some(ServiceTransition::Lost)
    }

    /// Add `amount`, clamped into [0, 100]
    pub fn fill(&mut self, amount: f32) -> Option<ServiceTransition> {
        let had_access = self.has_access();
        self.value = (self.value + amount).clamp(0.0, SERVICE_MAX);
        match (had_access, self.has_access()) {
            (false, true) => Some(ServiceTransition::Gained),
            (true, false) => Some(ServiceTransition::Lost),
            _ => None,
        }
    }
}
