//! Simulation tuning values.
//!
//! Everything the engine would otherwise hard-code lives here so scenarios
//! can be described in JSON and replayed deterministically.
//!
//! ```
//! use citybuilder_logic::config::{SimConfig, validate_config};
//!
//! let config = SimConfig::default();
//! assert!(validate_config(&config).is_empty());
//! ```

use serde::{Deserialize, Serialize};

use crate::grid::{PathType, Point};
use crate::risk::RiskDefinition;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed for every random decision (roaming, risk rolls)
    pub seed: u64,
    /// Walker speed in cells per second
    pub walker_speed: f32,
    /// Units a single walker carries
    pub carry_capacity: u32,
    /// Manhattan range within which walkers visit buildings
    pub visit_range: u32,
    /// Steps a roamer takes before heading home
    pub roam_steps: u32,
    /// Recently visited points a roamer avoids
    pub roam_memory: usize,
    /// Seconds a walker waits after arriving (0 = no waiting)
    pub dwell_seconds: f32,
    /// Seconds an idle walker waits before asking the resolver again
    pub idle_retry_seconds: f32,
    /// Failed resolver attempts before a walker gives up
    pub max_idle_retries: u32,
    /// Max path length for resolver searches
    pub max_search_distance: u32,
    /// Traversal rules for walkers
    pub path_type: PathType,
    /// Service value added when a service walker passes
    pub service_fill: f32,
    /// Risk exposure removed per second while a mitigating walker is in range
    pub risk_mitigation_per_second: f32,
    /// Global multiplier on service decay
    pub service_multiplier: f32,
    /// Global multiplier on risk growth
    pub risk_multiplier: f32,
    /// Where emigrants leave the map
    pub exit_point: Point,
    pub risks: Vec<RiskDefinition>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            walker_speed: 2.0,
            carry_capacity: 10,
            visit_range: 1,
            roam_steps: 20,
            roam_memory: 12,
            dwell_seconds: 0.0,
            idle_retry_seconds: 2.0,
            max_idle_retries: 5,
            max_search_distance: 40,
            path_type: PathType::Map,
            service_fill: 50.0,
            risk_mitigation_per_second: 20.0,
            service_multiplier: 1.0,
            risk_multiplier: 1.0,
            exit_point: Point::ZERO,
            risks: Vec::new(),
        }
    }
}

impl SimConfig {
    pub fn risk(&self, key: &str) -> Option<&RiskDefinition> {
        self.risks.iter().find(|r| r.key == key)
    }
}

/// Human-readable problems with a configuration; empty when valid
pub fn validate_config(config: &SimConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if config.walker_speed <= 0.0 {
        errors.push(format!(
            "walker_speed must be positive, got {}",
            config.walker_speed
        ));
    }
    if config.carry_capacity == 0 {
        errors.push("carry_capacity must be at least 1".to_string());
    }
    if config.roam_steps == 0 {
        errors.push("roam_steps must be at least 1".to_string());
    }
    if config.dwell_seconds < 0.0 {
        errors.push("dwell_seconds cannot be negative".to_string());
    }
    if config.idle_retry_seconds < 0.0 {
        errors.push("idle_retry_seconds cannot be negative".to_string());
    }
    if config.max_search_distance == 0 {
        errors.push("max_search_distance must be at least 1".to_string());
    }
    if !(0.0..=100.0).contains(&config.service_fill) {
        errors.push(format!(
            "service_fill must be within 0-100, got {}",
            config.service_fill
        ));
    }
    if config.service_multiplier < 0.0 || config.risk_multiplier < 0.0 {
        errors.push("multipliers cannot be negative".to_string());
    }

    for (i, risk) in config.risks.iter().enumerate() {
        if risk.key.is_empty() {
            errors.push(format!("risk #{} has an empty key", i));
        }
        if !(0.0..=1.0).contains(&risk.chance) {
            errors.push(format!("risk '{}' chance must be within 0-1", risk.key));
        }
        if config.risks[..i].iter().any(|r| r.key == risk.key) {
            errors.push(format!("risk '{}' is defined twice", risk.key));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskEffect;

    #[test]
    fn test_default_is_valid() {
        assert!(validate_config(&SimConfig::default()).is_empty());
    }

    #[test]
    fn test_invalid_values_reported() {
        let config = SimConfig {
            walker_speed: 0.0,
            carry_capacity: 0,
            service_fill: 150.0,
            ..Default::default()
        };
        let errors = validate_config(&config);
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("walker_speed"));
    }

    #[test]
    fn test_duplicate_risks_reported() {
        let fire = RiskDefinition::new("fire", 1.0, RiskEffect::Terminate);
        let config = SimConfig {
            risks: vec![fire.clone(), fire],
            ..Default::default()
        };
        let errors = validate_config(&config);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("defined twice"));
    }

    #[test]
    fn test_risk_lookup() {
        let config = SimConfig {
            risks: vec![RiskDefinition::new("disease", 1.0, RiskEffect::Terminate)],
            ..Default::default()
        };
        assert!(config.risk("disease").is_some());
        assert!(config.risk("fire").is_none());
    }
}
