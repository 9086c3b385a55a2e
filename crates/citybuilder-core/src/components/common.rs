//! Stable identifiers shared by buildings and walkers.
//!
//! hecs entities are not stable across save/load, so every cross-entity
//! reference goes through these ids and the engine's lookup tables.

use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BuildingId(pub u32);

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct WalkerId(pub u32);

impl std::fmt::Display for BuildingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "building#{}", self.0)
    }
}

impl std::fmt::Display for WalkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "walker#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(BuildingId(3).to_string(), "building#3");
        assert_eq!(WalkerId(12).to_string(), "walker#12");
    }
}
