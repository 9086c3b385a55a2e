//! Component definitions for the ECS simulation.
//!
//! Components are pure data structs attached to entities.
//! They have no behavior - that lives in systems.

mod building;
mod common;
mod walker;

pub use building::*;
pub use common::*;
pub use walker::*;
