//! City builder core - logistics simulation engine
//!
//! An ECS-based simulation of a city's buildings and the walkers that move
//! goods between them, carry services to houses and fight risks like fire
//! and disease.
//!
//! # Architecture
//!
//! The simulation uses an Entity Component System (ECS) architecture via `hecs`:
//! - **Entities**: Buildings and walkers
//! - **Components**: Pure data attached to entities (storage, givers, receivers, spawners, ...)
//! - **Systems**: Logic that queries and updates components
//!
//! Map geometry, structures, storage and pathfinding live in `citybuilder-logic`.
//!
//! # Example
//!
//! ```rust,no_run
//! use citybuilder_core::prelude::*;
//! use citybuilder_logic::config::SimConfig;
//! use citybuilder_logic::grid::{Point, TileMap};
//!
//! let mut engine = SimulationEngine::new(SimConfig::default(), TileMap::new(64, 64));
//!
//! engine
//!     .place_building(&BuildingBlueprint::new("well", Point::new(4, 4), 1, 1, Point::new(4, 5)))
//!     .expect("free spot");
//!
//! loop {
//!     engine.update(1.0 / 60.0); // 60 FPS
//!     for event in engine.drain_events() {
//!         println!("{:?}", event);
//!     }
//! }
//! ```

pub mod blueprint;
pub mod components;
pub mod engine;
pub mod events;
pub mod persistence;
pub mod registry;
pub mod rng;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::blueprint::{BuildingBlueprint, PlacementError};
    pub use crate::components::*;
    pub use crate::engine::SimulationEngine;
    pub use crate::events::SimEvent;
}
