//! Pure simulation logic for the city builder.
//!
//! This crate contains the logistics and agent logic that is independent of
//! any ECS, engine, or runtime. Functions take plain data and return results,
//! making them unit-testable and reusable by the engine crate and any
//! headless tooling.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Simulation tuning values and validation |
//! | [`grid`] | Points, map bounds, level masks, the map query capability |
//! | [`items`] | Items, quantities and reservation-aware item storage |
//! | [`pathfinding`] | Distance-bounded A* over walkable grid cells |
//! | [`progress`] | Reusable interval progress value type |
//! | [`risk`] | Risk definitions and per-building risk exposure |
//! | [`roaming`] | Bounded visit memory and next-step selection for roamers |
//! | [`service`] | Decaying per-building service values |
//! | [`structures`] | Structures, the point index and the owning registry |
//! | [`walking`] | Immutable walking paths and incremental path progress |

pub mod config;
pub mod grid;
pub mod items;
pub mod pathfinding;
pub mod progress;
pub mod risk;
pub mod roaming;
pub mod service;
pub mod structures;
pub mod walking;
