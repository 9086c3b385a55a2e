//! Systems - logic that operates on components

mod logistics;
mod production;
mod risks;
mod services;
mod spawners;
mod walkers;

pub use logistics::*;
pub use production::*;
pub use risks::*;
pub use services::*;
pub use spawners::*;
pub use walkers::*;
