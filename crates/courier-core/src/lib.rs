//! Courier Core - Base Logistics World
//!
//! An ECS host for the courier scheduler in `courier_logic`. Bases, dispensers,
//! logistics towers and the mecha live in a `hecs` world; every frame each
//! base on a loaded partition is ticked against that world.
//!
//! # Architecture
//!
//! - **Entities**: bases, dispensers, towers, the mecha
//! - **Components**: pure data (Location, LogisticsBase, Dispenser, ...)
//! - **Systems**: the world host the scheduler talks to, plus the economy
//!   (production, consumption, mecha walking)
//!
//! # Example
//!
//! ```rust,no_run
//! use courier_core::prelude::*;
//! use courier_core::generation::WorldConfig;
//!
//! let mut engine = LogisticsEngine::default();
//! engine.generate(&WorldConfig::default());
//!
//! loop {
//!     engine.update(); // one frame
//! }
//! ```

pub mod components;
pub mod engine;
pub mod generation;
pub mod persistence;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::engine::{EngineStats, LogisticsEngine};
    pub use courier_logic::{BaseKey, LogisticsConfig, PartitionId};
}
