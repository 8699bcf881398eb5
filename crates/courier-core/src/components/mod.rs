//! Component definitions for the logistics world.
//!
//! Components are pure data structs attached to entities.
//! Behavior lives in systems.

mod common;
mod consumers;
mod storage;

pub use common::*;
pub use consumers::*;
pub use storage::*;
