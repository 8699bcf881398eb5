//! Generation - procedural creation of logistics worlds

mod world;

pub use world::*;
