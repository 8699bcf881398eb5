//! Components shared by every placed entity.

use courier_logic::geometry::Vec3;
use courier_logic::registry::PartitionId;
use serde::{Deserialize, Serialize};

/// Where an entity sits: which partition (planet) and its world position
/// relative to the planet centre.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub partition: PartitionId,
    pub position: Vec3,
}

impl Location {
    pub fn new(partition: PartitionId, position: Vec3) -> Self {
        Self {
            partition,
            position,
        }
    }
}

/// Display name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Name(pub String);
