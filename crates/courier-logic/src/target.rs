//! Delivery targets: which kind of consumer a flight serves.

use serde::{Deserialize, Serialize};

/// Dispenser identifier within a world partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DispenserId(pub u32);

/// Logistics tower (station) identifier within a world partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StationId(pub u32);

/// The consumer a courier is flying to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryTarget {
    Dispenser(DispenserId),
    /// A delivery-package slot on the player's mecha.
    MechaSlot(u16),
    /// A storage slot of a logistics tower, by station and slot index.
    LogisticsTower(StationId, u16),
}

/// Service class of a target. Variants are declared in service order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TargetClass {
    Mecha,
    Tower,
    Dispenser,
}

impl DeliveryTarget {
    pub fn class(&self) -> TargetClass {
        match self {
            DeliveryTarget::MechaSlot(_) => TargetClass::Mecha,
            DeliveryTarget::LogisticsTower(..) => TargetClass::Tower,
            DeliveryTarget::Dispenser(_) => TargetClass::Dispenser,
        }
    }

    /// Whether the target moves and must be chased rather than flown to.
    pub fn is_moving(&self) -> bool {
        matches!(self, DeliveryTarget::MechaSlot(_))
    }
}

impl std::fmt::Display for DeliveryTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryTarget::Dispenser(id) => write!(f, "dispenser[{}]", id.0),
            DeliveryTarget::MechaSlot(slot) => write!(f, "mecha slot[{slot}]"),
            DeliveryTarget::LogisticsTower(station, slot) => {
                write!(f, "tower[{}] slot[{slot}]", station.0)
            }
        }
    }
}
