//! Logistics bases and their item storage.

use std::collections::BTreeMap;

use courier_logic::item::{Inventory, ItemKind, QualityTier, Quantity};
use courier_logic::registry::BaseId;
use serde::{Deserialize, Serialize};

/// Bounded item storage. Tracks the best quality tier seen per item kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Storage {
    pub items: Inventory,
    pub tiers: BTreeMap<ItemKind, QualityTier>,
    /// Total items the storage holds before refusing normal inserts.
    pub capacity: u64,
}

impl Storage {
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn free_space(&self) -> u64 {
        self.capacity.saturating_sub(self.items.total())
    }

    pub fn take(&mut self, item: ItemKind, max: Quantity) -> (Quantity, QualityTier) {
        let taken = self.items.remove(item, max);
        let tier = self.tiers.get(&item).copied().unwrap_or_default();
        if !self.items.contains(item) {
            self.tiers.remove(&item);
        }
        (taken, tier)
    }

    /// Insert up to the remaining capacity.
    pub fn add(&mut self, item: ItemKind, quantity: Quantity, tier: QualityTier) -> Quantity {
        let accepted = (quantity as u64).min(self.free_space()) as Quantity;
        self.force_add(item, accepted, tier)
    }

    /// Insert ignoring capacity.
    pub fn force_add(&mut self, item: ItemKind, quantity: Quantity, tier: QualityTier) -> Quantity {
        if quantity == 0 || item.is_none() {
            return 0;
        }
        self.items.add(item, quantity);
        let best = self.tiers.entry(item).or_default();
        *best = (*best).max(tier);
        quantity
    }
}

/// A logistics base: owns a courier pool (in the registry) and a storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogisticsBase {
    pub id: BaseId,
    pub storage: Storage,
}

/// Periodic item output feeding a base's storage (a mining rig, an
/// assembler line). Stalls while the storage is full.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Producer {
    pub item: ItemKind,
    pub per_cycle: Quantity,
}
