//! Item kinds, quantities, and base inventory snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Number of items of one kind.
pub type Quantity = u32;

/// Identifier of an item kind (0 is reserved for "nothing").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKind(pub u32);

impl ItemKind {
    /// The empty kind, never a valid cargo.
    pub const NONE: Self = Self(0);

    /// The base currency (ether) item. Never delivered to the mecha.
    pub const ETHER: Self = Self(6006);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

/// Quality (proliferation) tier carried alongside a stack of items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QualityTier(pub u8);

/// Cargo carried by one courier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub item: ItemKind,
    pub quantity: Quantity,
    pub tier: QualityTier,
}

impl Payload {
    pub fn new(item: ItemKind, quantity: Quantity, tier: QualityTier) -> Self {
        Self {
            item,
            quantity,
            tier,
        }
    }
}

/// Snapshot of a base's stock, keyed by item kind.
///
/// Ordered so two snapshots compare equal exactly when every kind and count
/// matches. Zero counts are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    counts: BTreeMap<ItemKind, Quantity>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` of `item`. Adding zero or the empty kind is a no-op.
    pub fn add(&mut self, item: ItemKind, amount: Quantity) {
        if amount == 0 || item.is_none() {
            return;
        }
        *self.counts.entry(item).or_insert(0) += amount;
    }

    /// Remove up to `amount` of `item`, returning how much was removed.
    pub fn remove(&mut self, item: ItemKind, amount: Quantity) -> Quantity {
        let Some(count) = self.counts.get_mut(&item) else {
            return 0;
        };
        let taken = amount.min(*count);
        *count -= taken;
        if *count == 0 {
            self.counts.remove(&item);
        }
        taken
    }

    pub fn get(&self, item: ItemKind) -> Quantity {
        self.counts.get(&item).copied().unwrap_or(0)
    }

    pub fn contains(&self, item: ItemKind) -> bool {
        self.get(item) > 0
    }

    /// Total quantity across all kinds.
    pub fn total(&self) -> u64 {
        self.counts.values().map(|&c| c as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Number of distinct kinds in stock.
    pub fn kinds(&self) -> usize {
        self.counts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemKind, Quantity)> + '_ {
        self.counts.iter().map(|(&k, &c)| (k, c))
    }
}

impl FromIterator<(ItemKind, Quantity)> for Inventory {
    fn from_iter<I: IntoIterator<Item = (ItemKind, Quantity)>>(iter: I) -> Self {
        let mut inv = Inventory::new();
        for (item, amount) in iter {
            inv.add(item, amount);
        }
        inv
    }
}
