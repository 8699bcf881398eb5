//! Per-base logistics state keyed by (partition, base).
//!
//! The registry is an ordinary value owned by whoever drives the tick loop,
//! so several independent worlds can coexist in one process.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::LogisticsConfig;
use crate::courier::CourierPool;
use crate::item::Inventory;

/// World partition (planet) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartitionId(pub u32);

/// Base identifier within a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BaseId(pub u32);

/// Fully qualified base address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BaseKey {
    pub partition: PartitionId,
    pub base: BaseId,
}

impl BaseKey {
    pub fn new(partition: u32, base: u32) -> Self {
        Self {
            partition: PartitionId(partition),
            base: BaseId(base),
        }
    }
}

impl fmt::Display for BaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition.0, self.base.0)
    }
}

/// Scheduler state for one base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseLogisticsEntry {
    pub key: BaseKey,
    pub pool: CourierPool,
    /// Inventory as of the last completed scan.
    pub last_known_inventory: Inventory,
    pub cooldown_counter: u32,
}

impl BaseLogisticsEntry {
    pub fn new(key: BaseKey, capacity: u32) -> Self {
        Self {
            key,
            pool: CourierPool::new(capacity),
            last_known_inventory: Inventory::new(),
            cooldown_counter: 0,
        }
    }

    /// Forget scan history so the next eligible tick scans from scratch.
    pub fn reset_scan_state(&mut self) {
        self.last_known_inventory = Inventory::new();
        self.cooldown_counter = 0;
    }
}

/// All base entries, grouped by partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseLogisticsRegistry {
    capacity: u32,
    partitions: BTreeMap<PartitionId, BTreeMap<BaseId, BaseLogisticsEntry>>,
}

impl BaseLogisticsRegistry {
    pub fn new(config: &LogisticsConfig) -> Self {
        Self {
            capacity: config.courier_capacity_per_base,
            partitions: BTreeMap::new(),
        }
    }

    /// Pool capacity used for newly created entries.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Fetch the entry for `key`, creating it with a fresh pool if unseen.
    pub fn get_or_create(&mut self, key: BaseKey) -> &mut BaseLogisticsEntry {
        let capacity = self.capacity;
        self.partitions
            .entry(key.partition)
            .or_default()
            .entry(key.base)
            .or_insert_with(|| {
                log::debug!("creating courier pool for base {key} (capacity {capacity})");
                BaseLogisticsEntry::new(key, capacity)
            })
    }

    pub fn get(&self, key: BaseKey) -> Option<&BaseLogisticsEntry> {
        self.partitions.get(&key.partition)?.get(&key.base)
    }

    pub fn get_mut(&mut self, key: BaseKey) -> Option<&mut BaseLogisticsEntry> {
        self.partitions.get_mut(&key.partition)?.get_mut(&key.base)
    }

    /// Drop every entry of a partition. Returns how many were removed.
    pub fn clear(&mut self, partition: PartitionId) -> usize {
        let Some(bases) = self.partitions.remove(&partition) else {
            return 0;
        };
        let in_flight: u64 = bases.values().map(|e| e.pool.carried_total()).sum();
        if in_flight > 0 {
            log::warn!(
                "partition {} unloaded with {} items still aboard couriers",
                partition.0,
                in_flight
            );
        }
        bases.len()
    }

    pub fn clear_all(&mut self) {
        self.partitions.clear();
    }

    /// Visit every entry of one partition.
    pub fn for_each(&self, partition: PartitionId, mut f: impl FnMut(&BaseLogisticsEntry)) {
        if let Some(bases) = self.partitions.get(&partition) {
            bases.values().for_each(|e| f(e));
        }
    }

    pub fn for_each_mut(&mut self, partition: PartitionId, mut f: impl FnMut(&mut BaseLogisticsEntry)) {
        if let Some(bases) = self.partitions.get_mut(&partition) {
            bases.values_mut().for_each(|e| f(e));
        }
    }

    pub fn partitions(&self) -> impl Iterator<Item = PartitionId> + '_ {
        self.partitions.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BaseLogisticsEntry> + '_ {
        self.partitions.values().flat_map(|bases| bases.values())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut BaseLogisticsEntry> + '_ {
        self.partitions.values_mut().flat_map(|bases| bases.values_mut())
    }

    pub fn len(&self) -> usize {
        self.partitions.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(capacity: u32) -> BaseLogisticsRegistry {
        BaseLogisticsRegistry::new(&LogisticsConfig {
            courier_capacity_per_base: capacity,
            ..LogisticsConfig::default()
        })
    }

    #[test]
    fn creates_lazily_with_configured_capacity() {
        let mut reg = registry(5);
        assert!(reg.get(BaseKey::new(1, 1)).is_none());
        let entry = reg.get_or_create(BaseKey::new(1, 1));
        assert_eq!(entry.pool.capacity(), 5);
        assert_eq!(entry.pool.idle_count(), 5);
        entry.cooldown_counter = 9;
        assert_eq!(reg.get_or_create(BaseKey::new(1, 1)).cooldown_counter, 9, "same entry returned");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn clear_drops_only_one_partition() {
        let mut reg = registry(2);
        reg.get_or_create(BaseKey::new(1, 1));
        reg.get_or_create(BaseKey::new(1, 2));
        reg.get_or_create(BaseKey::new(2, 1));
        assert_eq!(reg.clear(PartitionId(1)), 2);
        assert_eq!(reg.clear(PartitionId(1)), 0);
        assert_eq!(reg.len(), 1);
        assert!(reg.get(BaseKey::new(2, 1)).is_some());
    }

    #[test]
    fn for_each_visits_partition_in_base_order() {
        let mut reg = registry(1);
        for base in [3, 1, 2] {
            reg.get_or_create(BaseKey::new(7, base));
        }
        reg.get_or_create(BaseKey::new(8, 1));
        let mut seen = Vec::new();
        reg.for_each(PartitionId(7), |e| seen.push(e.key.base.0));
        assert_eq!(seen, vec![1, 2, 3]);

        reg.for_each_mut(PartitionId(7), |e| e.cooldown_counter = 5);
        assert_eq!(reg.iter().filter(|e| e.cooldown_counter == 5).count(), 3);
    }

    #[test]
    fn base_key_display() {
        assert_eq!(BaseKey::new(4, 12).to_string(), "4/12");
    }
}
