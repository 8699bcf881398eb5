//! Demand scanning: discovering and ranking unmet need at consumers.
//!
//! Three scanners share one contract: given the base's current stock and
//! position, return the consumers of their class that need an item the base
//! holds, sorted most urgent first (ties: nearest first). Scanners never
//! mutate anything.
//!
//! Urgency is a fill ratio in `[0, 1]`, lower = service sooner:
//! - dispenser: `current_stock / receivable_capacity`
//! - tower slot: `(current + on_order) / max`
//! - mecha slot: `current_total / required_threshold`
//!
//! The coordinator merges the three lists with [`merge_demands`]: all mecha
//! records first, then tower records, then dispenser records.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::geometry::Vec3;
use crate::interfaces::DemandSource;
use crate::item::{Inventory, ItemKind, Quantity};
use crate::registry::BaseKey;
use crate::target::{DeliveryTarget, DispenserId, StationId};

/// One unmet need at a consumer. Recomputed every scan, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandRecord {
    pub item: ItemKind,
    /// Exact amount still missing; 0 means "any amount".
    pub needed_quantity: Quantity,
    pub target: DeliveryTarget,
    pub position: Vec3,
    pub urgency: f32,
    pub distance_from_base: f32,
}

/// Inputs shared by all scanners for one base.
#[derive(Debug, Clone, Copy)]
pub struct ScanContext<'a> {
    pub inventory: &'a Inventory,
    pub base_position: Vec3,
    /// Dispensers filled above this fraction are skipped.
    pub dispenser_stock_ceiling: f32,
}

/// Order within one class: ascending urgency, then ascending distance.
pub fn compare_within_class(a: &DemandRecord, b: &DemandRecord) -> Ordering {
    a.urgency
        .total_cmp(&b.urgency)
        .then(a.distance_from_base.total_cmp(&b.distance_from_base))
}

/// Global service order: class, then urgency, then distance.
pub fn compare_demand(a: &DemandRecord, b: &DemandRecord) -> Ordering {
    a.target
        .class()
        .cmp(&b.target.class())
        .then_with(|| compare_within_class(a, b))
}

/// Stable sort into service order.
pub fn sort_demands(demands: &mut [DemandRecord]) {
    demands.sort_by(compare_demand);
}

/// Concatenate the three scanner outputs and sort into service order.
pub fn merge_demands(
    mecha: Vec<DemandRecord>,
    tower: Vec<DemandRecord>,
    dispenser: Vec<DemandRecord>,
) -> Vec<DemandRecord> {
    let mut all = Vec::with_capacity(mecha.len() + tower.len() + dispenser.len());
    all.extend(mecha);
    all.extend(tower);
    all.extend(dispenser);
    sort_demands(&mut all);
    all
}

fn fill_ratio(current: u64, capacity: u64) -> f32 {
    if capacity == 0 {
        1.0
    } else {
        (current as f32 / capacity as f32).clamp(0.0, 1.0)
    }
}

// ── Dispensers ─────────────────────────────────────────────────────────

/// Dispenser storage mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageMode {
    None,
    Supply,
    Demand,
}

/// What the dispenser scanner needs to know about one dispenser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispenserView {
    pub id: DispenserId,
    pub position: Vec3,
    pub mode: StorageMode,
    /// Item filter; `ItemKind::NONE` when unset.
    pub filter: ItemKind,
    pub current_stock: Quantity,
    pub storage_slots: u32,
    /// Slots locked out of receiving.
    pub reserved_slots: u32,
    pub stack_size: u32,
    /// Cargo parked in the overflow area that must drain first.
    pub holding_overflow: bool,
}

impl DispenserView {
    pub fn receivable_capacity(&self) -> u64 {
        self.storage_slots.saturating_sub(self.reserved_slots) as u64 * self.stack_size as u64
    }
}

pub fn scan_dispensers(dispensers: &[DispenserView], ctx: &ScanContext<'_>) -> Vec<DemandRecord> {
    let mut demands: Vec<DemandRecord> = dispensers
        .iter()
        .filter(|d| d.mode == StorageMode::Demand)
        .filter(|d| !d.filter.is_none())
        .filter(|d| !d.holding_overflow)
        .filter(|d| ctx.inventory.contains(d.filter))
        .filter_map(|d| {
            let capacity = d.receivable_capacity();
            let current = d.current_stock as u64;
            if capacity == 0 || current >= capacity {
                return None;
            }
            let urgency = fill_ratio(current, capacity);
            if urgency > ctx.dispenser_stock_ceiling {
                return None;
            }
            Some(DemandRecord {
                item: d.filter,
                needed_quantity: (capacity - current).min(Quantity::MAX as u64) as Quantity,
                target: DeliveryTarget::Dispenser(d.id),
                position: d.position,
                urgency,
                distance_from_base: ctx.base_position.distance(&d.position),
            })
        })
        .collect();
    demands.sort_by(compare_within_class);
    demands
}

// ── Logistics towers ───────────────────────────────────────────────────

/// One storage slot of a logistics tower.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TowerSlotView {
    pub station: StationId,
    pub slot: u16,
    pub position: Vec3,
    pub item: ItemKind,
    /// Slot is configured for local demand.
    pub local_demand: bool,
    pub current: Quantity,
    /// Already on its way from other suppliers.
    pub on_order: Quantity,
    pub max: Quantity,
}

pub fn scan_towers(slots: &[TowerSlotView], ctx: &ScanContext<'_>) -> Vec<DemandRecord> {
    let mut demands: Vec<DemandRecord> = slots
        .iter()
        .filter(|s| s.local_demand && !s.item.is_none())
        .filter(|s| ctx.inventory.contains(s.item))
        .filter_map(|s| {
            let pending = s.current as u64 + s.on_order as u64;
            let max = s.max as u64;
            if pending >= max {
                return None;
            }
            Some(DemandRecord {
                item: s.item,
                needed_quantity: (max - pending) as Quantity,
                target: DeliveryTarget::LogisticsTower(s.station, s.slot),
                position: s.position,
                urgency: fill_ratio(pending, max),
                distance_from_base: ctx.base_position.distance(&s.position),
            })
        })
        .collect();
    demands.sort_by(compare_within_class);
    demands
}

// ── Mecha ──────────────────────────────────────────────────────────────

/// One delivery-package slot of the mecha.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MechaSlotView {
    pub index: u16,
    pub item: ItemKind,
    /// Amount the player holds across inventory and package.
    pub current_total: Quantity,
    /// Requested threshold for this slot.
    pub required: Quantity,
}

/// The player's mecha as the mecha scanner sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MechaView {
    pub alive: bool,
    /// Warping or otherwise travelling between partitions.
    pub in_transit: bool,
    pub delivery_unlocked: bool,
    pub position: Vec3,
    pub slots: Vec<MechaSlotView>,
}

pub fn scan_mecha(mecha: &MechaView, ctx: &ScanContext<'_>) -> Vec<DemandRecord> {
    if !mecha.alive || mecha.in_transit || !mecha.delivery_unlocked {
        return Vec::new();
    }
    let distance = ctx.base_position.arc_distance(&mecha.position);
    let mut demands: Vec<DemandRecord> = mecha
        .slots
        .iter()
        .filter(|s| !s.item.is_none() && s.item != ItemKind::ETHER)
        .filter(|s| s.required > 0 && s.current_total < s.required)
        .filter(|s| ctx.inventory.contains(s.item))
        .map(|s| DemandRecord {
            item: s.item,
            needed_quantity: s.required - s.current_total,
            target: DeliveryTarget::MechaSlot(s.index),
            position: mecha.position,
            urgency: fill_ratio(s.current_total as u64, s.required as u64),
            distance_from_base: distance,
        })
        .collect();
    demands.sort_by(compare_within_class);
    demands
}

// ── Snapshot-backed source ─────────────────────────────────────────────

/// A frozen view of one partition's consumers, usable as a [`DemandSource`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub mecha: Option<MechaView>,
    pub towers: Vec<TowerSlotView>,
    pub dispensers: Vec<DispenserView>,
}

impl DemandSource for WorldSnapshot {
    fn mecha_demand(&self, _base: BaseKey, ctx: &ScanContext<'_>) -> Vec<DemandRecord> {
        self.mecha
            .as_ref()
            .map(|m| scan_mecha(m, ctx))
            .unwrap_or_default()
    }

    fn tower_demand(&self, _base: BaseKey, ctx: &ScanContext<'_>) -> Vec<DemandRecord> {
        scan_towers(&self.towers, ctx)
    }

    fn dispenser_demand(&self, _base: BaseKey, ctx: &ScanContext<'_>) -> Vec<DemandRecord> {
        scan_dispensers(&self.dispensers, ctx)
    }
}
