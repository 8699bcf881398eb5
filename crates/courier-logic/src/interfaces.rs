//! Collaborator interfaces the scheduler consumes from its host.
//!
//! The host owns the real storages, consumers and avatar. The scheduler only
//! sees them through these traits, so a host can be an ECS world, a game
//! adapter, or a plain in-memory fake in tests.

use crate::demand::{DemandRecord, ScanContext};
use crate::geometry::Vec3;
use crate::item::{Inventory, ItemKind, Payload, QualityTier, Quantity};
use crate::registry::BaseKey;
use crate::target::DeliveryTarget;

/// Read access to a base's current stock.
pub trait InventorySource {
    fn snapshot(&self, base: BaseKey) -> Inventory;
}

/// Atomic item transfers in and out of a base's storage.
pub trait ItemSink {
    /// Remove up to `max` of `item`. Returns the amount actually taken and
    /// its quality tier.
    fn take(&mut self, base: BaseKey, item: ItemKind, max: Quantity) -> (Quantity, QualityTier);

    /// Insert up to `quantity`; returns how much was accepted (never more
    /// than `quantity`). The caller handles any shortfall.
    fn give(&mut self, base: BaseKey, item: ItemKind, quantity: Quantity, tier: QualityTier)
        -> Quantity;

    /// Insert ignoring capacity limits. Used by the pre-save drain, where a
    /// rejected refund means lost items. Hosts that can overfill storage
    /// should override this.
    fn force_give(
        &mut self,
        base: BaseKey,
        item: ItemKind,
        quantity: Quantity,
        tier: QualityTier,
    ) -> Quantity {
        self.give(base, item, quantity, tier)
    }
}

/// Consumer-side delivery.
pub trait TargetSink {
    /// Whether the consumer still exists.
    fn is_alive(&self, base: BaseKey, target: DeliveryTarget) -> bool;

    /// Place cargo into the consumer. Returns the amount accepted.
    fn deliver(&mut self, base: BaseKey, target: DeliveryTarget, payload: Payload) -> Quantity;

    /// Park cargo the consumer rejected in its overflow holding area.
    /// Consumers without one accept nothing.
    fn hold_overflow(&mut self, _base: BaseKey, _target: DeliveryTarget, _payload: Payload) -> Quantity {
        0
    }

    /// Current position of a moving consumer. `None` for fixed consumers or
    /// when the position is unknown this tick.
    fn live_position(&self, _base: BaseKey, _target: DeliveryTarget) -> Option<Vec3> {
        None
    }
}

/// The three demand scanners. Each is a pure function of the world state.
pub trait DemandSource {
    fn mecha_demand(&self, base: BaseKey, ctx: &ScanContext<'_>) -> Vec<DemandRecord>;
    fn tower_demand(&self, base: BaseKey, ctx: &ScanContext<'_>) -> Vec<DemandRecord>;
    fn dispenser_demand(&self, base: BaseKey, ctx: &ScanContext<'_>) -> Vec<DemandRecord>;
}

/// Everything a dispatch tick needs from the host.
pub trait LogisticsHost: InventorySource + ItemSink + TargetSink + DemandSource {}

impl<T: InventorySource + ItemSink + TargetSink + DemandSource + ?Sized> LogisticsHost for T {}
