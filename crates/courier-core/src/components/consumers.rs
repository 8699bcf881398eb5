//! Consumers couriers deliver to: dispensers, logistics towers, the mecha.

use courier_logic::demand::{DispenserView, MechaSlotView, MechaView, StorageMode, TowerSlotView};
use courier_logic::geometry::Vec3;
use courier_logic::item::{ItemKind, Payload, Quantity};
use courier_logic::target::{DispenserId, StationId};
use serde::{Deserialize, Serialize};

/// Frames a dispenser keeps its delivery pulse lit.
pub const PULSE_FRAMES: u32 = 30;

/// A storage box that requests one item kind from the nearest base.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dispenser {
    pub id: DispenserId,
    pub mode: StorageMode,
    pub filter: ItemKind,
    pub stock: Quantity,
    pub storage_slots: u32,
    pub reserved_slots: u32,
    pub stack_size: u32,
    /// Cargo parked beside the box because it did not fit.
    pub overflow: Option<Payload>,
    /// Frames left on the delivery indicator. Set when a courier delivers.
    pub pulse_signal: u32,
    /// Items used per consumption cycle.
    pub consumption: Quantity,
}

impl Dispenser {
    pub fn receivable_capacity(&self) -> u64 {
        self.storage_slots.saturating_sub(self.reserved_slots) as u64 * self.stack_size as u64
    }

    pub fn room(&self) -> Quantity {
        self.receivable_capacity()
            .saturating_sub(self.stock as u64)
            .min(Quantity::MAX as u64) as Quantity
    }

    /// Store what fits. Only the filtered item is accepted.
    pub fn accept(&mut self, payload: Payload) -> Quantity {
        if payload.item != self.filter {
            return 0;
        }
        let accepted = payload.quantity.min(self.room());
        self.stock += accepted;
        if accepted > 0 {
            self.pulse_signal = PULSE_FRAMES;
        }
        accepted
    }

    /// Park a rejected remainder. One item kind at a time.
    pub fn hold(&mut self, payload: Payload) -> Quantity {
        if let Some(held) = self.overflow.as_mut() {
            if held.item != payload.item {
                return 0;
            }
            held.quantity += payload.quantity;
            return payload.quantity;
        }
        if payload.quantity > 0 {
            self.overflow = Some(payload);
        }
        payload.quantity
    }

    /// Move parked overflow into the box as room frees up.
    pub fn settle_overflow(&mut self) -> Quantity {
        let Some(mut held) = self.overflow else {
            return 0;
        };
        let moved = if held.item == self.filter {
            held.quantity.min(self.room())
        } else {
            0
        };
        self.stock += moved;
        held.quantity -= moved;
        self.overflow = (held.quantity > 0).then_some(held);
        moved
    }

    pub fn view(&self, position: Vec3) -> DispenserView {
        DispenserView {
            id: self.id,
            position,
            mode: self.mode,
            filter: self.filter,
            current_stock: self.stock,
            storage_slots: self.storage_slots,
            reserved_slots: self.reserved_slots,
            stack_size: self.stack_size,
            holding_overflow: self.overflow.is_some(),
        }
    }
}

/// One storage slot of a logistics tower.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TowerSlot {
    pub item: ItemKind,
    pub local_demand: bool,
    pub current: Quantity,
    /// Inbound from the interplanetary network, not from couriers.
    pub on_order: Quantity,
    pub max: Quantity,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogisticsTower {
    pub id: StationId,
    pub slots: Vec<TowerSlot>,
    /// Items shipped out of each slot per consumption cycle.
    pub consumption: Quantity,
}

impl LogisticsTower {
    pub fn accept(&mut self, slot: u16, payload: Payload) -> Quantity {
        let Some(s) = self.slots.get_mut(slot as usize) else {
            return 0;
        };
        if s.item != payload.item {
            return 0;
        }
        let accepted = payload.quantity.min(s.max.saturating_sub(s.current));
        s.current += accepted;
        accepted
    }

    pub fn views(&self, position: Vec3) -> impl Iterator<Item = TowerSlotView> + '_ {
        self.slots.iter().enumerate().map(move |(i, s)| TowerSlotView {
            station: self.id,
            slot: i as u16,
            position,
            item: s.item,
            local_demand: s.local_demand,
            current: s.current,
            on_order: s.on_order,
            max: s.max,
        })
    }
}

/// A delivery-package slot: what the player wants kept on hand.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PackageSlot {
    pub item: ItemKind,
    pub held: Quantity,
    pub required: Quantity,
    pub stack: Quantity,
}

/// The player's mecha. Walks around the planet and asks bases to keep its
/// delivery package topped up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Mecha {
    pub alive: bool,
    pub in_transit: bool,
    pub delivery_unlocked: bool,
    pub package: Vec<PackageSlot>,
    /// Radians per frame about the planet's polar axis.
    pub walk_rate: f32,
    /// Items used from each slot per consumption cycle.
    pub consumption: Quantity,
}

impl Mecha {
    /// A dead, travelling or locked mecha takes no deliveries.
    pub fn can_receive(&self) -> bool {
        self.alive && !self.in_transit && self.delivery_unlocked
    }

    pub fn accept(&mut self, slot: u16, payload: Payload) -> Quantity {
        let Some(s) = self.package.get_mut(slot as usize) else {
            return 0;
        };
        if s.item != payload.item {
            return 0;
        }
        let accepted = payload.quantity.min(s.stack.saturating_sub(s.held));
        s.held += accepted;
        accepted
    }

    pub fn view(&self, position: Vec3) -> MechaView {
        MechaView {
            alive: self.alive,
            in_transit: self.in_transit,
            delivery_unlocked: self.delivery_unlocked,
            position,
            slots: self
                .package
                .iter()
                .enumerate()
                .map(|(i, s)| MechaSlotView {
                    index: i as u16,
                    item: s.item,
                    current_total: s.held,
                    required: s.required,
                })
                .collect(),
        }
    }

    /// Position after one frame of walking from `from`.
    pub fn step(&self, from: Vec3) -> Vec3 {
        let (sin, cos) = self.walk_rate.sin_cos();
        Vec3::new(from.x * cos - from.z * sin, from.y, from.x * sin + from.z * cos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_logic::item::QualityTier;

    const IRON: ItemKind = ItemKind(1101);
    const COPPER: ItemKind = ItemKind(1104);

    fn dispenser() -> Dispenser {
        Dispenser {
            id: DispenserId(1),
            mode: StorageMode::Demand,
            filter: IRON,
            stock: 0,
            storage_slots: 2,
            reserved_slots: 1,
            stack_size: 100,
            overflow: None,
            pulse_signal: 0,
            consumption: 0,
        }
    }

    fn iron(quantity: Quantity) -> Payload {
        Payload::new(IRON, quantity, QualityTier(0))
    }

    #[test]
    fn dispenser_accepts_up_to_room_and_pulses() {
        let mut d = dispenser();
        assert_eq!(d.accept(iron(70)), 70);
        assert_eq!(d.pulse_signal, PULSE_FRAMES);
        assert_eq!(d.accept(iron(70)), 30);
        assert_eq!(d.accept(Payload::new(COPPER, 5, QualityTier(0))), 0);
    }

    #[test]
    fn overflow_settles_as_room_frees() {
        let mut d = dispenser();
        d.stock = 100;
        assert_eq!(d.hold(iron(40)), 40);
        assert_eq!(d.hold(Payload::new(COPPER, 5, QualityTier(0))), 0);
        assert!(d.view(Vec3::ZERO).holding_overflow);
        d.stock = 80;
        assert_eq!(d.settle_overflow(), 20);
        assert_eq!(d.overflow.map(|p| p.quantity), Some(20));
        d.stock = 0;
        assert_eq!(d.settle_overflow(), 20);
        assert_eq!(d.overflow, None);
    }

    #[test]
    fn mecha_walk_keeps_altitude() {
        let m = Mecha {
            alive: true,
            in_transit: false,
            delivery_unlocked: true,
            package: Vec::new(),
            walk_rate: 0.01,
            consumption: 0,
        };
        let p = Vec3::new(200.0, 10.0, 0.0);
        let q = m.step(p);
        assert!((q.length() - p.length()).abs() < 1e-3);
        assert!(q.z > 0.0);
    }

    #[test]
    fn mecha_receives_only_when_alive_home_and_unlocked() {
        let mut m = Mecha {
            alive: true,
            in_transit: false,
            delivery_unlocked: true,
            package: Vec::new(),
            walk_rate: 0.0,
            consumption: 0,
        };
        assert!(m.can_receive());
        m.delivery_unlocked = false;
        assert!(!m.can_receive());
        m.delivery_unlocked = true;
        m.in_transit = true;
        assert!(!m.can_receive());
    }
}
