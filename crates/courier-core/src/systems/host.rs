//! World host - the scheduler's collaborator traits over the ECS world.

use std::collections::BTreeMap;

use courier_logic::demand::{
    scan_dispensers, scan_mecha, scan_towers, DemandRecord, ScanContext,
};
use courier_logic::geometry::Vec3;
use courier_logic::interfaces::{DemandSource, InventorySource, ItemSink, TargetSink};
use courier_logic::item::{Inventory, ItemKind, Payload, QualityTier, Quantity};
use courier_logic::registry::{BaseKey, PartitionId};
use courier_logic::target::{DeliveryTarget, DispenserId, StationId};
use hecs::{Entity, World};

use crate::components::{Dispenser, Location, LogisticsBase, LogisticsTower, Mecha};

/// Lookup from scheduler identifiers to entities. Rebuilt after load.
#[derive(Debug, Clone, Default)]
pub struct EntityIndex {
    pub bases: BTreeMap<BaseKey, Entity>,
    pub dispensers: BTreeMap<(PartitionId, DispenserId), Entity>,
    pub towers: BTreeMap<(PartitionId, StationId), Entity>,
    pub mecha: BTreeMap<PartitionId, Entity>,
}

impl EntityIndex {
    pub fn rebuild(world: &World) -> Self {
        let mut index = Self::default();
        for (entity, (loc, base)) in world.query::<(&Location, &LogisticsBase)>().iter() {
            index.bases.insert(
                BaseKey {
                    partition: loc.partition,
                    base: base.id,
                },
                entity,
            );
        }
        for (entity, (loc, d)) in world.query::<(&Location, &Dispenser)>().iter() {
            index.dispensers.insert((loc.partition, d.id), entity);
        }
        for (entity, (loc, t)) in world.query::<(&Location, &LogisticsTower)>().iter() {
            index.towers.insert((loc.partition, t.id), entity);
        }
        for (entity, (loc, _)) in world.query::<(&Location, &Mecha)>().iter() {
            index.mecha.insert(loc.partition, entity);
        }
        index
    }

    /// Entity behind a delivery target, as seen from `base`.
    pub fn target_entity(&self, base: BaseKey, target: DeliveryTarget) -> Option<Entity> {
        match target {
            DeliveryTarget::Dispenser(id) => self.dispensers.get(&(base.partition, id)).copied(),
            DeliveryTarget::LogisticsTower(id, _) => self.towers.get(&(base.partition, id)).copied(),
            DeliveryTarget::MechaSlot(_) => self.mecha.get(&base.partition).copied(),
        }
    }
}

/// Borrowed view of the world that the coordinator ticks against.
pub struct WorldHost<'a> {
    pub world: &'a mut World,
    pub index: &'a EntityIndex,
}

impl<'a> WorldHost<'a> {
    pub fn new(world: &'a mut World, index: &'a EntityIndex) -> Self {
        Self { world, index }
    }

    fn base_mut(&mut self, base: BaseKey) -> Option<&mut LogisticsBase> {
        let entity = *self.index.bases.get(&base)?;
        self.world.query_one_mut::<&mut LogisticsBase>(entity).ok()
    }
}

impl InventorySource for WorldHost<'_> {
    fn snapshot(&self, base: BaseKey) -> Inventory {
        self.index
            .bases
            .get(&base)
            .and_then(|&e| self.world.get::<&LogisticsBase>(e).ok())
            .map(|b| b.storage.items.clone())
            .unwrap_or_default()
    }
}

impl ItemSink for WorldHost<'_> {
    fn take(&mut self, base: BaseKey, item: ItemKind, max: Quantity) -> (Quantity, QualityTier) {
        match self.base_mut(base) {
            Some(b) => b.storage.take(item, max),
            None => (0, QualityTier::default()),
        }
    }

    fn give(&mut self, base: BaseKey, item: ItemKind, quantity: Quantity, tier: QualityTier) -> Quantity {
        self.base_mut(base)
            .map_or(0, |b| b.storage.add(item, quantity, tier))
    }

    fn force_give(&mut self, base: BaseKey, item: ItemKind, quantity: Quantity, tier: QualityTier) -> Quantity {
        self.base_mut(base)
            .map_or(0, |b| b.storage.force_add(item, quantity, tier))
    }
}

impl TargetSink for WorldHost<'_> {
    fn is_alive(&self, base: BaseKey, target: DeliveryTarget) -> bool {
        let Some(entity) = self.index.target_entity(base, target) else {
            return false;
        };
        match target {
            DeliveryTarget::Dispenser(_) => self.world.get::<&Dispenser>(entity).is_ok(),
            DeliveryTarget::LogisticsTower(_, slot) => self
                .world
                .get::<&LogisticsTower>(entity)
                .is_ok_and(|t| (slot as usize) < t.slots.len()),
            DeliveryTarget::MechaSlot(slot) => self
                .world
                .get::<&Mecha>(entity)
                .is_ok_and(|m| m.can_receive() && (slot as usize) < m.package.len()),
        }
    }

    fn deliver(&mut self, base: BaseKey, target: DeliveryTarget, payload: Payload) -> Quantity {
        let Some(entity) = self.index.target_entity(base, target) else {
            return 0;
        };
        let accepted = match target {
            DeliveryTarget::Dispenser(_) => self
                .world
                .query_one_mut::<&mut Dispenser>(entity)
                .map_or(0, |d| d.accept(payload)),
            DeliveryTarget::LogisticsTower(_, slot) => self
                .world
                .query_one_mut::<&mut LogisticsTower>(entity)
                .map_or(0, |t| t.accept(slot, payload)),
            DeliveryTarget::MechaSlot(slot) => self
                .world
                .query_one_mut::<&mut Mecha>(entity)
                .map_or(0, |m| m.accept(slot, payload)),
        };
        accepted.min(payload.quantity)
    }

    fn hold_overflow(&mut self, base: BaseKey, target: DeliveryTarget, payload: Payload) -> Quantity {
        // Only dispensers have somewhere to park cargo.
        let DeliveryTarget::Dispenser(_) = target else {
            return 0;
        };
        let Some(entity) = self.index.target_entity(base, target) else {
            return 0;
        };
        self.world
            .query_one_mut::<&mut Dispenser>(entity)
            .map_or(0, |d| d.hold(payload))
    }

    fn live_position(&self, base: BaseKey, target: DeliveryTarget) -> Option<Vec3> {
        let entity = self.index.target_entity(base, target)?;
        self.world.get::<&Location>(entity).ok().map(|l| l.position)
    }
}

impl DemandSource for WorldHost<'_> {
    fn mecha_demand(&self, base: BaseKey, ctx: &ScanContext<'_>) -> Vec<DemandRecord> {
        let Some(&entity) = self.index.mecha.get(&base.partition) else {
            return Vec::new();
        };
        let (Ok(loc), Ok(mecha)) = (
            self.world.get::<&Location>(entity),
            self.world.get::<&Mecha>(entity),
        ) else {
            return Vec::new();
        };
        scan_mecha(&mecha.view(loc.position), ctx)
    }

    fn tower_demand(&self, base: BaseKey, ctx: &ScanContext<'_>) -> Vec<DemandRecord> {
        let mut query = self.world.query::<(&Location, &LogisticsTower)>();
        let slots: Vec<_> = query
            .iter()
            .filter(|(_, (loc, _))| loc.partition == base.partition)
            .flat_map(|(_, (loc, tower))| tower.views(loc.position).collect::<Vec<_>>())
            .collect();
        scan_towers(&slots, ctx)
    }

    fn dispenser_demand(&self, base: BaseKey, ctx: &ScanContext<'_>) -> Vec<DemandRecord> {
        let mut query = self.world.query::<(&Location, &Dispenser)>();
        let views: Vec<_> = query
            .iter()
            .filter(|(_, (loc, _))| loc.partition == base.partition)
            .map(|(_, (loc, d))| d.view(loc.position))
            .collect();
        scan_dispensers(&views, ctx)
    }
}
