//! Logistics engine - main entry point for running a courier world

use std::collections::BTreeSet;

use courier_logic::config::{ConfigError, LogisticsConfig};
use courier_logic::dispatch::{DispatchCoordinator, TickReport};
use courier_logic::geometry::Vec3;
use courier_logic::persistence::{drain_partition, post_load_rebind, pre_save_drain, DrainReport};
use courier_logic::registry::{BaseKey, BaseLogisticsRegistry, PartitionId};
use courier_logic::render::{publish, RenderingSink};
use courier_logic::target::{DeliveryTarget, DispenserId};
use hecs::{Entity, World};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::components::*;
use crate::generation::{generate_world, WorldConfig, WorldLayout};
use crate::persistence::SaveError;
use crate::systems::*;

/// Base courier speed of the host, distance units per second.
pub const DEFAULT_COURIER_SPEED: f32 = 8.0;

/// Frames between economy cycles (production and consumption).
pub const ECONOMY_INTERVAL: u64 = 60;

/// Running totals since the engine was created or loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub scans: u64,
    pub dispatches: u64,
    pub dispatched_items: u64,
    pub deliveries: u64,
    pub delivered_items: u64,
    pub held_items: u64,
    pub lost_targets: u64,
    pub refunded_items: u64,
    pub produced: u64,
    pub consumed: u64,
    /// Items that left the world with a removed consumer.
    pub removed: u64,
}

impl EngineStats {
    fn record(&mut self, report: &TickReport) {
        self.scans += report.scanned() as u64;
        self.dispatches += report.dispatched as u64;
        self.dispatched_items += report.dispatched_items;
        self.deliveries += report.flights.deliveries as u64;
        self.delivered_items += report.flights.delivered_items;
        self.held_items += report.flights.held_items;
        self.lost_targets += report.flights.lost_targets as u64;
        self.refunded_items += report.flights.refunded_items;
    }
}

/// Main logistics engine
pub struct LogisticsEngine {
    /// ECS world containing bases and consumers
    pub world: World,
    /// Courier pools, one per base
    pub registry: BaseLogisticsRegistry,
    pub index: EntityIndex,
    pub stats: EngineStats,
    /// Frames simulated
    pub frame: u64,
    /// Host courier speed, distance units per second
    pub courier_speed: f32,
    coordinator: DispatchCoordinator,
    loaded: BTreeSet<PartitionId>,
    last_economy_frame: u64,
}

impl LogisticsEngine {
    /// Create an empty engine with a validated configuration.
    pub fn new(config: LogisticsConfig) -> Result<Self, ConfigError> {
        if let Some(err) = config.validate().into_iter().next() {
            return Err(err);
        }
        Ok(Self::with_config(config))
    }

    fn with_config(config: LogisticsConfig) -> Self {
        Self {
            world: World::new(),
            registry: BaseLogisticsRegistry::new(&config),
            index: EntityIndex::default(),
            stats: EngineStats::default(),
            frame: 0,
            courier_speed: DEFAULT_COURIER_SPEED,
            coordinator: DispatchCoordinator::new(config),
            loaded: BTreeSet::new(),
            last_economy_frame: 0,
        }
    }

    pub fn config(&self) -> &LogisticsConfig {
        self.coordinator.config()
    }

    /// Generate a seeded world. Every generated partition starts loaded.
    pub fn generate(&mut self, config: &WorldConfig) -> WorldLayout {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let layout = generate_world(&mut self.world, config, &mut rng);
        self.index = EntityIndex::rebuild(&self.world);
        self.loaded = self.index.bases.keys().map(|k| k.partition).collect();
        log::info!(
            "generated {} bases, {} dispensers, {} towers across {} partitions",
            layout.bases,
            layout.dispensers,
            layout.towers,
            self.loaded.len()
        );
        layout
    }

    /// Advance one frame.
    pub fn update(&mut self) {
        self.frame += 1;

        // T0: movement and indicators (every frame)
        mecha_walk_system(&mut self.world);
        pulse_system(&mut self.world);

        // T0: couriers (every frame; the coordinator handles its own cadence)
        for (key, position) in self.active_bases() {
            let entry = self.registry.get_or_create(key);
            let mut host = WorldHost::new(&mut self.world, &self.index);
            let report = self
                .coordinator
                .tick(entry, position, &mut host, self.courier_speed);
            self.stats.record(&report);
        }

        // T1: economy
        if self.frame - self.last_economy_frame >= ECONOMY_INTERVAL {
            self.stats.produced += production_system(&mut self.world);
            self.stats.consumed += consumption_system(&mut self.world);
            self.last_economy_frame = self.frame;
        }
    }

    pub fn run(&mut self, frames: u64) {
        for _ in 0..frames {
            self.update();
        }
    }

    /// Bases on loaded partitions, with their positions.
    fn active_bases(&self) -> Vec<(BaseKey, Vec3)> {
        self.index
            .bases
            .iter()
            .filter(|(key, _)| self.loaded.contains(&key.partition))
            .filter_map(|(&key, &entity)| {
                let loc = self.world.get::<&Location>(entity).ok()?;
                Some((key, loc.position))
            })
            .collect()
    }

    pub fn is_loaded(&self, partition: PartitionId) -> bool {
        self.loaded.contains(&partition)
    }

    /// Resume ticking a partition. Pools are recreated lazily.
    pub fn load_partition(&mut self, partition: PartitionId) {
        self.loaded.insert(partition);
    }

    /// Stop ticking a partition: bring its couriers home, then drop its pools.
    pub fn unload_partition(&mut self, partition: PartitionId) -> DrainReport {
        let mut host = WorldHost::new(&mut self.world, &self.index);
        let report = drain_partition(&mut self.registry, partition, &mut host);
        let dropped = self.registry.clear(partition);
        self.loaded.remove(&partition);
        log::info!("unloaded partition {} ({} pools dropped)", partition.0, dropped);
        report
    }

    /// Place a dispenser on a partition. Its bases pick it up on their next scan.
    pub fn spawn_dispenser(&mut self, partition: PartitionId, position: Vec3, dispenser: Dispenser) -> Entity {
        let id = dispenser.id;
        let entity = self.world.spawn((Location::new(partition, position), dispenser));
        self.index.dispensers.insert((partition, id), entity);
        entity
    }

    /// Remove a dispenser and turn back every courier headed for it. Returns
    /// the removed dispenser so the caller can account for its contents.
    pub fn remove_dispenser(&mut self, partition: PartitionId, id: DispenserId) -> Option<Dispenser> {
        let entity = self.index.dispensers.remove(&(partition, id))?;
        let removed = self.world.get::<&Dispenser>(entity).ok().map(|d| (*d).clone());
        if self.world.despawn(entity).is_err() {
            log::warn!("dispenser {} on partition {} was already gone", id.0, partition.0);
        }

        let target = DeliveryTarget::Dispenser(id);
        let mut recalled = 0;
        self.registry.for_each_mut(partition, |entry| {
            recalled += entry.pool.recall(target);
        });
        if recalled > 0 {
            log::debug!("{target} removed; {recalled} couriers turned back");
        }

        if let Some(d) = &removed {
            self.stats.removed += d.stock as u64 + d.overflow.map_or(0, |p| p.quantity as u64);
        }
        removed
    }

    /// Change the mecha's state through `update`. Couriers chasing a mecha
    /// that can no longer receive are turned back.
    pub fn set_mecha_state(&mut self, partition: PartitionId, update: impl FnOnce(&mut Mecha)) {
        let Some(&entity) = self.index.mecha.get(&partition) else {
            return;
        };
        let Ok(mecha) = self.world.query_one_mut::<&mut Mecha>(entity) else {
            return;
        };
        update(mecha);
        if mecha.can_receive() {
            return;
        }
        let slots = mecha.package.len() as u16;
        let mut recalled = 0;
        self.registry.for_each_mut(partition, |entry| {
            for slot in 0..slots {
                recalled += entry.pool.recall(DeliveryTarget::MechaSlot(slot));
            }
        });
        if recalled > 0 {
            log::debug!("mecha on partition {} stopped receiving; {recalled} couriers turned back", partition.0);
        }
    }

    /// Push this frame's couriers on a partition to a presentation layer.
    pub fn render<R: RenderingSink + ?Sized>(&self, partition: PartitionId, sink: &mut R) -> usize {
        publish(&self.registry, partition, sink)
    }

    /// Items held by bases and consumers.
    pub fn items_in_world(&self) -> u64 {
        let mut total = 0;
        for (_, base) in self.world.query::<&LogisticsBase>().iter() {
            total += base.storage.items.total();
        }
        for (_, d) in self.world.query::<&Dispenser>().iter() {
            total += d.stock as u64 + d.overflow.map_or(0, |p| p.quantity as u64);
        }
        for (_, t) in self.world.query::<&LogisticsTower>().iter() {
            total += t.slots.iter().map(|s| s.current as u64).sum::<u64>();
        }
        for (_, m) in self.world.query::<&Mecha>().iter() {
            total += m.package.iter().map(|s| s.held as u64).sum::<u64>();
        }
        total
    }

    /// Items aboard couriers.
    pub fn items_aloft(&self) -> u64 {
        self.registry.iter().map(|e| e.pool.carried_total()).sum()
    }

    pub fn couriers_in_flight(&self) -> u32 {
        self.registry.iter().map(|e| e.pool.working_count()).sum()
    }

    /// Drain every courier, then write the world.
    pub fn save<W: std::io::Write>(&mut self, writer: W) -> Result<DrainReport, SaveError> {
        let drain = {
            let mut host = WorldHost::new(&mut self.world, &self.index);
            pre_save_drain(&mut self.registry, &mut host)
        };
        crate::persistence::save_world(
            writer,
            &self.world,
            &self.registry,
            self.coordinator.config(),
            self.frame,
            self.courier_speed,
            &self.loaded,
        )?;
        Ok(drain)
    }

    /// Replace this engine's state with a saved world.
    pub fn load<R: std::io::Read>(&mut self, reader: R) -> Result<(), SaveError> {
        let loaded = crate::persistence::load_world(reader)?;

        self.world = loaded.world;
        self.registry = loaded.registry;
        self.coordinator = DispatchCoordinator::new(loaded.config);
        self.frame = loaded.frame;
        self.courier_speed = loaded.courier_speed;
        self.loaded = loaded.loaded;
        self.stats = EngineStats::default();

        self.index = EntityIndex::rebuild(&self.world);
        post_load_rebind(&mut self.registry);
        self.last_economy_frame = self.frame;

        Ok(())
    }
}

impl Default for LogisticsEngine {
    fn default() -> Self {
        Self::with_config(LogisticsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_logic::demand::StorageMode;
    use courier_logic::item::{ItemKind, QualityTier};
    use courier_logic::registry::BaseId;

    const IRON: ItemKind = ItemKind(1101);

    fn small_world() -> WorldConfig {
        WorldConfig {
            partitions: 1,
            bases_per_partition: 1,
            dispensers_per_base: 3,
            towers_per_partition: 1,
            ..WorldConfig::default()
        }
    }

    /// One base with iron next to one empty iron dispenser.
    fn one_base_one_dispenser(config: LogisticsConfig) -> LogisticsEngine {
        let mut engine = LogisticsEngine::new(config).unwrap();
        let partition = PartitionId(1);
        let mut storage = Storage::with_capacity(10_000);
        storage.add(IRON, 500, QualityTier(0));
        engine.world.spawn((
            Location::new(partition, Vec3::new(200.0, 0.0, 0.0)),
            LogisticsBase {
                id: BaseId(1),
                storage,
            },
        ));
        engine.index = EntityIndex::rebuild(&engine.world);
        engine.load_partition(partition);
        engine.spawn_dispenser(
            partition,
            Vec3::new(196.0, 40.0, 0.0),
            Dispenser {
                id: DispenserId(1),
                mode: StorageMode::Demand,
                filter: IRON,
                stock: 0,
                storage_slots: 2,
                reserved_slots: 0,
                stack_size: 100,
                overflow: None,
                pulse_signal: 0,
                consumption: 0,
            },
        );
        engine
    }

    #[test]
    fn rejects_invalid_config() {
        let config = LogisticsConfig {
            courier_capacity_per_base: 0,
            ..LogisticsConfig::default()
        };
        assert!(LogisticsEngine::new(config).is_err());
    }

    #[test]
    fn generated_world_starts_loaded() {
        let mut engine = LogisticsEngine::default();
        engine.generate(&small_world());
        assert!(engine.is_loaded(PartitionId(1)));
        assert_eq!(engine.index.bases.len(), 1);
        assert_eq!(engine.index.dispensers.len(), 3);
    }

    #[test]
    fn couriers_fill_a_dispenser() {
        let mut engine = one_base_one_dispenser(LogisticsConfig::default());
        engine.run(60 * 20);
        assert!(engine.stats.dispatches >= 2);
        let entity = engine.index.dispensers[&(PartitionId(1), DispenserId(1))];
        let stock = engine.world.get::<&Dispenser>(entity).unwrap().stock;
        assert!(stock >= 160, "dispenser filled past the ceiling, got {stock}");
    }

    #[test]
    fn removing_a_dispenser_recalls_its_courier() {
        let mut engine = one_base_one_dispenser(LogisticsConfig::default());
        engine.run(61);
        assert_eq!(engine.couriers_in_flight(), 1);
        let aloft = engine.items_aloft();
        assert!(aloft > 0);

        let removed = engine.remove_dispenser(PartitionId(1), DispenserId(1));
        assert!(removed.is_some());
        engine.run(60 * 10);
        assert_eq!(engine.couriers_in_flight(), 0);
        assert_eq!(engine.stats.delivered_items, 0);
        assert_eq!(engine.items_in_world(), 500);
    }

    #[test]
    fn unloaded_partition_is_not_ticked() {
        let mut engine = one_base_one_dispenser(LogisticsConfig::default());
        engine.run(61);
        let report = engine.unload_partition(PartitionId(1));
        assert_eq!(report.couriers_recalled, 1);
        assert!(engine.registry.is_empty());
        engine.run(200);
        assert!(engine.registry.is_empty());
        assert_eq!(engine.items_in_world(), 500);
    }
}
