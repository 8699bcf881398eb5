//! Dispatch coordinator - the per-base tick.
//!
//! Each tick:
//! 1. advance every working courier
//! 2. count down the dispatch cooldown
//! 3. skip the round when no courier is free or the base is empty
//! 4. scan the three demand sources and merge them into service order
//! 5. take cargo from the base and launch idle couriers until none remain
//! 6. record the inventory the round ended with

use crate::config::LogisticsConfig;
use crate::courier::{AdvanceSummary, FlightEnv, FlightPlan};
use crate::demand::{merge_demands, DemandRecord, ScanContext};
use crate::geometry::Vec3;
use crate::interfaces::{ItemSink, LogisticsHost};
use crate::item::{Payload, Quantity};
use crate::registry::{BaseKey, BaseLogisticsEntry};
use crate::target::TargetClass;

/// Why a tick stopped before scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Cooldown,
    NoIdleCouriers,
    EmptyInventory,
}

/// What one base tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub flights: AdvanceSummary,
    pub skipped: Option<SkipReason>,
    /// Demand records found by the scan, after merging.
    pub demands: usize,
    pub dispatched: u32,
    pub dispatched_items: u64,
    /// Records passed over because a courier is already heading there.
    pub deduplicated: u32,
    /// Cargo taken but handed straight back because no courier was free.
    pub acquire_refunds: u32,
}

impl TickReport {
    pub fn scanned(&self) -> bool {
        self.skipped.is_none()
    }
}

/// Runs the per-base scheduling round.
#[derive(Debug, Clone)]
pub struct DispatchCoordinator {
    config: LogisticsConfig,
}

impl DispatchCoordinator {
    pub fn new(config: LogisticsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LogisticsConfig {
        &self.config
    }

    fn env(&self, entry: &BaseLogisticsEntry) -> FlightEnv {
        FlightEnv {
            base: entry.key,
            overflow_policy: self.config.overflow_policy,
            verbose: self.config.debug_logging,
        }
    }

    /// Tick one base. `host_courier_speed` is the host's base courier speed
    /// in distance units per second.
    pub fn tick<H>(
        &self,
        entry: &mut BaseLogisticsEntry,
        base_position: Vec3,
        host: &mut H,
        host_courier_speed: f32,
    ) -> TickReport
    where
        H: LogisticsHost + ?Sized,
    {
        let env = self.env(entry);
        let mut report = TickReport {
            flights: entry
                .pool
                .advance_all(self.config.flight_delta(host_courier_speed), &env, host),
            ..TickReport::default()
        };
        entry.cooldown_counter += 1;
        if entry.cooldown_counter < self.config.dispatch_cooldown_ticks {
            report.skipped = Some(SkipReason::Cooldown);
            return report;
        }
        entry.cooldown_counter = 0;

        if entry.pool.idle_count() == 0 {
            report.skipped = Some(SkipReason::NoIdleCouriers);
            return report;
        }

        // With a free courier and stock on hand the round always scans:
        // consumer-side need can grow while the base inventory stands still.
        let inventory = host.snapshot(entry.key);
        if inventory.is_empty() {
            entry.last_known_inventory = inventory;
            report.skipped = Some(SkipReason::EmptyInventory);
            return report;
        }

        let ctx = ScanContext {
            inventory: &inventory,
            base_position,
            dispenser_stock_ceiling: self.config.dispenser_stock_ceiling,
        };
        let demands = merge_demands(
            host.mecha_demand(entry.key, &ctx),
            host.tower_demand(entry.key, &ctx),
            host.dispenser_demand(entry.key, &ctx),
        );
        report.demands = demands.len();

        for demand in &demands {
            if entry.pool.idle_count() == 0 {
                break;
            }
            if entry.pool.has_outbound(demand.target, demand.item) {
                report.deduplicated += 1;
                continue;
            }
            match self.dispatch_one(entry, base_position, demand, host, &env) {
                Dispatch::Launched(quantity) => {
                    report.dispatched += 1;
                    report.dispatched_items += quantity as u64;
                }
                Dispatch::NothingTaken => {}
                Dispatch::NoCourier => {
                    report.acquire_refunds += 1;
                    break;
                }
            }
        }

        entry.last_known_inventory = if report.dispatched > 0 {
            host.snapshot(entry.key)
        } else {
            inventory
        };

        if report.dispatched > 0 {
            log_round(&env, &report, entry.pool.idle_count());
        }
        report
    }

    /// Per-trip quantity for a record.
    fn trip_cap(&self, demand: &DemandRecord) -> Quantity {
        let cap = self.config.per_trip_payload_cap;
        if demand.target.class() == TargetClass::Mecha && demand.needed_quantity > 0 {
            cap.min(demand.needed_quantity)
        } else {
            cap
        }
    }

    fn dispatch_one<H>(
        &self,
        entry: &mut BaseLogisticsEntry,
        base_position: Vec3,
        demand: &DemandRecord,
        host: &mut H,
        env: &FlightEnv,
    ) -> Dispatch
    where
        H: LogisticsHost + ?Sized,
    {
        let (taken, tier) = host.take(entry.key, demand.item, self.trip_cap(demand));
        if taken == 0 {
            return Dispatch::NothingTaken;
        }

        let Some(handle) = entry.pool.acquire() else {
            refund_taken(host, entry.key, Payload::new(demand.item, taken, tier));
            return Dispatch::NoCourier;
        };

        let max_distance = if demand.target.is_moving() {
            base_position.arc_distance(&demand.position)
        } else {
            base_position.distance(&demand.position)
        };
        entry.pool.launch(
            handle,
            FlightPlan {
                begin: base_position,
                end: demand.position,
                target: demand.target,
                payload: Payload::new(demand.item, taken, tier),
                max_distance,
            },
        );
        flight_log!(
            env,
            "base {} dispatched {} x{} to {} (urgency {:.2}, {:.1} away)",
            entry.key,
            demand.item,
            taken,
            demand.target,
            demand.urgency,
            max_distance
        );
        Dispatch::Launched(taken)
    }
}

/// Hand cargo back to a base that could not launch it. Falls back to forced
/// acceptance for whatever `give` refuses. Returns the quantity returned.
fn refund_taken<S>(sink: &mut S, base: BaseKey, payload: Payload) -> Quantity
where
    S: ItemSink + ?Sized,
{
    let taken = payload.quantity;
    let mut returned = sink.give(base, payload.item, taken, payload.tier).min(taken);
    if returned < taken {
        returned += sink
            .force_give(base, payload.item, taken - returned, payload.tier)
            .min(taken - returned);
    }
    if returned < taken {
        log::warn!(
            "base {} lost {} x{} refunding a dispatch with no free courier",
            base,
            payload.item,
            taken - returned
        );
    }
    returned
}

enum Dispatch {
    Launched(Quantity),
    NothingTaken,
    NoCourier,
}

fn log_round(env: &FlightEnv, report: &TickReport, idle: u32) {
    flight_log!(
        env,
        "base {}: {} of {} demands dispatched, {} items, {} couriers idle",
        env.base,
        report.dispatched,
        report.demands,
        report.dispatched_items,
        idle
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demand::{DispenserView, StorageMode, WorldSnapshot};
    use crate::interfaces::{DemandSource, InventorySource, ItemSink, TargetSink};
    use crate::item::{Inventory, ItemKind, QualityTier};
    use crate::registry::BaseKey;
    use crate::target::{DeliveryTarget, DispenserId};
    use std::cell::Cell;

    const IRON: ItemKind = ItemKind(1101);

    struct Host {
        stock: Inventory,
        world: WorldSnapshot,
        scans: Cell<u32>,
    }

    impl InventorySource for Host {
        fn snapshot(&self, _: BaseKey) -> Inventory {
            self.stock.clone()
        }
    }

    impl ItemSink for Host {
        fn take(&mut self, _: BaseKey, item: ItemKind, max: Quantity) -> (Quantity, QualityTier) {
            (self.stock.remove(item, max), QualityTier(0))
        }
        fn give(&mut self, _: BaseKey, item: ItemKind, qty: Quantity, _: QualityTier) -> Quantity {
            self.stock.add(item, qty);
            qty
        }
    }

    impl TargetSink for Host {
        fn is_alive(&self, _: BaseKey, _: DeliveryTarget) -> bool {
            true
        }
        fn deliver(&mut self, _: BaseKey, _: DeliveryTarget, p: Payload) -> Quantity {
            p.quantity
        }
    }

    impl DemandSource for Host {
        fn mecha_demand(&self, base: BaseKey, ctx: &ScanContext<'_>) -> Vec<DemandRecord> {
            self.scans.set(self.scans.get() + 1);
            self.world.mecha_demand(base, ctx)
        }
        fn tower_demand(&self, base: BaseKey, ctx: &ScanContext<'_>) -> Vec<DemandRecord> {
            self.world.tower_demand(base, ctx)
        }
        fn dispenser_demand(&self, base: BaseKey, ctx: &ScanContext<'_>) -> Vec<DemandRecord> {
            self.world.dispenser_demand(base, ctx)
        }
    }

    fn dispenser(id: u32) -> DispenserView {
        DispenserView {
            id: DispenserId(id),
            position: Vec3::new(10.0, 0.0, 0.0),
            mode: StorageMode::Demand,
            filter: IRON,
            current_stock: 0,
            storage_slots: 1,
            reserved_slots: 0,
            stack_size: 100,
            holding_overflow: false,
        }
    }

    fn setup(capacity: u32, iron: Quantity, dispensers: Vec<DispenserView>) -> (DispatchCoordinator, BaseLogisticsEntry, Host) {
        let config = LogisticsConfig {
            courier_capacity_per_base: capacity,
            dispatch_cooldown_ticks: 1,
            ..LogisticsConfig::default()
        };
        let host = Host {
            stock: [(IRON, iron)].into_iter().collect(),
            world: WorldSnapshot { dispensers, ..WorldSnapshot::default() },
            scans: Cell::new(0),
        };
        (
            DispatchCoordinator::new(config),
            BaseLogisticsEntry::new(BaseKey::new(1, 1), capacity),
            host,
        )
    }

    #[test]
    fn cooldown_gates_scanning() {
        let (_, mut entry, mut host) = setup(2, 50, vec![dispenser(7)]);
        let coordinator = DispatchCoordinator::new(LogisticsConfig {
            dispatch_cooldown_ticks: 3,
            ..LogisticsConfig::default()
        });
        let r1 = coordinator.tick(&mut entry, Vec3::ZERO, &mut host, 30.0);
        let r2 = coordinator.tick(&mut entry, Vec3::ZERO, &mut host, 30.0);
        let r3 = coordinator.tick(&mut entry, Vec3::ZERO, &mut host, 30.0);
        assert_eq!(r1.skipped, Some(SkipReason::Cooldown));
        assert_eq!(r2.skipped, Some(SkipReason::Cooldown));
        assert!(r3.scanned());
        assert_eq!(entry.cooldown_counter, 0);
    }

    #[test]
    fn dispatch_takes_at_most_available() {
        let (coordinator, mut entry, mut host) = setup(2, 50, vec![dispenser(7)]);
        let report = coordinator.tick(&mut entry, Vec3::ZERO, &mut host, 30.0);
        assert_eq!(report.dispatched, 1);
        assert_eq!(report.dispatched_items, 50);
        assert_eq!(entry.pool.idle_count(), 1);
        assert!(host.stock.is_empty());
    }

    #[test]
    fn one_courier_per_target_and_item() {
        let (coordinator, mut entry, mut host) = setup(3, 500, vec![dispenser(7)]);
        coordinator.tick(&mut entry, Vec3::ZERO, &mut host, 30.0);
        host.world.dispensers[0].current_stock = 10;
        let report = coordinator.tick(&mut entry, Vec3::ZERO, &mut host, 30.0);
        assert_eq!(report.deduplicated, 1);
        assert_eq!(report.dispatched, 0);
        assert_eq!(entry.pool.working_count(), 1);
    }

    #[test]
    fn idle_base_with_stock_rescans_every_round() {
        let (coordinator, mut entry, mut host) = setup(2, 50, Vec::new());
        for _ in 0..3 {
            assert!(coordinator.tick(&mut entry, Vec3::ZERO, &mut host, 30.0).scanned());
        }
        assert_eq!(host.scans.get(), 3);
        assert_eq!(entry.last_known_inventory.get(IRON), 50);
    }

    #[test]
    fn need_appearing_behind_static_stock_is_served() {
        let mut full = dispenser(7);
        full.current_stock = 90;
        let (coordinator, mut entry, mut host) = setup(2, 50, vec![full]);
        let first = coordinator.tick(&mut entry, Vec3::ZERO, &mut host, 30.0);
        assert!(first.scanned());
        assert_eq!(first.dispatched, 0, "90/100 sits above the stock ceiling");

        // Drained by consumption; the base inventory has not moved.
        host.world.dispensers[0].current_stock = 0;
        let second = coordinator.tick(&mut entry, Vec3::ZERO, &mut host, 30.0);
        assert_eq!(second.skipped, None);
        assert_eq!(second.dispatched, 1);
        assert_eq!(second.dispatched_items, 50);
        assert_eq!(entry.pool.idle_count(), 1);
    }

    #[test]
    fn busy_pool_skips_before_scanning() {
        let (coordinator, mut entry, mut host) = setup(1, 500, vec![dispenser(7), dispenser(8)]);
        coordinator.tick(&mut entry, Vec3::ZERO, &mut host, 30.0);
        assert_eq!(host.scans.get(), 1);
        host.stock.add(IRON, 10);
        let report = coordinator.tick(&mut entry, Vec3::ZERO, &mut host, 0.0);
        assert_eq!(report.skipped, Some(SkipReason::NoIdleCouriers));
        assert_eq!(host.scans.get(), 1);
    }

    /// Base storage that only has `room` free unless forced.
    struct TightBase {
        stock: Inventory,
        room: Quantity,
        forced: Quantity,
        allow_force: bool,
    }

    impl ItemSink for TightBase {
        fn take(&mut self, _: BaseKey, item: ItemKind, max: Quantity) -> (Quantity, QualityTier) {
            (self.stock.remove(item, max), QualityTier(0))
        }
        fn give(&mut self, _: BaseKey, item: ItemKind, qty: Quantity, _: QualityTier) -> Quantity {
            let n = qty.min(self.room);
            self.room -= n;
            self.stock.add(item, n);
            n
        }
        fn force_give(&mut self, base: BaseKey, item: ItemKind, qty: Quantity, tier: QualityTier) -> Quantity {
            if !self.allow_force {
                return self.give(base, item, qty, tier);
            }
            self.forced += qty;
            self.stock.add(item, qty);
            qty
        }
    }

    #[test]
    fn refund_tops_up_with_forced_acceptance() {
        let mut base = TightBase { stock: Inventory::new(), room: 30, forced: 0, allow_force: true };
        let returned = refund_taken(&mut base, BaseKey::new(1, 1), Payload::new(IRON, 80, QualityTier(0)));
        assert_eq!(returned, 80);
        assert_eq!(base.forced, 50);
        assert_eq!(base.stock.get(IRON), 80);
    }

    #[test]
    fn refund_reports_shortfall_when_base_refuses() {
        let mut base = TightBase { stock: Inventory::new(), room: 30, forced: 0, allow_force: false };
        let returned = refund_taken(&mut base, BaseKey::new(1, 1), Payload::new(IRON, 80, QualityTier(0)));
        assert_eq!(returned, 30);
        assert_eq!(base.stock.get(IRON), 30);
    }

    #[test]
    fn acquire_race_hands_cargo_back() {
        let (coordinator, mut entry, mut host) = setup(1, 70, vec![dispenser(7)]);
        let claimed = entry.pool.acquire();
        assert!(claimed.is_some());
        let demand = DemandRecord {
            item: IRON,
            needed_quantity: 0,
            target: DeliveryTarget::Dispenser(DispenserId(7)),
            position: Vec3::new(10.0, 0.0, 0.0),
            urgency: 0.0,
            distance_from_base: 10.0,
        };
        let env = coordinator.env(&entry);
        let outcome = coordinator.dispatch_one(&mut entry, Vec3::ZERO, &demand, &mut host, &env);
        assert!(matches!(outcome, Dispatch::NoCourier));
        assert_eq!(host.stock.get(IRON), 70);
        assert_eq!(entry.pool.working_count(), 1);
        assert_eq!(entry.pool.carried_total(), 0);
    }

    #[test]
    fn empty_inventory_skips() {
        let (coordinator, mut entry, mut host) = setup(2, 0, vec![dispenser(7)]);
        let report = coordinator.tick(&mut entry, Vec3::ZERO, &mut host, 30.0);
        assert_eq!(report.skipped, Some(SkipReason::EmptyInventory));
        assert_eq!(host.scans.get(), 0);
    }

    #[test]
    fn mecha_trip_clamped_to_need() {
        let (coordinator, _, _) = setup(1, 0, Vec::new());
        let demand = DemandRecord {
            item: IRON,
            needed_quantity: 12,
            target: DeliveryTarget::MechaSlot(0),
            position: Vec3::ZERO,
            urgency: 0.0,
            distance_from_base: 0.0,
        };
        assert_eq!(coordinator.trip_cap(&demand), 12);
        let dispenser = DemandRecord {
            target: DeliveryTarget::Dispenser(DispenserId(1)),
            ..demand.clone()
        };
        assert_eq!(coordinator.trip_cap(&dispenser), 100);
    }
}
