//! Courier Headless Simulation Harness
//!
//! Runs seeded logistics worlds in-process and checks the scheduler's
//! properties: item conservation, pool capacity, service order, drain
//! idempotence and change suppression. No rendering, no host game.
//!
//! Usage:
//!   cargo run -p courier-simtest
//!   cargo run -p courier-simtest -- --verbose

use courier_core::components::{Dispenser, Location, LogisticsBase, Storage};
use courier_core::engine::LogisticsEngine;
use courier_core::generation::WorldConfig;
use courier_core::systems::EntityIndex;
use courier_logic::courier::Phase;
use courier_logic::demand::{merge_demands, DemandRecord, StorageMode};
use courier_logic::geometry::Vec3;
use courier_logic::{
    BaseId, BaseKey, DeliveryTarget, DispenserId, ItemKind, LogisticsConfig, OverflowPolicy,
    PartitionId, QualityTier, StationId, TargetClass,
};
use hecs::Entity;
use serde::Deserialize;

// ── Scenario file ───────────────────────────────────────────────────────
const SCENARIO_JSON: &str = include_str!("../../../data/logistics.json");

#[derive(Debug, Deserialize)]
struct Scenario {
    logistics: LogisticsConfig,
    world: WorldConfig,
    frames: u64,
}

const IRON: ItemKind = ItemKind(1101);

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    let default_filter = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    println!("=== Courier Logistics Harness ===\n");

    let mut results = Vec::new();

    // 1. Scenario file and configuration
    let scenario = load_scenario(&mut results);

    // 2. Round trip and refund on a single base
    results.extend(validate_round_trip(verbose));
    results.extend(validate_refund(verbose));

    // 3. Service order
    results.extend(validate_priority_order(verbose));

    // 4. Change suppression
    results.extend(validate_change_suppression(verbose));

    // 5. Full-world sweep
    if let Some(scenario) = &scenario {
        results.extend(validate_world_sweep(scenario, verbose));
        results.extend(validate_save_load(scenario, verbose));
    }

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// Engine with one base at (200, 0, 0) holding `iron` units of iron and one
/// empty iron dispenser with id 7 at `dispenser_at`.
fn single_base(config: LogisticsConfig, iron: u32, dispenser_at: Vec3) -> Option<(LogisticsEngine, Entity)> {
    let mut engine = match LogisticsEngine::new(config) {
        Ok(e) => e,
        Err(e) => {
            log::error!("single base config rejected: {e}");
            return None;
        }
    };
    let partition = PartitionId(1);
    let mut storage = Storage::with_capacity(10_000);
    storage.add(IRON, iron, QualityTier(0));
    engine.world.spawn((
        Location::new(partition, Vec3::new(200.0, 0.0, 0.0)),
        LogisticsBase {
            id: BaseId(1),
            storage,
        },
    ));
    engine.index = EntityIndex::rebuild(&engine.world);
    engine.load_partition(partition);
    let dispenser = engine.spawn_dispenser(
        partition,
        dispenser_at,
        Dispenser {
            id: DispenserId(7),
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
    Some((engine, dispenser))
}

fn base_iron(engine: &LogisticsEngine) -> u32 {
    engine
        .index
        .bases
        .get(&BaseKey::new(1, 1))
        .and_then(|&e| engine.world.get::<&LogisticsBase>(e).ok().map(|b| b.storage.items.get(IRON)))
        .unwrap_or(0)
}

/// Step until `done` holds or `limit` frames pass. Returns whether it held.
fn run_until(engine: &mut LogisticsEngine, limit: u64, mut done: impl FnMut(&LogisticsEngine) -> bool) -> bool {
    for _ in 0..limit {
        engine.update();
        if done(engine) {
            return true;
        }
    }
    false
}

fn missing(name: &str, detail: &str) -> TestResult {
    TestResult {
        name: name.into(),
        passed: false,
        detail: detail.into(),
    }
}

// ── 1. Scenario ─────────────────────────────────────────────────────────

fn load_scenario(results: &mut Vec<TestResult>) -> Option<Scenario> {
    println!("--- Scenario ---");
    let scenario: Scenario = match serde_json::from_str(SCENARIO_JSON) {
        Ok(s) => s,
        Err(e) => {
            results.push(missing("scenario_parse", &format!("JSON parse error: {}", e)));
            return None;
        }
    };

    let errors = scenario.logistics.validate();
    results.push(TestResult {
        name: "scenario_config_valid".into(),
        passed: errors.is_empty(),
        detail: if errors.is_empty() {
            format!(
                "{} couriers/base, cooldown {} ticks",
                scenario.logistics.courier_capacity_per_base, scenario.logistics.dispatch_cooldown_ticks
            )
        } else {
            format!("{:?}", errors)
        },
    });

    let bad = LogisticsConfig {
        courier_capacity_per_base: 500,
        courier_speed_multiplier: 0.0,
        ..LogisticsConfig::default()
    };
    results.push(TestResult {
        name: "config_rejects_out_of_range".into(),
        passed: bad.validate().len() == 2,
        detail: "capacity 500 and speed 0 both reported".into(),
    });

    Some(scenario)
}

// ── 2. Round Trip & Refund ──────────────────────────────────────────────

fn validate_round_trip(_verbose: bool) -> Vec<TestResult> {
    println!("--- Round Trip ---");
    let mut results = Vec::new();
    let config = LogisticsConfig {
        courier_capacity_per_base: 2,
        ..LogisticsConfig::default()
    };
    let Some((mut engine, _)) = single_base(config, 50, Vec3::new(196.0, 40.0, 0.0)) else {
        return vec![missing("round_trip_setup", "engine rejected config")];
    };
    let key = BaseKey::new(1, 1);

    engine.run(60);
    let dispatched = engine.registry.get(key).is_some_and(|entry| {
        let outbound: Vec<_> = entry.pool.active().map(|(_, s)| s).collect();
        entry.pool.idle_count() == 1
            && outbound.len() == 1
            && outbound[0].payload.is_some_and(|p| p.item == IRON && p.quantity == 50)
            && outbound[0].direction > 0.0
    });
    results.push(TestResult {
        name: "round_trip_dispatch".into(),
        passed: dispatched && base_iron(&engine) == 0,
        detail: "one courier out with 50 iron (clamped from 100), idle_count 1".into(),
    });

    let turned = run_until(&mut engine, 2_000, |e| {
        e.registry.get(key).is_some_and(|entry| {
            entry
                .pool
                .active()
                .any(|(_, s)| s.phase() == Phase::ReturningToBase && s.payload.is_none())
        })
    });
    results.push(TestResult {
        name: "round_trip_delivered".into(),
        passed: turned && engine.stats.delivered_items == 50,
        detail: format!("{} delivered, courier turned home empty", engine.stats.delivered_items),
    });

    let home = run_until(&mut engine, 2_000, |e| {
        e.registry.get(key).is_some_and(|entry| entry.pool.idle_count() == 2)
    });
    results.push(TestResult {
        name: "round_trip_returned".into(),
        passed: home && base_iron(&engine) == 0,
        detail: "both couriers idle, base inventory untouched by the return".into(),
    });

    results
}

fn validate_refund(_verbose: bool) -> Vec<TestResult> {
    println!("--- Refund ---");
    let mut results = Vec::new();
    let config = LogisticsConfig {
        courier_capacity_per_base: 2,
        overflow_policy: OverflowPolicy::CarryBack,
        ..LogisticsConfig::default()
    };
    let Some((mut engine, dispenser)) = single_base(config, 50, Vec3::new(196.0, 40.0, 0.0)) else {
        return vec![missing("refund_setup", "engine rejected config")];
    };

    engine.run(60);
    // Fill the box behind the courier's back so the delivery is rejected.
    if let Ok(d) = engine.world.query_one_mut::<&mut Dispenser>(dispenser) {
        d.stock = d.receivable_capacity() as u32;
    }
    let back = run_until(&mut engine, 4_000, |e| e.couriers_in_flight() == 0);
    results.push(TestResult {
        name: "refund_restores_inventory".into(),
        passed: back && base_iron(&engine) == 50 && engine.stats.refunded_items == 50,
        detail: format!("base holds {} iron after a rejected delivery", base_iron(&engine)),
    });

    let Some((mut engine, _)) = single_base(LogisticsConfig::default(), 50, Vec3::new(196.0, 40.0, 0.0)) else {
        return results;
    };
    engine.run(70);
    engine.remove_dispenser(PartitionId(1), DispenserId(7));
    let back = run_until(&mut engine, 4_000, |e| e.couriers_in_flight() == 0);
    results.push(TestResult {
        name: "refund_after_consumer_removed".into(),
        passed: back && base_iron(&engine) == 50 && engine.stats.delivered_items == 0,
        detail: "courier recalled mid-flight, cargo returned".into(),
    });

    results
}

// ── 3. Priority Order ───────────────────────────────────────────────────

fn record(target: DeliveryTarget, urgency: f32, distance: f32) -> DemandRecord {
    DemandRecord {
        item: IRON,
        needed_quantity: 0,
        target,
        position: Vec3::ZERO,
        urgency,
        distance_from_base: distance,
    }
}

fn validate_priority_order(verbose: bool) -> Vec<TestResult> {
    println!("--- Priority Order ---");
    let mut results = Vec::new();

    let mut mecha = Vec::new();
    let mut towers = Vec::new();
    let mut dispensers = Vec::new();
    for i in 0..30u32 {
        let urgency = ((i * 7) % 11) as f32 / 10.0;
        let distance = ((i * 13) % 17) as f32;
        match i % 3 {
            0 => dispensers.push(record(DeliveryTarget::Dispenser(DispenserId(i)), urgency, distance)),
            1 => towers.push(record(DeliveryTarget::LogisticsTower(StationId(i), 0), urgency, distance)),
            _ => mecha.push(record(DeliveryTarget::MechaSlot(i as u16), urgency, distance)),
        }
    }
    let merged = merge_demands(dispensers, mecha, towers);

    let classes_ordered = merged
        .windows(2)
        .all(|w| w[0].target.class() <= w[1].target.class());
    results.push(TestResult {
        name: "priority_class_order".into(),
        passed: classes_ordered && merged.len() == 30,
        detail: "mecha before tower before dispenser".into(),
    });

    let within_ordered = merged.windows(2).all(|w| {
        w[0].target.class() != w[1].target.class()
            || w[0].urgency < w[1].urgency
            || (w[0].urgency == w[1].urgency && w[0].distance_from_base <= w[1].distance_from_base)
    });
    results.push(TestResult {
        name: "priority_within_class".into(),
        passed: within_ordered,
        detail: "ascending urgency, then ascending distance".into(),
    });

    if verbose {
        let first = merged.first().map(|r| r.target.class());
        let last = merged.last().map(|r| r.target.class());
        println!("  first {:?}, last {:?}", first, last);
    }
    results.push(TestResult {
        name: "priority_bounds".into(),
        passed: merged.first().map(|r| r.target.class()) == Some(TargetClass::Mecha)
            && merged.last().map(|r| r.target.class()) == Some(TargetClass::Dispenser),
        detail: "mecha first, dispenser last".into(),
    });

    results
}

// ── 4. Change Suppression ───────────────────────────────────────────────

fn validate_change_suppression(_verbose: bool) -> Vec<TestResult> {
    println!("--- Change Suppression ---");
    let mut results = Vec::new();
    let config = LogisticsConfig {
        courier_capacity_per_base: 1,
        ..LogisticsConfig::default()
    };
    // A quarter of the planet away: the only courier is gone a long time.
    let Some((mut engine, _)) = single_base(config, 500, Vec3::new(0.0, 200.0, 0.0)) else {
        return vec![missing("suppression_setup", "engine rejected config")];
    };

    engine.run(60);
    let baseline = engine.stats.scans;
    engine.run(900);
    results.push(TestResult {
        name: "suppression_no_rescan_while_busy".into(),
        passed: baseline == 1 && engine.stats.scans == baseline,
        detail: format!("{} scans across 15 busy rounds", engine.stats.scans - baseline),
    });

    let rescanned = run_until(&mut engine, 5_000, |e| e.stats.scans > baseline);
    results.push(TestResult {
        name: "suppression_rescan_on_return".into(),
        passed: rescanned && engine.stats.dispatches >= 2,
        detail: format!("rescan after the courier came home (frame {})", engine.frame),
    });

    results
}

// ── 5. World Sweep ──────────────────────────────────────────────────────

fn validate_world_sweep(scenario: &Scenario, verbose: bool) -> Vec<TestResult> {
    println!("--- World Sweep ---");
    let mut results = Vec::new();
    let Ok(mut engine) = LogisticsEngine::new(scenario.logistics.clone()) else {
        return vec![missing("sweep_setup", "scenario config rejected")];
    };
    let layout = engine.generate(&scenario.world);
    let initial = engine.items_in_world();
    let capacity = engine.config().courier_capacity_per_base;

    let mut capacity_ok = true;
    let mut conservation_ok = true;
    let mut peak_in_flight = 0;
    for frame in 0..scenario.frames {
        engine.update();
        for entry in engine.registry.iter() {
            if entry.pool.idle_count() + entry.pool.working_count() != capacity {
                capacity_ok = false;
            }
        }
        peak_in_flight = peak_in_flight.max(engine.couriers_in_flight());
        if frame % 60 == 0 {
            let stats = engine.stats;
            let now = engine.items_in_world() + engine.items_aloft() + stats.consumed;
            if now != initial + stats.produced {
                conservation_ok = false;
                log::error!("frame {}: {} items accounted, expected {}", frame, now, initial + stats.produced);
            }
        }
    }

    let stats = engine.stats;
    results.push(TestResult {
        name: "sweep_capacity_invariant".into(),
        passed: capacity_ok,
        detail: format!("idle + working == {} for every base, peak {} aloft", capacity, peak_in_flight),
    });
    results.push(TestResult {
        name: "sweep_conservation".into(),
        passed: conservation_ok,
        detail: format!("{} produced, {} consumed, {} aloft", stats.produced, stats.consumed, engine.items_aloft()),
    });
    results.push(TestResult {
        name: "sweep_dispatches".into(),
        passed: stats.dispatches > 0 && stats.deliveries > 0,
        detail: format!(
            "{} bases: {} dispatches, {} deliveries, {} items delivered, {} held",
            layout.bases, stats.dispatches, stats.deliveries, stats.delivered_items, stats.held_items
        ),
    });

    if verbose {
        println!(
            "  {} scans, {} lost targets, {} refunded",
            stats.scans, stats.lost_targets, stats.refunded_items
        );
    }

    results
}

fn validate_save_load(scenario: &Scenario, _verbose: bool) -> Vec<TestResult> {
    println!("--- Save / Load ---");
    let mut results = Vec::new();
    let Ok(mut engine) = LogisticsEngine::new(scenario.logistics.clone()) else {
        return vec![missing("save_setup", "scenario config rejected")];
    };
    engine.generate(&scenario.world);
    engine.run(90);
    let total = engine.items_in_world() + engine.items_aloft();

    let mut first = Vec::new();
    let mut second = Vec::new();
    let drains = match (engine.save(&mut first), engine.save(&mut second)) {
        (Ok(a), Ok(b)) => Some((a, b)),
        _ => None,
    };
    results.push(TestResult {
        name: "drain_idempotent".into(),
        passed: drains.as_ref().is_some_and(|(a, b)| {
            a.is_clean() && b.couriers_recalled == 0 && b.items_returned == 0
        }) && first == second,
        detail: drains.as_ref().map_or("save failed".into(), |(a, _)| {
            format!("{} couriers recalled once, second save identical", a.couriers_recalled)
        }),
    });

    let mut loaded = LogisticsEngine::default();
    let ok = loaded.load(&first[..]).is_ok();
    results.push(TestResult {
        name: "save_load_conserves".into(),
        passed: ok && loaded.items_in_world() == total && loaded.items_aloft() == 0,
        detail: format!("{} items before save, {} after load", total, loaded.items_in_world()),
    });

    results
}
