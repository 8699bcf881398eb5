//! Integration tests for the ECS host: generated worlds, economy, save/load.

use courier_core::generation::WorldConfig;
use courier_core::prelude::*;
use courier_logic::render::CourierSprite;
use courier_logic::target::DispenserId;

fn busy_world() -> WorldConfig {
    WorldConfig {
        seed: 11,
        partitions: 2,
        bases_per_partition: 2,
        dispensers_per_base: 5,
        towers_per_partition: 1,
        ..WorldConfig::default()
    }
}

fn engine_for(config: &WorldConfig) -> LogisticsEngine {
    let mut engine = LogisticsEngine::default();
    engine.generate(config);
    engine
}

// ── Conservation ───────────────────────────────────────────────────────

#[test]
fn items_are_conserved_through_economy_and_flights() {
    let mut engine = engine_for(&busy_world());
    let initial = engine.items_in_world();

    for _ in 0..20 {
        engine.run(97);
        let expected = initial + engine.stats.produced - engine.stats.consumed;
        assert_eq!(engine.items_in_world() + engine.items_aloft(), expected);
    }
    assert!(engine.stats.dispatches > 0);
    assert!(engine.stats.deliveries > 0);
}

#[test]
fn couriers_never_exceed_capacity() {
    let mut engine = engine_for(&busy_world());
    let capacity = engine.config().courier_capacity_per_base;
    for _ in 0..600 {
        engine.update();
        for entry in engine.registry.iter() {
            assert!(entry.pool.working_count() <= capacity);
            assert_eq!(entry.pool.idle_count() + entry.pool.working_count(), capacity);
        }
    }
}

// ── Save / Load ────────────────────────────────────────────────────────

#[test]
fn save_mid_flight_keeps_every_item() {
    let mut engine = engine_for(&busy_world());
    engine.run(90);
    let before = engine.items_in_world() + engine.items_aloft();
    assert!(engine.couriers_in_flight() > 0, "expected couriers aloft at frame 90");

    let mut buf = Vec::new();
    let drain = engine.save(&mut buf).unwrap();
    assert!(drain.is_clean());
    assert!(drain.couriers_recalled > 0);
    assert_eq!(engine.items_aloft(), 0);
    assert_eq!(engine.items_in_world(), before);

    let mut loaded = LogisticsEngine::default();
    loaded.load(&buf[..]).unwrap();
    assert_eq!(loaded.items_in_world(), before);
    assert_eq!(loaded.couriers_in_flight(), 0);
    assert!(loaded.registry.iter().all(|e| e.cooldown_counter == 0 && e.last_known_inventory.is_empty()));
}

#[test]
fn loaded_world_resumes_dispatching() {
    let mut engine = engine_for(&busy_world());
    engine.run(90);
    let mut buf = Vec::new();
    engine.save(&mut buf).unwrap();

    let mut loaded = LogisticsEngine::default();
    loaded.load(&buf[..]).unwrap();
    loaded.run(120);
    assert!(loaded.stats.dispatches > 0);
}

// ── Partitions and removal ─────────────────────────────────────────────

#[test]
fn unloading_one_partition_leaves_the_other_running() {
    let mut engine = engine_for(&busy_world());
    engine.run(90);
    let total = engine.items_in_world() + engine.items_aloft();

    let report = engine.unload_partition(PartitionId(2));
    assert!(report.is_clean());
    assert!(!engine.is_loaded(PartitionId(2)));
    assert_eq!(engine.registry.partitions().collect::<Vec<_>>(), vec![PartitionId(1)]);
    assert_eq!(engine.items_in_world() + engine.items_aloft(), total);

    engine.run(120);
    assert!(engine.registry.partitions().all(|p| p == PartitionId(1)));

    engine.load_partition(PartitionId(2));
    engine.run(61);
    assert!(engine.registry.partitions().any(|p| p == PartitionId(2)));
}

#[test]
fn removed_dispenser_stops_receiving() {
    let mut engine = engine_for(&busy_world());
    engine.run(90);
    let mut removed_items = 0;
    for id in 1..=10 {
        if let Some(d) = engine.remove_dispenser(PartitionId(1), DispenserId(id)) {
            removed_items += d.stock as u64 + d.overflow.map_or(0, |p| p.quantity as u64);
        }
    }
    assert_eq!(engine.stats.removed, removed_items);

    engine.run(600);
    let initial = engine_for(&busy_world()).items_in_world();
    let stats = engine.stats;
    assert_eq!(
        engine.items_in_world() + engine.items_aloft() + stats.consumed + stats.removed,
        initial + stats.produced
    );
}

#[test]
fn dead_mecha_turns_couriers_back() {
    let mut engine = engine_for(&WorldConfig {
        dispensers_per_base: 0,
        towers_per_partition: 0,
        ..busy_world()
    });
    engine.run(61);
    engine.set_mecha_state(PartitionId(1), |m| m.alive = false);
    let delivered = engine.stats.delivered_items;
    engine.run(60 * 30);
    assert_eq!(engine.stats.delivered_items, delivered);
    assert_eq!(engine.couriers_in_flight(), 0);
}

#[test]
fn locked_mecha_turns_couriers_back() {
    let mut engine = engine_for(&WorldConfig {
        dispensers_per_base: 0,
        towers_per_partition: 0,
        ..busy_world()
    });
    engine.run(61);
    engine.set_mecha_state(PartitionId(1), |m| m.delivery_unlocked = false);
    let delivered = engine.stats.delivered_items;
    engine.run(60 * 30);
    assert_eq!(engine.stats.delivered_items, delivered);
    assert_eq!(engine.couriers_in_flight(), 0);
}

// ── Presentation ───────────────────────────────────────────────────────

#[test]
fn render_publishes_one_sprite_per_working_courier() {
    let mut engine = engine_for(&busy_world());
    engine.run(90);
    let mut sprites: Vec<CourierSprite> = Vec::new();
    let published = engine.render(PartitionId(1), &mut sprites);
    let working: u32 = engine
        .registry
        .iter()
        .filter(|e| e.key.partition == PartitionId(1))
        .map(|e| e.pool.working_count())
        .sum();
    assert_eq!(published, working as usize);
    assert_eq!(sprites.len(), published);
}
