//! World generation - seeded layout of bases and consumers on each planet.

use courier_logic::demand::StorageMode;
use courier_logic::geometry::Vec3;
use courier_logic::item::{ItemKind, Quantity};
use courier_logic::registry::{BaseId, PartitionId};
use courier_logic::target::{DispenserId, StationId};
use hecs::World;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::components::{
    Dispenser, Location, LogisticsBase, LogisticsTower, Mecha, Name, PackageSlot, Producer,
    Storage, TowerSlot,
};

/// Item kinds the generator stocks bases with.
pub const ITEM_CATALOG: [ItemKind; 6] = [
    ItemKind(1101), // iron ingot
    ItemKind(1104), // copper ingot
    ItemKind(1102), // magnet
    ItemKind(1201), // gear
    ItemKind(1301), // circuit board
    ItemKind(1120), // hydrogen
];

/// Configuration for world generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub seed: u64,
    pub partitions: u32,
    pub bases_per_partition: u32,
    pub dispensers_per_base: u32,
    pub towers_per_partition: u32,
    /// Spawn a walking mecha on the first partition.
    pub with_mecha: bool,
    pub planet_radius: f32,
    /// Dispensers are scattered within this distance of their base.
    pub scatter: f32,
    pub base_storage_capacity: u64,
    pub initial_stock: Quantity,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            partitions: 1,
            bases_per_partition: 2,
            dispensers_per_base: 4,
            towers_per_partition: 1,
            with_mecha: true,
            planet_radius: 200.0,
            scatter: 30.0,
            base_storage_capacity: 5000,
            initial_stock: 400,
        }
    }
}

impl WorldConfig {
    /// Parse from JSON. Missing keys take defaults.
    pub fn from_json_str(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }
}

/// Summary of a generated world
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldLayout {
    pub bases: u32,
    pub dispensers: u32,
    pub towers: u32,
    pub mecha: u32,
}

/// Random point on the sphere of radius `radius`.
fn surface_point(rng: &mut impl Rng, radius: f32) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        let len = v.length();
        if len > 0.05 && len <= 1.0 {
            return v.normalize() * radius;
        }
    }
}

/// Point near `anchor`, pushed back onto the surface.
fn scatter_near(rng: &mut impl Rng, anchor: Vec3, scatter: f32, radius: f32) -> Vec3 {
    let offset = Vec3::new(
        rng.gen_range(-scatter..scatter),
        rng.gen_range(-scatter..scatter),
        rng.gen_range(-scatter..scatter),
    );
    (anchor + offset).normalize() * radius
}

/// Populate `world` from `config`.
pub fn generate_world(world: &mut World, config: &WorldConfig, rng: &mut impl Rng) -> WorldLayout {
    let mut layout = WorldLayout::default();
    let radius = config.planet_radius.max(1.0);
    let scatter = config.scatter.max(0.1);

    for p in 0..config.partitions {
        let partition = PartitionId(p + 1);
        let mut next_dispenser = 1;

        for b in 0..config.bases_per_partition {
            let position = surface_point(rng, radius);
            let mut storage = Storage::with_capacity(config.base_storage_capacity);
            let mut stocked: Vec<ItemKind> = ITEM_CATALOG.to_vec();
            stocked.shuffle(rng);
            stocked.truncate(3);
            for &item in &stocked {
                storage.add(item, rng.gen_range(config.initial_stock / 2..=config.initial_stock), Default::default());
            }
            let producer = Producer {
                item: stocked[0],
                per_cycle: rng.gen_range(5..=20),
            };
            world.spawn((
                Location::new(partition, position),
                LogisticsBase {
                    id: BaseId(b + 1),
                    storage,
                },
                producer,
                Name(format!("Base {}-{}", partition.0, b + 1)),
            ));
            layout.bases += 1;

            for _ in 0..config.dispensers_per_base {
                let filter = *stocked.choose(rng).unwrap_or(&ITEM_CATALOG[0]);
                let storage_slots = rng.gen_range(2..=6);
                world.spawn((
                    Location::new(partition, scatter_near(rng, position, scatter, radius)),
                    Dispenser {
                        id: DispenserId(next_dispenser),
                        mode: if rng.gen_bool(0.85) {
                            StorageMode::Demand
                        } else {
                            StorageMode::Supply
                        },
                        filter,
                        stock: 0,
                        storage_slots,
                        reserved_slots: rng.gen_range(0..storage_slots),
                        stack_size: 100,
                        overflow: None,
                        pulse_signal: 0,
                        consumption: rng.gen_range(1..=8),
                    },
                ));
                next_dispenser += 1;
                layout.dispensers += 1;
            }
        }

        for t in 0..config.towers_per_partition {
            let slots = (0..5)
                .map(|_| TowerSlot {
                    item: *ITEM_CATALOG.choose(rng).unwrap_or(&ITEM_CATALOG[0]),
                    local_demand: rng.gen_bool(0.6),
                    current: 0,
                    on_order: rng.gen_range(0..50),
                    max: 1000,
                })
                .collect();
            world.spawn((
                Location::new(partition, surface_point(rng, radius)),
                LogisticsTower {
                    id: StationId(t + 1),
                    slots,
                    consumption: rng.gen_range(1..=10),
                },
            ));
            layout.towers += 1;
        }

        if config.with_mecha && p == 0 {
            let package = ITEM_CATALOG[..3]
                .iter()
                .map(|&item| PackageSlot {
                    item,
                    held: 0,
                    required: 50,
                    stack: 100,
                })
                .collect();
            world.spawn((
                Location::new(partition, surface_point(rng, radius)),
                Mecha {
                    alive: true,
                    in_transit: false,
                    delivery_unlocked: true,
                    package,
                    walk_rate: 0.0005,
                    consumption: 2,
                },
                Name("Icarus".to_string()),
            ));
            layout.mecha += 1;
        }
    }

    layout
}
