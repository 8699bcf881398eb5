//! Pure courier scheduling logic for base logistics.
//!
//! A base owns a fixed pool of couriers. Every tick it moves the couriers
//! already in flight and, on its dispatch cadence, looks for unmet demand at
//! nearby consumers and launches idle couriers loaded from its own stock.
//! The crate has no engine or I/O dependencies: the host world is reached
//! only through the traits in [`interfaces`].
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Recognised options, defaults, validation, JSON loading |
//! | [`courier`] | Courier slots, the fixed-capacity pool, flight and delivery |
//! | [`demand`] | Mecha, tower and dispenser scanners; service ordering |
//! | [`dispatch`] | Per-base tick: cooldown, change suppression, dispatch loop |
//! | [`geometry`] | 3D vectors, chord and great-circle interpolation |
//! | [`interfaces`] | Collaborator traits a host implements |
//! | [`item`] | Item kinds, payloads, inventories |
//! | [`persistence`] | Pre-save drain and post-load rebind |
//! | [`registry`] | Per-base state keyed by (partition, base) |
//! | [`render`] | Read-only courier sprites for presentation layers |
//! | [`target`] | Delivery targets and their service classes |

/// Per-flight chatter: `info` when `debug_logging` is on, `debug` otherwise.
macro_rules! flight_log {
    ($env:expr, $($arg:tt)+) => {
        if $env.verbose {
            log::info!($($arg)+);
        } else {
            log::debug!($($arg)+);
        }
    };
}

pub mod config;
pub mod courier;
pub mod demand;
pub mod dispatch;
pub mod geometry;
pub mod interfaces;
pub mod item;
pub mod persistence;
pub mod registry;
pub mod render;
pub mod target;

pub use config::{ConfigError, LogisticsConfig, OverflowPolicy};
pub use courier::{CourierPool, CourierSlot, Phase, SlotEvent, SlotHandle};
pub use demand::DemandRecord;
pub use dispatch::{DispatchCoordinator, SkipReason, TickReport};
pub use interfaces::{DemandSource, InventorySource, ItemSink, LogisticsHost, TargetSink};
pub use item::{Inventory, ItemKind, Payload, QualityTier, Quantity};
pub use persistence::{drain_partition, post_load_rebind, pre_save_drain, DrainReport};
pub use registry::{BaseId, BaseKey, BaseLogisticsEntry, BaseLogisticsRegistry, PartitionId};
pub use target::{DeliveryTarget, DispenserId, StationId, TargetClass};
