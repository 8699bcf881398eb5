//! Economy systems - production at bases, consumption at consumers,
//! mecha movement and delivery indicators.

use courier_logic::item::QualityTier;
use hecs::World;

use crate::components::{Dispenser, Location, LogisticsBase, LogisticsTower, Mecha, Producer};

/// Feed producer output into base storage. Full storages stall production.
pub fn production_system(world: &mut World) -> u64 {
    let mut produced = 0;
    for (_, (base, producer)) in world.query_mut::<(&mut LogisticsBase, &Producer)>() {
        produced += base
            .storage
            .add(producer.item, producer.per_cycle, QualityTier::default()) as u64;
    }
    produced
}

/// Consumers use up stock; parked overflow moves into freed room.
pub fn consumption_system(world: &mut World) -> u64 {
    let mut consumed = 0u64;

    for (_, dispenser) in world.query_mut::<&mut Dispenser>() {
        let used = dispenser.consumption.min(dispenser.stock);
        dispenser.stock -= used;
        consumed += used as u64;
        dispenser.settle_overflow();
    }

    for (_, tower) in world.query_mut::<&mut LogisticsTower>() {
        let rate = tower.consumption;
        for slot in &mut tower.slots {
            let used = rate.min(slot.current);
            slot.current -= used;
            consumed += used as u64;
        }
    }

    for (_, mecha) in world.query_mut::<&mut Mecha>() {
        if !mecha.alive {
            continue;
        }
        let rate = mecha.consumption;
        for slot in &mut mecha.package {
            let used = rate.min(slot.held);
            slot.held -= used;
            consumed += used as u64;
        }
    }

    consumed
}

/// Walk every mecha one frame along its track.
pub fn mecha_walk_system(world: &mut World) {
    for (_, (loc, mecha)) in world.query_mut::<(&mut Location, &Mecha)>() {
        if mecha.alive && !mecha.in_transit {
            loc.position = mecha.step(loc.position);
        }
    }
}

/// Count down dispenser delivery indicators.
pub fn pulse_system(world: &mut World) {
    for (_, dispenser) in world.query_mut::<&mut Dispenser>() {
        dispenser.pulse_signal = dispenser.pulse_signal.saturating_sub(1);
    }
}
