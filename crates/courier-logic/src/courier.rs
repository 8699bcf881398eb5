//! Courier slots and the fixed-capacity pool that owns them.
//!
//! A slot's phase is derived, never stored:
//! - `max_distance == 0` → Idle
//! - `direction > 0` → outbound to the target
//! - `direction < 0` → returning to the base
//!
//! Cargo is taken from the base at dispatch, so an outbound courier carries
//! its full payload. At the target it hands over what the consumer accepts
//! and flies home with the rest; whatever is still aboard on landing goes
//! back into the base. Quantity is never dropped by the pool.

use serde::{Deserialize, Serialize};

use crate::config::{OverflowPolicy, MAX_COURIER_CAPACITY, MIN_COURIER_CAPACITY};
use crate::geometry::Vec3;
use crate::interfaces::{ItemSink, TargetSink};
use crate::item::{ItemKind, Payload, Quantity};
use crate::registry::BaseKey;
use crate::target::DeliveryTarget;

/// Shortest leg a courier is launched on. Keeps a launched slot non-idle even
/// when the consumer sits on top of the base.
pub const MIN_FLIGHT_DISTANCE: f32 = 0.01;

/// Arrival tolerance when chasing a moving target, as a fraction of the leg.
pub const PURSUIT_ARRIVAL_EPSILON: f32 = 0.02;

/// Flight phase of a courier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    OutboundToTarget,
    ReturningToBase,
}

/// One courier's flight state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourierSlot {
    pub begin: Vec3,
    pub end: Vec3,
    pub progress: f32,
    pub max_distance: f32,
    /// +1 outbound, -1 returning, 0 idle.
    pub direction: f32,
    pub target: Option<DeliveryTarget>,
    pub payload: Option<Payload>,
    /// Handed out by `acquire` but not yet launched.
    claimed: bool,
}

impl CourierSlot {
    pub fn phase(&self) -> Phase {
        if self.max_distance <= 0.0 {
            Phase::Idle
        } else if self.direction > 0.0 {
            Phase::OutboundToTarget
        } else {
            Phase::ReturningToBase
        }
    }

    pub fn is_idle(&self) -> bool {
        self.phase() == Phase::Idle
    }

    /// Idle and not reserved by a pending dispatch.
    fn is_available(&self) -> bool {
        self.is_idle() && !self.claimed
    }

    pub fn carried(&self) -> Quantity {
        self.payload.map_or(0, |p| p.quantity)
    }

    /// Fraction of the leg flown, in `[0, 1]`.
    pub fn progress_fraction(&self) -> f32 {
        if self.max_distance <= 0.0 {
            0.0
        } else {
            (self.progress / self.max_distance).clamp(0.0, 1.0)
        }
    }

    /// Where the courier is now. Chases follow the great circle; fixed legs
    /// follow the chord.
    pub fn position(&self) -> Vec3 {
        let t = self.progress_fraction();
        match self.target {
            Some(target) if target.is_moving() => self.begin.slerp(&self.end, t),
            _ => self.begin.lerp(&self.end, t),
        }
    }

    fn reset(&mut self) {
        *self = CourierSlot::default();
    }
}

/// Index of a slot within its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotHandle(usize);

impl SlotHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Parameters of a launch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightPlan {
    pub begin: Vec3,
    pub end: Vec3,
    pub target: DeliveryTarget,
    pub payload: Payload,
    pub max_distance: f32,
}

/// What happened to one slot during one `advance`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlotEvent {
    /// Slot was idle; nothing changed.
    Idle,
    InFlight,
    /// Outbound leg finished at a live consumer.
    Delivered {
        target: DeliveryTarget,
        item: ItemKind,
        accepted: Quantity,
        held: Quantity,
        carried_back: Quantity,
    },
    /// Outbound leg finished but the consumer is gone; all cargo comes home.
    TargetLost {
        target: DeliveryTarget,
        carried_back: Quantity,
    },
    /// Landed at the base and went idle.
    Returned { refunded: Quantity },
    /// Landed but the base would not take everything; retries next tick.
    ReturnBlocked { pending: Quantity },
}

/// Totals over one `advance_all`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvanceSummary {
    pub in_flight: u32,
    pub deliveries: u32,
    pub delivered_items: u64,
    pub held_items: u64,
    pub lost_targets: u32,
    pub returned: u32,
    pub refunded_items: u64,
    pub blocked: u32,
}

impl AdvanceSummary {
    fn record(&mut self, event: &SlotEvent) {
        match *event {
            SlotEvent::Idle => {}
            SlotEvent::InFlight => self.in_flight += 1,
            SlotEvent::Delivered { accepted, held, .. } => {
                self.deliveries += 1;
                self.delivered_items += accepted as u64;
                self.held_items += held as u64;
            }
            SlotEvent::TargetLost { .. } => self.lost_targets += 1,
            SlotEvent::Returned { refunded } => {
                self.returned += 1;
                self.refunded_items += refunded as u64;
            }
            SlotEvent::ReturnBlocked { .. } => self.blocked += 1,
        }
    }
}

/// Per-base settings threaded through `advance`.
#[derive(Debug, Clone, Copy)]
pub struct FlightEnv {
    pub base: BaseKey,
    pub overflow_policy: OverflowPolicy,
    /// Log per-flight events at info instead of debug.
    pub verbose: bool,
}

/// Items handed back to a base during a forced drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainOutcome {
    pub couriers: u32,
    pub batches: u32,
    pub returned_items: u64,
    /// Payloads the base refused even with forced acceptance, one per courier.
    pub rejected: Vec<Payload>,
    pub rejected_items: u64,
}

/// Fixed-capacity set of couriers owned by one base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourierPool {
    slots: Vec<CourierSlot>,
    idle_count: u32,
    working_count: u32,
}

impl CourierPool {
    /// Create a pool of `capacity` idle couriers (clamped to 1..=200).
    pub fn new(capacity: u32) -> Self {
        let capacity = capacity.clamp(MIN_COURIER_CAPACITY, MAX_COURIER_CAPACITY);
        Self {
            slots: vec![CourierSlot::default(); capacity as usize],
            idle_count: capacity,
            working_count: 0,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    pub fn idle_count(&self) -> u32 {
        self.idle_count
    }

    pub fn working_count(&self) -> u32 {
        self.working_count
    }

    pub fn slot(&self, handle: SlotHandle) -> &CourierSlot {
        &self.slots[handle.0]
    }

    pub fn slots(&self) -> &[CourierSlot] {
        &self.slots
    }

    /// Non-idle slots with their handles.
    pub fn active(&self) -> impl Iterator<Item = (SlotHandle, &CourierSlot)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_idle())
            .map(|(i, s)| (SlotHandle(i), s))
    }

    /// Items aboard all couriers.
    pub fn carried_total(&self) -> u64 {
        self.slots.iter().map(|s| s.carried() as u64).sum()
    }

    /// Whether a courier is already flying `item` out to `target`.
    pub fn has_outbound(&self, target: DeliveryTarget, item: ItemKind) -> bool {
        self.slots.iter().any(|s| {
            s.phase() == Phase::OutboundToTarget
                && s.target == Some(target)
                && s.payload.is_some_and(|p| p.item == item)
        })
    }

    /// Reserve an idle courier.
    pub fn acquire(&mut self) -> Option<SlotHandle> {
        if self.idle_count == 0 {
            return None;
        }
        let index = self.slots.iter().position(CourierSlot::is_available)?;
        self.slots[index].claimed = true;
        self.idle_count -= 1;
        self.working_count += 1;
        Some(SlotHandle(index))
    }

    /// Give back a reservation that was never launched.
    pub fn release(&mut self, handle: SlotHandle) {
        let slot = &mut self.slots[handle.0];
        if slot.claimed && slot.is_idle() {
            slot.reset();
            self.idle_count += 1;
            self.working_count -= 1;
        }
    }

    /// Start an acquired courier on its outbound leg.
    pub fn launch(&mut self, handle: SlotHandle, plan: FlightPlan) {
        let slot = &mut self.slots[handle.0];
        debug_assert!(slot.claimed, "launch without acquire");
        *slot = CourierSlot {
            begin: plan.begin,
            end: plan.end,
            progress: 0.0,
            max_distance: plan.max_distance.max(MIN_FLIGHT_DISTANCE),
            direction: 1.0,
            target: Some(plan.target),
            payload: (plan.payload.quantity > 0).then_some(plan.payload),
            claimed: false,
        };
    }

    /// Move one courier `delta` along its leg, committing delivery or
    /// return when it arrives. Idle slots are left untouched.
    pub fn advance<H>(&mut self, handle: SlotHandle, delta: f32, env: &FlightEnv, host: &mut H) -> SlotEvent
    where
        H: ItemSink + TargetSink + ?Sized,
    {
        let slot = &mut self.slots[handle.0];
        if slot.is_idle() {
            return SlotEvent::Idle;
        }

        if slot.direction > 0.0 {
            let arrived = match slot.target {
                Some(target) if target.is_moving() => {
                    pursue(slot, delta, host.live_position(env.base, target))
                }
                _ => {
                    slot.progress += delta;
                    slot.progress >= slot.max_distance
                }
            };
            if !arrived {
                return SlotEvent::InFlight;
            }
            slot.progress = slot.max_distance;
            slot.direction = -1.0;
            return commit_delivery(slot, env, host);
        }

        slot.progress -= delta;
        if slot.progress > 0.0 {
            return SlotEvent::InFlight;
        }
        slot.progress = 0.0;

        let mut refunded = 0;
        if let Some(payload) = slot.payload {
            refunded = host
                .give(env.base, payload.item, payload.quantity, payload.tier)
                .min(payload.quantity);
            let pending = payload.quantity - refunded;
            if pending > 0 {
                slot.payload = Some(Payload { quantity: pending, ..payload });
                log::warn!(
                    "base {} refused {} x{} from a returning courier; holding at base",
                    env.base,
                    payload.item,
                    pending
                );
                return SlotEvent::ReturnBlocked { pending };
            }
        }

        slot.reset();
        self.idle_count += 1;
        self.working_count -= 1;
        flight_log!(
            env,
            "courier returned to base {} (idle={})",
            env.base,
            self.idle_count
        );
        SlotEvent::Returned { refunded }
    }

    /// Advance every working courier.
    pub fn advance_all<H>(&mut self, delta: f32, env: &FlightEnv, host: &mut H) -> AdvanceSummary
    where
        H: ItemSink + TargetSink + ?Sized,
    {
        let mut summary = AdvanceSummary::default();
        if self.working_count == 0 {
            return summary;
        }
        for index in 0..self.slots.len() {
            let event = self.advance(SlotHandle(index), delta, env, host);
            summary.record(&event);
        }
        summary
    }

    /// Turn every outbound courier bound for `target` around with its cargo.
    /// Returns how many were recalled.
    pub fn recall(&mut self, target: DeliveryTarget) -> u32 {
        let mut recalled = 0;
        for slot in &mut self.slots {
            if slot.phase() == Phase::OutboundToTarget && slot.target == Some(target) {
                slot.direction = -1.0;
                recalled += 1;
            }
        }
        recalled
    }

    /// Force every working courier home: refund cargo with forced
    /// acceptance, then reset the slot to idle.
    pub fn drain<S>(&mut self, base: BaseKey, sink: &mut S) -> DrainOutcome
    where
        S: ItemSink + ?Sized,
    {
        let mut outcome = DrainOutcome::default();
        for slot in &mut self.slots {
            if slot.is_idle() && !slot.claimed {
                continue;
            }
            outcome.couriers += 1;
            if let Some(payload) = slot.payload {
                let accepted = sink
                    .force_give(base, payload.item, payload.quantity, payload.tier)
                    .min(payload.quantity);
                outcome.batches += 1;
                outcome.returned_items += accepted as u64;
                if accepted < payload.quantity {
                    let lost = payload.quantity - accepted;
                    log::warn!(
                        "drain: base {} refused {} x{}; items lost",
                        base,
                        payload.item,
                        lost
                    );
                    outcome.rejected.push(Payload { quantity: lost, ..payload });
                    outcome.rejected_items += lost as u64;
                }
            }
            slot.reset();
        }
        self.idle_count = self.capacity();
        self.working_count = 0;
        outcome
    }
}

/// Re-derive a chase leg from the target's live position, then step.
/// The courier gains its own `delta` plus however much the leg grew, so it
/// always closes in.
fn pursue(slot: &mut CourierSlot, delta: f32, live: Option<Vec3>) -> bool {
    if let Some(live) = live {
        let fraction = slot.progress_fraction();
        let new_max = slot.begin.arc_distance(&live).max(MIN_FLIGHT_DISTANCE);
        let closing = (new_max - slot.max_distance).max(0.0);
        slot.end = live;
        slot.max_distance = new_max;
        slot.progress = fraction * new_max + closing;
    }
    slot.progress += delta;
    slot.progress >= slot.max_distance * (1.0 - PURSUIT_ARRIVAL_EPSILON)
}

fn commit_delivery<H>(slot: &mut CourierSlot, env: &FlightEnv, host: &mut H) -> SlotEvent
where
    H: TargetSink + ?Sized,
{
    let Some(target) = slot.target else {
        return SlotEvent::InFlight;
    };
    let Some(payload) = slot.payload else {
        return SlotEvent::Delivered {
            target,
            item: ItemKind::NONE,
            accepted: 0,
            held: 0,
            carried_back: 0,
        };
    };

    if !host.is_alive(env.base, target) {
        flight_log!(
            env,
            "{} vanished; courier bringing {} x{} back to base {}",
            target,
            payload.item,
            payload.quantity,
            env.base
        );
        return SlotEvent::TargetLost {
            target,
            carried_back: payload.quantity,
        };
    }

    let accepted = host.deliver(env.base, target, payload).min(payload.quantity);
    let mut remaining = payload.quantity - accepted;
    let mut held = 0;
    if remaining > 0 && env.overflow_policy == OverflowPolicy::HoldAtTarget {
        held = host
            .hold_overflow(env.base, target, Payload { quantity: remaining, ..payload })
            .min(remaining);
        remaining -= held;
    }
    slot.payload = (remaining > 0).then_some(Payload { quantity: remaining, ..payload });

    flight_log!(
        env,
        "delivered {} x{} to {} (held {}, carrying back {})",
        payload.item,
        accepted,
        target,
        held,
        remaining
    );
    SlotEvent::Delivered {
        target,
        item: payload.item,
        accepted,
        held,
        carried_back: remaining,
    }
}
