//! Save/load hooks for the scheduler.
//!
//! Before the host serializes its world, [`pre_save_drain`] forces every
//! courier home so no cargo is ever written out mid-flight. After a load,
//! [`post_load_rebind`] clears scan history and the coordinator rediscovers
//! demand on its own.

use crate::interfaces::ItemSink;
use crate::item::Payload;
use crate::registry::{BaseKey, BaseLogisticsEntry, BaseLogisticsRegistry, PartitionId};

/// Totals from one drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub bases: u32,
    pub couriers_recalled: u32,
    pub items_returned: u64,
    pub items_lost: u64,
    /// Refunds the base refused even with forced acceptance.
    pub rejected: Vec<(BaseKey, Payload)>,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    fn absorb<S>(&mut self, entry: &mut BaseLogisticsEntry, sink: &mut S)
    where
        S: ItemSink + ?Sized,
    {
        self.bases += 1;
        if entry.pool.working_count() == 0 {
            return;
        }
        let outcome = entry.pool.drain(entry.key, sink);
        self.couriers_recalled += outcome.couriers;
        self.items_returned += outcome.returned_items;
        self.items_lost += outcome.rejected_items;
        self.rejected
            .extend(outcome.rejected.into_iter().map(|payload| (entry.key, payload)));
    }

    fn log(&self, scope: &str) {
        if self.couriers_recalled > 0 {
            log::info!(
                "{scope} drain: {} couriers recalled across {} bases, {} items returned",
                self.couriers_recalled,
                self.bases,
                self.items_returned
            );
        }
        if !self.is_clean() {
            log::error!(
                "{scope} drain lost {} items across {} refunds",
                self.items_lost,
                self.rejected.len()
            );
        }
    }
}

/// Return every in-flight courier's cargo to its base and idle all slots.
/// Calling it again right away is a no-op.
pub fn pre_save_drain<S>(registry: &mut BaseLogisticsRegistry, sink: &mut S) -> DrainReport
where
    S: ItemSink + ?Sized,
{
    let mut report = DrainReport::default();
    for entry in registry.iter_mut() {
        report.absorb(entry, sink);
    }
    report.log("pre-save");
    report
}

/// Drain only the bases of one partition, ahead of unloading it.
pub fn drain_partition<S>(
    registry: &mut BaseLogisticsRegistry,
    partition: PartitionId,
    sink: &mut S,
) -> DrainReport
where
    S: ItemSink + ?Sized,
{
    let mut report = DrainReport::default();
    registry.for_each_mut(partition, |entry| report.absorb(entry, sink));
    report.log("partition");
    report
}

/// Prepare freshly loaded state for the first tick.
pub fn post_load_rebind(registry: &mut BaseLogisticsRegistry) {
    let mut bases = 0;
    for entry in registry.iter_mut() {
        entry.reset_scan_state();
        bases += 1;
    }
    log::debug!("post-load rebind: {bases} bases will rescan");
}
