//! Read-only courier enumeration for presentation layers.

use serde::{Deserialize, Serialize};

use crate::courier::{CourierSlot, Phase};
use crate::geometry::Vec3;
use crate::item::Payload;
use crate::registry::{BaseKey, BaseLogisticsRegistry, PartitionId};

/// One visible courier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourierSprite {
    pub base: BaseKey,
    pub slot: usize,
    pub position: Vec3,
    /// Fraction of the current leg flown, `[0, 1]`.
    pub progress: f32,
    /// Unit vector of travel; zero while holding at the base.
    pub heading: Vec3,
    pub phase: Phase,
    pub payload: Option<Payload>,
}

impl CourierSprite {
    fn from_slot(base: BaseKey, slot: usize, courier: &CourierSlot) -> Self {
        let phase = courier.phase();
        let toward = match phase {
            Phase::ReturningToBase => courier.begin - courier.end,
            _ => courier.end - courier.begin,
        };
        let heading = if courier.progress <= 0.0 && phase == Phase::ReturningToBase {
            Vec3::ZERO
        } else {
            toward.normalize()
        };
        Self {
            base,
            slot,
            position: courier.position(),
            progress: courier.progress_fraction(),
            heading,
            phase,
            payload: courier.payload,
        }
    }
}

/// Receives sprites once per frame. Nothing in the scheduler waits on it.
pub trait RenderingSink {
    fn begin_frame(&mut self) {}
    fn draw(&mut self, sprite: CourierSprite);
}

impl RenderingSink for Vec<CourierSprite> {
    fn begin_frame(&mut self) {
        self.clear();
    }

    fn draw(&mut self, sprite: CourierSprite) {
        self.push(sprite);
    }
}

/// Every non-idle courier in a partition.
pub fn collect_sprites(registry: &BaseLogisticsRegistry, partition: PartitionId) -> Vec<CourierSprite> {
    let mut sprites = Vec::new();
    registry.for_each(partition, |entry| {
        sprites.extend(
            entry
                .pool
                .active()
                .map(|(handle, slot)| CourierSprite::from_slot(entry.key, handle.index(), slot)),
        );
    });
    sprites
}

/// Push one frame of sprites for a partition into `sink`. Returns the count.
pub fn publish<R>(registry: &BaseLogisticsRegistry, partition: PartitionId, sink: &mut R) -> usize
where
    R: RenderingSink + ?Sized,
{
    sink.begin_frame();
    let sprites = collect_sprites(registry, partition);
    let count = sprites.len();
    for sprite in sprites {
        sink.draw(sprite);
    }
    count
}
