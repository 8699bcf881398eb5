//! Save/Load for logistics worlds
//!
//! Uses bincode for the whole snapshot. Components are serialized per entity
//! as optionals and reattached on load. Courier pools are written after the
//! engine drains them, so a save never holds cargo in the air.

use std::collections::BTreeSet;
use std::io::{Read, Write};

use courier_logic::config::{ConfigError, LogisticsConfig};
use courier_logic::registry::{BaseLogisticsRegistry, PartitionId};
use hecs::World;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::components::*;

/// Version number for save file format (increment when format changes)
const SAVE_VERSION: u32 = 1;

/// Serializable snapshot of a logistics world
#[derive(Serialize, Deserialize)]
pub struct SaveData {
    pub version: u32,
    pub frame: u64,
    pub courier_speed: f32,
    pub config: LogisticsConfig,
    pub registry: BaseLogisticsRegistry,
    pub loaded: BTreeSet<PartitionId>,
    pub entities: Vec<SerializableEntity>,
}

/// All possible components for an entity, serialized as optionals
#[derive(Serialize, Deserialize, Default)]
pub struct SerializableEntity {
    pub location: Option<Location>,
    pub name: Option<Name>,
    pub base: Option<LogisticsBase>,
    pub producer: Option<Producer>,
    pub dispenser: Option<Dispenser>,
    pub tower: Option<LogisticsTower>,
    pub mecha: Option<Mecha>,
}

fn serialize_entities(world: &World) -> Vec<SerializableEntity> {
    world
        .iter()
        .map(|entity| SerializableEntity {
            location: entity.get::<&Location>().map(|c| *c),
            name: entity.get::<&Name>().map(|c| (*c).clone()),
            base: entity.get::<&LogisticsBase>().map(|c| (*c).clone()),
            producer: entity.get::<&Producer>().map(|c| *c),
            dispenser: entity.get::<&Dispenser>().map(|c| (*c).clone()),
            tower: entity.get::<&LogisticsTower>().map(|c| (*c).clone()),
            mecha: entity.get::<&Mecha>().map(|c| (*c).clone()),
        })
        .collect()
}

fn spawn_entity(world: &mut World, se: SerializableEntity) {
    let entity = world.spawn(());

    if let Some(c) = se.location {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.name {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.base {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.producer {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.dispenser {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.tower {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.mecha {
        let _ = world.insert_one(entity, c);
    }
}

/// Save a world and its courier pools to a writer.
pub fn save_world<W: Write>(
    writer: W,
    world: &World,
    registry: &BaseLogisticsRegistry,
    config: &LogisticsConfig,
    frame: u64,
    courier_speed: f32,
    loaded: &BTreeSet<PartitionId>,
) -> Result<(), SaveError> {
    let save_data = SaveData {
        version: SAVE_VERSION,
        frame,
        courier_speed,
        config: config.clone(),
        registry: registry.clone(),
        loaded: loaded.clone(),
        entities: serialize_entities(world),
    };

    bincode::serialize_into(writer, &save_data)?;
    Ok(())
}

/// Load a world from a reader. The stored config is validated again.
pub fn load_world<R: Read>(reader: R) -> Result<LoadedWorld, SaveError> {
    let save_data: SaveData = bincode::deserialize_from(reader)?;

    if save_data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save_data.version,
        });
    }
    if let Some(err) = save_data.config.validate().into_iter().next() {
        return Err(SaveError::Config(err));
    }

    let mut world = World::new();
    for se in save_data.entities {
        spawn_entity(&mut world, se);
    }

    Ok(LoadedWorld {
        world,
        frame: save_data.frame,
        courier_speed: save_data.courier_speed,
        config: save_data.config,
        registry: save_data.registry,
        loaded: save_data.loaded,
    })
}

/// Result of loading a world
pub struct LoadedWorld {
    pub world: World,
    pub frame: u64,
    pub courier_speed: f32,
    pub config: LogisticsConfig,
    pub registry: BaseLogisticsRegistry,
    pub loaded: BTreeSet<PartitionId>,
}

/// Errors that can occur during save/load
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("Save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("Saved configuration is invalid: {0}")]
    Config(#[from] ConfigError),
}
