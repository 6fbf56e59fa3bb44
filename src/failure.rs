//! Failure event synthesis for machines and trucks.

use std::collections::HashMap;
use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::events::{EquipmentKind, FailureEvent};
use crate::market::EquipmentInstance;
use crate::random::failure_quantity;

/// Why no failure event came out of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildSkip {
    NoUnsoldEquipment,
    MissingCatalogEntry { instance_id: u64, static_id: u64 },
}

impl fmt::Display for BuildSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildSkip::NoUnsoldEquipment => write!(f, "no unsold equipment in market snapshot"),
            BuildSkip::MissingCatalogEntry { instance_id, static_id } => write!(
                f,
                "no catalog entry for static id {} (instance {})",
                static_id, instance_id
            ),
        }
    }
}

impl std::error::Error for BuildSkip {}

/// Inputs shared by every draw within one trigger.
pub struct FailureEventBuilder<'a> {
    pub kind: EquipmentKind,
    pub snapshot: &'a [EquipmentInstance],
    pub catalog: &'a HashMap<u64, String>,
    pub simulation_date: &'a str,
    pub simulation_time: &'a str,
}

impl<'a> FailureEventBuilder<'a> {
    /// Draw one failing item and quantity. Called once per subscriber, so
    /// subscribers on the same trigger may hear about different items.
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<FailureEvent, BuildSkip> {
        let item = self.snapshot.choose(rng).ok_or(BuildSkip::NoUnsoldEquipment)?;
        let name = self
            .catalog
            .get(&item.static_catalog_id)
            .ok_or(BuildSkip::MissingCatalogEntry {
                instance_id: item.id,
                static_id: item.static_catalog_id,
            })?;
        Ok(FailureEvent {
            kind: self.kind,
            subject_name: name.clone(),
            failure_quantity: failure_quantity(rng, self.kind),
            simulation_date: self.simulation_date.to_string(),
            simulation_time: self.simulation_time.to_string(),
        })
    }
}
