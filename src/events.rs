//! Outbound notification payloads.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentKind {
    Machine,
    Truck,
}

impl EquipmentKind {
    /// JSON key that carries the failing item's display name.
    pub fn name_field(&self) -> &'static str {
        match self {
            EquipmentKind::Machine => "machineName",
            EquipmentKind::Truck => "truckName",
        }
    }
}

/// Delivery category; one subscriber list per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    MachineFailure,
    TruckFailure,
    RateUpdate,
    Epoch,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::MachineFailure => "machine_failure",
            Category::TruckFailure => "truck_failure",
            Category::RateUpdate => "rate_update",
            Category::Epoch => "epoch",
        }
    }

    pub fn for_failure(kind: EquipmentKind) -> Self {
        match kind {
            EquipmentKind::Machine => Category::MachineFailure,
            EquipmentKind::Truck => Category::TruckFailure,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailureEvent {
    pub kind: EquipmentKind,
    pub subject_name: String,
    pub failure_quantity: u32,
    pub simulation_date: String,
    pub simulation_time: String,
}

impl FailureEvent {
    /// Wire form; the name key depends on the equipment kind.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert(self.kind.name_field().to_string(), self.subject_name.clone().into());
        map.insert("failureQuantity".to_string(), self.failure_quantity.into());
        map.insert("simulationDate".to_string(), self.simulation_date.clone().into());
        map.insert("simulationTime".to_string(), self.simulation_time.clone().into());
        serde_json::Value::Object(map)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateUpdateEvent {
    pub prime_rate: f64,
    pub simulation_date: String,
    pub simulation_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochEvent {
    pub epoch_start_time: i64,
}
