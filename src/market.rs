//! Market and catalog collaborators.
//!
//! The scheduler never caches what these return: every trigger asks again so
//! the failure draw reflects current market truth.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::events::EquipmentKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentInstance {
    pub id: u64,
    pub static_catalog_id: u64,
    #[serde(default)]
    pub sold: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: u64,
    pub display_name: String,
}

/// Live inventory of equipment still for sale.
#[async_trait]
pub trait MarketProvider {
    async fn machines_for_sale(&self) -> Result<Vec<EquipmentInstance>>;
    async fn trucks_for_sale(&self) -> Result<Vec<EquipmentInstance>>;

    async fn for_sale(&self, kind: EquipmentKind) -> Result<Vec<EquipmentInstance>> {
        match kind {
            EquipmentKind::Machine => self.machines_for_sale().await,
            EquipmentKind::Truck => self.trucks_for_sale().await,
        }
    }
}

/// Static reference data for machines and vehicles.
#[async_trait]
pub trait CatalogProvider {
    async fn machine_catalog(&self) -> Result<Vec<CatalogEntry>>;
    async fn vehicle_catalog(&self) -> Result<Vec<CatalogEntry>>;

    async fn catalog(&self, kind: EquipmentKind) -> Result<Vec<CatalogEntry>> {
        match kind {
            EquipmentKind::Machine => self.machine_catalog().await,
            EquipmentKind::Truck => self.vehicle_catalog().await,
        }
    }
}

/// Catalog entries keyed by id for name resolution.
pub fn index_catalog(entries: Vec<CatalogEntry>) -> HashMap<u64, String> {
    entries.into_iter().map(|e| (e.id, e.display_name)).collect()
}

/// In-memory market and catalog, loadable from a JSON snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StaticMarket {
    pub machines: Vec<EquipmentInstance>,
    pub trucks: Vec<EquipmentInstance>,
    pub machine_catalog: Vec<CatalogEntry>,
    pub vehicle_catalog: Vec<CatalogEntry>,
}

impl StaticMarket {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading market file {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing market file {}", path.display()))
    }

    fn unsold(items: &[EquipmentInstance]) -> Vec<EquipmentInstance> {
        items.iter().filter(|i| !i.sold).cloned().collect()
    }
}

#[async_trait]
impl MarketProvider for StaticMarket {
    async fn machines_for_sale(&self) -> Result<Vec<EquipmentInstance>> {
        Ok(Self::unsold(&self.machines))
    }

    async fn trucks_for_sale(&self) -> Result<Vec<EquipmentInstance>> {
        Ok(Self::unsold(&self.trucks))
    }
}

#[async_trait]
impl CatalogProvider for StaticMarket {
    async fn machine_catalog(&self) -> Result<Vec<CatalogEntry>> {
        Ok(self.machine_catalog.clone())
    }

    async fn vehicle_catalog(&self) -> Result<Vec<CatalogEntry>> {
        Ok(self.vehicle_catalog.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u64, static_id: u64, sold: bool) -> EquipmentInstance {
        EquipmentInstance { id, static_catalog_id: static_id, sold }
    }

    #[tokio::test]
    async fn static_market_filters_sold_items() {
        let market = StaticMarket {
            machines: vec![item(1, 10, false), item(2, 10, true)],
            trucks: vec![item(3, 20, true)],
            ..Default::default()
        };
        assert_eq!(market.for_sale(EquipmentKind::Machine).await.unwrap(), vec![item(1, 10, false)]);
        assert!(market.for_sale(EquipmentKind::Truck).await.unwrap().is_empty());
    }

    #[test]
    fn parses_snapshot_json() {
        let raw = r#"{
            "machines": [{"id": 1, "staticCatalogId": 7}],
            "vehicleCatalog": [{"id": 2, "displayName": "large_truck"}]
        }"#;
        let market: StaticMarket = serde_json::from_str(raw).unwrap();
        assert_eq!(market.machines, vec![item(1, 7, false)]);
        assert!(market.trucks.is_empty());
        assert_eq!(index_catalog(market.vehicle_catalog).get(&2).map(String::as_str), Some("large_truck"));
    }
}
