use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    Standard,
    Backordered,
    Custom,
    SpecialOrder,
}

impl StockStatus {
    pub fn is_standard(&self) -> bool {
        matches!(self, Self::InStock | Self::Standard)
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom | Self::SpecialOrder)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub part_number: String,
    pub name: String,
    pub stock_status: StockStatus,
}

/// Part number lookup used when classifying quote lines.
pub trait ProductCatalog {
    fn stock_status(&self, part_number: &str) -> Option<StockStatus>;
}

impl ProductCatalog for HashMap<String, StockStatus> {
    fn stock_status(&self, part_number: &str) -> Option<StockStatus> {
        self.get(part_number).copied()
    }
}

impl ProductCatalog for BTreeMap<String, StockStatus> {
    fn stock_status(&self, part_number: &str) -> Option<StockStatus> {
        self.get(part_number).copied()
    }
}

impl ProductCatalog for [CatalogEntry] {
    fn stock_status(&self, part_number: &str) -> Option<StockStatus> {
        self.iter().find(|entry| entry.part_number == part_number).map(|entry| entry.stock_status)
    }
}

impl ProductCatalog for Vec<CatalogEntry> {
    fn stock_status(&self, part_number: &str) -> Option<StockStatus> {
        self.as_slice().stock_status(part_number)
    }
}
