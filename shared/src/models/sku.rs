//! SKU / Goods Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Stock-keeping unit, the purchasable leaf of the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Sku {
    pub id: i64,
    /// Parent goods (SPU) reference
    pub goods_id: i64,
    pub name: String,
    pub caption: String,
    pub price: Decimal,
    /// Never negative; only mutated through the inventory ledger
    pub stock: i64,
    pub sales: i64,
    /// Whether the SKU is on sale
    pub is_launched: bool,
    pub default_image_url: Option<String>,
}

/// Goods (SPU) aggregating several SKUs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Goods {
    pub id: i64,
    pub name: String,
    /// Aggregate sales over all child SKUs (may lag behind the SKU counters)
    pub sales: i64,
}

/// Stock counters observed for a SKU at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub stock: i64,
    pub sales: i64,
}
