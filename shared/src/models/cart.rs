//! Cart Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::sku::Sku;

/// One line of a shopping cart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    pub sku_id: i64,
    pub count: i64,
    pub selected: bool,
}

/// Cart entry enriched with SKU display data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItemView {
    /// SKU id
    pub id: i64,
    pub name: String,
    pub default_image_url: Option<String>,
    pub price: Decimal,
    pub count: i64,
    pub selected: bool,
}

impl CartItemView {
    pub fn new(sku: &Sku, count: i64, selected: bool) -> Self {
        Self {
            id: sku.id,
            name: sku.name.clone(),
            default_image_url: sku.default_image_url.clone(),
            price: sku.price,
            count,
            selected,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Add-to-cart payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartAdd {
    pub sku_id: i64,
    pub count: i64,
    #[serde(default = "default_true")]
    pub selected: bool,
}

/// Update-cart payload (replaces count and selection)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartUpdate {
    pub sku_id: i64,
    pub count: i64,
    #[serde(default = "default_true")]
    pub selected: bool,
}

/// Remove-from-cart payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartRemove {
    pub sku_id: i64,
}

/// Select-all / deselect-all payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartSelectAll {
    pub selected: bool,
}
