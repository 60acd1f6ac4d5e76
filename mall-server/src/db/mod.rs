//! Relational storage layer
//!
//! [`Store`] covers accounts, addresses, the area tree, the catalog and
//! committed orders.
//! Order placement runs inside a [`StoreTx`]; dropping or rolling back a
//! transaction undoes every write made through it, stock deductions included.
//!
//! Two backends: [`PgStore`] (PostgreSQL via sqlx) and [`MemoryStore`]
//! (tests and the development fallback).

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::models::{Address, AddressCreate, Area, Order, OrderLine, Sku, StockLevel, User};

use crate::BoxError;

/// Insert payload for a new account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub mobile: String,
    pub password_hash: String,
}

/// SKU row as seen by the inventory ledger
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkuStock {
    pub sku_id: i64,
    pub goods_id: i64,
    pub price: Decimal,
    pub is_launched: bool,
    pub level: StockLevel,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Open a transaction for order placement
    async fn begin(&self) -> Result<Box<dyn StoreTx>, BoxError>;

    // ── Users ──

    async fn create_user(&self, user: NewUser) -> Result<User, BoxError>;
    async fn find_user(&self, user_id: i64) -> Result<Option<User>, BoxError>;
    /// Look up by username, falling back to mobile
    async fn find_user_by_account(&self, account: &str) -> Result<Option<User>, BoxError>;
    async fn find_user_by_mobile(&self, mobile: &str) -> Result<Option<User>, BoxError>;
    async fn count_username(&self, username: &str) -> Result<i64, BoxError>;
    async fn count_mobile(&self, mobile: &str) -> Result<i64, BoxError>;

    // ── QQ bindings ──

    async fn find_qq_user(&self, openid: &str) -> Result<Option<i64>, BoxError>;
    async fn bind_qq_user(&self, openid: &str, user_id: i64) -> Result<(), BoxError>;

    // ── Addresses (logically deleted rows are invisible) ──

    async fn list_addresses(&self, user_id: i64) -> Result<Vec<Address>, BoxError>;
    async fn find_address(&self, user_id: i64, address_id: i64)
    -> Result<Option<Address>, BoxError>;
    /// Insert unless the user already has `limit` live addresses, in which
    /// case `None` is returned. Count and insert are atomic per user.
    async fn create_address(
        &self,
        user_id: i64,
        address: &AddressCreate,
        limit: usize,
    ) -> Result<Option<Address>, BoxError>;
    /// Replace every field of a live address
    async fn update_address(
        &self,
        user_id: i64,
        address_id: i64,
        address: &AddressCreate,
    ) -> Result<Option<Address>, BoxError>;
    async fn update_address_title(
        &self,
        user_id: i64,
        address_id: i64,
        title: &str,
    ) -> Result<Option<Address>, BoxError>;
    /// Returns `false` when no live address matched
    async fn set_default_address(&self, user_id: i64, address_id: i64) -> Result<bool, BoxError>;
    /// Returns `false` when no live address matched. Deleting the default
    /// address clears the user's default.
    async fn delete_address(&self, user_id: i64, address_id: i64) -> Result<bool, BoxError>;

    // ── Areas ──

    /// Children of `parent_id`, or the provinces when `None`
    async fn list_areas(&self, parent_id: Option<i64>) -> Result<Vec<Area>, BoxError>;
    async fn find_area(&self, area_id: i64) -> Result<Option<Area>, BoxError>;

    // ── Catalog ──

    async fn find_skus(&self, sku_ids: &[i64]) -> Result<Vec<Sku>, BoxError>;

    async fn find_sku(&self, sku_id: i64) -> Result<Option<Sku>, BoxError> {
        Ok(self.find_skus(&[sku_id]).await?.into_iter().next())
    }

    // ── Orders ──

    async fn find_order(&self, order_id: &str) -> Result<Option<Order>, BoxError>;
    async fn find_order_lines(&self, order_id: &str) -> Result<Vec<OrderLine>, BoxError>;
}

/// Write scope of one order placement
#[async_trait]
pub trait StoreTx: Send {
    async fn read_stock(&mut self, sku_id: i64) -> Result<Option<SkuStock>, BoxError>;

    /// Set stock and sales only if stock still equals `expected`.
    ///
    /// Returns `false` when another writer changed the row first.
    async fn swap_stock(
        &mut self,
        sku_id: i64,
        expected: i64,
        next: StockLevel,
    ) -> Result<bool, BoxError>;

    async fn add_goods_sales(&mut self, goods_id: i64, count: i64) -> Result<(), BoxError>;
    async fn insert_order(&mut self, order: &Order) -> Result<(), BoxError>;
    async fn insert_order_line(&mut self, line: &OrderLine) -> Result<(), BoxError>;
    async fn update_order_totals(
        &mut self,
        order_id: &str,
        total_count: i64,
        total_amount: Decimal,
    ) -> Result<(), BoxError>;

    async fn commit(self: Box<Self>) -> Result<(), BoxError>;
    async fn rollback(self: Box<Self>) -> Result<(), BoxError>;
}
