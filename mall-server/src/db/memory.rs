//! In-memory backend for tests and the development fallback
//!
//! Writes made through a [`MemoryTx`] land in the shared maps immediately and
//! are recorded in an undo log. Rollback (explicit or on drop) replays the log
//! in reverse; stock is restored by adding the deducted amount back, so
//! deductions committed concurrently by other transactions are preserved.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use shared::models::{
    Address, AddressCreate, Area, Goods, Order, OrderLine, Sku, StockLevel, User,
};

use super::{NewUser, SkuStock, Store, StoreTx};
use crate::BoxError;
use crate::util::now_millis;

#[derive(Default)]
struct MemoryData {
    next_id: i64,
    users: BTreeMap<i64, User>,
    qq_users: HashMap<String, i64>,
    addresses: BTreeMap<i64, Address>,
    areas: BTreeMap<i64, Area>,
    goods: BTreeMap<i64, Goods>,
    skus: BTreeMap<i64, Sku>,
    orders: HashMap<String, Order>,
    order_lines: HashMap<String, Vec<OrderLine>>,
}

impl MemoryData {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn live_address_mut(&mut self, user_id: i64, address_id: i64) -> Option<&mut Address> {
        self.addresses
            .get_mut(&address_id)
            .filter(|a| a.user_id == user_id && !a.is_deleted)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<MemoryData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with a small catalog and area tree, for running
    /// without PostgreSQL
    pub fn with_demo_catalog() -> Self {
        let store = Self::new();
        let guangdong = store.insert_area("Guangdong", None);
        let shenzhen = store.insert_area("Shenzhen", Some(guangdong));
        store.insert_area("Nanshan", Some(shenzhen));
        store.insert_area("Futian", Some(shenzhen));
        let beijing = store.insert_area("Beijing", None);
        let beijing_city = store.insert_area("Beijing City", Some(beijing));
        store.insert_area("Haidian", Some(beijing_city));

        let phone = store.insert_goods("Phone");
        store.insert_sku(phone, "Phone 64G Black", Decimal::new(399900, 2), 100);
        store.insert_sku(phone, "Phone 128G White", Decimal::new(469900, 2), 50);
        let laptop = store.insert_goods("Laptop");
        store.insert_sku(laptop, "Laptop 14-inch", Decimal::new(699900, 2), 20);
        store
    }

    pub fn insert_area(&self, name: &str, parent_id: Option<i64>) -> i64 {
        let mut data = self.data.lock();
        let id = data.next_id();
        data.areas.insert(
            id,
            Area {
                id,
                name: name.to_string(),
                parent_id,
            },
        );
        id
    }

    pub fn insert_goods(&self, name: &str) -> i64 {
        let mut data = self.data.lock();
        let id = data.next_id();
        data.goods.insert(
            id,
            Goods {
                id,
                name: name.to_string(),
                sales: 0,
            },
        );
        id
    }

    pub fn insert_sku(&self, goods_id: i64, name: &str, price: Decimal, stock: i64) -> Sku {
        let mut data = self.data.lock();
        let id = data.next_id();
        let sku = Sku {
            id,
            goods_id,
            name: name.to_string(),
            caption: String::new(),
            price,
            stock,
            sales: 0,
            is_launched: true,
            default_image_url: None,
        };
        data.skus.insert(id, sku.clone());
        sku
    }

    pub fn set_launched(&self, sku_id: i64, launched: bool) {
        if let Some(sku) = self.data.lock().skus.get_mut(&sku_id) {
            sku.is_launched = launched;
        }
    }

    pub fn find_goods(&self, goods_id: i64) -> Option<Goods> {
        self.data.lock().goods.get(&goods_id).cloned()
    }

    pub fn order_count(&self) -> usize {
        self.data.lock().orders.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, BoxError> {
        Ok(Box::new(MemoryTx {
            data: self.data.clone(),
            undo: Vec::new(),
            finished: false,
        }))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, BoxError> {
        let mut data = self.data.lock();
        if data
            .users
            .values()
            .any(|u| u.username == user.username || u.mobile == user.mobile)
        {
            return Err("duplicate key value violates unique constraint".into());
        }
        let id = data.next_id();
        let row = User {
            id,
            username: user.username,
            mobile: user.mobile,
            password_hash: user.password_hash,
            email: None,
            default_address_id: None,
            created_at: now_millis(),
        };
        data.users.insert(id, row.clone());
        Ok(row)
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<User>, BoxError> {
        Ok(self.data.lock().users.get(&user_id).cloned())
    }

    async fn find_user_by_account(&self, account: &str) -> Result<Option<User>, BoxError> {
        let data = self.data.lock();
        let by_name = data.users.values().find(|u| u.username == account);
        let found = by_name.or_else(|| data.users.values().find(|u| u.mobile == account));
        Ok(found.cloned())
    }

    async fn find_user_by_mobile(&self, mobile: &str) -> Result<Option<User>, BoxError> {
        let data = self.data.lock();
        Ok(data.users.values().find(|u| u.mobile == mobile).cloned())
    }

    async fn count_username(&self, username: &str) -> Result<i64, BoxError> {
        let data = self.data.lock();
        Ok(data.users.values().filter(|u| u.username == username).count() as i64)
    }

    async fn count_mobile(&self, mobile: &str) -> Result<i64, BoxError> {
        let data = self.data.lock();
        Ok(data.users.values().filter(|u| u.mobile == mobile).count() as i64)
    }

    async fn find_qq_user(&self, openid: &str) -> Result<Option<i64>, BoxError> {
        Ok(self.data.lock().qq_users.get(openid).copied())
    }

    async fn bind_qq_user(&self, openid: &str, user_id: i64) -> Result<(), BoxError> {
        self.data.lock().qq_users.insert(openid.to_string(), user_id);
        Ok(())
    }

    async fn list_addresses(&self, user_id: i64) -> Result<Vec<Address>, BoxError> {
        let data = self.data.lock();
        Ok(data
            .addresses
            .values()
            .filter(|a| a.user_id == user_id && !a.is_deleted)
            .cloned()
            .collect())
    }

    async fn find_address(
        &self,
        user_id: i64,
        address_id: i64,
    ) -> Result<Option<Address>, BoxError> {
        let data = self.data.lock();
        Ok(data
            .addresses
            .get(&address_id)
            .filter(|a| a.user_id == user_id && !a.is_deleted)
            .cloned())
    }

    async fn create_address(
        &self,
        user_id: i64,
        address: &AddressCreate,
        limit: usize,
    ) -> Result<Option<Address>, BoxError> {
        let mut data = self.data.lock();
        let live = data
            .addresses
            .values()
            .filter(|a| a.user_id == user_id && !a.is_deleted)
            .count();
        if live >= limit {
            return Ok(None);
        }
        let id = data.next_id();
        let row = Address {
            id,
            user_id,
            title: address.title.clone(),
            receiver: address.receiver.clone(),
            province_id: address.province_id,
            city_id: address.city_id,
            district_id: address.district_id,
            place: address.place.clone(),
            mobile: address.mobile.clone(),
            is_deleted: false,
        };
        data.addresses.insert(id, row.clone());
        Ok(Some(row))
    }

    async fn update_address(
        &self,
        user_id: i64,
        address_id: i64,
        address: &AddressCreate,
    ) -> Result<Option<Address>, BoxError> {
        let mut data = self.data.lock();
        Ok(data.live_address_mut(user_id, address_id).map(|row| {
            row.title = address.title.clone();
            row.receiver = address.receiver.clone();
            row.province_id = address.province_id;
            row.city_id = address.city_id;
            row.district_id = address.district_id;
            row.place = address.place.clone();
            row.mobile = address.mobile.clone();
            row.clone()
        }))
    }

    async fn update_address_title(
        &self,
        user_id: i64,
        address_id: i64,
        title: &str,
    ) -> Result<Option<Address>, BoxError> {
        let mut data = self.data.lock();
        Ok(data.live_address_mut(user_id, address_id).map(|row| {
            row.title = title.to_string();
            row.clone()
        }))
    }

    async fn set_default_address(&self, user_id: i64, address_id: i64) -> Result<bool, BoxError> {
        let mut data = self.data.lock();
        if data.live_address_mut(user_id, address_id).is_none() {
            return Ok(false);
        }
        match data.users.get_mut(&user_id) {
            Some(user) => {
                user.default_address_id = Some(address_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_address(&self, user_id: i64, address_id: i64) -> Result<bool, BoxError> {
        let mut data = self.data.lock();
        let Some(row) = data.live_address_mut(user_id, address_id) else {
            return Ok(false);
        };
        row.is_deleted = true;
        if let Some(user) = data
            .users
            .get_mut(&user_id)
            .filter(|u| u.default_address_id == Some(address_id))
        {
            user.default_address_id = None;
        }
        Ok(true)
    }

    async fn list_areas(&self, parent_id: Option<i64>) -> Result<Vec<Area>, BoxError> {
        let data = self.data.lock();
        Ok(data
            .areas
            .values()
            .filter(|a| a.parent_id == parent_id)
            .cloned()
            .collect())
    }

    async fn find_area(&self, area_id: i64) -> Result<Option<Area>, BoxError> {
        Ok(self.data.lock().areas.get(&area_id).cloned())
    }

    async fn find_skus(&self, sku_ids: &[i64]) -> Result<Vec<Sku>, BoxError> {
        let data = self.data.lock();
        let mut rows: Vec<Sku> = sku_ids
            .iter()
            .filter_map(|id| data.skus.get(id).cloned())
            .collect();
        rows.sort_by_key(|s| s.id);
        rows.dedup_by_key(|s| s.id);
        Ok(rows)
    }

    async fn find_order(&self, order_id: &str) -> Result<Option<Order>, BoxError> {
        Ok(self.data.lock().orders.get(order_id).cloned())
    }

    async fn find_order_lines(&self, order_id: &str) -> Result<Vec<OrderLine>, BoxError> {
        let data = self.data.lock();
        let mut lines = data.order_lines.get(order_id).cloned().unwrap_or_default();
        lines.sort_by_key(|l| l.sku_id);
        Ok(lines)
    }
}

enum Undo {
    Stock {
        sku_id: i64,
        stock_delta: i64,
        sales_delta: i64,
    },
    GoodsSales {
        goods_id: i64,
        count: i64,
    },
    Order {
        order_id: String,
    },
    Line {
        order_id: String,
        sku_id: i64,
    },
}

pub struct MemoryTx {
    data: Arc<Mutex<MemoryData>>,
    undo: Vec<Undo>,
    finished: bool,
}

impl MemoryTx {
    fn undo_all(&mut self) {
        let mut data = self.data.lock();
        while let Some(step) = self.undo.pop() {
            match step {
                Undo::Stock {
                    sku_id,
                    stock_delta,
                    sales_delta,
                } => {
                    if let Some(sku) = data.skus.get_mut(&sku_id) {
                        sku.stock += stock_delta;
                        sku.sales -= sales_delta;
                    }
                }
                Undo::GoodsSales { goods_id, count } => {
                    if let Some(goods) = data.goods.get_mut(&goods_id) {
                        goods.sales -= count;
                    }
                }
                Undo::Order { order_id } => {
                    data.orders.remove(&order_id);
                    data.order_lines.remove(&order_id);
                }
                Undo::Line { order_id, sku_id } => {
                    if let Some(lines) = data.order_lines.get_mut(&order_id) {
                        lines.retain(|l| l.sku_id != sku_id);
                    }
                }
            }
        }
        self.finished = true;
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if !self.finished {
            self.undo_all();
        }
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn read_stock(&mut self, sku_id: i64) -> Result<Option<SkuStock>, BoxError> {
        let data = self.data.lock();
        Ok(data.skus.get(&sku_id).map(|sku| SkuStock {
            sku_id,
            goods_id: sku.goods_id,
            price: sku.price,
            is_launched: sku.is_launched,
            level: StockLevel {
                stock: sku.stock,
                sales: sku.sales,
            },
        }))
    }

    async fn swap_stock(
        &mut self,
        sku_id: i64,
        expected: i64,
        next: StockLevel,
    ) -> Result<bool, BoxError> {
        let mut data = self.data.lock();
        let Some(sku) = data.skus.get_mut(&sku_id) else {
            return Ok(false);
        };
        if sku.stock != expected {
            return Ok(false);
        }
        if next.stock < 0 {
            return Err("check constraint violated: stock >= 0".into());
        }
        let sales_delta = next.sales - sku.sales;
        sku.stock = next.stock;
        sku.sales = next.sales;
        self.undo.push(Undo::Stock {
            sku_id,
            stock_delta: expected - next.stock,
            sales_delta,
        });
        Ok(true)
    }

    async fn add_goods_sales(&mut self, goods_id: i64, count: i64) -> Result<(), BoxError> {
        let mut data = self.data.lock();
        if let Some(goods) = data.goods.get_mut(&goods_id) {
            goods.sales += count;
            self.undo.push(Undo::GoodsSales { goods_id, count });
        }
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), BoxError> {
        let mut data = self.data.lock();
        if data.orders.contains_key(&order.order_id) {
            return Err(format!("duplicate order id {}", order.order_id).into());
        }
        data.orders.insert(order.order_id.clone(), order.clone());
        self.undo.push(Undo::Order {
            order_id: order.order_id.clone(),
        });
        Ok(())
    }

    async fn insert_order_line(&mut self, line: &OrderLine) -> Result<(), BoxError> {
        let mut data = self.data.lock();
        if !data.orders.contains_key(&line.order_id) {
            return Err(format!("order {} does not exist", line.order_id).into());
        }
        data.order_lines
            .entry(line.order_id.clone())
            .or_default()
            .push(line.clone());
        self.undo.push(Undo::Line {
            order_id: line.order_id.clone(),
            sku_id: line.sku_id,
        });
        Ok(())
    }

    async fn update_order_totals(
        &mut self,
        order_id: &str,
        total_count: i64,
        total_amount: Decimal,
    ) -> Result<(), BoxError> {
        let mut data = self.data.lock();
        let order = data
            .orders
            .get_mut(order_id)
            .ok_or_else(|| format!("order {order_id} does not exist"))?;
        order.total_count = total_count;
        order.total_amount = total_amount;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), BoxError> {
        let mut tx = self;
        tx.undo.clear();
        tx.finished = true;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), BoxError> {
        let mut tx = self;
        tx.undo_all();
        Ok(())
    }
}
