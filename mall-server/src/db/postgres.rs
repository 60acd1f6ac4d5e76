//! PostgreSQL backend

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::models::{Address, AddressCreate, Area, Order, OrderLine, Sku, StockLevel, User};
use sqlx::{PgPool, Postgres, Transaction};

use super::{NewUser, SkuStock, Store, StoreTx};
use crate::BoxError;
use crate::util::now_millis;

const USER_COLUMNS: &str =
    "id, username, mobile, password_hash, email, default_address_id, created_at";
const ADDRESS_COLUMNS: &str = "id, user_id, title, receiver, province_id, city_id, district_id, \
     place, mobile, is_deleted";
const SKU_COLUMNS: &str =
    "id, goods_id, name, caption, price, stock, sales, is_launched, default_image_url";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and run embedded migrations
    pub async fn connect(database_url: &str) -> Result<Self, BoxError> {
        let pool = PgPool::connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, BoxError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, BoxError> {
        let row: User = sqlx::query_as(&format!(
            "INSERT INTO users (username, mobile, password_hash, created_at)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.mobile)
        .bind(&user.password_hash)
        .bind(now_millis())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<User>, BoxError> {
        let row = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_user_by_account(&self, account: &str) -> Result<Option<User>, BoxError> {
        let row = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE username = $1 OR mobile = $1
             ORDER BY (username = $1) DESC
             LIMIT 1"
        ))
        .bind(account)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_user_by_mobile(&self, mobile: &str) -> Result<Option<User>, BoxError> {
        let row = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE mobile = $1"
        ))
        .bind(mobile)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn count_username(&self, username: &str) -> Result<i64, BoxError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = $1")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_mobile(&self, mobile: &str) -> Result<i64, BoxError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE mobile = $1")
            .bind(mobile)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn find_qq_user(&self, openid: &str) -> Result<Option<i64>, BoxError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT user_id FROM oauth_qq_users WHERE openid = $1")
                .bind(openid)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(user_id,)| user_id))
    }

    async fn bind_qq_user(&self, openid: &str, user_id: i64) -> Result<(), BoxError> {
        sqlx::query(
            "INSERT INTO oauth_qq_users (openid, user_id, created_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (openid) DO UPDATE SET user_id = $2",
        )
        .bind(openid)
        .bind(user_id)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_addresses(&self, user_id: i64) -> Result<Vec<Address>, BoxError> {
        let rows = sqlx::query_as(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses
             WHERE user_id = $1 AND NOT is_deleted
             ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_address(
        &self,
        user_id: i64,
        address_id: i64,
    ) -> Result<Option<Address>, BoxError> {
        let row = sqlx::query_as(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses
             WHERE id = $1 AND user_id = $2 AND NOT is_deleted"
        ))
        .bind(address_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create_address(
        &self,
        user_id: i64,
        address: &AddressCreate,
        limit: usize,
    ) -> Result<Option<Address>, BoxError> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent creates of one user until commit
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let (live,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM addresses WHERE user_id = $1 AND NOT is_deleted",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        if live >= i64::try_from(limit)? {
            tx.rollback().await?;
            return Ok(None);
        }

        let row = sqlx::query_as(&format!(
            "INSERT INTO addresses (
                user_id, title, receiver, province_id, city_id, district_id,
                place, mobile, created_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(user_id)
        .bind(&address.title)
        .bind(&address.receiver)
        .bind(address.province_id)
        .bind(address.city_id)
        .bind(address.district_id)
        .bind(&address.place)
        .bind(&address.mobile)
        .bind(now_millis())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(Some(row))
    }

    async fn update_address(
        &self,
        user_id: i64,
        address_id: i64,
        address: &AddressCreate,
    ) -> Result<Option<Address>, BoxError> {
        let row = sqlx::query_as(&format!(
            "UPDATE addresses
             SET title = $3, receiver = $4, province_id = $5, city_id = $6,
                 district_id = $7, place = $8, mobile = $9
             WHERE id = $1 AND user_id = $2 AND NOT is_deleted
             RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(address_id)
        .bind(user_id)
        .bind(&address.title)
        .bind(&address.receiver)
        .bind(address.province_id)
        .bind(address.city_id)
        .bind(address.district_id)
        .bind(&address.place)
        .bind(&address.mobile)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_address_title(
        &self,
        user_id: i64,
        address_id: i64,
        title: &str,
    ) -> Result<Option<Address>, BoxError> {
        let row = sqlx::query_as(&format!(
            "UPDATE addresses SET title = $3
             WHERE id = $1 AND user_id = $2 AND NOT is_deleted
             RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(address_id)
        .bind(user_id)
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn set_default_address(&self, user_id: i64, address_id: i64) -> Result<bool, BoxError> {
        let result = sqlx::query(
            "UPDATE users SET default_address_id = $1
             WHERE id = $2
               AND EXISTS (
                   SELECT 1 FROM addresses
                   WHERE id = $1 AND user_id = $2 AND NOT is_deleted
               )",
        )
        .bind(address_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_address(&self, user_id: i64, address_id: i64) -> Result<bool, BoxError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE addresses SET is_deleted = TRUE
             WHERE id = $1 AND user_id = $2 AND NOT is_deleted",
        )
        .bind(address_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        sqlx::query(
            "UPDATE users SET default_address_id = NULL
             WHERE id = $1 AND default_address_id = $2",
        )
        .bind(user_id)
        .bind(address_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn list_areas(&self, parent_id: Option<i64>) -> Result<Vec<Area>, BoxError> {
        let rows = sqlx::query_as(
            "SELECT id, name, parent_id FROM areas
             WHERE parent_id IS NOT DISTINCT FROM $1
             ORDER BY id",
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_area(&self, area_id: i64) -> Result<Option<Area>, BoxError> {
        let row = sqlx::query_as("SELECT id, name, parent_id FROM areas WHERE id = $1")
            .bind(area_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_skus(&self, sku_ids: &[i64]) -> Result<Vec<Sku>, BoxError> {
        if sku_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as(&format!(
            "SELECT {SKU_COLUMNS} FROM skus WHERE id = ANY($1) ORDER BY id"
        ))
        .bind(sku_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_order(&self, order_id: &str) -> Result<Option<Order>, BoxError> {
        let row = sqlx::query_as(
            "SELECT order_id, user_id, address_id, total_count, total_amount, freight,
                    pay_method, status, created_at
             FROM orders WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_order_lines(&self, order_id: &str) -> Result<Vec<OrderLine>, BoxError> {
        let rows = sqlx::query_as(
            "SELECT order_id, sku_id, count, price FROM order_goods
             WHERE order_id = $1 ORDER BY sku_id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// A live PostgreSQL transaction; dropped without commit means rolled back
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn read_stock(&mut self, sku_id: i64) -> Result<Option<SkuStock>, BoxError> {
        let row: Option<(i64, Decimal, bool, i64, i64)> = sqlx::query_as(
            "SELECT goods_id, price, is_launched, stock, sales FROM skus WHERE id = $1",
        )
        .bind(sku_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(|(goods_id, price, is_launched, stock, sales)| SkuStock {
            sku_id,
            goods_id,
            price,
            is_launched,
            level: StockLevel { stock, sales },
        }))
    }

    async fn swap_stock(
        &mut self,
        sku_id: i64,
        expected: i64,
        next: StockLevel,
    ) -> Result<bool, BoxError> {
        let result = sqlx::query(
            "UPDATE skus SET stock = $1, sales = $2
             WHERE id = $3 AND stock = $4",
        )
        .bind(next.stock)
        .bind(next.sales)
        .bind(sku_id)
        .bind(expected)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn add_goods_sales(&mut self, goods_id: i64, count: i64) -> Result<(), BoxError> {
        sqlx::query("UPDATE goods SET sales = sales + $1 WHERE id = $2")
            .bind(count)
            .bind(goods_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), BoxError> {
        sqlx::query(
            "INSERT INTO orders (
                order_id, user_id, address_id, total_count, total_amount,
                freight, pay_method, status, created_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&order.order_id)
        .bind(order.user_id)
        .bind(order.address_id)
        .bind(order.total_count)
        .bind(order.total_amount)
        .bind(order.freight)
        .bind(order.pay_method)
        .bind(order.status)
        .bind(order.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_order_line(&mut self, line: &OrderLine) -> Result<(), BoxError> {
        sqlx::query(
            "INSERT INTO order_goods (order_id, sku_id, count, price)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&line.order_id)
        .bind(line.sku_id)
        .bind(line.count)
        .bind(line.price)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_order_totals(
        &mut self,
        order_id: &str,
        total_count: i64,
        total_amount: Decimal,
    ) -> Result<(), BoxError> {
        sqlx::query("UPDATE orders SET total_count = $1, total_amount = $2 WHERE order_id = $3")
            .bind(total_count)
            .bind(total_amount)
            .bind(order_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), BoxError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), BoxError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
