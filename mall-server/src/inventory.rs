//! Inventory Ledger
//!
//! The only writer of SKU stock. A deduction reads `stock`/`sales`, checks
//! availability, then applies a compare-and-swap conditioned on the stock it
//! read. A lost race discards the attempt and starts over from a fresh read.
//! No lock is held between the read and the swap.
//!
//! Retries are capped at `max_attempts`; past the cap the deduction fails
//! with [`DeductError::Contended`].

use std::sync::Arc;

use rust_decimal::Decimal;
use shared::error::{AppError, ErrorCode};
use shared::models::StockLevel;
use thiserror::Error;

use crate::BoxError;
use crate::db::{Store, StoreTx};
use crate::error::ServiceError;

/// Outcome of a successful deduction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deduction {
    pub sku_id: i64,
    pub goods_id: i64,
    /// Unit price read together with the stock
    pub price: Decimal,
    pub before: StockLevel,
    pub after: StockLevel,
    /// Number of swap attempts it took, at least 1
    pub attempts: u32,
}

#[derive(Debug, Error)]
pub enum DeductError {
    #[error("sku {0} not found")]
    NotFound(i64),

    #[error("sku {0} is not on sale")]
    Unavailable(i64),

    #[error("invalid deduction count {0}")]
    InvalidCount(i64),

    #[error("insufficient stock for sku {sku_id}: requested {requested}, available {available}")]
    InsufficientStock {
        sku_id: i64,
        requested: i64,
        available: i64,
    },

    #[error("stock for sku {sku_id} still contended after {attempts} attempts")]
    Contended { sku_id: i64, attempts: u32 },

    #[error("storage error: {0}")]
    Storage(#[from] BoxError),
}

impl From<DeductError> for ServiceError {
    fn from(e: DeductError) -> Self {
        match e {
            DeductError::NotFound(sku_id) => AppError::sku_not_found(sku_id).into(),
            DeductError::Unavailable(sku_id) => AppError::new(ErrorCode::SkuUnavailable)
                .with_detail("sku_id", sku_id)
                .into(),
            DeductError::InvalidCount(count) => AppError::new(ErrorCode::CartCountInvalid)
                .with_detail("value", count)
                .into(),
            DeductError::InsufficientStock {
                sku_id,
                requested,
                available,
            } => AppError::insufficient_stock(sku_id, requested, available).into(),
            DeductError::Contended { sku_id, attempts } => {
                AppError::new(ErrorCode::StockContention)
                    .with_detail("sku_id", sku_id)
                    .with_detail("attempts", attempts)
                    .into()
            }
            DeductError::Storage(e) => ServiceError::Db(e),
        }
    }
}

#[derive(Clone)]
pub struct InventoryLedger {
    store: Arc<dyn Store>,
    max_attempts: u32,
}

impl InventoryLedger {
    pub fn new(store: Arc<dyn Store>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Deduct `count` units of `sku_id` inside the caller's transaction.
    ///
    /// Nothing is written when the sku is off sale or the stock is
    /// insufficient.
    pub async fn deduct_in(
        &self,
        tx: &mut dyn StoreTx,
        sku_id: i64,
        count: i64,
    ) -> Result<Deduction, DeductError> {
        if count < 1 {
            return Err(DeductError::InvalidCount(count));
        }

        for attempt in 1..=self.max_attempts {
            let current = tx
                .read_stock(sku_id)
                .await?
                .ok_or(DeductError::NotFound(sku_id))?;
            if !current.is_launched {
                return Err(DeductError::Unavailable(sku_id));
            }
            let before = current.level;

            if count > before.stock {
                return Err(DeductError::InsufficientStock {
                    sku_id,
                    requested: count,
                    available: before.stock,
                });
            }

            let after = StockLevel {
                stock: before.stock - count,
                sales: before.sales + count,
            };

            if tx.swap_stock(sku_id, before.stock, after).await? {
                if attempt > 1 {
                    tracing::debug!(sku_id, attempt, "Stock deducted after retry");
                }
                return Ok(Deduction {
                    sku_id,
                    goods_id: current.goods_id,
                    price: current.price,
                    before,
                    after,
                    attempts: attempt,
                });
            }

            tokio::task::yield_now().await;
        }

        tracing::warn!(
            sku_id,
            attempts = self.max_attempts,
            "Stock deduction gave up under contention"
        );
        Err(DeductError::Contended {
            sku_id,
            attempts: self.max_attempts,
        })
    }

    /// Deduct in a transaction of its own, committed on success
    pub async fn try_deduct(&self, sku_id: i64, count: i64) -> Result<Deduction, DeductError> {
        let mut tx = self.store.begin().await?;
        match self.deduct_in(tx.as_mut(), sku_id, count).await {
            Ok(deduction) => {
                tx.commit().await?;
                Ok(deduction)
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, SkuStock};
    use async_trait::async_trait;
    use shared::models::{Order, OrderLine, Sku};

    fn ledger_with_sku(stock: i64, max_attempts: u32) -> (InventoryLedger, MemoryStore, Sku) {
        let store = MemoryStore::new();
        let goods = store.insert_goods("Coffee");
        let sku = store.insert_sku(goods, "Beans 1kg", Decimal::new(8800, 2), stock);
        let ledger = InventoryLedger::new(Arc::new(store.clone()), max_attempts);
        (ledger, store, sku)
    }

    #[tokio::test]
    async fn test_deduct_updates_stock_and_sales() {
        let (ledger, store, sku) = ledger_with_sku(10, 64);
        let deduction = ledger.try_deduct(sku.id, 4).await.unwrap();

        assert_eq!(deduction.before, StockLevel { stock: 10, sales: 0 });
        assert_eq!(deduction.after, StockLevel { stock: 6, sales: 4 });
        assert_eq!(deduction.price, Decimal::new(8800, 2));
        assert_eq!(deduction.attempts, 1);

        let row = store.find_sku(sku.id).await.unwrap().unwrap();
        assert_eq!((row.stock, row.sales), (6, 4));
    }

    #[tokio::test]
    async fn test_insufficient_stock_writes_nothing() {
        let (ledger, store, sku) = ledger_with_sku(3, 64);
        let err = ledger.try_deduct(sku.id, 4).await.unwrap_err();
        assert!(matches!(
            err,
            DeductError::InsufficientStock {
                requested: 4,
                available: 3,
                ..
            }
        ));

        let row = store.find_sku(sku.id).await.unwrap().unwrap();
        assert_eq!((row.stock, row.sales), (3, 0));
    }

    #[tokio::test]
    async fn test_unknown_sku_and_bad_count() {
        let (ledger, _, sku) = ledger_with_sku(3, 64);
        assert!(matches!(
            ledger.try_deduct(9999, 1).await,
            Err(DeductError::NotFound(9999))
        ));
        assert!(matches!(
            ledger.try_deduct(sku.id, 0).await,
            Err(DeductError::InvalidCount(0))
        ));
    }

    #[tokio::test]
    async fn test_off_sale_sku_is_not_deducted() {
        let (ledger, store, sku) = ledger_with_sku(10, 64);
        store.set_launched(sku.id, false);

        let err = ledger.try_deduct(sku.id, 1).await.unwrap_err();
        assert!(matches!(err, DeductError::Unavailable(id) if id == sku.id));
        let row = store.find_sku(sku.id).await.unwrap().unwrap();
        assert_eq!((row.stock, row.sales), (10, 0));

        let app: AppError = ServiceError::from(err).into();
        assert_eq!(app.code, ErrorCode::SkuUnavailable);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_deductions_sum_exactly() {
        let (ledger, store, sku) = ledger_with_sku(60, 10_000);

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.try_deduct(sku.id, 3).await })
            })
            .collect();

        for handle in handles {
            let deduction = handle.await.unwrap().unwrap();
            assert!(deduction.after.stock >= 0);
        }

        let row = store.find_sku(sku.id).await.unwrap().unwrap();
        assert_eq!(row.stock, 0);
        assert_eq!(row.sales, 60);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_oversubscribed_sku_never_goes_negative() {
        let (ledger, store, sku) = ledger_with_sku(5, 10_000);

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.try_deduct(sku.id, 1).await })
            })
            .collect();

        let mut succeeded = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(DeductError::InsufficientStock { .. }) => rejected += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(succeeded, 5);
        assert_eq!(rejected, 7);
        let row = store.find_sku(sku.id).await.unwrap().unwrap();
        assert_eq!((row.stock, row.sales), (0, 5));
    }

    /// Transaction whose compare-and-swap always loses the race
    struct AlwaysStale;

    #[async_trait]
    impl StoreTx for AlwaysStale {
        async fn read_stock(&mut self, sku_id: i64) -> Result<Option<SkuStock>, BoxError> {
            Ok(Some(SkuStock {
                sku_id,
                goods_id: 1,
                price: Decimal::ONE,
                is_launched: true,
                level: StockLevel { stock: 10, sales: 0 },
            }))
        }
        async fn swap_stock(&mut self, _: i64, _: i64, _: StockLevel) -> Result<bool, BoxError> {
            Ok(false)
        }
        async fn add_goods_sales(&mut self, _: i64, _: i64) -> Result<(), BoxError> {
            unreachable!()
        }
        async fn insert_order(&mut self, _: &Order) -> Result<(), BoxError> {
            unreachable!()
        }
        async fn insert_order_line(&mut self, _: &OrderLine) -> Result<(), BoxError> {
            unreachable!()
        }
        async fn update_order_totals(&mut self, _: &str, _: i64, _: Decimal) -> Result<(), BoxError> {
            unreachable!()
        }
        async fn commit(self: Box<Self>) -> Result<(), BoxError> {
            Ok(())
        }
        async fn rollback(self: Box<Self>) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_contention_is_bounded() {
        let (ledger, _, _) = ledger_with_sku(10, 5);
        let mut tx = AlwaysStale;
        let err = ledger.deduct_in(&mut tx, 1, 1).await.unwrap_err();
        assert!(matches!(err, DeductError::Contended { sku_id: 1, attempts: 5 }));

        let service_err: ServiceError = err.into();
        let app: AppError = service_err.into();
        assert_eq!(app.code, ErrorCode::StockContention);
    }
}
