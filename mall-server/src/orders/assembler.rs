//! Order Assembler
//!
//! Turns the selected subset of a user's cart into an order. Header, lines,
//! stock deductions and goods sales are written in one transaction; any
//! failure rolls all of them back, deductions of earlier lines included.
//! Consumed cart entries are removed only after commit, best-effort.

use std::sync::Arc;

use rust_decimal::Decimal;
use shared::error::{AppError, ErrorCode};
use shared::models::{CartEntry, Order, OrderLine, PayMethod, Settlement};

use super::id::generate_order_id;
use crate::cart::CartService;
use crate::db::{Store, StoreTx};
use crate::error::ServiceResult;
use crate::inventory::InventoryLedger;

#[derive(Clone)]
pub struct OrderAssembler {
    store: Arc<dyn Store>,
    carts: CartService,
    ledger: InventoryLedger,
    freight: Decimal,
}

impl OrderAssembler {
    pub fn new(
        store: Arc<dyn Store>,
        carts: CartService,
        ledger: InventoryLedger,
        freight: Decimal,
    ) -> Self {
        Self {
            store,
            carts,
            ledger,
            freight,
        }
    }

    /// Selected cart items with current prices, plus the freight
    pub async fn settlement(&self, user_id: i64) -> ServiceResult<Settlement> {
        let entries = self.carts.user_cart(user_id).selected_entries().await?;
        let skus = self.carts.enrich(&entries).await?;
        Ok(Settlement {
            freight: self.freight,
            skus,
        })
    }

    pub async fn place_order(
        &self,
        user_id: i64,
        address_id: i64,
        pay_method: PayMethod,
    ) -> ServiceResult<Order> {
        self.store
            .find_address(user_id, address_id)
            .await?
            .ok_or_else(|| {
                AppError::new(ErrorCode::AddressNotFound).with_detail("address", address_id)
            })?;

        // Sorted by sku id, so row locks are always taken in the same order
        let entries = self.carts.user_cart(user_id).selected_entries().await?;
        if entries.is_empty() {
            return Err(AppError::new(ErrorCode::OrderEmpty).into());
        }

        let now = chrono::Utc::now();
        let mut order = Order {
            order_id: generate_order_id(now, user_id),
            user_id,
            address_id,
            total_count: 0,
            total_amount: Decimal::ZERO,
            freight: self.freight,
            pay_method,
            status: pay_method.initial_status(),
            created_at: now.timestamp_millis(),
        };

        let mut tx = self.store.begin().await?;
        let outcome = self.assemble(tx.as_mut(), &mut order, &entries).await;
        match outcome {
            Ok(()) => tx.commit().await?,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(
                        order_id = %order.order_id,
                        error = %rollback_err,
                        "Order rollback failed"
                    );
                }
                tracing::info!(user_id, order_id = %order.order_id, error = %e, "Order aborted");
                return Err(e);
            }
        }

        tracing::info!(
            user_id,
            order_id = %order.order_id,
            total_count = order.total_count,
            total_amount = %order.total_amount,
            "Order committed"
        );

        let consumed: Vec<i64> = entries.iter().map(|e| e.sku_id).collect();
        if let Err(e) = self.carts.user_cart(user_id).remove(&consumed).await {
            tracing::warn!(
                user_id,
                order_id = %order.order_id,
                error = %e,
                "Cart cleanup after order failed"
            );
        }

        Ok(order)
    }

    /// All writes of one order; the caller commits or rolls back
    async fn assemble(
        &self,
        tx: &mut dyn StoreTx,
        order: &mut Order,
        entries: &[CartEntry],
    ) -> ServiceResult<()> {
        tx.insert_order(order).await?;

        let mut total_count = 0;
        let mut total_amount = Decimal::ZERO;
        for entry in entries {
            let deduction = self.ledger.deduct_in(tx, entry.sku_id, entry.count).await?;

            tx.insert_order_line(&OrderLine {
                order_id: order.order_id.clone(),
                sku_id: entry.sku_id,
                count: entry.count,
                price: deduction.price,
            })
            .await?;
            tx.add_goods_sales(deduction.goods_id, entry.count).await?;

            total_count += entry.count;
            total_amount += deduction.price * Decimal::from(entry.count);
        }
        total_amount += order.freight;

        tx.update_order_totals(&order.order_id, total_count, total_amount)
            .await?;
        order.total_count = total_count;
        order.total_amount = total_amount;
        Ok(())
    }
}
