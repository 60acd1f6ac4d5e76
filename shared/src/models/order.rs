//! Order Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::cart::CartItemView;

/// Pay method chosen at checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[repr(i16)]
pub enum PayMethod {
    /// Cash on delivery
    Cash = 1,
    /// Online payment through Alipay
    Alipay = 2,
}

impl PayMethod {
    /// Status an order starts in for this pay method.
    ///
    /// Online payment waits for the payment callback; cash on delivery is
    /// ready to ship immediately.
    pub fn initial_status(self) -> OrderStatus {
        match self {
            PayMethod::Alipay => OrderStatus::Unpaid,
            PayMethod::Cash => OrderStatus::Unsend,
        }
    }
}

impl From<PayMethod> for i16 {
    fn from(value: PayMethod) -> Self {
        value as i16
    }
}

impl TryFrom<i16> for PayMethod {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PayMethod::Cash),
            2 => Ok(PayMethod::Alipay),
            other => Err(format!("unknown pay method: {other}")),
        }
    }
}

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[repr(i16)]
pub enum OrderStatus {
    Unpaid = 1,
    Unsend = 2,
    Unreceived = 3,
    Uncomment = 4,
    Finished = 5,
    Canceled = 6,
}

impl From<OrderStatus> for i16 {
    fn from(value: OrderStatus) -> Self {
        value as i16
    }
}

impl TryFrom<i16> for OrderStatus {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(OrderStatus::Unpaid),
            2 => Ok(OrderStatus::Unsend),
            3 => Ok(OrderStatus::Unreceived),
            4 => Ok(OrderStatus::Uncomment),
            5 => Ok(OrderStatus::Finished),
            6 => Ok(OrderStatus::Canceled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// Order header
///
/// `total_amount` includes `freight`; `total_count` is the sum of line counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Order {
    pub order_id: String,
    pub user_id: i64,
    pub address_id: i64,
    pub total_count: i64,
    pub total_amount: Decimal,
    pub freight: Decimal,
    pub pay_method: PayMethod,
    pub status: OrderStatus,
    /// Unix millis
    pub created_at: i64,
}

/// Order line with the unit price snapshotted at commit time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct OrderLine {
    pub order_id: String,
    pub sku_id: i64,
    pub count: i64,
    pub price: Decimal,
}

/// Checkout payload
///
/// `pay_method` stays raw so an unknown value can be reported as
/// `PayMethodInvalid` rather than a body parse failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCommit {
    /// Address id
    pub address: i64,
    pub pay_method: i16,
}

/// Checkout result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCommitResult {
    pub order_id: String,
}

/// Settlement page data: the selected cart subset plus freight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub freight: Decimal,
    pub skus: Vec<CartItemView>,
}
