//! Data models
//!
//! Shared between the server and API clients.
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` (PostgreSQL BIGINT / BIGSERIAL).

pub mod cart;
pub mod order;
pub mod sku;
pub mod user;

// Re-exports
pub use cart::*;
pub use order::*;
pub use sku::*;
pub use user::*;
