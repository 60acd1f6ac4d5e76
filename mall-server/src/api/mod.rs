//! HTTP routes
//!
//! # Structure
//!
//! - [`health`] - liveness
//! - [`verifications`] - SMS codes
//! - [`users`] - registration, login, profile
//! - [`addresses`] - shipping addresses
//! - [`areas`] - province / city / district lookup
//! - [`oauth`] - QQ login and binding
//! - [`carts`] - cart for visitors and users
//! - [`orders`] - settlement and checkout

pub mod addresses;
pub mod areas;
pub mod carts;
pub mod health;
pub mod oauth;
pub mod orders;
pub mod users;
pub mod verifications;

mod session;

use axum::Router;
use axum::routing::get;

use crate::error::ServiceError;
use crate::state::AppState;

/// Handler result; storage failures render as `InternalError`
pub type ApiResult<T> = Result<T, ServiceError>;

/// Every route, without state
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .merge(verifications::router())
        .merge(users::router())
        .merge(addresses::router())
        .merge(areas::router())
        .merge(oauth::router())
        .merge(carts::router())
        .merge(orders::router())
}
