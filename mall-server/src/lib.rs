//! mall-server: storefront backend
//!
//! - [`cart`] - anonymous (cookie) and authenticated (cache) carts, merge on login
//! - [`inventory`] - optimistic stock deduction
//! - [`orders`] - transactional order placement
//! - [`verification`] - SMS codes with a send interval
//! - [`api`] - HTTP routes

pub mod api;
pub mod auth;
pub mod cache;
pub mod cart;
pub mod config;
pub mod db;
pub mod error;
pub mod inventory;
pub mod oauth;
pub mod orders;
pub mod state;
pub mod tasks;
pub mod util;
pub mod verification;

use axum::Router;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::AppState;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Full HTTP application
pub fn app(state: AppState) -> Router {
    api::router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
