//! Checkout API

mod handler;

use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders/settlement", get(handler::settlement))
        .route("/orders", post(handler::commit))
}
