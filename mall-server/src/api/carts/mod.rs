//! Cart API
//!
//! Serves both visitors and logged-in users. A visitor's cart travels in
//! the `cart` cookie and is rewritten on every mutation.

mod handler;

use axum::Router;
use axum::routing::{post, put};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/cart",
            post(handler::add)
                .get(handler::read)
                .put(handler::update)
                .delete(handler::remove),
        )
        .route("/cart/selection", put(handler::select_all))
}
