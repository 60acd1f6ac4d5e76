//! Shipping address API

mod handler;

use axum::Router;
use axum::routing::{get, put};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/addresses", get(handler::list).post(handler::create))
        .route("/addresses/{id}", put(handler::update).delete(handler::remove))
        .route("/addresses/{id}/status", put(handler::set_default))
        .route("/addresses/{id}/title", put(handler::set_title))
}
