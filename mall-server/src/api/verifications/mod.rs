//! SMS verification code API

mod handler;

use axum::Router;
use axum::routing::get;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/verification-codes/{mobile}", get(handler::request_code))
}
