//! QQ login API

mod handler;

use axum::Router;
use axum::routing::get;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/oauth/qq/authorization", get(handler::authorization))
        .route("/oauth/qq/user", get(handler::callback).post(handler::bind))
}
