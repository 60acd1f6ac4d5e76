//! Administrative area API
//!
//! Read-only province → city → district tree used by the address form.

mod handler;

use axum::Router;
use axum::routing::get;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/areas", get(handler::provinces))
        .route("/areas/{id}", get(handler::detail))
}
