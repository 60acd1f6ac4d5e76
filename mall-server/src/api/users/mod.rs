//! User API
//!
//! Registration, uniqueness checks, password login and profile.

mod handler;

use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(handler::register))
        .route("/usernames/{username}/count", get(handler::username_count))
        .route("/mobiles/{mobile}/count", get(handler::mobile_count))
        .route("/authorizations", post(handler::login))
        .route("/user", get(handler::profile))
}
