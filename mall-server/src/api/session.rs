//! Login completion shared by password and QQ login

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::header::SET_COOKIE;
use shared::error::AppError;
use shared::models::{AuthResponse, User};

use super::ApiResult;
use crate::cart::CartCookie;
use crate::cart::cookie::clear_cart_cookie;
use crate::state::AppState;

/// Issue a token, fold the visitor's cart into the user's, and clear the
/// cart cookie once it has been merged.
///
/// A failed merge keeps the cookie so the next login can retry it.
pub(crate) async fn login_response(
    state: &AppState,
    user: &User,
    cart: CartCookie,
) -> ApiResult<Response> {
    let token = state
        .jwt
        .generate_token(user.id, &user.username)
        .map_err(|e| AppError::internal(e.to_string()))?;

    let merged = match state.carts.merge(cart.0.as_ref(), user.id).await {
        Ok(merged) => merged,
        Err(e) => {
            tracing::warn!(user_id = user.id, error = %e, "Cart merge failed, cookie kept");
            false
        }
    };

    tracing::info!(user_id = user.id, username = %user.username, "User logged in");

    let mut response = Json(AuthResponse {
        token,
        user_id: user.id,
        username: user.username.clone(),
    })
    .into_response();
    if merged {
        response.headers_mut().append(SET_COOKIE, clear_cart_cookie());
    }
    Ok(response)
}
