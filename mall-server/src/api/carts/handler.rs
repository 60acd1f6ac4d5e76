//! Cart handlers

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use http::header::SET_COOKIE;
use shared::error::{ApiResponse, AppError};
use shared::models::{CartAdd, CartItemView, CartRemove, CartSelectAll, CartUpdate};

use crate::api::ApiResult;
use crate::auth::OptionalUser;
use crate::cart::cookie::{cart_cookie, clear_cart_cookie};
use crate::cart::{AnonymousCart, CartCookie, CartRef};
use crate::state::AppState;

/// Attach the rewritten visitor cart; an emptied cart deletes the cookie
fn with_cart_cookie(
    state: &AppState,
    response: impl IntoResponse,
    cart: &AnonymousCart,
) -> ApiResult<Response> {
    let value = if cart.is_empty() {
        clear_cart_cookie()
    } else {
        cart_cookie(cart, state.config.cart_cookie_max_age_secs)
            .map_err(|e| AppError::internal(format!("Cart cookie not encodable: {e}")))?
    };
    let mut response = response.into_response();
    response.headers_mut().append(SET_COOKIE, value);
    Ok(response)
}

pub async fn add(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    cookie: CartCookie,
    Json(payload): Json<CartAdd>,
) -> ApiResult<Response> {
    let body = (StatusCode::CREATED, Json(payload.clone()));
    match user {
        Some(user) => {
            state
                .carts
                .add(CartRef::User(user.id), payload.sku_id, payload.count, payload.selected)
                .await?;
            Ok(body.into_response())
        }
        None => {
            let mut cart = cookie.into_cart();
            state
                .carts
                .add(CartRef::Anonymous(&mut cart), payload.sku_id, payload.count, payload.selected)
                .await?;
            with_cart_cookie(&state, body, &cart)
        }
    }
}

pub async fn read(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    cookie: CartCookie,
) -> ApiResult<Json<Vec<CartItemView>>> {
    let items = match user {
        Some(user) => state.carts.read(CartRef::User(user.id)).await?,
        None => {
            let mut cart = cookie.into_cart();
            state.carts.read(CartRef::Anonymous(&mut cart)).await?
        }
    };
    Ok(Json(items))
}

pub async fn update(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    cookie: CartCookie,
    Json(payload): Json<CartUpdate>,
) -> ApiResult<Response> {
    let body = Json(payload.clone());
    match user {
        Some(user) => {
            state
                .carts
                .update(CartRef::User(user.id), payload.sku_id, payload.count, payload.selected)
                .await?;
            Ok(body.into_response())
        }
        None => {
            let mut cart = cookie.into_cart();
            state
                .carts
                .update(CartRef::Anonymous(&mut cart), payload.sku_id, payload.count, payload.selected)
                .await?;
            with_cart_cookie(&state, body, &cart)
        }
    }
}

pub async fn remove(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    cookie: CartCookie,
    Json(payload): Json<CartRemove>,
) -> ApiResult<Response> {
    match user {
        Some(user) => {
            state.carts.remove(CartRef::User(user.id), payload.sku_id).await?;
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        None => {
            let mut cart = cookie.into_cart();
            state
                .carts
                .remove(CartRef::Anonymous(&mut cart), payload.sku_id)
                .await?;
            with_cart_cookie(&state, StatusCode::NO_CONTENT, &cart)
        }
    }
}

pub async fn select_all(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    cookie: CartCookie,
    Json(payload): Json<CartSelectAll>,
) -> ApiResult<Response> {
    let body = Json(ApiResponse::ok());
    match user {
        Some(user) => {
            state
                .carts
                .set_all_selected(CartRef::User(user.id), payload.selected)
                .await?;
            Ok(body.into_response())
        }
        None => {
            let mut cart = cookie.into_cart();
            state
                .carts
                .set_all_selected(CartRef::Anonymous(&mut cart), payload.selected)
                .await?;
            with_cart_cookie(&state, body, &cart)
        }
    }
}
