//! Checkout handlers

use axum::Json;
use axum::extract::State;
use http::StatusCode;
use shared::error::{AppError, ErrorCode};
use shared::models::{OrderCommit, OrderCommitResult, PayMethod, Settlement};

use crate::api::ApiResult;
use crate::auth::CurrentUser;
use crate::state::AppState;

/// Selected cart items and freight
pub async fn settlement(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Settlement>> {
    Ok(Json(state.orders.settlement(user.id).await?))
}

/// Place an order for the selected cart items
pub async fn commit(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<OrderCommit>,
) -> ApiResult<(StatusCode, Json<OrderCommitResult>)> {
    let pay_method = PayMethod::try_from(payload.pay_method).map_err(|_| {
        AppError::new(ErrorCode::PayMethodInvalid).with_detail("pay_method", payload.pay_method)
    })?;
    let order = state
        .orders
        .place_order(user.id, payload.address, pay_method)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(OrderCommitResult {
            order_id: order.order_id,
        }),
    ))
}
