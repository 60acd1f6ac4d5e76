//! Shipping address handlers

use axum::Json;
use axum::extract::{Path, State};
use http::StatusCode;
use shared::error::{ApiResponse, AppError, ErrorCode};
use shared::models::{Address, AddressCreate, AddressList, AddressTitle};

use crate::api::ApiResult;
use crate::auth::CurrentUser;
use crate::state::AppState;
use crate::util::is_valid_mobile;

/// Live addresses a user may keep
pub const MAX_ADDRESSES: usize = 20;

fn not_found(id: i64) -> AppError {
    AppError::new(ErrorCode::AddressNotFound).with_detail("address", id)
}

fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::invalid_field(field, format!("{field} must not be empty")));
    }
    Ok(())
}

/// Field checks plus the province → city → district chain
async fn validate(state: &AppState, payload: &AddressCreate) -> ApiResult<()> {
    require_text("title", &payload.title)?;
    require_text("receiver", &payload.receiver)?;
    require_text("place", &payload.place)?;
    if !is_valid_mobile(&payload.mobile) {
        return Err(AppError::new(ErrorCode::MobileInvalid)
            .with_detail("mobile", payload.mobile.as_str())
            .into());
    }

    let chain = [
        ("province_id", payload.province_id, None),
        ("city_id", payload.city_id, Some(payload.province_id)),
        ("district_id", payload.district_id, Some(payload.city_id)),
    ];
    for (field, id, parent) in chain {
        let area = state.store.find_area(id).await?;
        if area.is_none_or(|a| a.parent_id != parent) {
            return Err(AppError::invalid_field(field, format!("{field} is not a valid region"))
                .with_detail("value", id)
                .into());
        }
    }
    Ok(())
}

pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<AddressList>> {
    let default_address_id = state
        .store
        .find_user(user.id)
        .await?
        .and_then(|u| u.default_address_id);
    Ok(Json(AddressList {
        user_id: user.id,
        default_address_id,
        limit: MAX_ADDRESSES,
        addresses: state.store.list_addresses(user.id).await?,
    }))
}

pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<AddressCreate>,
) -> ApiResult<(StatusCode, Json<Address>)> {
    validate(&state, &payload).await?;

    let address = state
        .store
        .create_address(user.id, &payload, MAX_ADDRESSES)
        .await?
        .ok_or_else(|| {
            AppError::new(ErrorCode::AddressLimitReached).with_detail("limit", MAX_ADDRESSES)
        })?;
    tracing::info!(user_id = user.id, address_id = address.id, "Address created");
    Ok((StatusCode::CREATED, Json(address)))
}

/// Replace every field of an address
pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<AddressCreate>,
) -> ApiResult<Json<Address>> {
    validate(&state, &payload).await?;
    let address = state
        .store
        .update_address(user.id, id, &payload)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(address))
}

pub async fn set_title(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<AddressTitle>,
) -> ApiResult<Json<Address>> {
    require_text("title", &payload.title)?;
    let address = state
        .store
        .update_address_title(user.id, id, &payload.title)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(address))
}

/// Make the address the user's default
pub async fn set_default(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse<()>>> {
    if !state.store.set_default_address(user.id, id).await? {
        return Err(not_found(id).into());
    }
    tracing::info!(user_id = user.id, address_id = id, "Default address set");
    Ok(Json(ApiResponse::ok()))
}

/// Logical delete
pub async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !state.store.delete_address(user.id, id).await? {
        return Err(not_found(id).into());
    }
    Ok(StatusCode::NO_CONTENT)
}
