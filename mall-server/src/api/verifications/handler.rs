//! SMS verification code handlers

use axum::Json;
use axum::extract::{Path, State};
use shared::error::ApiResponse;

use crate::api::ApiResult;
use crate::state::AppState;

/// Send a code to `mobile`; at most once per send interval
pub async fn request_code(
    State(state): State<AppState>,
    Path(mobile): Path<String>,
) -> ApiResult<Json<ApiResponse<()>>> {
    state.sms.request_code(&mobile).await?;
    Ok(Json(ApiResponse::ok()))
}
