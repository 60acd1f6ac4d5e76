//! Area lookup handlers

use axum::Json;
use axum::extract::{Path, State};
use shared::error::AppError;
use shared::models::{Area, AreaDetail};

use crate::api::ApiResult;
use crate::state::AppState;

pub async fn provinces(State(state): State<AppState>) -> ApiResult<Json<Vec<Area>>> {
    Ok(Json(state.store.list_areas(None).await?))
}

/// An area with its direct children
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<AreaDetail>> {
    let area = state
        .store
        .find_area(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Area {id}")))?;
    let subs = state.store.list_areas(Some(area.id)).await?;
    Ok(Json(AreaDetail {
        id: area.id,
        name: area.name,
        subs,
    }))
}
