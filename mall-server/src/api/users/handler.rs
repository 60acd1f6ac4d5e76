//! User API handlers

use axum::Json;
use axum::extract::{Path, State};
use axum::response::Response;
use http::StatusCode;
use serde::Serialize;
use shared::error::{AppError, ErrorCode};
use shared::models::{LoginRequest, RegisterResponse, UserProfile, UserRegister};

use crate::api::ApiResult;
use crate::api::session::login_response;
use crate::auth::CurrentUser;
use crate::cart::CartCookie;
use crate::db::NewUser;
use crate::state::AppState;
use crate::util::{
    hash_password, is_valid_mobile, is_valid_password, is_valid_username, verify_password,
};

#[derive(Debug, Serialize)]
pub struct UsernameCount {
    pub username: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct MobileCount {
    pub mobile: String,
    pub count: i64,
}

/// Register an account and log it in
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<UserRegister>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    if !is_valid_username(&req.username) {
        return Err(AppError::invalid_field(
            "username",
            "Username must be 5-20 letters, digits, '_' or '-', not all digits",
        )
        .into());
    }
    if !is_valid_password(&req.password) {
        return Err(AppError::invalid_field("password", "Password must be 8-20 characters").into());
    }
    if req.password != req.password2 {
        return Err(AppError::new(ErrorCode::PasswordMismatch).into());
    }
    if !is_valid_mobile(&req.mobile) {
        return Err(AppError::new(ErrorCode::MobileInvalid)
            .with_detail("mobile", req.mobile.as_str())
            .into());
    }
    if !req.allow {
        return Err(AppError::new(ErrorCode::AgreementRequired).into());
    }
    if state.store.count_username(&req.username).await? > 0 {
        return Err(AppError::new(ErrorCode::UsernameExists)
            .with_detail("username", req.username.as_str())
            .into());
    }
    if state.store.count_mobile(&req.mobile).await? > 0 {
        return Err(AppError::new(ErrorCode::MobileExists)
            .with_detail("mobile", req.mobile.as_str())
            .into());
    }
    state.sms.check_code(&req.mobile, &req.sms_code).await?;

    let password_hash = hash_password(&req.password).map_err(|e| {
        tracing::error!(%e, "Password hash error");
        AppError::internal("Password hashing failed")
    })?;

    let user = state
        .store
        .create_user(NewUser {
            username: req.username,
            mobile: req.mobile,
            password_hash,
        })
        .await?;
    tracing::info!(user_id = user.id, username = %user.username, "User registered");

    let token = state
        .jwt
        .generate_token(user.id, &user.username)
        .map_err(|e| AppError::internal(e.to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: user.id,
            username: user.username,
            mobile: user.mobile,
            token,
        }),
    ))
}

pub async fn username_count(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Json<UsernameCount>> {
    let count = state.store.count_username(&username).await?;
    Ok(Json(UsernameCount { username, count }))
}

pub async fn mobile_count(
    State(state): State<AppState>,
    Path(mobile): Path<String>,
) -> ApiResult<Json<MobileCount>> {
    let count = state.store.count_mobile(&mobile).await?;
    Ok(Json(MobileCount { mobile, count }))
}

/// Password login by username or mobile; merges the visitor's cart
pub async fn login(
    State(state): State<AppState>,
    cart: CartCookie,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Response> {
    let user = state
        .store
        .find_user_by_account(req.username.trim())
        .await?
        .filter(|user| verify_password(&req.password, &user.password_hash))
        .ok_or_else(|| {
            tracing::info!(account = %req.username, "Login rejected");
            AppError::invalid_credentials()
        })?;

    login_response(&state, &user, cart).await
}

pub async fn profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<UserProfile>> {
    let user = state
        .store
        .find_user(user.id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User {}", user.id)))?;
    Ok(Json(user.into()))
}
