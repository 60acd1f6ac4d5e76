//! QQ login handlers
//!
//! The callback logs a bound account straight in. An unbound openid is
//! returned signed, to be presented again together with a mobile number
//! when binding.

use axum::Json;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::QqBindRequest;

use crate::api::ApiResult;
use crate::api::session::login_response;
use crate::cart::CartCookie;
use crate::db::NewUser;
use crate::state::AppState;
use crate::util::{hash_password, is_valid_mobile, is_valid_password, verify_password};

#[derive(Debug, Deserialize)]
pub struct AuthorizationQuery {
    pub next: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginUrl {
    pub login_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
}

/// Signed openid for an account that is not bound yet
#[derive(Debug, Serialize)]
pub struct UnboundOpenId {
    pub access_token: String,
}

pub async fn authorization(
    State(state): State<AppState>,
    Query(query): Query<AuthorizationQuery>,
) -> ApiResult<Json<LoginUrl>> {
    let next = query.next.filter(|n| !n.is_empty()).unwrap_or_else(|| "/".into());
    let login_url = state.qq.login_url(&next).map_err(AppError::from)?;
    Ok(Json(LoginUrl { login_url }))
}

pub async fn callback(
    State(state): State<AppState>,
    cart: CartCookie,
    Query(query): Query<CallbackQuery>,
) -> ApiResult<Response> {
    let openid = state
        .qq
        .openid_for_code(&query.code)
        .await
        .map_err(AppError::from)?;

    let Some(user_id) = state.store.find_qq_user(&openid).await? else {
        let access_token = state
            .jwt
            .sign_openid(&openid)
            .map_err(|e| AppError::internal(e.to_string()))?;
        return Ok(Json(UnboundOpenId { access_token }).into_response());
    };

    let user = state
        .store
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User {user_id}")))?;
    login_response(&state, &user, cart).await
}

/// Bind the openid to the account owning `mobile`, creating it if needed
pub async fn bind(
    State(state): State<AppState>,
    cart: CartCookie,
    Json(req): Json<QqBindRequest>,
) -> ApiResult<Response> {
    let openid = state.jwt.verify_openid(&req.access_token).map_err(|e| {
        tracing::info!(error = %e, "Rejected QQ bind token");
        AppError::new(ErrorCode::OAuthTokenInvalid)
    })?;
    if !is_valid_mobile(&req.mobile) {
        return Err(AppError::new(ErrorCode::MobileInvalid)
            .with_detail("mobile", req.mobile.as_str())
            .into());
    }
    if !is_valid_password(&req.password) {
        return Err(AppError::invalid_field("password", "Password must be 8-20 characters").into());
    }
    state.sms.check_code(&req.mobile, &req.sms_code).await?;

    let user = match state.store.find_user_by_mobile(&req.mobile).await? {
        Some(user) => {
            if !verify_password(&req.password, &user.password_hash) {
                return Err(AppError::invalid_credentials().into());
            }
            user
        }
        None => {
            let password_hash = hash_password(&req.password).map_err(|e| {
                tracing::error!(%e, "Password hash error");
                AppError::internal("Password hashing failed")
            })?;
            let user = state
                .store
                .create_user(NewUser {
                    username: req.mobile.clone(),
                    mobile: req.mobile.clone(),
                    password_hash,
                })
                .await?;
            tracing::info!(user_id = user.id, "User created through QQ binding");
            user
        }
    };

    state.store.bind_qq_user(&openid, user.id).await?;
    tracing::info!(user_id = user.id, "QQ account bound");
    login_response(&state, &user, cart).await
}
