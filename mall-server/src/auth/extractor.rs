//! JWT extractors

use axum::extract::FromRequestParts;
use http::request::Parts;
use shared::error::AppError;

use super::{CurrentUser, JwtError, JwtService};
use crate::state::AppState;

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(JwtService::extract_from_header)
}

fn authenticate(jwt: &JwtService, token: &str) -> Result<CurrentUser, AppError> {
    let claims = jwt.validate_token(token).map_err(|e| match e {
        JwtError::ExpiredToken => AppError::token_expired(),
        _ => AppError::invalid_token("Invalid token"),
    })?;
    CurrentUser::try_from(claims)
        .map_err(|e| AppError::invalid_token(format!("Malformed JWT claims: {e}")))
}

/// Rejects the request unless it carries a valid login token
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }

        let Some(token) = bearer_token(parts) else {
            tracing::debug!(uri = %parts.uri, "Missing authorization");
            return Err(AppError::not_authenticated());
        };

        let user = authenticate(&state.jwt, token).inspect_err(|e| {
            tracing::warn!(uri = %parts.uri, error = %e.message, "Authentication failed");
        })?;
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

/// Logged-in user if any.
///
/// A missing, expired or invalid token makes the request anonymous instead
/// of failing it.
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = bearer_token(parts).and_then(|token| match authenticate(&state.jwt, token) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::debug!(error = %e.message, "Ignoring invalid token on anonymous-capable route");
                None
            }
        });
        Ok(OptionalUser(user))
    }
}
