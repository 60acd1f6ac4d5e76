//! Unified service-layer error type for mall-server
//!
//! `ServiceError` bridges infrastructure errors (`sqlx::Error`, `redis::RedisError`,
//! `BoxError`) and the API-layer `AppError`, so service code can propagate with `?`.

use axum::response::IntoResponse;
use shared::error::{AppError, ErrorCode};

use crate::BoxError;

/// Service-layer error
///
/// - `Db`: storage or infrastructure failure (logged, mapped to InternalError)
/// - `App`: business-rule error (passed through to the client unchanged)
#[derive(Debug)]
pub enum ServiceError {
    /// Database, cache or transport failure
    Db(BoxError),
    /// Business-rule error (already an AppError with the correct ErrorCode)
    App(AppError),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Db(e) => write!(f, "storage error: {e}"),
            ServiceError::App(e) => write!(f, "{} ({})", e.message, e.code),
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(e: sqlx::Error) -> Self {
        ServiceError::Db(e.into())
    }
}

impl From<redis::RedisError> for ServiceError {
    fn from(e: redis::RedisError) -> Self {
        ServiceError::Db(e.into())
    }
}

impl From<BoxError> for ServiceError {
    fn from(e: BoxError) -> Self {
        ServiceError::Db(e)
    }
}

impl From<AppError> for ServiceError {
    fn from(e: AppError) -> Self {
        ServiceError::App(e)
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::App(app_err) => app_err,
            ServiceError::Db(db_err) => {
                tracing::error!(error = %db_err, "Service storage error");
                AppError::new(ErrorCode::InternalError)
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

/// Convenience type alias for service-layer results
pub type ServiceResult<T> = Result<T, ServiceError>;
