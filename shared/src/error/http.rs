//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound | Self::AddressNotFound | Self::SkuNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::UsernameExists | Self::MobileExists => StatusCode::CONFLICT,

            // 401 Unauthorized
            Self::NotAuthenticated
            | Self::InvalidCredentials
            | Self::TokenExpired
            | Self::TokenInvalid => StatusCode::UNAUTHORIZED,

            // 429 Too Many Requests
            Self::SmsRateLimited => StatusCode::TOO_MANY_REQUESTS,

            // 503 Service Unavailable (transient, client can retry)
            Self::UpstreamUnavailable | Self::StockContention => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request (validation and business rules)
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_status() {
        assert_eq!(ErrorCode::NotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::SkuNotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::AddressNotFound.http_status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_auth_status() {
        assert_eq!(
            ErrorCode::NotAuthenticated.http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ErrorCode::InvalidCredentials.http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ErrorCode::MobileExists.http_status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_throttle_and_transient_status() {
        assert_eq!(
            ErrorCode::SmsRateLimited.http_status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ErrorCode::UpstreamUnavailable.http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ErrorCode::StockContention.http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_bad_request_status() {
        assert_eq!(
            ErrorCode::ValidationFailed.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::InsufficientStock.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ErrorCode::OrderEmpty.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ErrorCode::SmsCodeInvalid.http_status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_internal_error_status() {
        assert_eq!(
            ErrorCode::InternalError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorCode::PayMethodInvalid.http_status(),
            StatusCode::BAD_REQUEST
        );
    }
}
