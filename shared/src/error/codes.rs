//! Unified error codes for the mall backend
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Verification (SMS) errors
//! - 3xxx: Cart errors
//! - 4xxx: Order errors
//! - 6xxx: Product and stock errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// Serialized as a bare `u16` so clients in any language can switch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Invalid credentials (account/password)
    InvalidCredentials = 1002,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,
    /// Username already registered
    UsernameExists = 1005,
    /// Mobile number already registered
    MobileExists = 1006,
    /// The two passwords differ
    PasswordMismatch = 1007,
    /// Third-party binding token is invalid or expired
    OAuthTokenInvalid = 1008,
    /// User agreement not accepted
    AgreementRequired = 1009,
    /// Address book is full
    AddressLimitReached = 1010,
    /// Address not found
    AddressNotFound = 1011,

    // ==================== 2xxx: Verification ====================
    /// SMS code does not match
    SmsCodeInvalid = 2001,
    /// SMS code missing or expired
    SmsCodeExpired = 2002,
    /// SMS requested again inside the send interval
    SmsRateLimited = 2003,
    /// Mobile number format is invalid
    MobileInvalid = 2004,

    // ==================== 3xxx: Cart ====================
    /// Cart count outside the allowed range
    CartCountInvalid = 3002,

    // ==================== 4xxx: Order ====================
    /// No selected cart items to check out
    OrderEmpty = 4002,
    /// Unsupported pay method
    PayMethodInvalid = 4003,

    // ==================== 6xxx: Product ====================
    /// SKU not found
    SkuNotFound = 6001,
    /// SKU is not on sale
    SkuUnavailable = 6002,
    /// Not enough stock to fulfil the request
    InsufficientStock = 6003,
    /// Stock update kept conflicting with concurrent writers
    StockContention = 6004,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Third-party provider unavailable
    UpstreamUnavailable = 9101,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",
            ErrorCode::InvalidCredentials => "Invalid account or password",
            ErrorCode::TokenExpired => "Token has expired",
            ErrorCode::TokenInvalid => "Token is invalid",
            ErrorCode::UsernameExists => "Username already registered",
            ErrorCode::MobileExists => "Mobile number already registered",
            ErrorCode::PasswordMismatch => "Passwords do not match",
            ErrorCode::OAuthTokenInvalid => "Binding token is invalid or expired",
            ErrorCode::AgreementRequired => "User agreement must be accepted",
            ErrorCode::AddressLimitReached => "Address limit reached",
            ErrorCode::AddressNotFound => "Address not found",

            // Verification
            ErrorCode::SmsCodeInvalid => "SMS code is incorrect",
            ErrorCode::SmsCodeExpired => "SMS code has expired",
            ErrorCode::SmsRateLimited => "SMS requested too frequently",
            ErrorCode::MobileInvalid => "Mobile number is invalid",

            // Cart
            ErrorCode::CartCountInvalid => "Cart count is out of range",

            // Order
            ErrorCode::OrderEmpty => "No selected items to check out",
            ErrorCode::PayMethodInvalid => "Unsupported pay method",

            // Product
            ErrorCode::SkuNotFound => "SKU not found",
            ErrorCode::SkuUnavailable => "SKU is not on sale",
            ErrorCode::InsufficientStock => "Insufficient stock",
            ErrorCode::StockContention => "Stock is busy, please retry",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::UpstreamUnavailable => "Third-party service unavailable",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1002 => Ok(ErrorCode::InvalidCredentials),
            1003 => Ok(ErrorCode::TokenExpired),
            1004 => Ok(ErrorCode::TokenInvalid),
            1005 => Ok(ErrorCode::UsernameExists),
            1006 => Ok(ErrorCode::MobileExists),
            1007 => Ok(ErrorCode::PasswordMismatch),
            1008 => Ok(ErrorCode::OAuthTokenInvalid),
            1009 => Ok(ErrorCode::AgreementRequired),
            1010 => Ok(ErrorCode::AddressLimitReached),
            1011 => Ok(ErrorCode::AddressNotFound),

            // Verification
            2001 => Ok(ErrorCode::SmsCodeInvalid),
            2002 => Ok(ErrorCode::SmsCodeExpired),
            2003 => Ok(ErrorCode::SmsRateLimited),
            2004 => Ok(ErrorCode::MobileInvalid),

            // Cart
            3002 => Ok(ErrorCode::CartCountInvalid),

            // Order
            4002 => Ok(ErrorCode::OrderEmpty),
            4003 => Ok(ErrorCode::PayMethodInvalid),

            // Product
            6001 => Ok(ErrorCode::SkuNotFound),
            6002 => Ok(ErrorCode::SkuUnavailable),
            6003 => Ok(ErrorCode::InsufficientStock),
            6004 => Ok(ErrorCode::StockContention),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9101 => Ok(ErrorCode::UpstreamUnavailable),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::ValidationFailed.code(), 2);
        assert_eq!(ErrorCode::NotFound.code(), 3);

        assert_eq!(ErrorCode::NotAuthenticated.code(), 1001);
        assert_eq!(ErrorCode::MobileExists.code(), 1006);

        assert_eq!(ErrorCode::SmsRateLimited.code(), 2003);
        assert_eq!(ErrorCode::CartCountInvalid.code(), 3002);
        assert_eq!(ErrorCode::OrderEmpty.code(), 4002);
        assert_eq!(ErrorCode::PayMethodInvalid.code(), 4003);

        assert_eq!(ErrorCode::InsufficientStock.code(), 6003);
        assert_eq!(ErrorCode::StockContention.code(), 6004);

        assert_eq!(ErrorCode::InternalError.code(), 9001);
        assert_eq!(ErrorCode::UpstreamUnavailable.code(), 9101);
    }

    #[test]
    fn test_try_from_covers_every_code() {
        let codes = [
            ErrorCode::Success,
            ErrorCode::ValidationFailed,
            ErrorCode::NotFound,
            ErrorCode::NotAuthenticated,
            ErrorCode::InvalidCredentials,
            ErrorCode::TokenExpired,
            ErrorCode::TokenInvalid,
            ErrorCode::UsernameExists,
            ErrorCode::MobileExists,
            ErrorCode::PasswordMismatch,
            ErrorCode::OAuthTokenInvalid,
            ErrorCode::AgreementRequired,
            ErrorCode::AddressLimitReached,
            ErrorCode::AddressNotFound,
            ErrorCode::SmsCodeInvalid,
            ErrorCode::SmsCodeExpired,
            ErrorCode::SmsRateLimited,
            ErrorCode::MobileInvalid,
            ErrorCode::CartCountInvalid,
            ErrorCode::OrderEmpty,
            ErrorCode::PayMethodInvalid,
            ErrorCode::SkuNotFound,
            ErrorCode::SkuUnavailable,
            ErrorCode::InsufficientStock,
            ErrorCode::StockContention,
            ErrorCode::InternalError,
            ErrorCode::UpstreamUnavailable,
        ];

        for code in codes {
            assert_eq!(ErrorCode::try_from(code.code()), Ok(code));
        }
    }

    #[test]
    fn test_try_from_invalid() {
        assert_eq!(ErrorCode::try_from(999), Err(InvalidErrorCode(999)));
        assert_eq!(ErrorCode::try_from(5001), Err(InvalidErrorCode(5001)));
    }

    #[test]
    fn test_serialize_as_number() {
        let json = serde_json::to_string(&ErrorCode::InsufficientStock).unwrap();
        assert_eq!(json, "6003");

        let code: ErrorCode = serde_json::from_str("2003").unwrap();
        assert_eq!(code, ErrorCode::SmsRateLimited);

        let result: Result<ErrorCode, _> = serde_json::from_str("10000");
        assert!(result.is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", ErrorCode::Success), "0");
        assert_eq!(format!("{}", ErrorCode::OrderEmpty), "4002");
        assert_eq!(
            format!("{}", InvalidErrorCode(999)),
            "invalid error code: 999"
        );
    }

    #[test]
    fn test_message() {
        assert_eq!(ErrorCode::InsufficientStock.message(), "Insufficient stock");
        assert_eq!(ErrorCode::InternalError.message(), "Internal server error");
    }
}
