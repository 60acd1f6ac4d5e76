//! Unified error system for the mall backend
//!
//! This module provides:
//! - [`ErrorCode`]: Standardized numeric error codes
//! - [`ErrorCategory`]: Classification of errors by domain
//! - [`AppError`]: Rich error type with codes, messages, and details
//! - [`ApiResponse`]: Unified API response format
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Verification (SMS) errors
//! - 3xxx: Cart errors
//! - 4xxx: Order errors
//! - 6xxx: Product and stock errors
//! - 9xxx: System errors
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode, ApiResponse};
//!
//! let err = AppError::new(ErrorCode::NotFound);
//!
//! let err = AppError::insufficient_stock(7, 3, 1);
//! assert_eq!(err.code, ErrorCode::InsufficientStock);
//!
//! let response = ApiResponse::<()>::error(&err);
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiResponse, AppError, AppResult};
