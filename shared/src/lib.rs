//! Shared types for the mall backend
//!
//! Wire-level types used by the server and its clients: the unified error
//! system and the storefront domain models.

pub mod error;
pub mod models;

pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
