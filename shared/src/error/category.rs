//! Error category classification

use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

/// Error category classification based on error code ranges
///
/// - 0xxx: General
/// - 1xxx: Auth
/// - 2xxx: Verification
/// - 3xxx: Cart
/// - 4xxx and 5xxx: Order
/// - 6xxx to 8xxx: Product
/// - 9xxx and above: System
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    General,
    Auth,
    Verification,
    Cart,
    Order,
    Product,
    System,
}

impl ErrorCategory {
    /// Determine category from error code value
    pub fn from_code(code: u16) -> Self {
        match code {
            0..1000 => Self::General,
            1000..2000 => Self::Auth,
            2000..3000 => Self::Verification,
            3000..4000 => Self::Cart,
            4000..6000 => Self::Order,
            6000..9000 => Self::Product,
            _ => Self::System,
        }
    }

    /// Get the string name for this category
    pub fn name(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Auth => "auth",
            Self::Verification => "verification",
            Self::Cart => "cart",
            Self::Order => "order",
            Self::Product => "product",
            Self::System => "system",
        }
    }
}

impl ErrorCode {
    /// Get the category for this error code
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }
}
