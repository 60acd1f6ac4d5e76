//! Authentication
//!
//! - [`JwtService`] - login tokens and signed QQ openids
//! - [`CurrentUser`] - extractor for endpoints that require login
//! - [`OptionalUser`] - extractor for endpoints that also serve visitors

pub mod extractor;
pub mod jwt;

pub use extractor::OptionalUser;
pub use jwt::{Claims, CurrentUser, JwtConfig, JwtError, JwtService};
