//! User / Address Model

use serde::{Deserialize, Serialize};

/// Registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct User {
    pub id: i64,
    pub username: String,
    pub mobile: String,
    /// Argon2 PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: Option<String>,
    pub default_address_id: Option<i64>,
    pub created_at: i64,
}

/// Public profile of a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub mobile: String,
    pub email: Option<String>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            mobile: user.mobile,
            email: user.email,
        }
    }
}

/// Registration payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRegister {
    pub username: String,
    pub password: String,
    pub password2: String,
    pub mobile: String,
    pub sms_code: String,
    /// Agreement checkbox
    pub allow: bool,
}

/// Password login payload; `username` may also be a mobile number
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login / registration result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user_id: i64,
    pub username: String,
}

/// Registration result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub id: i64,
    pub username: String,
    pub mobile: String,
    pub token: String,
}

/// Bind a QQ openid to an account, creating it when the mobile is new
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QqBindRequest {
    /// Signed openid from the callback step
    pub access_token: String,
    pub mobile: String,
    pub password: String,
    pub sms_code: String,
}

/// Shipping address
///
/// The three region ids form a province → city → district chain in the area
/// tree; `place` is the street part below the district.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Address {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub receiver: String,
    pub province_id: i64,
    pub city_id: i64,
    pub district_id: i64,
    pub place: String,
    pub mobile: String,
    /// Logical delete flag
    pub is_deleted: bool,
}

/// Create / replace address payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressCreate {
    pub title: String,
    pub receiver: String,
    pub province_id: i64,
    pub city_id: i64,
    pub district_id: i64,
    pub place: String,
    pub mobile: String,
}

/// Rename payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressTitle {
    pub title: String,
}

/// Address book of one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressList {
    pub user_id: i64,
    pub default_address_id: Option<i64>,
    /// Live addresses the user may keep
    pub limit: usize,
    pub addresses: Vec<Address>,
}

/// Node of the administrative area tree (province, city or district)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Area {
    pub id: i64,
    pub name: String,
    /// `None` for provinces
    pub parent_id: Option<i64>,
}

/// An area with its direct children
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaDetail {
    pub id: i64,
    pub name: String,
    pub subs: Vec<Area>,
}
