//! Storefront server configuration

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::BoxError;

/// Storefront server configuration
///
/// Built once at startup and handed to each component; nothing reads the
/// environment after this point.
#[derive(Debug, Clone)]
pub struct Config {
    /// Environment: development | staging | production
    pub environment: String,
    /// HTTP port
    pub http_port: u16,
    /// PostgreSQL connection URL (in-memory store when absent in development)
    pub database_url: Option<String>,
    /// Redis connection URL (in-memory cache when absent in development)
    pub redis_url: Option<String>,
    /// JWT secret for user authentication
    pub jwt_secret: String,
    /// Login token lifetime
    pub jwt_expiration_minutes: i64,
    /// Flat freight added to every order
    pub order_freight: Decimal,
    /// Attempts per SKU before a checkout gives up on a contended row
    pub stock_deduct_max_attempts: u32,
    /// Lifetime of a cached SMS code
    pub sms_code_ttl_secs: u64,
    /// Minimum spacing between two sends to the same mobile
    pub sms_send_interval_secs: u64,
    /// SMS gateway endpoint; codes are only logged when unset
    pub sms_gateway_url: Option<String>,
    pub sms_template_id: String,
    /// Max-Age of the anonymous cart cookie
    pub cart_cookie_max_age_secs: i64,
    pub qq_client_id: String,
    pub qq_client_secret: String,
    pub qq_redirect_uri: String,
    /// Lifetime of the signed openid handed out before binding
    pub oauth_token_ttl_secs: i64,
    /// Capacity of the background task channel
    pub task_queue_capacity: usize,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    /// Require a backing-store URL outside development.
    fn require_url(name: &str, environment: &str) -> Result<Option<String>, BoxError> {
        match std::env::var(name).ok().filter(|s| !s.is_empty()) {
            Some(url) => Ok(Some(url)),
            None if environment == "development" => Ok(None),
            None => Err(format!("{name} must be set in {environment} environment").into()),
        }
    }

    fn parse_or<T: FromStr>(name: &str, default: T) -> T {
        std::env::var(name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let defaults = Self::development();

        Ok(Self {
            http_port: Self::parse_or("HTTP_PORT", defaults.http_port),
            database_url: Self::require_url("DATABASE_URL", &environment)?,
            redis_url: Self::require_url("REDIS_URL", &environment)?,
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            jwt_expiration_minutes: Self::parse_or(
                "JWT_EXPIRATION_MINUTES",
                defaults.jwt_expiration_minutes,
            ),
            order_freight: Self::parse_or("ORDER_FREIGHT", defaults.order_freight),
            stock_deduct_max_attempts: Self::parse_or(
                "STOCK_DEDUCT_MAX_ATTEMPTS",
                defaults.stock_deduct_max_attempts,
            )
            .max(1),
            sms_code_ttl_secs: Self::parse_or("SMS_CODE_TTL_SECS", defaults.sms_code_ttl_secs),
            sms_send_interval_secs: Self::parse_or(
                "SMS_SEND_INTERVAL_SECS",
                defaults.sms_send_interval_secs,
            ),
            sms_gateway_url: std::env::var("SMS_GATEWAY_URL")
                .ok()
                .filter(|s| !s.is_empty()),
            sms_template_id: std::env::var("SMS_TEMPLATE_ID").unwrap_or(defaults.sms_template_id),
            cart_cookie_max_age_secs: Self::parse_or(
                "CART_COOKIE_MAX_AGE_SECS",
                defaults.cart_cookie_max_age_secs,
            ),
            qq_client_id: std::env::var("QQ_CLIENT_ID").unwrap_or_default(),
            qq_client_secret: Self::require_secret("QQ_CLIENT_SECRET", &environment)?,
            qq_redirect_uri: std::env::var("QQ_REDIRECT_URI").unwrap_or(defaults.qq_redirect_uri),
            oauth_token_ttl_secs: Self::parse_or(
                "OAUTH_TOKEN_TTL_SECS",
                defaults.oauth_token_ttl_secs,
            ),
            task_queue_capacity: Self::parse_or("TASK_QUEUE_CAPACITY", defaults.task_queue_capacity),
            environment,
        })
    }

    /// Development defaults: in-memory stores, logged SMS codes
    pub fn development() -> Self {
        Self {
            environment: "development".into(),
            http_port: 8000,
            database_url: None,
            redis_url: None,
            jwt_secret: "dev-JWT_SECRET-not-for-production".into(),
            jwt_expiration_minutes: 1440,
            order_freight: Decimal::new(1000, 2),
            stock_deduct_max_attempts: 64,
            sms_code_ttl_secs: 300,
            sms_send_interval_secs: 60,
            sms_gateway_url: None,
            sms_template_id: "1".into(),
            cart_cookie_max_age_secs: 14 * 24 * 3600,
            qq_client_id: String::new(),
            qq_client_secret: "dev-QQ_CLIENT_SECRET-not-for-production".into(),
            qq_redirect_uri: "http://localhost:8080/oauth_callback.html".into(),
            oauth_token_ttl_secs: 600,
            task_queue_capacity: 1024,
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}
