//! JWT token service
//!
//! Issues and validates login tokens. The same key also signs the QQ openid
//! handed to a visitor whose QQ account is not bound yet, so the binding
//! request can prove the openid came from this server.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const ACCESS_TOKEN: &str = "access";
const OPENID_TOKEN: &str = "qq_openid";

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    /// Login token lifetime (minutes)
    pub expiration_minutes: i64,
    /// Signed openid lifetime (seconds)
    pub openid_ttl_secs: i64,
    pub issuer: String,
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>, expiration_minutes: i64, openid_ttl_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            expiration_minutes,
            openid_ttl_secs,
            issuer: "mall-server".to_string(),
        }
    }
}

/// Claims stored in a login token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub username: String,
    pub token_type: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenIdClaims {
    openid: String,
    token_type: String,
    exp: i64,
    iat: i64,
    iss: String,
}

#[derive(Error, Debug)]
pub enum JwtError {
    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token expired")]
    ExpiredToken,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("token generation failed: {0}")]
    GenerationFailed(String),
}

#[derive(Clone)]
pub struct JwtService {
    pub config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("issuer", &self.config.issuer)
            .field("expiration_minutes", &self.config.expiration_minutes)
            .finish_non_exhaustive()
    }
}

impl JwtService {
    pub fn with_config(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Login token for a user
    pub fn generate_token(&self, user_id: i64, username: &str) -> Result<String, JwtError> {
        let now = Utc::now();
        let expiration = now + Duration::minutes(self.config.expiration_minutes);

        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            token_type: ACCESS_TOKEN.to_string(),
            exp: expiration.timestamp(),
            iat: now.timestamp(),
            iss: self.config.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::GenerationFailed(e.to_string()))
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "iss"]);
        validation
    }

    fn map_error(e: jsonwebtoken::errors::Error) -> JwtError {
        match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
            ErrorKind::InvalidSignature => JwtError::InvalidSignature,
            ErrorKind::InvalidToken => JwtError::InvalidToken(e.to_string()),
            _ => JwtError::InvalidToken(format!("Token validation failed: {e}")),
        }
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation())
            .map_err(Self::map_error)?
            .claims;
        if claims.token_type != ACCESS_TOKEN {
            return Err(JwtError::InvalidToken("not a login token".to_string()));
        }
        Ok(claims)
    }

    /// Sign an openid for the bind step
    pub fn sign_openid(&self, openid: &str) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = OpenIdClaims {
            openid: openid.to_string(),
            token_type: OPENID_TOKEN.to_string(),
            exp: (now + Duration::seconds(self.config.openid_ttl_secs)).timestamp(),
            iat: now.timestamp(),
            iss: self.config.issuer.clone(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::GenerationFailed(e.to_string()))
    }

    pub fn verify_openid(&self, token: &str) -> Result<String, JwtError> {
        let claims = decode::<OpenIdClaims>(token, &self.decoding_key, &self.validation())
            .map_err(Self::map_error)?
            .claims;
        if claims.token_type != OPENID_TOKEN {
            return Err(JwtError::InvalidToken("not an openid token".to_string()));
        }
        Ok(claims.openid)
    }

    /// Token from an `Authorization` header, `Bearer` or `JWT` scheme
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("JWT "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Authenticated user, parsed from login token claims
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

impl TryFrom<Claims> for CurrentUser {
    type Error = std::num::ParseIntError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        Ok(Self {
            id: claims.sub.parse()?,
            username: claims.username,
        })
    }
}
