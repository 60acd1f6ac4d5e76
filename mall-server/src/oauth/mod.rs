//! QQ login client
//!
//! Authorization code flow against graph.qq.com: the visitor is sent to
//! [`QqClient::login_url`], comes back with a `code`, which is exchanged
//! for an access token and then for the account's openid.

use reqwest::Url;
use serde::Deserialize;
use shared::error::AppError;
use thiserror::Error;

const AUTHORIZE_URL: &str = "https://graph.qq.com/oauth2.0/authorize";
const TOKEN_URL: &str = "https://graph.qq.com/oauth2.0/token";
const ME_URL: &str = "https://graph.qq.com/oauth2.0/me";

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("request to QQ failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected QQ response: {0}")]
    Provider(String),
}

impl From<OAuthError> for AppError {
    fn from(e: OAuthError) -> Self {
        tracing::warn!(error = %e, "QQ login failed");
        AppError::upstream_unavailable("QQ")
    }
}

#[derive(Deserialize)]
struct MeResponse {
    openid: Option<String>,
}

#[derive(Clone)]
pub struct QqClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl QqClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
        }
    }

    /// Provider login page; `state` comes back untouched on the callback
    pub fn login_url(&self, state: &str) -> Result<String, OAuthError> {
        let url = Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| OAuthError::Provider(e.to_string()))?;
        Ok(url.into())
    }

    /// Code from the callback to openid
    pub async fn openid_for_code(&self, code: &str) -> Result<String, OAuthError> {
        let token = self.access_token(code).await?;
        self.openid(&token).await
    }

    async fn access_token(&self, code: &str) -> Result<String, OAuthError> {
        let body = self
            .http
            .get(TOKEN_URL)
            .query(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_access_token(&body).ok_or(OAuthError::Provider(body))
    }

    async fn openid(&self, access_token: &str) -> Result<String, OAuthError> {
        let body = self
            .http
            .get(ME_URL)
            .query(&[("access_token", access_token)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_openid(&body).ok_or(OAuthError::Provider(body))
    }
}

/// `access_token` from a form-encoded token response
fn parse_access_token(body: &str) -> Option<String> {
    let url = Url::parse(&format!("http://token.invalid/?{}", body.trim())).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "access_token")
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())
}

/// `openid` from a `callback( {...} );` JSONP response
fn parse_openid(body: &str) -> Option<String> {
    let json = body
        .trim()
        .trim_start_matches("callback(")
        .trim_end_matches(';')
        .trim_end_matches(')')
        .trim();
    serde_json::from_str::<MeResponse>(json)
        .ok()?
        .openid
        .filter(|openid| !openid.is_empty())
}
