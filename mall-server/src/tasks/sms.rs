//! SMS delivery backends

use async_trait::async_trait;
use serde::Serialize;

use crate::BoxError;

#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Deliver `code` to `mobile`, valid for `ttl_minutes`
    async fn send(&self, mobile: &str, code: &str, ttl_minutes: u64) -> Result<(), BoxError>;
}

/// Writes codes to the log instead of sending them; development only
#[derive(Debug, Default)]
pub struct LogSmsSender;

#[async_trait]
impl SmsSender for LogSmsSender {
    async fn send(&self, mobile: &str, code: &str, ttl_minutes: u64) -> Result<(), BoxError> {
        tracing::info!(mobile, code, ttl_minutes, "SMS code (log sender)");
        Ok(())
    }
}

#[derive(Serialize)]
struct GatewayRequest<'a> {
    mobile: &'a str,
    template_id: &'a str,
    params: [String; 2],
}

/// Posts codes to an HTTP SMS gateway
pub struct HttpSmsSender {
    client: reqwest::Client,
    url: String,
    template_id: String,
}

impl HttpSmsSender {
    pub fn new(url: impl Into<String>, template_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            template_id: template_id.into(),
        }
    }
}

#[async_trait]
impl SmsSender for HttpSmsSender {
    async fn send(&self, mobile: &str, code: &str, ttl_minutes: u64) -> Result<(), BoxError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&GatewayRequest {
                mobile,
                template_id: &self.template_id,
                params: [code.to_string(), ttl_minutes.to_string()],
            })
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("SMS gateway returned {status}: {body}").into());
        }
        Ok(())
    }
}
