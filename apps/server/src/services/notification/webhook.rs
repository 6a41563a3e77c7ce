//! Webhook event publisher.
//!
//! Sends each event as an HTTP POST with a JSON body. When a secret is
//! configured the body is signed with HMAC-SHA256.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::EventPublisher;
use crate::error::{AppError, AppResult};
use crate::models::JobEvent;

type HmacSha256 = Hmac<Sha256>;

/// Webhook event publisher
pub struct WebhookPublisher {
    client: reqwest::Client,
    url: String,
    secret: Option<String>,
}

impl WebhookPublisher {
    /// Creates a publisher after validating the target URL
    pub fn new(url: &str, secret: Option<String>) -> AppResult<Self> {
        Self::validate_url(url)?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
            secret,
        })
    }

    /// Only absolute http(s) URLs are accepted
    pub fn validate_url(url: &str) -> AppResult<()> {
        let parsed = url::Url::parse(url)
            .map_err(|_| AppError::invalid("webhook_url", "Invalid webhook URL format"))?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(AppError::invalid(
                "webhook_url",
                "Webhook URL must use HTTP or HTTPS",
            ));
        }

        Ok(())
    }

    /// Hex HMAC-SHA256 over `"{timestamp}.{body}"`
    pub fn generate_signature(secret: &str, timestamp: &str, payload: &[u8]) -> String {
        let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
            Ok(mac) => mac,
            // HMAC accepts keys of any length
            Err(_) => return String::new(),
        };
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }
}

#[async_trait]
impl EventPublisher for WebhookPublisher {
    async fn publish(&self, event: &JobEvent) -> AppResult<()> {
        let body = serde_json::to_vec(event)
            .map_err(|e| AppError::Internal(format!("Failed to serialize event: {}", e)))?;

        let timestamp = Utc::now().timestamp().to_string();

        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("X-Eduforge-Event", event.name())
            .header("X-Eduforge-Timestamp", &timestamp)
            .header("X-Eduforge-Job-ID", event.job_id().to_string());

        if let Some(ref secret) = self.secret {
            let signature = Self::generate_signature(secret, &timestamp, &body);
            request = request.header("X-Eduforge-Signature", format!("sha256={}", signature));
        }

        let response = request.body(body).send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                "Request timed out".to_string()
            } else if e.is_connect() {
                "Connection failed".to_string()
            } else {
                format!("Request failed: {}", e)
            };
            AppError::Internal(format!("Webhook delivery failed: {}", reason))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(if error_body.is_empty() {
                format!("Webhook returned HTTP {}", status.as_u16())
            } else {
                format!("Webhook returned HTTP {}: {}", status.as_u16(), error_body)
            }));
        }

        log::debug!("Delivered {} for job {}", event.name(), event.job_id());
        Ok(())
    }
}
