//! Resend-compatible email delivery.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tally_core::{
    defaults, DeliveryEvent, DeliveryEventKind, EmailProvider, Error, OutboundEmail, Result,
};

use crate::http::{build_client, provider_error};

/// Configuration for the email provider.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// Bearer key; requests are sent unauthenticated when unset (local relays).
    pub api_key: Option<String>,
    /// Sender used when the account has no business profile.
    pub from_address: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::EMAIL_API_URL.to_string(),
            api_key: None,
            from_address: defaults::EMAIL_FROM.to_string(),
            timeout_seconds: defaults::EMAIL_TIMEOUT_SECS,
        }
    }
}

impl EmailConfig {
    /// Read `EMAIL_API_URL`, `EMAIL_API_KEY`, `EMAIL_FROM`, `EMAIL_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("EMAIL_API_URL")
                .unwrap_or_else(|_| defaults::EMAIL_API_URL.to_string()),
            api_key: std::env::var("EMAIL_API_KEY").ok().filter(|k| !k.is_empty()),
            from_address: std::env::var("EMAIL_FROM")
                .unwrap_or_else(|_| defaults::EMAIL_FROM.to_string()),
            timeout_seconds: std::env::var("EMAIL_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::EMAIL_TIMEOUT_SECS),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: String,
}

/// Email provider speaking the Resend `POST /emails` API.
pub struct ResendEmailProvider {
    client: Client,
    config: EmailConfig,
}

impl ResendEmailProvider {
    pub fn new(config: EmailConfig) -> Result<Self> {
        let client = build_client(config.timeout_seconds)?;
        info!(
            subsystem = "providers",
            component = "email",
            base_url = %config.base_url,
            authenticated = config.api_key.is_some(),
            "Initializing email provider"
        );
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &EmailConfig {
        &self.config
    }
}

#[async_trait]
impl EmailProvider for ResendEmailProvider {
    fn name(&self) -> &str {
        "resend"
    }

    async fn send(&self, email: &OutboundEmail) -> Result<String> {
        let url = format!("{}/emails", self.config.base_url.trim_end_matches('/'));
        let mut req = self.client.post(&url).json(&SendEmailRequest {
            from: &email.from,
            to: [&email.to],
            subject: &email.subject,
            html: &email.html,
        });
        if let Some(ref api_key) = self.config.api_key {
            req = req.bearer_auth(api_key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| Error::Provider(format!("email request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(provider_error("email provider", status, &body));
        }

        let parsed: SendEmailResponse = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("unreadable email provider response: {}", e)))?;

        debug!(
            subsystem = "providers",
            component = "email",
            message_id = %parsed.id,
            "Email accepted"
        );
        Ok(parsed.id)
    }
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    email_id: String,
    #[serde(default)]
    bounce: Option<BounceDetail>,
}

#[derive(Debug, Deserialize)]
struct BounceDetail {
    #[serde(default)]
    message: Option<String>,
}

/// Parse a delivery webhook body.
///
/// Returns `Ok(None)` for event types that do not affect reminder status
/// (`email.sent`, `email.opened`, ...). Malformed JSON is `InvalidInput`.
pub fn parse_delivery_event(body: &[u8]) -> Result<Option<DeliveryEvent>> {
    let payload: WebhookPayload = serde_json::from_slice(body)
        .map_err(|e| Error::InvalidInput(format!("malformed email webhook: {}", e)))?;

    let kind = match payload.event_type.as_str() {
        "email.delivered" => DeliveryEventKind::Delivered,
        "email.bounced" => DeliveryEventKind::Bounced,
        "email.complained" => DeliveryEventKind::Complained,
        "email.delivery_failed" | "email.failed" => DeliveryEventKind::Failed,
        _ => return Ok(None),
    };

    Ok(Some(DeliveryEvent {
        kind,
        message_id: payload.data.email_id,
        reason: payload.data.bounce.and_then(|b| b.message),
    }))
}
