//! Stripe-compatible hosted checkout.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use tally_core::{
    defaults, CheckoutRequest, CheckoutSession, Error, PaymentProvider, Result,
};

use crate::http::{build_client, provider_error};

/// Configuration for the payment provider.
#[derive(Debug, Clone)]
pub struct PaymentsConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Secret for `Stripe-Signature` verification; webhooks are rejected when unset.
    pub webhook_secret: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::PAYMENTS_API_URL.to_string(),
            api_key: None,
            webhook_secret: None,
            timeout_seconds: defaults::PAYMENTS_TIMEOUT_SECS,
        }
    }
}

impl PaymentsConfig {
    /// Read `PAYMENTS_API_URL`, `PAYMENTS_API_KEY`, `PAYMENTS_WEBHOOK_SECRET`,
    /// `PAYMENTS_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("PAYMENTS_API_URL")
                .unwrap_or_else(|_| defaults::PAYMENTS_API_URL.to_string()),
            api_key: std::env::var("PAYMENTS_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            webhook_secret: std::env::var("PAYMENTS_WEBHOOK_SECRET")
                .ok()
                .filter(|k| !k.is_empty()),
            timeout_seconds: std::env::var("PAYMENTS_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::PAYMENTS_TIMEOUT_SECS),
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

    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

/// Payment provider speaking the Stripe `POST /checkout/sessions` API.
pub struct StripePaymentProvider {
    client: Client,
    config: PaymentsConfig,
}

impl StripePaymentProvider {
    pub fn new(config: PaymentsConfig) -> Result<Self> {
        let client = build_client(config.timeout_seconds)?;
        info!(
            subsystem = "providers",
            component = "payments",
            base_url = %config.base_url,
            authenticated = config.api_key.is_some(),
            "Initializing payment provider"
        );
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &PaymentsConfig {
        &self.config
    }

    /// Form fields for a one-line payment-mode session.
    fn form_fields(req: &CheckoutRequest) -> Vec<(&'static str, String)> {
        let invoice_id = req.invoice_id.to_string();
        let mut fields = vec![
            ("mode", "payment".to_string()),
            ("success_url", req.success_url.clone()),
            ("cancel_url", req.cancel_url.clone()),
            ("client_reference_id", invoice_id.clone()),
            ("metadata[invoice_id]", invoice_id),
            ("line_items[0][quantity]", "1".to_string()),
            (
                "line_items[0][price_data][currency]",
                req.currency.to_ascii_lowercase(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                req.amount_cents.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                req.description.clone(),
            ),
        ];
        if let Some(ref email) = req.customer_email {
            fields.push(("customer_email", email.clone()));
        }
        fields
    }
}

#[async_trait]
impl PaymentProvider for StripePaymentProvider {
    fn name(&self) -> &str {
        "stripe"
    }

    async fn create_checkout(&self, req: &CheckoutRequest) -> Result<CheckoutSession> {
        if req.amount_cents <= 0 {
            return Err(Error::InvalidInput(
                "checkout amount must be positive".to_string(),
            ));
        }

        let url = format!(
            "{}/checkout/sessions",
            self.config.base_url.trim_end_matches('/')
        );
        let mut request = self.client.post(&url).form(&Self::form_fields(req));
        if let Some(ref api_key) = self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Provider(format!("payment request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(provider_error("payment provider", status, &body));
        }

        let session: SessionResponse = response.json().await.map_err(|e| {
            Error::Provider(format!("unreadable payment provider response: {}", e))
        })?;
        let url = session.url.ok_or_else(|| {
            Error::Provider(format!("checkout session {} has no url", session.id))
        })?;

        debug!(
            subsystem = "providers",
            component = "payments",
            invoice_id = %req.invoice_id,
            session_id = %session.id,
            "Checkout session created"
        );
        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }
}

/// A payment webhook event relevant to invoices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    /// A checkout session was paid.
    CheckoutCompleted {
        session_id: String,
        /// From `client_reference_id` or `metadata.invoice_id`, when parseable.
        invoice_id: Option<Uuid>,
    },
    /// Any other event type; acknowledged and ignored.
    Ignored { event_type: String },
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: SessionObject,
}

#[derive(Debug, Deserialize)]
struct SessionObject {
    id: String,
    #[serde(default)]
    client_reference_id: Option<String>,
    #[serde(default)]
    metadata: Option<SessionMetadata>,
    #[serde(default)]
    payment_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionMetadata {
    #[serde(default)]
    invoice_id: Option<String>,
}

/// Parse a payment webhook body.
///
/// `checkout.session.completed` with `payment_status` other than `paid`
/// (delayed methods) is treated as ignored.
pub fn parse_payment_event(body: &[u8]) -> Result<PaymentEvent> {
    let envelope: EventEnvelope = serde_json::from_slice(body)
        .map_err(|e| Error::InvalidInput(format!("malformed payment webhook: {}", e)))?;

    let object = envelope.data.object;
    let paid = object.payment_status.as_deref().map_or(true, |s| s == "paid");
    if envelope.event_type != "checkout.session.completed" || !paid {
        return Ok(PaymentEvent::Ignored {
            event_type: envelope.event_type,
        });
    }

    let invoice_id = object
        .client_reference_id
        .as_deref()
        .or_else(|| object.metadata.as_ref().and_then(|m| m.invoice_id.as_deref()))
        .and_then(|s| Uuid::parse_str(s).ok());

    Ok(PaymentEvent::CheckoutCompleted {
        session_id: object.id,
        invoice_id,
    })
}
