//! Inbound provider webhooks. Both read the raw body so signatures are
//! checked over the exact bytes sent.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value as JsonValue};
use tracing::{info, warn};

use tally_core::billing::settle_invoice;
use tally_core::reminders::delivery::apply_delivery_event;
use tally_providers::{
    parse_delivery_event, parse_payment_event, verify_email_signature, verify_stripe_signature,
    PaymentEvent,
};

use crate::{ApiError, AppState};

pub const EMAIL_SIGNATURE_HEADER: &str = "x-webhook-signature";
pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Email delivery events (delivered, bounced, complained, failed).
pub async fn email_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<JsonValue>, ApiError> {
    if let Some(secret) = &state.webhooks.email {
        verify_email_signature(secret, &body, header(&headers, EMAIL_SIGNATURE_HEADER))?;
    }

    let Some(event) = parse_delivery_event(&body)? else {
        return Ok(Json(json!({ "ignored": true })));
    };
    let outcome = apply_delivery_event(state.repos.reminders.as_ref(), &event).await?;
    Ok(Json(serde_json::to_value(outcome).map_err(|e| {
        ApiError::Internal(tally_core::Error::Serialization(e.to_string()))
    })?))
}

/// Payment events. Without a configured secret every call is rejected.
pub async fn payments_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<JsonValue>, ApiError> {
    let Some(secret) = &state.webhooks.payments else {
        warn!(subsystem = "api", "Payment webhook received but no secret is configured");
        return Err(ApiError::Unauthorized(
            "payment webhooks are not configured".to_string(),
        ));
    };
    verify_stripe_signature(
        secret,
        &body,
        header(&headers, STRIPE_SIGNATURE_HEADER),
        Utc::now().timestamp(),
    )?;

    let (session_id, invoice_hint) = match parse_payment_event(&body)? {
        PaymentEvent::CheckoutCompleted {
            session_id,
            invoice_id,
        } => (session_id, invoice_id),
        PaymentEvent::Ignored { event_type } => {
            return Ok(Json(json!({ "ignored": true, "type": event_type })));
        }
    };

    let Some(invoice) = state
        .repos
        .invoices
        .find_by_checkout_session(&session_id)
        .await?
    else {
        warn!(
            subsystem = "api",
            session_id = %session_id,
            invoice_id = ?invoice_hint,
            "Checkout completed for unknown session"
        );
        return Ok(Json(json!({ "matched": false })));
    };

    let invoice = settle_invoice(state.repos.invoices.as_ref(), invoice, Utc::now()).await?;
    info!(
        subsystem = "api",
        invoice_id = %invoice.id,
        session_id = %session_id,
        "Invoice settled by payment webhook"
    );
    Ok(Json(json!({ "matched": true, "invoice_id": invoice.id, "status": invoice.status })))
}
