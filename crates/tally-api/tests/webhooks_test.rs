//! Email delivery and payment webhooks.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use serde_json::json;

use common::{id_of, TestApp, PAYMENTS_SECRET};
use tally_api::ApiConfig;
use tally_core::memory::sample_reminder;
use tally_core::{InvoiceRepository, Plan, ReminderStatus};
use tally_providers::sign_hex;

fn webhook(uri: &str, body: &str, signature: Option<(&str, String)>) -> Request<Body> {
    let mut builder = Request::post(uri).header("content-type", "application/json");
    if let Some((name, value)) = signature {
        builder = builder.header(name, value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn stripe_header(body: &str, timestamp: i64) -> String {
    let signed = format!("{}.{}", timestamp, body);
    format!(
        "t={},v1={}",
        timestamp,
        sign_hex(PAYMENTS_SECRET, signed.as_bytes()).unwrap()
    )
}

#[tokio::test]
async fn test_email_bounce_updates_reminder() {
    let app = TestApp::new();
    let mut reminder = sample_reminder(ReminderStatus::Sent);
    reminder.provider_message_id = Some("msg_bounce_1".to_string());
    app.store.seed_reminder(reminder.clone());

    let body = json!({
        "type": "email.bounced",
        "data": { "email_id": "msg_bounce_1", "bounce": { "message": "mailbox full" } }
    })
    .to_string();
    let (status, outcome) = app
        .send(webhook("/api/v1/webhooks/email", &body, None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["matched"], true);

    let stored = &app.store.all_reminders()[0];
    assert_eq!(stored.status, ReminderStatus::Bounced);
    assert_eq!(stored.failure_reason.as_deref(), Some("mailbox full"));
}

#[tokio::test]
async fn test_email_unknown_message_and_event_type() {
    let app = TestApp::new();

    let body = json!({ "type": "email.delivered", "data": { "email_id": "msg_nobody" } })
        .to_string();
    let (status, outcome) = app
        .send(webhook("/api/v1/webhooks/email", &body, None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["matched"], false);

    let body = json!({ "type": "email.opened", "data": { "email_id": "msg_nobody" } }).to_string();
    let (status, outcome) = app
        .send(webhook("/api/v1/webhooks/email", &body, None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["ignored"], true);
}

#[tokio::test]
async fn test_email_signature_enforced_when_configured() {
    let secret = "email-hook-secret";
    let app = TestApp::with_config(
        ApiConfig::default()
            .with_rate_limit(tally_api::RateLimitConfig::disabled())
            .with_email_webhook_secret(secret),
    );
    let body = json!({ "type": "email.delivered", "data": { "email_id": "msg_1" } }).to_string();

    let (status, _) = app
        .send(webhook("/api/v1/webhooks/email", &body, None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(webhook(
            "/api/v1/webhooks/email",
            &body,
            Some(("x-webhook-signature", "sha256=00ff".to_string())),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let signature = format!("sha256={}", sign_hex(secret, body.as_bytes()).unwrap());
    let (status, _) = app
        .send(webhook(
            "/api/v1/webhooks/email",
            &body,
            Some(("x-webhook-signature", signature)),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_checkout_then_payment_webhook_settles_invoice() {
    let app = TestApp::new();
    let owner = app.owner(Plan::Pro);
    let client_id = app.create_client(owner, "Hooli").await;
    let (_, invoice) = app.create_invoice(owner, client_id).await;
    let invoice_id = id_of(&invoice);

    // Drafts cannot be paid online.
    let checkout_uri = format!("/api/v1/invoices/{}/checkout", invoice_id);
    let (status, _) = app.post(owner, &checkout_uri, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.post(owner, &format!("/api/v1/invoices/{}/send", invoice_id), json!({}))
        .await;
    let (status, session) = app.post(owner, &checkout_uri, json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    let session_id = session["id"].as_str().unwrap().to_string();

    let body = json!({
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": session_id,
            "client_reference_id": invoice_id,
            "payment_status": "paid"
        } }
    })
    .to_string();
    let now = Utc::now().timestamp();

    let (status, _) = app
        .send(webhook("/api/v1/webhooks/payments", &body, None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    for _ in 0..2 {
        let (status, outcome) = app
            .send(webhook(
                "/api/v1/webhooks/payments",
                &body,
                Some(("stripe-signature", stripe_header(&body, now))),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["matched"], true);
        assert_eq!(outcome["status"], "paid");
    }

    let stored = InvoiceRepository::fetch(app.store.as_ref(), owner, invoice_id)
        .await
        .unwrap();
    assert!(stored.paid_at.is_some());
}

#[tokio::test]
async fn test_payment_webhook_stale_timestamp_and_unknown_session() {
    let app = TestApp::new();
    let body = json!({
        "type": "checkout.session.completed",
        "data": { "object": { "id": "cs_unknown", "payment_status": "paid" } }
    })
    .to_string();

    let stale = (Utc::now() - Duration::minutes(10)).timestamp();
    let (status, _) = app
        .send(webhook(
            "/api/v1/webhooks/payments",
            &body,
            Some(("stripe-signature", stripe_header(&body, stale))),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, outcome) = app
        .send(webhook(
            "/api/v1/webhooks/payments",
            &body,
            Some(("stripe-signature", stripe_header(&body, Utc::now().timestamp()))),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["matched"], false);

    let ignored = json!({
        "type": "invoice.created",
        "data": { "object": { "id": "in_1" } }
    })
    .to_string();
    let (status, outcome) = app
        .send(webhook(
            "/api/v1/webhooks/payments",
            &ignored,
            Some(("stripe-signature", stripe_header(&ignored, Utc::now().timestamp()))),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["ignored"], true);
}
