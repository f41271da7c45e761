//! HTTP-level tests for the Stripe-compatible checkout provider.

use tally_providers::{
    CheckoutRequest, Error, PaymentProvider, PaymentsConfig, StripePaymentProvider,
};
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn checkout_for(invoice_id: Uuid) -> CheckoutRequest {
    CheckoutRequest {
        invoice_id,
        amount_cents: 45_000,
        currency: "USD".to_string(),
        description: "Invoice INV-0012".to_string(),
        customer_email: Some("ap@client.test".to_string()),
        success_url: "https://app.test/invoices/paid".to_string(),
        cancel_url: "https://app.test/invoices/cancel".to_string(),
    }
}

#[tokio::test]
async fn test_checkout_posts_form_and_returns_session() {
    let server = MockServer::start().await;
    let invoice_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/checkout/sessions"))
        .and(header("Authorization", "Bearer sk_test"))
        .and(header("Content-Type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("mode=payment"))
        .and(body_string_contains(format!("client_reference_id={}", invoice_id)))
        .and(body_string_contains("unit_amount%5D=45000"))
        .and(body_string_contains("currency%5D=usd"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "cs_test_abc",
            "object": "checkout.session",
            "url": "https://checkout.test/pay/cs_test_abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = StripePaymentProvider::new(
        PaymentsConfig::default()
            .with_base_url(server.uri())
            .with_api_key("sk_test"),
    )
    .expect("provider builds");

    let session = provider
        .create_checkout(&checkout_for(invoice_id))
        .await
        .expect("checkout succeeds");
    assert_eq!(session.id, "cs_test_abc");
    assert_eq!(session.url, "https://checkout.test/pay/cs_test_abc");
}

#[tokio::test]
async fn test_checkout_error_message_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/checkout/sessions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": { "type": "invalid_request_error", "message": "Invalid currency: xyz" }
        })))
        .mount(&server)
        .await;

    let provider = StripePaymentProvider::new(
        PaymentsConfig::default()
            .with_base_url(server.uri())
            .with_api_key("sk_test"),
    )
    .unwrap();

    match provider.create_checkout(&checkout_for(Uuid::new_v4())).await {
        Err(Error::Provider(msg)) => assert!(msg.contains("Invalid currency"), "{}", msg),
        other => panic!("expected provider error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_checkout_rejects_non_positive_amount_without_calling_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let provider =
        StripePaymentProvider::new(PaymentsConfig::default().with_base_url(server.uri())).unwrap();

    let mut req = checkout_for(Uuid::new_v4());
    req.amount_cents = 0;
    let err = provider.create_checkout(&req).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}
