//! Integration tests for clients, invoices and estimates.
//!
//! **IMPORTANT**: These tests require a PostgreSQL database.

use chrono::{Duration, NaiveDate, Utc};
use tally_db::test_fixtures::TestDatabase;
use tally_db::{
    billing, ClientRepository, CreateEstimateRequest, Error, EstimateRepository, EstimateStatus,
    InvoiceRepository, InvoiceStatus, LineItem, ListInvoicesRequest,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_invoice_numbers_are_sequential_per_owner() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let other = TestDatabase::owner();
    let client = test_db.client(owner, "Numbering").await;
    let other_client = test_db.client(other, "Elsewhere").await;
    let due = date(2026, 3, 1);

    let first = test_db
        .invoice(owner, client.id, InvoiceStatus::Draft, due)
        .await;
    let second = test_db
        .invoice(owner, client.id, InvoiceStatus::Draft, due)
        .await;
    let foreign = test_db
        .invoice(other, other_client.id, InvoiceStatus::Draft, due)
        .await;

    assert_eq!(first.invoice_number, "INV-0001");
    assert_eq!(second.invoice_number, "INV-0002");
    assert_eq!(foreign.invoice_number, "INV-0001");
    assert_eq!(first.line_items.len(), 1);
    assert_eq!(first.total_cents, 120_000);

    test_db.purge_owner(owner).await;
    test_db.purge_owner(other).await;
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_invoice_scoped_to_owner() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let intruder = TestDatabase::owner();
    let client = test_db.client(owner, "Scoped").await;
    let invoice = test_db
        .invoice(owner, client.id, InvoiceStatus::Sent, date(2026, 3, 1))
        .await;

    let err = test_db
        .db
        .invoices
        .fetch(intruder, invoice.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvoiceNotFound(id) if id == invoice.id));

    let listed = test_db
        .db
        .invoices
        .list(intruder, ListInvoicesRequest::default())
        .await
        .unwrap();
    assert!(listed.is_empty());

    test_db.purge_owner(owner).await;
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_status_transitions_and_overdue_marking() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let client = test_db.client(owner, "Lifecycle").await;
    let today = Utc::now().date_naive();
    let invoice = test_db
        .invoice(owner, client.id, InvoiceStatus::Draft, today - Duration::days(3))
        .await;

    let sent = billing::transition_invoice(
        test_db.db.invoices.as_ref(),
        owner,
        invoice.id,
        InvoiceStatus::Sent,
        Utc::now(),
    )
    .await
    .unwrap();
    assert_eq!(sent.status, InvoiceStatus::Sent);
    assert!(sent.sent_at.is_some());

    let marked = test_db.db.invoices.mark_overdue(today).await.unwrap();
    assert!(marked >= 1);
    let reloaded = test_db.db.invoices.fetch(owner, invoice.id).await.unwrap();
    assert_eq!(reloaded.status, InvoiceStatus::Overdue);

    let candidates = test_db
        .db
        .invoices
        .list_reminder_candidates(today)
        .await
        .unwrap();
    let candidate = candidates
        .iter()
        .find(|c| c.invoice.id == invoice.id)
        .expect("overdue invoice is a reminder candidate");
    assert_eq!(candidate.client_email, "lifecycle@example.test");

    let err = billing::transition_invoice(
        test_db.db.invoices.as_ref(),
        owner,
        invoice.id,
        InvoiceStatus::Sent,
        Utc::now(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::InvalidTransition(_)));

    test_db.purge_owner(owner).await;
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_client_with_invoices_cannot_be_deleted() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let client = test_db.client(owner, "Referenced").await;
    test_db
        .invoice(owner, client.id, InvoiceStatus::Draft, date(2026, 3, 1))
        .await;

    let err = test_db
        .db
        .clients
        .delete(owner, client.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    test_db.purge_owner(owner).await;
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_estimate_conversion_links_invoice() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let client = test_db.client(owner, "Quote").await;
    let today = Utc::now().date_naive();

    let new = tally_db::validation::prepare_estimate(
        owner,
        CreateEstimateRequest {
            client_id: client.id,
            line_items: vec![LineItem {
                description: "Logo design".to_string(),
                quantity: 1,
                unit_price_cents: 80_000,
            }],
            ..Default::default()
        },
        today,
    )
    .unwrap();
    let estimate = test_db.db.estimates.insert(new).await.unwrap();
    assert_eq!(estimate.estimate_number, "EST-0001");

    billing::transition_estimate(
        test_db.db.estimates.as_ref(),
        owner,
        estimate.id,
        EstimateStatus::Sent,
    )
    .await
    .unwrap();

    let invoice = billing::convert_estimate(
        test_db.db.estimates.as_ref(),
        test_db.db.invoices.as_ref(),
        owner,
        estimate.id,
        today,
    )
    .await
    .unwrap();
    assert_eq!(invoice.total_cents, 80_000);

    let converted = test_db.db.estimates.fetch(owner, estimate.id).await.unwrap();
    assert_eq!(converted.status, EstimateStatus::Converted);
    assert_eq!(converted.converted_invoice_id, Some(invoice.id));

    let count = test_db.db.clients.count_for_owner(owner).await.unwrap();
    assert_eq!(count, 1);

    test_db.purge_owner(owner).await;
}
