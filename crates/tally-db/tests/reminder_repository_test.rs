//! Integration tests for reminder persistence.
//!
//! Covers:
//! - Conditional insert refuses a second blocking reminder of the same tier
//! - Failed reminders do not block a retry
//! - Delivery events update the row carrying the provider message id
//! - Late delivery events do not revive a superseded reminder
//! - The dedup sweep against real rows
//!
//! **IMPORTANT**: These tests require a PostgreSQL database; migrations are
//! applied by the fixture.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tally_db::test_fixtures::TestDatabase;
use tally_db::{
    DedupSweep, InvoiceStatus, NewReminder, ReminderFilter, ReminderRepository, ReminderStatus,
    ReminderTier,
};

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_insert_if_absent_blocks_same_tier() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let client = test_db.client(owner, "Blocking").await;
    let due = Utc::now().date_naive() - Duration::days(10);
    let invoice = test_db
        .invoice(owner, client.id, InvoiceStatus::Sent, due)
        .await;

    let new = NewReminder {
        invoice_id: invoice.id,
        owner_id: owner,
        tier: ReminderTier::Firm,
    };
    let first = test_db.db.reminders.insert_if_absent(new).await.unwrap();
    assert!(first.is_some());
    assert_eq!(first.unwrap().status, ReminderStatus::Scheduled);

    let second = test_db.db.reminders.insert_if_absent(new).await.unwrap();
    assert!(second.is_none(), "same tier must not be inserted twice");

    // A different tier is independent.
    let other = test_db
        .db
        .reminders
        .insert_if_absent(NewReminder {
            tier: ReminderTier::Urgent,
            ..new
        })
        .await
        .unwrap();
    assert!(other.is_some());

    test_db.purge_owner(owner).await;
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_failed_reminder_allows_retry() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let client = test_db.client(owner, "Retry").await;
    let due = Utc::now().date_naive() - Duration::days(2);
    let invoice = test_db
        .invoice(owner, client.id, InvoiceStatus::Overdue, due)
        .await;

    let new = NewReminder {
        invoice_id: invoice.id,
        owner_id: owner,
        tier: ReminderTier::Friendly,
    };
    let first = test_db
        .db
        .reminders
        .insert_if_absent(new)
        .await
        .unwrap()
        .expect("first insert");
    test_db
        .db
        .reminders
        .mark_failed(first.id, "smtp timeout")
        .await
        .unwrap();

    let retry = test_db.db.reminders.insert_if_absent(new).await.unwrap();
    assert!(retry.is_some(), "failed rows must not block");

    let rows = test_db
        .db
        .reminders
        .list(ReminderFilter::for_invoice(invoice.id))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].failure_reason.as_deref(), Some("smtp timeout"));

    test_db.purge_owner(owner).await;
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_apply_delivery_by_message_id() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let client = test_db.client(owner, "Delivery").await;
    let due = Utc::now().date_naive() - Duration::days(5);
    let invoice = test_db
        .invoice(owner, client.id, InvoiceStatus::Sent, due)
        .await;

    let reminder = test_db
        .db
        .reminders
        .insert_if_absent(NewReminder {
            invoice_id: invoice.id,
            owner_id: owner,
            tier: ReminderTier::Polite,
        })
        .await
        .unwrap()
        .expect("insert");
    let message_id = format!("msg_{}", reminder.id.simple());
    test_db
        .db
        .reminders
        .mark_sent(reminder.id, &message_id, Utc::now())
        .await
        .unwrap();

    let updated = test_db
        .db
        .reminders
        .apply_delivery(&message_id, ReminderStatus::Bounced, Some("mailbox full"))
        .await
        .unwrap()
        .expect("row matched");
    assert_eq!(updated.status, ReminderStatus::Bounced);
    assert_eq!(updated.failure_reason.as_deref(), Some("mailbox full"));

    let missing = test_db
        .db
        .reminders
        .apply_delivery("msg_unknown", ReminderStatus::Delivered, None)
        .await
        .unwrap();
    assert!(missing.is_none());

    test_db.purge_owner(owner).await;
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_late_delivery_leaves_superseded_reminder_unchanged() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let client = test_db.client(owner, "Superseded").await;
    let due = Utc::now().date_naive() - Duration::days(9);
    let invoice = test_db
        .invoice(owner, client.id, InvoiceStatus::Overdue, due)
        .await;
    let reminders = &test_db.db.reminders;

    let new = NewReminder {
        invoice_id: invoice.id,
        owner_id: owner,
        tier: ReminderTier::Firm,
    };
    let first = reminders
        .insert_if_absent(new)
        .await
        .unwrap()
        .expect("first insert");
    let first_msg = format!("msg_{}", first.id.simple());
    reminders
        .mark_sent(first.id, &first_msg, Utc::now())
        .await
        .unwrap();
    reminders
        .apply_delivery(&first_msg, ReminderStatus::Bounced, Some("bounced"))
        .await
        .unwrap();

    let second = reminders
        .insert_if_absent(new)
        .await
        .unwrap()
        .expect("bounced row does not block");
    let second_msg = format!("msg_{}", second.id.simple());
    reminders
        .mark_sent(second.id, &second_msg, Utc::now())
        .await
        .unwrap();

    // Replayed delivery for the bounced row must not hit the partial index.
    let replayed = reminders
        .apply_delivery(&first_msg, ReminderStatus::Delivered, None)
        .await
        .unwrap()
        .expect("row matched");
    assert_eq!(replayed.id, first.id);
    assert_eq!(replayed.status, ReminderStatus::Bounced);

    let delivered = reminders
        .apply_delivery(&second_msg, ReminderStatus::Delivered, None)
        .await
        .unwrap()
        .expect("row matched");
    assert_eq!(delivered.status, ReminderStatus::Delivered);

    test_db.purge_owner(owner).await;
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_dedup_sweep_collapses_repeated_failures() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let client = test_db.client(owner, "Sweep").await;
    let due = Utc::now().date_naive() - Duration::days(20);
    let invoice = test_db
        .invoice(owner, client.id, InvoiceStatus::Overdue, due)
        .await;

    let new = NewReminder {
        invoice_id: invoice.id,
        owner_id: owner,
        tier: ReminderTier::Urgent,
    };
    for attempt in 0..3 {
        let row = test_db
            .db
            .reminders
            .insert_if_absent(new)
            .await
            .unwrap()
            .expect("insert");
        test_db
            .db
            .reminders
            .mark_failed(row.id, &format!("attempt {attempt}"))
            .await
            .unwrap();
    }

    let sweep = DedupSweep::new(test_db.db.reminders.clone() as Arc<dyn ReminderRepository>)
        .with_batch_size(2);
    let report = sweep.run(Some(ReminderStatus::Failed)).await.unwrap();
    assert!(report.removed >= 2);

    let rows = test_db
        .db
        .reminders
        .list(ReminderFilter::for_invoice(invoice.id))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1, "only the newest failed row survives");
    assert_eq!(rows[0].failure_reason.as_deref(), Some("attempt 2"));

    test_db.purge_owner(owner).await;
}
