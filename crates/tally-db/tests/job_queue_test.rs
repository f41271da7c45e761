//! Integration tests for the job queue and account purge.
//!
//! **IMPORTANT**: These tests require a PostgreSQL database.

use chrono::NaiveDate;
use serde_json::json;
use tally_db::test_fixtures::TestDatabase;
use tally_db::{
    AccountRepository, ClientRepository, InvoiceStatus, JobRepository, JobStatus, JobType, Plan,
    UpsertProfileRequest,
};

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_queue_deduplicated_per_owner_and_type() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let jobs = &test_db.db.jobs;

    let first = jobs
        .queue_deduplicated(Some(owner), JobType::AccountPurge, 9, None)
        .await
        .unwrap();
    assert!(first.is_some());

    let duplicate = jobs
        .queue_deduplicated(Some(owner), JobType::AccountPurge, 9, None)
        .await
        .unwrap();
    assert!(duplicate.is_none());

    let other_owner = jobs
        .queue_deduplicated(Some(TestDatabase::owner()), JobType::AccountPurge, 9, None)
        .await
        .unwrap();
    assert!(other_owner.is_some());
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_claim_fail_and_retry() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let jobs = &test_db.db.jobs;

    let id = jobs
        .queue(
            Some(owner),
            JobType::AccountPurge,
            100,
            Some(json!({ "reason": "test" })),
        )
        .await
        .unwrap();

    let claimed = jobs
        .claim_next_for_types(&[JobType::AccountPurge])
        .await
        .unwrap()
        .expect("job available");
    assert_eq!(claimed.id, id);
    assert_eq!(claimed.status, JobStatus::Running);
    assert!(claimed.started_at.is_some());

    jobs.fail(id, "transient").await.unwrap();
    let retried = jobs.get(id).await.unwrap().unwrap();
    assert_eq!(retried.status, JobStatus::Pending);
    assert_eq!(retried.retry_count, 1);
    assert_eq!(retried.error_message.as_deref(), Some("transient"));

    jobs.claim_next_for_types(&[JobType::AccountPurge])
        .await
        .unwrap()
        .expect("retry claimable");
    jobs.complete(id, Some(json!({ "ok": true }))).await.unwrap();
    let done = jobs.get(id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.result, Some(json!({ "ok": true })));
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_purge_removes_every_owned_row() {
    let test_db = TestDatabase::new().await;
    let owner = TestDatabase::owner();
    let client = test_db.client(owner, "Purged").await;
    test_db
        .invoice(
            owner,
            client.id,
            InvoiceStatus::Sent,
            NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
        )
        .await;
    test_db
        .db
        .accounts
        .upsert_profile(
            owner,
            UpsertProfileRequest {
                business_name: "Purged Studio".to_string(),
                email: "studio@example.test".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    test_db.db.accounts.set_plan(owner, Plan::Pro).await.unwrap();
    assert_eq!(test_db.db.accounts.get_plan(owner).await.unwrap(), Plan::Pro);

    let report = test_db.db.accounts.purge(owner).await.unwrap();
    assert!(report.skipped_tables.is_empty());
    assert!(report.total_deleted() >= 4);

    assert_eq!(test_db.db.clients.count_for_owner(owner).await.unwrap(), 0);
    assert!(test_db.db.accounts.get_profile(owner).await.unwrap().is_none());
    assert_eq!(test_db.db.accounts.get_plan(owner).await.unwrap(), Plan::Free);
}
