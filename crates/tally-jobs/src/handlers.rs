//! Handlers for each job type.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use tally_core::{
    AccountRepository, DedupSweep, InvoiceRepository, JobType, ReminderRunner, ReminderStatus,
};

use crate::handler::{JobContext, JobHandler, JobResult};

/// Payload shared by the reminder and overdue jobs.
///
/// `today` defaults to the current UTC date; it is only set explicitly by
/// backfills and tests.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ScanPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub today: Option<NaiveDate>,
}

impl ScanPayload {
    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }
}

/// Payload for the dedup sweep.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DedupPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ReminderStatus>,
}

/// Evaluates due invoices and sends reminders.
///
/// Runs for every account, or only the job's owner when one is set on the
/// job row or in the payload.
pub struct ReminderScanHandler {
    runner: ReminderRunner,
}

impl ReminderScanHandler {
    pub fn new(runner: ReminderRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl JobHandler for ReminderScanHandler {
    fn job_type(&self) -> JobType {
        JobType::ReminderScan
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let payload: ScanPayload = match ctx.payload_as() {
            Ok(p) => p,
            Err(e) => return JobResult::Failed(e.to_string()),
        };
        let today = payload.today();

        let outcome = match payload.owner_id.or(ctx.owner_id()) {
            Some(owner_id) => self.runner.run_scan_for_owner(owner_id, today).await,
            None => self.runner.run_scan(today).await,
        };
        ctx.report_progress(100, Some("scan finished"));
        JobResult::from_report(outcome)
    }
}

/// Collapses duplicate reminder rows.
pub struct ReminderDedupHandler {
    sweep: Arc<DedupSweep>,
}

impl ReminderDedupHandler {
    pub fn new(sweep: Arc<DedupSweep>) -> Self {
        Self { sweep }
    }
}

#[async_trait]
impl JobHandler for ReminderDedupHandler {
    fn job_type(&self) -> JobType {
        JobType::ReminderDedup
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let payload: DedupPayload = match ctx.payload_as() {
            Ok(p) => p,
            Err(e) => return JobResult::Failed(e.to_string()),
        };
        JobResult::from_report(self.sweep.run(payload.status).await)
    }
}

#[derive(Debug, Serialize)]
struct OverdueReport {
    marked: u64,
    today: NaiveDate,
}

/// Moves `sent` invoices past their due date to `overdue`.
pub struct OverdueMarkingHandler {
    invoices: Arc<dyn InvoiceRepository>,
}

impl OverdueMarkingHandler {
    pub fn new(invoices: Arc<dyn InvoiceRepository>) -> Self {
        Self { invoices }
    }
}

#[async_trait]
impl JobHandler for OverdueMarkingHandler {
    fn job_type(&self) -> JobType {
        JobType::OverdueMarking
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let payload: ScanPayload = match ctx.payload_as() {
            Ok(p) => p,
            Err(e) => return JobResult::Failed(e.to_string()),
        };
        let today = payload.today();
        let start = Instant::now();

        let outcome = self.invoices.mark_overdue(today).await.map(|marked| {
            info!(
                subsystem = "jobs",
                component = "overdue",
                marked,
                %today,
                duration_ms = start.elapsed().as_millis() as u64,
                "Overdue marking finished"
            );
            OverdueReport { marked, today }
        });
        JobResult::from_report(outcome)
    }
}

/// Deletes every row an account owns.
pub struct AccountPurgeHandler {
    accounts: Arc<dyn AccountRepository>,
}

impl AccountPurgeHandler {
    pub fn new(accounts: Arc<dyn AccountRepository>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl JobHandler for AccountPurgeHandler {
    fn job_type(&self) -> JobType {
        JobType::AccountPurge
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let payload: ScanPayload = match ctx.payload_as() {
            Ok(p) => p,
            Err(e) => return JobResult::Failed(e.to_string()),
        };
        let Some(owner_id) = ctx.owner_id().or(payload.owner_id) else {
            warn!(subsystem = "jobs", job_id = %ctx.job.id, "Purge job has no owner");
            return JobResult::Failed("account purge requires an owner".to_string());
        };
        JobResult::from_report(self.accounts.purge(owner_id).await)
    }
}
