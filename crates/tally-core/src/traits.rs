//! Core traits for tally abstractions.
//!
//! One repository trait per entity, plus the two external provider
//! contracts. Concrete PostgreSQL implementations live in `tally-db`,
//! HTTP providers in `tally-providers`, and in-memory versions in
//! [`crate::memory`].

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// CLIENT REPOSITORY
// =============================================================================

/// Repository for client CRUD, scoped by owner.
#[async_trait]
pub trait ClientRepository: Send + Sync {
    /// Insert a new client.
    async fn insert(&self, owner_id: Uuid, req: CreateClientRequest) -> Result<Client>;

    /// Fetch a client owned by `owner_id`. Missing rows yield `Error::ClientNotFound`.
    async fn fetch(&self, owner_id: Uuid, id: Uuid) -> Result<Client>;

    /// List clients ordered by name.
    async fn list(&self, owner_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Client>>;

    /// Apply a partial update and return the new row.
    async fn update(&self, owner_id: Uuid, id: Uuid, req: UpdateClientRequest) -> Result<Client>;

    /// Delete a client.
    async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<()>;

    /// Number of clients an owner has (plan usage).
    async fn count_for_owner(&self, owner_id: Uuid) -> Result<i64>;
}

// =============================================================================
// INVOICE REPOSITORY
// =============================================================================

/// Repository for invoices.
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Insert a validated invoice, assigning its id and per-owner number.
    async fn insert(&self, invoice: NewInvoice) -> Result<Invoice>;

    /// Fetch an invoice owned by `owner_id`. Missing rows yield `Error::InvoiceNotFound`.
    async fn fetch(&self, owner_id: Uuid, id: Uuid) -> Result<Invoice>;

    /// List an owner's invoices, newest first.
    async fn list(&self, owner_id: Uuid, req: ListInvoicesRequest) -> Result<Vec<Invoice>>;

    /// Conditionally move an invoice to `next`.
    ///
    /// Only updates when the current status is one of `expected`; returns
    /// `None` when no row matched. Sets `sent_at`/`paid_at` as appropriate.
    async fn update_status(
        &self,
        id: Uuid,
        expected: &[InvoiceStatus],
        next: InvoiceStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Invoice>>;

    /// Move every `sent` invoice with `due_date < today` to `overdue`.
    async fn mark_overdue(&self, today: NaiveDate) -> Result<u64>;

    /// Reminder-eligible invoices due before `today`, with client contact details.
    async fn list_reminder_candidates(&self, today: NaiveDate) -> Result<Vec<ReminderCandidate>>;

    /// A single invoice with client contact details.
    async fn reminder_candidate(&self, id: Uuid) -> Result<Option<ReminderCandidate>>;

    /// Invoices created by an owner at or after `since` (plan usage).
    async fn count_created_since(&self, owner_id: Uuid, since: DateTime<Utc>) -> Result<i64>;

    /// Record the payment provider's checkout session for an invoice.
    async fn set_checkout_session(&self, id: Uuid, session_id: &str) -> Result<()>;

    /// Find the invoice a checkout session was created for.
    async fn find_by_checkout_session(&self, session_id: &str) -> Result<Option<Invoice>>;
}

// =============================================================================
// ESTIMATE REPOSITORY
// =============================================================================

/// Repository for estimates.
#[async_trait]
pub trait EstimateRepository: Send + Sync {
    async fn insert(&self, estimate: NewEstimate) -> Result<Estimate>;

    async fn fetch(&self, owner_id: Uuid, id: Uuid) -> Result<Estimate>;

    async fn list(
        &self,
        owner_id: Uuid,
        status: Option<EstimateStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Estimate>>;

    /// Conditionally move an estimate to `next`; `None` when no row matched.
    async fn update_status(
        &self,
        id: Uuid,
        expected: &[EstimateStatus],
        next: EstimateStatus,
    ) -> Result<Option<Estimate>>;

    /// Link a converted estimate to the invoice created from it.
    async fn set_converted_invoice(&self, id: Uuid, invoice_id: Uuid) -> Result<()>;
}

// =============================================================================
// REMINDER REPOSITORY
// =============================================================================

/// Filter for reminder listings. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ReminderFilter {
    pub owner_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub status: Option<ReminderStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ReminderFilter {
    pub fn for_invoice(invoice_id: Uuid) -> Self {
        Self {
            invoice_id: Some(invoice_id),
            ..Default::default()
        }
    }
}

/// Repository for reminder rows.
#[async_trait]
pub trait ReminderRepository: Send + Sync {
    /// Insert a `scheduled` reminder unless the invoice already has one of
    /// the same tier in a blocking status. Returns `None` when skipped.
    async fn insert_if_absent(&self, reminder: NewReminder) -> Result<Option<Reminder>>;

    /// List reminders matching `filter`, newest first.
    async fn list(&self, filter: ReminderFilter) -> Result<Vec<Reminder>>;

    /// Delete reminders by id, returning the number removed.
    async fn delete_ids(&self, ids: &[Uuid]) -> Result<u64>;

    /// Record a successful hand-off to the email provider.
    async fn mark_sent(&self, id: Uuid, message_id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Record a failed hand-off to the email provider.
    async fn mark_failed(&self, id: Uuid, reason: &str) -> Result<()>;

    /// Apply a delivery event to the reminder carrying `message_id`.
    ///
    /// Returns the updated row, or `None` when no reminder has that id.
    async fn apply_delivery(
        &self,
        message_id: &str,
        status: ReminderStatus,
        reason: Option<&str>,
    ) -> Result<Option<Reminder>>;
}

// =============================================================================
// ACCOUNT REPOSITORY
// =============================================================================

/// Repository for per-account data: profile, plan, purge.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn get_profile(&self, owner_id: Uuid) -> Result<Option<BusinessProfile>>;

    async fn upsert_profile(
        &self,
        owner_id: Uuid,
        req: UpsertProfileRequest,
    ) -> Result<BusinessProfile>;

    /// Current plan; accounts without a subscription row are on `Plan::Free`.
    async fn get_plan(&self, owner_id: Uuid) -> Result<Plan>;

    /// Delete every row belonging to the account.
    async fn purge(&self, owner_id: Uuid) -> Result<PurgeReport>;
}

// =============================================================================
// JOB REPOSITORY
// =============================================================================

/// Repository for the background job queue.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Queue a new job.
    async fn queue(
        &self,
        owner_id: Option<Uuid>,
        job_type: JobType,
        priority: i32,
        payload: Option<JsonValue>,
    ) -> Result<Uuid>;

    /// Queue a job unless one of the same type (and owner) is pending or running.
    async fn queue_deduplicated(
        &self,
        owner_id: Option<Uuid>,
        job_type: JobType,
        priority: i32,
        payload: Option<JsonValue>,
    ) -> Result<Option<Uuid>>;

    /// Claim the next pending job whose type is in `job_types`.
    /// An empty slice means "claim any type".
    async fn claim_next_for_types(&self, job_types: &[JobType]) -> Result<Option<Job>>;

    /// Mark job as completed.
    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()>;

    /// Mark job as failed, re-queueing it while retries remain.
    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()>;

    /// Get job by ID.
    async fn get(&self, job_id: Uuid) -> Result<Option<Job>>;

    /// Get pending jobs count.
    async fn pending_count(&self) -> Result<i64>;
}

// =============================================================================
// EXTERNAL PROVIDERS
// =============================================================================

/// Outbound email delivery (reminder dispatch).
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Hand an email to the provider; returns the provider message id.
    async fn send(&self, email: &OutboundEmail) -> Result<String>;
}

/// Hosted payment checkout.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Create a checkout session for an invoice payment.
    async fn create_checkout(&self, req: &CheckoutRequest) -> Result<CheckoutSession>;
}
