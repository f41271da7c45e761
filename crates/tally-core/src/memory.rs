//! In-memory implementations of the repository and provider traits.
//!
//! Used by unit tests across the workspace so reminder, limit and job logic
//! can run without PostgreSQL or network access.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::defaults;
use crate::error::{Error, Result};
use crate::models::*;
use crate::traits::*;
use crate::uuid_utils::new_v7;

#[derive(Default)]
struct State {
    clients: HashMap<Uuid, Client>,
    invoices: HashMap<Uuid, Invoice>,
    estimates: HashMap<Uuid, Estimate>,
    reminders: Vec<Reminder>,
    profiles: HashMap<Uuid, BusinessProfile>,
    plans: HashMap<Uuid, Plan>,
    jobs: Vec<Job>,
    invoice_seq: HashMap<Uuid, u32>,
    estimate_seq: HashMap<Uuid, u32>,
}

/// Single store implementing every repository trait.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_plan(&self, owner_id: Uuid, plan: Plan) {
        self.state().plans.insert(owner_id, plan);
    }

    /// Insert a reminder row verbatim, bypassing the blocking-status check.
    pub fn seed_reminder(&self, reminder: Reminder) {
        self.state().reminders.push(reminder);
    }

    pub fn all_reminders(&self) -> Vec<Reminder> {
        self.state().reminders.clone()
    }

    pub fn all_jobs(&self) -> Vec<Job> {
        self.state().jobs.clone()
    }

    pub async fn seed_client(&self, owner_id: Uuid, req: CreateClientRequest) -> Client {
        let now = Utc::now();
        let client = Client {
            id: new_v7(),
            owner_id,
            name: req.name,
            email: req.email,
            company: req.company,
            address: req.address,
            created_at: now,
            updated_at: now,
        };
        self.state().clients.insert(client.id, client.clone());
        client
    }

    /// Insert a single-line invoice in `status` due on `due_date`.
    pub async fn seed_invoice(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
        status: InvoiceStatus,
        due_date: NaiveDate,
    ) -> Invoice {
        let line_items = vec![LineItem {
            description: "Consulting".to_string(),
            quantity: 10,
            unit_price_cents: 12_000,
        }];
        let mut invoice = self.insert_invoice(NewInvoice {
            owner_id,
            client_id,
            currency: defaults::CURRENCY.to_string(),
            issue_date: due_date - Duration::days(defaults::PAYMENT_TERMS_DAYS),
            due_date,
            totals: DocumentTotals {
                subtotal_cents: 120_000,
                tax_cents: 0,
                total_cents: 120_000,
            },
            line_items,
            tax_rate_bps: 0,
            notes: None,
        });
        if status != InvoiceStatus::Draft {
            let mut state = self.state();
            if let Some(stored) = state.invoices.get_mut(&invoice.id) {
                stored.status = status;
                stored.sent_at = Some(Utc::now());
                if status == InvoiceStatus::Paid {
                    stored.paid_at = Some(Utc::now());
                }
                invoice = stored.clone();
            }
        }
        invoice
    }

    fn insert_invoice(&self, new: NewInvoice) -> Invoice {
        let mut state = self.state();
        let seq = {
            let counter = state.invoice_seq.entry(new.owner_id).or_insert(0);
            *counter += 1;
            *counter
        };
        let now = Utc::now();
        let invoice = Invoice {
            id: new_v7(),
            owner_id: new.owner_id,
            client_id: new.client_id,
            invoice_number: format!("INV-{:04}", seq),
            status: InvoiceStatus::Draft,
            currency: new.currency,
            issue_date: new.issue_date,
            due_date: new.due_date,
            line_items: new.line_items,
            tax_rate_bps: new.tax_rate_bps,
            subtotal_cents: new.totals.subtotal_cents,
            tax_cents: new.totals.tax_cents,
            total_cents: new.totals.total_cents,
            notes: new.notes,
            checkout_session_id: None,
            sent_at: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        state.invoices.insert(invoice.id, invoice.clone());
        invoice
    }

    fn candidate(state: &State, invoice: &Invoice) -> Option<ReminderCandidate> {
        state
            .clients
            .get(&invoice.client_id)
            .map(|client| ReminderCandidate {
                invoice: invoice.clone(),
                client_name: client.name.clone(),
                client_email: client.email.clone(),
            })
    }
}

fn paged<T>(items: Vec<T>, limit: Option<i64>, offset: Option<i64>) -> Vec<T> {
    let offset = offset.unwrap_or(0).max(0) as usize;
    let limit = limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
    items.into_iter().skip(offset).take(limit).collect()
}

#[async_trait]
impl ClientRepository for InMemoryStore {
    async fn insert(&self, owner_id: Uuid, req: CreateClientRequest) -> Result<Client> {
        Ok(self.seed_client(owner_id, req).await)
    }

    async fn fetch(&self, owner_id: Uuid, id: Uuid) -> Result<Client> {
        self.state()
            .clients
            .get(&id)
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .ok_or(Error::ClientNotFound(id))
    }

    async fn list(&self, owner_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Client>> {
        let mut clients: Vec<Client> = self
            .state()
            .clients
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        clients.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(paged(clients, Some(limit), Some(offset)))
    }

    async fn update(&self, owner_id: Uuid, id: Uuid, req: UpdateClientRequest) -> Result<Client> {
        let mut state = self.state();
        let client = state
            .clients
            .get_mut(&id)
            .filter(|c| c.owner_id == owner_id)
            .ok_or(Error::ClientNotFound(id))?;
        if let Some(name) = req.name {
            client.name = name;
        }
        if let Some(email) = req.email {
            client.email = email;
        }
        if let Some(company) = req.company {
            client.company = Some(company).filter(|c| !c.is_empty());
        }
        if let Some(address) = req.address {
            client.address = Some(address).filter(|a| !a.is_empty());
        }
        client.updated_at = Utc::now();
        Ok(client.clone())
    }

    async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<()> {
        let mut state = self.state();
        match state.clients.get(&id) {
            Some(c) if c.owner_id == owner_id => {}
            _ => return Err(Error::ClientNotFound(id)),
        }
        let referenced = state.invoices.values().any(|i| i.client_id == id)
            || state.estimates.values().any(|e| e.client_id == id);
        if referenced {
            return Err(Error::InvalidInput(
                "client still has invoices or estimates".to_string(),
            ));
        }
        state.clients.remove(&id);
        Ok(())
    }

    async fn count_for_owner(&self, owner_id: Uuid) -> Result<i64> {
        Ok(self
            .state()
            .clients
            .values()
            .filter(|c| c.owner_id == owner_id)
            .count() as i64)
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryStore {
    async fn insert(&self, invoice: NewInvoice) -> Result<Invoice> {
        {
            let state = self.state();
            let owns_client = state
                .clients
                .get(&invoice.client_id)
                .is_some_and(|c| c.owner_id == invoice.owner_id);
            if !owns_client {
                return Err(Error::ClientNotFound(invoice.client_id));
            }
        }
        Ok(self.insert_invoice(invoice))
    }

    async fn fetch(&self, owner_id: Uuid, id: Uuid) -> Result<Invoice> {
        self.state()
            .invoices
            .get(&id)
            .filter(|i| i.owner_id == owner_id)
            .cloned()
            .ok_or(Error::InvoiceNotFound(id))
    }

    async fn list(&self, owner_id: Uuid, req: ListInvoicesRequest) -> Result<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = self
            .state()
            .invoices
            .values()
            .filter(|i| i.owner_id == owner_id)
            .filter(|i| req.status.map_or(true, |s| i.status == s))
            .filter(|i| req.client_id.map_or(true, |c| i.client_id == c))
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paged(invoices, req.limit, req.offset))
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: &[InvoiceStatus],
        next: InvoiceStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Invoice>> {
        let mut state = self.state();
        let Some(invoice) = state.invoices.get_mut(&id) else {
            return Ok(None);
        };
        if !expected.contains(&invoice.status) {
            return Ok(None);
        }
        invoice.status = next;
        match next {
            InvoiceStatus::Sent => invoice.sent_at = Some(at),
            InvoiceStatus::Paid => invoice.paid_at = Some(at),
            _ => {}
        }
        invoice.updated_at = at;
        Ok(Some(invoice.clone()))
    }

    async fn mark_overdue(&self, today: NaiveDate) -> Result<u64> {
        let mut state = self.state();
        let now = Utc::now();
        let mut count = 0;
        for invoice in state.invoices.values_mut() {
            if invoice.status == InvoiceStatus::Sent && invoice.due_date < today {
                invoice.status = InvoiceStatus::Overdue;
                invoice.updated_at = now;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn list_reminder_candidates(&self, today: NaiveDate) -> Result<Vec<ReminderCandidate>> {
        let state = self.state();
        let mut candidates: Vec<ReminderCandidate> = state
            .invoices
            .values()
            .filter(|i| i.status.is_reminder_eligible() && i.due_date < today)
            .filter_map(|i| Self::candidate(&state, i))
            .collect();
        candidates.sort_by(|a, b| {
            a.invoice
                .due_date
                .cmp(&b.invoice.due_date)
                .then(a.invoice.id.cmp(&b.invoice.id))
        });
        Ok(candidates)
    }

    async fn reminder_candidate(&self, id: Uuid) -> Result<Option<ReminderCandidate>> {
        let state = self.state();
        Ok(state
            .invoices
            .get(&id)
            .and_then(|i| Self::candidate(&state, i)))
    }

    async fn count_created_since(&self, owner_id: Uuid, since: DateTime<Utc>) -> Result<i64> {
        Ok(self
            .state()
            .invoices
            .values()
            .filter(|i| i.owner_id == owner_id && i.created_at >= since)
            .count() as i64)
    }

    async fn set_checkout_session(&self, id: Uuid, session_id: &str) -> Result<()> {
        let mut state = self.state();
        let invoice = state
            .invoices
            .get_mut(&id)
            .ok_or(Error::InvoiceNotFound(id))?;
        invoice.checkout_session_id = Some(session_id.to_string());
        invoice.updated_at = Utc::now();
        Ok(())
    }

    async fn find_by_checkout_session(&self, session_id: &str) -> Result<Option<Invoice>> {
        Ok(self
            .state()
            .invoices
            .values()
            .find(|i| i.checkout_session_id.as_deref() == Some(session_id))
            .cloned())
    }
}

#[async_trait]
impl EstimateRepository for InMemoryStore {
    async fn insert(&self, new: NewEstimate) -> Result<Estimate> {
        let mut state = self.state();
        let owns_client = state
            .clients
            .get(&new.client_id)
            .is_some_and(|c| c.owner_id == new.owner_id);
        if !owns_client {
            return Err(Error::ClientNotFound(new.client_id));
        }
        let seq = {
            let counter = state.estimate_seq.entry(new.owner_id).or_insert(0);
            *counter += 1;
            *counter
        };
        let now = Utc::now();
        let estimate = Estimate {
            id: new_v7(),
            owner_id: new.owner_id,
            client_id: new.client_id,
            estimate_number: format!("EST-{:04}", seq),
            status: EstimateStatus::Draft,
            currency: new.currency,
            issue_date: new.issue_date,
            valid_until: new.valid_until,
            line_items: new.line_items,
            tax_rate_bps: new.tax_rate_bps,
            subtotal_cents: new.totals.subtotal_cents,
            tax_cents: new.totals.tax_cents,
            total_cents: new.totals.total_cents,
            notes: new.notes,
            converted_invoice_id: None,
            created_at: now,
            updated_at: now,
        };
        state.estimates.insert(estimate.id, estimate.clone());
        Ok(estimate)
    }

    async fn fetch(&self, owner_id: Uuid, id: Uuid) -> Result<Estimate> {
        self.state()
            .estimates
            .get(&id)
            .filter(|e| e.owner_id == owner_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("estimate {}", id)))
    }

    async fn list(
        &self,
        owner_id: Uuid,
        status: Option<EstimateStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Estimate>> {
        let mut estimates: Vec<Estimate> = self
            .state()
            .estimates
            .values()
            .filter(|e| e.owner_id == owner_id && status.map_or(true, |s| e.status == s))
            .cloned()
            .collect();
        estimates.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paged(estimates, Some(limit), Some(offset)))
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: &[EstimateStatus],
        next: EstimateStatus,
    ) -> Result<Option<Estimate>> {
        let mut state = self.state();
        let Some(estimate) = state.estimates.get_mut(&id) else {
            return Ok(None);
        };
        if !expected.contains(&estimate.status) {
            return Ok(None);
        }
        estimate.status = next;
        estimate.updated_at = Utc::now();
        Ok(Some(estimate.clone()))
    }

    async fn set_converted_invoice(&self, id: Uuid, invoice_id: Uuid) -> Result<()> {
        let mut state = self.state();
        let estimate = state
            .estimates
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("estimate {}", id)))?;
        estimate.converted_invoice_id = Some(invoice_id);
        Ok(())
    }
}

#[async_trait]
impl ReminderRepository for InMemoryStore {
    async fn insert_if_absent(&self, new: NewReminder) -> Result<Option<Reminder>> {
        let mut state = self.state();
        let exists = state.reminders.iter().any(|r| {
            r.invoice_id == new.invoice_id && r.tier == new.tier && r.status.is_blocking()
        });
        if exists {
            return Ok(None);
        }
        let now = Utc::now();
        let reminder = Reminder {
            id: new_v7(),
            invoice_id: new.invoice_id,
            owner_id: new.owner_id,
            tier: new.tier,
            status: ReminderStatus::Scheduled,
            provider_message_id: None,
            failure_reason: None,
            created_at: now,
            sent_at: None,
            updated_at: now,
        };
        state.reminders.push(reminder.clone());
        Ok(Some(reminder))
    }

    async fn list(&self, filter: ReminderFilter) -> Result<Vec<Reminder>> {
        let mut rows: Vec<Reminder> = self
            .state()
            .reminders
            .iter()
            .filter(|r| filter.owner_id.map_or(true, |o| r.owner_id == o))
            .filter(|r| filter.invoice_id.map_or(true, |i| r.invoice_id == i))
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paged(rows, filter.limit, filter.offset))
    }

    async fn delete_ids(&self, ids: &[Uuid]) -> Result<u64> {
        let mut state = self.state();
        let before = state.reminders.len();
        state.reminders.retain(|r| !ids.contains(&r.id));
        Ok((before - state.reminders.len()) as u64)
    }

    async fn mark_sent(&self, id: Uuid, message_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state();
        if let Some(r) = state.reminders.iter_mut().find(|r| r.id == id) {
            r.status = ReminderStatus::Sent;
            r.provider_message_id = Some(message_id.to_string());
            r.failure_reason = None;
            r.sent_at = Some(at);
            r.updated_at = at;
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, reason: &str) -> Result<()> {
        let mut state = self.state();
        if let Some(r) = state.reminders.iter_mut().find(|r| r.id == id) {
            r.status = ReminderStatus::Failed;
            r.failure_reason = Some(reason.to_string());
            r.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn apply_delivery(
        &self,
        message_id: &str,
        status: ReminderStatus,
        reason: Option<&str>,
    ) -> Result<Option<Reminder>> {
        let mut state = self.state();
        let Some(pos) = state
            .reminders
            .iter()
            .position(|r| r.provider_message_id.as_deref() == Some(message_id))
        else {
            return Ok(None);
        };
        let target = &state.reminders[pos];
        let superseded = status.is_blocking()
            && !target.status.is_blocking()
            && state.reminders.iter().any(|o| {
                o.id != target.id
                    && o.invoice_id == target.invoice_id
                    && o.tier == target.tier
                    && o.status.is_blocking()
            });
        if superseded {
            return Ok(Some(target.clone()));
        }
        let r = &mut state.reminders[pos];
        r.status = status;
        r.failure_reason = reason.map(str::to_string);
        r.updated_at = Utc::now();
        Ok(Some(r.clone()))
    }
}

#[async_trait]
impl AccountRepository for InMemoryStore {
    async fn get_profile(&self, owner_id: Uuid) -> Result<Option<BusinessProfile>> {
        Ok(self.state().profiles.get(&owner_id).cloned())
    }

    async fn upsert_profile(
        &self,
        owner_id: Uuid,
        req: UpsertProfileRequest,
    ) -> Result<BusinessProfile> {
        let profile = BusinessProfile {
            owner_id,
            business_name: req.business_name,
            email: req.email,
            phone: req.phone,
            address: req.address,
            payment_instructions: req.payment_instructions,
            updated_at: Utc::now(),
        };
        self.state().profiles.insert(owner_id, profile.clone());
        Ok(profile)
    }

    async fn get_plan(&self, owner_id: Uuid) -> Result<Plan> {
        Ok(self
            .state()
            .plans
            .get(&owner_id)
            .copied()
            .unwrap_or_default())
    }

    async fn purge(&self, owner_id: Uuid) -> Result<PurgeReport> {
        let mut state = self.state();
        let mut report = PurgeReport::default();
        let mut record = |table: &str, deleted: usize| {
            report.tables.push(TablePurge {
                table: table.to_string(),
                deleted: deleted as u64,
            })
        };

        let before = state.reminders.len();
        state.reminders.retain(|r| r.owner_id != owner_id);
        record("reminder", before - state.reminders.len());

        let before = state.invoices.len();
        state.invoices.retain(|_, i| i.owner_id != owner_id);
        record("invoice", before - state.invoices.len());

        let before = state.estimates.len();
        state.estimates.retain(|_, e| e.owner_id != owner_id);
        record("estimate", before - state.estimates.len());

        let before = state.clients.len();
        state.clients.retain(|_, c| c.owner_id != owner_id);
        record("client", before - state.clients.len());

        record(
            "business_profile",
            usize::from(state.profiles.remove(&owner_id).is_some()),
        );
        record(
            "subscription",
            usize::from(state.plans.remove(&owner_id).is_some()),
        );
        state.invoice_seq.remove(&owner_id);
        state.estimate_seq.remove(&owner_id);

        Ok(report)
    }
}

#[async_trait]
impl JobRepository for InMemoryStore {
    async fn queue(
        &self,
        owner_id: Option<Uuid>,
        job_type: JobType,
        priority: i32,
        payload: Option<JsonValue>,
    ) -> Result<Uuid> {
        let job = Job {
            id: new_v7(),
            owner_id,
            job_type,
            status: JobStatus::Pending,
            priority,
            payload,
            result: None,
            error_message: None,
            retry_count: 0,
            max_retries: defaults::JOB_MAX_RETRIES,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        let id = job.id;
        self.state().jobs.push(job);
        Ok(id)
    }

    async fn queue_deduplicated(
        &self,
        owner_id: Option<Uuid>,
        job_type: JobType,
        priority: i32,
        payload: Option<JsonValue>,
    ) -> Result<Option<Uuid>> {
        let active = self.state().jobs.iter().any(|j| {
            j.job_type == job_type
                && j.owner_id == owner_id
                && matches!(j.status, JobStatus::Pending | JobStatus::Running)
        });
        if active {
            return Ok(None);
        }
        self.queue(owner_id, job_type, priority, payload)
            .await
            .map(Some)
    }

    async fn claim_next_for_types(&self, job_types: &[JobType]) -> Result<Option<Job>> {
        let mut state = self.state();
        let next = state
            .jobs
            .iter_mut()
            .filter(|j| j.status == JobStatus::Pending)
            .filter(|j| job_types.is_empty() || job_types.contains(&j.job_type))
            .min_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then(a.created_at.cmp(&b.created_at))
            });
        Ok(next.map(|job| {
            job.status = JobStatus::Running;
            job.started_at = Some(Utc::now());
            job.clone()
        }))
    }

    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()> {
        let mut state = self.state();
        let job = state
            .jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| Error::Job(format!("job {} not found", job_id)))?;
        job.status = JobStatus::Completed;
        job.result = result;
        job.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()> {
        let mut state = self.state();
        let job = state
            .jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| Error::Job(format!("job {} not found", job_id)))?;
        job.error_message = Some(error.to_string());
        if job.retry_count < job.max_retries {
            job.retry_count += 1;
            job.status = JobStatus::Pending;
            job.started_at = None;
        } else {
            job.status = JobStatus::Failed;
            job.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        Ok(self.state().jobs.iter().find(|j| j.id == job_id).cloned())
    }

    async fn pending_count(&self) -> Result<i64> {
        Ok(self
            .state()
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .count() as i64)
    }
}

// =============================================================================
// PROVIDERS
// =============================================================================

/// Email provider that records messages instead of sending them.
#[derive(Default)]
pub struct RecordingEmailProvider {
    sent: Mutex<Vec<OutboundEmail>>,
    failure: Option<String>,
}

impl RecordingEmailProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose every send fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: Some(reason.into()),
        }
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl EmailProvider for RecordingEmailProvider {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, email: &OutboundEmail) -> Result<String> {
        if let Some(reason) = &self.failure {
            return Err(Error::Provider(reason.clone()));
        }
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(email.clone());
        Ok(format!("msg_{}", new_v7().simple()))
    }
}

/// Payment provider returning a deterministic session per invoice.
#[derive(Default)]
pub struct StaticPaymentProvider;

#[async_trait]
impl PaymentProvider for StaticPaymentProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn create_checkout(&self, req: &CheckoutRequest) -> Result<CheckoutSession> {
        let id = format!("cs_test_{}", req.invoice_id.simple());
        Ok(CheckoutSession {
            url: format!("https://checkout.example.com/pay/{}", id),
            id,
        })
    }
}

/// A sent invoice `overdue_days` past due with a client snapshot.
pub fn sample_candidate(overdue_days: i64) -> ReminderCandidate {
    let now = Utc::now();
    let due_date = now.date_naive() - Duration::days(overdue_days);
    ReminderCandidate {
        invoice: Invoice {
            id: new_v7(),
            owner_id: new_v7(),
            client_id: new_v7(),
            invoice_number: "INV-0042".to_string(),
            status: InvoiceStatus::Sent,
            currency: defaults::CURRENCY.to_string(),
            issue_date: due_date - Duration::days(defaults::PAYMENT_TERMS_DAYS),
            due_date,
            line_items: Vec::new(),
            tax_rate_bps: 0,
            subtotal_cents: 125_000,
            tax_cents: 0,
            total_cents: 125_000,
            notes: None,
            checkout_session_id: None,
            sent_at: Some(now),
            paid_at: None,
            created_at: now,
            updated_at: now,
        },
        client_name: "Bob Client".to_string(),
        client_email: "bob@example.com".to_string(),
    }
}

/// A reminder row for `status`, friendly tier, created now.
pub fn sample_reminder(status: ReminderStatus) -> Reminder {
    let now = Utc::now();
    Reminder {
        id: new_v7(),
        invoice_id: new_v7(),
        owner_id: new_v7(),
        tier: ReminderTier::Friendly,
        status,
        provider_message_id: None,
        failure_reason: None,
        created_at: now,
        sent_at: None,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_if_absent_respects_blocking_statuses() {
        let store = InMemoryStore::new();
        let new = NewReminder {
            invoice_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            tier: ReminderTier::Friendly,
        };
        let first = store.insert_if_absent(new).await.unwrap().unwrap();
        assert!(store.insert_if_absent(new).await.unwrap().is_none());

        store.mark_failed(first.id, "boom").await.unwrap();
        assert!(store.insert_if_absent(new).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_mark_sent_clears_failure_reason() {
        let store = InMemoryStore::new();
        let r = store
            .insert_if_absent(NewReminder {
                invoice_id: Uuid::new_v4(),
                owner_id: Uuid::new_v4(),
                tier: ReminderTier::Polite,
            })
            .await
            .unwrap()
            .unwrap();
        store.mark_failed(r.id, "timeout").await.unwrap();
        store
            .mark_sent(r.id, "msg_retry", Utc::now())
            .await
            .unwrap();

        let rows = ReminderRepository::list(&store, ReminderFilter::default())
            .await
            .unwrap();
        assert_eq!(rows[0].status, ReminderStatus::Sent);
        assert_eq!(rows[0].failure_reason, None);
    }

    #[tokio::test]
    async fn test_invoice_numbers_per_owner() {
        let store = InMemoryStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let due = Utc::now().date_naive();
        let ca = store.seed_client(a, CreateClientRequest::default()).await;
        let cb = store.seed_client(b, CreateClientRequest::default()).await;

        let a1 = store.seed_invoice(a, ca.id, InvoiceStatus::Draft, due).await;
        let a2 = store.seed_invoice(a, ca.id, InvoiceStatus::Draft, due).await;
        let b1 = store.seed_invoice(b, cb.id, InvoiceStatus::Draft, due).await;
        assert_eq!(a1.invoice_number, "INV-0001");
        assert_eq!(a2.invoice_number, "INV-0002");
        assert_eq!(b1.invoice_number, "INV-0001");
    }

    #[tokio::test]
    async fn test_job_claim_order_and_retry() {
        let store = InMemoryStore::new();
        let low = store.queue(None, JobType::ReminderDedup, 2, None).await.unwrap();
        let high = store.queue(None, JobType::ReminderScan, 5, None).await.unwrap();

        let claimed = store.claim_next_for_types(&[]).await.unwrap().unwrap();
        assert_eq!(claimed.id, high);
        assert!(store
            .queue_deduplicated(None, JobType::ReminderScan, 5, None)
            .await
            .unwrap()
            .is_none());

        let only_scan = store
            .claim_next_for_types(&[JobType::ReminderScan])
            .await
            .unwrap();
        assert!(only_scan.is_none());

        store.fail(high, "transient").await.unwrap();
        let job = store.get(high).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.retry_count, 1);

        assert_eq!(store.pending_count().await.unwrap(), 2);
        let _ = low;
    }

    #[tokio::test]
    async fn test_purge_only_touches_owner() {
        let store = InMemoryStore::new();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let due = Utc::now().date_naive();
        let c = store.seed_client(owner, CreateClientRequest::default()).await;
        let oc = store.seed_client(other, CreateClientRequest::default()).await;
        store.seed_invoice(owner, c.id, InvoiceStatus::Sent, due).await;
        store.seed_invoice(other, oc.id, InvoiceStatus::Sent, due).await;
        store.set_plan(owner, Plan::Pro);

        let report = store.purge(owner).await.unwrap();
        assert_eq!(report.total_deleted(), 3);
        assert!(report.skipped_tables.is_empty());
        assert_eq!(ClientRepository::count_for_owner(&store, other).await.unwrap(), 1);
        assert_eq!(store.get_plan(owner).await.unwrap(), Plan::Free);
    }
}
