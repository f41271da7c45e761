//! Drives evaluation, conditional insert and dispatch for overdue invoices.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::dispatch::ReminderDispatcher;
use super::evaluator::{evaluate, ReminderDecision, SkipReason};
use super::schedule::TierSchedule;
use crate::error::{Error, Result};
use crate::limits::{LimitAction, PlanLimits};
use crate::models::{BusinessProfile, NewReminder, Reminder, ReminderCandidate, ReminderStatus};
use crate::traits::{AccountRepository, InvoiceRepository, ReminderFilter, ReminderRepository};

/// Totals from one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub evaluated: usize,
    pub created: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Invoices whose owner's plan has no automated reminders.
    pub skipped_by_plan: usize,
    /// Invoices that hit a store error (their own or their owner's account
    /// lookup) and were left for the next scan.
    pub errors: usize,
}

/// Result of triggering a reminder for one invoice.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerOutcome {
    pub decision: ReminderDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder: Option<Reminder>,
}

enum OwnerAccount {
    Allowed(Option<BusinessProfile>),
    Disallowed,
    Unavailable,
}

enum Processed {
    Skipped(ReminderDecision),
    Sent(Reminder),
    Failed(Reminder),
}

/// Ties the reminder rules to repositories and the email provider.
#[derive(Clone)]
pub struct ReminderRunner {
    invoices: Arc<dyn InvoiceRepository>,
    reminders: Arc<dyn ReminderRepository>,
    accounts: Arc<dyn AccountRepository>,
    dispatcher: ReminderDispatcher,
    schedule: TierSchedule,
}

impl ReminderRunner {
    pub fn new(
        invoices: Arc<dyn InvoiceRepository>,
        reminders: Arc<dyn ReminderRepository>,
        accounts: Arc<dyn AccountRepository>,
        dispatcher: ReminderDispatcher,
    ) -> Self {
        Self {
            invoices,
            reminders,
            accounts,
            dispatcher,
            schedule: TierSchedule::default(),
        }
    }

    pub fn with_schedule(mut self, schedule: TierSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn schedule(&self) -> &TierSchedule {
        &self.schedule
    }

    /// Evaluate every reminder-eligible invoice due before `today`.
    pub async fn run_scan(&self, today: NaiveDate) -> Result<ScanReport> {
        self.scan(today, None).await
    }

    /// Same as [`run_scan`](Self::run_scan), limited to one owner's invoices.
    pub async fn run_scan_for_owner(
        &self,
        owner_id: Uuid,
        today: NaiveDate,
    ) -> Result<ScanReport> {
        self.scan(today, Some(owner_id)).await
    }

    async fn scan(&self, today: NaiveDate, only_owner: Option<Uuid>) -> Result<ScanReport> {
        let start = Instant::now();
        let mut candidates = self.invoices.list_reminder_candidates(today).await?;
        if let Some(owner_id) = only_owner {
            candidates.retain(|c| c.invoice.owner_id == owner_id);
        }
        let mut report = ScanReport::default();

        let mut owners: HashMap<Uuid, OwnerAccount> = HashMap::new();

        for candidate in &candidates {
            let owner_id = candidate.invoice.owner_id;
            if !owners.contains_key(&owner_id) {
                let account = self.load_owner(owner_id).await;
                owners.insert(owner_id, account);
            }

            let profile = match owners.get(&owner_id) {
                Some(OwnerAccount::Allowed(profile)) => profile.as_ref(),
                Some(OwnerAccount::Disallowed) => {
                    report.skipped_by_plan += 1;
                    continue;
                }
                Some(OwnerAccount::Unavailable) | None => {
                    report.errors += 1;
                    continue;
                }
            };

            report.evaluated += 1;
            match self.process(candidate, profile, today).await {
                Ok(Processed::Skipped(_)) => report.skipped += 1,
                Ok(Processed::Sent(_)) => {
                    report.created += 1;
                    report.sent += 1;
                }
                Ok(Processed::Failed(_)) => {
                    report.created += 1;
                    report.failed += 1;
                }
                Err(e) => {
                    warn!(
                        subsystem = "reminders",
                        component = "runner",
                        invoice_id = %candidate.invoice.id,
                        error = %e,
                        "Reminder processing failed"
                    );
                    report.errors += 1;
                }
            }
        }

        info!(
            subsystem = "reminders",
            component = "runner",
            op = "scan",
            %today,
            candidates = candidates.len(),
            evaluated = report.evaluated,
            created = report.created,
            sent = report.sent,
            failed = report.failed,
            skipped = report.skipped,
            skipped_by_plan = report.skipped_by_plan,
            errors = report.errors,
            duration_ms = start.elapsed().as_millis() as u64,
            "Reminder scan complete"
        );
        Ok(report)
    }

    /// Plan and profile for one owner. Store errors are logged and leave that
    /// owner's invoices for the next scan.
    async fn load_owner(&self, owner_id: Uuid) -> OwnerAccount {
        let plan = match self.accounts.get_plan(owner_id).await {
            Ok(plan) => plan,
            Err(e) => {
                warn!(
                    subsystem = "reminders",
                    component = "runner",
                    owner_id = %owner_id,
                    error = %e,
                    "Plan lookup failed; skipping owner"
                );
                return OwnerAccount::Unavailable;
            }
        };
        if !PlanLimits::for_plan(plan).automated_reminders {
            return OwnerAccount::Disallowed;
        }
        match self.accounts.get_profile(owner_id).await {
            Ok(profile) => OwnerAccount::Allowed(profile),
            Err(e) => {
                warn!(
                    subsystem = "reminders",
                    component = "runner",
                    owner_id = %owner_id,
                    error = %e,
                    "Profile lookup failed; skipping owner"
                );
                OwnerAccount::Unavailable
            }
        }
    }

    /// Evaluate and, when due, send a reminder for one invoice.
    ///
    /// The invoice must belong to `owner_id` and the owner's plan must
    /// include reminders.
    pub async fn trigger(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
        today: NaiveDate,
    ) -> Result<TriggerOutcome> {
        let candidate = self
            .invoices
            .reminder_candidate(invoice_id)
            .await?
            .filter(|c| c.invoice.owner_id == owner_id)
            .ok_or(Error::InvoiceNotFound(invoice_id))?;

        let plan = self.accounts.get_plan(owner_id).await?;
        PlanLimits::for_plan(plan).check(LimitAction::AutomatedReminder, &Default::default())?;

        let profile = self.accounts.get_profile(owner_id).await?;
        let outcome = match self.process(&candidate, profile.as_ref(), today).await? {
            Processed::Skipped(decision) => TriggerOutcome {
                decision,
                reminder: None,
            },
            Processed::Sent(r) | Processed::Failed(r) => TriggerOutcome {
                decision: ReminderDecision::Create {
                    tier: r.tier,
                    overdue_days: super::evaluator::overdue_days(candidate.invoice.due_date, today),
                },
                reminder: Some(r),
            },
        };
        Ok(outcome)
    }

    async fn process(
        &self,
        candidate: &ReminderCandidate,
        profile: Option<&BusinessProfile>,
        today: NaiveDate,
    ) -> Result<Processed> {
        let invoice = &candidate.invoice;
        let existing = self
            .reminders
            .list(ReminderFilter::for_invoice(invoice.id))
            .await?;

        let decision = evaluate(invoice, &existing, today, &self.schedule);
        debug!(
            subsystem = "reminders",
            component = "evaluator",
            invoice_id = %invoice.id,
            status = %invoice.status,
            decision = ?decision,
            "Evaluated invoice"
        );

        let ReminderDecision::Create { tier, overdue_days } = decision else {
            return Ok(Processed::Skipped(decision));
        };

        // A concurrent trigger may have inserted the same tier since `existing` was read.
        let Some(mut reminder) = self
            .reminders
            .insert_if_absent(NewReminder {
                invoice_id: invoice.id,
                owner_id: invoice.owner_id,
                tier,
            })
            .await?
        else {
            return Ok(Processed::Skipped(ReminderDecision::NoAction(
                SkipReason::AlreadyReminded { tier },
            )));
        };

        match self
            .dispatcher
            .dispatch(tier, candidate, profile, overdue_days)
            .await
        {
            Ok(message_id) => {
                debug!(
                    subsystem = "reminders",
                    component = "runner",
                    invoice_id = %candidate.invoice.id,
                    %tier,
                    provider = self.dispatcher.provider_name(),
                    message_id = %message_id,
                    "Reminder handed to provider"
                );
                let now = Utc::now();
                self.reminders.mark_sent(reminder.id, &message_id, now).await?;
                reminder.status = ReminderStatus::Sent;
                reminder.provider_message_id = Some(message_id);
                reminder.sent_at = Some(now);
                reminder.updated_at = now;
                Ok(Processed::Sent(reminder))
            }
            Err(e) => {
                let reason = e.to_string();
                self.reminders.mark_failed(reminder.id, &reason).await?;
                reminder.status = ReminderStatus::Failed;
                reminder.failure_reason = Some(reason);
                reminder.updated_at = Utc::now();
                Ok(Processed::Failed(reminder))
            }
        }
    }
}
