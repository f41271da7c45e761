//! Core data models for tally.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Error;

// =============================================================================
// LINE ITEMS & TOTALS
// =============================================================================

/// A billable line on an invoice or estimate. Money is in minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl LineItem {
    /// Line amount in minor units, `None` on overflow.
    pub fn amount_cents(&self) -> Option<i64> {
        self.quantity.checked_mul(self.unit_price_cents)
    }
}

/// Computed document totals in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

impl DocumentTotals {
    /// Sum line items and apply a tax rate given in basis points.
    ///
    /// Tax is rounded half-up to the nearest minor unit. Totals that do not
    /// fit in an `i64` are rejected as invalid input.
    pub fn compute(items: &[LineItem], tax_rate_bps: i32) -> Result<Self, Error> {
        let too_large = || Error::InvalidInput("document total is too large".to_string());

        let subtotal_cents = items
            .iter()
            .try_fold(0i64, |acc, item| {
                item.amount_cents().and_then(|amount| acc.checked_add(amount))
            })
            .ok_or_else(too_large)?;
        // Widen for the multiply; the rate is at most 10_000 bps.
        let tax = (i128::from(subtotal_cents) * i128::from(tax_rate_bps) + 5_000) / 10_000;
        let tax_cents = i64::try_from(tax).map_err(|_| too_large())?;
        let total_cents = subtotal_cents.checked_add(tax_cents).ok_or_else(too_large)?;

        Ok(Self {
            subtotal_cents,
            tax_cents,
            total_cents,
        })
    }
}

// =============================================================================
// CLIENTS
// =============================================================================

/// A customer billed by the account owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request for creating a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Partial client update. Only `Some` fields are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateClientRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
}

// =============================================================================
// INVOICES
// =============================================================================

/// Lifecycle state of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
        }
    }

    /// Whether reminders may be evaluated for an invoice in this state.
    pub fn is_reminder_eligible(&self) -> bool {
        matches!(self, InvoiceStatus::Sent | InvoiceStatus::Overdue)
    }

    /// Allowed status changes: draft→sent, sent→overdue, sent|overdue→paid.
    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        matches!(
            (self, next),
            (InvoiceStatus::Draft, InvoiceStatus::Sent)
                | (InvoiceStatus::Sent, InvoiceStatus::Overdue)
                | (InvoiceStatus::Sent, InvoiceStatus::Paid)
                | (InvoiceStatus::Overdue, InvoiceStatus::Paid)
        )
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(InvoiceStatus::Draft),
            "sent" => Ok(InvoiceStatus::Sent),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            other => Err(Error::InvalidInput(format!(
                "Unknown invoice status: {}",
                other
            ))),
        }
    }
}

/// A full invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub client_id: Uuid,
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub currency: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub line_items: Vec<LineItem>,
    pub tax_rate_bps: i32,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub notes: Option<String>,
    pub checkout_session_id: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating an invoice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateInvoiceRequest {
    pub client_id: Uuid,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub tax_rate_bps: Option<i32>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Validated invoice ready for insertion. The repository assigns id and number.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub owner_id: Uuid,
    pub client_id: Uuid,
    pub currency: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub line_items: Vec<LineItem>,
    pub tax_rate_bps: i32,
    pub totals: DocumentTotals,
    pub notes: Option<String>,
}

/// Invoice listing filter.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesRequest {
    pub status: Option<InvoiceStatus>,
    pub client_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Invoice plus the client fields a reminder email needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderCandidate {
    pub invoice: Invoice,
    pub client_name: String,
    pub client_email: String,
}

// =============================================================================
// ESTIMATES
// =============================================================================

/// Lifecycle state of an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimateStatus {
    Draft,
    Sent,
    Accepted,
    Declined,
    Converted,
}

impl EstimateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimateStatus::Draft => "draft",
            EstimateStatus::Sent => "sent",
            EstimateStatus::Accepted => "accepted",
            EstimateStatus::Declined => "declined",
            EstimateStatus::Converted => "converted",
        }
    }

    /// Allowed changes: draft→sent, sent→accepted|declined, sent|accepted→converted.
    pub fn can_transition_to(&self, next: EstimateStatus) -> bool {
        matches!(
            (self, next),
            (EstimateStatus::Draft, EstimateStatus::Sent)
                | (EstimateStatus::Sent, EstimateStatus::Accepted)
                | (EstimateStatus::Sent, EstimateStatus::Declined)
                | (EstimateStatus::Sent, EstimateStatus::Converted)
                | (EstimateStatus::Accepted, EstimateStatus::Converted)
        )
    }
}

impl fmt::Display for EstimateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EstimateStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(EstimateStatus::Draft),
            "sent" => Ok(EstimateStatus::Sent),
            "accepted" => Ok(EstimateStatus::Accepted),
            "declined" => Ok(EstimateStatus::Declined),
            "converted" => Ok(EstimateStatus::Converted),
            other => Err(Error::InvalidInput(format!(
                "Unknown estimate status: {}",
                other
            ))),
        }
    }
}

/// A quote that can later become an invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Estimate {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub client_id: Uuid,
    pub estimate_number: String,
    pub status: EstimateStatus,
    pub currency: String,
    pub issue_date: NaiveDate,
    pub valid_until: Option<NaiveDate>,
    pub line_items: Vec<LineItem>,
    pub tax_rate_bps: i32,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub notes: Option<String>,
    pub converted_invoice_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating an estimate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateEstimateRequest {
    pub client_id: Uuid,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub tax_rate_bps: Option<i32>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Validated estimate ready for insertion.
#[derive(Debug, Clone)]
pub struct NewEstimate {
    pub owner_id: Uuid,
    pub client_id: Uuid,
    pub currency: String,
    pub issue_date: NaiveDate,
    pub valid_until: Option<NaiveDate>,
    pub line_items: Vec<LineItem>,
    pub tax_rate_bps: i32,
    pub totals: DocumentTotals,
    pub notes: Option<String>,
}

// =============================================================================
// REMINDERS
// =============================================================================

/// Escalation level of a payment reminder, in ascending severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderTier {
    Friendly,
    Polite,
    Firm,
    Urgent,
}

impl ReminderTier {
    pub const ALL: [ReminderTier; 4] = [
        ReminderTier::Friendly,
        ReminderTier::Polite,
        ReminderTier::Firm,
        ReminderTier::Urgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderTier::Friendly => "friendly",
            ReminderTier::Polite => "polite",
            ReminderTier::Firm => "firm",
            ReminderTier::Urgent => "urgent",
        }
    }
}

impl fmt::Display for ReminderTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReminderTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "friendly" => Ok(ReminderTier::Friendly),
            "polite" => Ok(ReminderTier::Polite),
            "firm" => Ok(ReminderTier::Firm),
            "urgent" => Ok(ReminderTier::Urgent),
            other => Err(Error::InvalidInput(format!(
                "Unknown reminder tier: {}",
                other
            ))),
        }
    }
}

/// Delivery state of a reminder row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Scheduled,
    Sent,
    Delivered,
    Failed,
    Bounced,
}

impl ReminderStatus {
    /// Statuses that prevent another reminder of the same tier.
    pub const BLOCKING: [ReminderStatus; 3] = [
        ReminderStatus::Scheduled,
        ReminderStatus::Sent,
        ReminderStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderStatus::Scheduled => "scheduled",
            ReminderStatus::Sent => "sent",
            ReminderStatus::Delivered => "delivered",
            ReminderStatus::Failed => "failed",
            ReminderStatus::Bounced => "bounced",
        }
    }

    /// A reminder in this status counts as already reminding the client.
    pub fn is_blocking(&self) -> bool {
        Self::BLOCKING.contains(self)
    }
}

impl fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReminderStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(ReminderStatus::Scheduled),
            "sent" => Ok(ReminderStatus::Sent),
            "delivered" => Ok(ReminderStatus::Delivered),
            "failed" => Ok(ReminderStatus::Failed),
            "bounced" => Ok(ReminderStatus::Bounced),
            other => Err(Error::InvalidInput(format!(
                "Unknown reminder status: {}",
                other
            ))),
        }
    }
}

/// A persisted reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub owner_id: Uuid,
    pub tier: ReminderTier,
    pub status: ReminderStatus,
    pub provider_message_id: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// A reminder to be inserted in `scheduled` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewReminder {
    pub invoice_id: Uuid,
    pub owner_id: Uuid,
    pub tier: ReminderTier,
}

// =============================================================================
// ACCOUNT & PLANS
// =============================================================================

/// Sender details shown on invoices and reminder emails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessProfile {
    pub owner_id: Uuid,
    pub business_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub payment_instructions: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating or replacing the business profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpsertProfileRequest {
    pub business_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub payment_instructions: Option<String>,
}

/// Subscription plan of an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Pro,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Plan::Free),
            "pro" => Ok(Plan::Pro),
            other => Err(Error::InvalidInput(format!("Unknown plan: {}", other))),
        }
    }
}

/// Current usage counted against plan limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub clients: i64,
    pub invoices_this_month: i64,
}

/// Rows removed from one table during an account purge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePurge {
    pub table: String,
    pub deleted: u64,
}

/// Outcome of purging an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeReport {
    pub tables: Vec<TablePurge>,
    /// Tables that did not exist and were skipped.
    pub skipped_tables: Vec<String>,
}

impl PurgeReport {
    pub fn total_deleted(&self) -> u64 {
        self.tables.iter().map(|t| t.deleted).sum()
    }
}

// =============================================================================
// EXTERNAL PROVIDERS
// =============================================================================

/// An email handed to the delivery provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Delivery event type reported by the email provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryEventKind {
    Delivered,
    Bounced,
    Complained,
    Failed,
}

/// An inbound delivery-status event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryEvent {
    pub kind: DeliveryEventKind,
    pub message_id: String,
    pub reason: Option<String>,
}

/// Request for a hosted payment checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub invoice_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub description: String,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

/// Checkout session created by the payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

// =============================================================================
// JOB TYPES
// =============================================================================

/// Status of a job in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(Error::InvalidInput(format!("Unknown job status: {}", other))),
        }
    }
}

/// Type of background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Evaluate overdue invoices and send due reminders
    ReminderScan,
    /// Remove redundant reminder rows
    ReminderDedup,
    /// Move `sent` invoices past their due date to `overdue`
    OverdueMarking,
    /// Delete every row belonging to an account
    AccountPurge,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::ReminderScan => "reminder_scan",
            JobType::ReminderDedup => "reminder_dedup",
            JobType::OverdueMarking => "overdue_marking",
            JobType::AccountPurge => "account_purge",
        }
    }

    /// Default priority for this job type (higher = more urgent)
    pub fn default_priority(&self) -> i32 {
        match self {
            // Purge is user-initiated; finish it quickly
            JobType::AccountPurge => 9,
            // Overdue marking feeds the scan
            JobType::OverdueMarking => 6,
            JobType::ReminderScan => 5,
            JobType::ReminderDedup => 2,
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reminder_scan" => Ok(JobType::ReminderScan),
            "reminder_dedup" => Ok(JobType::ReminderDedup),
            "overdue_marking" => Ok(JobType::OverdueMarking),
            "account_purge" => Ok(JobType::AccountPurge),
            other => Err(Error::InvalidInput(format!("Unknown job type: {}", other))),
        }
    }
}

/// A job in the processing queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub owner_id: Option<Uuid>,
    pub job_type: JobType,
    pub status: JobStatus,
    pub priority: i32,
    pub payload: Option<JsonValue>,
    pub result: Option<JsonValue>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: i64, unit: i64) -> LineItem {
        LineItem {
            description: "Design work".to_string(),
            quantity,
            unit_price_cents: unit,
        }
    }

    #[test]
    fn test_totals_without_tax() {
        let totals = DocumentTotals::compute(&[item(2, 5_000), item(1, 2_500)], 0).unwrap();
        assert_eq!(totals.subtotal_cents, 12_500);
        assert_eq!(totals.tax_cents, 0);
        assert_eq!(totals.total_cents, 12_500);
    }

    #[test]
    fn test_totals_tax_rounds_half_up() {
        // 1_005 * 8.25% = 82.9125 -> 83
        let totals = DocumentTotals::compute(&[item(1, 1_005)], 825).unwrap();
        assert_eq!(totals.tax_cents, 83);
        assert_eq!(totals.total_cents, 1_088);

        // 10 * 5% = 0.5 -> 1
        let totals = DocumentTotals::compute(&[item(1, 10)], 500).unwrap();
        assert_eq!(totals.tax_cents, 1);
    }

    #[test]
    fn test_totals_reject_overflowing_sum() {
        let half = i64::MAX / 2 + 1;
        let err = DocumentTotals::compute(&[item(1, half), item(1, half)], 0).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_totals_large_tax_is_exact_or_rejected() {
        // subtotal * bps exceeds i64 here but the result still fits.
        let totals = DocumentTotals::compute(&[item(1, 1_000_000_000_000_000)], 10_000).unwrap();
        assert_eq!(totals.tax_cents, 1_000_000_000_000_000);
        assert_eq!(totals.total_cents, 2_000_000_000_000_000);

        let err = DocumentTotals::compute(&[item(1, i64::MAX - 10)], 10_000).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_invoice_status_transitions() {
        assert!(InvoiceStatus::Draft.can_transition_to(InvoiceStatus::Sent));
        assert!(InvoiceStatus::Sent.can_transition_to(InvoiceStatus::Overdue));
        assert!(InvoiceStatus::Overdue.can_transition_to(InvoiceStatus::Paid));
        assert!(!InvoiceStatus::Paid.can_transition_to(InvoiceStatus::Sent));
        assert!(!InvoiceStatus::Draft.can_transition_to(InvoiceStatus::Paid));
        assert!(!InvoiceStatus::Overdue.can_transition_to(InvoiceStatus::Sent));
    }

    #[test]
    fn test_reminder_eligibility() {
        assert!(InvoiceStatus::Sent.is_reminder_eligible());
        assert!(InvoiceStatus::Overdue.is_reminder_eligible());
        assert!(!InvoiceStatus::Paid.is_reminder_eligible());
        assert!(!InvoiceStatus::Draft.is_reminder_eligible());
    }

    #[test]
    fn test_blocking_statuses() {
        assert!(ReminderStatus::Scheduled.is_blocking());
        assert!(ReminderStatus::Sent.is_blocking());
        assert!(ReminderStatus::Delivered.is_blocking());
        assert!(!ReminderStatus::Failed.is_blocking());
        assert!(!ReminderStatus::Bounced.is_blocking());
    }

    #[test]
    fn test_tier_ordering_and_parse() {
        assert!(ReminderTier::Friendly < ReminderTier::Urgent);
        assert_eq!(" Firm ".parse::<ReminderTier>().unwrap(), ReminderTier::Firm);
        assert!("stern".parse::<ReminderTier>().is_err());
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            InvoiceStatus::Draft,
            InvoiceStatus::Sent,
            InvoiceStatus::Paid,
            InvoiceStatus::Overdue,
        ] {
            assert_eq!(status.as_str().parse::<InvoiceStatus>().unwrap(), status);
        }
        for job_type in [
            JobType::ReminderScan,
            JobType::ReminderDedup,
            JobType::OverdueMarking,
            JobType::AccountPurge,
        ] {
            assert_eq!(job_type.as_str().parse::<JobType>().unwrap(), job_type);
        }
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&ReminderStatus::Bounced).unwrap();
        assert_eq!(json, "\"bounced\"");
        let json = serde_json::to_string(&JobType::ReminderDedup).unwrap();
        assert_eq!(json, "\"reminder_dedup\"");
    }

    #[test]
    fn test_estimate_transitions() {
        assert!(EstimateStatus::Sent.can_transition_to(EstimateStatus::Accepted));
        assert!(EstimateStatus::Accepted.can_transition_to(EstimateStatus::Converted));
        assert!(!EstimateStatus::Declined.can_transition_to(EstimateStatus::Converted));
        assert!(!EstimateStatus::Converted.can_transition_to(EstimateStatus::Converted));
    }

    #[test]
    fn test_purge_report_total() {
        let report = PurgeReport {
            tables: vec![
                TablePurge {
                    table: "reminder".into(),
                    deleted: 4,
                },
                TablePurge {
                    table: "invoice".into(),
                    deleted: 2,
                },
            ],
            skipped_tables: vec!["estimate".into()],
        };
        assert_eq!(report.total_deleted(), 6);
    }
}
