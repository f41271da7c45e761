//! Reminder rule evaluation.
//!
//! Decides, for one invoice and the reminder rows already stored for it,
//! whether a new reminder is due and at which tier. Pure: no I/O, no clock.

use chrono::NaiveDate;
use serde::Serialize;

use super::schedule::TierSchedule;
use crate::models::{Invoice, InvoiceStatus, Reminder, ReminderTier};

/// Whole calendar days between `due_date` and `today`. Negative before the due date.
pub fn overdue_days(due_date: NaiveDate, today: NaiveDate) -> i64 {
    today.signed_duration_since(due_date).num_days()
}

/// Why the evaluator declined to create a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Draft and paid invoices are never evaluated.
    IneligibleStatus { status: InvoiceStatus },
    /// Due today or in the future.
    NotOverdue { overdue_days: i64 },
    /// Overdue, but before the first configured band.
    BelowFirstBand { overdue_days: i64 },
    /// A blocking reminder of this tier already exists.
    AlreadyReminded { tier: ReminderTier },
}

/// Evaluator output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReminderDecision {
    NoAction(SkipReason),
    Create { tier: ReminderTier, overdue_days: i64 },
}

impl ReminderDecision {
    pub fn tier(&self) -> Option<ReminderTier> {
        match self {
            ReminderDecision::Create { tier, .. } => Some(*tier),
            ReminderDecision::NoAction(_) => None,
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(self, ReminderDecision::Create { .. })
    }
}

/// Evaluate one invoice against its existing reminders.
///
/// Rows belonging to other invoices are ignored. Only `scheduled`, `sent`
/// and `delivered` rows of the target tier block a new reminder.
pub fn evaluate(
    invoice: &Invoice,
    existing: &[Reminder],
    today: NaiveDate,
    schedule: &TierSchedule,
) -> ReminderDecision {
    if !invoice.status.is_reminder_eligible() {
        return ReminderDecision::NoAction(SkipReason::IneligibleStatus {
            status: invoice.status,
        });
    }

    let days = overdue_days(invoice.due_date, today);
    if days <= 0 {
        return ReminderDecision::NoAction(SkipReason::NotOverdue { overdue_days: days });
    }

    let Some(tier) = schedule.tier_for(days) else {
        return ReminderDecision::NoAction(SkipReason::BelowFirstBand { overdue_days: days });
    };

    let blocked = existing
        .iter()
        .any(|r| r.invoice_id == invoice.id && r.tier == tier && r.status.is_blocking());
    if blocked {
        return ReminderDecision::NoAction(SkipReason::AlreadyReminded { tier });
    }

    ReminderDecision::Create {
        tier,
        overdue_days: days,
    }
}
