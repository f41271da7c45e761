//! Applying asynchronous delivery events to reminder rows.

use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{DeliveryEvent, DeliveryEventKind, Reminder, ReminderStatus};
use crate::traits::ReminderRepository;

/// Reminder status and default failure reason for a delivery event kind.
pub fn status_for(kind: DeliveryEventKind) -> (ReminderStatus, Option<&'static str>) {
    match kind {
        DeliveryEventKind::Delivered => (ReminderStatus::Delivered, None),
        DeliveryEventKind::Bounced => (ReminderStatus::Bounced, Some("bounced")),
        DeliveryEventKind::Complained => (ReminderStatus::Failed, Some("complained")),
        DeliveryEventKind::Failed => (ReminderStatus::Failed, Some("delivery failed")),
    }
}

/// Result of applying one delivery event.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder: Option<Reminder>,
}

/// Match the event's provider message id to a reminder and update it.
///
/// Unknown message ids are not an error; the outcome reports `matched: false`.
pub async fn apply_delivery_event(
    reminders: &dyn ReminderRepository,
    event: &DeliveryEvent,
) -> Result<DeliveryOutcome> {
    let (status, default_reason) = status_for(event.kind);
    let reason = event.reason.as_deref().or(default_reason);

    let updated = reminders
        .apply_delivery(&event.message_id, status, reason)
        .await?;

    match &updated {
        Some(reminder) => info!(
            subsystem = "reminders",
            component = "delivery",
            reminder_id = %reminder.id,
            invoice_id = %reminder.invoice_id,
            message_id = %event.message_id,
            status = %status,
            "Applied delivery event"
        ),
        None => debug!(
            subsystem = "reminders",
            component = "delivery",
            message_id = %event.message_id,
            "Delivery event for unknown message id"
        ),
    }

    Ok(DeliveryOutcome {
        matched: updated.is_some(),
        reminder: updated,
    })
}
