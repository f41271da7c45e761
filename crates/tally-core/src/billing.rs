//! Invoice and estimate status changes.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{EstimateStatus, Invoice, InvoiceStatus};
use crate::traits::{EstimateRepository, InvoiceRepository};
use crate::validation::invoice_from_estimate;

/// Move an owner's invoice to `next`, enforcing the allowed transitions.
///
/// The update is conditional on the status read here, so a concurrent change
/// surfaces as `InvalidTransition` rather than being overwritten.
pub async fn transition_invoice(
    invoices: &dyn InvoiceRepository,
    owner_id: Uuid,
    id: Uuid,
    next: InvoiceStatus,
    now: DateTime<Utc>,
) -> Result<Invoice> {
    let current = invoices.fetch(owner_id, id).await?;
    if !current.status.can_transition_to(next) {
        return Err(Error::InvalidTransition(format!(
            "invoice {} cannot move from {} to {}",
            current.invoice_number, current.status, next
        )));
    }
    let updated = invoices
        .update_status(id, &[current.status], next, now)
        .await?
        .ok_or_else(|| {
            Error::InvalidTransition(format!(
                "invoice {} changed status concurrently",
                current.invoice_number
            ))
        })?;
    info!(
        subsystem = "billing",
        invoice_id = %id,
        from = %current.status,
        to = %next,
        "Invoice status changed"
    );
    Ok(updated)
}

/// Mark an invoice paid from an external confirmation.
///
/// Already-paid invoices are returned unchanged; drafts are rejected.
pub async fn settle_invoice(
    invoices: &dyn InvoiceRepository,
    invoice: Invoice,
    now: DateTime<Utc>,
) -> Result<Invoice> {
    if invoice.status == InvoiceStatus::Paid {
        return Ok(invoice);
    }
    match invoices
        .update_status(
            invoice.id,
            &[InvoiceStatus::Sent, InvoiceStatus::Overdue],
            InvoiceStatus::Paid,
            now,
        )
        .await?
    {
        Some(paid) => Ok(paid),
        None => {
            let fresh = invoices.fetch(invoice.owner_id, invoice.id).await?;
            if fresh.status == InvoiceStatus::Paid {
                Ok(fresh)
            } else {
                Err(Error::InvalidTransition(format!(
                    "invoice {} cannot be paid from {}",
                    fresh.invoice_number, fresh.status
                )))
            }
        }
    }
}

/// Move an owner's estimate to `next` (send, accept, decline).
pub async fn transition_estimate(
    estimates: &dyn EstimateRepository,
    owner_id: Uuid,
    id: Uuid,
    next: EstimateStatus,
) -> Result<crate::models::Estimate> {
    if next == EstimateStatus::Converted {
        return Err(Error::InvalidInput(
            "use the convert operation to convert an estimate".to_string(),
        ));
    }
    let current = estimates.fetch(owner_id, id).await?;
    if !current.status.can_transition_to(next) {
        return Err(Error::InvalidTransition(format!(
            "estimate {} cannot move from {} to {}",
            current.estimate_number, current.status, next
        )));
    }
    estimates
        .update_status(id, &[current.status], next)
        .await?
        .ok_or_else(|| {
            Error::InvalidTransition(format!(
                "estimate {} changed status concurrently",
                current.estimate_number
            ))
        })
}

/// Turn a sent or accepted estimate into a new draft invoice.
///
/// Callers check the invoice plan limit before calling.
pub async fn convert_estimate(
    estimates: &dyn EstimateRepository,
    invoices: &dyn InvoiceRepository,
    owner_id: Uuid,
    id: Uuid,
    today: NaiveDate,
) -> Result<Invoice> {
    let estimate = estimates.fetch(owner_id, id).await?;
    if !estimate.status.can_transition_to(EstimateStatus::Converted) {
        return Err(Error::InvalidTransition(format!(
            "estimate {} cannot be converted from {}",
            estimate.estimate_number, estimate.status
        )));
    }
    let new_invoice = invoice_from_estimate(&estimate, today)?;
    // Claim the estimate first so two converts cannot both create invoices.
    estimates
        .update_status(id, &[estimate.status], EstimateStatus::Converted)
        .await?
        .ok_or_else(|| {
            Error::InvalidTransition(format!(
                "estimate {} changed status concurrently",
                estimate.estimate_number
            ))
        })?;

    let invoice = invoices.insert(new_invoice).await?;
    estimates.set_converted_invoice(id, invoice.id).await?;
    info!(
        subsystem = "billing",
        estimate_id = %id,
        invoice_id = %invoice.id,
        "Estimate converted to invoice"
    );
    Ok(invoice)
}
