//! Invoice endpoints: CRUD, status transitions, checkout and per-invoice
//! reminders.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use tally_core::billing::transition_invoice;
use tally_core::validation::{page, prepare_invoice};
use tally_core::{
    CheckoutRequest, CheckoutSession, CreateInvoiceRequest, Error, Invoice, InvoiceStatus,
    LimitAction, ListInvoicesRequest, Reminder, ReminderFilter, TriggerOutcome,
};

use crate::extract::{AuthUser, JsonBody, QueryParams};
use crate::{ApiError, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ListInvoicesQuery {
    pub status: Option<InvoiceStatus>,
    pub client_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_invoices(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(query): QueryParams<ListInvoicesQuery>,
) -> Result<Json<Vec<Invoice>>, ApiError> {
    let (limit, offset) = page(query.limit, query.offset);
    let req = ListInvoicesRequest {
        status: query.status,
        client_id: query.client_id,
        limit: Some(limit),
        offset: Some(offset),
    };
    Ok(Json(state.repos.invoices.list(user.owner_id, req).await?))
}

/// Create a draft invoice.
///
/// # Returns
/// - 201 Created with the invoice (number assigned)
/// - 400 Bad Request on invalid line items, dates, currency or tax
/// - 402 Payment Required if the monthly invoice limit is reached
/// - 404 Not Found if the client does not belong to the caller
pub async fn create_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(req): JsonBody<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<Invoice>), ApiError> {
    let now = Utc::now();
    let new = prepare_invoice(user.owner_id, req, now.date_naive())?;
    state
        .enforcer
        .ensure_allowed(user.owner_id, LimitAction::CreateInvoice, now)
        .await?;
    let invoice = state.repos.invoices.insert(new).await?;
    info!(
        subsystem = "api",
        owner_id = %user.owner_id,
        invoice_id = %invoice.id,
        invoice_number = %invoice.invoice_number,
        total_cents = invoice.total_cents,
        "Invoice created"
    );
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Invoice>, ApiError> {
    Ok(Json(state.repos.invoices.fetch(user.owner_id, id).await?))
}

pub async fn send_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Invoice>, ApiError> {
    let invoice = transition_invoice(
        state.repos.invoices.as_ref(),
        user.owner_id,
        id,
        InvoiceStatus::Sent,
        Utc::now(),
    )
    .await?;
    Ok(Json(invoice))
}

pub async fn pay_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Invoice>, ApiError> {
    let invoice = transition_invoice(
        state.repos.invoices.as_ref(),
        user.owner_id,
        id,
        InvoiceStatus::Paid,
        Utc::now(),
    )
    .await?;
    Ok(Json(invoice))
}

/// Open a hosted checkout for the invoice total.
///
/// Only `sent` and `overdue` invoices can be paid online (409 otherwise).
/// The session id is stored so the payment webhook can find the invoice.
pub async fn create_checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<CheckoutSession>), ApiError> {
    let invoice = state.repos.invoices.fetch(user.owner_id, id).await?;
    if !matches!(invoice.status, InvoiceStatus::Sent | InvoiceStatus::Overdue) {
        return Err(Error::InvalidTransition(format!(
            "cannot take payment for a {} invoice",
            invoice.status
        ))
        .into());
    }
    let client = state
        .repos
        .clients
        .fetch(user.owner_id, invoice.client_id)
        .await?;

    let base = &state.app_base_url;
    let req = CheckoutRequest {
        invoice_id: invoice.id,
        amount_cents: invoice.total_cents,
        currency: invoice.currency.clone(),
        description: format!("Invoice {}", invoice.invoice_number),
        customer_email: Some(client.email),
        success_url: format!("{}/invoices/{}?payment=success", base, invoice.id),
        cancel_url: format!("{}/invoices/{}?payment=cancelled", base, invoice.id),
    };
    let session = state.payments.create_checkout(&req).await?;
    state
        .repos
        .invoices
        .set_checkout_session(invoice.id, &session.id)
        .await?;

    info!(
        subsystem = "api",
        invoice_id = %invoice.id,
        provider = state.payments.name(),
        session_id = %session.id,
        "Checkout session created"
    );
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn list_invoice_reminders(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Reminder>>, ApiError> {
    // 404 for invoices the caller does not own.
    state.repos.invoices.fetch(user.owner_id, id).await?;
    let filter = ReminderFilter {
        owner_id: Some(user.owner_id),
        ..ReminderFilter::for_invoice(id)
    };
    Ok(Json(state.repos.reminders.list(filter).await?))
}

/// Evaluate the invoice now and send a reminder if one is due.
///
/// The response carries the decision; `reminder` is present when one was
/// created, whether or not the send succeeded.
pub async fn trigger_reminder(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TriggerOutcome>, ApiError> {
    let today = Utc::now().date_naive();
    Ok(Json(state.runner.trigger(user.owner_id, id, today).await?))
}
