//! Owner-level reminder listing, on-demand scans and dedup sweeps.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::info;

use tally_core::validation::page;
use tally_core::{DedupReport, JobType, LimitAction, Reminder, ReminderFilter, ReminderStatus};

use crate::extract::{AuthUser, QueryParams};
use crate::{ApiError, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ListRemindersQuery {
    pub status: Option<ReminderStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_reminders(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(query): QueryParams<ListRemindersQuery>,
) -> Result<Json<Vec<Reminder>>, ApiError> {
    let (limit, offset) = page(query.limit, query.offset);
    let filter = ReminderFilter {
        owner_id: Some(user.owner_id),
        status: query.status,
        limit: Some(limit),
        offset: Some(offset),
        ..Default::default()
    };
    Ok(Json(state.repos.reminders.list(filter).await?))
}

/// Queue a reminder scan for the caller's invoices.
///
/// # Returns
/// - 202 Accepted with `{ "queued": true, "job_id": ... }`, or
///   `{ "queued": false }` when a scan for this account is already pending
/// - 402 Payment Required on plans without automated reminders
pub async fn run_reminders(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    state
        .enforcer
        .ensure_allowed(user.owner_id, LimitAction::AutomatedReminder, Utc::now())
        .await?;

    let job_id = state
        .repos
        .jobs
        .queue_deduplicated(
            Some(user.owner_id),
            JobType::ReminderScan,
            JobType::ReminderScan.default_priority(),
            Some(json!({ "owner_id": user.owner_id })),
        )
        .await?;

    let body = match job_id {
        Some(id) => json!({ "queued": true, "job_id": id }),
        None => json!({ "queued": false }),
    };
    Ok((StatusCode::ACCEPTED, Json(body)))
}

#[derive(Debug, Default, Deserialize)]
pub struct DedupQuery {
    pub status: Option<ReminderStatus>,
}

/// Run the dedup sweep over the caller's reminders and return its report.
pub async fn dedup_reminders(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(query): QueryParams<DedupQuery>,
) -> Result<Json<DedupReport>, ApiError> {
    let filter = ReminderFilter {
        owner_id: Some(user.owner_id),
        status: query.status,
        ..Default::default()
    };
    let report = state.sweep.run_filtered(filter).await?;
    info!(
        subsystem = "api",
        owner_id = %user.owner_id,
        removed = report.removed,
        "On-demand reminder dedup"
    );
    Ok(Json(report))
}
