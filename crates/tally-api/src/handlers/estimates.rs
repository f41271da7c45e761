//! Estimates and their conversion into invoices.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use tally_core::billing::{convert_estimate, transition_estimate};
use tally_core::validation::{page, prepare_estimate};
use tally_core::{CreateEstimateRequest, Estimate, EstimateStatus, Invoice, LimitAction};

use crate::extract::{AuthUser, JsonBody, QueryParams};
use crate::{ApiError, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ListEstimatesQuery {
    pub status: Option<EstimateStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_estimates(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(query): QueryParams<ListEstimatesQuery>,
) -> Result<Json<Vec<Estimate>>, ApiError> {
    let (limit, offset) = page(query.limit, query.offset);
    let estimates = state
        .repos
        .estimates
        .list(user.owner_id, query.status, limit, offset)
        .await?;
    Ok(Json(estimates))
}

pub async fn create_estimate(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(req): JsonBody<CreateEstimateRequest>,
) -> Result<(StatusCode, Json<Estimate>), ApiError> {
    let new = prepare_estimate(user.owner_id, req, Utc::now().date_naive())?;
    let estimate = state.repos.estimates.insert(new).await?;
    Ok((StatusCode::CREATED, Json(estimate)))
}

pub async fn get_estimate(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Estimate>, ApiError> {
    Ok(Json(state.repos.estimates.fetch(user.owner_id, id).await?))
}

async fn transition(
    state: &AppState,
    user: AuthUser,
    id: Uuid,
    next: EstimateStatus,
) -> Result<Json<Estimate>, ApiError> {
    let estimate =
        transition_estimate(state.repos.estimates.as_ref(), user.owner_id, id, next).await?;
    Ok(Json(estimate))
}

pub async fn send_estimate(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Estimate>, ApiError> {
    transition(&state, user, id, EstimateStatus::Sent).await
}

pub async fn accept_estimate(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Estimate>, ApiError> {
    transition(&state, user, id, EstimateStatus::Accepted).await
}

pub async fn decline_estimate(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Estimate>, ApiError> {
    transition(&state, user, id, EstimateStatus::Declined).await
}

/// Turn a sent or accepted estimate into a draft invoice.
///
/// Counts against the monthly invoice limit.
pub async fn convert_to_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<Invoice>), ApiError> {
    let now = Utc::now();
    state
        .enforcer
        .ensure_allowed(user.owner_id, LimitAction::CreateInvoice, now)
        .await?;
    let invoice = convert_estimate(
        state.repos.estimates.as_ref(),
        state.repos.invoices.as_ref(),
        user.owner_id,
        id,
        now.date_naive(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}
