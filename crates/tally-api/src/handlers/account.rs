//! Business profile, subscription status and account purge.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use tally_core::validation::prepare_profile;
use tally_core::{BusinessProfile, JobType, PlanStatus, UpsertProfileRequest};

use crate::extract::{AuthUser, JsonBody, QueryParams};
use crate::{ApiError, AppState};

pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<BusinessProfile>, ApiError> {
    let profile = state
        .repos
        .accounts
        .get_profile(user.owner_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("business profile not found".to_string()))?;
    Ok(Json(profile))
}

pub async fn put_profile(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(req): JsonBody<UpsertProfileRequest>,
) -> Result<Json<BusinessProfile>, ApiError> {
    let req = prepare_profile(req)?;
    let profile = state.repos.accounts.upsert_profile(user.owner_id, req).await?;
    Ok(Json(profile))
}

/// Plan, limits and current usage.
pub async fn subscription(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<PlanStatus>, ApiError> {
    Ok(Json(state.enforcer.status(user.owner_id, Utc::now()).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct PurgeQuery {
    /// `background` queues an account purge job instead of purging inline.
    pub mode: Option<String>,
}

/// Delete every row the account owns.
///
/// # Returns
/// - 200 OK with the purge report
/// - 202 Accepted with `{ "job_id": ... }` when `?mode=background`
pub async fn delete_account(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(query): QueryParams<PurgeQuery>,
) -> Result<Response, ApiError> {
    match query.mode.as_deref() {
        None | Some("sync") => {
            let report = state.repos.accounts.purge(user.owner_id).await?;
            info!(
                subsystem = "api",
                owner_id = %user.owner_id,
                deleted = report.total_deleted(),
                skipped = report.skipped_tables.len(),
                "Account purged"
            );
            Ok(Json(report).into_response())
        }
        Some("background") => {
            let job_id = state
                .repos
                .jobs
                .queue(
                    Some(user.owner_id),
                    JobType::AccountPurge,
                    JobType::AccountPurge.default_priority(),
                    None,
                )
                .await?;
            Ok((
                StatusCode::ACCEPTED,
                Json(serde_json::json!({ "job_id": job_id })),
            )
                .into_response())
        }
        Some(other) => Err(ApiError::BadRequest(format!(
            "unknown purge mode '{}'; expected 'sync' or 'background'",
            other
        ))),
    }
}
