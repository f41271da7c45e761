use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use tally_core::Job;

use crate::extract::AuthUser;
use crate::{ApiError, AppState};

/// Job status. Jobs belonging to other accounts, or to none, are 404.
pub async fn get_job(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, ApiError> {
    state
        .repos
        .jobs
        .get(id)
        .await?
        .filter(|job| job.owner_id == Some(user.owner_id))
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("job {} not found", id)))
}
