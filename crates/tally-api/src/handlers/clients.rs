//! Client CRUD.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use tally_core::validation::{page, prepare_client, prepare_client_update};
use tally_core::{Client, CreateClientRequest, LimitAction, UpdateClientRequest};

use super::PageQuery;
use crate::extract::{AuthUser, JsonBody, QueryParams};
use crate::{ApiError, AppState};

pub async fn list_clients(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(query): QueryParams<PageQuery>,
) -> Result<Json<Vec<Client>>, ApiError> {
    let (limit, offset) = page(query.limit, query.offset);
    let clients = state.repos.clients.list(user.owner_id, limit, offset).await?;
    Ok(Json(clients))
}

/// Create a client.
///
/// # Returns
/// - 201 Created with the client
/// - 400 Bad Request if name or email is invalid
/// - 402 Payment Required if the plan's client limit is reached
pub async fn create_client(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(req): JsonBody<CreateClientRequest>,
) -> Result<(StatusCode, Json<Client>), ApiError> {
    let req = prepare_client(req)?;
    state
        .enforcer
        .ensure_allowed(user.owner_id, LimitAction::CreateClient, Utc::now())
        .await?;
    let client = state.repos.clients.insert(user.owner_id, req).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn get_client(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Client>, ApiError> {
    Ok(Json(state.repos.clients.fetch(user.owner_id, id).await?))
}

pub async fn update_client(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    JsonBody(req): JsonBody<UpdateClientRequest>,
) -> Result<Json<Client>, ApiError> {
    let req = prepare_client_update(req)?;
    Ok(Json(state.repos.clients.update(user.owner_id, id, req).await?))
}

/// Clients still referenced by invoices or estimates cannot be deleted (400).
pub async fn delete_client(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.repos.clients.delete(user.owner_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
