// src/api/handlers.rs
// Route handlers: list endpoints over the configured backend plus the three
// sync triggers. Handlers never tear down shared state.

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use super::error::{ApiError, ApiResult, IntoApiError};
use crate::records::{Output, Project, SyncCounts, Task};
use crate::state::AppState;
use crate::store::{OutputFilter, ProjectFilter, TaskFilter};
use crate::sync::{HealthReport, PeriodicOutcome, SyncError, SyncPayload};

const TASK_ID_PREFIX: &str = "T-";
const OUTPUT_ID_PREFIX: &str = "OUT-";

/// Prepend the kind's id prefix when the caller passed a bare number, so
/// `?id=3` and `?id=T-3` address the same task.
fn normalize_id(raw: String, prefix: &str) -> String {
    if raw.starts_with(prefix) {
        raw
    } else {
        format!("{prefix}{raw}")
    }
}

pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ProjectFilter>,
) -> ApiResult<Json<Vec<Project>>> {
    let projects = state
        .backend
        .projects(&filter)
        .await
        .into_api_error("Failed to list projects")?;
    Ok(Json(projects))
}

pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(mut filter): Query<TaskFilter>,
) -> ApiResult<Json<Vec<Task>>> {
    filter.id = filter.id.map(|id| normalize_id(id, TASK_ID_PREFIX));
    let tasks = state
        .backend
        .tasks(&filter)
        .await
        .into_api_error("Failed to list tasks")?;
    Ok(Json(tasks))
}

pub async fn list_outputs(
    State(state): State<Arc<AppState>>,
    Query(mut filter): Query<OutputFilter>,
) -> ApiResult<Json<Vec<Output>>> {
    filter.id = filter.id.map(|id| normalize_id(id, OUTPUT_ID_PREFIX));
    filter.task = filter.task.map(|id| normalize_id(id, TASK_ID_PREFIX));
    let outputs = state
        .backend
        .outputs(&filter)
        .await
        .into_api_error("Failed to list outputs")?;
    Ok(Json(outputs))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub synced: SyncCounts,
}

/// Manual trigger: always rescans and republishes.
pub async fn refresh(State(state): State<Arc<AppState>>) -> ApiResult<Json<RefreshResponse>> {
    let synced = state
        .orchestrator
        .sync_manual()
        .await
        .map_err(sync_error)?;
    Ok(Json(RefreshResponse { synced }))
}

/// Push trigger: accepts an already-parsed snapshot from an external
/// process. Rejected with 400 before any mutation when an array is missing.
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SyncPayload>,
) -> ApiResult<Json<RefreshResponse>> {
    let synced = state
        .orchestrator
        .sync_push(payload)
        .await
        .map_err(sync_error)?;
    Ok(Json(RefreshResponse { synced }))
}

/// Periodic trigger, guarded by the shared cron secret when one is
/// configured. A mismatch is rejected with 401 and no side effects.
pub async fn cron(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<PeriodicOutcome>> {
    if let Some(secret) = &state.config.cron_secret {
        let expected = format!("Bearer {secret}");
        let authorized = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(|value| value == expected)
            .unwrap_or(false);
        if !authorized {
            return Err(ApiError::unauthorized("Invalid cron secret"));
        }
    }

    let outcome = state
        .orchestrator
        .sync_periodic()
        .await
        .map_err(sync_error)?;
    Ok(Json(outcome))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(state.backend.health().await)
}

fn sync_error(err: SyncError) -> ApiError {
    match &err {
        SyncError::InvalidPayload(_) => ApiError::bad_request(err.to_string()),
        _ => {
            tracing::error!("Sync failed: {}", err);
            ApiError::internal(err.to_string())
        }
    }
}
