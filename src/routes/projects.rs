use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::Owner;
use crate::domain::{SavedProject, SavedProjectSummary};
use crate::error::{ApiError, ApiResult};

/// List the caller's saved projects, newest first
pub async fn list_projects(
    owner: Owner,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<SavedProjectSummary>>> {
    let projects = state.store.list_projects(&owner.owner_key).await?;

    tracing::debug!(owner = %owner.owner_key, count = projects.len(), "Listing saved projects");

    Ok(Json(projects.iter().map(SavedProjectSummary::from).collect()))
}

/// Get one saved project with its full document
pub async fn get_project(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<SavedProject>> {
    state
        .store
        .get_project(&owner.owner_key, &project_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Project {} not found", project_id)))
}

/// Delete a saved project
pub async fn delete_project(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
) -> ApiResult<StatusCode> {
    if state
        .store
        .delete_project(&owner.owner_key, &project_id)
        .await?
    {
        tracing::info!(owner = %owner.owner_key, project_id = %project_id, "Saved project deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("Project {} not found", project_id)))
    }
}
