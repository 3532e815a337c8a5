//! Editing-session endpoints.
//!
//! A session holds one dashboard document and its chat transcript in memory.
//! Every flow runs against the session named in the path, scoped to the
//! caller's owner key.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::Owner;
use crate::domain::{
    ChatRequest, ChatTurnResponse, DashboardDocument, GenerateRequest, OpenSessionRequest,
    ProgressPhotoRequest, SavedProjectSummary, SessionView, TaskUpdateRequest, ThreeDRequest,
    ThreeDResponse,
};
use crate::error::{ApiError, ApiResult};
use crate::middleware::RequestId;
use crate::services::session::save_session;
use crate::services::task_update::{update_task, TaskUpdate};
use crate::services::{chat, enrichment, EditingSession};

fn find_session(state: &AppState, owner: &Owner, id: Uuid) -> ApiResult<Arc<EditingSession>> {
    state
        .sessions
        .get(id, &owner.owner_key)
        .ok_or_else(|| ApiError::not_found(format!("Session {} not found", id)))
}

/// Open a session on a new project, or on a saved one
///
/// POST /sessions
pub async fn open_session(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    body: Option<Json<OpenSessionRequest>>,
) -> ApiResult<(StatusCode, Json<SessionView>)> {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let session = match req.project_id {
        Some(project_id) => {
            let project = state
                .store
                .get_project(&owner.owner_key, &project_id)
                .await?
                .ok_or_else(|| ApiError::not_found(format!("Project {} not found", project_id)))?;
            state.sessions.open_saved(&owner.owner_key, project)
        }
        None => state.sessions.open_new(&owner.owner_key),
    };

    Ok((StatusCode::CREATED, Json(session.view())))
}

/// GET /sessions/:session_id
pub async fn get_session(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionView>> {
    let session = find_session(&state, &owner, session_id)?;
    Ok(Json(session.view()))
}

/// Close a session, discarding unsaved state
///
/// DELETE /sessions/:session_id
pub async fn close_session(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.sessions.close(session_id, &owner.owner_key) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("Session {} not found", session_id)))
    }
}

/// Generate the dashboard from an uploaded plan or tender
///
/// POST /sessions/:session_id/generate
pub async fn generate(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    request_id: RequestId,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<Json<SessionView>> {
    let session = find_session(&state, &owner, session_id)?;

    enrichment::generate_dashboard(
        &session,
        state.gateway.as_ref(),
        &req.file,
        request_id.as_deref(),
    )
    .await?;

    Ok(Json(session.view()))
}

/// One chat turn against the current dashboard
///
/// POST /sessions/:session_id/chat
pub async fn chat_turn(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    request_id: RequestId,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<ChatTurnResponse>> {
    let session = find_session(&state, &owner, session_id)?;

    let outcome = chat::submit(
        &session,
        state.gateway.as_ref(),
        &req.message,
        request_id.as_deref(),
    )
    .await?;

    Ok(Json(ChatTurnResponse {
        response_text: outcome.response_text,
        document_replaced: outcome.document_replaced,
        document: session.view().document,
    }))
}

/// Record executed quantity, status and a note against one task
///
/// POST /sessions/:session_id/tasks/:task_id/updates
pub async fn update_task_progress(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Path((session_id, task_id)): Path<(Uuid, String)>,
    Json(req): Json<TaskUpdateRequest>,
) -> ApiResult<Json<DashboardDocument>> {
    let session = find_session(&state, &owner, session_id)?;

    let update = TaskUpdate {
        status: req.status,
        quantity_delta: req.quantity_delta,
        comment: req.comment,
        photo: req.photo.filter(|p| !p.trim().is_empty()),
        author: owner.display_name().to_string(),
    };

    let document = update_task(&session, &task_id, update)?;
    Ok(Json(document))
}

/// Reconcile progress from a site photo
///
/// POST /sessions/:session_id/progress-photo
pub async fn progress_photo(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    request_id: RequestId,
    Json(req): Json<ProgressPhotoRequest>,
) -> ApiResult<Json<SessionView>> {
    let session = find_session(&state, &owner, session_id)?;

    enrichment::update_from_progress_photo(
        &session,
        state.gateway.as_ref(),
        state.store.as_ref(),
        &req.photo,
        request_id.as_deref(),
    )
    .await?;

    Ok(Json(session.view()))
}

/// 3D massing and camera placement analysis
///
/// POST /sessions/:session_id/three-d
pub async fn three_d(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    request_id: RequestId,
    body: Option<Json<ThreeDRequest>>,
) -> ApiResult<Json<ThreeDResponse>> {
    let session = find_session(&state, &owner, session_id)?;
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let analysis = enrichment::analyze_three_d(
        &session,
        state.gateway.as_ref(),
        req.file.as_ref(),
        request_id.as_deref(),
    )
    .await?;

    Ok(Json(ThreeDResponse { analysis }))
}

/// Persist the session's dashboard as a saved project
///
/// POST /sessions/:session_id/save
pub async fn save(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SavedProjectSummary>> {
    let session = find_session(&state, &owner, session_id)?;
    let saved = save_session(&session, state.store.as_ref()).await?;
    Ok(Json(SavedProjectSummary::from(&saved)))
}
