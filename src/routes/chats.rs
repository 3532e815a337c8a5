use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::Owner;
use crate::domain::{SaveChatRequest, SavedChat};
use crate::error::{ApiError, ApiResult};

/// List the caller's saved chats, newest first
pub async fn list_chats(
    owner: Owner,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<SavedChat>>> {
    Ok(Json(state.store.list_chats(&owner.owner_key).await?))
}

/// Save one question/answer pair to the caller's history
pub async fn save_chat(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SaveChatRequest>,
) -> ApiResult<(StatusCode, Json<SavedChat>)> {
    if req.query.trim().is_empty() || req.response.trim().is_empty() {
        return Err(ApiError::bad_request("query and response are required"));
    }

    let chat = state
        .store
        .save_chat(&owner.owner_key, &req.query, &req.response)
        .await?;

    Ok((StatusCode::CREATED, Json(chat)))
}
