//! Free-text AI endpoints.
//!
//! These sit outside any editing session:
//! - construction Q&A, cached in Redis and auto-saved to the chat history
//! - site-photo progress reports
//! - BOQ / drawing quantity analysis

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::Owner;
use crate::domain::ai::{AnalysisResponse, AnalyzeRequest, AskRequest, AskResponse};
use crate::error::{ApiError, ApiResult, FlowError};
use crate::middleware::RequestId;
use crate::services::cache::keys;
use crate::services::enrichment::{Accept, UploadedFile};
use crate::services::prompts;

const DEFAULT_PROGRESS_PROMPT: &str =
    "Describe the construction stage visible in this photo and estimate progress for each visible element.";
const DEFAULT_BOQ_PROMPT: &str =
    "Extract a Bill of Quantities from this document, grouped by WBS phase, with IS 1200 measurement references.";

/// Answer a construction question under the IS-code citation rules.
///
/// POST /ask
pub async fn ask(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    Json(req): Json<AskRequest>,
) -> ApiResult<Json<AskResponse>> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err(ApiError::bad_request("query must not be empty"));
    }

    let cache_key = keys::qna(query);
    if let Some(cache) = &state.cache {
        if let Some(answer) = cache.get::<String>(&cache_key).await {
            tracing::debug!(owner = %owner.owner_key, "Returning cached answer");
            return Ok(Json(AskResponse {
                query: query.to_string(),
                answer,
                cached: true,
            }));
        }
    }

    let answer = state
        .gateway
        .generate(prompts::construction_question(query), request_id.as_deref())
        .await
        .map_err(FlowError::from)?;

    if let Some(cache) = &state.cache {
        if let Err(e) = cache.set(&cache_key, &answer).await {
            tracing::warn!(error = %e, "Failed to cache answer");
        }
    }

    if let Err(e) = state
        .store
        .save_chat(&owner.owner_key, query, &answer)
        .await
    {
        tracing::warn!(owner = %owner.owner_key, error = %e, "Failed to auto-save chat");
    }

    Ok(Json(AskResponse {
        query: query.to_string(),
        answer,
        cached: false,
    }))
}

/// Free-text progress report for a site photo.
///
/// POST /analyze/progress
pub async fn analyze_progress(
    _owner: Owner,
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    Json(req): Json<AnalyzeRequest>,
) -> ApiResult<Json<AnalysisResponse>> {
    let file = UploadedFile::from_upload(&req.file, Accept::Images)?;
    let prompt = prompt_or(&req.prompt, DEFAULT_PROGRESS_PROMPT);

    let report = state
        .gateway
        .generate(
            prompts::site_photo_report(prompt, &file.mime_type, &file.data_base64),
            request_id.as_deref(),
        )
        .await
        .map_err(FlowError::from)?;

    Ok(Json(AnalysisResponse { report }))
}

/// Free-text quantity survey of a BOQ, tender or drawing.
///
/// POST /analyze/boq
pub async fn analyze_boq(
    _owner: Owner,
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    Json(req): Json<AnalyzeRequest>,
) -> ApiResult<Json<AnalysisResponse>> {
    let file = UploadedFile::from_upload(&req.file, Accept::ImagesAndPdf)?;
    let prompt = prompt_or(&req.prompt, DEFAULT_BOQ_PROMPT);

    let report = state
        .gateway
        .generate(
            prompts::boq_analysis(prompt, &file.mime_type, &file.data_base64),
            request_id.as_deref(),
        )
        .await
        .map_err(FlowError::from)?;

    Ok(Json(AnalysisResponse { report }))
}

fn prompt_or<'a>(prompt: &'a str, default: &'a str) -> &'a str {
    match prompt.trim() {
        "" => default,
        p => p,
    }
}
