//! Editing session DTOs
//!
//! Request and response bodies for the session routes. Uploaded files travel
//! as base64 inside JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::chat::ChatMessage;
use super::dashboard::{DashboardDocument, TaskStatus, ThreeDAnalysis};

/// Request DTO for opening a session
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenSessionRequest {
    /// Saved project to load; omitted for a new, empty project.
    #[serde(default)]
    pub project_id: Option<String>,
}

/// Snapshot of an editing session
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub project_id: Option<String>,
    pub last_saved: Option<DateTime<Utc>>,
    pub document: Option<DashboardDocument>,
    pub transcript: Vec<ChatMessage>,
}

/// Base64 file payload
#[derive(Debug, Clone, Deserialize)]
pub struct FileUpload {
    pub mime_type: String,
    pub data_base64: String,
}

/// Request DTO for dashboard generation
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub file: FileUpload,
}

/// Request DTO for a progress-photo reconciliation
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressPhotoRequest {
    pub photo: FileUpload,
}

/// Request DTO for 3D / camera analysis
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreeDRequest {
    /// Falls back to the session's embedded plan image when omitted.
    #[serde(default)]
    pub file: Option<FileUpload>,
}

/// Response DTO for 3D / camera analysis
#[derive(Debug, Clone, Serialize)]
pub struct ThreeDResponse {
    pub analysis: ThreeDAnalysis,
}

/// Request DTO for a manual task update
#[derive(Debug, Clone, Deserialize)]
pub struct TaskUpdateRequest {
    pub status: TaskStatus,
    #[serde(default)]
    pub quantity_delta: f64,
    #[serde(default)]
    pub comment: String,
    /// Site photo as a `data:` URL or raw base64.
    #[serde(default)]
    pub photo: Option<String>,
}
