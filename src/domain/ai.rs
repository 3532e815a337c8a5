//! Request/response DTOs for the free-text AI endpoints.

use serde::{Deserialize, Serialize};

use super::sessions::FileUpload;

/// Request for construction Q&A.
#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub query: String,
}

/// Response for construction Q&A.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub query: String,
    pub answer: String,
    pub cached: bool,
}

/// Request for a free-text file analysis (site photo or BOQ document).
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    /// Falls back to a default instruction when blank.
    #[serde(default)]
    pub prompt: String,
    pub file: FileUpload,
}

/// Response for a free-text file analysis.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse {
    pub report: String,
}
