//! One-shot enrichment calls: dashboard generation, progress-photo
//! reconciliation and 3D/camera analysis.
//!
//! Each call has its own in-flight slot per session and is never retried.
//! Gateway failures are returned to the caller; the document is untouched.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use uuid::Uuid;

use crate::domain::{ChatMessage, DashboardDocument, FileUpload, ThreeDAnalysis};
use crate::error::FlowError;
use crate::services::ai_client::{generate_json, AiGateway};
use crate::services::prompts;
use crate::services::session::{save_session, EditingSession, OperationKind};
use crate::services::storage::ProjectStore;

pub const GENERATED_GREETING: &str = "Dashboard generated successfully! I have analyzed your plan. You can ask me to change timelines, update material quantities, or check for specific IS code requirements.";
pub const PROGRESS_PHOTO_ACK: &str = "I have updated the project progress based on the site photo you uploaded.";

/// Which MIME types an upload may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    Images,
    ImagesAndPdf,
}

impl Accept {
    fn allows(self, mime_type: &str) -> bool {
        let image = mime_type.starts_with("image/");
        match self {
            Self::Images => image,
            Self::ImagesAndPdf => image || mime_type == "application/pdf",
        }
    }
}

/// A validated upload: known MIME type, non-empty, valid base64.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub mime_type: String,
    pub data_base64: String,
}

impl UploadedFile {
    /// Validate a JSON upload. `data_base64` may also be a full `data:` URL.
    pub fn from_upload(upload: &FileUpload, accept: Accept) -> Result<Self, FlowError> {
        let (mime_type, data) = match parse_data_url(&upload.data_base64) {
            Some((url_mime, data)) => (url_mime.to_string(), data),
            None => (upload.mime_type.trim().to_lowercase(), upload.data_base64.as_str()),
        };
        Self::validate(mime_type, data, accept)
    }

    /// Rebuild an upload from a `data:{mime};base64,{data}` URL.
    pub fn from_data_url(url: &str, accept: Accept) -> Result<Self, FlowError> {
        let (mime_type, data) = parse_data_url(url)
            .ok_or_else(|| FlowError::Validation("Stored plan is not a base64 data URL".to_string()))?;
        Self::validate(mime_type.to_string(), data, accept)
    }

    fn validate(mime_type: String, data: &str, accept: Accept) -> Result<Self, FlowError> {
        if !accept.allows(&mime_type) {
            return Err(FlowError::UnsupportedFile(mime_type));
        }

        let data: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = BASE64
            .decode(data.as_bytes())
            .map_err(|e| FlowError::Validation(format!("File is not valid base64: {}", e)))?;
        if bytes.is_empty() {
            return Err(FlowError::Validation("Uploaded file is empty".to_string()));
        }

        Ok(Self {
            mime_type,
            data_base64: data,
        })
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data_base64)
    }
}

fn parse_data_url(value: &str) -> Option<(&str, &str)> {
    let rest = value.trim().strip_prefix("data:")?;
    let (mime_type, data) = rest.split_once(";base64,")?;
    Some((mime_type, data))
}

/// Generate a fresh dashboard from a plan or tender document.
///
/// The upload itself becomes the document's plan image and the transcript
/// restarts with a single greeting.
pub async fn generate_dashboard(
    session: &EditingSession,
    gateway: &dyn AiGateway,
    upload: &FileUpload,
    request_id: Option<&str>,
) -> Result<DashboardDocument, FlowError> {
    let file = UploadedFile::from_upload(upload, Accept::ImagesAndPdf)?;
    let _permit = session.try_begin(OperationKind::Generate)?;

    tracing::info!(
        session_id = %session.id(),
        mime_type = %file.mime_type,
        "Generating dashboard from upload"
    );

    let mut document = generate_json::<DashboardDocument>(
        gateway,
        prompts::dashboard_from_file(&file.mime_type, &file.data_base64),
        request_id,
    )
    .await
    .map_err(|e| {
        tracing::warn!(session_id = %session.id(), error = %e, "Dashboard generation failed");
        e
    })?;
    document.plan_image = Some(file.data_url());

    let mut state = session.lock_open()?;
    state.transcript = vec![ChatMessage::ai(GENERATED_GREETING)];
    if state.project_id.is_none() {
        state.project_id = Some(Uuid::new_v4().to_string());
    }
    // A new plan starts from scratch; nothing carries over from the old one.
    state.store.clear();
    let merged = state.store.replace(document).clone();

    tracing::info!(
        session_id = %session.id(),
        tasks = merged.tasks.len(),
        boq_items = merged.boq_items.len(),
        "Dashboard generated"
    );
    Ok(merged)
}

/// Reconcile the dashboard against a site photo, then auto-save.
///
/// A failed auto-save is logged; the reconciled document is still returned.
pub async fn update_from_progress_photo(
    session: &EditingSession,
    gateway: &dyn AiGateway,
    store: &dyn ProjectStore,
    photo: &FileUpload,
    request_id: Option<&str>,
) -> Result<DashboardDocument, FlowError> {
    let file = UploadedFile::from_upload(photo, Accept::Images)?;
    let _permit = session.try_begin(OperationKind::ProgressPhoto)?;
    let current = session.document_snapshot()?;

    let candidate = generate_json::<DashboardDocument>(
        gateway,
        prompts::progress_from_photo(&current, &file.mime_type, &file.data_base64),
        request_id,
    )
    .await
    .map_err(|e| {
        tracing::warn!(session_id = %session.id(), error = %e, "Progress photo reconciliation failed");
        e
    })?;

    let merged = {
        let mut state = session.lock_open()?;
        state.transcript.push(ChatMessage::ai(PROGRESS_PHOTO_ACK));
        state.store.replace(candidate).clone()
    };

    if let Err(e) = save_session(session, store).await {
        tracing::warn!(session_id = %session.id(), error = %e, "Auto-save after progress photo failed");
    }

    Ok(merged)
}

/// Run the 3D massing and camera-placement analysis.
///
/// Without an upload, the session's stored plan image is used. When the
/// session holds a document the result is written into it.
pub async fn analyze_three_d(
    session: &EditingSession,
    gateway: &dyn AiGateway,
    upload: Option<&FileUpload>,
    request_id: Option<&str>,
) -> Result<ThreeDAnalysis, FlowError> {
    let file = match upload {
        Some(upload) => UploadedFile::from_upload(upload, Accept::ImagesAndPdf)?,
        None => {
            let plan = session.plan_image().ok_or_else(|| {
                FlowError::Validation(
                    "Upload a plan or generate a dashboard before running the 3D analysis"
                        .to_string(),
                )
            })?;
            UploadedFile::from_data_url(&plan, Accept::ImagesAndPdf)?
        }
    };

    let _permit = session.try_begin(OperationKind::ThreeD)?;

    let analysis = generate_json::<ThreeDAnalysis>(
        gateway,
        prompts::three_d_plan(&file.mime_type, &file.data_base64),
        request_id,
    )
    .await?;

    let mut state = session.lock_open()?;
    if let Some(current) = state.store.document() {
        let candidate = DashboardDocument {
            three_d_analysis: Some(analysis.clone()),
            ..current.clone()
        };
        state.store.replace(candidate);
    }

    tracing::info!(
        session_id = %session.id(),
        cameras = analysis.camera_recommendations.len(),
        "3D analysis complete"
    );
    Ok(analysis)
}
