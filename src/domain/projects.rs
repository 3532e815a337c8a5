use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::dashboard::DashboardDocument;

/// Owner key used when the request carries no verified identity.
pub const GUEST_OWNER: &str = "guest";

/// Maximum number of saved chats kept per owner.
pub const MAX_SAVED_CHATS: usize = 20;

/// Saved project entity
///
/// `id` is assigned on the first save and reused by every later save of the
/// same project; it is the upsert key within one owner's list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedProject {
    pub id: String,
    pub owner_key: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub document: DashboardDocument,
}

/// Lightweight listing row for saved projects
#[derive(Debug, Clone, Serialize)]
pub struct SavedProjectSummary {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl From<&SavedProject> for SavedProjectSummary {
    fn from(p: &SavedProject) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            created_at: p.created_at,
            last_modified: p.last_modified,
        }
    }
}

/// Input for a project save
#[derive(Debug, Clone)]
pub struct SaveProject {
    pub existing_id: Option<String>,
    pub document: DashboardDocument,
}

/// Saved chat entity (immutable once created)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedChat {
    pub id: String,
    pub owner_key: String,
    pub query: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

/// Request DTO for saving a chat
#[derive(Debug, Clone, Deserialize)]
pub struct SaveChatRequest {
    pub query: String,
    pub response: String,
}
