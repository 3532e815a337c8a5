//! Chat transcript and chat-turn DTOs for dashboard editing sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::dashboard::DashboardDocument;

/// Reply shown when a chat turn fails for any reason.
pub const CHAT_FAILURE_REPLY: &str = "Sorry, I encountered an error processing your request.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Ai,
}

/// One transcript entry. The transcript lives beside the document, not in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender: Sender,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text)
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self::new(Sender::Ai, text)
    }

    fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// Structured reply the gateway returns for a chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectChatResponse {
    #[serde(default)]
    pub response_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_dashboard: Option<DashboardDocument>,
}

/// Request DTO for a chat turn
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Response DTO for a chat turn
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurnResponse {
    pub response_text: String,
    pub document_replaced: bool,
    pub document: Option<DashboardDocument>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_response_without_dashboard() {
        let resp: ProjectChatResponse =
            serde_json::from_str(r#"{"responseText": "Which city is the site in?"}"#).unwrap();
        assert_eq!(resp.response_text, "Which city is the site in?");
        assert!(resp.updated_dashboard.is_none());
    }

    #[test]
    fn chat_response_with_dashboard() {
        let resp: ProjectChatResponse = serde_json::from_str(
            r#"{"responseText": "Done.", "updatedDashboard": {"project_summary": {"title": "X"}, "wbs": []}}"#,
        )
        .unwrap();
        assert_eq!(resp.updated_dashboard.unwrap().summary.title, "X");
    }
}
