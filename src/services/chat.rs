//! Chat reconciliation loop.
//!
//! One turn: the user's message and the current document go to the gateway,
//! the structured reply is merged through the store, and the transcript gets
//! exactly one user entry and one assistant entry.

use crate::domain::{ChatMessage, ProjectChatResponse, CHAT_FAILURE_REPLY};
use crate::error::FlowError;
use crate::services::ai_client::{generate_json, AiGateway};
use crate::services::prompts;
use crate::services::session::{EditingSession, OperationKind};

/// Result of one chat turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOutcome {
    pub response_text: String,
    pub document_replaced: bool,
}

/// Submit one chat turn.
///
/// Validation errors and a concurrent turn in flight are returned as errors
/// before the gateway is called. Gateway failures are absorbed: the
/// transcript receives a generic apology and the document is unchanged.
pub async fn submit(
    session: &EditingSession,
    gateway: &dyn AiGateway,
    message: &str,
    request_id: Option<&str>,
) -> Result<ChatOutcome, FlowError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(FlowError::Validation("Message must not be empty".to_string()));
    }

    let _permit = session.try_begin(OperationKind::Chat)?;
    let document = session.document_snapshot()?;

    let result = generate_json::<ProjectChatResponse>(
        gateway,
        prompts::chat_turn(&document, message),
        request_id,
    )
    .await;

    let mut state = session.lock_open()?;
    state.transcript.push(ChatMessage::user(message));

    match result {
        Ok(reply) => {
            let response_text = if reply.response_text.trim().is_empty() {
                "I have reviewed your request.".to_string()
            } else {
                reply.response_text
            };
            state.transcript.push(ChatMessage::ai(response_text.clone()));

            let document_replaced = match reply.updated_dashboard {
                Some(candidate) => {
                    state.store.replace(candidate);
                    true
                }
                None => false,
            };

            tracing::info!(
                session_id = %session.id(),
                document_replaced = document_replaced,
                "Chat turn reconciled"
            );

            Ok(ChatOutcome {
                response_text,
                document_replaced,
            })
        }
        Err(e) => {
            tracing::warn!(session_id = %session.id(), error = %e, "Chat turn failed");
            state.transcript.push(ChatMessage::ai(CHAT_FAILURE_REPLY));
            Ok(ChatOutcome {
                response_text: CHAT_FAILURE_REPLY.to_string(),
                document_replaced: false,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DashboardDocument, Sender, Task, ThreeDAnalysis};
    use crate::error::GatewayError;
    use crate::services::ai_client::testing::ScriptedGateway;
    use crate::services::session::SessionRegistry;
    use crate::services::store::DashboardStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn session_with(document: DashboardDocument) -> Arc<EditingSession> {
        let registry = SessionRegistry::new();
        let session = registry.open_new("guest");
        {
            let mut state = session.state();
            state.store = DashboardStore::new(Some(document));
            state.transcript.clear();
        }
        session
    }

    fn base_document() -> DashboardDocument {
        DashboardDocument {
            plan_image: Some("data:image/png;base64,PLAN".into()),
            three_d_analysis: Some(ThreeDAnalysis {
                estimated_height: "12 m".into(),
                ..Default::default()
            }),
            tasks: vec![Task {
                id: "T1".into(),
                name: "Excavation".into(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn senders(session: &EditingSession) -> Vec<Sender> {
        session.state().transcript.iter().map(|m| m.sender).collect()
    }

    #[tokio::test]
    async fn replacement_is_merged_and_transcript_paired() {
        let session = session_with(base_document());
        let gateway = ScriptedGateway::new().reply_json(json!({
            "responseText": "Extended excavation by a week.",
            "updatedDashboard": {
                "project_summary": {"title": "Villa"},
                "wbs": [{"id": "T1", "name": "Excavation", "endDate": "2024-03-08"}]
            }
        }));

        let outcome = submit(&session, &gateway, "Extend excavation", None).await.unwrap();

        assert!(outcome.document_replaced);
        assert_eq!(outcome.response_text, "Extended excavation by a week.");
        let doc = session.document_snapshot().unwrap();
        assert_eq!(doc.summary.title, "Villa");
        assert_eq!(doc.tasks[0].end_date, "2024-03-08");
        assert_eq!(doc.plan_image.as_deref(), Some("data:image/png;base64,PLAN"));
        assert_eq!(doc.three_d_analysis.unwrap().estimated_height, "12 m");
        assert_eq!(senders(&session), vec![Sender::User, Sender::Ai]);
    }

    #[tokio::test]
    async fn answer_without_replacement_keeps_document() {
        let session = session_with(base_document());
        let gateway = ScriptedGateway::new()
            .reply_json(json!({"responseText": "Which city is the site in?"}));

        let outcome = submit(&session, &gateway, "Is the wind load OK?", None).await.unwrap();

        assert!(!outcome.document_replaced);
        assert_eq!(session.document_snapshot().unwrap(), base_document());
        let state = session.state();
        assert_eq!(state.transcript.len(), 2);
        assert_eq!(state.transcript[0].text, "Is the wind load OK?");
        assert_eq!(state.transcript[1].text, "Which city is the site in?");
    }

    #[tokio::test]
    async fn gateway_failure_degrades_to_apology() {
        let session = session_with(base_document());
        let gateway = ScriptedGateway::new().fail(GatewayError::Status {
            status: 503,
            message: "overloaded".into(),
        });

        let outcome = submit(&session, &gateway, "Add a floor", None).await.unwrap();

        assert_eq!(outcome.response_text, CHAT_FAILURE_REPLY);
        assert!(!outcome.document_replaced);
        assert_eq!(session.document_snapshot().unwrap(), base_document());
        assert_eq!(senders(&session), vec![Sender::User, Sender::Ai]);
    }

    #[tokio::test]
    async fn malformed_reply_degrades_to_apology() {
        let session = session_with(base_document());
        let gateway = ScriptedGateway::new().reply("Sure, I updated it!");

        let outcome = submit(&session, &gateway, "Add a floor", None).await.unwrap();

        assert_eq!(outcome.response_text, CHAT_FAILURE_REPLY);
        assert_eq!(session.document_snapshot().unwrap(), base_document());
    }

    #[tokio::test]
    async fn blank_message_and_missing_document_are_rejected_early() {
        let session = session_with(base_document());
        let gateway = ScriptedGateway::new();
        assert!(matches!(
            submit(&session, &gateway, "   ", None).await,
            Err(FlowError::Validation(_))
        ));

        let empty = SessionRegistry::new().open_new("guest");
        assert!(matches!(
            submit(&empty, &gateway, "hello", None).await,
            Err(FlowError::NoDocument)
        ));
        assert!(gateway.requests().is_empty());
    }

    #[tokio::test]
    async fn second_turn_while_pending_is_rejected() {
        let session = session_with(base_document());
        let (gateway, gate) = ScriptedGateway::gated();
        let gateway = Arc::new(gateway.reply_json(json!({"responseText": "ok"})));

        let first = tokio::spawn({
            let session = session.clone();
            let gateway = gateway.clone();
            async move { submit(&session, gateway.as_ref(), "first", None).await }
        });

        while gateway.requests().is_empty() {
            tokio::task::yield_now().await;
        }

        let second = submit(&session, gateway.as_ref(), "second", None).await;
        assert!(matches!(second, Err(FlowError::Busy(OperationKind::Chat))));

        gate.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome.response_text, "ok");
        assert_eq!(session.state().transcript.len(), 2);
    }

    #[tokio::test]
    async fn result_is_dropped_when_session_closes_mid_flight() {
        let registry = SessionRegistry::new();
        let session = registry.open_new("guest");
        session.state().store = DashboardStore::new(Some(base_document()));

        let (gateway, gate) = ScriptedGateway::gated();
        let gateway = Arc::new(gateway.reply_json(json!({
            "responseText": "done",
            "updatedDashboard": {"project_summary": {"title": "Replaced"}}
        })));

        let pending = tokio::spawn({
            let session = session.clone();
            let gateway = gateway.clone();
            async move { submit(&session, gateway.as_ref(), "rename", None).await }
        });

        while gateway.requests().is_empty() {
            tokio::task::yield_now().await;
        }
        assert!(registry.close(session.id(), "guest"));
        gate.notify_one();

        assert!(matches!(
            pending.await.unwrap(),
            Err(FlowError::SessionClosed)
        ));
        assert!(session.state().store.document().is_none());
    }
}
