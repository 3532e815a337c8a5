pub mod ai;
pub mod chats;
pub mod health;
pub mod me;
pub mod projects;
pub mod sessions;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        .route("/me", get(me::get_me))
        // Editing sessions
        .route("/sessions", post(sessions::open_session))
        .route(
            "/sessions/:session_id",
            get(sessions::get_session).delete(sessions::close_session),
        )
        .route("/sessions/:session_id/generate", post(sessions::generate))
        .route("/sessions/:session_id/chat", post(sessions::chat_turn))
        .route(
            "/sessions/:session_id/tasks/:task_id/updates",
            post(sessions::update_task_progress),
        )
        .route(
            "/sessions/:session_id/progress-photo",
            post(sessions::progress_photo),
        )
        .route("/sessions/:session_id/three-d", post(sessions::three_d))
        .route("/sessions/:session_id/save", post(sessions::save))
        // Saved projects
        .route("/projects", get(projects::list_projects))
        .route(
            "/projects/:project_id",
            get(projects::get_project).delete(projects::delete_project),
        )
        // Saved chats
        .route("/chats", get(chats::list_chats).post(chats::save_chat))
        // Free-text AI endpoints
        .route("/ask", post(ai::ask))
        .route("/analyze/progress", post(ai::analyze_progress))
        .route("/analyze/boq", post(ai::analyze_boq))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::app::{create_app, AppState};
    use crate::config::Settings;
    use crate::services::ai_client::testing::ScriptedGateway;
    use crate::services::MemoryStore;

    const PNG_B64: &str = "iVBORw0KGgo=";

    fn app_with(gateway: ScriptedGateway, extra: &[(&str, &str)]) -> (Router, Arc<ScriptedGateway>) {
        let mut vars: HashMap<String, String> =
            HashMap::from([("GEMINI_API_KEY".to_string(), "test-key".to_string())]);
        for (k, v) in extra {
            vars.insert(k.to_string(), v.to_string());
        }
        let settings = Settings::from_lookup(|key| vars.get(key).cloned()).unwrap();

        let gateway = Arc::new(gateway);
        let state = AppState::new(
            settings,
            Arc::new(MemoryStore::new()),
            None,
            gateway.clone(),
            None,
        );
        (create_app(state), gateway)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => {
                let bytes = body.to_string();
                builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::CONTENT_LENGTH, bytes.len())
                    .body(Body::from(bytes))
                    .unwrap()
            }
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    fn generated_dashboard() -> Value {
        json!({
            "project_summary": {"title": "G+2 Residence", "type": "Residential"},
            "kpis": [{"label": "Overall Progress", "value": "20%", "status": "neutral"}],
            "wbs": [{
                "id": "T1", "name": "Brickwork", "phase": "Superstructure",
                "status": "In Progress", "progress": 20,
                "total_quantity": 500, "executed_quantity": 100, "quantity_unit": "m3"
            }],
            "boq_items": [],
            "risk_log": []
        })
    }

    #[tokio::test]
    async fn dashboard_lifecycle_over_http() {
        let gateway = ScriptedGateway::new()
            .reply_json(generated_dashboard())
            .reply_json(json!({"responseText": "Which city is the site in?"}));
        let (app, gateway) = app_with(gateway, &[]);

        let (status, session) = send(&app, Method::POST, "/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = session["session_id"].as_str().unwrap().to_string();

        let (status, view) = send(
            &app,
            Method::POST,
            &format!("/sessions/{}/generate", id),
            Some(json!({"file": {"mime_type": "image/png", "data_base64": PNG_B64}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            view["document"]["plan_base64"],
            format!("data:image/png;base64,{}", PNG_B64)
        );

        let (status, turn) = send(
            &app,
            Method::POST,
            &format!("/sessions/{}/chat", id),
            Some(json!({"message": "Check the wind load"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(turn["response_text"], "Which city is the site in?");
        assert_eq!(turn["document_replaced"], false);
        assert_eq!(gateway.requests().len(), 2);

        let (status, doc) = send(
            &app,
            Method::POST,
            &format!("/sessions/{}/tasks/T1/updates", id),
            Some(json!({"status": "In Progress", "quantity_delta": 150, "comment": "Level 1 walls"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(doc["wbs"][0]["executed_quantity"], 250.0);
        assert_eq!(doc["wbs"][0]["progress"], 50);
        assert_eq!(doc["kpis"][0]["value"], "50%");
        assert_eq!(doc["wbs"][0]["updates"][0]["user_name"], "Guest");

        let (status, saved) = send(&app, Method::POST, &format!("/sessions/{}/save", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["name"], "G+2 Residence");
        let project_id = saved["id"].as_str().unwrap().to_string();

        let (_, projects) = send(&app, Method::GET, "/projects", None).await;
        assert_eq!(projects.as_array().unwrap().len(), 1);

        let (status, _) = send(&app, Method::DELETE, &format!("/sessions/{}", id), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, Method::GET, &format!("/sessions/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, reopened) = send(
            &app,
            Method::POST,
            "/sessions",
            Some(json!({"project_id": project_id})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(reopened["project_id"], project_id.as_str());
        assert_eq!(reopened["document"]["wbs"][0]["progress"], 50);
    }

    #[tokio::test]
    async fn flow_errors_map_to_http_statuses() {
        let (app, _) = app_with(ScriptedGateway::new(), &[]);
        let (_, session) = send(&app, Method::POST, "/sessions", None).await;
        let id = session["session_id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/sessions/{}/chat", id),
            Some(json!({"message": "hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/sessions/{}/generate", id),
            Some(json!({"file": {"mime_type": "text/csv", "data_base64": PNG_B64}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/sessions/{}/generate", id),
            Some(json!({"file": {"mime_type": "image/png", "data_base64": PNG_B64}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "AI_GATEWAY_ERROR");

        let (status, _) = send(
            &app,
            Method::GET,
            "/sessions/00000000-0000-4000-8000-000000000000",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ask_auto_saves_to_chat_history() {
        let gateway = ScriptedGateway::new().reply("Clear cover for slabs is 20 mm (IS 456, Cl. 26.4.2).");
        let (app, _) = app_with(gateway, &[]);

        let (status, answer) = send(
            &app,
            Method::POST,
            "/ask",
            Some(json!({"query": "Minimum cover for slabs?"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(answer["cached"], false);

        let (_, chats) = send(&app, Method::GET, "/chats", None).await;
        let chats = chats.as_array().unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0]["query"], "Minimum cover for slabs?");
        assert_eq!(chats[0]["owner_key"], "guest");
    }

    #[tokio::test]
    async fn bearer_token_without_verification_is_rejected() {
        let (app, _) = app_with(ScriptedGateway::new(), &[]);

        let request = Request::builder()
            .uri("/me")
            .header(header::AUTHORIZATION, "Bearer abc.def.ghi")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let (status, me) = send(&app, Method::GET, "/me", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["owner_key"], "guest");
        assert_eq!(me["guest"], true);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let (app, gateway) = app_with(ScriptedGateway::new(), &[("MAX_UPLOAD_BYTES", "64")]);
        let (_, session) = send(&app, Method::POST, "/sessions", None).await;
        let id = session["session_id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/sessions/{}/generate", id),
            Some(json!({"file": {"mime_type": "image/png", "data_base64": "A".repeat(256)}})),
        )
        .await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(gateway.requests().is_empty());
    }

    #[tokio::test]
    async fn health_reports_memory_storage() {
        let (app, _) = app_with(ScriptedGateway::new(), &[]);
        let (status, health) = send(&app, Method::GET, "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["services"]["storage_backend"], "memory");
        assert_eq!(health["services"]["redis"], "disabled");
        assert_eq!(health["open_sessions"], 0);

        send(&app, Method::POST, "/sessions", None).await;
        let (_, health) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(health["open_sessions"], 1);
    }
}
