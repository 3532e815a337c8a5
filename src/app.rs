use axum::{extract::DefaultBodyLimit, http::HeaderValue, Router};
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::auth::JwksCache;
use crate::config::Settings;
use crate::middleware::request_id_layer;
use crate::routes;
use crate::services::{AiGateway, ProjectStore, RedisCache, SessionRegistry};

/// Shared application state
pub struct AppState {
    pub settings: Settings,
    pub store: Arc<dyn ProjectStore>,
    /// Q&A answer cache; `None` when Redis is not configured or unreachable.
    pub cache: Option<RedisCache>,
    pub gateway: Arc<dyn AiGateway>,
    pub sessions: SessionRegistry,
    /// `None` when token verification is not configured (guest-only).
    pub jwks_cache: Option<JwksCache>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        store: Arc<dyn ProjectStore>,
        cache: Option<RedisCache>,
        gateway: Arc<dyn AiGateway>,
        jwks_cache: Option<JwksCache>,
    ) -> Arc<Self> {
        Arc::new(Self {
            settings,
            store,
            cache,
            gateway,
            sessions: SessionRegistry::new(),
            jwks_cache,
        })
    }
}

/// Build the complete application with all middleware
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state.settings);
    let max_upload_bytes = state.settings.max_upload_bytes;

    // Build trace layer (use DEBUG for spans to reduce overhead at INFO level)
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    let (set_request_id, propagate_request_id) = request_id_layer();

    // Routes at root level, no /api prefix
    Router::new()
        .merge(routes::api_router())
        // Uploads travel as base64 JSON; lift axum's 2 MB default and cap
        // the raw body instead.
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        // Middleware stack (applied bottom-up)
        .layer(propagate_request_id)
        .layer(trace_layer)
        .layer(set_request_id)
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors_allow_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let max_age = if settings.env.is_dev() {
        std::time::Duration::from_secs(86400)
    } else {
        std::time::Duration::from_secs(3600)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::list([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            axum::http::HeaderName::from_static("x-request-id"),
        ]))
        .allow_credentials(true)
        .max_age(max_age)
}
