mod app;
mod auth;
mod config;
mod db;
mod domain;
mod error;
mod logging;
mod middleware;
mod routes;
mod services;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use config::{Settings, StorageBackend};
use services::{AiGateway, GeminiClient, MemoryStore, PgStore, ProjectStore, RedisCache};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;

    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        storage = ?settings.storage_backend,
        "Starting IS Code backend"
    );

    let store = build_store(&settings).await?;

    // Q&A cache is optional; the service runs without it
    let cache = match settings.redis_url.as_deref() {
        Some(url) => match RedisCache::new(url, settings.redis_cache_ttl_seconds).await {
            Ok(cache) => Some(cache),
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable - Q&A answers will not be cached");
                None
            }
        },
        None => {
            tracing::info!("REDIS_URL not set - Q&A cache disabled");
            None
        }
    };

    let gateway: Arc<dyn AiGateway> = Arc::new(GeminiClient::new(
        &settings.gemini_base_url,
        &settings.gemini_api_key,
        &settings.gemini_text_model,
        &settings.gemini_vision_model,
        settings.ai_timeout_seconds,
    )?);

    // Check AI gateway health without blocking startup
    tokio::spawn({
        let gateway = gateway.clone();
        async move {
            match gateway.health_check().await {
                Ok(()) => tracing::info!("AI gateway is healthy"),
                Err(e) => tracing::warn!(error = %e, "AI gateway health check failed - will retry on first request"),
            }
        }
    });

    let jwks_cache = match settings.jwt.clone() {
        Some(jwt) => {
            let jwks_cache = auth::JwksCache::new(jwt)?;
            if let Err(e) = jwks_cache.warm_cache().await {
                tracing::warn!(error = %e, "Failed to warm JWKS cache - will fetch on first request");
            }
            Some(jwks_cache)
        }
        None => {
            tracing::info!("JWT verification not configured - all requests run as guest");
            None
        }
    };

    let state = app::AppState::new(settings.clone(), store, cache, gateway, jwks_cache);

    // Sessions abandoned without DELETE are closed after the idle TTL
    state
        .sessions
        .spawn_idle_sweeper(Duration::from_secs(settings.session_idle_ttl_seconds));

    let app = app::create_app(state);

    let listener = tokio::net::TcpListener::bind(&settings.server_addr)
        .await
        .with_context(|| format!("Failed to bind {}", settings.server_addr))?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_store(settings: &Settings) -> Result<Arc<dyn ProjectStore>> {
    match settings.storage_backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage - saved projects are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Postgres => {
            let url = settings
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set when STORAGE_BACKEND=postgres")?;
            let pool = db::create_pool(url, settings.database_max_connections).await?;
            Ok(Arc::new(PgStore::new(pool)))
        }
    }
}
