use anyhow::{bail, Context, Result};
use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }
}

/// Where saved projects and chats live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl StorageBackend {
    fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => bail!("Unknown STORAGE_BACKEND '{}' (expected memory or postgres)", other),
        }
    }
}

/// Verified-token settings. Absent when `SUPABASE_JWT_JWKS_URL` is unset.
#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub jwks_url: String,
    pub issuer: String,
    pub audience: String,
    pub cache_ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub server_addr: String,

    // Storage
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    // Redis
    pub redis_url: Option<String>,
    pub redis_cache_ttl_seconds: u64,

    // CORS
    pub cors_allow_origins: Vec<String>,

    // Supabase Auth
    pub jwt: Option<JwtSettings>,

    // AI gateway
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub gemini_text_model: String,
    pub gemini_vision_model: String,
    pub ai_timeout_seconds: u64,

    // Uploads
    pub max_upload_bytes: usize,

    // Editing sessions
    pub session_idle_ttl_seconds: u64,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parsed = |key: &str, default: u64| -> u64 {
            var(key).and_then(|s| s.trim().parse().ok()).unwrap_or(default)
        };

        let env = Environment::from_str(&var("ENV").unwrap_or_else(|| "dev".to_string()));
        let server_addr = var("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string());

        // Storage
        let storage_backend =
            StorageBackend::parse(&var("STORAGE_BACKEND").unwrap_or_else(|| "memory".to_string()))?;
        let database_url = var("DATABASE_URL");
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set when STORAGE_BACKEND=postgres");
        }
        let database_max_connections = parsed("DATABASE_MAX_CONNECTIONS", 10) as u32;

        // Redis
        let redis_url = var("REDIS_URL");
        let redis_cache_ttl_seconds = parsed("REDIS_CACHE_TTL_SECONDS", 3600); // 1 hour default

        // CORS
        let cors_allow_origins = var("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Supabase Auth
        let jwt = match var("SUPABASE_JWT_JWKS_URL") {
            Some(jwks_url) => Some(JwtSettings {
                jwks_url,
                issuer: var("SUPABASE_JWT_ISSUER")
                    .context("SUPABASE_JWT_ISSUER must be set with SUPABASE_JWT_JWKS_URL")?,
                audience: var("SUPABASE_JWT_AUDIENCE")
                    .unwrap_or_else(|| "authenticated".to_string()),
                cache_ttl_seconds: parsed("JWKS_CACHE_TTL_SECONDS", 1800), // 30 minutes default
            }),
            None => None,
        };

        // AI gateway
        let gemini_api_key = var("GEMINI_API_KEY").context("GEMINI_API_KEY must be set")?;
        let gemini_base_url = var("GEMINI_BASE_URL")
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string());
        let gemini_text_model =
            var("GEMINI_TEXT_MODEL").unwrap_or_else(|| "gemini-3-pro-preview".to_string());
        let gemini_vision_model =
            var("GEMINI_VISION_MODEL").unwrap_or_else(|| "gemini-3-flash-preview".to_string());
        let ai_timeout_seconds = parsed("AI_TIMEOUT_SECONDS", 120); // 2 minutes default for LLM calls

        let max_upload_bytes = parsed("MAX_UPLOAD_BYTES", 20 * 1024 * 1024) as usize;

        let session_idle_ttl_seconds = parsed("SESSION_IDLE_TTL_SECONDS", 3600); // 1 hour default
        if session_idle_ttl_seconds == 0 {
            bail!("SESSION_IDLE_TTL_SECONDS must be greater than zero");
        }

        Ok(Settings {
            env,
            server_addr,
            storage_backend,
            database_url,
            database_max_connections,
            redis_url,
            redis_cache_ttl_seconds,
            cors_allow_origins,
            jwt,
            gemini_api_key,
            gemini_base_url,
            gemini_text_model,
            gemini_vision_model,
            ai_timeout_seconds,
            max_upload_bytes,
            session_idle_ttl_seconds,
        })
    }
}
