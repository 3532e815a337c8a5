//! Redis cache for construction Q&A answers.
//!
//! Values are serialized with serde_json and expire after the configured TTL.
//! Cache failures are logged and treated as misses; they never fail a request.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Redis cache client with connection pooling.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    default_ttl: Duration,
}

impl RedisCache {
    pub async fn new(redis_url: &str, default_ttl_seconds: u64) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        tracing::info!(ttl_secs = default_ttl_seconds, "Redis cache connected");

        Ok(Self {
            conn,
            default_ttl: Duration::from_secs(default_ttl_seconds),
        })
    }

    #[instrument(skip(self), fields(cache_hit))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.conn.clone();

        let hit = match conn.get::<_, Option<String>>(key).await {
            Ok(Some(data)) => match serde_json::from_str(&data) {
                Ok(value) => {
                    debug!(key = key, "Cache hit");
                    Some(value)
                }
                Err(e) => {
                    warn!(key = key, error = %e, "Failed to deserialize cached value");
                    None
                }
            },
            Ok(None) => {
                debug!(key = key, "Cache miss");
                None
            }
            Err(e) => {
                error!(key = key, error = %e, "Redis get error");
                None
            }
        };

        tracing::Span::current().record("cache_hit", hit.is_some());
        hit
    }

    /// Set a value with the default TTL.
    #[instrument(skip(self, value))]
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let mut conn = self.conn.clone();

        let data = serde_json::to_string(value).context("Failed to serialize value for cache")?;

        conn.set_ex::<_, _, ()>(key, data, self.default_ttl.as_secs())
            .await
            .context("Failed to set cache value")?;

        debug!(key = key, ttl_secs = self.default_ttl.as_secs(), "Cached value");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis health check failed")?;
        Ok(())
    }
}

/// Cache key builders.
pub mod keys {
    use sha2::{Digest, Sha256};

    /// Hash of a normalized question, so trivially different spellings
    /// ("Cover for slabs? " vs "cover for slabs?") share an entry.
    pub fn question_hash(query: &str) -> String {
        let normalized = query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Q&A answer cache key
    pub fn qna(query: &str) -> String {
        format!("ai:qna:{}", question_hash(query))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn qna_key_ignores_case_and_spacing() {
            assert_eq!(
                qna("Minimum cover for slabs?"),
                qna("  minimum   COVER for slabs? ")
            );
            assert_ne!(qna("cover for slabs"), qna("cover for beams"));
            assert!(qna("x").starts_with("ai:qna:"));
            assert_eq!(question_hash("x").len(), 64);
        }
    }
}
