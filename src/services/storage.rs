//! Saved-project and saved-chat persistence.
//!
//! Two backends share the same upsert/cap semantics:
//! - `MemoryStore`: process-local, keyed by owner
//! - `PgStore`: PostgreSQL via sqlx
//!
//! Both are last-writer-wins.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{DashboardDocument, SaveProject, SavedChat, SavedProject, MAX_SAVED_CHATS};

#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Saved projects for `owner`, newest first.
    async fn list_projects(&self, owner: &str) -> Result<Vec<SavedProject>>;

    async fn get_project(&self, owner: &str, id: &str) -> Result<Option<SavedProject>>;

    /// Upsert by `existing_id` within the owner's list.
    async fn save_project(&self, owner: &str, save: SaveProject) -> Result<SavedProject>;

    async fn delete_project(&self, owner: &str, id: &str) -> Result<bool>;

    /// Prepend a chat and keep only the most recent entries.
    async fn save_chat(&self, owner: &str, query: &str, response: &str) -> Result<SavedChat>;

    /// Saved chats for `owner`, newest first.
    async fn list_chats(&self, owner: &str) -> Result<Vec<SavedChat>>;

    async fn health_check(&self) -> Result<()>;

    fn backend_name(&self) -> &'static str;
}

/// Apply a save to one owner's project list.
///
/// A known id is replaced in place, keeping its `created_at`; anything else
/// is prepended under the supplied id or a fresh UUID.
pub fn upsert_project(
    projects: &mut Vec<SavedProject>,
    owner: &str,
    save: SaveProject,
    now: DateTime<Utc>,
) -> SavedProject {
    let name = save.document.display_name().to_string();

    if let Some(id) = save.existing_id.as_deref() {
        if let Some(existing) = projects.iter_mut().find(|p| p.id == id) {
            existing.name = name;
            existing.document = save.document;
            existing.last_modified = now;
            return existing.clone();
        }
    }

    let project = SavedProject {
        id: save.existing_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        owner_key: owner.to_string(),
        name,
        created_at: now,
        last_modified: now,
        document: save.document,
    };
    projects.insert(0, project.clone());
    project
}

/// Prepend a chat to one owner's history and truncate to the cap.
pub fn push_chat(chats: &mut Vec<SavedChat>, chat: SavedChat) {
    chats.insert(0, chat);
    chats.truncate(MAX_SAVED_CHATS);
}

fn new_chat(owner: &str, query: &str, response: &str) -> SavedChat {
    SavedChat {
        id: Uuid::new_v4().to_string(),
        owner_key: owner.to_string(),
        query: query.to_string(),
        response: response.to_string(),
        created_at: Utc::now(),
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    projects: RwLock<HashMap<String, Vec<SavedProject>>>,
    chats: RwLock<HashMap<String, Vec<SavedChat>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn list_projects(&self, owner: &str) -> Result<Vec<SavedProject>> {
        Ok(self.projects.read().get(owner).cloned().unwrap_or_default())
    }

    async fn get_project(&self, owner: &str, id: &str) -> Result<Option<SavedProject>> {
        Ok(self
            .projects
            .read()
            .get(owner)
            .and_then(|list| list.iter().find(|p| p.id == id).cloned()))
    }

    async fn save_project(&self, owner: &str, save: SaveProject) -> Result<SavedProject> {
        let mut projects = self.projects.write();
        let list = projects.entry(owner.to_string()).or_default();
        Ok(upsert_project(list, owner, save, Utc::now()))
    }

    async fn delete_project(&self, owner: &str, id: &str) -> Result<bool> {
        let mut projects = self.projects.write();
        let Some(list) = projects.get_mut(owner) else {
            return Ok(false);
        };
        let before = list.len();
        list.retain(|p| p.id != id);
        Ok(list.len() != before)
    }

    async fn save_chat(&self, owner: &str, query: &str, response: &str) -> Result<SavedChat> {
        let chat = new_chat(owner, query, response);
        let mut chats = self.chats.write();
        push_chat(chats.entry(owner.to_string()).or_default(), chat.clone());
        Ok(chat)
    }

    async fn list_chats(&self, owner: &str) -> Result<Vec<SavedChat>> {
        Ok(self.chats.read().get(owner).cloned().unwrap_or_default())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

// ============================================================================
// PostgreSQL backend
// ============================================================================

/// Database row for a saved project
#[derive(Debug, sqlx::FromRow)]
struct SavedProjectRow {
    id: String,
    owner_key: String,
    name: String,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    document: sqlx::types::Json<DashboardDocument>,
}

impl From<SavedProjectRow> for SavedProject {
    fn from(row: SavedProjectRow) -> Self {
        Self {
            id: row.id,
            owner_key: row.owner_key,
            name: row.name,
            created_at: row.created_at,
            last_modified: row.last_modified,
            document: row.document.0,
        }
    }
}

/// Database row for a saved chat
#[derive(Debug, sqlx::FromRow)]
struct SavedChatRow {
    id: String,
    owner_key: String,
    query: String,
    response: String,
    created_at: DateTime<Utc>,
}

impl From<SavedChatRow> for SavedChat {
    fn from(row: SavedChatRow) -> Self {
        Self {
            id: row.id,
            owner_key: row.owner_key,
            query: row.query,
            response: row.response,
            created_at: row.created_at,
        }
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectStore for PgStore {
    async fn list_projects(&self, owner: &str) -> Result<Vec<SavedProject>> {
        let rows = sqlx::query_as::<_, SavedProjectRow>(
            r#"
            SELECT id, owner_key, name, created_at, last_modified, document
            FROM saved_projects
            WHERE owner_key = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list saved projects")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_project(&self, owner: &str, id: &str) -> Result<Option<SavedProject>> {
        let row = sqlx::query_as::<_, SavedProjectRow>(
            r#"
            SELECT id, owner_key, name, created_at, last_modified, document
            FROM saved_projects
            WHERE owner_key = $1 AND id = $2
            "#,
        )
        .bind(owner)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load saved project")?;

        Ok(row.map(Into::into))
    }

    async fn save_project(&self, owner: &str, save: SaveProject) -> Result<SavedProject> {
        let id = save
            .existing_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let name = save.document.display_name().to_string();
        let now = Utc::now();

        // created_at is only written on insert, so re-saves keep their slot.
        let row = sqlx::query_as::<_, SavedProjectRow>(
            r#"
            INSERT INTO saved_projects (owner_key, id, name, created_at, last_modified, document)
            VALUES ($1, $2, $3, $4, $4, $5)
            ON CONFLICT (owner_key, id) DO UPDATE
            SET name = EXCLUDED.name,
                last_modified = EXCLUDED.last_modified,
                document = EXCLUDED.document
            RETURNING id, owner_key, name, created_at, last_modified, document
            "#,
        )
        .bind(owner)
        .bind(&id)
        .bind(&name)
        .bind(now)
        .bind(sqlx::types::Json(&save.document))
        .fetch_one(&self.pool)
        .await
        .context("Failed to save project")?;

        Ok(row.into())
    }

    async fn delete_project(&self, owner: &str, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM saved_projects WHERE owner_key = $1 AND id = $2")
            .bind(owner)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete saved project")?;

        Ok(result.rows_affected() > 0)
    }

    async fn save_chat(&self, owner: &str, query: &str, response: &str) -> Result<SavedChat> {
        let chat = new_chat(owner, query, response);
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query(
            r#"
            INSERT INTO saved_chats (id, owner_key, query, response, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&chat.id)
        .bind(&chat.owner_key)
        .bind(&chat.query)
        .bind(&chat.response)
        .bind(chat.created_at)
        .execute(&mut *tx)
        .await
        .context("Failed to save chat")?;

        sqlx::query(
            r#"
            DELETE FROM saved_chats
            WHERE owner_key = $1
              AND id NOT IN (
                SELECT id FROM saved_chats
                WHERE owner_key = $1
                ORDER BY created_at DESC
                LIMIT $2
              )
            "#,
        )
        .bind(owner)
        .bind(MAX_SAVED_CHATS as i64)
        .execute(&mut *tx)
        .await
        .context("Failed to trim chat history")?;

        tx.commit().await.context("Failed to commit chat save")?;
        Ok(chat)
    }

    async fn list_chats(&self, owner: &str) -> Result<Vec<SavedChat>> {
        let rows = sqlx::query_as::<_, SavedChatRow>(
            r#"
            SELECT id, owner_key, query, response, created_at
            FROM saved_chats
            WHERE owner_key = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(owner)
        .bind(MAX_SAVED_CHATS as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list saved chats")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database health check failed")?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
