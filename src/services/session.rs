//! Editing sessions
//!
//! Each open dashboard editor is an `EditingSession`: the document store, the
//! chat transcript, the saved-project id and a per-operation in-flight guard.
//! Sessions are passed explicitly to every flow; nothing is global.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::{ChatMessage, DashboardDocument, SaveProject, SavedProject, SessionView};
use crate::error::FlowError;
use crate::services::storage::ProjectStore;
use crate::services::store::DashboardStore;

/// Kinds of suspending operations, each limited to one in flight per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Generate,
    Chat,
    ProgressPhoto,
    ThreeD,
}

/// Operations whose result replaces the whole document from an earlier
/// snapshot. Task updates wait for these to finish.
const DOCUMENT_REPLACING: [OperationKind; 3] = [
    OperationKind::Generate,
    OperationKind::Chat,
    OperationKind::ProgressPhoto,
];

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Generate => "dashboard generation",
            Self::Chat => "chat",
            Self::ProgressPhoto => "progress photo",
            Self::ThreeD => "3D analysis",
        };
        f.write_str(name)
    }
}

/// Mutable state of one session. Never held across an `.await`.
#[derive(Debug, Default)]
pub struct SessionState {
    pub store: DashboardStore,
    pub transcript: Vec<ChatMessage>,
    pub project_id: Option<String>,
    pub last_saved: Option<DateTime<Utc>>,
}

pub struct EditingSession {
    id: Uuid,
    owner_key: String,
    state: Mutex<SessionState>,
    in_flight: Mutex<HashSet<OperationKind>>,
    closed: AtomicBool,
    last_touched: Mutex<Instant>,
}

/// RAII permit returned by [`EditingSession::try_begin`].
pub struct InFlightPermit<'a> {
    session: &'a EditingSession,
    kind: OperationKind,
}

impl Drop for InFlightPermit<'_> {
    fn drop(&mut self) {
        self.session.in_flight.lock().remove(&self.kind);
    }
}

impl EditingSession {
    fn new(owner_key: &str, state: SessionState) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_key: owner_key.to_string(),
            state: Mutex::new(state),
            in_flight: Mutex::new(HashSet::new()),
            closed: AtomicBool::new(false),
            last_touched: Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn owner_key(&self) -> &str {
        &self.owner_key
    }

    pub fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock()
    }

    /// Clone of the current document, for building a gateway request.
    pub fn document_snapshot(&self) -> Result<DashboardDocument, FlowError> {
        self.state
            .lock()
            .store
            .document()
            .cloned()
            .ok_or(FlowError::NoDocument)
    }

    pub fn plan_image(&self) -> Option<String> {
        self.state
            .lock()
            .store
            .document()
            .and_then(|d| d.plan_image.clone())
    }

    /// Claim the in-flight slot for `kind`, or fail if one is already pending.
    pub fn try_begin(&self, kind: OperationKind) -> Result<InFlightPermit<'_>, FlowError> {
        if self.is_closed() {
            return Err(FlowError::SessionClosed);
        }
        if !self.in_flight.lock().insert(kind) {
            return Err(FlowError::Busy(kind));
        }
        Ok(InFlightPermit {
            session: self,
            kind,
        })
    }

    /// A pending operation that will replace the whole document, if any.
    pub fn pending_replacement(&self) -> Option<OperationKind> {
        let in_flight = self.in_flight.lock();
        DOCUMENT_REPLACING
            .into_iter()
            .find(|kind| in_flight.contains(kind))
    }

    fn has_pending(&self) -> bool {
        !self.in_flight.lock().is_empty()
    }

    fn touch(&self) {
        *self.last_touched.lock() = Instant::now();
    }

    fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_touched.lock())
    }

    fn project_id(&self) -> Option<String> {
        self.state.lock().project_id.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Lock the state for applying a flow result, unless the session closed
    /// while the result was pending.
    pub fn lock_open(&self) -> Result<MutexGuard<'_, SessionState>, FlowError> {
        let state = self.state.lock();
        if self.is_closed() {
            tracing::debug!(session_id = %self.id, "Dropping result for closed session");
            return Err(FlowError::SessionClosed);
        }
        Ok(state)
    }

    pub fn view(&self) -> SessionView {
        let state = self.state.lock();
        SessionView {
            session_id: self.id,
            project_id: state.project_id.clone(),
            last_saved: state.last_saved,
            document: state.store.document().cloned(),
            transcript: state.transcript.clone(),
        }
    }

    fn close(&self) {
        // Taken under the state lock so no result is applied after closing.
        let mut state = self.state.lock();
        self.closed.store(true, Ordering::Release);
        state.store.clear();
        state.transcript.clear();
    }
}

/// All open editing sessions, keyed by id.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<EditingSession>>>>,
}

pub const NEW_PROJECT_GREETING: &str = "Upload a 2D plan or tender document and I will build the project dashboard for you.";
pub const LOADED_PROJECT_GREETING: &str = "Hello! I am your AI Project Assistant. I can help you adjust the schedule, modify BOQ quantities, or verify compliance with IS Codes. Just ask!";

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session on an empty, unsaved project.
    pub fn open_new(&self, owner_key: &str) -> Arc<EditingSession> {
        let state = SessionState {
            transcript: vec![ChatMessage::ai(NEW_PROJECT_GREETING)],
            ..SessionState::default()
        };
        self.insert(EditingSession::new(owner_key, state))
    }

    /// Open a session on a saved project.
    ///
    /// Any other session the owner has open on the same project is closed.
    pub fn open_saved(&self, owner_key: &str, project: SavedProject) -> Arc<EditingSession> {
        let superseded: Vec<Uuid> = self
            .sessions
            .read()
            .values()
            .filter(|s| s.owner_key() == owner_key)
            .filter(|s| s.project_id().as_deref() == Some(project.id.as_str()))
            .map(|s| s.id())
            .collect();
        for id in superseded {
            if self.close(id, owner_key) {
                tracing::info!(session_id = %id, project_id = %project.id, "Session superseded");
            }
        }

        let state = SessionState {
            store: DashboardStore::new(Some(project.document)),
            transcript: vec![ChatMessage::ai(LOADED_PROJECT_GREETING)],
            project_id: Some(project.id),
            last_saved: Some(project.last_modified),
        };
        self.insert(EditingSession::new(owner_key, state))
    }

    fn insert(&self, session: EditingSession) -> Arc<EditingSession> {
        let session = Arc::new(session);
        self.sessions.write().insert(session.id(), session.clone());
        tracing::info!(
            session_id = %session.id(),
            owner = session.owner_key(),
            "Editing session opened"
        );
        session
    }

    /// Look up a session owned by `owner_key`, marking it as used.
    pub fn get(&self, id: Uuid, owner_key: &str) -> Option<Arc<EditingSession>> {
        let session = self
            .sessions
            .read()
            .get(&id)
            .filter(|s| s.owner_key() == owner_key)
            .cloned()?;
        session.touch();
        Some(session)
    }

    /// Close and forget a session. Pending flows drop their results.
    pub fn close(&self, id: Uuid, owner_key: &str) -> bool {
        let removed = {
            let mut sessions = self.sessions.write();
            match sessions.get(&id) {
                Some(s) if s.owner_key() == owner_key => sessions.remove(&id),
                _ => None,
            }
        };

        match removed {
            Some(session) => {
                session.close();
                tracing::info!(session_id = %id, "Editing session closed");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Close every session untouched for at least `idle_ttl`.
    ///
    /// Sessions with an operation in flight are skipped until it finishes.
    pub fn evict_idle(&self, idle_ttl: Duration) -> usize {
        let now = Instant::now();
        let expired: Vec<(Uuid, String)> = self
            .sessions
            .read()
            .values()
            .filter(|s| !s.has_pending() && s.idle_for(now) >= idle_ttl)
            .map(|s| (s.id(), s.owner_key().to_string()))
            .collect();

        expired
            .into_iter()
            .filter(|(id, owner_key)| self.close(*id, owner_key))
            .count()
    }

    /// Periodically evict idle sessions for as long as the runtime lives.
    pub fn spawn_idle_sweeper(&self, idle_ttl: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        let period = idle_ttl.min(Duration::from_secs(60));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let evicted = registry.evict_idle(idle_ttl);
                if evicted > 0 {
                    tracing::info!(
                        evicted,
                        open = registry.len(),
                        "Evicted idle editing sessions"
                    );
                }
            }
        })
    }
}

/// Persist the session's document as a saved project.
///
/// The first save assigns the project id; later saves upsert the same record.
pub async fn save_session(
    session: &EditingSession,
    store: &dyn ProjectStore,
) -> Result<SavedProject, FlowError> {
    let (document, existing_id) = {
        let state = session.lock_open()?;
        let document = state.store.document().cloned().ok_or(FlowError::NoDocument)?;
        (document, state.project_id.clone())
    };

    let saved = store
        .save_project(
            session.owner_key(),
            SaveProject {
                existing_id,
                document,
            },
        )
        .await?;

    if let Ok(mut state) = session.lock_open() {
        state.project_id = Some(saved.id.clone());
        state.last_saved = Some(saved.last_modified);
    }

    tracing::info!(
        session_id = %session.id(),
        project_id = %saved.id,
        owner = session.owner_key(),
        "Project saved"
    );
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::MemoryStore;

    #[test]
    fn in_flight_guard_is_per_kind() {
        let registry = SessionRegistry::new();
        let session = registry.open_new("guest");

        let chat = session.try_begin(OperationKind::Chat).unwrap();
        assert!(matches!(
            session.try_begin(OperationKind::Chat),
            Err(FlowError::Busy(OperationKind::Chat))
        ));
        let _photo = session.try_begin(OperationKind::ProgressPhoto).unwrap();

        drop(chat);
        assert!(session.try_begin(OperationKind::Chat).is_ok());
    }

    #[test]
    fn sessions_are_scoped_to_their_owner() {
        let registry = SessionRegistry::new();
        let session = registry.open_new("asha@example.com");

        assert!(registry.get(session.id(), "asha@example.com").is_some());
        assert!(registry.get(session.id(), "guest").is_none());
        assert!(!registry.close(session.id(), "guest"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn closed_session_rejects_results() {
        let registry = SessionRegistry::new();
        let session = registry.open_new("guest");

        assert!(registry.close(session.id(), "guest"));

        assert!(session.is_closed());
        assert!(matches!(session.lock_open(), Err(FlowError::SessionClosed)));
        assert!(matches!(
            session.try_begin(OperationKind::Generate),
            Err(FlowError::SessionClosed)
        ));
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn repeated_saves_reuse_the_project_id() {
        let registry = SessionRegistry::new();
        let store = MemoryStore::new();
        let session = registry.open_new("guest");

        assert!(matches!(
            save_session(&session, &store).await,
            Err(FlowError::NoDocument)
        ));

        session.state().store = DashboardStore::new(Some(DashboardDocument::default()));
        let first = save_session(&session, &store).await.unwrap();
        let second = save_session(&session, &store).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.list_projects("guest").await.unwrap().len(), 1);
        assert_eq!(session.view().project_id, Some(first.id));
    }

    fn saved(id: &str) -> SavedProject {
        let now = Utc::now();
        SavedProject {
            id: id.into(),
            owner_key: "guest".into(),
            name: "Tank".into(),
            created_at: now,
            last_modified: now,
            document: DashboardDocument {
                plan_image: Some("data:image/png;base64,iVBORw0KGgo=".into()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn reopening_a_project_supersedes_its_earlier_session() {
        let registry = SessionRegistry::new();
        let first = registry.open_saved("guest", saved("p-1"));
        let other = registry.open_saved("guest", saved("p-2"));
        let someone_else = registry.open_saved("asha@example.com", saved("p-1"));

        let mut latest = registry.open_saved("guest", saved("p-1"));
        for _ in 0..100 {
            latest = registry.open_saved("guest", saved("p-1"));
        }

        assert!(first.is_closed());
        assert!(first.view().document.is_none());
        assert!(!other.is_closed());
        assert!(!someone_else.is_closed());
        assert!(!latest.is_closed());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn idle_sessions_are_evicted_unless_busy() {
        let registry = SessionRegistry::new();
        let idle = registry.open_saved("guest", saved("p-1"));
        let busy = registry.open_new("guest");
        let permit = busy.try_begin(OperationKind::Chat).unwrap();

        assert_eq!(registry.evict_idle(Duration::from_secs(3600)), 0);
        assert_eq!(registry.evict_idle(Duration::ZERO), 1);

        assert!(idle.is_closed());
        assert!(registry.get(idle.id(), "guest").is_none());
        assert!(!busy.is_closed());

        drop(permit);
        assert_eq!(registry.evict_idle(Duration::ZERO), 1);
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_closes_sessions_left_open() {
        let registry = SessionRegistry::new();
        let abandoned = registry.open_new("guest");
        let active = registry.open_new("guest");
        let sweeper = registry.spawn_idle_sweeper(Duration::from_secs(120));

        tokio::time::sleep(Duration::from_secs(90)).await;
        assert!(registry.get(active.id(), "guest").is_some());

        tokio::time::sleep(Duration::from_secs(90)).await;
        tokio::task::yield_now().await;

        assert!(abandoned.is_closed());
        assert!(!active.is_closed());
        assert_eq!(registry.len(), 1);
        sweeper.abort();
    }

    #[test]
    fn document_replacing_operations_are_reported_as_pending() {
        let registry = SessionRegistry::new();
        let session = registry.open_new("guest");

        let three_d = session.try_begin(OperationKind::ThreeD).unwrap();
        assert_eq!(session.pending_replacement(), None);

        let chat = session.try_begin(OperationKind::Chat).unwrap();
        assert_eq!(session.pending_replacement(), Some(OperationKind::Chat));

        drop(chat);
        drop(three_d);
        assert_eq!(session.pending_replacement(), None);
    }

    #[test]
    fn saved_project_opens_with_its_document() {
        let registry = SessionRegistry::new();
        let now = Utc::now();
        let project = SavedProject {
            id: "p-1".into(),
            owner_key: "guest".into(),
            name: "Tank".into(),
            created_at: now,
            last_modified: now,
            document: DashboardDocument::default(),
        };

        let session = registry.open_saved("guest", project);
        let view = session.view();

        assert_eq!(view.project_id.as_deref(), Some("p-1"));
        assert_eq!(view.last_saved, Some(now));
        assert!(view.document.is_some());
        assert_eq!(view.transcript.len(), 1);
    }
}
