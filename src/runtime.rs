//! Workflow runtime
//!
//! Applies actions to stored sessions. Each action runs the pipeline
//! permission → legality → invariants → persist → audit under a per-session
//! lock, so a session has a single writer while different sessions proceed in
//! parallel. A rejected action writes nothing.

pub mod memory;
pub mod traits;

pub use memory::{MemoryAuditLog, MemorySessionStore, DEFAULT_AUDIT_CAPACITY};
pub use traits::*;

use crate::audit::{AuditEntry, AuditFilter, RequestContext, DEFAULT_RECENT_LIMIT};
use crate::state_machine::{
    transition, Action, Effect, FireSession, NewSession, SessionState, TransitionError, Zone,
};
use crate::trust::{self, TrustError, User, UserDirectory};
use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

/// Errors surfaced by the runtime
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Session does not exist: {0}")]
    SessionNotFound(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Trust(#[from] TrustError),
    #[error("Storage failure: {0}")]
    Store(#[from] StoreError),
}

impl WorkflowError {
    /// Stable code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            WorkflowError::Transition(e) => e.code(),
            WorkflowError::Trust(e) => e.code(),
            WorkflowError::Store(_) => "STORAGE_ERROR",
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Runtime behaviour switches
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Apply per-action trust-level requirements on top of permissions
    pub enforce_trust: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            enforce_trust: true,
        }
    }
}

/// Owns the stores and serializes writers per session id
pub struct WorkflowRuntime {
    sessions: Arc<dyn SessionStore>,
    audit: Arc<dyn AuditStore>,
    users: UserDirectory,
    options: RuntimeOptions,
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl WorkflowRuntime {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        audit: Arc<dyn AuditStore>,
        users: UserDirectory,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            sessions,
            audit,
            users,
            options,
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// In-memory runtime with the demo roster
    #[allow(dead_code)] // Used in tests
    pub fn in_memory(audit_capacity: usize) -> Self {
        Self::new(
            Arc::new(MemorySessionStore::new()),
            Arc::new(MemoryAuditLog::new(audit_capacity)),
            UserDirectory::demo(),
            RuntimeOptions::default(),
        )
    }

    async fn session_lock(&self, id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().await.get(id) {
            return lock.clone();
        }
        self.locks
            .write()
            .await
            .entry(id.to_string())
            .or_default()
            .clone()
    }

    /// Drop the table entry for `id` once no other caller holds or awaits it
    async fn release_lock(&self, id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.write().await;
        let ours = locks.get(id).is_some_and(|held| Arc::ptr_eq(held, &lock));
        // One reference in the table, one here
        if ours && Arc::strong_count(&lock) == 2 {
            locks.remove(id);
        }
    }

    // ==================== Actions ====================

    /// Apply `action` to session `session_id` on behalf of `user`
    pub async fn dispatch(
        &self,
        user: &User,
        session_id: &str,
        action: &Action,
        context: &RequestContext,
    ) -> WorkflowResult<FireSession> {
        let lock = self.session_lock(session_id).await;
        let outcome = {
            let _guard = lock.lock().await;
            self.apply(user, session_id, action, context).await
        };
        self.release_lock(session_id, lock).await;
        outcome
    }

    async fn apply(
        &self,
        user: &User,
        session_id: &str,
        action: &Action,
        context: &RequestContext,
    ) -> WorkflowResult<FireSession> {
        let current = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| WorkflowError::SessionNotFound(session_id.to_string()))?;

        let kind = action.kind();
        let outcome = trust::authorize(user, kind, self.options.enforce_trust)
            .map_err(WorkflowError::from)
            .and_then(|()| transition(&current, action, Utc::now()).map_err(WorkflowError::from));

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    user_id = %user.id,
                    action = %kind,
                    state = %current.state,
                    code = e.code(),
                    error = %e,
                    "Action rejected"
                );
                return Err(e);
            }
        };

        let updated = result.new_session;
        let mut persisted = false;
        for effect in result.effects {
            match effect {
                Effect::PersistSession => {
                    self.sessions.put(&updated).await?;
                    persisted = true;
                }
                Effect::RecordAudit { metadata } => {
                    let entry = AuditEntry::record(
                        user,
                        action,
                        &current,
                        &updated,
                        context,
                        metadata,
                        updated.updated_at,
                    );
                    if let Err(e) = self.audit.append(&entry).await {
                        tracing::error!(
                            session_id = %session_id,
                            action = %kind,
                            error = %e,
                            "Audit append failed, restoring session"
                        );
                        if persisted {
                            self.restore(&current).await;
                        }
                        return Err(e.into());
                    }
                }
            }
        }

        tracing::info!(
            session_id = %session_id,
            user_id = %user.id,
            action = %kind,
            from = %current.state,
            to = %updated.state,
            "Action applied"
        );

        Ok(updated)
    }

    /// Put back the pre-action record after a half-applied action
    async fn restore(&self, previous: &FireSession) {
        if let Err(e) = self.sessions.put(previous).await {
            tracing::error!(session_id = %previous.id, error = %e, "Session restore failed");
        }
    }

    // ==================== Sessions ====================

    /// Open a new `READY` session
    pub async fn create_session(&self, request: NewSession) -> WorkflowResult<FireSession> {
        let id = uuid::Uuid::new_v4().to_string();
        let session = request.into_session(id, Utc::now())?;
        self.sessions.put(&session).await?;
        tracing::info!(session_id = %session.id, table = %session.table, "Session created");
        Ok(session)
    }

    /// Fill the store with randomized demo sessions; returns the new total
    pub async fn seed_sessions(&self, count: usize, reset: bool) -> WorkflowResult<usize> {
        if reset {
            self.sessions.clear().await?;
        }
        for session in random_sessions(count) {
            self.sessions.put(&session).await?;
        }
        let total = self.sessions.list().await?.len();
        tracing::info!(count, reset, total, "Seeded demo sessions");
        Ok(total)
    }

    pub async fn session(&self, id: &str) -> WorkflowResult<FireSession> {
        self.sessions
            .get(id)
            .await?
            .ok_or_else(|| WorkflowError::SessionNotFound(id.to_string()))
    }

    pub async fn sessions(&self) -> WorkflowResult<Vec<FireSession>> {
        Ok(self.sessions.list().await?)
    }

    // ==================== Audit ====================

    pub async fn audit_log(&self, filter: &AuditFilter) -> WorkflowResult<Vec<AuditEntry>> {
        Ok(self.audit.query(filter).await?)
    }

    pub async fn session_history(&self, session_id: &str) -> WorkflowResult<Vec<AuditEntry>> {
        self.audit_log(&AuditFilter::for_session(session_id)).await
    }

    pub async fn user_history(&self, user_id: &str) -> WorkflowResult<Vec<AuditEntry>> {
        self.audit_log(&AuditFilter::for_user(user_id)).await
    }

    pub async fn recent_actions(&self, limit: Option<usize>) -> WorkflowResult<Vec<AuditEntry>> {
        self.audit_log(&AuditFilter::recent(limit.unwrap_or(DEFAULT_RECENT_LIMIT)))
            .await
    }

    pub async fn export_audit(&self) -> WorkflowResult<String> {
        Ok(self.audit.export().await?)
    }

    // ==================== Users ====================

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    pub fn options(&self) -> RuntimeOptions {
        self.options
    }
}

fn random_sessions(count: usize) -> Vec<FireSession> {
    const POSITIONS: &[&str] = &["Main (2,3)", "Bar (3,1)", "Patio (1,4)"];
    const STATES: &[SessionState] = &[
        SessionState::Ready,
        SessionState::Out,
        SessionState::Delivered,
        SessionState::Active,
    ];

    let mut rng = rand::thread_rng();
    let now = Utc::now();
    (0..count)
        .map(|_| FireSession {
            id: uuid::Uuid::new_v4().to_string(),
            table: format!("T-{}", rng.gen_range(1..=12)),
            customer_label: format!("customer_{}", rng.gen_range(100..1000)),
            duration_min: rng.gen_range(0..60),
            buffer_sec: *[5, 10, 15].choose(&mut rng).unwrap_or(&10),
            zone: *Zone::ALL.choose(&mut rng).unwrap_or(&Zone::A),
            items: rng.gen_range(1..=3),
            eta_min: *[2, 3, 5].choose(&mut rng).unwrap_or(&5),
            position: (*POSITIONS.choose(&mut rng).unwrap_or(&"Main (2,3)")).to_string(),
            state: *STATES.choose(&mut rng).unwrap_or(&SessionState::Ready),
            created_at: now,
            updated_at: now,
        })
        .collect()
}
