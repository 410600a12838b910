//! Trait abstractions for runtime storage
//!
//! The runtime only sees these traits, so the in-memory and SQLite backends
//! are interchangeable.

use crate::audit::{AuditEntry, AuditFilter};
use crate::state_machine::FireSession;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Keyed storage of session records
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &str) -> StoreResult<Option<FireSession>>;

    /// Insert or replace by id
    async fn put(&self, session: &FireSession) -> StoreResult<()>;

    /// All sessions, most recently updated first
    async fn list(&self) -> StoreResult<Vec<FireSession>>;

    async fn clear(&self) -> StoreResult<()>;
}

/// Append-only audit storage
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> StoreResult<()>;

    /// Matching entries, newest first
    async fn query(&self, filter: &AuditFilter) -> StoreResult<Vec<AuditEntry>>;

    /// Retained entries in append order as pretty JSON
    async fn export(&self) -> StoreResult<String>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn get(&self, id: &str) -> StoreResult<Option<FireSession>> {
        (**self).get(id).await
    }

    async fn put(&self, session: &FireSession) -> StoreResult<()> {
        (**self).put(session).await
    }

    async fn list(&self) -> StoreResult<Vec<FireSession>> {
        (**self).list().await
    }

    async fn clear(&self) -> StoreResult<()> {
        (**self).clear().await
    }
}

#[async_trait]
impl<T: AuditStore + ?Sized> AuditStore for Arc<T> {
    async fn append(&self, entry: &AuditEntry) -> StoreResult<()> {
        (**self).append(entry).await
    }

    async fn query(&self, filter: &AuditFilter) -> StoreResult<Vec<AuditEntry>> {
        (**self).query(filter).await
    }

    async fn export(&self) -> StoreResult<String> {
        (**self).export().await
    }
}
