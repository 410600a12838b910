//! In-memory storage backend
//!
//! Default backend. Sessions live in a map; the audit log is a ring that
//! keeps the newest `capacity` entries.

use super::traits::{AuditStore, SessionStore, StoreResult};
use crate::audit::{AuditEntry, AuditFilter};
use crate::state_machine::FireSession;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Retention cap for the audit ring
pub const DEFAULT_AUDIT_CAPACITY: usize = 1000;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct MemorySessionStore {
    by_id: Mutex<HashMap<String, FireSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &str) -> StoreResult<Option<FireSession>> {
        Ok(lock(&self.by_id).get(id).cloned())
    }

    async fn put(&self, session: &FireSession) -> StoreResult<()> {
        lock(&self.by_id).insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<FireSession>> {
        let mut sessions: Vec<FireSession> = lock(&self.by_id).values().cloned().collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    async fn clear(&self) -> StoreResult<()> {
        lock(&self.by_id).clear();
        Ok(())
    }
}

pub struct MemoryAuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl MemoryAuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }
}

impl Default for MemoryAuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_CAPACITY)
    }
}

#[async_trait]
impl AuditStore for MemoryAuditLog {
    async fn append(&self, entry: &AuditEntry) -> StoreResult<()> {
        let mut entries = lock(&self.entries);
        entries.push_back(entry.clone());
        while entries.len() > self.capacity {
            entries.pop_front();
        }
        Ok(())
    }

    async fn query(&self, filter: &AuditFilter) -> StoreResult<Vec<AuditEntry>> {
        Ok(filter.apply(lock(&self.entries).iter()))
    }

    async fn export(&self) -> StoreResult<String> {
        let entries = lock(&self.entries);
        let ordered: Vec<&AuditEntry> = entries.iter().collect();
        Ok(serde_json::to_string_pretty(&ordered)?)
    }
}
