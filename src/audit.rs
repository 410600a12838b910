//! Append-only audit trail of accepted actions

use crate::state_machine::{Action, ActionKind, FireSession, SessionState};
use crate::trust::{TrustLevel, User, UserRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default page size for recent-activity queries
pub const DEFAULT_RECENT_LIMIT: usize = 50;

/// Request details captured alongside an action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Immutable record of one accepted action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub user_name: String,
    pub user_role: UserRole,
    pub user_trust_level: TrustLevel,
    pub action: Action,
    pub session_id: String,
    pub session_table: String,
    pub previous_state: SessionState,
    pub new_state: SessionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl AuditEntry {
    pub fn record(
        user: &User,
        action: &Action,
        previous: &FireSession,
        new: &FireSession,
        context: &RequestContext,
        metadata: Option<Value>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: now,
            user_id: user.id.clone(),
            user_name: user.name.clone(),
            user_role: user.role,
            user_trust_level: user.trust_level,
            action: action.clone(),
            session_id: previous.id.clone(),
            session_table: previous.table.clone(),
            previous_state: previous.state,
            new_state: new.state,
            ip_address: context.ip_address.clone(),
            user_agent: context.user_agent.clone(),
            metadata,
        }
    }

    pub fn action_kind(&self) -> ActionKind {
        self.action.kind()
    }
}

/// Criteria for audit queries; absent fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFilter {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub action_type: Option<ActionKind>,
    pub trust_level: Option<TrustLevel>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Applied after newest-first ordering
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Default::default()
        }
    }

    pub fn recent(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Default::default()
        }
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.user_id.as_ref().is_none_or(|id| &entry.user_id == id)
            && self
                .session_id
                .as_ref()
                .is_none_or(|id| &entry.session_id == id)
            && self
                .action_type
                .is_none_or(|kind| entry.action_kind() == kind)
            && self
                .trust_level
                .is_none_or(|level| entry.user_trust_level == level)
            && self.start_time.is_none_or(|start| entry.timestamp >= start)
            && self.end_time.is_none_or(|end| entry.timestamp <= end)
    }

    /// Filter `entries` (given in append order) into newest-first matches
    pub fn apply<'a>(
        &self,
        entries: impl DoubleEndedIterator<Item = &'a AuditEntry>,
    ) -> Vec<AuditEntry> {
        let mut matched: Vec<AuditEntry> = entries
            .rev()
            .filter(|entry| self.matches(entry))
            .cloned()
            .collect();
        // Stable: equal timestamps keep the later append first
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }
}
