//! API request and response types

use crate::audit::AuditEntry;
use crate::state_machine::{ActionKind, FireSession};
use crate::trust::User;
use serde::{Deserialize, Serialize};

/// Upper bound on demo sessions per seed request
pub const MAX_SEED_COUNT: usize = 500;

/// Request to fill the store with demo sessions
#[derive(Debug, Deserialize)]
pub struct SeedRequest {
    #[serde(default = "default_seed_count")]
    pub count: usize,
    #[serde(default)]
    pub reset: bool,
}

impl Default for SeedRequest {
    fn default() -> Self {
        Self {
            count: default_seed_count(),
            reset: false,
        }
    }
}

fn default_seed_count() -> usize {
    8
}

/// Response with a list of sessions
#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<FireSession>,
}

/// Response with a single session
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: FireSession,
}

/// Response for an accepted action or a newly created session
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub ok: bool,
    pub session: FireSession,
}

/// Response for seeding
#[derive(Debug, Serialize)]
pub struct SeedResponse {
    pub ok: bool,
    pub total: usize,
}

/// Response with audit entries, newest first
#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    pub logs: Vec<AuditEntry>,
}

/// Query for the most recent audit entries
#[derive(Debug, Default, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

/// Whether a user holds the permission behind an action name
#[derive(Debug, Serialize)]
pub struct PermissionCheckResponse {
    pub action: String,
    pub allowed: bool,
}

/// Response with the user roster
#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<User>,
}

/// Response with one user and what they may do
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub user: User,
    pub allowed_actions: Vec<ActionKind>,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: code.into(),
            message: message.into(),
        }
    }
}
