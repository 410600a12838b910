//! Permission and trust gate
//!
//! Decides whether a user may invoke an action kind, independent of whether
//! the workflow would accept it. Both checks must pass.

mod users;

pub use users::UserDirectory;

use crate::state_machine::ActionKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Grants every permission
pub const WILDCARD_PERMISSION: &str = "*";

/// Job role, informational only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Staff,
    Runner,
    Supervisor,
    Manager,
    Owner,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Staff => "STAFF",
            UserRole::Runner => "RUNNER",
            UserRole::Supervisor => "SUPERVISOR",
            UserRole::Manager => "MANAGER",
            UserRole::Owner => "OWNER",
        }
    }
}

/// Tiered authorization level, ordered `None < Basic < Verified < Admin`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustLevel {
    None,
    Basic,
    Verified,
    Admin,
}

impl TrustLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            TrustLevel::None => "NONE",
            TrustLevel::Basic => "BASIC",
            TrustLevel::Verified => "VERIFIED",
            TrustLevel::Admin => "ADMIN",
        }
    }

    pub fn satisfies(self, required: TrustLevel) -> bool {
        self >= required
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A staff member acting on sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: UserRole,
    pub trust_level: TrustLevel,
    pub permissions: BTreeSet<String>,
}

impl User {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        role: UserRole,
        trust_level: TrustLevel,
        permissions: &[&str],
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            trust_level,
            permissions: permissions.iter().map(|p| (*p).to_string()).collect(),
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(WILDCARD_PERMISSION) || self.permissions.contains(permission)
    }
}

impl ActionKind {
    /// Permission string a user must hold to invoke this kind
    pub fn permission(self) -> &'static str {
        match self {
            ActionKind::DeliverNow => "deliver",
            ActionKind::MarkOut => "mark_out",
            ActionKind::MarkDelivered => "mark_delivered",
            ActionKind::StartActive => "start_active",
            ActionKind::Close => "close",
            ActionKind::SetBuffer => "set_buffer",
            ActionKind::SetZone => "set_zone",
            ActionKind::AddItem => "add_item",
            ActionKind::ExtendMin => "extend_min",
            ActionKind::Undo => "undo",
            ActionKind::ReassignRunner => "reassign_runner",
            ActionKind::Cancel => "cancel",
        }
    }

    /// Minimum trust level for this kind
    pub fn required_trust(self) -> TrustLevel {
        match self {
            ActionKind::DeliverNow
            | ActionKind::MarkOut
            | ActionKind::SetBuffer
            | ActionKind::SetZone
            | ActionKind::AddItem => TrustLevel::Basic,
            ActionKind::MarkDelivered
            | ActionKind::StartActive
            | ActionKind::ExtendMin
            | ActionKind::Undo
            | ActionKind::ReassignRunner => TrustLevel::Verified,
            ActionKind::Close | ActionKind::Cancel => TrustLevel::Admin,
        }
    }
}

/// Reasons the gate refuses a user
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrustError {
    #[error("User {user_id} lacks permission '{permission}' for {action}")]
    PermissionDenied {
        user_id: String,
        action: ActionKind,
        permission: &'static str,
    },
    #[error("Action {action} requires {required} trust level, but user has {actual}")]
    InsufficientTrust {
        action: ActionKind,
        required: TrustLevel,
        actual: TrustLevel,
    },
}

impl TrustError {
    pub fn code(&self) -> &'static str {
        match self {
            TrustError::PermissionDenied { .. } => "PERMISSION_DENIED",
            TrustError::InsufficientTrust { .. } => "INSUFFICIENT_TRUST",
        }
    }
}

pub fn can_perform_action(user: &User, kind: ActionKind) -> bool {
    user.has_permission(kind.permission())
}

/// String-keyed form of [`can_perform_action`]; unknown names are denied
pub fn can_perform_action_named(user: &User, action_type: &str) -> bool {
    action_type
        .parse::<ActionKind>()
        .is_ok_and(|kind| can_perform_action(user, kind))
}

/// Gate applied before the workflow sees an action
pub fn authorize(user: &User, kind: ActionKind, enforce_trust: bool) -> Result<(), TrustError> {
    if !can_perform_action(user, kind) {
        return Err(TrustError::PermissionDenied {
            user_id: user.id.clone(),
            action: kind,
            permission: kind.permission(),
        });
    }

    let required = kind.required_trust();
    if enforce_trust && !user.trust_level.satisfies(required) {
        return Err(TrustError::InsufficientTrust {
            action: kind,
            required,
            actual: user.trust_level,
        });
    }

    Ok(())
}

/// Action kinds the user would pass the gate for
pub fn allowed_actions(user: &User, enforce_trust: bool) -> Vec<ActionKind> {
    ActionKind::ALL
        .into_iter()
        .filter(|kind| authorize(user, *kind, enforce_trust).is_ok())
        .collect()
}
