//! Known staff roster

use super::{TrustLevel, User, UserRole};
use std::collections::HashMap;

const SUPERVISOR_PERMISSIONS: &[&str] = &[
    "deliver",
    "mark_out",
    "mark_delivered",
    "start_active",
    "set_buffer",
    "set_zone",
    "add_item",
    "extend_min",
    "undo",
    "reassign_runner",
];

/// Read-only lookup of users by id
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: Vec<User>,
    by_id: HashMap<String, usize>,
}

impl UserDirectory {
    pub fn new(users: Vec<User>) -> Self {
        let by_id = users
            .iter()
            .enumerate()
            .map(|(idx, user)| (user.id.clone(), idx))
            .collect();
        Self { users, by_id }
    }

    /// Floor roster: a runner, a supervisor, a manager and the owner
    pub fn demo() -> Self {
        Self::new(vec![
            User::new(
                "user-1",
                "Alex Runner",
                UserRole::Runner,
                TrustLevel::Basic,
                &["deliver", "mark_out", "set_buffer", "set_zone", "add_item"],
            ),
            User::new(
                "user-2",
                "Sam Supervisor",
                UserRole::Supervisor,
                TrustLevel::Verified,
                SUPERVISOR_PERMISSIONS,
            ),
            User::new(
                "user-3",
                "Morgan Manager",
                UserRole::Manager,
                TrustLevel::Verified,
                SUPERVISOR_PERMISSIONS,
            ),
            User::new(
                "user-4",
                "Casey Owner",
                UserRole::Owner,
                TrustLevel::Admin,
                &[super::WILDCARD_PERMISSION],
            ),
        ])
    }

    pub fn get(&self, id: &str) -> Option<&User> {
        self.by_id.get(id).and_then(|idx| self.users.get(*idx))
    }

    pub fn all(&self) -> &[User] {
        &self.users
    }
}
