//! Pure state transition function
//!
//! Given the same session, action and clock reading this always produces the
//! same result. Nothing here touches storage.

use super::{Action, ActionKind, Effect, FireSession, SessionState};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;

/// Result of an accepted transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_session: FireSession,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(session: FireSession) -> Self {
        Self {
            new_session: session,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Reasons a transition is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Action {action} not allowed from {state}")]
    ActionNotAllowed {
        action: ActionKind,
        state: SessionState,
    },
    #[error("Items cannot be negative (got {items})")]
    BadItemCount { items: i64 },
    #[error("Buffer below zero (got {buffer_sec}s)")]
    BadBufferValue { buffer_sec: i64 },
}

impl TransitionError {
    pub fn code(&self) -> &'static str {
        match self {
            TransitionError::ActionNotAllowed { .. } => "ACTION_NOT_ALLOWED",
            TransitionError::BadItemCount { .. } => "BAD_ITEM_COUNT",
            TransitionError::BadBufferValue { .. } => "BAD_BUFFER_VALUE",
        }
    }
}

fn assert_allowed(state: SessionState, kind: ActionKind) -> Result<(), TransitionError> {
    if state.allows(kind) {
        Ok(())
    } else {
        Err(TransitionError::ActionNotAllowed {
            action: kind,
            state,
        })
    }
}

/// Compute the session that results from applying `action` at time `now`
///
/// `CANCEL` and `UNDO` bypass the transition table; every other kind must be
/// listed for the current state. The candidate is rejected if it breaks the
/// record invariants.
pub fn transition(
    session: &FireSession,
    action: &Action,
    now: DateTime<Utc>,
) -> Result<TransitionResult, TransitionError> {
    let kind = action.kind();
    if !matches!(kind, ActionKind::Cancel | ActionKind::Undo) {
        assert_allowed(session.state, kind)?;
    }

    let mut next = session.clone();
    next.updated_at = now;
    let mut audit = Effect::record_audit();

    match action {
        Action::DeliverNow | Action::MarkOut => {
            next.state = SessionState::Out;
            next.eta_min = next.eta_min.max(1);
        }
        Action::MarkDelivered => next.state = SessionState::Delivered,
        Action::StartActive => next.state = SessionState::Active,
        Action::Close | Action::Cancel => next.state = SessionState::Close,
        Action::SetBuffer(value) => next.buffer_sec = *value,
        Action::SetZone(zone) => next.zone = *zone,
        Action::AddItem(value) => next.items = next.items.saturating_add(*value),
        Action::ExtendMin(value) => next.duration_min = next.duration_min.saturating_add(*value),
        Action::ReassignRunner(runner) => {
            audit = Effect::record_audit_with(json!({ "runner": runner }));
        }
        Action::Undo => next.state = session.state.undo_target(),
    }

    next.check_invariants()?;

    Ok(TransitionResult::new(next)
        .with_effect(Effect::PersistSession)
        .with_effect(audit))
}
