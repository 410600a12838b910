//! Fire session record and lifecycle states

use super::action::ActionKind;
use super::transition::TransitionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Lifecycle State
// ============================================================================

/// Where a session sits in the delivery lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Prepared, waiting for a runner
    #[default]
    Ready,
    /// Runner is on the way to the table
    Out,
    /// Hookah is at the table
    Delivered,
    /// Customer is smoking
    Active,
    /// Finished or cancelled
    Close,
}

impl SessionState {
    pub const ALL: [SessionState; 5] = [
        SessionState::Ready,
        SessionState::Out,
        SessionState::Delivered,
        SessionState::Active,
        SessionState::Close,
    ];

    /// Action kinds the transition table permits from this state
    pub fn permitted_actions(self) -> &'static [ActionKind] {
        match self {
            SessionState::Ready => &[
                ActionKind::DeliverNow,
                ActionKind::MarkOut,
                ActionKind::SetBuffer,
                ActionKind::SetZone,
                ActionKind::Cancel,
                ActionKind::AddItem,
            ],
            SessionState::Out => &[
                ActionKind::MarkDelivered,
                ActionKind::SetBuffer,
                ActionKind::SetZone,
                ActionKind::ReassignRunner,
                ActionKind::Cancel,
                ActionKind::Undo,
            ],
            SessionState::Delivered => &[ActionKind::StartActive, ActionKind::Undo],
            SessionState::Active => &[
                ActionKind::Close,
                ActionKind::ExtendMin,
                ActionKind::AddItem,
                ActionKind::Undo,
            ],
            SessionState::Close => &[ActionKind::Undo],
        }
    }

    pub fn allows(self, kind: ActionKind) -> bool {
        self.permitted_actions().contains(&kind)
    }

    /// One step back along `READY → OUT → DELIVERED → ACTIVE → CLOSE`
    pub fn undo_target(self) -> SessionState {
        match self {
            SessionState::Ready | SessionState::Out => SessionState::Ready,
            SessionState::Delivered => SessionState::Out,
            SessionState::Active => SessionState::Delivered,
            SessionState::Close => SessionState::Active,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Ready => "READY",
            SessionState::Out => "OUT",
            SessionState::Delivered => "DELIVERED",
            SessionState::Active => "ACTIVE",
            SessionState::Close => "CLOSE",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown session state: {s}"))
    }
}

// ============================================================================
// Delivery Zone
// ============================================================================

/// Service partition used for runner assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Zone {
    #[default]
    A,
    B,
    C,
    D,
    E,
}

impl Zone {
    pub const ALL: [Zone; 5] = [Zone::A, Zone::B, Zone::C, Zone::D, Zone::E];

    pub fn as_str(self) -> &'static str {
        match self {
            Zone::A => "A",
            Zone::B => "B",
            Zone::C => "C",
            Zone::D => "D",
            Zone::E => "E",
        }
    }
}

impl FromStr for Zone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|zone| zone.as_str() == s)
            .ok_or_else(|| format!("unknown zone: {s}"))
    }
}

// ============================================================================
// Session Record
// ============================================================================

/// One hookah order moving through the delivery lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FireSession {
    pub id: String,
    /// Table label, e.g. `T-5`
    pub table: String,
    pub customer_label: String,
    pub duration_min: i64,
    /// Delay before a delivery is considered due
    pub buffer_sec: i64,
    pub zone: Zone,
    pub items: i64,
    pub eta_min: i64,
    /// Floor position, e.g. `Main (2,3)`
    pub position: String,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FireSession {
    /// Reject records that break `items >= 0` or `buffer_sec >= 0`
    pub fn check_invariants(&self) -> Result<(), TransitionError> {
        if self.items < 0 {
            return Err(TransitionError::BadItemCount { items: self.items });
        }
        if self.buffer_sec < 0 {
            return Err(TransitionError::BadBufferValue {
                buffer_sec: self.buffer_sec,
            });
        }
        Ok(())
    }
}

/// Fields supplied when opening a session; everything else is derived
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub table: String,
    pub customer_label: String,
    #[serde(default = "default_duration_min")]
    pub duration_min: i64,
    #[serde(default = "default_buffer_sec")]
    pub buffer_sec: i64,
    #[serde(default)]
    pub zone: Zone,
    #[serde(default = "default_items")]
    pub items: i64,
    #[serde(default = "default_eta_min")]
    pub eta_min: i64,
    #[serde(default = "default_position")]
    pub position: String,
}

fn default_duration_min() -> i64 {
    30
}

fn default_buffer_sec() -> i64 {
    10
}

fn default_items() -> i64 {
    1
}

fn default_eta_min() -> i64 {
    5
}

fn default_position() -> String {
    "Table".to_string()
}

impl NewSession {
    pub fn new(table: impl Into<String>, customer_label: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            customer_label: customer_label.into(),
            duration_min: default_duration_min(),
            buffer_sec: default_buffer_sec(),
            zone: Zone::default(),
            items: default_items(),
            eta_min: default_eta_min(),
            position: default_position(),
        }
    }

    /// Materialize a `READY` session; invariants are checked before returning
    pub fn into_session(
        self,
        id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<FireSession, TransitionError> {
        let session = FireSession {
            id: id.into(),
            table: self.table,
            customer_label: self.customer_label,
            duration_min: self.duration_min,
            buffer_sec: self.buffer_sec,
            zone: self.zone,
            items: self.items,
            eta_min: self.eta_min,
            position: self.position,
            state: SessionState::Ready,
            created_at: now,
            updated_at: now,
        };
        session.check_invariants()?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trips_through_str() {
        for state in SessionState::ALL {
            assert_eq!(state.as_str().parse::<SessionState>().unwrap(), state);
        }
        assert!("closed".parse::<SessionState>().is_err());
    }

    #[test]
    fn test_undo_map_walks_back_one_hop() {
        assert_eq!(SessionState::Ready.undo_target(), SessionState::Ready);
        assert_eq!(SessionState::Out.undo_target(), SessionState::Ready);
        assert_eq!(SessionState::Delivered.undo_target(), SessionState::Out);
        assert_eq!(SessionState::Active.undo_target(), SessionState::Delivered);
        assert_eq!(SessionState::Close.undo_target(), SessionState::Active);
    }

    #[test]
    fn test_close_only_permits_undo() {
        assert_eq!(SessionState::Close.permitted_actions(), &[ActionKind::Undo]);
    }

    #[test]
    fn test_session_json_is_camel_case() {
        let session = NewSession::new("T-5", "customer_683")
            .into_session("abc", Utc::now())
            .unwrap();
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["customerLabel"], "customer_683");
        assert_eq!(json["bufferSec"], 10);
        assert_eq!(json["state"], "READY");
        assert_eq!(json["zone"], "A");
    }

    #[test]
    fn test_new_session_defaults() {
        let req: NewSession =
            serde_json::from_str(r#"{"table":"T-1","customerLabel":"walk-in"}"#).unwrap();
        assert_eq!(req.duration_min, 30);
        assert_eq!(req.buffer_sec, 10);
        assert_eq!(req.items, 1);
        assert_eq!(req.eta_min, 5);
        assert_eq!(req.position, "Table");
        assert_eq!(req.zone, Zone::A);
    }

    #[test]
    fn test_new_session_rejects_negative_buffer() {
        let mut req = NewSession::new("T-1", "walk-in");
        req.buffer_sec = -1;
        assert!(matches!(
            req.into_session("x", Utc::now()),
            Err(TransitionError::BadBufferValue { buffer_sec: -1 })
        ));
    }
}
