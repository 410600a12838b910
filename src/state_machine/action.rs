//! Actions that can be applied to a fire session

use super::state::Zone;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operations staff can request against a session
///
/// Wire form is `{ "type": "SET_BUFFER", "value": 15 }`; kinds without a
/// payload omit `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    DeliverNow,
    MarkOut,
    MarkDelivered,
    StartActive,
    Close,
    Cancel,
    SetBuffer(i64),
    SetZone(Zone),
    Undo,
    /// Hand the delivery to another runner (runner id)
    ReassignRunner(String),
    AddItem(i64),
    ExtendMin(i64),
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::DeliverNow => ActionKind::DeliverNow,
            Action::MarkOut => ActionKind::MarkOut,
            Action::MarkDelivered => ActionKind::MarkDelivered,
            Action::StartActive => ActionKind::StartActive,
            Action::Close => ActionKind::Close,
            Action::Cancel => ActionKind::Cancel,
            Action::SetBuffer(_) => ActionKind::SetBuffer,
            Action::SetZone(_) => ActionKind::SetZone,
            Action::Undo => ActionKind::Undo,
            Action::ReassignRunner(_) => ActionKind::ReassignRunner,
            Action::AddItem(_) => ActionKind::AddItem,
            Action::ExtendMin(_) => ActionKind::ExtendMin,
        }
    }
}

/// Payload-free discriminant of [`Action`], used as a table key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    DeliverNow,
    MarkOut,
    MarkDelivered,
    StartActive,
    Close,
    Cancel,
    SetBuffer,
    SetZone,
    Undo,
    ReassignRunner,
    AddItem,
    ExtendMin,
}

impl ActionKind {
    pub const ALL: [ActionKind; 12] = [
        ActionKind::DeliverNow,
        ActionKind::MarkOut,
        ActionKind::MarkDelivered,
        ActionKind::StartActive,
        ActionKind::Close,
        ActionKind::Cancel,
        ActionKind::SetBuffer,
        ActionKind::SetZone,
        ActionKind::Undo,
        ActionKind::ReassignRunner,
        ActionKind::AddItem,
        ActionKind::ExtendMin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::DeliverNow => "DELIVER_NOW",
            ActionKind::MarkOut => "MARK_OUT",
            ActionKind::MarkDelivered => "MARK_DELIVERED",
            ActionKind::StartActive => "START_ACTIVE",
            ActionKind::Close => "CLOSE",
            ActionKind::Cancel => "CANCEL",
            ActionKind::SetBuffer => "SET_BUFFER",
            ActionKind::SetZone => "SET_ZONE",
            ActionKind::Undo => "UNDO",
            ActionKind::ReassignRunner => "REASSIGN_RUNNER",
            ActionKind::AddItem => "ADD_ITEM",
            ActionKind::ExtendMin => "EXTEND_MIN",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown action type: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unit_action_without_value() {
        let action: Action = serde_json::from_str(r#"{"type":"MARK_OUT"}"#).unwrap();
        assert_eq!(action, Action::MarkOut);
    }

    #[test]
    fn test_parse_valued_actions() {
        let action: Action = serde_json::from_str(r#"{"type":"SET_BUFFER","value":-3}"#).unwrap();
        assert_eq!(action, Action::SetBuffer(-3));

        let action: Action = serde_json::from_str(r#"{"type":"SET_ZONE","value":"C"}"#).unwrap();
        assert_eq!(action, Action::SetZone(Zone::C));

        let action: Action =
            serde_json::from_str(r#"{"type":"REASSIGN_RUNNER","value":"user-2"}"#).unwrap();
        assert_eq!(action, Action::ReassignRunner("user-2".to_string()));
    }

    #[test]
    fn test_unknown_action_type_is_rejected() {
        assert!(serde_json::from_str::<Action>(r#"{"type":"TELEPORT"}"#).is_err());
        assert!("TELEPORT".parse::<ActionKind>().is_err());
    }

    #[test]
    fn test_kind_names_match_wire_tags() {
        let action = Action::ExtendMin(10);
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], action.kind().as_str());
        assert_eq!(json["value"], 10);
    }
}
