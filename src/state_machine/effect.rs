//! Effects produced by state transitions

use serde_json::Value;

/// Side effects the runtime executes after an accepted transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Write the new session record to the store
    PersistSession,

    /// Append an audit entry for this transition
    RecordAudit { metadata: Option<Value> },
}

impl Effect {
    pub fn record_audit() -> Self {
        Effect::RecordAudit { metadata: None }
    }

    pub fn record_audit_with(metadata: Value) -> Self {
        Effect::RecordAudit {
            metadata: Some(metadata),
        }
    }
}
