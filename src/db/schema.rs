//! Database schema

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    table_label TEXT NOT NULL,
    customer_label TEXT NOT NULL,
    duration_min INTEGER NOT NULL,
    buffer_sec INTEGER NOT NULL CHECK (buffer_sec >= 0),
    zone TEXT NOT NULL,
    items INTEGER NOT NULL CHECK (items >= 0),
    eta_min INTEGER NOT NULL,
    position TEXT NOT NULL,
    state TEXT NOT NULL DEFAULT 'READY',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_updated ON sessions(updated_at DESC);

CREATE TABLE IF NOT EXISTS audit_log (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    timestamp TEXT NOT NULL,
    user_id TEXT NOT NULL,
    user_trust_level TEXT NOT NULL,
    action_type TEXT NOT NULL,
    session_id TEXT NOT NULL,
    entry TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_session ON audit_log(session_id, timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_audit_user ON audit_log(user_id, timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp DESC);
";

/// Drop audit rows beyond the retention cap (`?1`), oldest first
pub const TRIM_AUDIT: &str = "
DELETE FROM audit_log
WHERE seq <= (SELECT MAX(seq) FROM audit_log) - ?1
";
