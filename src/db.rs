//! SQLite storage backend
//!
//! Durable implementation of [`SessionStore`] and [`AuditStore`].

mod schema;

use schema::{SCHEMA, TRIM_AUDIT};

use crate::audit::{AuditEntry, AuditFilter};
use crate::runtime::{AuditStore, SessionStore, StoreError, StoreResult};
use crate::state_machine::FireSession;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value as SqlValue};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type DbResult<T> = StoreResult<T>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    audit_capacity: usize,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P, audit_capacity: usize) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn, audit_capacity)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory(audit_capacity: usize) -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, audit_capacity)
    }

    fn init(conn: Connection, audit_capacity: usize) -> DbResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            audit_capacity: audit_capacity.max(1),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ==================== Session Operations ====================

    pub fn get_session(&self, id: &str) -> DbResult<Option<FireSession>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, table_label, customer_label, duration_min, buffer_sec, zone, items,
                    eta_min, position, state, created_at, updated_at
             FROM sessions WHERE id = ?1",
        )?;
        Ok(stmt.query_row(params![id], session_from_row).optional()?)
    }

    pub fn upsert_session(&self, session: &FireSession) -> DbResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO sessions (id, table_label, customer_label, duration_min, buffer_sec, zone,
                                   items, eta_min, position, state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(id) DO UPDATE SET
                table_label = excluded.table_label,
                customer_label = excluded.customer_label,
                duration_min = excluded.duration_min,
                buffer_sec = excluded.buffer_sec,
                zone = excluded.zone,
                items = excluded.items,
                eta_min = excluded.eta_min,
                position = excluded.position,
                state = excluded.state,
                updated_at = excluded.updated_at",
            params![
                session.id,
                session.table,
                session.customer_label,
                session.duration_min,
                session.buffer_sec,
                session.zone.as_str(),
                session.items,
                session.eta_min,
                session.position,
                session.state.as_str(),
                format_datetime(session.created_at),
                format_datetime(session.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn list_sessions(&self) -> DbResult<Vec<FireSession>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, table_label, customer_label, duration_min, buffer_sec, zone, items,
                    eta_min, position, state, created_at, updated_at
             FROM sessions
             ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map([], session_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    pub fn clear_sessions(&self) -> DbResult<()> {
        self.conn().execute("DELETE FROM sessions", [])?;
        Ok(())
    }

    // ==================== Audit Operations ====================

    pub fn append_audit(&self, entry: &AuditEntry) -> DbResult<()> {
        let json = serde_json::to_string(entry)?;
        let capacity = i64::try_from(self.audit_capacity).unwrap_or(i64::MAX);
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO audit_log (id, timestamp, user_id, user_trust_level, action_type, session_id, entry)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.id,
                format_datetime(entry.timestamp),
                entry.user_id,
                entry.user_trust_level.as_str(),
                entry.action_kind().as_str(),
                entry.session_id,
                json,
            ],
        )?;
        tx.execute(TRIM_AUDIT, params![capacity])?;
        tx.commit()?;
        Ok(())
    }

    pub fn query_audit(&self, filter: &AuditFilter) -> DbResult<Vec<AuditEntry>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<SqlValue> = Vec::new();

        if let Some(user_id) = &filter.user_id {
            clauses.push("user_id = ?");
            values.push(SqlValue::Text(user_id.clone()));
        }
        if let Some(session_id) = &filter.session_id {
            clauses.push("session_id = ?");
            values.push(SqlValue::Text(session_id.clone()));
        }
        if let Some(kind) = filter.action_type {
            clauses.push("action_type = ?");
            values.push(SqlValue::Text(kind.as_str().to_string()));
        }
        if let Some(level) = filter.trust_level {
            clauses.push("user_trust_level = ?");
            values.push(SqlValue::Text(level.as_str().to_string()));
        }
        if let Some(start) = filter.start_time {
            clauses.push("timestamp >= ?");
            values.push(SqlValue::Text(format_datetime(start)));
        }
        if let Some(end) = filter.end_time {
            clauses.push("timestamp <= ?");
            values.push(SqlValue::Text(format_datetime(end)));
        }

        let mut sql = String::from("SELECT entry FROM audit_log");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY timestamp DESC, seq DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            values.push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| row.get::<_, String>(0))?;

        let mut entries = Vec::new();
        for json in rows {
            entries.push(serde_json::from_str(&json?)?);
        }
        Ok(entries)
    }

    pub fn export_audit(&self) -> DbResult<String> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT entry FROM audit_log ORDER BY seq ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut entries: Vec<AuditEntry> = Vec::new();
        for json in rows {
            entries.push(serde_json::from_str(&json?)?);
        }
        Ok(serde_json::to_string_pretty(&entries)?)
    }
}

#[async_trait]
impl SessionStore for Database {
    async fn get(&self, id: &str) -> StoreResult<Option<FireSession>> {
        self.get_session(id)
    }

    async fn put(&self, session: &FireSession) -> StoreResult<()> {
        self.upsert_session(session)
    }

    async fn list(&self) -> StoreResult<Vec<FireSession>> {
        self.list_sessions()
    }

    async fn clear(&self) -> StoreResult<()> {
        self.clear_sessions()
    }
}

#[async_trait]
impl AuditStore for Database {
    async fn append(&self, entry: &AuditEntry) -> StoreResult<()> {
        self.append_audit(entry)
    }

    async fn query(&self, filter: &AuditFilter) -> StoreResult<Vec<AuditEntry>> {
        self.query_audit(filter)
    }

    async fn export(&self) -> StoreResult<String> {
        self.export_audit()
    }
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<FireSession> {
    Ok(FireSession {
        id: row.get(0)?,
        table: row.get(1)?,
        customer_label: row.get(2)?,
        duration_min: row.get(3)?,
        buffer_sec: row.get(4)?,
        zone: parse_column(row, 5)?,
        items: row.get(6)?,
        eta_min: row.get(7)?,
        position: row.get(8)?,
        state: parse_column(row, 9)?,
        created_at: parse_datetime(row, 10)?,
        updated_at: parse_datetime(row, 11)?,
    })
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn parse_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Fixed-width RFC 3339 so text ordering matches time ordering
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::RequestContext;
    use crate::state_machine::{Action, ActionKind, NewSession, SessionState, Zone};
    use crate::trust::{TrustLevel, UserDirectory};
    use chrono::Duration;

    fn base_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-05-01T19:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn session(id: &str) -> FireSession {
        NewSession::new("T-9", "customer_412")
            .into_session(id, base_time())
            .unwrap()
    }

    fn entry(user_id: &str, session: &FireSession, action: Action, minute: i64) -> AuditEntry {
        let directory = UserDirectory::demo();
        let mut after = session.clone();
        after.state = SessionState::Out;
        AuditEntry::record(
            directory.get(user_id).unwrap(),
            &action,
            session,
            &after,
            &RequestContext::default(),
            None,
            base_time() + Duration::minutes(minute),
        )
    }

    #[test]
    fn test_session_round_trip_and_update() {
        let db = Database::open_in_memory(100).unwrap();
        let mut s = session("s-1");
        db.upsert_session(&s).unwrap();
        assert_eq!(db.get_session("s-1").unwrap(), Some(s.clone()));

        s.state = SessionState::Active;
        s.zone = Zone::E;
        s.updated_at = base_time() + Duration::minutes(5);
        db.upsert_session(&s).unwrap();
        assert_eq!(db.get_session("s-1").unwrap(), Some(s));

        assert!(db.get_session("missing").unwrap().is_none());
    }

    #[test]
    fn test_list_sessions_newest_first_and_clear() {
        let db = Database::open_in_memory(100).unwrap();
        let older = session("older");
        let mut newer = session("newer");
        newer.updated_at = base_time() + Duration::minutes(1);
        db.upsert_session(&older).unwrap();
        db.upsert_session(&newer).unwrap();

        let ids: Vec<_> = db.list_sessions().unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["newer", "older"]);

        db.clear_sessions().unwrap();
        assert!(db.list_sessions().unwrap().is_empty());
    }

    #[test]
    fn test_schema_rejects_negative_items() {
        let db = Database::open_in_memory(100).unwrap();
        let mut s = session("bad");
        s.items = -1;
        assert!(db.upsert_session(&s).is_err());
    }

    #[test]
    fn test_audit_filters_and_order() {
        let db = Database::open_in_memory(100).unwrap();
        let s1 = session("s-1");
        let s2 = session("s-2");
        db.append_audit(&entry("user-1", &s1, Action::MarkOut, 0)).unwrap();
        db.append_audit(&entry("user-2", &s1, Action::MarkDelivered, 1)).unwrap();
        db.append_audit(&entry("user-4", &s2, Action::Cancel, 2)).unwrap();

        let all = db.query_audit(&AuditFilter::default()).unwrap();
        let kinds: Vec<_> = all.iter().map(AuditEntry::action_kind).collect();
        assert_eq!(
            kinds,
            vec![ActionKind::Cancel, ActionKind::MarkDelivered, ActionKind::MarkOut]
        );

        assert_eq!(db.query_audit(&AuditFilter::for_session("s-1")).unwrap().len(), 2);
        assert_eq!(db.query_audit(&AuditFilter::for_user("user-4")).unwrap().len(), 1);

        let verified = AuditFilter {
            trust_level: Some(TrustLevel::Verified),
            ..Default::default()
        };
        assert_eq!(db.query_audit(&verified).unwrap()[0].user_id, "user-2");

        let window = AuditFilter {
            start_time: Some(base_time() + Duration::minutes(1)),
            end_time: Some(base_time() + Duration::minutes(2)),
            limit: Some(1),
            ..Default::default()
        };
        let result = db.query_audit(&window).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].action, Action::Cancel);
    }

    #[test]
    fn test_audit_retention_trims_oldest() {
        let db = Database::open_in_memory(2).unwrap();
        let s = session("s-1");
        for minute in 0..4 {
            db.append_audit(&entry("user-4", &s, Action::ExtendMin(minute), minute))
                .unwrap();
        }

        let exported: Vec<AuditEntry> = serde_json::from_str(&db.export_audit().unwrap()).unwrap();
        let actions: Vec<_> = exported.into_iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![Action::ExtendMin(2), Action::ExtendMin(3)]);
    }

    #[test]
    fn test_reopen_file_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fire.db");

        {
            let db = Database::open(&path, 100).unwrap();
            db.upsert_session(&session("persisted")).unwrap();
        }

        let db = Database::open(&path, 100).unwrap();
        assert!(db.get_session("persisted").unwrap().is_some());
    }
}
