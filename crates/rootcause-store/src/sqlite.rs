use crate::{SessionStore, SessionSummary, StoreError, check_revision, codec};
use chrono::{DateTime, SecondsFormat, Utc};
use rootcause_core::Session;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::fs;
use std::path::{Path, PathBuf};

const MIGRATIONS: &[(i64, &str)] = &[
    (
        1,
        "CREATE TABLE IF NOT EXISTS sessions (
            session_id TEXT PRIMARY KEY,
            mode TEXT NOT NULL,
            state TEXT NOT NULL,
            cycle_count INTEGER NOT NULL,
            revision INTEGER NOT NULL,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
         );",
    ),
    (
        2,
        "ALTER TABLE sessions ADD COLUMN completed_at TEXT;
         CREATE INDEX IF NOT EXISTS idx_sessions_updated_at ON sessions(updated_at);",
    ),
];

/// SQLite-backed checkpoint store, one row per session.
pub struct SqliteSessionStore {
    db_path: PathBuf,
}

impl SqliteSessionStore {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let store = Self {
            db_path: db_path.to_path_buf(),
        };
        store.init_db()?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn db(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(conn)
    }

    fn init_db(&self) -> Result<(), StoreError> {
        let conn = self.db()?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
             );",
        )?;

        for (version, sql) in MIGRATIONS {
            let already: i64 = conn.query_row(
                "SELECT COUNT(1) FROM schema_migrations WHERE version = ?1",
                [*version],
                |r| r.get(0),
            )?;
            if already == 0 {
                conn.execute_batch(sql)?;
                conn.execute(
                    "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                    params![version, Utc::now().to_rfc3339()],
                )?;
            }
        }
        Ok(())
    }
}

/// Fixed-width so `ORDER BY updated_at` sorts chronologically.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|value| DateTime::parse_from_rfc3339(&value).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

impl SessionStore for SqliteSessionStore {
    fn load(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        let conn = self.db()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM sessions WHERE session_id = ?1",
                [session_id],
                |r| r.get(0),
            )
            .optional()?;
        payload.as_deref().map(codec::decode).transpose()
    }

    fn save(&self, session: &Session) -> Result<(), StoreError> {
        let payload = codec::encode(session)?;
        let mut conn = self.db()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: Option<(i64, String)> = tx
            .query_row(
                "SELECT revision, payload FROM sessions WHERE session_id = ?1",
                [&session.session_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        if let Some((stored_revision, stored_payload)) = existing
            && !check_revision(
                &session.session_id,
                stored_revision.max(0) as u64,
                &stored_payload,
                session.revision,
                &payload,
            )?
        {
            return Ok(());
        }

        tx.execute(
            "INSERT INTO sessions (session_id, mode, state, cycle_count, revision, payload, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(session_id) DO UPDATE SET
                mode = excluded.mode,
                state = excluded.state,
                cycle_count = excluded.cycle_count,
                revision = excluded.revision,
                payload = excluded.payload,
                updated_at = excluded.updated_at",
            params![
                session.session_id,
                session.mode.to_string(),
                session.agent.state.to_string(),
                i64::from(session.agent.cycle_count),
                i64::try_from(session.revision).unwrap_or(i64::MAX),
                payload,
                timestamp(session.created_at),
                timestamp(session.updated_at),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn mark_complete(&self, session_id: &str) -> Result<(), StoreError> {
        let conn = self.db()?;
        let updated = conn.execute(
            "UPDATE sessions SET completed_at = COALESCE(completed_at, ?1) WHERE session_id = ?2",
            params![timestamp(Utc::now()), session_id],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(session_id.to_string()));
        }
        Ok(())
    }

    fn delete(&self, session_id: &str) -> Result<bool, StoreError> {
        let conn = self.db()?;
        let removed = conn.execute("DELETE FROM sessions WHERE session_id = ?1", [session_id])?;
        Ok(removed > 0)
    }

    fn list(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let conn = self.db()?;
        let mut stmt = conn.prepare(
            "SELECT payload, completed_at FROM sessions ORDER BY updated_at DESC, session_id",
        )?;
        let rows = stmt.query_map([], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, Option<String>>(1)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (payload, completed_at) = row?;
            let session = codec::decode(&payload)?;
            out.push(SessionSummary::from_session(
                &session,
                parse_timestamp(completed_at),
            ));
        }
        Ok(out)
    }
}
