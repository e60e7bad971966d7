//! Durable session checkpoints.
//!
//! The engine saves one checkpoint per completed step. Both stores persist
//! the same versioned JSON payload, so a session reads back exactly as it was
//! written. Saves are guarded by an optimistic revision check: a write must
//! carry a newer `revision` than the stored copy unless it is byte-identical.

pub mod codec;
mod memory;
mod sqlite;

pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;

use chrono::{DateTime, Utc};
use rootcause_core::{AgentState, InvestigationMode, Session};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session database error: {0}")]
    Backend(#[from] rusqlite::Error),
    #[error("checkpoint encoding error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("session store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported checkpoint format version {0}")]
    UnsupportedFormat(u32),
    #[error("session '{0}' not found")]
    NotFound(String),
    #[error(
        "session '{session_id}' was modified concurrently (stored revision {stored}, attempted {attempted})"
    )]
    Conflict {
        session_id: String,
        stored: u64,
        attempted: u64,
    },
}

/// Listing row for `session list`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    pub session_id: String,
    pub mode: InvestigationMode,
    pub state: AgentState,
    pub cycle_count: u32,
    pub hypotheses: usize,
    pub revision: u64,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub context_preview: String,
}

impl SessionSummary {
    pub fn from_session(session: &Session, completed_at: Option<DateTime<Utc>>) -> Self {
        Self {
            session_id: session.session_id.clone(),
            mode: session.mode,
            state: session.agent.state,
            cycle_count: session.agent.cycle_count,
            hypotheses: session.hypotheses.len(),
            revision: session.revision,
            completed_at,
            updated_at: session.updated_at,
            context_preview: preview(session.context()),
        }
    }
}

fn preview(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or_default().trim();
    if first_line.chars().count() > 80 {
        let cut: String = first_line.chars().take(77).collect();
        format!("{cut}...")
    } else {
        first_line.to_string()
    }
}

pub trait SessionStore: Send + Sync {
    fn load(&self, session_id: &str) -> Result<Option<Session>, StoreError>;

    /// Persist `session`, enforcing the revision check.
    fn save(&self, session: &Session) -> Result<(), StoreError>;

    /// Record that the session reached a terminal result.
    fn mark_complete(&self, session_id: &str) -> Result<(), StoreError>;

    /// Returns whether a checkpoint existed.
    fn delete(&self, session_id: &str) -> Result<bool, StoreError>;

    /// Most recently updated first.
    fn list(&self) -> Result<Vec<SessionSummary>, StoreError>;
}

/// Decide whether `incoming` may replace the stored checkpoint.
pub(crate) fn check_revision(
    session_id: &str,
    stored_revision: u64,
    stored_payload: &str,
    incoming_revision: u64,
    incoming_payload: &str,
) -> Result<bool, StoreError> {
    if incoming_revision > stored_revision {
        return Ok(true);
    }
    if incoming_payload == stored_payload {
        // Idempotent re-save; nothing to write.
        return Ok(false);
    }
    Err(StoreError::Conflict {
        session_id: session_id.to_string(),
        stored: stored_revision,
        attempted: incoming_revision,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_revision_wins() {
        assert!(check_revision("s", 1, "a", 2, "b").expect("newer"));
    }

    #[test]
    fn identical_payload_is_a_noop() {
        assert!(!check_revision("s", 3, "same", 3, "same").expect("idempotent"));
    }

    #[test]
    fn stale_revision_conflicts() {
        let err = check_revision("s", 3, "a", 3, "b").expect_err("conflict");
        assert!(matches!(
            err,
            StoreError::Conflict {
                stored: 3,
                attempted: 3,
                ..
            }
        ));
    }

    #[test]
    fn preview_uses_first_line_and_truncates() {
        assert_eq!(preview("latency spike\nmore detail"), "latency spike");
        let long = "x".repeat(120);
        let cut = preview(&long);
        assert_eq!(cut.chars().count(), 80);
        assert!(cut.ends_with("..."));
    }
}
