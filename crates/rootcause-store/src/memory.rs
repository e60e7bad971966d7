use crate::{SessionStore, SessionSummary, StoreError, check_revision, codec};
use chrono::{DateTime, Utc};
use rootcause_core::Session;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

struct Record {
    revision: u64,
    payload: String,
    completed_at: Option<DateTime<Utc>>,
}

/// Process-local store used by tests and one-shot runs.
#[derive(Default)]
pub struct MemorySessionStore {
    records: Mutex<HashMap<String, Record>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, Record>> {
        // Records are replaced whole, so a poisoned map is still consistent.
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        self.records()
            .get(session_id)
            .map(|record| codec::decode(&record.payload))
            .transpose()
    }

    fn save(&self, session: &Session) -> Result<(), StoreError> {
        let payload = codec::encode(session)?;
        let mut records = self.records();
        if let Some(existing) = records.get(&session.session_id)
            && !check_revision(
                &session.session_id,
                existing.revision,
                &existing.payload,
                session.revision,
                &payload,
            )?
        {
            return Ok(());
        }
        let completed_at = records
            .get(&session.session_id)
            .and_then(|r| r.completed_at);
        records.insert(
            session.session_id.clone(),
            Record {
                revision: session.revision,
                payload,
                completed_at,
            },
        );
        Ok(())
    }

    fn mark_complete(&self, session_id: &str) -> Result<(), StoreError> {
        let mut records = self.records();
        let record = records
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;
        record.completed_at.get_or_insert_with(Utc::now);
        Ok(())
    }

    fn delete(&self, session_id: &str) -> Result<bool, StoreError> {
        Ok(self.records().remove(session_id).is_some())
    }

    fn list(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let records = self.records();
        let mut out = records
            .values()
            .map(|record| {
                codec::decode(&record.payload)
                    .map(|session| SessionSummary::from_session(&session, record.completed_at))
            })
            .collect::<Result<Vec<_>, _>>()?;
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(out)
    }
}
