use crate::StoreError;
use rootcause_core::Session;
use serde::{Deserialize, Serialize};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct CheckpointRef<'a> {
    format_version: u32,
    session: &'a Session,
}

#[derive(Deserialize)]
struct Checkpoint {
    format_version: u32,
    session: Session,
}

pub fn encode(session: &Session) -> Result<String, StoreError> {
    Ok(serde_json::to_string(&CheckpointRef {
        format_version: FORMAT_VERSION,
        session,
    })?)
}

pub fn decode(payload: &str) -> Result<Session, StoreError> {
    let checkpoint: Checkpoint = serde_json::from_str(payload)?;
    if checkpoint.format_version != FORMAT_VERSION {
        return Err(StoreError::UnsupportedFormat(checkpoint.format_version));
    }
    Ok(checkpoint.session)
}
