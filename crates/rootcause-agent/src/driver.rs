//! Drivers for the invocation trampoline.
//!
//! The engine never loops on its own: after each persisted step it hands an
//! [`InvestigationRequest`] to a [`ContinuationScheduler`], and whoever owns
//! the scheduler decides when the next invocation runs.

use crate::AgentError;
use crate::engine::{InvestigationEngine, InvocationOutcome};
use anyhow::{Result, anyhow};
use rootcause_core::InvestigationMode;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Payload needed to run one invocation of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestigationRequest {
    pub session_id: String,
    pub context: String,
    #[serde(default)]
    pub mode: InvestigationMode,
}

pub trait ContinuationScheduler {
    fn schedule_continuation(&self, request: &InvestigationRequest) -> Result<()>;
}

/// In-process trampoline: queues continuations and replays them until the
/// session completes.
#[derive(Default)]
pub struct LocalTrampoline {
    queue: Mutex<VecDeque<InvestigationRequest>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrampolineReport {
    pub outcome: InvocationOutcome,
    pub invocations: u64,
}

impl LocalTrampoline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drive(
        &self,
        engine: &InvestigationEngine,
        request: InvestigationRequest,
    ) -> Result<TrampolineReport, AgentError> {
        // A stored session resumes in its own mode, so size the bound from it.
        let mode = engine
            .store()
            .load(&request.session_id)?
            .map_or(request.mode, |session| session.mode);
        let bound = engine.config().invocation_bound(mode);
        self.push(request)?;
        let mut invocations = 0u64;
        let mut last = None;
        while let Some(next) = self.pop()? {
            if invocations >= bound {
                return Err(AgentError::InvocationBound {
                    session_id: next.session_id,
                    bound,
                });
            }
            invocations += 1;
            let outcome = engine.run_invocation(&next, self)?;
            engine.observer().verbose_log(&format!(
                "invocation {invocations} of {} finished: {}",
                next.session_id,
                if outcome.is_completed() {
                    "completed"
                } else {
                    "continued"
                }
            ));
            last = Some(outcome);
        }
        match last {
            Some(outcome) => Ok(TrampolineReport {
                outcome,
                invocations,
            }),
            None => Err(AgentError::Continuation(
                "trampoline finished without running an invocation".to_string(),
            )),
        }
    }

    fn push(&self, request: InvestigationRequest) -> Result<(), AgentError> {
        self.queue
            .lock()
            .map_err(|_| AgentError::Continuation("trampoline queue poisoned".to_string()))?
            .push_back(request);
        Ok(())
    }

    fn pop(&self) -> Result<Option<InvestigationRequest>, AgentError> {
        Ok(self
            .queue
            .lock()
            .map_err(|_| AgentError::Continuation("trampoline queue poisoned".to_string()))?
            .pop_front())
    }
}

impl ContinuationScheduler for LocalTrampoline {
    fn schedule_continuation(&self, request: &InvestigationRequest) -> Result<()> {
        self.push(request.clone()).map_err(|err| anyhow!("{err}"))
    }
}

/// Remembers requested continuations without running them, for callers that
/// drive invocations one process at a time.
#[derive(Default)]
pub struct RecordingScheduler {
    requests: Mutex<Vec<InvestigationRequest>>,
}

impl RecordingScheduler {
    pub fn requests(&self) -> Vec<InvestigationRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl ContinuationScheduler for RecordingScheduler {
    fn schedule_continuation(&self, request: &InvestigationRequest) -> Result<()> {
        self.requests
            .lock()
            .map_err(|_| anyhow!("continuation log poisoned"))?
            .push(request.clone());
        Ok(())
    }
}
