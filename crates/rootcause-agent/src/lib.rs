//! Resumable root-cause investigation engine.
//!
//! Two modes share one persistence model: a single ReAct loop
//! ([`react::ReactLoop`]) and a tree-of-thought mode
//! ([`orchestrator::HypothesisOrchestrator`]) that verifies ranked hypotheses
//! with one focused loop each. [`InvestigationEngine`] runs exactly one unit of
//! work per invocation and leaves the looping to a [`ContinuationScheduler`].

mod driver;
mod engine;
mod error;
pub mod evaluator;
pub mod orchestrator;
pub mod parsing;
mod prompts;
pub mod react;

pub use driver::{
    ContinuationScheduler, InvestigationRequest, LocalTrampoline, RecordingScheduler,
    TrampolineReport,
};
pub use engine::{InvestigationEngine, InvocationOutcome};
pub use error::{AgentError, RATE_LIMITED_FALLBACK, SERVICE_FAILURE_FALLBACK};
pub use prompts::HypothesisFocus;

use rootcause_core::{AgentSession, EventEnvelope, EventKind};
use rootcause_observe::Observer;
use serde::Serialize;

/// What a caller learns from one `execute_step`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub is_done: bool,
    pub final_answer: Option<String>,
}

impl StepOutcome {
    pub(crate) fn from_agent(agent: &AgentSession) -> Self {
        Self {
            is_done: agent.is_completed(),
            final_answer: agent.final_answer.clone(),
        }
    }
}

/// Event sinks are best effort; a failing log never aborts a step.
pub(crate) fn emit(observer: &Observer, session_id: &str, kind: EventKind) {
    if let Err(err) = observer.record_event(&EventEnvelope::now(session_id, kind)) {
        observer.warn_log(&format!("failed to record event: {err}"));
    }
}
