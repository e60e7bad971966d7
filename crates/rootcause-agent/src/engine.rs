use crate::driver::{ContinuationScheduler, InvestigationRequest};
use crate::orchestrator::HypothesisOrchestrator;
use crate::react::ReactLoop;
use crate::{AgentError, StepOutcome, emit};
use rootcause_core::{CompletionReason, EngineConfig, EventKind, InvestigationMode, Session};
use rootcause_llm::ReasoningClient;
use rootcause_observe::Observer;
use rootcause_store::SessionStore;
use rootcause_tools::ToolRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of one invocation, as handed back to whoever drives the trampoline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvocationOutcome {
    Completed {
        session_id: String,
        final_answer: String,
        reason: Option<CompletionReason>,
        forced_completion: bool,
    },
    Continued {
        session_id: String,
        revision: u64,
    },
}

impl InvocationOutcome {
    pub fn session_id(&self) -> &str {
        match self {
            InvocationOutcome::Completed { session_id, .. }
            | InvocationOutcome::Continued { session_id, .. } => session_id,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, InvocationOutcome::Completed { .. })
    }
}

/// Entry point for investigations. Collaborators are injected once and shared
/// across every session the engine touches.
pub struct InvestigationEngine {
    reasoner: Arc<dyn ReasoningClient + Send + Sync>,
    tools: Arc<ToolRegistry>,
    store: Arc<dyn SessionStore>,
    observer: Arc<Observer>,
    config: EngineConfig,
}

impl InvestigationEngine {
    pub fn new(
        reasoner: Arc<dyn ReasoningClient + Send + Sync>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn SessionStore>,
        observer: Arc<Observer>,
        config: EngineConfig,
    ) -> Result<Self, AgentError> {
        config
            .validate()
            .map_err(|err| AgentError::InvalidConfig(err.to_string()))?;
        Ok(Self {
            reasoner,
            tools,
            store,
            observer,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    /// Load the checkpoint for `session_id`, or start a new session.
    ///
    /// A resumed session keeps its stored context and mode; the arguments only
    /// seed new sessions.
    pub fn start_or_resume_session(
        &self,
        session_id: &str,
        context: &str,
        mode: InvestigationMode,
    ) -> Result<Session, AgentError> {
        if let Some(session) = self.store.load(session_id)? {
            if session.mode != mode {
                self.observer.verbose_log(&format!(
                    "session {session_id} resumes in stored mode {} (requested {mode})",
                    session.mode
                ));
            }
            emit(
                &self.observer,
                session_id,
                EventKind::SessionResumed {
                    revision: session.revision,
                    state: session.agent.state,
                },
            );
            return Ok(session);
        }
        emit(&self.observer, session_id, EventKind::SessionStarted { mode });
        Ok(Session::new(session_id, context, mode))
    }

    /// Advance `session` by one unit of work. Nothing is persisted here.
    pub fn execute_step(&self, session: &mut Session) -> Result<StepOutcome, AgentError> {
        match session.mode {
            InvestigationMode::React => ReactLoop::new(
                self.reasoner.as_ref(),
                &self.tools,
                &self.observer,
                &session.session_id,
                self.config.max_cycles,
            )
            .execute_step(&mut session.agent),
            InvestigationMode::HypothesisTree => HypothesisOrchestrator::new(
                self.reasoner.as_ref(),
                &self.tools,
                &self.observer,
                self.config.max_cycles,
                self.config.max_hypotheses,
            )
            .execute_step(session),
        }
    }

    /// Load, step once, persist, then either close the session or ask the
    /// scheduler to invoke us again.
    pub fn run_invocation(
        &self,
        request: &InvestigationRequest,
        scheduler: &dyn ContinuationScheduler,
    ) -> Result<InvocationOutcome, AgentError> {
        let mut session =
            self.start_or_resume_session(&request.session_id, &request.context, request.mode)?;
        if session.is_done() {
            return Ok(completed(&session));
        }

        let outcome = self.execute_step(&mut session)?;
        session.touch();
        self.store.save(&session)?;
        self.observer.verbose_log(&format!(
            "session {} saved at revision {} (state {}, {} cycle(s))",
            session.session_id, session.revision, session.agent.state, session.agent.cycle_count
        ));

        if outcome.is_done {
            self.store.mark_complete(&session.session_id)?;
            emit(
                &self.observer,
                &session.session_id,
                EventKind::SessionCompleted {
                    reason: session.agent.completion_reason,
                },
            );
            return Ok(completed(&session));
        }

        scheduler
            .schedule_continuation(request)
            .map_err(|err| AgentError::Continuation(format!("{err:#}")))?;
        emit(
            &self.observer,
            &session.session_id,
            EventKind::ContinuationScheduled {
                revision: session.revision,
            },
        );
        Ok(InvocationOutcome::Continued {
            session_id: session.session_id,
            revision: session.revision,
        })
    }
}

fn completed(session: &Session) -> InvocationOutcome {
    InvocationOutcome::Completed {
        session_id: session.session_id.clone(),
        final_answer: session.agent.final_answer.clone().unwrap_or_default(),
        reason: session.agent.completion_reason,
        forced_completion: session.agent.forced_completion,
    }
}
