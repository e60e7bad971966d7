use crate::parsing::{ReactDecision, extract_closing_answer, parse_react_response};
use crate::prompts::{self, HypothesisFocus};
use crate::{AgentError, StepOutcome, emit};
use rootcause_core::{AgentSession, AgentState, CompletionReason, EventKind, HistoryItem};
use rootcause_llm::ReasoningClient;
use rootcause_observe::Observer;
use rootcause_tools::ToolRegistry;

/// Observations longer than this are cut before they enter the history.
pub const MAX_OBSERVATION_CHARS: usize = 4_000;

/// One ReAct line of investigation over an [`AgentSession`].
///
/// `execute_step` works on a copy and writes it back only when the whole step
/// succeeded.
pub struct ReactLoop<'a> {
    reasoner: &'a dyn ReasoningClient,
    tools: &'a ToolRegistry,
    observer: &'a Observer,
    session_id: &'a str,
    max_cycles: u32,
    focus: Option<HypothesisFocus>,
}

impl<'a> ReactLoop<'a> {
    pub fn new(
        reasoner: &'a dyn ReasoningClient,
        tools: &'a ToolRegistry,
        observer: &'a Observer,
        session_id: &'a str,
        max_cycles: u32,
    ) -> Self {
        Self {
            reasoner,
            tools,
            observer,
            session_id,
            max_cycles,
            focus: None,
        }
    }

    pub fn with_focus(mut self, focus: HypothesisFocus) -> Self {
        self.focus = Some(focus);
        self
    }

    pub fn execute_step(&self, agent: &mut AgentSession) -> Result<StepOutcome, AgentError> {
        if agent.is_completed() {
            return Ok(StepOutcome::from_agent(agent));
        }
        let mut work = agent.clone();
        self.advance(&mut work)?;
        *agent = work;
        Ok(StepOutcome::from_agent(agent))
    }

    fn advance(&self, work: &mut AgentSession) -> Result<(), AgentError> {
        loop {
            match work.state {
                AgentState::Thinking => {
                    if work.cycle_count >= self.max_cycles {
                        self.force_completion(work);
                        continue;
                    }
                    let prompt = prompts::react_prompt(
                        &work.context,
                        self.focus.as_ref(),
                        self.tools.descriptions(),
                        &work.history,
                    );
                    let reply = self.reasoner.submit(&prompt)?;
                    match parse_react_response(&reply) {
                        ReactDecision::Action { thought, action } => {
                            work.last_thinking = Some(thought);
                            work.last_action = Some(action);
                            work.last_observation = None;
                            work.state = AgentState::Acting;
                        }
                        ReactDecision::FinalAnswer { thought, answer } => {
                            work.last_thinking = Some(thought.clone());
                            work.last_action = None;
                            work.last_observation = None;
                            work.append_history(HistoryItem::new(thought, None, None));
                            self.cycle_completed(work, None);
                            work.complete(answer, CompletionReason::FinalAnswer);
                            return Ok(());
                        }
                        ReactDecision::Malformed { thought, reason } => {
                            emit(
                                self.observer,
                                self.session_id,
                                EventKind::MalformedOutput {
                                    reason: reason.clone(),
                                },
                            );
                            self.observer.warn_log(&format!(
                                "session {}: malformed model output ({reason}); completing",
                                self.session_id
                            ));
                            work.last_thinking = Some(thought.clone());
                            work.last_action = None;
                            work.last_observation = None;
                            work.append_history(HistoryItem::new(thought, None, None));
                            self.cycle_completed(work, None);
                            work.completion_reason = Some(CompletionReason::MalformedOutput);
                            work.state = AgentState::Completing;
                        }
                    }
                }
                AgentState::Acting => {
                    let observation = match &work.last_action {
                        Some(action) => self.run_tool(&action.tool, &action.parameters),
                        None => "Error: no pending action to execute".to_string(),
                    };
                    work.last_observation = Some(observation);
                    work.state = AgentState::Observing;
                }
                AgentState::Observing => {
                    let item = HistoryItem::new(
                        work.last_thinking.clone().unwrap_or_default(),
                        work.last_action.clone(),
                        work.last_observation.clone(),
                    );
                    let tool = item.action.as_ref().map(|a| a.tool.clone());
                    work.append_history(item);
                    self.cycle_completed(work, tool);
                    if work.cycle_count >= self.max_cycles {
                        self.force_completion(work);
                        continue;
                    }
                    work.state = AgentState::Thinking;
                    return Ok(());
                }
                AgentState::Completing => {
                    let forced = work.forced_completion;
                    let prompt = prompts::completion_prompt(
                        &work.context,
                        self.focus.as_ref(),
                        &work.history,
                        forced,
                    );
                    let reply = self.reasoner.submit(&prompt)?;
                    let answer = extract_closing_answer(&reply)
                        .unwrap_or_else(|| prompts::fallback_answer(work, self.focus.as_ref()));
                    let reason = work
                        .completion_reason
                        .unwrap_or(CompletionReason::CycleLimit);
                    work.complete(answer, reason);
                    return Ok(());
                }
                AgentState::Completed => return Ok(()),
            }
        }
    }

    fn force_completion(&self, work: &mut AgentSession) {
        work.forced_completion = true;
        work.completion_reason = Some(CompletionReason::CycleLimit);
        work.state = AgentState::Completing;
        emit(
            self.observer,
            self.session_id,
            EventKind::ForcedCompletion {
                cycles: work.cycle_count,
            },
        );
    }

    fn run_tool(&self, tool: &str, parameters: &rootcause_core::ToolParameters) -> String {
        match self.tools.execute(tool, parameters) {
            Ok(output) => truncate_observation(&output),
            Err(err) => {
                emit(
                    self.observer,
                    self.session_id,
                    EventKind::ToolFailed {
                        tool: tool.to_string(),
                        error: err.to_string(),
                    },
                );
                truncate_observation(&format!("Error: {err}"))
            }
        }
    }

    fn cycle_completed(&self, work: &AgentSession, tool: Option<String>) {
        emit(
            self.observer,
            self.session_id,
            EventKind::CycleCompleted {
                cycle: work.cycle_count,
                tool,
                hypothesis_id: self.focus.as_ref().map(|f| f.id.clone()),
            },
        );
    }
}

fn truncate_observation(text: &str) -> String {
    let total = text.chars().count();
    if total <= MAX_OBSERVATION_CHARS {
        return text.to_string();
    }
    let kept: String = text.chars().take(MAX_OBSERVATION_CHARS).collect();
    format!("{kept}\n[truncated {} chars]", total - MAX_OBSERVATION_CHARS)
}
