//! Tree-of-thought mode: rank candidate root causes, then verify them one at
//! a time with a focused ReAct loop each.
//!
//! Every call to [`HypothesisOrchestrator::execute_step`] performs one unit of
//! work: generation, a single cycle of the current hypothesis' loop, or the
//! evaluation of a finished loop.

use crate::evaluator::Evaluator;
use crate::parsing::parse_hypotheses;
use crate::prompts::{self, HypothesisFocus};
use crate::react::ReactLoop;
use crate::{AgentError, StepOutcome, emit};
use rootcause_core::{
    CompletionReason, EventKind, Hypothesis, HypothesisStatus, NO_HYPOTHESIS_SELECTED, Session,
};
use rootcause_llm::ReasoningClient;
use rootcause_observe::Observer;
use rootcause_tools::ToolRegistry;
use std::fmt::Write as _;

/// Candidates cited in the closing summary when nothing was confirmed.
const SUMMARY_CANDIDATES: usize = 3;

pub struct HypothesisOrchestrator<'a> {
    reasoner: &'a dyn ReasoningClient,
    tools: &'a ToolRegistry,
    observer: &'a Observer,
    max_cycles: u32,
    max_hypotheses: u32,
}

impl<'a> HypothesisOrchestrator<'a> {
    pub fn new(
        reasoner: &'a dyn ReasoningClient,
        tools: &'a ToolRegistry,
        observer: &'a Observer,
        max_cycles: u32,
        max_hypotheses: u32,
    ) -> Self {
        Self {
            reasoner,
            tools,
            observer,
            max_cycles,
            max_hypotheses,
        }
    }

    pub fn execute_step(&self, session: &mut Session) -> Result<StepOutcome, AgentError> {
        if session.is_done() {
            return Ok(StepOutcome::from_agent(&session.agent));
        }
        let mut work = session.clone();
        if work.hypotheses.is_empty() {
            self.generate(&mut work)?;
        } else {
            self.verify(&mut work)?;
        }
        *session = work;
        Ok(StepOutcome::from_agent(&session.agent))
    }

    fn generate(&self, work: &mut Session) -> Result<(), AgentError> {
        let prompt =
            prompts::hypothesis_prompt(work.context(), self.max_hypotheses, self.tools.descriptions());
        let reply = self.reasoner.submit(&prompt)?;
        let mut parsed = parse_hypotheses(&reply);
        if parsed.is_empty() {
            emit(
                self.observer,
                &work.session_id,
                EventKind::MalformedOutput {
                    reason: "no hypotheses could be read from the generation reply".to_string(),
                },
            );
            work.agent.complete(
                "No candidate root causes could be generated for this failure report; \
                 rerun in react mode or add more detail to the report.",
                CompletionReason::MalformedOutput,
            );
            return Ok(());
        }

        // Stable sort keeps the model's order among equal confidences.
        parsed.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        parsed.truncate(self.max_hypotheses as usize);
        let context = work.context().to_string();
        work.hypotheses = parsed
            .into_iter()
            .enumerate()
            .map(|(idx, h)| {
                Hypothesis::new(
                    format!("h{}", idx + 1),
                    h.description,
                    h.confidence,
                    h.reasoning,
                    &context,
                )
            })
            .collect();
        work.current_hypothesis_index = 0;
        emit(
            self.observer,
            &work.session_id,
            EventKind::HypothesesGenerated {
                count: work.hypotheses.len(),
            },
        );
        Ok(())
    }

    fn verify(&self, work: &mut Session) -> Result<(), AgentError> {
        let session_id = work.session_id.clone();
        let context = work.context().to_string();
        let Some(current) = work.current_hypothesis_mut() else {
            finish_with_summary(work);
            return Ok(());
        };

        if !current.react_session_state.is_completed() {
            let focus = HypothesisFocus::of(current);
            ReactLoop::new(
                self.reasoner,
                self.tools,
                self.observer,
                &session_id,
                self.max_cycles,
            )
            .with_focus(focus)
            .execute_step(&mut current.react_session_state)?;
            return Ok(());
        }

        let result = Evaluator::new(self.reasoner, self.observer).evaluate_hypothesis(
            current,
            &context,
            &current.react_session_state.history,
        )?;
        current.apply_evaluation(result);
        emit(
            self.observer,
            &session_id,
            EventKind::HypothesisEvaluated {
                hypothesis_id: current.id.clone(),
                status: current.status,
                confidence: current.confidence,
            },
        );

        if current.status == HypothesisStatus::Confirmed {
            let answer = confirmed_answer(current);
            work.agent.complete(answer, CompletionReason::FinalAnswer);
            return Ok(());
        }

        work.current_hypothesis_index += 1;
        if work.current_hypothesis().is_none() {
            finish_with_summary(work);
        }
        Ok(())
    }
}

fn confirmed_answer(hypothesis: &Hypothesis) -> String {
    let mut out = format!(
        "Root cause: {} (confidence {:.0}%)",
        hypothesis.description,
        hypothesis.confidence * 100.0
    );
    if let Some(evaluation) = &hypothesis.evaluation
        && !evaluation.reasoning.is_empty()
    {
        let _ = write!(out, "\n\nEvidence: {}", evaluation.reasoning);
    }
    if let Some(conclusion) = &hypothesis.react_session_state.final_answer {
        let _ = write!(out, "\n\nInvestigation notes: {conclusion}");
    }
    out
}

/// Close the session once every hypothesis was checked without confirmation.
fn finish_with_summary(work: &mut Session) {
    let mut ranked: Vec<&Hypothesis> = work.hypotheses.iter().collect();
    ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut out = format!(
        "No hypothesis was confirmed after checking {} candidate(s). Most likely causes:",
        work.hypotheses.len()
    );
    for hypothesis in ranked.into_iter().take(SUMMARY_CANDIDATES) {
        let _ = write!(
            out,
            "\n- {} [{}, {:.0}%]",
            hypothesis.description,
            hypothesis.status,
            hypothesis.confidence * 100.0
        );
        if let Some(evaluation) = &hypothesis.evaluation
            && !evaluation.reasoning.is_empty()
        {
            let _ = write!(out, ": {}", first_line(&evaluation.reasoning));
        }
    }
    work.current_hypothesis_index = NO_HYPOTHESIS_SELECTED;
    work.agent.complete(out, CompletionReason::FinalAnswer);
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default().trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rootcause_core::InvestigationMode;
    use rootcause_testkit::{ScriptedReasoner, final_reply, metrics_registry};

    const GENERATION: &str = r#"[
        {"description": "slow disk", "confidence": 0.3, "reasoning": "io wait"},
        {"description": "pool exhausted", "confidence": 0.8, "reasoning": "timeouts"},
        {"description": "bad deploy", "confidence": 0.5, "reasoning": "recent release"}
    ]"#;

    fn session() -> Session {
        Session::new("s-1", "latency spike", InvestigationMode::HypothesisTree)
    }

    fn step(reasoner: &ScriptedReasoner, session: &mut Session, k: u32) -> StepOutcome {
        let observer = Observer::ephemeral();
        let tools = metrics_registry();
        HypothesisOrchestrator::new(reasoner, &tools, &observer, 3, k)
            .execute_step(session)
            .expect("step")
    }

    #[test]
    fn generation_ranks_and_truncates() {
        let reasoner = ScriptedReasoner::new([GENERATION]);
        let mut session = session();
        let outcome = step(&reasoner, &mut session, 2);
        assert!(!outcome.is_done);
        let ids: Vec<_> = session.hypotheses.iter().map(|h| h.id.as_str()).collect();
        let names: Vec<_> = session
            .hypotheses
            .iter()
            .map(|h| h.description.as_str())
            .collect();
        assert_eq!(ids, vec!["h1", "h2"]);
        assert_eq!(names, vec!["pool exhausted", "bad deploy"]);
        assert_eq!(session.current_hypothesis_index, 0);
        assert_eq!(
            session.hypotheses[0].react_session_state.context,
            "latency spike"
        );
    }

    #[test]
    fn unparseable_generation_completes_degraded() {
        let reasoner = ScriptedReasoner::new(["I cannot think of anything."]);
        let mut session = session();
        let outcome = step(&reasoner, &mut session, 3);
        assert!(outcome.is_done);
        assert_eq!(
            session.agent.completion_reason,
            Some(CompletionReason::MalformedOutput)
        );
        assert!(session.hypotheses.is_empty());
    }

    #[test]
    fn confirmed_hypothesis_ends_the_session() {
        let reasoner = ScriptedReasoner::new([
            GENERATION.to_string(),
            final_reply("pool is saturated", "db pool exhausted"),
            "Status: confirmed\nConfidence: 0.9\nReasoning: 100/100 active".to_string(),
        ]);
        let mut session = session();
        assert!(!step(&reasoner, &mut session, 3).is_done);
        assert!(!step(&reasoner, &mut session, 3).is_done);
        let outcome = step(&reasoner, &mut session, 3);
        assert!(outcome.is_done);
        let answer = outcome.final_answer.unwrap_or_default();
        assert!(answer.starts_with("Root cause: pool exhausted (confidence 90%)"));
        assert!(answer.contains("100/100 active"));
        assert!(session.hypotheses[1].evaluation.is_none());
        assert!(session.agent.history.is_empty());
    }

    #[test]
    fn exhausted_hypotheses_summarise_candidates() {
        let reasoner = ScriptedReasoner::new([
            r#"[{"description": "pool exhausted", "confidence": 0.8}]"#.to_string(),
            final_reply("nothing conclusive", "pool looked fine"),
            "Status: rejected\nConfidence: 0.2\nReasoning: pool at 10%".to_string(),
        ]);
        let mut session = session();
        for _ in 0..2 {
            assert!(!step(&reasoner, &mut session, 3).is_done);
        }
        let outcome = step(&reasoner, &mut session, 3);
        assert!(outcome.is_done);
        let answer = outcome.final_answer.unwrap_or_default();
        assert!(answer.contains("No hypothesis was confirmed after checking 1 candidate(s)"));
        assert!(answer.contains("- pool exhausted [rejected, 20%]: pool at 10%"));
        assert_eq!(session.current_hypothesis_index, NO_HYPOTHESIS_SELECTED);
    }

    #[test]
    fn done_session_takes_no_more_work() {
        let reasoner = ScriptedReasoner::new(Vec::<String>::new());
        let mut session = session();
        session
            .agent
            .complete("already known", CompletionReason::FinalAnswer);
        let before = session.clone();
        let outcome = step(&reasoner, &mut session, 3);
        assert!(outcome.is_done);
        assert_eq!(session, before);
        assert_eq!(reasoner.call_count(), 0);
    }
}
