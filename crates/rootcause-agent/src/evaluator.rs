use crate::AgentError;
use crate::parsing::parse_evaluation;
use crate::prompts;
use rootcause_core::{EvaluationResult, HistoryItem, Hypothesis, HypothesisStatus};
use rootcause_llm::ReasoningClient;
use rootcause_observe::Observer;

/// Confidence recorded when the verdict could not be obtained because the
/// reasoning service was overloaded.
pub const RATE_LIMITED_CONFIDENCE: f64 = 0.1;

/// Judges one hypothesis against the transcript gathered while verifying it.
pub struct Evaluator<'a> {
    reasoner: &'a dyn ReasoningClient,
    observer: &'a Observer,
}

impl<'a> Evaluator<'a> {
    pub fn new(reasoner: &'a dyn ReasoningClient, observer: &'a Observer) -> Self {
        Self { reasoner, observer }
    }

    /// A rate-limited service yields an `inconclusive` verdict at
    /// [`RATE_LIMITED_CONFIDENCE`], never an error.
    pub fn evaluate_hypothesis(
        &self,
        hypothesis: &Hypothesis,
        context: &str,
        history: &[HistoryItem],
    ) -> Result<EvaluationResult, AgentError> {
        let prompt = prompts::evaluation_prompt(hypothesis, context, history);
        let reply = match self.reasoner.submit(&prompt) {
            Ok(reply) => reply,
            Err(err) if err.is_rate_limited() => {
                self.observer.warn_log(&format!(
                    "evaluation of {} skipped: {err}",
                    hypothesis.id
                ));
                return Ok(EvaluationResult {
                    hypothesis_id: hypothesis.id.clone(),
                    status: HypothesisStatus::Inconclusive,
                    confidence: RATE_LIMITED_CONFIDENCE,
                    reasoning: "Evaluation could not be completed because the reasoning \
                                service was rate limited."
                        .to_string(),
                });
            }
            Err(err) => return Err(err.into()),
        };
        let parsed = parse_evaluation(&reply, hypothesis.confidence);
        self.observer.verbose_log(&format!(
            "hypothesis {} evaluated as {} ({:.2})",
            hypothesis.id, parsed.status, parsed.confidence
        ));
        Ok(EvaluationResult {
            hypothesis_id: hypothesis.id.clone(),
            status: parsed.status,
            confidence: parsed.confidence,
            reasoning: parsed.reasoning,
        })
    }
}
