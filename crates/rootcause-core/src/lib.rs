use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};

mod config;

pub use config::{
    AppConfig, CommandToolConfig, EngineConfig, LlmConfig, StoreConfig, TelemetryConfig,
};

pub type Result<T> = anyhow::Result<T>;

/// `current_hypothesis_index` value before generation has selected anything.
pub const NO_HYPOTHESIS_SELECTED: i64 = -1;

/// Parameter payload handed to a tool capability.
pub type ToolParameters = Map<String, Value>;

pub fn runtime_dir(workspace: &Path) -> PathBuf {
    workspace.join(".rootcause")
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    #[default]
    Thinking,
    Acting,
    Observing,
    Completing,
    Completed,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentState::Thinking => "thinking",
            AgentState::Acting => "acting",
            AgentState::Observing => "observing",
            AgentState::Completing => "completing",
            AgentState::Completed => "completed",
        };
        f.write_str(name)
    }
}

pub fn is_valid_agent_state_transition(from: AgentState, to: AgentState) -> bool {
    match from {
        AgentState::Thinking => matches!(to, AgentState::Acting | AgentState::Completing),
        AgentState::Acting => to == AgentState::Observing,
        AgentState::Observing => matches!(to, AgentState::Thinking | AgentState::Completing),
        AgentState::Completing => to == AgentState::Completed,
        AgentState::Completed => false,
    }
}

/// Why an agent loop reached `Completed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// The model chose to conclude.
    FinalAnswer,
    /// The cycle ceiling was reached first.
    CycleLimit,
    /// The model produced output the parser could not act on.
    MalformedOutput,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvestigationMode {
    /// A single ReAct loop over the failure report.
    #[default]
    React,
    /// Generate ranked hypotheses and verify them one at a time.
    HypothesisTree,
}

impl fmt::Display for InvestigationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvestigationMode::React => write!(f, "react"),
            InvestigationMode::HypothesisTree => write!(f, "hypothesis_tree"),
        }
    }
}

impl std::str::FromStr for InvestigationMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "react" | "loop" => Ok(InvestigationMode::React),
            "hypothesis_tree" | "hypothesis-tree" | "hypotheses" | "tree" | "tot" => {
                Ok(InvestigationMode::HypothesisTree)
            }
            other => Err(format!(
                "unknown investigation mode '{other}' (expected react or hypotheses)"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolAction {
    pub tool: String,
    #[serde(default)]
    pub parameters: ToolParameters,
}

impl ToolAction {
    pub fn new(tool: impl Into<String>, parameters: ToolParameters) -> Self {
        Self {
            tool: tool.into(),
            parameters,
        }
    }

    /// Compact JSON rendering of the parameters, as echoed back into prompts.
    pub fn parameters_json(&self) -> String {
        serde_json::to_string(&self.parameters).unwrap_or_else(|_| "{}".to_string())
    }
}

/// One cycle's record. Never mutated after it is appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryItem {
    pub thinking: String,
    #[serde(default)]
    pub action: Option<ToolAction>,
    #[serde(default)]
    pub observation: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl HistoryItem {
    pub fn new(
        thinking: impl Into<String>,
        action: Option<ToolAction>,
        observation: Option<String>,
    ) -> Self {
        Self {
            thinking: thinking.into(),
            action,
            observation,
            timestamp: Utc::now(),
        }
    }
}

/// Resumable state of one ReAct line of investigation.
///
/// Used directly as the body of a `react` session and embedded in every
/// [`Hypothesis`] of a `hypothesis_tree` session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSession {
    pub context: String,
    #[serde(default)]
    pub state: AgentState,
    #[serde(default)]
    pub cycle_count: u32,
    #[serde(default)]
    pub history: Vec<HistoryItem>,
    #[serde(default)]
    pub last_thinking: Option<String>,
    #[serde(default)]
    pub last_action: Option<ToolAction>,
    #[serde(default)]
    pub last_observation: Option<String>,
    #[serde(default)]
    pub final_answer: Option<String>,
    #[serde(default)]
    pub forced_completion: bool,
    #[serde(default)]
    pub completion_reason: Option<CompletionReason>,
}

impl AgentSession {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            state: AgentState::Thinking,
            cycle_count: 0,
            history: Vec::new(),
            last_thinking: None,
            last_action: None,
            last_observation: None,
            final_answer: None,
            forced_completion: false,
            completion_reason: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state == AgentState::Completed
    }

    /// Append a finished cycle, keeping `cycle_count` in lockstep with `history`.
    pub fn append_history(&mut self, item: HistoryItem) {
        self.history.push(item);
        self.cycle_count = self.history.len() as u32;
    }

    pub fn complete(&mut self, answer: impl Into<String>, reason: CompletionReason) {
        self.final_answer = Some(answer.into());
        self.completion_reason = Some(reason);
        self.state = AgentState::Completed;
    }

    pub fn invariants_hold(&self) -> bool {
        self.cycle_count as usize == self.history.len()
            && (self.state == AgentState::Completed) == self.final_answer.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HypothesisStatus {
    #[default]
    Unverified,
    Confirmed,
    Rejected,
    Inconclusive,
}

impl fmt::Display for HypothesisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HypothesisStatus::Unverified => "unverified",
            HypothesisStatus::Confirmed => "confirmed",
            HypothesisStatus::Rejected => "rejected",
            HypothesisStatus::Inconclusive => "inconclusive",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    pub hypothesis_id: String,
    pub status: HypothesisStatus,
    pub confidence: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hypothesis {
    pub id: String,
    pub description: String,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub status: HypothesisStatus,
    pub react_session_state: AgentSession,
    #[serde(default)]
    pub evaluation: Option<EvaluationResult>,
}

impl Hypothesis {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        confidence: f64,
        reasoning: impl Into<String>,
        context: &str,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: reasoning.into(),
            status: HypothesisStatus::Unverified,
            react_session_state: AgentSession::new(context),
            evaluation: None,
        }
    }

    pub fn is_evaluated(&self) -> bool {
        self.evaluation.is_some()
    }

    pub fn apply_evaluation(&mut self, result: EvaluationResult) {
        self.status = result.status;
        self.confidence = result.confidence.clamp(0.0, 1.0);
        self.evaluation = Some(result);
    }
}

/// Durable checkpoint of one investigation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub session_id: String,
    #[serde(default)]
    pub mode: InvestigationMode,
    #[serde(flatten)]
    pub agent: AgentSession,
    #[serde(default)]
    pub hypotheses: Vec<Hypothesis>,
    #[serde(default = "default_hypothesis_index")]
    pub current_hypothesis_index: i64,
    /// Incremented every time a step is persisted.
    #[serde(default)]
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_hypothesis_index() -> i64 {
    NO_HYPOTHESIS_SELECTED
}

impl Session {
    pub fn new(
        session_id: impl Into<String>,
        context: impl Into<String>,
        mode: InvestigationMode,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            mode,
            agent: AgentSession::new(context),
            hypotheses: Vec::new(),
            current_hypothesis_index: NO_HYPOTHESIS_SELECTED,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn context(&self) -> &str {
        &self.agent.context
    }

    pub fn is_done(&self) -> bool {
        self.agent.is_completed()
    }

    pub fn current_hypothesis(&self) -> Option<&Hypothesis> {
        usize::try_from(self.current_hypothesis_index)
            .ok()
            .and_then(|idx| self.hypotheses.get(idx))
    }

    pub fn current_hypothesis_mut(&mut self) -> Option<&mut Hypothesis> {
        usize::try_from(self.current_hypothesis_index)
            .ok()
            .and_then(|idx| self.hypotheses.get_mut(idx))
    }

    /// Bump the checkpoint revision ahead of a save.
    pub fn touch(&mut self) {
        self.revision = self.revision.saturating_add(1);
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    String,
    Number,
    StringArray,
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParameterKind::String => "string",
            ParameterKind::Number => "number",
            ParameterKind::StringArray => "string[]",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParameterKind,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl ToolParameter {
    pub fn required(name: impl Into<String>, kind: ParameterKind, description: &str) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.to_string(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParameterKind, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub session_id: String,
    pub at: DateTime<Utc>,
    pub kind: EventKind,
}

impl EventEnvelope {
    pub fn now(session_id: &str, kind: EventKind) -> Self {
        Self {
            session_id: session_id.to_string(),
            at: Utc::now(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    SessionStarted {
        mode: InvestigationMode,
    },
    SessionResumed {
        revision: u64,
        state: AgentState,
    },
    CycleCompleted {
        cycle: u32,
        tool: Option<String>,
        hypothesis_id: Option<String>,
    },
    ToolFailed {
        tool: String,
        error: String,
    },
    MalformedOutput {
        reason: String,
    },
    ForcedCompletion {
        cycles: u32,
    },
    HypothesesGenerated {
        count: usize,
    },
    HypothesisEvaluated {
        hypothesis_id: String,
        status: HypothesisStatus,
        confidence: f64,
    },
    SessionCompleted {
        reason: Option<CompletionReason>,
    },
    ContinuationScheduled {
        revision: u64,
    },
}

impl EventKind {
    pub fn category(&self) -> &'static str {
        match self {
            EventKind::SessionStarted { .. }
            | EventKind::SessionResumed { .. }
            | EventKind::SessionCompleted { .. }
            | EventKind::ContinuationScheduled { .. } => "session",
            EventKind::CycleCompleted { .. }
            | EventKind::MalformedOutput { .. }
            | EventKind::ForcedCompletion { .. } => "cycle",
            EventKind::ToolFailed { .. } => "tool",
            EventKind::HypothesesGenerated { .. } | EventKind::HypothesisEvaluated { .. } => {
                "hypothesis"
            }
        }
    }
}
