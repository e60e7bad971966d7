//! Prompt builders for every model turn the engine takes.

use rootcause_core::{AgentSession, HistoryItem, Hypothesis};
use rootcause_tools::ToolDescription;
use std::fmt::Write as _;

/// Hypothesis the current ReAct loop is trying to verify.
#[derive(Debug, Clone, PartialEq)]
pub struct HypothesisFocus {
    pub id: String,
    pub description: String,
    pub reasoning: String,
}

impl HypothesisFocus {
    pub fn of(hypothesis: &Hypothesis) -> Self {
        Self {
            id: hypothesis.id.clone(),
            description: hypothesis.description.clone(),
            reasoning: hypothesis.reasoning.clone(),
        }
    }
}

const REACT_FORMAT: &str = r#"Respond in exactly one of these two formats.

To gather more evidence:
Thought: <what you want to learn and why>
Action: <tool name from the list above>
Action Input: <JSON object with the tool parameters>

When the evidence is sufficient:
Thought: <summary of the evidence>
Final Answer: <root cause, supporting evidence, and recommended remediation>"#;

pub fn react_prompt<'a>(
    context: &str,
    focus: Option<&HypothesisFocus>,
    tools: impl Iterator<Item = ToolDescription<'a>>,
    history: &[HistoryItem],
) -> String {
    let mut prompt = String::from(
        "You are investigating an operational failure and must find its root cause.\n\n",
    );
    push_context(&mut prompt, context);
    if let Some(focus) = focus {
        push_focus(&mut prompt, focus);
    }
    prompt.push_str("## Available tools\n");
    let mut any_tool = false;
    for tool in tools {
        any_tool = true;
        let _ = writeln!(prompt, "- {}: {}", tool.name, tool.description);
        for param in tool.parameters {
            let _ = writeln!(
                prompt,
                "    - {} ({}{}): {}",
                param.name,
                param.kind,
                if param.required { ", required" } else { "" },
                param.description
            );
        }
    }
    if !any_tool {
        prompt.push_str("(no tools are registered; conclude from the report alone)\n");
    }
    prompt.push('\n');
    push_history(&mut prompt, history);
    prompt.push_str(REACT_FORMAT);
    prompt
}

/// Closing turn once the loop must stop, asking for the best available answer.
pub fn completion_prompt(
    context: &str,
    focus: Option<&HypothesisFocus>,
    history: &[HistoryItem],
    forced: bool,
) -> String {
    let mut prompt = String::from("You are concluding a root-cause investigation.\n\n");
    push_context(&mut prompt, context);
    if let Some(focus) = focus {
        push_focus(&mut prompt, focus);
    }
    push_history(&mut prompt, history);
    if forced {
        prompt.push_str(
            "The investigation has reached its step limit. Do not request more tools.\n",
        );
    }
    prompt.push_str(
        "Based only on the evidence gathered so far, give your best explanation of the root cause.\n\
         Respond with:\nFinal Answer: <root cause, supporting evidence, and recommended remediation>",
    );
    prompt
}

pub fn hypothesis_prompt<'a>(
    context: &str,
    max_hypotheses: u32,
    tools: impl Iterator<Item = ToolDescription<'a>>,
) -> String {
    let mut prompt = String::from(
        "You are an SRE triaging an operational failure. Before gathering data, list the \
         most plausible root causes.\n\n",
    );
    push_context(&mut prompt, context);
    let names: Vec<&str> = tools.map(|t| t.name).collect();
    if !names.is_empty() {
        let _ = writeln!(
            prompt,
            "Each hypothesis will later be checked with these tools: {}\n",
            names.join(", ")
        );
    }
    let _ = write!(
        prompt,
        "Propose up to {max_hypotheses} distinct hypotheses. Respond with a JSON array only:\n\
         [{{\"description\": \"<root cause>\", \"confidence\": <0.0-1.0>, \"reasoning\": \"<why>\"}}]"
    );
    prompt
}

pub fn evaluation_prompt(hypothesis: &Hypothesis, context: &str, history: &[HistoryItem]) -> String {
    let mut prompt = String::from(
        "You are reviewing the evidence gathered for one root-cause hypothesis.\n\n",
    );
    push_context(&mut prompt, context);
    let _ = writeln!(
        prompt,
        "## Hypothesis {}\n{}\nPrior confidence: {:.2}\n",
        hypothesis.id, hypothesis.description, hypothesis.confidence
    );
    push_history(&mut prompt, history);
    if let Some(conclusion) = &hypothesis.react_session_state.final_answer {
        let _ = writeln!(prompt, "## Investigator conclusion\n{conclusion}\n");
    }
    prompt.push_str(
        "Decide whether the evidence confirms the hypothesis. Respond with:\n\
         Status: confirmed | rejected | inconclusive\n\
         Confidence: <0.0-1.0>\n\
         Reasoning: <short justification citing the evidence>",
    );
    prompt
}

fn push_context(prompt: &mut String, context: &str) {
    let _ = writeln!(prompt, "## Failure report\n{}\n", context.trim());
}

fn push_focus(prompt: &mut String, focus: &HypothesisFocus) {
    let _ = writeln!(
        prompt,
        "## Hypothesis under verification ({})\n{}",
        focus.id, focus.description
    );
    if !focus.reasoning.is_empty() {
        let _ = writeln!(prompt, "Initial reasoning: {}", focus.reasoning);
    }
    prompt.push_str(
        "Gather evidence that confirms or refutes this hypothesis specifically.\n\n",
    );
}

fn push_history(prompt: &mut String, history: &[HistoryItem]) {
    if history.is_empty() {
        return;
    }
    prompt.push_str("## Previous steps\n");
    prompt.push_str(&format_history(history));
    prompt.push('\n');
}

pub fn format_history(history: &[HistoryItem]) -> String {
    let mut out = String::new();
    for (idx, item) in history.iter().enumerate() {
        let _ = writeln!(out, "Step {}:", idx + 1);
        let _ = writeln!(out, "Thought: {}", item.thinking);
        if let Some(action) = &item.action {
            let _ = writeln!(out, "Action: {}", action.tool);
            let _ = writeln!(out, "Action Input: {}", action.parameters_json());
        }
        if let Some(observation) = &item.observation {
            let _ = writeln!(out, "Observation: {observation}");
        }
    }
    out
}

/// Answer used when the model gives nothing usable at completion time.
pub fn fallback_answer(agent: &AgentSession, focus: Option<&HypothesisFocus>) -> String {
    let mut out = match focus {
        Some(focus) => format!(
            "Investigation of hypothesis {} ({}) ended after {} step(s) without a conclusive answer.",
            focus.id, focus.description, agent.cycle_count
        ),
        None => format!(
            "Investigation ended after {} step(s) without a conclusive answer.",
            agent.cycle_count
        ),
    };
    let evidence: Vec<&str> = agent
        .history
        .iter()
        .filter_map(|item| item.observation.as_deref())
        .filter(|obs| !obs.trim().is_empty())
        .collect();
    if evidence.is_empty() {
        out.push_str(" No evidence was gathered.");
    } else {
        out.push_str(" Evidence gathered:");
        for obs in evidence.iter().rev().take(3).rev() {
            let _ = write!(out, "\n- {}", first_line(obs));
        }
    }
    out
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default().trim()
}
