//! Test doubles shared by the engine and CLI test suites.

use anyhow::anyhow;
use rootcause_core::{ParameterKind, ToolParameter, ToolParameters};
use rootcause_llm::{ReasoningClient, ReasoningError};
use rootcause_tools::{ToolDefinition, ToolRegistry};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Reasoning client that replays canned replies in order and records every
/// prompt it was given.
#[derive(Default)]
pub struct ScriptedReasoner {
    replies: Mutex<VecDeque<Result<String, ReasoningError>>>,
    fallback: Option<Result<String, ReasoningError>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedReasoner {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(replies.into_iter().map(|r| Ok(r.into())))
    }

    pub fn from_results(replies: impl IntoIterator<Item = Result<String, ReasoningError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Reply used once the script runs out. Without one an exhausted script
    /// fails with a service error.
    pub fn with_fallback(mut self, reply: Result<String, ReasoningError>) -> Self {
        self.fallback = Some(reply);
        self
    }

    /// A reasoner that always gives the same reply.
    pub fn repeating(reply: impl Into<String>) -> Self {
        Self::default().with_fallback(Ok(reply.into()))
    }

    /// A reasoner that is always rate limited.
    pub fn rate_limited() -> Self {
        Self::default().with_fallback(Err(ReasoningError::RateLimited {
            attempts: 5,
            retry_after: None,
            detail: "HTTP 429: slow down".to_string(),
        }))
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.prompts().len()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|r| r.len()).unwrap_or_default()
    }
}

impl ReasoningClient for ScriptedReasoner {
    fn submit(&self, prompt: &str) -> Result<String, ReasoningError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let next = self
            .replies
            .lock()
            .map_err(|_| ReasoningError::Service("scripted reasoner mutex poisoned".to_string()))?
            .pop_front();
        match (next, &self.fallback) {
            (Some(reply), _) => reply,
            (None, Some(fallback)) => fallback.clone(),
            (None, None) => Err(ReasoningError::Service(
                "scripted reasoner exhausted".to_string(),
            )),
        }
    }
}

/// ReAct-formatted reply proposing a tool call.
pub fn action_reply(thought: &str, tool: &str, input: Value) -> String {
    format!("Thought: {thought}\nAction: {tool}\nAction Input: {input}")
}

/// ReAct-formatted reply concluding the investigation.
pub fn final_reply(thought: &str, answer: &str) -> String {
    format!("Thought: {thought}\nFinal Answer: {answer}")
}

/// Tool that records its calls and always returns `output`.
pub fn static_tool(name: &str, output: &str) -> (ToolDefinition, Arc<Mutex<Vec<ToolParameters>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    let output = output.to_string();
    let definition = ToolDefinition::new(
        name,
        format!("Fixture tool {name}"),
        vec![ToolParameter::optional(
            "service",
            ParameterKind::String,
            "service to inspect",
        )],
        move |params: &ToolParameters| -> anyhow::Result<String> {
            if let Ok(mut calls) = sink.lock() {
                calls.push(params.clone());
            }
            Ok(output.clone())
        },
    );
    (definition, calls)
}

pub fn failing_tool(name: &str, message: &str) -> ToolDefinition {
    let message = message.to_string();
    ToolDefinition::new(
        name,
        format!("Fixture tool {name} that always fails"),
        vec![],
        move |_: &ToolParameters| -> anyhow::Result<String> { Err(anyhow!("{message}")) },
    )
}

/// Registry with a `metrics_tool` reporting a latency spike.
pub fn metrics_registry() -> ToolRegistry {
    let (metrics, _) = static_tool(
        "metrics_tool",
        "checkout p99 latency 2300ms (baseline 200ms); db pool active 100/100",
    );
    let mut registry = ToolRegistry::new();
    // A fresh registry cannot hold a duplicate.
    let _ = registry.register(metrics);
    registry
}
