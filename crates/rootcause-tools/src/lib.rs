//! Registry of named diagnostic capabilities.
//!
//! Tools are registered up front, then shared read-only with the reasoning
//! loop. Every call goes through [`ToolRegistry::execute`], which checks the
//! arguments against the declared parameter schema before delegating.

mod command;
mod shell;
mod validation;

pub use command::{CommandTool, register_command_tools};
pub use shell::{PlatformShellRunner, ShellRunResult, ShellRunner};
pub use validation::validate_parameters;

use indexmap::IndexMap;
use rootcause_core::{ToolParameter, ToolParameters};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("tool '{0}' is already registered")]
    Duplicate(String),
    #[error("unknown tool '{0}'")]
    Unknown(String),
    #[error("invalid parameters for '{tool}': {reason}")]
    InvalidParameters { tool: String, reason: String },
    #[error("tool '{tool}' failed: {source}")]
    Execution {
        tool: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl ToolError {
    fn execution(tool: &str, err: anyhow::Error) -> Self {
        ToolError::Execution {
            tool: tool.to_string(),
            source: format!("{err:#}").into(),
        }
    }
}

/// Something a tool can do once its arguments have been validated.
pub trait ToolCapability: Send + Sync {
    fn execute(&self, parameters: &ToolParameters) -> anyhow::Result<String>;
}

impl<F> ToolCapability for F
where
    F: Fn(&ToolParameters) -> anyhow::Result<String> + Send + Sync,
{
    fn execute(&self, parameters: &ToolParameters) -> anyhow::Result<String> {
        self(parameters)
    }
}

#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
    capability: Arc<dyn ToolCapability>,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<ToolParameter>,
        capability: impl ToolCapability + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            capability: Arc::new(capability),
        }
    }

    pub fn describe(&self) -> ToolDescription<'_> {
        ToolDescription {
            name: &self.name,
            description: &self.description,
            parameters: &self.parameters,
        }
    }
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Catalogue view of a tool, as shown to the model.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ToolDescription<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub parameters: &'a [ToolParameter],
}

#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: ToolDefinition) -> Result<(), ToolError> {
        if self.tools.contains_key(&definition.name) {
            return Err(ToolError::Duplicate(definition.name));
        }
        self.tools.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&ToolDefinition, ToolError> {
        self.tools
            .get(name)
            .ok_or_else(|| ToolError::Unknown(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tools in registration order. The iterator is lazy and can be cloned to
    /// walk the catalogue again.
    pub fn descriptions(&self) -> impl Iterator<Item = ToolDescription<'_>> + Clone {
        self.tools.values().map(ToolDefinition::describe)
    }

    pub fn execute(&self, name: &str, parameters: &ToolParameters) -> Result<String, ToolError> {
        let tool = self.get(name)?;
        validate_parameters(&tool.parameters, parameters).map_err(|reason| {
            ToolError::InvalidParameters {
                tool: name.to_string(),
                reason,
            }
        })?;
        tool.capability
            .execute(parameters)
            .map_err(|err| ToolError::execution(name, err))
    }
}
