use crate::shell::ShellRunner;
use crate::{ToolCapability, ToolDefinition, ToolError, ToolRegistry};
use anyhow::{Result, anyhow};
use rootcause_core::{CommandToolConfig, ToolParameter, ToolParameters};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

static PLACEHOLDER: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("placeholder regex")
});

/// Diagnostic tool backed by a shell command template.
///
/// `{name}` placeholders are replaced by the shell-quoted argument value;
/// arrays expand to space-separated quoted words and absent optional
/// parameters expand to nothing. Braces that do not name a declared
/// parameter are left as written.
pub struct CommandTool {
    name: String,
    template: String,
    parameters: Vec<ToolParameter>,
    timeout: Duration,
    workspace: PathBuf,
    runner: Arc<dyn ShellRunner + Send + Sync>,
}

impl CommandTool {
    pub fn new(
        cfg: &CommandToolConfig,
        workspace: &Path,
        runner: Arc<dyn ShellRunner + Send + Sync>,
    ) -> Self {
        Self {
            name: cfg.name.clone(),
            template: cfg.command.clone(),
            parameters: cfg.parameters.clone(),
            timeout: Duration::from_secs(cfg.timeout_seconds.max(1)),
            workspace: workspace.to_path_buf(),
            runner,
        }
    }

    /// Substitution is a single pass over the template; inserted values are
    /// never scanned for placeholders.
    pub fn render(&self, args: &ToolParameters) -> String {
        PLACEHOLDER
            .replace_all(&self.template, |caps: &regex::Captures<'_>| {
                let name = &caps[1];
                if self.parameters.iter().any(|p| p.name == name) {
                    args.get(name).map(quote_value).unwrap_or_default()
                } else {
                    caps[0].to_string()
                }
            })
            .into_owned()
    }
}

fn quote_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => shell_words::quote(s).into_owned(),
        Value::Array(items) => shell_words::join(items.iter().map(|item| match item {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
        other => shell_words::quote(&other.to_string()).into_owned(),
    }
}

impl ToolCapability for CommandTool {
    fn execute(&self, parameters: &ToolParameters) -> Result<String> {
        let cmd = self.render(parameters);
        let out = self.runner.run(&cmd, &self.workspace, self.timeout)?;
        if out.timed_out {
            return Err(anyhow!(
                "{} timed out after {}s",
                self.name,
                self.timeout.as_secs()
            ));
        }
        match out.status {
            Some(0) => Ok(out.stdout),
            status => {
                let code = status.map_or_else(|| "signal".to_string(), |c| c.to_string());
                let mut text = out.stdout;
                if !out.stderr.trim().is_empty() {
                    if !text.is_empty() && !text.ends_with('\n') {
                        text.push('\n');
                    }
                    text.push_str(&format!("stderr: {}", out.stderr.trim_end()));
                }
                text.push_str(&format!("\nexit status: {code}"));
                Ok(text.trim_start().to_string())
            }
        }
    }
}

/// Register every configured command tool.
pub fn register_command_tools(
    registry: &mut ToolRegistry,
    tools: &[CommandToolConfig],
    workspace: &Path,
    runner: Arc<dyn ShellRunner + Send + Sync>,
) -> Result<(), ToolError> {
    for cfg in tools {
        let tool = CommandTool::new(cfg, workspace, Arc::clone(&runner));
        registry.register(ToolDefinition::new(
            cfg.name.clone(),
            cfg.description.clone(),
            cfg.parameters.clone(),
            tool,
        ))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::ShellRunResult;
    use rootcause_core::ParameterKind;
    use serde_json::json;
    use std::sync::Mutex;

    struct RecordingRunner {
        commands: Mutex<Vec<String>>,
        result: ShellRunResult,
    }

    impl RecordingRunner {
        fn new(result: ShellRunResult) -> Arc<Self> {
            Arc::new(Self {
                commands: Mutex::new(Vec::new()),
                result,
            })
        }
    }

    impl ShellRunner for RecordingRunner {
        fn run(&self, cmd: &str, _cwd: &Path, _timeout: Duration) -> Result<ShellRunResult> {
            self.commands.lock().unwrap().push(cmd.to_string());
            Ok(self.result.clone())
        }
    }

    fn ok(stdout: &str) -> ShellRunResult {
        ShellRunResult {
            status: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
            timed_out: false,
        }
    }

    fn logs_config() -> CommandToolConfig {
        CommandToolConfig {
            name: "logs_tool".to_string(),
            description: "Search service logs".to_string(),
            parameters: vec![
                ToolParameter::required("service", ParameterKind::String, "service"),
                ToolParameter::optional("hosts", ParameterKind::StringArray, "hosts"),
            ],
            command: "grep-logs --service {service} {hosts}".to_string(),
            timeout_seconds: 10,
        }
    }

    fn args(value: Value) -> ToolParameters {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn placeholders_are_shell_quoted() {
        let runner = RecordingRunner::new(ok(""));
        let tool = CommandTool::new(&logs_config(), Path::new("."), runner);
        let cmd = tool.render(&args(json!({
            "service": "check out; rm -rf /",
            "hosts": ["web 1", "web-2"],
        })));
        assert_eq!(
            cmd,
            "grep-logs --service 'check out; rm -rf /' 'web 1' web-2"
        );
        let bare = tool.render(&args(json!({"service": "checkout"})));
        assert_eq!(bare, "grep-logs --service checkout ");
    }

    #[test]
    fn substituted_values_are_not_expanded_again() {
        let runner = RecordingRunner::new(ok(""));
        let tool = CommandTool::new(&logs_config(), Path::new("."), runner);
        let cmd = tool.render(&args(json!({
            "service": "a {hosts}",
            "hosts": ["x; touch /tmp/owned; y"],
        })));
        assert_eq!(
            cmd,
            "grep-logs --service 'a {hosts}' 'x; touch /tmp/owned; y'"
        );
        assert_eq!(
            shell_words::split(&cmd).expect("well-formed quoting"),
            ["grep-logs", "--service", "a {hosts}", "x; touch /tmp/owned; y"]
        );
    }

    #[test]
    fn undeclared_braces_are_left_alone() {
        let runner = RecordingRunner::new(ok(""));
        let mut cfg = logs_config();
        cfg.command = "jq '{level}' --arg s {service}".to_string();
        let tool = CommandTool::new(&cfg, Path::new("."), runner);
        let cmd = tool.render(&args(json!({"service": "db"})));
        assert_eq!(cmd, "jq '{level}' --arg s db");
    }

    #[test]
    fn non_zero_exit_reports_stderr_and_status() {
        let runner = RecordingRunner::new(ShellRunResult {
            status: Some(2),
            stdout: String::new(),
            stderr: "no such service\n".to_string(),
            timed_out: false,
        });
        let tool = CommandTool::new(&logs_config(), Path::new("."), runner);
        let out = tool
            .execute(&args(json!({"service": "ghost"})))
            .expect("non-zero is still an observation");
        assert_eq!(out, "stderr: no such service\nexit status: 2");
    }

    #[test]
    fn timeouts_are_failures() {
        let runner = RecordingRunner::new(ShellRunResult {
            status: None,
            stdout: String::new(),
            stderr: String::new(),
            timed_out: true,
        });
        let tool = CommandTool::new(&logs_config(), Path::new("."), runner);
        let err = tool
            .execute(&args(json!({"service": "checkout"})))
            .expect_err("timeout");
        assert!(err.to_string().contains("timed out after 10s"));
    }

    #[test]
    fn configured_tools_register_in_order() {
        let runner = RecordingRunner::new(ok("ERROR pool exhausted\n"));
        let mut metrics = logs_config();
        metrics.name = "metrics_tool".to_string();
        metrics.command = "metrics {service}".to_string();

        let mut registry = ToolRegistry::new();
        register_command_tools(
            &mut registry,
            &[logs_config(), metrics],
            Path::new("."),
            runner.clone(),
        )
        .expect("register");

        let names: Vec<_> = registry.descriptions().map(|d| d.name).collect();
        assert_eq!(names, vec!["logs_tool", "metrics_tool"]);
        let out = registry
            .execute("metrics_tool", &args(json!({"service": "db"})))
            .expect("execute");
        assert_eq!(out, "ERROR pool exhausted\n");
        assert_eq!(runner.commands.lock().unwrap().as_slice(), ["metrics db"]);
    }
}
