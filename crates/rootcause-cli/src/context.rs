use anyhow::{Result, anyhow};
use rootcause_agent::InvestigationEngine;
use rootcause_core::AppConfig;
use rootcause_llm::{ChatCompletionsClient, RetryPolicy, RetryingClient};
use rootcause_observe::Observer;
use rootcause_store::{SessionStore, SqliteSessionStore};
use rootcause_tools::{PlatformShellRunner, ToolRegistry, register_command_tools};
use std::path::Path;
use std::sync::Arc;

/// Command-line overrides applied on top of the loaded configuration.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct EngineOverrides {
    pub max_cycles: Option<u32>,
    pub max_hypotheses: Option<u32>,
}

impl EngineOverrides {
    pub fn apply(self, cfg: &mut AppConfig) {
        if let Some(max_cycles) = self.max_cycles {
            cfg.engine.max_cycles = max_cycles;
        }
        if let Some(max_hypotheses) = self.max_hypotheses {
            cfg.engine.max_hypotheses = max_hypotheses;
        }
    }
}

pub(crate) fn load_config(cwd: &Path) -> Result<AppConfig> {
    AppConfig::ensure(cwd)
}

pub(crate) fn open_store(cwd: &Path, cfg: &AppConfig) -> Result<Arc<dyn SessionStore>> {
    let path = cfg.store_path(cwd);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = SqliteSessionStore::open(&path)
        .map_err(|err| anyhow!("failed to open session store {}: {err}", path.display()))?;
    Ok(Arc::new(store))
}

pub(crate) fn build_tools(cwd: &Path, cfg: &AppConfig) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    register_command_tools(
        &mut registry,
        &cfg.tools,
        cwd,
        Arc::new(PlatformShellRunner),
    )?;
    Ok(registry)
}

pub(crate) fn build_observer(cwd: &Path, cfg: &AppConfig, verbose: bool) -> Result<Observer> {
    let mut observer = Observer::new(cwd, &cfg.telemetry)?;
    observer.set_verbose(verbose);
    Ok(observer)
}

/// Wire the engine from configuration: HTTP reasoner behind the retry
/// decorator, command tools, the SQLite store and the file observer.
pub(crate) fn build_engine(
    cwd: &Path,
    cfg: &AppConfig,
    verbose: bool,
) -> Result<InvestigationEngine> {
    let observer = build_observer(cwd, cfg, verbose)?;
    let tools = build_tools(cwd, cfg)?;
    let store = open_store(cwd, cfg)?;
    let client = ChatCompletionsClient::new(cfg.llm.clone())?;
    let reasoner = RetryingClient::new(client, RetryPolicy::from_config(&cfg.llm));
    observer.verbose_log(&format!(
        "engine ready: model={} tools={} store={}",
        cfg.llm.model,
        tools.len(),
        cfg.store_path(cwd).display()
    ));
    Ok(InvestigationEngine::new(
        Arc::new(reasoner),
        Arc::new(tools),
        store,
        Arc::new(observer),
        cfg.engine.clone(),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rootcause_core::CommandToolConfig;

    #[test]
    fn overrides_replace_configured_limits() {
        let mut cfg = AppConfig::default();
        EngineOverrides {
            max_cycles: Some(9),
            max_hypotheses: None,
        }
        .apply(&mut cfg);
        assert_eq!(cfg.engine.max_cycles, 9);
        assert_eq!(cfg.engine.max_hypotheses, 3);
    }

    #[test]
    fn configured_command_tools_are_registered() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cfg = AppConfig::default();
        cfg.tools.push(CommandToolConfig {
            name: "disk_usage".to_string(),
            description: "Report disk usage".to_string(),
            parameters: vec![],
            command: "df -h".to_string(),
            timeout_seconds: 5,
        });
        let tools = build_tools(dir.path(), &cfg).expect("tools");
        assert_eq!(tools.len(), 1);
        assert!(tools.get("disk_usage").is_ok());
    }
}
