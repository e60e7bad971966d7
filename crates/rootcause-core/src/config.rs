use crate::{InvestigationMode, Result, ToolParameter, runtime_dir};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub engine: EngineConfig,
    pub store: StoreConfig,
    /// Command-backed diagnostic tools exposed to the reasoning loop.
    pub tools: Vec<CommandToolConfig>,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn user_settings_path() -> Option<PathBuf> {
        let home = std::env::var("HOME")
            .ok()
            .or_else(|| std::env::var("USERPROFILE").ok())?;
        Some(Path::new(&home).join(".rootcause/settings.json"))
    }

    pub fn project_settings_path(workspace: &Path) -> PathBuf {
        runtime_dir(workspace).join("settings.json")
    }

    pub fn project_local_settings_path(workspace: &Path) -> PathBuf {
        runtime_dir(workspace).join("settings.local.json")
    }

    pub fn legacy_toml_path(workspace: &Path) -> PathBuf {
        runtime_dir(workspace).join("config.toml")
    }

    pub fn load(workspace: &Path) -> Result<Self> {
        let mut paths = Vec::new();
        if let Some(user) = Self::user_settings_path() {
            paths.push(user);
        }
        paths.push(Self::project_settings_path(workspace));
        paths.push(Self::project_local_settings_path(workspace));
        Self::load_layers(&Self::legacy_toml_path(workspace), &paths)
    }

    fn load_layers(legacy: &Path, json_layers: &[PathBuf]) -> Result<Self> {
        let mut merged = serde_json::to_value(Self::default())?;

        if legacy.exists() {
            let raw = fs::read_to_string(legacy)?;
            let legacy_cfg: AppConfig = toml::from_str(&raw)?;
            merge_json_value(&mut merged, &serde_json::to_value(legacy_cfg)?);
        }

        for path in json_layers {
            if !path.exists() {
                continue;
            }
            let raw = fs::read_to_string(path)?;
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            merge_json_value(&mut merged, &value);
        }

        Ok(serde_json::from_value(merged)?)
    }

    pub fn ensure(workspace: &Path) -> Result<Self> {
        let path = Self::project_settings_path(workspace);
        if path.exists()
            || Self::project_local_settings_path(workspace).exists()
            || Self::legacy_toml_path(workspace).exists()
            || Self::user_settings_path().is_some_and(|p| p.exists())
        {
            return Self::load(workspace);
        }
        let cfg = Self::default();
        cfg.save(workspace)?;
        Ok(cfg)
    }

    pub fn save(&self, workspace: &Path) -> Result<()> {
        let path = Self::project_settings_path(workspace);
        fs::create_dir_all(
            path.parent()
                .ok_or_else(|| anyhow::anyhow!("invalid config path"))?,
        )?;
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// Resolved location of the session database.
    pub fn store_path(&self, workspace: &Path) -> PathBuf {
        match &self.store.path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => workspace.join(path),
            None => runtime_dir(workspace).join("sessions.sqlite"),
        }
    }
}

fn merge_json_value(base: &mut serde_json::Value, overlay: &serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_obj), serde_json::Value::Object(overlay_obj)) => {
            for (key, overlay_value) in overlay_obj {
                if let Some(base_value) = base_obj.get_mut(key) {
                    merge_json_value(base_value, overlay_value);
                } else {
                    base_obj.insert(key.clone(), overlay_value.clone());
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}

/// Connection and backoff settings for the reasoning service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    /// OpenAI-compatible chat completions endpoint.
    pub endpoint: String,
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
    pub max_retries: u8,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
    /// Fractional jitter applied to each backoff delay (0.2 = ±20%).
    pub retry_jitter: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: None,
            api_key_env: "ROOTCAUSE_API_KEY".to_string(),
            temperature: 0.2,
            max_tokens: 2048,
            timeout_seconds: 60,
            max_retries: 4,
            retry_base_ms: 1000,
            retry_max_ms: 60_000,
            retry_jitter: 0.2,
        }
    }
}

/// Options recognised by the investigation engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Cycle ceiling for every agent loop.
    pub max_cycles: u32,
    /// How many candidate root causes to request during generation.
    pub max_hypotheses: u32,
    /// Mode used for new sessions when the caller does not pick one.
    pub mode: InvestigationMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_cycles: 5,
            max_hypotheses: 3,
            mode: InvestigationMode::React,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_cycles == 0 {
            return Err(anyhow::anyhow!("engine.max_cycles must be at least 1"));
        }
        if self.max_hypotheses == 0 {
            return Err(anyhow::anyhow!("engine.max_hypotheses must be at least 1"));
        }
        Ok(())
    }

    /// Upper bound on invocations needed to finish a session in `mode`.
    pub fn invocation_bound(&self, mode: InvestigationMode) -> u64 {
        let per_loop = u64::from(self.max_cycles) + 1;
        match mode {
            InvestigationMode::React => per_loop,
            InvestigationMode::HypothesisTree => {
                1 + u64::from(self.max_hypotheses) * (per_loop + 1)
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Session database path; relative paths resolve against the workspace.
    pub path: Option<PathBuf>,
}

/// Declaration of a diagnostic tool backed by a shell command template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandToolConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
    /// Command line with `{param}` placeholders.
    pub command: String,
    #[serde(default = "default_tool_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_tool_timeout_seconds() -> u64 {
    30
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub endpoint: Option<String>,
}
