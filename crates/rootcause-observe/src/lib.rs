use anyhow::Result;
use chrono::Utc;
use reqwest::blocking::Client;
use rootcause_core::{EventEnvelope, TelemetryConfig, runtime_dir};
use serde_json::{Value, json};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

const TELEMETRY_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy)]
enum Level {
    Info,
    Warn,
    Event,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Event => "EVENT",
        }
    }
}

/// Append one timestamped line to `path`.
fn append_line(path: &Path, level: &str, body: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{} {level} {body}", Utc::now().to_rfc3339())
}

/// Process-wide sink for engine logs and events.
///
/// Lines go to `<workspace>/.rootcause/observe.log`; `verbose_log` mirrors to
/// stderr when verbose mode is on, `warn_log` always does.
pub struct Observer {
    log_path: Option<PathBuf>,
    telemetry: Option<TelemetrySink>,
    verbose: bool,
}

/// Posts event summaries to a collector on a detached thread.
struct TelemetrySink {
    endpoint: String,
    client: Client,
}

impl TelemetrySink {
    fn from_config(cfg: &TelemetryConfig) -> Result<Option<Self>> {
        match (&cfg.endpoint, cfg.enabled) {
            (Some(endpoint), true) => Ok(Some(Self {
                endpoint: endpoint.clone(),
                client: Client::builder().timeout(TELEMETRY_TIMEOUT).build()?,
            })),
            _ => Ok(None),
        }
    }

    /// Delivery failures land in `failure_log` when there is one.
    fn send(&self, name: &str, payload: Value, failure_log: Option<PathBuf>) {
        let body = json!({
            "name": name,
            "at": Utc::now().to_rfc3339(),
            "payload": payload,
        });
        let request = self.client.post(&self.endpoint).json(&body);
        thread::spawn(move || {
            if let Err(err) = request.send()
                && let Some(path) = failure_log
            {
                let _ = append_line(&path, "TELEMETRY_ERROR", &format!("error={err}"));
            }
        });
    }
}

impl Observer {
    pub fn new(workspace: &Path, telemetry_cfg: &TelemetryConfig) -> Result<Self> {
        let dir = runtime_dir(workspace);
        fs::create_dir_all(&dir)?;
        Ok(Self {
            log_path: Some(dir.join("observe.log")),
            telemetry: TelemetrySink::from_config(telemetry_cfg)?,
            verbose: false,
        })
    }

    /// An observer that writes nothing to disk and sends no telemetry.
    pub fn ephemeral() -> Self {
        Self {
            log_path: None,
            telemetry: None,
            verbose: false,
        }
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Persist an engine event and forward it to telemetry.
    pub fn record_event(&self, event: &EventEnvelope) -> Result<()> {
        let encoded = serde_json::to_string(event)?;
        let category = event.kind.category();
        self.write(Level::Event, &encoded)?;
        if self.verbose {
            eprintln!("[rootcause] {} {category} {encoded}", event.session_id);
        }
        if let Some(sink) = &self.telemetry {
            sink.send(
                "rootcause.event",
                json!({
                    "session_id": event.session_id,
                    "category": category,
                    "kind": event.kind,
                }),
                self.log_path.clone(),
            );
        }
        Ok(())
    }

    pub fn verbose_log(&self, msg: &str) {
        if self.verbose {
            eprintln!("[rootcause] {msg}");
        }
        let _ = self.write(Level::Info, msg);
    }

    /// Always reaches stderr, verbose or not.
    pub fn warn_log(&self, msg: &str) {
        eprintln!("[rootcause WARN] {msg}");
        let _ = self.write(Level::Warn, msg);
    }

    fn write(&self, level: Level, body: &str) -> Result<()> {
        if let Some(path) = &self.log_path {
            append_line(path, level.tag(), body)?;
        }
        Ok(())
    }
}
