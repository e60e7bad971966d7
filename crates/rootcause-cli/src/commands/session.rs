use crate::context::{load_config, open_store};
use crate::output::{clip, print_json};
use anyhow::{Result, anyhow};
use clap::Subcommand;
use serde_json::json;
use std::path::Path;

#[derive(Subcommand)]
pub enum SessionCmd {
    /// List stored sessions, newest first
    List,
    /// Show a stored session with its history and hypotheses
    Show {
        /// Session ID to show
        id: String,
    },
    /// Delete a stored session
    Delete {
        /// Session ID to delete
        id: String,
    },
}

pub fn run_session_cmd(workspace: &Path, command: SessionCmd, json_mode: bool) -> Result<()> {
    let cfg = load_config(workspace)?;
    let store = open_store(workspace, &cfg)?;

    match command {
        SessionCmd::List => {
            let sessions = store.list()?;
            if json_mode {
                return print_json(&sessions);
            }
            if sessions.is_empty() {
                println!("No sessions found.");
                return Ok(());
            }
            println!(
                "{:<38} | {:<15} | {:<10} | {:>6} | {}",
                "SESSION ID", "MODE", "STATE", "CYCLES", "REPORT"
            );
            println!("{:-<38}-+-{:-<15}-+-{:-<10}-+-{:-<6}-+-{:-<30}", "", "", "", "", "");
            for s in sessions {
                println!(
                    "{:<38} | {:<15} | {:<10} | {:>6} | {}",
                    s.session_id,
                    s.mode.to_string(),
                    s.state.to_string(),
                    s.cycle_count,
                    clip(&s.context_preview, 48)
                );
            }
        }
        SessionCmd::Show { id } => {
            let session = store
                .load(&id)?
                .ok_or_else(|| anyhow!("session '{id}' not found"))?;
            if json_mode {
                return print_json(&session);
            }
            println!("Session ID: {}", session.session_id);
            println!("Mode: {}", session.mode);
            println!("State: {}", session.agent.state);
            println!("Revision: {}", session.revision);
            println!("Updated: {}", session.updated_at.to_rfc3339());
            println!("Report: {}", session.context());
            for (idx, item) in session.agent.history.iter().enumerate() {
                let tool = item
                    .action
                    .as_ref()
                    .map(|a| a.tool.as_str())
                    .unwrap_or("-");
                println!("  step {}: [{tool}] {}", idx + 1, clip(&item.thinking, 80));
            }
            for h in &session.hypotheses {
                println!(
                    "  {} {:<12} {:>4.0}%  {} ({} cycle(s))",
                    h.id,
                    h.status.to_string(),
                    h.confidence * 100.0,
                    h.description,
                    h.react_session_state.cycle_count
                );
            }
            if let Some(answer) = &session.agent.final_answer {
                println!();
                println!("{answer}");
            }
        }
        SessionCmd::Delete { id } => {
            let deleted = store.delete(&id)?;
            if json_mode {
                return print_json(&json!({"session_id": id, "deleted": deleted}));
            }
            if deleted {
                println!("Deleted session {id}.");
            } else {
                println!("Session {id} not found.");
            }
        }
    }
    Ok(())
}
