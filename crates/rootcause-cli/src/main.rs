use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use rootcause_core::InvestigationMode;

mod commands;
mod context;
mod output;

use commands::admin::{run_config, run_tools};
use commands::investigate::{run_investigate, run_resume, run_step};
use commands::session::{SessionCmd, run_session_cmd};

#[derive(Parser)]
#[command(name = "rootcause")]
#[command(about = "Resumable root-cause investigations for operational failures", long_about = None)]
struct Cli {
    /// Emit machine-readable JSON on stdout.
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging to stderr.
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Investigate a failure report until a root cause is found.
    Investigate(InvestigateArgs),
    /// Run exactly one invocation and print the continuation payload.
    Step(InvestigateArgs),
    /// Continue a stored session to completion.
    Resume(ResumeArgs),
    /// Inspect or delete stored sessions.
    Session {
        #[command(subcommand)]
        command: SessionCmd,
    },
    /// List the diagnostic tools available to the engine.
    Tools,
    /// Print the effective configuration.
    Config,
}

#[derive(Args, Clone)]
pub(crate) struct InvestigateArgs {
    /// Failure report. Reads stdin when omitted or `-`.
    #[arg(trailing_var_arg = true)]
    pub context: Vec<String>,
    /// Session to create or continue. A new id is generated when omitted.
    #[arg(long = "session-id")]
    pub session_id: Option<String>,
    /// Investigation mode: react or hypotheses.
    #[arg(long, value_parser = parse_mode)]
    pub mode: Option<InvestigationMode>,
    /// Override engine.max_cycles.
    #[arg(long = "max-cycles")]
    pub max_cycles: Option<u32>,
    /// Override engine.max_hypotheses.
    #[arg(long = "max-hypotheses")]
    pub max_hypotheses: Option<u32>,
    /// Discard any stored checkpoint for this session first.
    #[arg(long)]
    pub fresh: bool,
}

#[derive(Args, Clone)]
pub(crate) struct ResumeArgs {
    pub session_id: String,
    #[arg(long = "max-cycles")]
    pub max_cycles: Option<u32>,
    #[arg(long = "max-hypotheses")]
    pub max_hypotheses: Option<u32>,
}

fn parse_mode(raw: &str) -> std::result::Result<InvestigationMode, String> {
    raw.parse()
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Investigate(args) => run_investigate(&cwd, args, cli.json, cli.verbose),
        Commands::Step(args) => run_step(&cwd, args, cli.json, cli.verbose),
        Commands::Resume(args) => run_resume(&cwd, args, cli.json, cli.verbose),
        Commands::Session { command } => run_session_cmd(&cwd, command, cli.json),
        Commands::Tools => run_tools(&cwd, cli.json),
        Commands::Config => run_config(&cwd, cli.json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn investigate_accepts_mode_aliases() {
        let cli = Cli::try_parse_from([
            "rootcause",
            "--json",
            "investigate",
            "--mode",
            "hypotheses",
            "--max-cycles",
            "4",
            "checkout",
            "latency",
            "spike",
        ])
        .expect("parse");
        let Commands::Investigate(args) = cli.command else {
            panic!("expected investigate");
        };
        assert!(cli.json);
        assert_eq!(args.mode, Some(InvestigationMode::HypothesisTree));
        assert_eq!(args.max_cycles, Some(4));
        assert_eq!(args.context.join(" "), "checkout latency spike");
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(
            Cli::try_parse_from(["rootcause", "investigate", "--mode", "guess", "x"]).is_err()
        );
    }
}
