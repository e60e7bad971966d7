use crate::context::{EngineOverrides, build_engine, load_config};
use crate::output::print_json;
use crate::{InvestigateArgs, ResumeArgs};
use anyhow::{Result, anyhow};
use rootcause_agent::{
    AgentError, InvestigationEngine, InvestigationRequest, InvocationOutcome, LocalTrampoline,
    RecordingScheduler,
};
use serde_json::json;
use std::io::{IsTerminal, Read};
use std::path::Path;
use uuid::Uuid;

pub(crate) fn run_investigate(
    cwd: &Path,
    args: InvestigateArgs,
    json_mode: bool,
    verbose: bool,
) -> Result<()> {
    let (engine, request) = prepare(cwd, &args, verbose)?;
    let report = LocalTrampoline::new()
        .drive(&engine, request.clone())
        .map_err(|err| report_failure(err, &request, json_mode))?;
    if json_mode {
        return print_json(&json!({
            "outcome": report.outcome,
            "invocations": report.invocations,
        }));
    }
    print_outcome(&report.outcome, report.invocations);
    Ok(())
}

pub(crate) fn run_step(
    cwd: &Path,
    args: InvestigateArgs,
    json_mode: bool,
    verbose: bool,
) -> Result<()> {
    let (engine, request) = prepare(cwd, &args, verbose)?;
    let scheduler = RecordingScheduler::default();
    let outcome = engine
        .run_invocation(&request, &scheduler)
        .map_err(|err| report_failure(err, &request, json_mode))?;
    let continuation = scheduler.requests().into_iter().next();
    if json_mode {
        return print_json(&json!({
            "outcome": outcome,
            "continuation": continuation,
        }));
    }
    match continuation {
        Some(next) => {
            println!(
                "Session {} saved; run `rootcause step --session-id {}` to continue.",
                outcome.session_id(),
                next.session_id
            );
            println!("{}", serde_json::to_string(&next)?);
        }
        None => print_outcome(&outcome, 1),
    }
    Ok(())
}

pub(crate) fn run_resume(cwd: &Path, args: ResumeArgs, json_mode: bool, verbose: bool) -> Result<()> {
    let mut cfg = load_config(cwd)?;
    EngineOverrides {
        max_cycles: args.max_cycles,
        max_hypotheses: args.max_hypotheses,
    }
    .apply(&mut cfg);
    let engine = build_engine(cwd, &cfg, verbose)?;
    let session = engine
        .store()
        .load(&args.session_id)?
        .ok_or_else(|| anyhow!("session '{}' not found", args.session_id))?;
    let request = InvestigationRequest {
        session_id: session.session_id.clone(),
        context: session.context().to_string(),
        mode: session.mode,
    };
    let report = LocalTrampoline::new()
        .drive(&engine, request.clone())
        .map_err(|err| report_failure(err, &request, json_mode))?;
    if json_mode {
        return print_json(&json!({
            "outcome": report.outcome,
            "invocations": report.invocations,
        }));
    }
    print_outcome(&report.outcome, report.invocations);
    Ok(())
}

fn prepare(
    cwd: &Path,
    args: &InvestigateArgs,
    verbose: bool,
) -> Result<(InvestigationEngine, InvestigationRequest)> {
    let mut cfg = load_config(cwd)?;
    EngineOverrides {
        max_cycles: args.max_cycles,
        max_hypotheses: args.max_hypotheses,
    }
    .apply(&mut cfg);
    let mode = args.mode.unwrap_or(cfg.engine.mode);
    let engine = build_engine(cwd, &cfg, verbose)?;
    let session_id = args
        .session_id
        .clone()
        .unwrap_or_else(|| Uuid::now_v7().to_string());

    if args.fresh && engine.store().delete(&session_id)? {
        engine
            .observer()
            .verbose_log(&format!("discarded stored checkpoint for {session_id}"));
    }

    let stored = if args.fresh {
        None
    } else {
        engine.store().load(&session_id)?
    };
    let context = match stored {
        Some(session) if args.context.is_empty() => session.context().to_string(),
        _ => read_context(&args.context)?,
    };

    Ok((
        engine,
        InvestigationRequest {
            session_id,
            context,
            mode,
        },
    ))
}

fn read_context(words: &[String]) -> Result<String> {
    let joined = words.join(" ");
    if !joined.trim().is_empty() && joined.trim() != "-" {
        return Ok(joined.trim().to_string());
    }
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Err(anyhow!(
            "no failure report given; pass it as arguments or pipe it on stdin"
        ));
    }
    let mut buffer = String::new();
    stdin.read_to_string(&mut buffer)?;
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("failure report on stdin is empty"));
    }
    Ok(trimmed.to_string())
}

fn print_outcome(outcome: &InvocationOutcome, invocations: u64) {
    match outcome {
        InvocationOutcome::Completed {
            session_id,
            final_answer,
            forced_completion,
            ..
        } => {
            println!("Session {session_id} completed after {invocations} invocation(s).");
            if *forced_completion {
                println!("(stopped at the cycle limit; answer is based on partial evidence)");
            }
            println!();
            println!("{final_answer}");
        }
        InvocationOutcome::Continued {
            session_id,
            revision,
        } => {
            println!("Session {session_id} saved at revision {revision}.");
        }
    }
}

fn report_failure(err: AgentError, request: &InvestigationRequest, json_mode: bool) -> anyhow::Error {
    let fallback = err.fallback_message().map(str::to_string);
    if json_mode {
        let _ = print_json(&json!({
            "status": "failed",
            "session_id": request.session_id,
            "error": err.to_string(),
            "fallback": fallback,
        }));
    } else {
        if let Some(message) = &fallback {
            eprintln!("{message}");
        }
        eprintln!(
            "To start this investigation over, rerun with `--fresh --session-id {}`.",
            request.session_id
        );
    }
    anyhow::Error::new(err).context(format!("investigation {} failed", request.session_id))
}
