use rootcause_core::{
    AgentState, CompletionReason, EvaluationResult, HistoryItem, Hypothesis, HypothesisStatus,
    InvestigationMode, Session, ToolAction,
};
use rootcause_store::{MemorySessionStore, SessionStore, SqliteSessionStore, StoreError};
use serde_json::json;

fn hypothesis_session() -> Session {
    let context = "checkout p99 latency jumped from 200ms to 2.3s at 14:05";
    let mut session = Session::new("inv-42", context, InvestigationMode::HypothesisTree);

    let mut pool = Hypothesis::new(
        "h1",
        "database connection pool exhausted",
        0.72,
        "errors mention pool timeouts",
        context,
    );
    let params = json!({"service": "checkout", "window_minutes": 30})
        .as_object()
        .cloned()
        .expect("object");
    pool.react_session_state.append_history(HistoryItem::new(
        "check pool saturation",
        Some(ToolAction::new("metrics_tool", params)),
        Some("active_connections=100/100".to_string()),
    ));
    pool.react_session_state.complete(
        "pool saturated during the spike",
        CompletionReason::FinalAnswer,
    );
    pool.apply_evaluation(EvaluationResult {
        hypothesis_id: "h1".to_string(),
        status: HypothesisStatus::Confirmed,
        confidence: 0.9,
        reasoning: "saturation matches the spike window".to_string(),
    });

    let mut deploy = Hypothesis::new("h2", "bad deploy at 14:00", 0.41, "", context);
    deploy.react_session_state.state = AgentState::Observing;
    deploy.react_session_state.last_observation = Some("no deploys since 09:00".to_string());

    session.hypotheses = vec![pool, deploy];
    session.current_hypothesis_index = 1;
    session.touch();
    session
}

fn stores() -> (tempfile::TempDir, Vec<Box<dyn SessionStore>>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let sqlite = SqliteSessionStore::open(&dir.path().join("sessions.sqlite")).expect("sqlite");
    (
        dir,
        vec![Box::new(sqlite), Box::new(MemorySessionStore::new())],
    )
}

#[test]
fn save_then_load_preserves_every_field() {
    let (_dir, stores) = stores();
    let session = hypothesis_session();
    for store in &stores {
        store.save(&session).expect("save");
        let loaded = store.load("inv-42").expect("load").expect("present");
        assert_eq!(loaded, session);
        assert_eq!(
            loaded.hypotheses[0].react_session_state.history[0]
                .action
                .as_ref()
                .map(|a| a.tool.as_str()),
            Some("metrics_tool")
        );
    }
}

#[test]
fn missing_session_loads_as_none() {
    let (_dir, stores) = stores();
    for store in &stores {
        assert!(store.load("nope").expect("load").is_none());
        assert!(!store.delete("nope").expect("delete"));
    }
}

#[test]
fn stale_writer_is_rejected() {
    let (_dir, stores) = stores();
    for store in &stores {
        let base = hypothesis_session();
        store.save(&base).expect("initial save");

        let mut first = base.clone();
        first.current_hypothesis_index = 0;
        first.touch();
        store.save(&first).expect("first writer");

        let mut second = base.clone();
        second.agent.last_thinking = Some("racing".to_string());
        second.touch();
        let err = store.save(&second).expect_err("second writer loses");
        assert!(matches!(err, StoreError::Conflict { .. }), "{err}");

        // Re-saving the winning checkpoint is a no-op.
        store.save(&first).expect("idempotent");
        let loaded = store.load("inv-42").expect("load").expect("present");
        assert_eq!(loaded, first);
    }
}

#[test]
fn list_orders_by_recency_and_reports_completion() {
    let (_dir, stores) = stores();
    for store in &stores {
        let mut older = Session::new("older", "disk full", InvestigationMode::React);
        older.touch();
        store.save(&older).expect("save older");

        std::thread::sleep(std::time::Duration::from_millis(5));
        let newer = hypothesis_session();
        store.save(&newer).expect("save newer");
        store.mark_complete("older").expect("mark");

        let listed = store.list().expect("list");
        let ids: Vec<_> = listed.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids, vec!["inv-42", "older"]);
        assert_eq!(listed[0].hypotheses, 2);
        assert!(listed[0].completed_at.is_none());
        assert!(listed[1].completed_at.is_some());
        assert_eq!(listed[1].context_preview, "disk full");

        assert!(store.delete("older").expect("delete"));
        assert_eq!(store.list().expect("list").len(), 1);
    }
}

#[test]
fn sqlite_checkpoints_survive_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sessions.sqlite");
    let session = hypothesis_session();
    SqliteSessionStore::open(&path)
        .expect("open")
        .save(&session)
        .expect("save");

    let reopened = SqliteSessionStore::open(&path).expect("reopen");
    assert_eq!(reopened.load("inv-42").expect("load"), Some(session));
}
