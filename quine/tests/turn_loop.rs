//! End-to-end turn-loop scenarios with a scripted provider.
//!
//! The provider is mocked; the shell, tape, audit log, and semaphore
//! are all real. Each test reads the audit file afterwards and checks
//! the session-level contract: pairing, ordering, outcome, exit code.

#![cfg(unix)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

use serde_json::json;

use quine::orchestrator::Runtime;
use quine::prompt::StdinMode;
use quine::session::Session;
use quine::signal::SignalFlags;
use quine_core::{ApiFlavor, Config, Wisdom};
use quine_tape::{Message, Role, TapeEntry, TerminationMode, ToolCall};
use quine_turn::types::{Completion, ProviderRequest, TokenUsage};
use quine_turn::{Provider, ProviderError};

fn bash_available() -> bool {
    std::path::Path::new("/bin/bash").exists()
}

fn config(dir: &std::path::Path, session_id: &str, max_turns: u32) -> Config {
    Config {
        model: "scripted".into(),
        flavor: ApiFlavor::Anthropic,
        api_base: None,
        api_key: "k".into(),
        depth: 0,
        max_depth: 8,
        session_id: session_id.into(),
        parent_session: None,
        max_concurrent: 4,
        shell_timeout: std::time::Duration::from_secs(30),
        truncate_bytes: 8192,
        data_dir: dir.to_path_buf(),
        shell_path: "/bin/bash".into(),
        max_turns,
        context_window: 200_000,
        mission: None,
        stdin_offset: 0,
        persona: None,
        wisdom: Wisdom::new(),
    }
}

struct MockProvider {
    responses: Mutex<VecDeque<Completion>>,
}

impl MockProvider {
    fn scripted(responses: Vec<Completion>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

impl Provider for MockProvider {
    fn generate(
        &self,
        _request: ProviderRequest,
    ) -> impl Future<Output = Result<Completion, ProviderError>> + Send {
        let next = self.responses.lock().unwrap().pop_front();
        async move {
            // Exhausting the script is a test bug; authentication errors
            // are not retried, so the session fails fast and visibly.
            next.ok_or_else(|| ProviderError::Authentication("mock script exhausted".into()))
        }
    }
}

fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall {
        id: id.into(),
        name: name.into(),
        args: args.as_object().cloned().unwrap_or_default(),
    }
}

fn respond(calls: Vec<ToolCall>) -> Completion {
    Completion {
        message: Message::assistant("", calls),
        usage: TokenUsage {
            input_tokens: 12_000,
            output_tokens: 50,
        },
    }
}

async fn run_scripted(
    cfg: Config,
    mission: &str,
    responses: Vec<Completion>,
    panic_before_start: bool,
) -> (i32, Arc<Session>) {
    let session = Session::start(cfg, mission.into());
    let flags = Arc::new(SignalFlags::new());
    if panic_before_start {
        flags.set_panic();
    }
    let runtime = Runtime::new(MockProvider::scripted(responses), session.clone(), flags);
    let code = runtime.run(StdinMode::Terminal).await;
    (code, session)
}

fn audit_entries(session: &Session) -> Vec<TapeEntry> {
    let text = std::fs::read_to_string(session.config.audit_path()).unwrap();
    text.lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn simple_success_session() {
    if !bash_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let (code, session) = run_scripted(
        config(dir.path(), "s1", 0),
        "echo things",
        vec![
            respond(vec![call("tc_a", "sh", json!({"command": "echo hello"}))]),
            respond(vec![call("tc_b", "sh", json!({"command": "cat /tmp/quine-no-such-file"}))]),
            respond(vec![call("tc_c", "exit", json!({"status": "success"}))]),
        ],
        false,
    )
    .await;

    assert_eq!(code, 0);

    let messages = session.tape().messages();
    let result_a = messages
        .iter()
        .find(|m| m.tool_call_id.as_deref() == Some("tc_a"))
        .unwrap();
    assert!(result_a.content.contains("[EXIT CODE] 0"));
    assert!(result_a.content.contains("hello"));
    assert!(!result_a.is_error);

    let result_b = messages
        .iter()
        .find(|m| m.tool_call_id.as_deref() == Some("tc_b"))
        .unwrap();
    assert!(result_b.content.contains("[EXIT CODE] 1"));
    assert!(result_b.is_error);

    let entries = audit_entries(&session);
    assert!(matches!(entries.first(), Some(TapeEntry::Meta { .. })));
    let meta_count = entries
        .iter()
        .filter(|e| matches!(e, TapeEntry::Meta { .. }))
        .count();
    assert_eq!(meta_count, 1);
    match entries.last() {
        Some(TapeEntry::Outcome { outcome }) => {
            assert_eq!(outcome.exit_code, 0);
            assert_eq!(outcome.mode, TerminationMode::Exit);
            assert_eq!(outcome.turns, 2);
        }
        other => panic!("expected outcome entry last, got {other:?}"),
    }
}

#[tokio::test]
async fn tool_call_ids_pair_with_results_in_order() {
    if !bash_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let (_, session) = run_scripted(
        config(dir.path(), "pairing", 0),
        "pair things",
        vec![
            respond(vec![
                call("tc_1", "sh", json!({"command": "true"})),
                call("tc_2", "sh", json!({"command": "true"})),
            ]),
            respond(vec![call("tc_3", "exit", json!({"status": "success"}))]),
        ],
        false,
    )
    .await;

    // Each assistant message with calls is followed by matching results,
    // in emission order, before the next assistant message.
    let messages = session.tape().messages();
    let mut found_multi = false;
    for (i, message) in messages.iter().enumerate() {
        if message.role == Role::Assistant && !message.tool_calls.is_empty() {
            found_multi |= message.tool_calls.len() > 1;
            for (offset, tool_call) in message.tool_calls.iter().enumerate() {
                let result = &messages[i + 1 + offset];
                assert_eq!(result.role, Role::Tool);
                assert_eq!(result.tool_call_id.as_deref(), Some(tool_call.id.as_str()));
            }
        }
    }
    assert!(found_multi, "scenario must exercise a multi-call message");
}

#[tokio::test]
async fn near_death_honors_a_clean_exit() {
    if !bash_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let (code, session) = run_scripted(
        config(dir.path(), "s2", 2),
        "finish in two",
        vec![
            respond(vec![call("tc_1", "sh", json!({"command": "true"}))]),
            respond(vec![call("tc_2", "sh", json!({"command": "true"}))]),
            respond(vec![call("tc_3", "exit", json!({"status": "success"}))]),
        ],
        false,
    )
    .await;

    assert_eq!(code, 0);
    let outcome = session.outcome().unwrap();
    assert_eq!(outcome.mode, TerminationMode::Exit);

    // The second shell result carries the near-death warning.
    let messages = session.tape().messages();
    let warned = messages
        .iter()
        .find(|m| m.tool_call_id.as_deref() == Some("tc_2"))
        .unwrap();
    assert!(warned.content.contains("[RESOURCE EXHAUSTION IMMINENT]"));
}

#[tokio::test]
async fn near_death_without_rescue_exhausts_turns() {
    if !bash_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let (code, session) = run_scripted(
        config(dir.path(), "s3", 2),
        "never stop",
        vec![
            respond(vec![call("tc_1", "sh", json!({"command": "true"}))]),
            respond(vec![call("tc_2", "sh", json!({"command": "true"}))]),
            respond(vec![call("tc_3", "sh", json!({"command": "echo more"}))]),
        ],
        false,
    )
    .await;

    assert_eq!(code, 1);
    let outcome = session.outcome().unwrap();
    assert_eq!(outcome.mode, TerminationMode::TurnExhaustion);
    assert_eq!(outcome.turns, 2);
    assert_eq!(
        outcome.failure_signal.as_deref(),
        Some("turn limit exhausted (2/2)")
    );

    // The third shell call was rejected, not executed.
    let messages = session.tape().messages();
    let rejected = messages
        .iter()
        .find(|m| m.tool_call_id.as_deref() == Some("tc_3"))
        .unwrap();
    assert!(rejected.is_error);
    assert!(rejected.content.contains("exec or exit"));
}

#[tokio::test]
async fn invalid_exit_is_rejected_then_retried() {
    if !bash_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let (code, session) = run_scripted(
        config(dir.path(), "s4", 0),
        "fail honestly",
        vec![
            respond(vec![call(
                "tc_1",
                "exit",
                json!({"status": "success", "stderr": "something"}),
            )]),
            respond(vec![call(
                "tc_2",
                "exit",
                json!({"status": "failure", "stderr": "something"}),
            )]),
        ],
        false,
    )
    .await;

    assert_eq!(code, 1);
    let messages = session.tape().messages();
    let rejection = messages
        .iter()
        .find(|m| m.tool_call_id.as_deref() == Some("tc_1"))
        .unwrap();
    assert!(rejection.is_error);
    assert!(rejection.content.starts_with("Exit rejected"));

    let outcome = session.outcome().unwrap();
    assert_eq!(outcome.exit_code, 1);
    assert_eq!(outcome.failure_signal.as_deref(), Some("something"));
}

#[tokio::test]
async fn panic_mode_rejects_everything_but_exit() {
    if !bash_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let (code, session) = run_scripted(
        config(dir.path(), "s5", 0),
        "too slow",
        vec![
            respond(vec![call("tc_1", "sh", json!({"command": "echo ignored"}))]),
            respond(vec![call(
                "tc_2",
                "exit",
                json!({"status": "failure", "stderr": "interrupted"}),
            )]),
        ],
        true,
    )
    .await;

    assert_eq!(code, 1);
    let messages = session.tape().messages();

    // The interrupt user message precedes the first inference.
    let interrupt = messages
        .iter()
        .find(|m| m.role == Role::User && m.content.contains("System interrupt"))
        .expect("interrupt message must be on the tape");
    assert!(interrupt.content.contains("call exit immediately"));

    // The shell call was rejected and did not consume a turn.
    let rejected = messages
        .iter()
        .find(|m| m.tool_call_id.as_deref() == Some("tc_1"))
        .unwrap();
    assert!(rejected.is_error);
    assert!(rejected.content.contains("only exit"));
    assert_eq!(session.tape().turns(), 0);
}

#[tokio::test]
async fn budget_hints_annotate_shell_results() {
    if !bash_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let (_, session) = run_scripted(
        config(dir.path(), "hints", 5),
        "annotated",
        vec![
            respond(vec![call("tc_1", "sh", json!({"command": "true"}))]),
            respond(vec![call("tc_2", "exit", json!({"status": "success"}))]),
        ],
        false,
    )
    .await;

    let messages = session.tape().messages();
    let result = messages
        .iter()
        .find(|m| m.tool_call_id.as_deref() == Some("tc_1"))
        .unwrap();
    assert!(result.content.contains("[TURNS LEFT] 4"));
    assert!(result.content.contains("[CONTEXT USED] 12K"));
}

#[tokio::test]
async fn fatal_provider_error_finalizes_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let (code, session) = run_scripted(
        config(dir.path(), "fatal", 0),
        "doomed",
        vec![], // first inference hits the auth error immediately
        false,
    )
    .await;

    assert_eq!(code, 1);
    let outcome = session.outcome().unwrap();
    assert_eq!(outcome.exit_code, 1);
    let entries = audit_entries(&session);
    assert!(matches!(entries.last(), Some(TapeEntry::Outcome { .. })));
}

#[tokio::test]
async fn unknown_tool_becomes_an_error_result() {
    if !bash_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let (code, session) = run_scripted(
        config(dir.path(), "unknown", 0),
        "try weird tools",
        vec![
            respond(vec![call("tc_1", "teleport", json!({}))]),
            respond(vec![call("tc_2", "exit", json!({"status": "success"}))]),
        ],
        false,
    )
    .await;

    assert_eq!(code, 0);
    let messages = session.tape().messages();
    let result = messages
        .iter()
        .find(|m| m.tool_call_id.as_deref() == Some("tc_1"))
        .unwrap();
    assert!(result.is_error);
    assert!(result.content.contains("Unknown tool"));
}
