//! The `exec` executor: replace this process image with a fresh agent.
//!
//! Metamorphosis, not death: the replacement starts a new session at
//! depth 0 with the same mission and the merged wisdom map, and resumes
//! the input stream at the recorded byte offset. On success control
//! never returns here.

use std::collections::BTreeMap;
use std::os::unix::process::CommandExt;

use quine_core::config::{
    ENV_DEPTH, ENV_MISSION, ENV_PARENT_SESSION, ENV_PERSONA, ENV_SESSION_ID, ENV_STDIN_OFFSET,
    ENV_WISDOM_PREFIX,
};
use quine_core::process::stdin_offset;
use quine_tape::TerminationMode;

use super::{ToolOutput, str_arg};
use crate::session::Session;

/// Execute an exec tool call. Returns only on failure.
pub fn run(args: &serde_json::Map<String, serde_json::Value>, session: &Session) -> ToolOutput {
    let config = &session.config;

    let updates = wisdom_updates(args);
    let mut wisdom = config.wisdom.clone();
    wisdom.merge(&updates);

    if let Some(reason) = str_arg(args, "reason") {
        tracing::info!(reason, "exec requested");
    }

    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => return ToolOutput::error(format!("[EXEC ERROR] cannot locate agent binary: {e}")),
    };
    let mission = session.tape().meta().mission.clone();
    let offset = stdin_offset().unwrap_or(config.stdin_offset);

    // The outcome must hit the audit log before the image is replaced;
    // afterwards there is nobody left to write it.
    session.finalize(0, TerminationMode::Exec, None);

    let mut cmd = std::process::Command::new(exe);
    cmd.arg(&mission);
    cmd.env(ENV_DEPTH, "0");
    cmd.env(ENV_PARENT_SESSION, &config.session_id);
    cmd.env_remove(ENV_SESSION_ID);
    cmd.env(ENV_MISSION, &mission);
    cmd.env(ENV_STDIN_OFFSET, offset.to_string());
    match str_arg(args, "persona") {
        Some(persona) => {
            cmd.env(ENV_PERSONA, persona);
        }
        None => {
            cmd.env_remove(ENV_PERSONA);
        }
    }
    for (name, _) in std::env::vars() {
        if name.starts_with(ENV_WISDOM_PREFIX) {
            cmd.env_remove(name);
        }
    }
    for (name, value) in wisdom.to_env() {
        cmd.env(name, value);
    }

    let err = cmd.exec();
    // Still here: the replacement failed. The outcome written above is
    // stale; the session continues and will write its real outcome later.
    tracing::error!(error = %err, "exec failed; continuing session");
    ToolOutput::error(format!("[EXEC ERROR] {err}"))
}

/// Extract the wisdom update map from the call arguments.
///
/// Non-string values are carried as their JSON text; wisdom values are
/// opaque strings by contract.
fn wisdom_updates(
    args: &serde_json::Map<String, serde_json::Value>,
) -> BTreeMap<String, String> {
    let mut updates = BTreeMap::new();
    if let Some(serde_json::Value::Object(map)) = args.get("wisdom") {
        for (key, value) in map {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            updates.insert(key.clone(), text);
        }
    }
    updates
}
