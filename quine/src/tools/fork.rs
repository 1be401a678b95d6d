//! The `fork` executor: spawn another instance of this binary.

use std::process::Stdio;

use quine_core::Config;
use quine_core::config::{
    ENV_DEPTH, ENV_MISSION, ENV_PARENT_SESSION, ENV_PERSONA, ENV_SESSION_ID, ENV_STDIN_OFFSET,
};
use quine_core::process::ActiveProcess;
use quine_shell::render_stream;

use super::{ToolOutput, bool_arg, str_arg};

/// Execute a fork tool call.
///
/// The child inherits this agent's environment (credentials, data dir,
/// limits, wisdom) with depth bumped and the parent session recorded.
/// The session id is deliberately dropped so the child mints its own;
/// two forks from one shell turn must not collide on an audit path.
pub async fn run(
    args: &serde_json::Map<String, serde_json::Value>,
    config: &Config,
    active: &ActiveProcess,
    truncate_bytes: usize,
) -> ToolOutput {
    let intent = match str_arg(args, "intent") {
        Some(i) if !i.trim().is_empty() => i.to_string(),
        _ => return ToolOutput::error("[FORK ERROR] intent must be a non-empty string"),
    };
    let wait = bool_arg(args, "wait").unwrap_or(false);

    let child_depth = config.depth + 1;
    if child_depth >= config.max_depth {
        return ToolOutput::error(format!(
            "[FORK ERROR] recursion depth limit reached ({child_depth}/{})",
            config.max_depth
        ));
    }

    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => return ToolOutput::error(format!("[FORK ERROR] cannot locate agent binary: {e}")),
    };

    let mut cmd = tokio::process::Command::new(exe);
    cmd.arg(&intent);
    cmd.env(ENV_DEPTH, child_depth.to_string());
    cmd.env(ENV_PARENT_SESSION, &config.session_id);
    cmd.env_remove(ENV_SESSION_ID);
    cmd.env_remove(ENV_MISSION);
    cmd.env_remove(ENV_STDIN_OFFSET);
    cmd.env_remove(ENV_PERSONA);
    // The child shares the agent's stdin; its stdout must not leak into
    // this agent's deliverable channel.
    cmd.stdin(Stdio::inherit());
    if wait {
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
    } else {
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
    }
    // Own process group: killable as a tree, orphanable on no-wait.
    cmd.process_group(0);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return ToolOutput::error(format!("[FORK ERROR] spawn failed: {e}")),
    };
    let pid = child.id().unwrap_or(0);

    if !wait {
        tracing::info!(pid, intent = %intent, "forked detached child");
        return ToolOutput::ok(format!("[FORK spawned] pid={pid}"));
    }

    tracing::info!(pid, intent = %intent, "forked child, waiting");
    active.set_group(pid as i32);
    let output = child.wait_with_output().await;
    active.clear();

    match output {
        Ok(out) => {
            let code = out.status.code().unwrap_or(-1);
            let status_word = if out.status.success() { "done" } else { "failed" };
            ToolOutput {
                content: format!(
                    "[FORK {status_word}] exit={code}\n[STDOUT]\n{}\n[STDERR]\n{}",
                    render_stream(&out.stdout, truncate_bytes),
                    render_stream(&out.stderr, truncate_bytes),
                ),
                is_error: !out.status.success(),
            }
        }
        Err(e) => ToolOutput::error(format!("[FORK ERROR] wait failed: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(depth: u32, max_depth: u32) -> Config {
        Config {
            model: "m".into(),
            flavor: quine_core::ApiFlavor::Anthropic,
            api_base: None,
            api_key: "k".into(),
            depth,
            max_depth,
            session_id: "parent".into(),
            parent_session: None,
            max_concurrent: 4,
            shell_timeout: std::time::Duration::from_secs(30),
            truncate_bytes: 1024,
            data_dir: "/tmp".into(),
            shell_path: "/bin/bash".into(),
            max_turns: 0,
            context_window: 200_000,
            mission: None,
            stdin_offset: 0,
            persona: None,
            wisdom: quine_core::Wisdom::new(),
        }
    }

    #[tokio::test]
    async fn empty_intent_is_rejected() {
        let args = json!({"intent": "  "}).as_object().unwrap().clone();
        let out = run(&args, &config(0, 8), &ActiveProcess::new(), 1024).await;
        assert!(out.is_error);
        assert!(out.content.starts_with("[FORK ERROR]"));
    }

    #[tokio::test]
    async fn missing_intent_is_rejected() {
        let args = json!({"wait": true}).as_object().unwrap().clone();
        let out = run(&args, &config(0, 8), &ActiveProcess::new(), 1024).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn depth_limit_is_enforced() {
        let args = json!({"intent": "go deeper"}).as_object().unwrap().clone();
        let out = run(&args, &config(7, 8), &ActiveProcess::new(), 1024).await;
        assert!(out.is_error);
        assert!(out.content.contains("recursion depth limit"));
        // No child is created on rejection; nothing to reap.
    }
}
