//! The `sh` executor: one command through the persistent shell.

use quine_shell::PersistentShell;

use super::{ToolOutput, str_arg};

/// Execute a shell tool call.
pub async fn run(
    args: &serde_json::Map<String, serde_json::Value>,
    shell: &mut PersistentShell,
    truncate_bytes: usize,
) -> ToolOutput {
    let Some(command) = str_arg(args, "command") else {
        return ToolOutput::error("sh: missing required argument: command");
    };
    match shell.run(command).await {
        Ok(outcome) => ToolOutput {
            content: outcome.render(truncate_bytes),
            is_error: outcome.is_error(),
        },
        Err(e) => ToolOutput::error(format!(
            "[EXIT CODE] 1\n[STDOUT]\n\n[STDERR]\nSHELL ERROR: {e}"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quine_core::process::ActiveProcess;
    use quine_shell::ShellConfig;
    use serde_json::json;
    use std::time::Duration;

    fn shell() -> PersistentShell {
        PersistentShell::new(
            ShellConfig {
                shell_path: "/bin/bash".into(),
                timeout: Duration::from_secs(30),
            },
            ActiveProcess::new(),
        )
    }

    #[tokio::test]
    async fn missing_command_is_an_error_result() {
        let mut sh = shell();
        let args = json!({"cmd": "oops"}).as_object().unwrap().clone();
        let out = run(&args, &mut sh, 1024).await;
        assert!(out.is_error);
        assert!(out.content.contains("missing required argument"));
    }

    #[tokio::test]
    async fn command_renders_fixed_format() {
        if !std::path::Path::new("/bin/bash").exists() {
            return;
        }
        let mut sh = shell();
        let args = json!({"command": "echo tool"}).as_object().unwrap().clone();
        let out = run(&args, &mut sh, 1024).await;
        assert!(!out.is_error);
        assert!(out.content.starts_with("[EXIT CODE] 0\n[STDOUT]\ntool\n"));
    }
}
