#![deny(missing_docs)]
//! The persistent shell: one long-lived subprocess per agent.
//!
//! Commands execute inside the shell's own address space, so working
//! directory, exported variables, shell functions, and options persist
//! across tool calls. The runtime talks to the shell over a sentinel
//! framed request/reply protocol on its stdio pipes, and passes two
//! extra descriptors through to commands: fd 3 (the deliverable channel,
//! the agent's own stdout) and fd 4 (the material channel, the agent's
//! own stdin).

pub mod capture;
pub mod result;
pub mod script;

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

use quine_core::process::{ActiveProcess, dup_fd, kill_group, signal_shell_children};

use crate::capture::{drain_stderr, drain_stdout};
pub use crate::result::{ParsedResult, ShellOutcome, parse_rendered, render_stream};
use crate::script::{SHELL_PRELUDE, Sentinels, command_script};

/// How long to keep killing a timed-out command's child groups while
/// waiting for sentinels. A block usually finishes the moment its hung
/// child dies; this only expires when the shell itself is wedged (for
/// example a pure-builtin infinite loop, which has no children to kill).
const POST_KILL_GRACE: Duration = Duration::from_secs(5);

/// Interval between kill sweeps during the grace window, covering
/// blocks that start another long-lived child after the first dies.
const KILL_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Static configuration for the persistent shell.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Shell executable.
    pub shell_path: PathBuf,
    /// Per-command timeout.
    pub timeout: Duration,
}

/// Errors from the shell subsystem.
///
/// Protocol-level failures (crashes, timeouts) are not errors; they are
/// [`ShellOutcome`]s the model gets to see. These variants cover the
/// cases where no outcome could be produced at all.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ShellError {
    /// The shell executable could not be spawned.
    #[error("failed to spawn shell: {0}")]
    Spawn(#[source] std::io::Error),

    /// Writing the command script failed even after a respawn.
    #[error("shell i/o failed: {0}")]
    Io(#[source] std::io::Error),

    /// A pipe was missing where the protocol requires one.
    #[error("shell protocol error: {0}")]
    Protocol(&'static str),
}

struct ShellChild {
    process: Child,
    stdin: ChildStdin,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}

impl ShellChild {
    async fn dispose(mut self) {
        if let Some(pid) = self.process.id() {
            kill_group(pid as i32, libc::SIGKILL);
        }
        let _ = self.process.start_kill();
        let _ = self.process.wait().await;
    }
}

/// One agent's persistent shell.
///
/// Spawned lazily on first use; access is serialized by `&mut self`.
pub struct PersistentShell {
    config: ShellConfig,
    active: ActiveProcess,
    child: Option<ShellChild>,
}

impl PersistentShell {
    /// Create a shell that reports its active command's process group on
    /// `active`.
    #[must_use]
    pub fn new(config: ShellConfig, active: ActiveProcess) -> Self {
        Self {
            config,
            active,
            child: None,
        }
    }

    /// Whether a shell subprocess is currently alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    #[allow(unsafe_code)]
    async fn spawn_child(config: &ShellConfig) -> Result<ShellChild, ShellError> {
        let deliverable_fd = dup_fd(1).map_err(ShellError::Spawn)?;
        let material_fd = dup_fd(0).map_err(ShellError::Spawn)?;

        let mut cmd = Command::new(&config.shell_path);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group so shutdown can kill the shell's tree without
        // touching the agent.
        cmd.process_group(0);
        cmd.kill_on_drop(true);

        // SAFETY: the closure runs post-fork pre-exec in the child and
        // only calls async-signal-safe dup2(2). The captured descriptors
        // are plain integers duplicated above fd 10, so neither target
        // can alias its source.
        unsafe {
            cmd.pre_exec(move || {
                if libc::dup2(deliverable_fd, 3) < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                if libc::dup2(material_fd, 4) < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let spawned = cmd.spawn();
        // SAFETY: closing descriptors this function created; the child
        // holds its own copies (or none, if the spawn failed).
        unsafe {
            libc::close(deliverable_fd);
            libc::close(material_fd);
        }
        let mut process = spawned.map_err(ShellError::Spawn)?;

        let mut stdin = process
            .stdin
            .take()
            .ok_or(ShellError::Protocol("stdin pipe missing"))?;
        let stdout = process
            .stdout
            .take()
            .ok_or(ShellError::Protocol("stdout pipe missing"))?;
        let stderr = process
            .stderr
            .take()
            .ok_or(ShellError::Protocol("stderr pipe missing"))?;

        stdin
            .write_all(SHELL_PRELUDE.as_bytes())
            .await
            .map_err(ShellError::Io)?;

        tracing::debug!(pid = process.id(), shell = %config.shell_path.display(), "persistent shell spawned");

        Ok(ShellChild {
            process,
            stdin,
            stdout: Some(stdout),
            stderr: Some(stderr),
        })
    }

    /// Execute one command and capture its framed result.
    ///
    /// A dead shell is respawned transparently; the command that
    /// witnesses the death gets a `state_lost` outcome so the model
    /// learns that exported state is gone.
    pub async fn run(&mut self, command: &str) -> Result<ShellOutcome, ShellError> {
        let sentinels = Sentinels::new();
        let script = command_script(command, &sentinels);

        let mut child = match self.child.take() {
            Some(child) => child,
            None => Self::spawn_child(&self.config).await?,
        };

        // A shell that died since the last command surfaces here as a
        // broken pipe. Respawn once and retry the write.
        if let Err(first) = child.stdin.write_all(script.as_bytes()).await {
            tracing::warn!(error = %first, "shell stdin closed; respawning");
            child.dispose().await;
            child = Self::spawn_child(&self.config).await?;
            child
                .stdin
                .write_all(script.as_bytes())
                .await
                .map_err(ShellError::Io)?;
        }
        child.stdin.flush().await.map_err(ShellError::Io)?;

        let shell_pid = child.process.id().map(|p| p as i32).unwrap_or(0);
        self.active.set_shell(shell_pid);

        let stdout_pipe = child
            .stdout
            .take()
            .ok_or(ShellError::Protocol("stdout pipe in use"))?;
        let stderr_pipe = child
            .stderr
            .take()
            .ok_or(ShellError::Protocol("stderr pipe in use"))?;

        // Drain both streams in parallel; a full pipe on either side
        // would otherwise deadlock the command.
        let drains = async {
            tokio::join!(
                drain_stdout(stdout_pipe, sentinels.clone()),
                drain_stderr(stderr_pipe, sentinels.clone()),
            )
        };
        tokio::pin!(drains);

        let mut timed_out = false;
        let mut outcome = tokio::time::timeout(self.config.timeout, &mut drains)
            .await
            .ok();
        if outcome.is_none() {
            // Timeout: kill the command's child groups, sweeping until
            // the block finishes and the sentinels arrive.
            timed_out = true;
            tracing::warn!(
                shell_pid,
                timeout_secs = self.config.timeout.as_secs(),
                "command timed out; killing its process groups"
            );
            let deadline = tokio::time::Instant::now() + POST_KILL_GRACE;
            while outcome.is_none() && tokio::time::Instant::now() < deadline {
                signal_shell_children(shell_pid, libc::SIGKILL);
                outcome = tokio::time::timeout(KILL_SWEEP_INTERVAL, &mut drains)
                    .await
                    .ok();
            }
        }
        self.active.clear();

        let Some(outcome) = outcome else {
            // The shell itself is wedged. Tear it down; the next
            // command starts fresh.
            child.dispose().await;
            return Ok(ShellOutcome {
                exit_code: 1,
                stdout: Vec::new(),
                stderr: Vec::new(),
                timed_out: true,
                state_lost: true,
            });
        };

        let ((stdout_pipe, out), (stderr_pipe, err)) = outcome;

        if !out.complete || !err.complete {
            // EOF before sentinels: the command killed the shell (bare
            // `exit`, exec, kill). State is gone.
            child.dispose().await;
            return Ok(ShellOutcome {
                exit_code: 1,
                stdout: out.output,
                stderr: err.output,
                timed_out,
                state_lost: true,
            });
        }

        child.stdout = Some(stdout_pipe);
        child.stderr = Some(stderr_pipe);
        self.child = Some(child);

        Ok(ShellOutcome {
            exit_code: out.exit_code.unwrap_or(1),
            stdout: out.output,
            stderr: err.output,
            timed_out,
            state_lost: false,
        })
    }

    /// Shut the shell down: close its stdin, give it `grace` to exit,
    /// then kill its process group.
    pub async fn shutdown(&mut self, grace: Duration) {
        let Some(child) = self.child.take() else {
            return;
        };
        let ShellChild { mut process, stdin, .. } = child;
        drop(stdin);
        if tokio::time::timeout(grace, process.wait()).await.is_err() {
            if let Some(pid) = process.id() {
                kill_group(pid as i32, libc::SIGKILL);
            }
            let _ = process.wait().await;
        }
    }
}
