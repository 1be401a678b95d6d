//! The turn loop: one inference, one round of tool dispatch, repeat.
//!
//! Termination is the interesting part. The loop ends only through an
//! accepted `exit` call, a fatal provider error, the near-death
//! protocol (turn budget spent, no exec rescue), or a signal handled by
//! the controller task. Everything else, however wrong, becomes a
//! tool-result the model gets to read.

use std::sync::Arc;
use std::time::Duration;

use quine_shell::{PersistentShell, ShellConfig};
use quine_tape::{Message, TerminationMode, ToolCall};
use quine_turn::types::{Completion, ProviderRequest};
use quine_turn::{Provider, ProviderError, generate_with_retry};

use crate::prompt::{StdinMode, initial_user_message, system_prompt};
use crate::semaphore::Semaphore;
use crate::session::Session;
use crate::signal::SignalFlags;
use crate::tools;
use crate::tools::exit::ExitDecision;

/// Output token ceiling per inference.
const MAX_OUTPUT_TOKENS: u32 = 8192;

/// Grace given to the persistent shell on session teardown.
const SHELL_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// User message injected once when panic mode engages.
const PANIC_INTERRUPT: &str =
    "System interrupt: time limit reached; call exit immediately.";

/// Rejection text for non-exit calls under panic mode.
const PANIC_REJECTION: &str =
    "Rejected: panic mode is engaged; only exit is accepted. Call exit now.";

/// Appended to the last tool-result when the turn budget runs out.
const NEAR_DEATH_WARNING: &str = "\n[RESOURCE EXHAUSTION IMMINENT] Process will be \
     terminated after this response. To survive, call exec now with wisdom to \
     preserve your state.";

/// Rejection text for non-exec, non-exit calls during the final inference.
const BUDGET_REJECTION: &str =
    "Rejected: the turn budget is exhausted; only exec or exit is accepted now.";

/// The orchestrator: owns the provider, the shell, and the semaphore
/// for one session.
pub struct Runtime<P: Provider> {
    provider: P,
    session: Arc<Session>,
    flags: Arc<SignalFlags>,
    shell: PersistentShell,
    semaphore: Semaphore,
    last_input_tokens: u64,
}

impl<P: Provider> Runtime<P> {
    /// Assemble a runtime over a started session.
    #[must_use]
    pub fn new(provider: P, session: Arc<Session>, flags: Arc<SignalFlags>) -> Self {
        let config = &session.config;
        let shell = PersistentShell::new(
            ShellConfig {
                shell_path: config.shell_path.clone(),
                timeout: config.shell_timeout,
            },
            flags.active.clone(),
        );
        let semaphore = Semaphore::new(
            config.lock_dir(),
            config.max_concurrent,
            config.session_id.clone(),
        );
        Self {
            provider,
            session,
            flags,
            shell,
            semaphore,
            last_input_tokens: 0,
        }
    }

    /// Drive the session to completion and return the process exit code.
    pub async fn run(mut self, stdin_mode: StdinMode) -> i32 {
        let mission = self.session.tape().meta().mission.clone();
        self.session
            .append(Message::system(system_prompt(&self.session.config, &mission)));
        self.session
            .append(Message::user(initial_user_message(&stdin_mode)));

        let mut panic_announced = false;
        loop {
            if self.flags.panic() && !panic_announced {
                self.session.append(Message::user(PANIC_INTERRUPT));
                panic_announced = true;
            }

            let completion = match self.infer().await {
                Ok(completion) => completion,
                Err(code) => return code,
            };
            let calls = self.accept(completion);

            if calls.is_empty() {
                // Text-only response: the model is thinking out loud.
                continue;
            }

            let mut budget_spent = false;
            for call in &calls {
                if let Some(code) = self.dispatch(call, &mut budget_spent).await {
                    return code;
                }
            }
            self.annotate();

            if budget_spent {
                return self.near_death().await;
            }
        }
    }

    /// Append the assistant message, accumulate usage, and pull out the
    /// tool calls.
    fn accept(&mut self, completion: Completion) -> Vec<ToolCall> {
        self.last_input_tokens = completion.usage.input_tokens;
        {
            let mut tape = self.session.tape();
            tape.add_usage(completion.usage.input_tokens, completion.usage.output_tokens);
        }
        let calls = completion.message.tool_calls.clone();
        if calls.is_empty() && !completion.message.content.is_empty() {
            tracing::info!(text = %completion.message.content, "assistant commentary");
        }
        self.session.append(completion.message);
        calls
    }

    /// One inference under a concurrency slot. A fatal error resolves
    /// the whole session and yields its exit code.
    async fn infer(&mut self) -> Result<Completion, i32> {
        let slot = match self.semaphore.acquire().await {
            Ok(slot) => Some(slot),
            Err(e) => {
                // Degraded mode: the tree loses its limit, not the session.
                tracing::warn!(error = %e, "concurrency semaphore unavailable; proceeding unlimited");
                None
            }
        };
        let request = ProviderRequest {
            model: self.session.config.model.clone(),
            messages: self.session.tape().messages(),
            tools: tools::tool_schemas(),
            max_tokens: MAX_OUTPUT_TOKENS,
        };
        let result = generate_with_retry(&self.provider, request).await;
        drop(slot);

        match result {
            Ok(completion) => Ok(completion),
            Err(error) => Err(self.fatal(error).await),
        }
    }

    /// Resolve a fatal provider error into a session outcome.
    async fn fatal(&mut self, error: ProviderError) -> i32 {
        tracing::error!(error = %error, "fatal provider error");
        self.shell.shutdown(SHELL_SHUTDOWN_GRACE).await;
        let mode = if error.is_context_overflow() {
            TerminationMode::ContextExhaustion
        } else {
            TerminationMode::Exit
        };
        if matches!(error, ProviderError::Authentication(_)) {
            eprintln!("quine: {error}");
        }
        self.session.finalize(1, mode, Some(error.to_string()));
        1
    }

    /// Dispatch one tool call. `Some(code)` means the session is over.
    async fn dispatch(&mut self, call: &ToolCall, budget_spent: &mut bool) -> Option<i32> {
        if self.flags.panic() && call.name != "exit" {
            self.session
                .append(Message::tool_result(&call.id, PANIC_REJECTION, true));
            return None;
        }

        match call.name.as_str() {
            "sh" => {
                self.session.tape().increment_turn();
                let truncate = self.session.config.truncate_bytes;
                let output = tools::sh::run(&call.args, &mut self.shell, truncate).await;
                self.session
                    .append(Message::tool_result(&call.id, output.content, output.is_error));

                let config = &self.session.config;
                if config.max_turns > 0 && self.session.tape().turns() >= config.max_turns {
                    *budget_spent = true;
                }
                None
            }
            "fork" => {
                let config = &self.session.config;
                let output =
                    tools::fork::run(&call.args, config, &self.flags.active, config.truncate_bytes)
                        .await;
                self.session
                    .append(Message::tool_result(&call.id, output.content, output.is_error));
                None
            }
            "exec" => {
                // The replacement inherits our descriptors; the shell
                // must not linger as an orphan writing into them.
                self.shell.shutdown(SHELL_SHUTDOWN_GRACE).await;
                let output = tools::exec::run(&call.args, &self.session);
                self.session
                    .append(Message::tool_result(&call.id, output.content, output.is_error));
                None
            }
            "exit" => match tools::exit::evaluate(&call.args) {
                ExitDecision::Reject(text) => {
                    self.session.append(Message::tool_result(&call.id, text, true));
                    None
                }
                ExitDecision::Terminate { code, stderr } => {
                    Some(self.terminate(code, TerminationMode::Exit, stderr).await)
                }
            },
            unknown => {
                self.session.append(Message::tool_result(
                    &call.id,
                    format!("Unknown tool {unknown:?}; available tools: sh, fork, exec, exit."),
                    true,
                ));
                None
            }
        }
    }

    /// Annotate the last tool-result with budget hints.
    fn annotate(&self) {
        let config = &self.session.config;
        let mut tape = self.session.tape();
        let turns = tape.turns();
        let max_turns = config.max_turns;
        let context_used_k = self.last_input_tokens / 1000;
        if let Some(last) = tape.last_mut()
            && last.is_tool_result()
        {
            if max_turns > 0 {
                let left = max_turns.saturating_sub(turns);
                last.content.push_str(&format!("\n[TURNS LEFT] {left}"));
            }
            last.content
                .push_str(&format!("\n[CONTEXT USED] {context_used_k}K"));
        }
    }

    /// The near-death protocol: one final inference in which only a
    /// metamorphosis (exec) or a clean decision (exit) is honored.
    async fn near_death(&mut self) -> i32 {
        {
            let mut tape = self.session.tape();
            if let Some(last) = tape.last_mut()
                && last.is_tool_result()
            {
                last.content.push_str(NEAR_DEATH_WARNING);
            }
        }

        let completion = match self.infer().await {
            Ok(completion) => completion,
            Err(code) => return code,
        };
        let calls = self.accept(completion);

        for call in &calls {
            match call.name.as_str() {
                // Panic mode wins over near-death: no metamorphosis
                // under a time limit, only exit.
                "exec" if !self.flags.panic() => {
                    self.shell.shutdown(SHELL_SHUTDOWN_GRACE).await;
                    let output = tools::exec::run(&call.args, &self.session);
                    // Only reachable when the replacement failed.
                    self.session
                        .append(Message::tool_result(&call.id, output.content, output.is_error));
                }
                "exit" => match tools::exit::evaluate(&call.args) {
                    ExitDecision::Reject(text) => {
                        self.session.append(Message::tool_result(&call.id, text, true));
                    }
                    ExitDecision::Terminate { code, stderr } => {
                        return self.terminate(code, TerminationMode::Exit, stderr).await;
                    }
                },
                _ => {
                    self.session
                        .append(Message::tool_result(&call.id, BUDGET_REJECTION, true));
                }
            }
        }

        // No rescue arrived. The budget is spent for real.
        let (turns, max_turns) = {
            let tape = self.session.tape();
            (tape.turns(), self.session.config.max_turns)
        };
        let signal_text = format!("turn limit exhausted ({turns}/{max_turns})");
        eprintln!("{signal_text}");
        self.shell.shutdown(SHELL_SHUTDOWN_GRACE).await;
        self.session
            .finalize(1, TerminationMode::TurnExhaustion, Some(signal_text));
        1
    }

    /// Terminal exit path shared by the main loop and near-death.
    async fn terminate(
        &mut self,
        code: i32,
        mode: TerminationMode,
        stderr: Option<String>,
    ) -> i32 {
        if let Some(text) = &stderr {
            eprintln!("{text}");
        }
        self.shell.shutdown(SHELL_SHUTDOWN_GRACE).await;
        self.session.finalize(code, mode, stderr);
        code
    }
}
