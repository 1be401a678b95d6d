//! System prompt assembly and the session's opening user message.

use quine_core::Config;

/// How the agent's stdin arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdinMode {
    /// Stdin is a terminal; there is no input stream.
    Terminal,
    /// Stdin is piped; commands read it from /dev/fd/4.
    Piped,
    /// Stdin was consumed up front and stored at this path.
    Buffered(std::path::PathBuf),
}

/// Build the system prompt from configuration, mission, and wisdom.
#[must_use]
pub fn system_prompt(config: &Config, mission: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are quine, an autonomous agent running as a POSIX process. \
         Your mission is given below. You act exclusively through tool \
         calls; plain text is thinking out loud and reaches no one.\n\n",
    );
    prompt.push_str("Tools:\n");
    prompt.push_str(
        "- sh: run a command in your persistent shell. Working directory, \
         exported variables, and functions survive across calls.\n\
         - fork: spawn a child agent with its own mission. Use wait=true \
         to collect its output.\n\
         - exec: replace yourself with a fresh process, carrying wisdom \
         key-value state forward. This is how you survive resource \
         exhaustion.\n\
         - exit: end the session. status=success for a completed mission; \
         status=failure with a reason in stderr otherwise.\n\n",
    );
    prompt.push_str(
        "Channels: anything your commands write to /dev/fd/3 is your \
         deliverable; it goes to whoever launched you, unseen by you. \
         /dev/fd/4 is your original input stream. Your shell's stdout and \
         stderr come back to you as tool results and cost context; prefer \
         the deliverable channel for final output.\n\n",
    );
    prompt.push_str(&format!(
        "Session: depth {depth}, model {model}.\n",
        depth = config.depth,
        model = config.model,
    ));
    if let Some(persona) = &config.persona {
        prompt.push_str(&format!("Persona: {persona}\n"));
    }
    if config.max_turns > 0 {
        prompt.push_str(&format!(
            "You have a budget of {} shell turns; spend them deliberately.\n",
            config.max_turns
        ));
    }
    if !config.wisdom.is_empty() {
        prompt.push_str("\nWisdom carried over from your previous incarnation:\n");
        for (key, value) in config.wisdom.iter() {
            prompt.push_str(&format!("  {key}: {value}\n"));
        }
    }
    prompt.push_str(&format!("\nMission: {mission}\n"));
    prompt
}

/// The opening user message, chosen by stdin mode.
#[must_use]
pub fn initial_user_message(mode: &StdinMode) -> String {
    match mode {
        StdinMode::Terminal => "Begin.".to_string(),
        StdinMode::Piped => {
            "Begin. An input stream is attached; your commands can read it from /dev/fd/4."
                .to_string()
        }
        StdinMode::Buffered(path) => format!(
            "Begin. The input stream has been saved to {}.",
            path.display()
        ),
    }
}
