//! Command-line interface: `quine [-b] <mission words…>`.

use clap::Parser;

/// A runtime that executes a language model as a POSIX process.
#[derive(Debug, Parser)]
#[command(name = "quine", disable_help_subcommand = true)]
pub struct Cli {
    /// Consume stdin fully and store it under the data directory before
    /// the session starts; the agent is told where to find it.
    #[arg(short = 'b')]
    pub buffer_stdin: bool,

    /// The mission, given as free words.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub mission: Vec<String>,
}

impl Cli {
    /// The mission words joined into one string.
    #[must_use]
    pub fn mission_string(&self) -> String {
        self.mission.join(" ").trim().to_string()
    }
}
