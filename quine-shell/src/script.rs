//! Command framing: nonces, sentinels, and the per-command script.

/// Per-command nonce: 128 bits of hex, long enough that collision with
/// legitimate command output is negligible. Output that does contain the
/// sentinel pattern produces undefined captures; this is a documented
/// limitation of in-band framing.
#[must_use]
pub fn new_nonce() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// Sentinel vocabulary for one command.
#[derive(Debug, Clone)]
pub struct Sentinels {
    /// The per-command nonce.
    pub nonce: String,
}

impl Sentinels {
    /// Fresh sentinels with a random nonce.
    #[must_use]
    pub fn new() -> Self {
        Self { nonce: new_nonce() }
    }

    /// Stdout marker carrying the exit code.
    #[must_use]
    pub fn exit_pattern(&self) -> String {
        format!("{}:EXIT ", self.nonce)
    }

    /// Stderr end-of-command marker.
    #[must_use]
    pub fn done_pattern(&self) -> String {
        format!("{}:DONE", self.nonce)
    }
}

impl Default for Sentinels {
    fn default() -> Self {
        Self::new()
    }
}

/// Prelude sent once per shell spawn.
///
/// `set -m` turns on job control: every external command the shell runs
/// gets its own process group, so a timeout or forwarded SIGINT can
/// target the command's tree without touching the shell itself. The
/// command block still executes inside the shell's own address space,
/// which is what lets `cd`, `export`, functions, and options persist.
pub const SHELL_PRELUDE: &str = "set -m\n";

/// Build the script that frames one command.
///
/// The block runs in the shell's foreground with stdin from /dev/null
/// (the script stream must never be consumed by the command; material is
/// read from /dev/fd/4). The exit sentinel goes to stdout with the
/// block's status, the done sentinel to stderr. Both sentinels are
/// preceded by a newline that the capture layer strips, so output
/// without a trailing newline frames correctly.
#[must_use]
pub fn command_script(command: &str, sentinels: &Sentinels) -> String {
    let nonce = &sentinels.nonce;
    format!(
        "{{\n{command}\n}} </dev/null\n\
         __q_status=$?\n\
         printf '\\n%s:EXIT %s\\n' '{nonce}' \"$__q_status\"\n\
         printf '\\n%s:DONE\\n' '{nonce}' >&2\n"
    )
}
