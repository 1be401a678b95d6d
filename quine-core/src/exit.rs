//! Exit code contract of the agent binary.

/// `exit(status=success)`.
pub const SUCCESS: i32 = 0;
/// `exit(status=failure)`, turn exhaustion, fatal LLM error, context overflow.
pub const FAILURE: i32 = 1;
/// Usage error: empty mission or missing required configuration.
pub const USAGE: i32 = 2;
/// Recursion depth exceeded at startup.
pub const DEPTH_EXCEEDED: i32 = 126;
/// Terminated by SIGHUP.
pub const SIGHUP: i32 = 129;
/// Terminated by SIGINT with no active subprocess.
pub const SIGINT: i32 = 130;
/// Terminated by SIGPIPE.
pub const SIGPIPE: i32 = 141;
/// Terminated by SIGTERM.
pub const SIGTERM: i32 = 143;

/// The conventional exit code for a signal: 128 + signal number.
#[must_use]
pub fn for_signal(signal: i32) -> i32 {
    128 + signal
}
