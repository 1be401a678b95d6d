//! The `exit` executor: semantic validation of session termination.
//!
//! An invalid exit is rejected as a tool-result so the model can retry;
//! this preserves the tool-call/tool-result pairing the wire dialects
//! demand. The turn loop performs the actual termination for a valid
//! call.

use super::str_arg;

/// What an exit call resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitDecision {
    /// The call is semantically invalid; the content explains why.
    Reject(String),
    /// The session ends.
    Terminate {
        /// Process exit code: 0 for success, 1 for failure.
        code: i32,
        /// Failure-signal text to write to the agent's real stderr.
        stderr: Option<String>,
    },
}

/// Validate an exit call.
///
/// `success` must carry no stderr: a success with an excuse is not a
/// success. `failure` must carry one: an unexplained failure teaches
/// the parent nothing. Unknown statuses are rejected outright.
#[must_use]
pub fn evaluate(args: &serde_json::Map<String, serde_json::Value>) -> ExitDecision {
    let stderr = str_arg(args, "stderr").unwrap_or("").to_string();
    match str_arg(args, "status") {
        Some("success") if !stderr.is_empty() => ExitDecision::Reject(
            "Exit rejected: status=success must not carry stderr text. \
             Report problems with status=failure, or drop the stderr field."
                .into(),
        ),
        Some("success") => ExitDecision::Terminate {
            code: 0,
            stderr: None,
        },
        Some("failure") if stderr.is_empty() => ExitDecision::Reject(
            "Exit rejected: status=failure requires a reason in stderr.".into(),
        ),
        Some("failure") => ExitDecision::Terminate {
            code: 1,
            stderr: Some(stderr),
        },
        Some(other) => ExitDecision::Reject(format!(
            "Exit rejected: unknown status {other:?}; use \"success\" or \"failure\"."
        )),
        None => ExitDecision::Reject("Exit rejected: missing required argument: status.".into()),
    }
}
