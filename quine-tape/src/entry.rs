//! Audit-log records.
//!
//! The JSONL audit file holds one [`TapeEntry`] per line. The first line
//! of every file is a `meta` entry; a cleanly terminated session ends with
//! exactly one `outcome` entry. Readers encountering duplicate meta lines
//! ignore all but the first.

use serde::{Deserialize, Serialize};

use crate::message::{Message, ToolCall};

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationMode {
    /// The model called `exit`.
    Exit,
    /// The provider reported the context window exhausted.
    ContextExhaustion,
    /// The turn budget ran out and no exec rescued the session.
    TurnExhaustion,
    /// An external watchdog expired the session.
    Timeout,
    /// An OS signal terminated the session.
    Signal,
    /// The process replaced itself.
    Exec,
}

/// Final record of a session, written exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    /// Process exit code.
    pub exit_code: i32,
    /// Failure-signal text from `exit(failure)`, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_signal: Option<String>,
    /// Session duration in milliseconds.
    pub duration_ms: u64,
    /// Cumulative input tokens.
    pub tokens_in: u64,
    /// Cumulative output tokens.
    pub tokens_out: u64,
    /// Shell turns consumed.
    pub turns: u32,
    /// Termination mode.
    pub mode: TerminationMode,
}

/// One line of the JSONL audit file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TapeEntry {
    /// Session header; always the first line.
    Meta {
        /// Session identifier.
        session: String,
        /// Creating session's identifier.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_session: Option<String>,
        /// Recursion depth.
        depth: u32,
        /// Model identifier.
        model: String,
        /// Mission string.
        mission: String,
        /// Operating system process id.
        pid: u32,
        /// Session creation time, milliseconds since epoch.
        created_ms: u64,
    },
    /// A system, user, or assistant message.
    Message {
        /// Author role.
        role: crate::message::Role,
        /// Message content.
        content: String,
        /// Tool calls, for assistant messages.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
        /// Timestamp in milliseconds.
        timestamp_ms: u64,
    },
    /// A tool result.
    ToolResult {
        /// Identifier of the originating call.
        call_id: String,
        /// Result content.
        content: String,
        /// Whether the call failed.
        is_error: bool,
        /// Timestamp in milliseconds.
        timestamp_ms: u64,
    },
    /// Session outcome; the final line of a terminated session.
    Outcome {
        /// The outcome record.
        #[serde(flatten)]
        outcome: SessionOutcome,
    },
}

impl TapeEntry {
    /// Build the audit entry for a tape message.
    #[must_use]
    pub fn for_message(msg: &Message) -> Self {
        if msg.is_tool_result() {
            Self::ToolResult {
                call_id: msg.tool_call_id.clone().unwrap_or_default(),
                content: msg.content.clone(),
                is_error: msg.is_error,
                timestamp_ms: msg.timestamp_ms,
            }
        } else {
            Self::Message {
                role: msg.role,
                content: msg.content.clone(),
                tool_calls: msg.tool_calls.clone(),
                timestamp_ms: msg.timestamp_ms,
            }
        }
    }
}
