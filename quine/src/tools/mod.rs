//! The four tool executors and their published schemas.
//!
//! Every failure an executor can express is expressed as a tool-result
//! with the error flag set, never as a runtime error: breaking the
//! tool-call/tool-result pairing would poison the next inference at the
//! wire level, while an error result is feedback the model can act on.

pub mod exec;
pub mod exit;
pub mod fork;
pub mod sh;

use quine_turn::types::ToolSchema;
use serde_json::json;

/// What an executor hands back to the turn loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Tool-result content.
    pub content: String,
    /// Whether the call failed.
    pub is_error: bool,
}

impl ToolOutput {
    /// A successful result.
    #[must_use]
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    /// A failed result.
    #[must_use]
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Fetch a string argument.
pub(crate) fn str_arg<'a>(
    args: &'a serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str())
}

/// Fetch a boolean argument.
pub(crate) fn bool_arg(
    args: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Option<bool> {
    args.get(key).and_then(|v| v.as_bool())
}

/// The tool schemas published to the model on every inference.
#[must_use]
pub fn tool_schemas() -> Vec<ToolSchema> {
    vec![
        ToolSchema {
            name: "sh".into(),
            description: "Run a command in the persistent shell. Working directory, \
                          exported variables, and functions persist across calls."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string", "description": "Shell command to run"},
                },
                "required": ["command"],
            }),
        },
        ToolSchema {
            name: "fork".into(),
            description: "Spawn a child agent with its own mission.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "intent": {"type": "string", "description": "Mission for the child"},
                    "wait": {"type": "boolean", "description": "Block until the child exits and capture its output (default false)"},
                },
                "required": ["intent"],
            }),
        },
        ToolSchema {
            name: "exec".into(),
            description: "Replace this process with a fresh instance, carrying wisdom forward."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "wisdom": {
                        "type": "object",
                        "description": "Key-value state for the replacement; keys are UPPER_SNAKE, empty values delete",
                    },
                    "reason": {"type": "string", "description": "Why the replacement is happening"},
                    "persona": {"type": "string", "description": "Persona for the replacement to adopt"},
                },
            }),
        },
        ToolSchema {
            name: "exit".into(),
            description: "End the session.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "status": {"type": "string", "enum": ["success", "failure"]},
                    "stderr": {"type": "string", "description": "Reason text, required for failure, forbidden for success"},
                },
                "required": ["status"],
            }),
        },
    ]
}
